use tracing::warn;

/// Probe whether a video is a short by requesting its shorts URL and
/// checking where the redirect lands. Regular uploads bounce to a
/// /watch URL; shorts stay on /shorts/. Probe failures count as "not
/// a short".
pub async fn is_short(http: &reqwest::Client, video_id: &str) -> bool {
    let url = format!("https://youtube.com/shorts/{}", video_id);
    match http.head(&url).send().await {
        Ok(response) => response.url().path().contains("/shorts/"),
        Err(e) => {
            warn!("Shorts probe failed for {}: {}", video_id, e);
            false
        }
    }
}
