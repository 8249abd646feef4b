pub mod time;

use tracing::debug;

/// Check whether a URL still responds with a success status. Network
/// failures count as inaccessible.
pub async fn is_url_accessible(http: &reqwest::Client, url: &str) -> bool {
    match http.get(url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            debug!("URL check failed for {}: {}", url, e);
            false
        }
    }
}
