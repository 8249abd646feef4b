use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::storage::types::VideoStatus;
use crate::util::time;
use crate::youtube::VideoResolver;
use crate::youtube::shorts;

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";
const CHANNELS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/channels";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("video not found")]
    NotFound,
    #[error("video has no classifiable state")]
    Unclassifiable,
    #[error("YouTube API error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl ResolveError {
    /// Transient failures keep the stored row untouched so a later
    /// cycle can retry. NotFound and Unclassifiable will not improve
    /// with retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::Api { .. } | ResolveError::Http(_))
    }
}

/// Classified snapshot of one video. Timestamps are canonical UTC
/// RFC 3339 strings; duration is already rendered as "HH:mm:ss".
#[derive(Debug, Clone)]
pub struct VideoInfo {
    pub video_id: String,
    pub title: String,
    pub status: VideoStatus,
    pub scheduled_start_time: Option<String>,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub duration: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    live_streaming_details: Option<LiveStreamingDetails>,
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    live_broadcast_content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStreamingDetails {
    scheduled_start_time: Option<String>,
    actual_start_time: Option<String>,
    actual_end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
struct ChannelItem {
    snippet: ChannelSnippet,
}

#[derive(Debug, Deserialize)]
struct ChannelSnippet {
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

/// Map API fields to a lifecycle status. A video with no live
/// streaming details is a plain upload; `probed_short` decides whether
/// it is a short. Broadcasts that report "none" without an end time
/// are in an in-between state we refuse to persist.
fn classify(item: &VideoItem, probed_short: bool) -> Result<VideoStatus, ResolveError> {
    let Some(details) = &item.live_streaming_details else {
        return Ok(if probed_short {
            VideoStatus::Short
        } else {
            VideoStatus::Video
        });
    };
    match item.snippet.live_broadcast_content.as_str() {
        "upcoming" => Ok(VideoStatus::Upcoming),
        "live" => Ok(VideoStatus::Live),
        "none" if details.actual_end_time.is_some() => Ok(VideoStatus::Archive),
        _ => Err(ResolveError::Unclassifiable),
    }
}

pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: String,
}

impl YoutubeClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }

    async fn fetch_video_item(&self, video_id: &str) -> Result<VideoItem, ResolveError> {
        let response = self
            .http
            .get(VIDEOS_ENDPOINT)
            .query(&[
                ("part", "snippet,liveStreamingDetails,contentDetails"),
                ("id", video_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ResolveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let mut body: VideoListResponse = response.json().await?;
        if body.items.is_empty() {
            return Err(ResolveError::NotFound);
        }
        Ok(body.items.remove(0))
    }
}

#[async_trait]
impl VideoResolver for YoutubeClient {
    async fn resolve_video(&self, video_id: &str) -> Result<VideoInfo, ResolveError> {
        let item = self.fetch_video_item(video_id).await?;

        // The shorts probe costs an extra request, so only plain
        // uploads pay for it.
        let probed_short = if item.live_streaming_details.is_none() {
            shorts::is_short(&self.http, video_id).await
        } else {
            false
        };
        let status = classify(&item, probed_short)?;

        let VideoItem {
            id,
            snippet,
            live_streaming_details,
            content_details,
        } = item;
        let (scheduled, started, ended) = match live_streaming_details {
            Some(d) => (d.scheduled_start_time, d.actual_start_time, d.actual_end_time),
            None => (None, None, None),
        };

        Ok(VideoInfo {
            video_id: id,
            title: snippet.title,
            status,
            scheduled_start_time: scheduled.as_deref().and_then(time::canonicalize),
            actual_start_time: started.as_deref().and_then(time::canonicalize),
            actual_end_time: ended.as_deref().and_then(time::canonicalize),
            duration: time::normalize_duration(
                content_details
                    .and_then(|c| c.duration)
                    .as_deref()
                    .unwrap_or("P0D"),
            ),
        })
    }

    async fn fetch_channel_icon(&self, channel_id: &str) -> Result<Option<String>, ResolveError> {
        let response = self
            .http
            .get(CHANNELS_ENDPOINT)
            .query(&[
                ("part", "snippet"),
                ("id", channel_id),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ResolveError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChannelListResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .next()
            .and_then(|item| item.snippet.thumbnails.default)
            .map(|thumb| thumb.url))
    }
}
