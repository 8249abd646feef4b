pub mod api;
pub mod feed;
pub mod shorts;

pub use api::{ResolveError, VideoInfo, YoutubeClient};
pub use feed::{FeedClient, FeedEntry, FeedSource};

use async_trait::async_trait;

/// Classification source for a single video. The production
/// implementation calls the YouTube Data API; tests substitute canned
/// responses.
#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn resolve_video(&self, video_id: &str) -> Result<VideoInfo, ResolveError>;
    async fn fetch_channel_icon(&self, channel_id: &str) -> Result<Option<String>, ResolveError>;
}
