use anyhow::{Result, bail};
use async_trait::async_trait;
use tracing::info;

use crate::discord::messages;

/// Shown when a channel has no icon of its own.
pub const DEFAULT_ICON_URL: &str =
    "https://www.youtube.com/s/desktop/28b0985e/img/favicon_144x144.png";

/// One outbound channel announcement, ready to post.
#[derive(Debug, Clone)]
pub struct Notification {
    pub channel_name: String,
    pub video_id: String,
    pub description: String,
    pub icon_url: String,
}

/// Delivery seam for channel announcements. The production
/// implementation posts to a Discord webhook; tests record intents.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, webhook_url: &str, notification: &Notification) -> Result<()>;
}

pub struct WebhookNotifier {
    http: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

fn avatar_for(icon_url: &str) -> &str {
    if icon_url.is_empty() {
        DEFAULT_ICON_URL
    } else {
        icon_url
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, webhook_url: &str, notification: &Notification) -> Result<()> {
        let payload = serde_json::json!({
            "username": notification.channel_name,
            "avatar_url": avatar_for(&notification.icon_url),
            "tts": false,
            "wait": true,
            "content": format!(
                "[{}]({})",
                notification.description,
                messages::watch_url(&notification.video_id)
            ),
        });

        let response = self.http.post(webhook_url).json(&payload).send().await?;
        if !response.status().is_success() {
            bail!(
                "webhook delivery for video {} failed with status {}",
                notification.video_id,
                response.status()
            );
        }
        info!("Notification sent for video {}", notification.video_id);
        Ok(())
    }
}
