use std::fmt;
use std::str::FromStr;

/// Lifecycle classification of a tracked video. The storage layer only ever
/// holds one of these five values; an unclassifiable video is never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Upcoming,
    Live,
    Archive,
    Video,
    Short,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Upcoming => "upcoming",
            VideoStatus::Live => "live",
            VideoStatus::Archive => "archive",
            VideoStatus::Video => "video",
            VideoStatus::Short => "short",
        }
    }

    /// Whether the video can still change state. Archive, video and short
    /// are terminal; only their `updated` timestamp is kept fresh.
    pub fn is_pending(&self) -> bool {
        matches!(self, VideoStatus::Upcoming | VideoStatus::Live)
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown video status '{0}'")]
pub struct ParseStatusError(String);

impl FromStr for VideoStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(VideoStatus::Upcoming),
            "live" => Ok(VideoStatus::Live),
            "archive" => Ok(VideoStatus::Archive),
            "video" => Ok(VideoStatus::Video),
            "short" => Ok(VideoStatus::Short),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// A tracked video row. All timestamps are canonical UTC RFC 3339 strings
/// (`YYYY-MM-DDTHH:MM:SSZ`) so that string ordering matches time ordering.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub title: String,
    pub published: String,
    pub updated: String,
    pub channel_id: String,
    pub status: VideoStatus,
    pub scheduled_start_time: Option<String>,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ReminderRecord {
    pub id: i64,
    pub user_id: String,
    pub video_id: String,
    pub message_content: String,
    pub reminder_time: String,
    pub scheduled: bool,
    pub executed: bool,
}

/// A watched YouTube channel and its delivery settings. Written by the CLI,
/// read by the polling jobs; the icon URL is the only field maintenance
/// touches afterwards.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_icon_url: String,
    pub discord_webhook_url: String,
    pub interval_minutes: u32,
    pub is_active: bool,
}

/// Identity of a row removed by the retention sweep, kept for logging.
#[derive(Debug, Clone)]
pub struct SweptVideo {
    pub video_id: String,
    pub title: String,
    pub status: VideoStatus,
}
