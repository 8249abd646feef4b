use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::path::PathBuf;

use crate::platform::{NativePlatform, Platform};

/// Minutes before a stream's start that a reminder fires.
pub const REMINDER_LEAD_MINUTES: i64 = 5;
/// Hours an ended or never-started broadcast row is kept around.
pub const RETENTION_HOURS: i64 = 13;

const DEFAULT_LOOKAHEAD_MINUTES: i64 = 10;
const DEFAULT_RECHECK_MINUTES: i64 = 10;
const DEFAULT_TIMEZONE: &str = "Asia/Tokyo";

/// Runtime settings, read once at startup. Secrets come from the
/// environment; tunables fall back to defaults when unset or
/// unparseable.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub youtube_api_key: String,
    pub discord_bot_token: String,
    pub db_path: PathBuf,
    pub display_tz: Tz,
    pub reminder_lead_minutes: i64,
    pub reminder_lookahead_minutes: i64,
    pub reminder_recheck_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let youtube_api_key = std::env::var("YOUTUBE_API_KEY").unwrap_or_default();
        let discord_bot_token = std::env::var("DISCORD_BOT_TOKEN").unwrap_or_default();

        let db_path = match std::env::var("OSHIRASE_DB") {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => NativePlatform::data_dir().join("oshirase.db"),
        };

        let tz_name =
            std::env::var("OSHIRASE_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());
        let display_tz: Tz = tz_name
            .parse()
            .with_context(|| format!("unknown timezone \"{}\" in OSHIRASE_TIMEZONE", tz_name))?;

        Ok(Self {
            youtube_api_key,
            discord_bot_token,
            db_path,
            display_tz,
            reminder_lead_minutes: REMINDER_LEAD_MINUTES,
            reminder_lookahead_minutes: env_minutes(
                "REMINDER_SEARCH_INTERVAL",
                DEFAULT_LOOKAHEAD_MINUTES,
            ),
            reminder_recheck_minutes: env_minutes(
                "REMINDER_RECHECK_INTERVAL",
                DEFAULT_RECHECK_MINUTES,
            ),
        })
    }
}

fn env_minutes(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&v| v > 0)
        .unwrap_or(default)
}
