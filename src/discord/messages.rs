use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::storage::types::{ReminderRecord, VideoRecord, VideoStatus};
use crate::util::time;
use crate::youtube::VideoInfo;

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Render a stored timestamp for display. Falls back to the raw value
/// when it does not parse, so a notification is never silently empty.
fn fmt_or_raw(value: &str, pattern: &str, tz: Tz) -> String {
    time::format_timestamp(value, pattern, tz).unwrap_or_else(|| value.to_string())
}

/// Per-status announcement line. Used both for first sightings and for
/// status transitions.
pub fn description_for(info: &VideoInfo, tz: Tz) -> String {
    match info.status {
        VideoStatus::Upcoming => {
            let when = info
                .scheduled_start_time
                .as_deref()
                .map(|v| fmt_or_raw(v, "%m/%d %H:%M", tz))
                .unwrap_or_default();
            format!("{}から配信予定！", when)
        }
        VideoStatus::Live => {
            let when = info
                .actual_start_time
                .as_deref()
                .map(|v| fmt_or_raw(v, "%H:%M", tz))
                .unwrap_or_default();
            format!("{}から配信中！", when)
        }
        VideoStatus::Archive => format!("アーカイブはこちら\n配信時間: {}", info.duration),
        VideoStatus::Video => format!("動画が投稿されました\n動画時間: {}", info.duration),
        VideoStatus::Short => {
            format!("ショート動画が投稿されました\n動画時間: {}", info.duration)
        }
    }
}

pub fn schedule_change_description(new_start: Option<&str>, tz: Tz) -> String {
    let when = new_start
        .map(|v| fmt_or_raw(v, "%m/%d %H:%M", tz))
        .unwrap_or_default();
    format!("配信予定が {} に変更されました。", when)
}

pub fn title_change_description(old_title: &str, new_title: &str) -> String {
    format!("タイトルが {} から {} に更新されました。", old_title, new_title)
}

/// Rewrite the schedule fragment inside a stored notification text so
/// re-sent reminders show the new start time.
pub fn rewrite_schedule_text(content: &str, new_start: &str, tz: Tz) -> String {
    let re = Regex::new(r"\[\d{2}/\d{2} \d{2}:\d{2}から配信予定！\]").unwrap();
    let when = fmt_or_raw(new_start, "%m/%d %H:%M", tz);
    re.replace(content, format!("[{}から配信予定！]", when).as_str())
        .into_owned()
}

pub fn reminder_dm(lead_minutes: i64, content: &str) -> String {
    format!("🔔 {}分後に配信が始まるよ！\n{}", lead_minutes, content)
}

pub fn schedule_change_dm(lead_minutes: i64, updated_content: &str) -> String {
    format!(
        "🆙 リマインダー更新通知: 登録された配信予定時刻が変更されました。\n新しい時刻: {}\n配信開始の{}分前にリマインダーを送ります。",
        updated_content, lead_minutes
    )
}

/// A reminder registration extracted from a reacted-on notification
/// message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub video_id: String,
    pub target_start: DateTime<Utc>,
}

/// Pull the announced start time and video id out of a notification
/// message. The announcement carries no year, so the current year in
/// the display timezone is assumed; the wall-clock time is interpreted
/// in that same timezone.
pub fn parse_reminder_request(content: &str, tz: Tz, now: DateTime<Utc>) -> Option<ReminderRequest> {
    let time_re = Regex::new(r"(\d{2})/(\d{2}) (\d{2}):(\d{2})").unwrap();
    let url_re = Regex::new(r"https://www\.youtube\.com/watch\?v=([A-Za-z0-9_-]+)").unwrap();

    let time_caps = time_re.captures(content)?;
    let url_caps = url_re.captures(content)?;

    let month: u32 = time_caps[1].parse().ok()?;
    let day: u32 = time_caps[2].parse().ok()?;
    let hour: u32 = time_caps[3].parse().ok()?;
    let minute: u32 = time_caps[4].parse().ok()?;
    let year = now.with_timezone(&tz).year();

    let target = tz
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()?;
    Some(ReminderRequest {
        video_id: url_caps[1].to_string(),
        target_start: target.with_timezone(&Utc),
    })
}

pub fn live_reply(videos: &[VideoRecord]) -> String {
    if videos.is_empty() {
        return "現在ライブ配信はありません。".to_string();
    }
    videos
        .iter()
        .map(|v| format!("[{}]({})", v.title, watch_url(&v.video_id)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn upcoming_reply(minutes: i64, videos: &[VideoRecord], tz: Tz) -> String {
    if videos.is_empty() {
        return format!("{}分以内に始まる配信はありません。", minutes);
    }
    videos
        .iter()
        .map(|v| {
            let when = v
                .scheduled_start_time
                .as_deref()
                .map(|t| fmt_or_raw(t, "%Y/%m/%d %H:%M", tz))
                .unwrap_or_default();
            format!(
                "{}から配信予定！ [{}]({})",
                when,
                v.title,
                watch_url(&v.video_id)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn reminder_list_reply(reminders: &[ReminderRecord], tz: Tz) -> String {
    if reminders.is_empty() {
        return "設定されているリマインダーはありません。".to_string();
    }
    reminders
        .iter()
        .map(|r| {
            format!(
                "⏰ リマインダー時刻:{}\n{}",
                fmt_or_raw(&r.reminder_time, "%Y/%m/%d %H:%M", tz),
                r.message_content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub const INTERACTION_ERROR_REPLY: &str = "エラーが発生しました。";
