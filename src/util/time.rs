use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;
use regex::Regex;
use tracing::warn;

/// Convert an ISO 8601 duration ("PT1H30M15S", "P0D") to "HH:mm:ss".
/// Unparseable input logs a warning and yields "00:00:00"; never panics.
pub fn normalize_duration(raw: &str) -> String {
    if raw == "P0D" {
        return "00:00:00".to_string();
    }

    let re = Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").unwrap();
    let Some(captures) = re.captures(raw) else {
        warn!("Invalid duration format passed to normalize_duration: \"{}\"", raw);
        return "00:00:00".to_string();
    };

    let part = |i: usize| -> u64 {
        captures
            .get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    format!("{:02}:{:02}:{:02}", part(1), part(2), part(3))
}

pub fn parse_rfc3339(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical storage form: UTC RFC 3339 with a trailing `Z` and whole
/// seconds, so lexicographic order equals chronological order.
pub fn to_utc_string(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Re-render an arbitrary RFC 3339 string in canonical storage form.
pub fn canonicalize(value: &str) -> Option<String> {
    parse_rfc3339(value).map(to_utc_string)
}

/// Second-granularity equality of two timestamp strings. Falls back to
/// literal comparison when either side does not parse.
pub fn same_instant(a: &str, b: &str) -> bool {
    match (parse_rfc3339(a), parse_rfc3339(b)) {
        (Some(x), Some(y)) => x.timestamp() == y.timestamp(),
        _ => a == b,
    }
}

/// Format a timestamp in the display timezone with a strftime pattern.
/// Returns None (and logs) for input that does not parse.
pub fn format_timestamp(value: &str, pattern: &str, tz: Tz) -> Option<String> {
    let Some(dt) = parse_rfc3339(value) else {
        warn!("Invalid timestamp passed to format_timestamp: \"{}\"", value);
        return None;
    };
    Some(dt.with_timezone(&tz).format(pattern).to_string())
}
