//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;

/// `<count> <unit> ago`, where the unit may be abbreviated (`90m ago`, `2 hr ago`).
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(\d+)\s*([a-z]+)\s+ago$").unwrap());

fn minutes_per_unit(unit: &str) -> Option<i64> {
    match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60),
        "d" | "day" | "days" => Some(60 * 24),
        "w" | "wk" | "week" | "weeks" => Some(60 * 24 * 7),
        _ => None,
    }
}

/// Parses an `--after`/`--before` bound.
///
/// Accepts RFC 3339 (`2025-01-01T08:00:00Z`) or a time relative to now such
/// as `90m ago`, `6 hours ago` or `3 days ago`.
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    parse_datetime_at(s, Utc::now())
}

fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!("unrecognized time '{s}': expected RFC 3339 or '<count> <unit> ago'");
    };

    let unit = caps[2].to_ascii_lowercase();
    let Some(per_unit) = minutes_per_unit(&unit) else {
        anyhow::bail!("unknown time unit '{unit}': use minutes, hours, days or weeks");
    };

    let count: i64 = caps[1]
        .parse()
        .with_context(|| format!("relative time out of range: {s}"))?;

    count
        .checked_mul(per_unit)
        .and_then(Duration::try_minutes)
        .and_then(|offset| now.checked_sub_signed(offset))
        .with_context(|| format!("relative time out of range: {s}"))
}
