//! Events command for listing stored pump events.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pd_db::{Database, PumpEventRecord};

use super::util::parse_datetime;

/// Upper bound used when `--before` is omitted (9999-12-31T23:59:59Z).
const FAR_FUTURE_SECS: i64 = 253_402_300_799;

/// Runs the events command.
///
/// Writes a table by default, or JSONL when `json` is set.
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    after: Option<&str>,
    before: Option<&str>,
    json: bool,
) -> Result<()> {
    let after = parse_bound(after, "after")?;
    let before = parse_bound(before, "before")?;

    let events = if after.is_none() && before.is_none() {
        db.list_events()?
    } else {
        let start = after.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let end = before.unwrap_or_else(|| {
            DateTime::from_timestamp(FAR_FUTURE_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        db.list_events_in_range(start, end)?
    };

    if json {
        for event in &events {
            let json = serde_json::to_string(event)?;
            writeln!(writer, "{json}")?;
        }
        return Ok(());
    }

    if events.is_empty() {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    }
    for event in &events {
        writeln!(writer, "{}", format_row(event))?;
    }
    Ok(())
}

fn parse_bound(s: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>> {
    s.map(|s| parse_datetime(s).with_context(|| format!("invalid --{name} value")))
        .transpose()
}

fn format_row(event: &PumpEventRecord) -> String {
    let mut row = format!(
        "{}  {:<10}  {}",
        event.timestamp,
        event.kind.as_deref().unwrap_or("-"),
        event.title
    );
    if let (Some(value), Some(unit)) = (event.value, event.unit) {
        row.push_str(&format!("  {value} {unit}"));
    }
    if let Some(end) = event
        .end_time
        .as_deref()
        .filter(|end| event.start_time.as_deref() != Some(*end))
    {
        row.push_str(&format!("  until {end}"));
    }
    if event.mutable {
        row.push_str("  (mutable)");
    }
    row
}
