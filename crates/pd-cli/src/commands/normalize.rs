//! Normalize command: prints pump events as JSONL without touching the database.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use pd_core::{PendingPolicy, normalize_with};

use crate::history::read_history;

/// Runs the normalize command, writing one JSON object per history record.
pub fn run<W: Write>(writer: &mut W, path: &Path, policy: PendingPolicy) -> Result<usize> {
    let records = read_history(path)?;
    let events = normalize_with(&records, policy);

    for event in &events {
        let json = serde_json::to_string(event)?;
        writeln!(writer, "{json}")?;
    }

    Ok(events.len())
}
