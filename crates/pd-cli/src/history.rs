//! JSON-lines interchange format for decoded pump history.
//!
//! Each non-empty line is one record:
//!
//! ```json
//! {"timestamp": "2025-01-01T08:00:00Z", "mutable": false, "raw": "010f", "event": {"type": "bolus_normal", "amount": 1.5}}
//! ```
//!
//! `mutable` defaults to `false` and `raw` (hex) to empty. Event types this
//! tool does not know are kept as pass-through records.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use pd_core::{HistoryRecord, PumpEvent};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InterchangeRecord {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    mutable: bool,
    #[serde(default)]
    raw: Option<String>,
    event: serde_json::Value,
}

impl InterchangeRecord {
    fn into_record(self) -> Result<HistoryRecord> {
        let raw = match self.raw.as_deref().map(str::trim) {
            Some(hex_str) if !hex_str.is_empty() => {
                hex::decode(hex_str).context("invalid hex in raw payload")?
            }
            _ => Vec::new(),
        };
        let event = PumpEvent::from_json(self.event)?;
        Ok(HistoryRecord::new(self.timestamp, event)
            .with_raw(raw)
            .mutable(self.mutable))
    }
}

/// Reads a history file, decompressing it when the name ends in `.gz`.
pub fn read_history(path: &Path) -> Result<Vec<HistoryRecord>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let is_gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let records = if is_gzip {
        parse_history(BufReader::new(GzDecoder::new(file)))
    } else {
        parse_history(BufReader::new(file))
    };
    records.with_context(|| format!("failed to read history from {}", path.display()))
}

/// Parses JSON-lines history, preserving line order.
pub fn parse_history<R: BufRead>(reader: R) -> Result<Vec<HistoryRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: InterchangeRecord = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        let record = parsed
            .into_record()
            .with_context(|| format!("invalid record on line {}", idx + 1))?;
        records.push(record);
    }
    Ok(records)
}
