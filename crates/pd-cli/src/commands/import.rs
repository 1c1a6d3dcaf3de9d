//! Import command for normalizing history files into the local `SQLite` store.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use pd_core::{NewPumpEvent, PendingPolicy, PumpEventSink, normalize_with};
use pd_db::Database;
use rayon::prelude::*;

use crate::history::read_history;

/// Totals across all imported files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    pub doses: usize,
    pub inserted: usize,
}

/// Normalizes each file independently, then stores one batch per file.
///
/// Files are scanned in parallel; each gets its own correlator, so a temp basal
/// rate in one file never pairs with a duration in another.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    files: &[PathBuf],
    policy: PendingPolicy,
) -> Result<ImportSummary> {
    let batches = files
        .par_iter()
        .map(|path| -> Result<(&PathBuf, Vec<NewPumpEvent>)> {
            let records = read_history(path)?;
            Ok((path, normalize_with(&records, policy)))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut summary = ImportSummary::default();
    for (path, events) in batches {
        let records = events.len();
        let doses = events.iter().filter(|event| event.dose.is_some()).count();
        let inserted = db
            .add_pump_events(events)
            .with_context(|| format!("failed to store events from {}", path.display()))?;
        tracing::debug!(path = %path.display(), records, doses, inserted, "imported history file");

        writeln!(
            writer,
            "{}: {records} records, {doses} doses, {inserted} new",
            path.display()
        )?;
        summary.records += records;
        summary.doses += doses;
        summary.inserted += inserted;
    }

    Ok(summary)
}
