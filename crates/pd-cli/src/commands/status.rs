//! Status command for summarizing the stored pump history.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use chrono::SecondsFormat;
use pd_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    writeln!(writer, "Pump dose store status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    let Some(last_event) = db.last_event_at()? else {
        writeln!(writer, "No events recorded.")?;
        return Ok(());
    };
    writeln!(
        writer,
        "Last event: {}",
        last_event.to_rfc3339_opts(SecondsFormat::Secs, true)
    )?;

    writeln!(writer, "Events by type:")?;
    for count in db.count_by_type()? {
        let kind = count
            .kind
            .map_or_else(|| "untyped".to_string(), |kind| kind.to_string());
        writeln!(writer, "- {kind}: {}", count.count)?;
    }

    Ok(())
}
