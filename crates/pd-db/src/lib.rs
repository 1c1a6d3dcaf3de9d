//! Storage layer for normalized pump events.
//!
//! Provides persistence for [`NewPumpEvent`] batches using `rusqlite`, and
//! implements [`PumpEventSink`] so the normalizer can hand batches straight to
//! a [`Database`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization. Normalize in parallel,
//! then submit batches from one thread.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`), so lexicographic ordering matches
//! chronological ordering.
//!
//! ## Deduplication
//!
//! Each event's `id` is a UUID v5 over its timestamp, raw payload and title.
//! Re-importing the same history is a no-op for immutable events. Mutable
//! events are provisional: a batch replaces the stored mutable events that
//! fall within its own time span, matching how the device revises records it
//! has not finalized. Mutable events outside the span are left alone.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use pd_core::{DoseUnit, NewPumpEvent, PumpEventSink, PumpEventType, UnknownPumpEventType};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, params};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid stored timestamp: {timestamp}")]
    TimestampParse {
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored type string is not a known pump event type.
    #[error("invalid stored type")]
    InvalidType(#[from] UnknownPumpEventType),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A pump event as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpEventRecord {
    pub id: String,
    pub timestamp: String,
    /// Stored type; `None` for untyped raw markers.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: String,
    #[serde(with = "hex::serde")]
    pub raw: Vec<u8>,
    pub mutable: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub value: Option<f64>,
    pub unit: Option<DoseUnit>,
}

/// Number of stored events of one type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCount {
    /// `None` counts untyped raw markers.
    pub kind: Option<PumpEventType>,
    pub count: i64,
}

const EVENT_COLUMNS: &str =
    "id, timestamp, type, title, raw, mutable, start_time, end_time, value, unit";

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- type: stored pump event type (e.g., 'bolus', 'prime'), NULL for raw markers
            -- start_time/end_time/value/unit: dose columns, NULL when there is no dose
            CREATE TABLE IF NOT EXISTS pump_events (
                id TEXT PRIMARY KEY,
                timestamp TEXT NOT NULL,
                type TEXT,
                title TEXT NOT NULL,
                raw BLOB NOT NULL,
                mutable INTEGER NOT NULL DEFAULT 0,
                start_time TEXT,
                end_time TEXT,
                value REAL,
                unit TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_pump_events_timestamp ON pump_events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_pump_events_type ON pump_events(type);
            CREATE INDEX IF NOT EXISTS idx_pump_events_mutable ON pump_events(mutable);
            ",
        )?;
        Ok(())
    }

    /// Stores a batch of normalized events.
    ///
    /// Stored mutable events between the batch's earliest and latest
    /// timestamps (inclusive) are replaced by this batch; immutable duplicates
    /// are ignored. Returns the number of rows added, net of the mutable rows
    /// the batch superseded.
    pub fn insert_pump_events(&mut self, events: &[NewPumpEvent]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let superseded = match batch_span(events) {
            Some((first, last)) => tx.execute(
                "
                DELETE FROM pump_events
                WHERE mutable = 1 AND timestamp >= ? AND timestamp <= ?
                ",
                [format_timestamp(first), format_timestamp(last)],
            )?,
            None => 0,
        };
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO pump_events
                (id, timestamp, type, title, raw, mutable, start_time, end_time, value, unit)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for event in events {
                let timestamp = format_timestamp(event.timestamp);
                let dose = event.dose.as_ref();
                inserted += stmt.execute(params![
                    event_id(&timestamp, event),
                    timestamp,
                    event.stored_type().map(|kind| kind.to_string()),
                    event.title,
                    event.raw,
                    event.is_mutable,
                    dose.map(|d| format_timestamp(d.start_time)),
                    dose.map(|d| format_timestamp(d.end_time)),
                    dose.and_then(pd_core::Dose::value),
                    dose.and_then(pd_core::Dose::unit).map(|unit| unit.as_str()),
                ])?;
            }
        }
        tx.commit()?;
        let added = inserted.saturating_sub(superseded);
        tracing::debug!(
            batch = events.len(),
            inserted,
            superseded,
            added,
            "stored pump events"
        );
        Ok(added)
    }

    /// Lists all events ordered by timestamp then ID.
    pub fn list_events(&self) -> Result<Vec<PumpEventRecord>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM pump_events ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt.query_map([], map_event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Lists events within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`.
    pub fn list_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PumpEventRecord>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let start = format_timestamp(start);
        let end = format_timestamp(end);
        let mut stmt = self.conn.prepare(&format!(
            "
            SELECT {EVENT_COLUMNS}
            FROM pump_events
            WHERE timestamp >= ? AND timestamp < ?
            ORDER BY timestamp ASC, id ASC
            "
        ))?;
        let rows = stmt.query_map([start, end], map_event_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }

    /// Counts stored events per type, untyped markers first.
    pub fn count_by_type(&self) -> Result<Vec<TypeCount>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT type, COUNT(*)
            FROM pump_events
            GROUP BY type
            ORDER BY type ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: Option<String> = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((kind, count))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            let (kind, count) = row?;
            let kind = kind.map(|kind| kind.parse::<PumpEventType>()).transpose()?;
            counts.push(TypeCount { kind, count });
        }
        Ok(counts)
    }

    /// Returns the timestamp of the most recent stored event.
    pub fn last_event_at(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        let last: Option<String> =
            self.conn
                .query_row("SELECT MAX(timestamp) FROM pump_events", [], |row| {
                    row.get(0)
                })?;
        last.map(|timestamp| parse_timestamp(&timestamp)).transpose()
    }
}

impl PumpEventSink for Database {
    type Error = DbError;

    fn add_pump_events(&mut self, events: Vec<NewPumpEvent>) -> Result<usize, DbError> {
        self.insert_pump_events(&events)
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<PumpEventRecord> {
    let unit: Option<String> = row.get(9)?;
    let unit = unit
        .map(|unit| unit.parse::<DoseUnit>())
        .transpose()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(err)))?;
    Ok(PumpEventRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        raw: row.get(4)?,
        mutable: row.get(5)?,
        start_time: row.get(6)?,
        end_time: row.get(7)?,
        value: row.get(8)?,
        unit,
    })
}

fn batch_span(events: &[NewPumpEvent]) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let first = events.iter().map(|event| event.timestamp).min()?;
    let last = events.iter().map(|event| event.timestamp).max()?;
    Some((first, last))
}

fn event_id(timestamp: &str, event: &NewPumpEvent) -> String {
    let content = format!(
        "pump_event|{timestamp}|{}|{}",
        hex::encode(&event.raw),
        event.title
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, content.as_bytes()).to_string()
}

fn parse_timestamp(timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
