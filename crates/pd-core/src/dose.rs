//! Canonical dose values.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BolusType, DoseKind, DoseUnit};

/// An amount of insulin together with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseQuantity {
    pub value: f64,
    pub unit: DoseUnit,
}

/// A normalized dose.
///
/// `end_time` is never before `start_time`. Instantaneous doses (normal
/// boluses, suspend and resume markers) have equal start and end times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dose {
    pub kind: DoseKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Absent for suspend and resume, which only mark a state transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<DoseQuantity>,
}

impl Dose {
    /// A bolus of `amount`, delivered over `duration_minutes` starting at `start`.
    ///
    /// Square boluses are expressed in units per hour, normal boluses in units.
    pub fn bolus(
        start: DateTime<Utc>,
        bolus_type: BolusType,
        amount: f64,
        duration_minutes: u32,
    ) -> Self {
        let unit = match bolus_type {
            BolusType::Normal => DoseUnit::Units,
            BolusType::Square => DoseUnit::UnitsPerHour,
        };
        Self {
            kind: DoseKind::Bolus,
            start_time: start,
            end_time: end_after(start, duration_minutes),
            quantity: Some(DoseQuantity {
                value: amount,
                unit,
            }),
        }
    }

    /// A temp basal at `rate` units per hour lasting `duration_minutes`.
    pub fn temp_basal(start: DateTime<Utc>, rate: f64, duration_minutes: u32) -> Self {
        Self {
            kind: DoseKind::TempBasal,
            start_time: start,
            end_time: end_after(start, duration_minutes),
            quantity: Some(DoseQuantity {
                value: rate,
                unit: DoseUnit::UnitsPerHour,
            }),
        }
    }

    /// Marks the instant delivery was suspended.
    pub const fn suspend(at: DateTime<Utc>) -> Self {
        Self::marker(DoseKind::Suspend, at)
    }

    /// Marks the instant delivery resumed, closing any preceding suspend.
    pub const fn resume(at: DateTime<Utc>) -> Self {
        Self::marker(DoseKind::Resume, at)
    }

    const fn marker(kind: DoseKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            start_time: at,
            end_time: at,
            quantity: None,
        }
    }

    /// The dose amount, if this dose carries one.
    pub fn value(&self) -> Option<f64> {
        self.quantity.map(|q| q.value)
    }

    /// The dose unit, if this dose carries one.
    pub fn unit(&self) -> Option<DoseUnit> {
        self.quantity.map(|q| q.unit)
    }
}

// Saturates at the maximum representable time so the end never precedes the start.
fn end_after(start: DateTime<Utc>, minutes: u32) -> DateTime<Utc> {
    start
        .checked_add_signed(Duration::minutes(i64::from(minutes)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
