//! Semantic classification of pump history variants.

use crate::event::PumpEvent;
use crate::types::{BolusType, TempBasalRateType};

/// What a history record means for dose construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventClass {
    /// Produces a bolus dose immediately.
    Bolus {
        bolus_type: BolusType,
        amount: f64,
        duration_minutes: u32,
    },
    /// Produces a suspend marker immediately.
    Suspend,
    /// Produces a resume marker immediately.
    Resume,
    /// An absolute temp basal rate; becomes the pending rate.
    RateChange { rate: f64 },
    /// A temp basal rate in some other mode (e.g. percent). Ignored entirely.
    IgnoredRateChange,
    /// A temp basal duration; completes the pending rate if timestamps match.
    DurationChange { duration_minutes: u32 },
    /// No dose, but stored with an explicit prime type.
    Prime,
    /// Passed through as an untyped raw marker.
    Unrecognized,
}

/// Classifies a single history variant.
pub const fn classify(event: &PumpEvent) -> EventClass {
    match event {
        PumpEvent::BolusNormal {
            amount,
            bolus_type,
            duration_minutes,
        } => EventClass::Bolus {
            bolus_type: *bolus_type,
            amount: *amount,
            duration_minutes: *duration_minutes,
        },
        PumpEvent::Suspend => EventClass::Suspend,
        PumpEvent::Resume => EventClass::Resume,
        PumpEvent::TempBasal {
            rate,
            rate_type: TempBasalRateType::Absolute,
        } => EventClass::RateChange { rate: *rate },
        PumpEvent::TempBasal { .. } => EventClass::IgnoredRateChange,
        PumpEvent::TempBasalDuration { duration_minutes } => EventClass::DurationChange {
            duration_minutes: *duration_minutes,
        },
        PumpEvent::Prime { .. } => EventClass::Prime,
        PumpEvent::Unknown { .. } => EventClass::Unrecognized,
    }
}
