//! Core domain logic for pump dose normalization.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: mapping pump history variants to semantic kinds
//! - Correlation: pairing temp basal rate and duration records
//! - Normalization: building canonical pump events for a persistence sink

pub mod classify;
pub mod correlate;
pub mod dose;
pub mod event;
pub mod normalize;
pub mod types;

pub use classify::{EventClass, classify};
pub use correlate::{PendingPolicy, PendingRate, TempBasalCorrelator};
pub use dose::{Dose, DoseQuantity};
pub use event::{DecodeError, HistoryRecord, PumpEvent};
pub use normalize::{NewPumpEvent, PumpEventSink, add_history, normalize, normalize_with};
pub use types::{
    BolusType, DoseKind, DoseUnit, PumpEventType, TempBasalRateType, UnknownPumpEventType,
    ValidationError,
};
