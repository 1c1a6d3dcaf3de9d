//! Decoded pump history records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use crate::types::{BolusType, TempBasalRateType, ValidationError, validate_amount};

/// Errors decoding a pump event payload from JSON.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload has no string `type` field.
    #[error("event payload is missing a string `type` field")]
    MissingType,
    /// A known event type had missing or mistyped fields.
    #[error("invalid `{kind}` payload: {source}")]
    Json {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    /// A known event type carried an unusable amount.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One device history variant.
///
/// `Unknown` covers every variant this crate does not interpret. Such records
/// are kept so the stored history stays complete.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PumpEvent {
    /// A bolus delivery. `duration_minutes` is zero for normal boluses.
    BolusNormal {
        amount: f64,
        #[serde(default = "default_bolus_type")]
        bolus_type: BolusType,
        #[serde(default)]
        duration_minutes: u32,
    },
    Suspend,
    Resume,
    /// First half of a temp basal: the rate announcement.
    TempBasal {
        rate: f64,
        rate_type: TempBasalRateType,
    },
    /// Second half of a temp basal: the duration announcement.
    TempBasalDuration { duration_minutes: u32 },
    /// Reservoir or cannula prime.
    Prime {
        #[serde(default)]
        amount: f64,
    },
    #[serde(skip_deserializing)]
    Unknown { name: String },
}

const fn default_bolus_type() -> BolusType {
    BolusType::Normal
}

const KNOWN_TYPES: &[&str] = &[
    "bolus_normal",
    "suspend",
    "resume",
    "temp_basal",
    "temp_basal_duration",
    "prime",
];

impl PumpEvent {
    /// Decodes a payload of the form `{"type": "...", ...}`.
    ///
    /// Unrecognized `type` values decode to [`PumpEvent::Unknown`] rather than
    /// failing, so newer device variants never break a batch.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DecodeError> {
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if !KNOWN_TYPES.contains(&kind.as_str()) {
            return Ok(Self::Unknown { name: kind });
        }

        let event: Self =
            serde_json::from_value(value).map_err(|source| DecodeError::Json { kind, source })?;
        event.validate()
    }

    fn validate(self) -> Result<Self, DecodeError> {
        match &self {
            Self::BolusNormal { amount, .. } | Self::Prime { amount } => {
                validate_amount("amount", *amount)?;
            }
            Self::TempBasal { rate, .. } => {
                validate_amount("rate", *rate)?;
            }
            Self::Suspend | Self::Resume | Self::TempBasalDuration { .. } | Self::Unknown { .. } => {}
        }
        Ok(self)
    }
}

impl fmt::Display for PumpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BolusNormal {
                amount,
                bolus_type,
                duration_minutes,
            } => write!(
                f,
                "BolusNormal(amount: {amount}, type: {bolus_type:?}, duration: {duration_minutes}m)"
            ),
            Self::Suspend => write!(f, "Suspend"),
            Self::Resume => write!(f, "Resume"),
            Self::TempBasal { rate, rate_type } => {
                write!(f, "TempBasal(rate: {rate}, type: {rate_type:?})")
            }
            Self::TempBasalDuration { duration_minutes } => {
                write!(f, "TempBasalDuration(duration: {duration_minutes}m)")
            }
            Self::Prime { amount } => write!(f, "Prime(amount: {amount})"),
            Self::Unknown { name } => write!(f, "Unknown({name})"),
        }
    }
}

/// A timestamped record from the device history, as produced by a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub event: PumpEvent,
    /// Whether the device may still revise this record.
    pub is_mutable: bool,
    /// The undecoded payload bytes.
    pub raw: Vec<u8>,
}

impl HistoryRecord {
    /// Creates an immutable record with no raw payload.
    pub const fn new(timestamp: DateTime<Utc>, event: PumpEvent) -> Self {
        Self {
            timestamp,
            event,
            is_mutable: false,
            raw: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_raw(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw = raw.into();
        self
    }

    #[must_use]
    pub fn mutable(mut self, is_mutable: bool) -> Self {
        self.is_mutable = is_mutable;
        self
    }
}
