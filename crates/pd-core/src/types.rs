//! Core type definitions with validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for core types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// A dose amount or rate was NaN or infinite.
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    /// A dose amount or rate was negative.
    #[error("{field} cannot be negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    /// Invalid dose unit value.
    #[error("invalid dose unit: {value}")]
    InvalidDoseUnit { value: String },
}

/// Checks that an amount read from the device is usable as a dose quantity.
pub fn validate_amount(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field, value });
    }
    if value < 0.0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(value)
}

/// Unit of a dose quantity.
///
/// Distinguishes one-shot quantities from rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseUnit {
    /// Insulin units delivered at once.
    Units,
    /// Insulin units per hour.
    UnitsPerHour,
}

impl DoseUnit {
    /// String representation for database storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Units => "units",
            Self::UnitsPerHour => "units_per_hour",
        }
    }
}

impl fmt::Display for DoseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DoseUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "units" => Ok(Self::Units),
            "units_per_hour" => Ok(Self::UnitsPerHour),
            _ => Err(ValidationError::InvalidDoseUnit {
                value: s.to_string(),
            }),
        }
    }
}

/// The kinds of dose a pump event can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoseKind {
    Bolus,
    TempBasal,
    Suspend,
    Resume,
}

/// Bolus delivery sub-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BolusType {
    /// Delivered immediately.
    Normal,
    /// Delivered evenly over the declared duration (also called extended).
    #[serde(alias = "extended")]
    Square,
}

/// How a temp basal rate is expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempBasalRateType {
    /// Rate in units per hour.
    Absolute,
    /// Rate as a percentage of the scheduled basal.
    Percent,
}

/// Stored type of a persisted pump event.
///
/// Single source of truth for the type strings written by the persistence layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PumpEventType {
    Bolus,
    TempBasal,
    Suspend,
    Resume,
    Prime,
}

impl From<DoseKind> for PumpEventType {
    fn from(kind: DoseKind) -> Self {
        match kind {
            DoseKind::Bolus => Self::Bolus,
            DoseKind::TempBasal => Self::TempBasal,
            DoseKind::Suspend => Self::Suspend,
            DoseKind::Resume => Self::Resume,
        }
    }
}

impl fmt::Display for PumpEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bolus => "bolus",
            Self::TempBasal => "temp_basal",
            Self::Suspend => "suspend",
            Self::Resume => "resume",
            Self::Prime => "prime",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PumpEventType {
    type Err = UnknownPumpEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bolus" => Ok(Self::Bolus),
            "temp_basal" => Ok(Self::TempBasal),
            "suspend" => Ok(Self::Suspend),
            "resume" => Ok(Self::Resume),
            "prime" => Ok(Self::Prime),
            _ => Err(UnknownPumpEventType(s.to_string())),
        }
    }
}

impl Serialize for PumpEventType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PumpEventType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown pump event type strings.
#[derive(Debug, Clone)]
pub struct UnknownPumpEventType(String);

impl fmt::Display for UnknownPumpEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown pump event type: {}", self.0)
    }
}

impl std::error::Error for UnknownPumpEventType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_event_type_roundtrip_all_variants() {
        let variants = [
            PumpEventType::Bolus,
            PumpEventType::TempBasal,
            PumpEventType::Suspend,
            PumpEventType::Resume,
            PumpEventType::Prime,
        ];

        for variant in &variants {
            let s = variant.to_string();
            let parsed: PumpEventType = s.parse().expect("should parse");
            assert_eq!(parsed, *variant, "roundtrip failed for {variant:?}");
        }
    }

    #[test]
    fn unknown_pump_event_type_errors() {
        let err = "basal_profile".parse::<PumpEventType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown pump event type: basal_profile");
    }

    #[test]
    fn dose_kind_maps_to_stored_type() {
        assert_eq!(PumpEventType::from(DoseKind::Bolus), PumpEventType::Bolus);
        assert_eq!(
            PumpEventType::from(DoseKind::TempBasal),
            PumpEventType::TempBasal
        );
        assert_eq!(PumpEventType::from(DoseKind::Suspend), PumpEventType::Suspend);
        assert_eq!(PumpEventType::from(DoseKind::Resume), PumpEventType::Resume);
    }

    #[test]
    fn dose_unit_from_str() {
        assert_eq!("units".parse::<DoseUnit>().unwrap(), DoseUnit::Units);
        assert_eq!(
            "units_per_hour".parse::<DoseUnit>().unwrap(),
            DoseUnit::UnitsPerHour
        );
        assert!("mg".parse::<DoseUnit>().is_err());
    }

    #[test]
    fn dose_unit_serde_matches_as_str() {
        let json = serde_json::to_string(&DoseUnit::UnitsPerHour).unwrap();
        assert_eq!(json, format!("\"{}\"", DoseUnit::UnitsPerHour.as_str()));
    }

    #[test]
    fn bolus_type_accepts_extended_alias() {
        let parsed: BolusType = serde_json::from_str("\"extended\"").unwrap();
        assert_eq!(parsed, BolusType::Square);
    }

    #[test]
    fn validate_amount_rejects_bad_values() {
        assert!(validate_amount("amount", 1.5).is_ok());
        assert!(validate_amount("amount", 0.0).is_ok());
        assert_eq!(
            validate_amount("amount", -0.1),
            Err(ValidationError::Negative {
                field: "amount",
                value: -0.1
            })
        );
        assert!(matches!(
            validate_amount("rate", f64::NAN),
            Err(ValidationError::NotFinite { field: "rate", .. })
        ));
        assert!(validate_amount("rate", f64::INFINITY).is_err());
    }
}
