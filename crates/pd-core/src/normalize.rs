//! Normalization of pump history into storable pump events.
//!
//! # Algorithm Summary
//!
//! 1. Classify each record's variant
//! 2. Feed temp basal rate and duration records through a scan-local
//!    [`TempBasalCorrelator`]
//! 3. Build a dose for boluses, suspends, resumes and completed temp basals
//! 4. Emit exactly one [`NewPumpEvent`] per record, in input order
//!
//! The output batch is handed to a [`PumpEventSink`] in a single call.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classify::{EventClass, classify};
use crate::correlate::{PendingPolicy, TempBasalCorrelator};
use crate::dose::Dose;
use crate::event::HistoryRecord;
use crate::types::PumpEventType;

/// A normalized pump event ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPumpEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dose: Option<Dose>,
    pub is_mutable: bool,
    /// Undecoded device bytes, kept so the sink can deduplicate.
    #[serde(with = "hex::serde")]
    pub raw: Vec<u8>,
    /// Display title derived from the source variant. Not used for matching.
    pub title: String,
    /// Explicit type for records without a dose. Only set for primes.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<PumpEventType>,
}

impl NewPumpEvent {
    /// The type this event is stored under.
    ///
    /// `None` means an untyped raw marker, which is still persisted.
    pub fn stored_type(&self) -> Option<PumpEventType> {
        self.event_type
            .or_else(|| self.dose.as_ref().map(|dose| dose.kind.into()))
    }
}

/// Destination for normalized pump events.
///
/// Implementations own deduplication and durable storage.
pub trait PumpEventSink {
    type Error: std::error::Error;

    /// Stores a batch of events, returning how many were newly written.
    fn add_pump_events(&mut self, events: Vec<NewPumpEvent>) -> Result<usize, Self::Error>;
}

/// Normalizes history records with the default pending-rate policy.
pub fn normalize(records: &[HistoryRecord]) -> Vec<NewPumpEvent> {
    normalize_with(records, PendingPolicy::default())
}

/// Normalizes history records into one pump event per record.
pub fn normalize_with(records: &[HistoryRecord], policy: PendingPolicy) -> Vec<NewPumpEvent> {
    let mut correlator = TempBasalCorrelator::new(policy);
    let events: Vec<NewPumpEvent> = records
        .iter()
        .map(|record| emit(record, &mut correlator))
        .collect();

    tracing::debug!(
        records = records.len(),
        doses = events.iter().filter(|e| e.dose.is_some()).count(),
        "normalized pump history"
    );
    events
}

/// Normalizes `records` and submits the batch to `sink`.
///
/// Sink errors are returned unchanged.
pub fn add_history<S>(
    sink: &mut S,
    records: &[HistoryRecord],
    policy: PendingPolicy,
) -> Result<usize, S::Error>
where
    S: PumpEventSink + ?Sized,
{
    sink.add_pump_events(normalize_with(records, policy))
}

fn emit(record: &HistoryRecord, correlator: &mut TempBasalCorrelator) -> NewPumpEvent {
    let at = record.timestamp;
    let mut event_type = None;

    let dose = match classify(&record.event) {
        EventClass::Bolus {
            bolus_type,
            amount,
            duration_minutes,
        } => Some(Dose::bolus(at, bolus_type, amount, duration_minutes)),
        EventClass::Suspend => Some(Dose::suspend(at)),
        EventClass::Resume => Some(Dose::resume(at)),
        EventClass::RateChange { rate } => {
            correlator.observe_rate(at, rate);
            None
        }
        EventClass::DurationChange { duration_minutes } => {
            let dose = correlator.complete(at, duration_minutes);
            if dose.is_none() {
                tracing::trace!(timestamp = %at, "temp basal duration has no matching rate");
            }
            dose
        }
        EventClass::Prime => {
            event_type = Some(PumpEventType::Prime);
            None
        }
        EventClass::IgnoredRateChange | EventClass::Unrecognized => None,
    };

    NewPumpEvent {
        timestamp: at,
        dose,
        is_mutable: record.is_mutable,
        raw: record.raw.clone(),
        title: record.event.to_string(),
        event_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use chrono::{Duration, TimeZone};

    use crate::event::PumpEvent;
    use crate::types::{BolusType, DoseKind, DoseUnit, TempBasalRateType};

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn record(minute: i64, event: PumpEvent) -> HistoryRecord {
        HistoryRecord::new(t(minute), event)
    }

    fn rate(minute: i64, rate: f64) -> HistoryRecord {
        record(
            minute,
            PumpEvent::TempBasal {
                rate,
                rate_type: TempBasalRateType::Absolute,
            },
        )
    }

    fn duration(minute: i64, duration_minutes: u32) -> HistoryRecord {
        record(minute, PumpEvent::TempBasalDuration { duration_minutes })
    }

    fn mixed_history() -> Vec<HistoryRecord> {
        vec![
            record(
                0,
                PumpEvent::BolusNormal {
                    amount: 2.0,
                    bolus_type: BolusType::Normal,
                    duration_minutes: 0,
                },
            )
            .with_raw(vec![0x01, 0x14]),
            rate(5, 1.25),
            duration(5, 30),
            record(10, PumpEvent::Suspend),
            record(20, PumpEvent::Resume).mutable(true),
            record(25, PumpEvent::Prime { amount: 0.5 }),
            record(
                30,
                PumpEvent::Unknown {
                    name: "alarm_pump".to_string(),
                },
            )
            .with_raw(vec![0x06, 0x00, 0xff]),
        ]
    }

    #[test]
    fn output_preserves_length_and_order() {
        let history = mixed_history();
        let events = normalize(&history);

        assert_eq!(events.len(), history.len());
        for (event, record) in events.iter().zip(&history) {
            assert_eq!(event.timestamp, record.timestamp);
            assert_eq!(event.title, record.event.to_string());
            assert_eq!(event.raw, record.raw);
            assert_eq!(event.is_mutable, record.is_mutable);
        }
    }

    #[test]
    fn normal_bolus_is_instant_units() {
        let events = normalize(&mixed_history());
        let dose = events[0].dose.as_ref().expect("bolus dose");
        assert_eq!(dose.kind, DoseKind::Bolus);
        assert_eq!(dose.unit(), Some(DoseUnit::Units));
        assert_eq!(dose.value(), Some(2.0));
        assert_eq!(dose.start_time, t(0));
        assert_eq!(dose.end_time, t(0));
    }

    #[test]
    fn square_bolus_is_rate_over_duration() {
        let events = normalize(&[record(
            0,
            PumpEvent::BolusNormal {
                amount: 3.5,
                bolus_type: BolusType::Square,
                duration_minutes: 120,
            },
        )]);
        let dose = events[0].dose.as_ref().expect("bolus dose");
        assert_eq!(dose.unit(), Some(DoseUnit::UnitsPerHour));
        assert_eq!(dose.value(), Some(3.5));
        assert_eq!(dose.start_time, t(0));
        assert_eq!(dose.end_time, t(120));
    }

    #[test]
    fn paired_rate_and_duration_yield_one_temp_basal() {
        let events = normalize(&[rate(5, 1.25), duration(5, 30)]);

        assert!(events[0].dose.is_none());
        assert!(events[0].stored_type().is_none());

        let dose = events[1].dose.as_ref().expect("temp basal");
        assert_eq!(dose.kind, DoseKind::TempBasal);
        assert_eq!(dose.start_time, t(5));
        assert_eq!(dose.end_time, t(35));
        assert_eq!(dose.value(), Some(1.25));
        assert_eq!(dose.unit(), Some(DoseUnit::UnitsPerHour));
        assert_eq!(events[1].stored_type(), Some(PumpEventType::TempBasal));
    }

    #[test]
    fn unpaired_duration_yields_no_dose() {
        let events = normalize(&[duration(5, 30)]);
        assert!(events[0].dose.is_none());

        let events = normalize(&[rate(4, 1.0), duration(5, 30)]);
        assert!(events[1].dose.is_none());
    }

    #[test]
    fn percent_rate_does_not_disturb_correlation() {
        let percent = record(
            5,
            PumpEvent::TempBasal {
                rate: 150.0,
                rate_type: TempBasalRateType::Percent,
            },
        );
        let events = normalize(&[rate(5, 0.5), percent.clone(), duration(5, 60)]);
        assert!(events[1].dose.is_none());
        assert_eq!(
            events[2].dose.as_ref().and_then(Dose::value),
            Some(0.5),
            "percent record must not replace the absolute rate"
        );

        let events = normalize(&[percent, duration(5, 60)]);
        assert!(events.iter().all(|e| e.dose.is_none()));
    }

    #[test]
    fn suspend_and_resume_are_markers() {
        let events = normalize(&mixed_history());

        let suspend = events[3].dose.as_ref().expect("suspend");
        assert_eq!(suspend.kind, DoseKind::Suspend);
        assert_eq!(suspend.start_time, t(10));
        assert!(suspend.quantity.is_none());

        let resume = events[4].dose.as_ref().expect("resume");
        assert_eq!(resume.kind, DoseKind::Resume);
        assert_eq!(resume.start_time, t(20));
        assert!(resume.quantity.is_none());
        assert!(events[4].is_mutable);
    }

    #[test]
    fn prime_carries_explicit_type_only() {
        let events = normalize(&mixed_history());
        assert!(events[5].dose.is_none());
        assert_eq!(events[5].event_type, Some(PumpEventType::Prime));
        assert_eq!(events[5].stored_type(), Some(PumpEventType::Prime));
    }

    #[test]
    fn unknown_record_passes_through_untyped() {
        let events = normalize(&mixed_history());
        let unknown = &events[6];
        assert!(unknown.dose.is_none());
        assert!(unknown.event_type.is_none());
        assert!(unknown.stored_type().is_none());
        assert_eq!(unknown.raw, vec![0x06, 0x00, 0xff]);
        assert_eq!(unknown.timestamp, t(30));
        assert_eq!(unknown.title, "Unknown(alarm_pump)");
    }

    #[test]
    fn repeated_duration_respects_policy() {
        let history = [rate(5, 1.0), duration(5, 30), duration(5, 30)];

        let cleared = normalize_with(&history, PendingPolicy::ClearOnMatch);
        assert!(cleared[1].dose.is_some());
        assert!(cleared[2].dose.is_none());

        let retained = normalize_with(&history, PendingPolicy::Retain);
        assert!(retained[1].dose.is_some());
        assert_eq!(retained[2].dose, retained[1].dose);
    }

    #[test]
    fn normalization_is_idempotent() {
        let history = mixed_history();
        let first = serde_json::to_string(&normalize(&history)).unwrap();
        let second = serde_json::to_string(&normalize(&history)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn serialized_event_uses_hex_raw_and_type_tag() {
        let events = normalize(&mixed_history());
        let prime = serde_json::to_value(&events[5]).unwrap();
        assert_eq!(prime["type"], "prime");
        assert!(prime.get("dose").is_none());

        let bolus = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(bolus["raw"], "0114");
        assert!(bolus.get("type").is_none());
    }

    #[derive(Default)]
    struct VecSink {
        batches: Vec<Vec<NewPumpEvent>>,
    }

    impl PumpEventSink for VecSink {
        type Error = Infallible;

        fn add_pump_events(&mut self, events: Vec<NewPumpEvent>) -> Result<usize, Infallible> {
            let count = events.len();
            self.batches.push(events);
            Ok(count)
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("disk full")]
    struct DiskFull;

    struct FailingSink;

    impl PumpEventSink for FailingSink {
        type Error = DiskFull;

        fn add_pump_events(&mut self, _events: Vec<NewPumpEvent>) -> Result<usize, DiskFull> {
            Err(DiskFull)
        }
    }

    #[test]
    fn add_history_submits_one_batch() {
        let mut sink = VecSink::default();
        let history = mixed_history();
        let written = add_history(&mut sink, &history, PendingPolicy::default()).unwrap();

        assert_eq!(written, history.len());
        assert_eq!(sink.batches.len(), 1);
        assert_eq!(sink.batches[0], normalize(&history));
    }

    #[test]
    fn add_history_propagates_sink_error() {
        let err = add_history(&mut FailingSink, &mixed_history(), PendingPolicy::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
