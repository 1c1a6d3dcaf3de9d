//! Temp basal correlation.
//!
//! The device announces a temp basal as two records: the rate, then the
//! duration. Both carry the same timestamp. The correlator remembers the most
//! recent absolute rate and completes it when a duration record arrives at
//! exactly that instant.
//!
//! A correlator is scan-local. Each normalization pass owns one, so passes over
//! different histories can run concurrently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dose::Dose;

/// What happens to the pending rate after it has been paired with a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingPolicy {
    /// Forget the rate once matched. A second duration record at the same
    /// instant produces no dose.
    #[default]
    ClearOnMatch,
    /// Keep the rate until the next rate record overwrites it. A repeated
    /// duration record at the same instant produces another dose.
    Retain,
}

/// The last absolute temp basal rate seen, waiting for its duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRate {
    /// Units per hour.
    pub rate: f64,
    pub start: DateTime<Utc>,
}

/// Pairs temp basal rate and duration records.
///
/// `pending` is `None` while idle.
#[derive(Debug, Clone, Default)]
pub struct TempBasalCorrelator {
    pending: Option<PendingRate>,
    policy: PendingPolicy,
}

impl TempBasalCorrelator {
    pub const fn new(policy: PendingPolicy) -> Self {
        Self {
            pending: None,
            policy,
        }
    }

    /// Records an absolute rate announcement, replacing any earlier one.
    pub const fn observe_rate(&mut self, start: DateTime<Utc>, rate: f64) {
        self.pending = Some(PendingRate { rate, start });
    }

    /// Attempts to complete the pending rate with a duration announced at `at`.
    ///
    /// Returns `None` when nothing is pending or the pending rate started at a
    /// different instant. A mismatch leaves the pending rate untouched.
    pub fn complete(&mut self, at: DateTime<Utc>, duration_minutes: u32) -> Option<Dose> {
        let pending = self.pending.filter(|pending| pending.start == at)?;
        if self.policy == PendingPolicy::ClearOnMatch {
            self.pending = None;
        }
        Some(Dose::temp_basal(at, pending.rate, duration_minutes))
    }

    pub const fn pending(&self) -> Option<&PendingRate> {
        self.pending.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, TimeZone};

    use crate::types::{DoseKind, DoseUnit};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn matching_duration_completes_temp_basal() {
        let mut correlator = TempBasalCorrelator::default();
        correlator.observe_rate(t0(), 0.75);

        let dose = correlator.complete(t0(), 30).expect("dose");
        assert_eq!(dose.kind, DoseKind::TempBasal);
        assert_eq!(dose.start_time, t0());
        assert_eq!(dose.end_time, t0() + Duration::minutes(30));
        assert_eq!(dose.value(), Some(0.75));
        assert_eq!(dose.unit(), Some(DoseUnit::UnitsPerHour));
    }

    #[test]
    fn duration_without_rate_yields_nothing() {
        let mut correlator = TempBasalCorrelator::default();
        assert!(correlator.complete(t0(), 30).is_none());
    }

    #[test]
    fn mismatched_timestamp_keeps_pending_rate() {
        let mut correlator = TempBasalCorrelator::default();
        correlator.observe_rate(t0(), 1.0);

        let later = t0() + Duration::seconds(1);
        assert!(correlator.complete(later, 30).is_none());
        assert_eq!(correlator.pending().map(|p| p.start), Some(t0()));
        assert!(correlator.complete(t0(), 30).is_some());
    }

    #[test]
    fn newer_rate_overwrites_pending() {
        let mut correlator = TempBasalCorrelator::default();
        correlator.observe_rate(t0(), 1.0);
        let later = t0() + Duration::minutes(5);
        correlator.observe_rate(later, 2.0);

        assert!(correlator.complete(t0(), 30).is_none());
        let dose = correlator.complete(later, 30).expect("dose");
        assert_eq!(dose.value(), Some(2.0));
    }

    #[test]
    fn clear_on_match_consumes_pending_rate() {
        let mut correlator = TempBasalCorrelator::new(PendingPolicy::ClearOnMatch);
        correlator.observe_rate(t0(), 1.0);

        assert!(correlator.complete(t0(), 30).is_some());
        assert!(correlator.pending().is_none());
        assert!(correlator.complete(t0(), 30).is_none());
    }

    #[test]
    fn retain_policy_reuses_pending_rate() {
        let mut correlator = TempBasalCorrelator::new(PendingPolicy::Retain);
        correlator.observe_rate(t0(), 1.0);

        assert!(correlator.complete(t0(), 30).is_some());
        let again = correlator.complete(t0(), 60).expect("second dose");
        assert_eq!(again.end_time, t0() + Duration::minutes(60));
    }

    #[test]
    fn policy_serde_names() {
        let parsed: PendingPolicy = serde_json::from_str("\"retain\"").unwrap();
        assert_eq!(parsed, PendingPolicy::Retain);
        assert_eq!(
            serde_json::to_string(&PendingPolicy::ClearOnMatch).unwrap(),
            "\"clear_on_match\""
        );
    }
}
