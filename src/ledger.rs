//! Append-only record of the attempts made for one guarded call.

use crate::diagnostic::Diagnostic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One attempt: when it started, how long it took, and why it failed
/// (`diagnostic == None` marks success).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Start time, serialized as ISO-8601.
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub diagnostic: Option<Diagnostic>,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Ordered attempt records for one logical call.
///
/// Attempt numbers are assigned on append, so `records()[i].attempt_number`
/// is always `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    records: Vec<AttemptRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next attempt, numbered one past the last record.
    pub fn record(
        &mut self,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        diagnostic: Option<Diagnostic>,
    ) {
        self.records.push(AttemptRecord {
            attempt_number: self.records.len() as u32 + 1,
            timestamp: started_at,
            duration_ms: elapsed.as_millis() as u64,
            diagnostic,
        });
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Diagnostic of the most recent attempt, if it failed. This is what the
    /// next attempt's state carries as `last_diagnostic`.
    pub fn last_diagnostic(&self) -> Option<&Diagnostic> {
        self.records.last().and_then(|r| r.diagnostic.as_ref())
    }

    /// Read-only copy for publishing into an [`ExecutionState`](crate::ExecutionState).
    pub fn snapshot(&self) -> Arc<[AttemptRecord]> {
        Arc::from(self.records.as_slice())
    }

    /// Total time spent across all attempts.
    pub fn total_duration_ms(&self) -> u64 {
        self.records.iter().map(|r| r.duration_ms).sum()
    }

    pub fn into_records(self) -> Vec<AttemptRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::DecodeError;

    fn parse_diag() -> Diagnostic {
        Diagnostic::from_decode(&DecodeError::new("bad", "{"))
    }

    #[test]
    fn test_attempt_numbers_follow_insertion_order() {
        let mut ledger = Ledger::new();
        for _ in 0..3 {
            ledger.record(Utc::now(), Duration::from_millis(5), Some(parse_diag()));
        }
        for (i, record) in ledger.records().iter().enumerate() {
            assert_eq!(record.attempt_number as usize, i + 1);
        }
        assert_eq!(ledger.total_duration_ms(), 15);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut ledger = Ledger::new();
        ledger.record(Utc::now(), Duration::ZERO, Some(parse_diag()));
        let snapshot = ledger.snapshot();
        ledger.record(Utc::now(), Duration::ZERO, None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(ledger.len(), 2);
        assert!(ledger.last_diagnostic().is_none());
        assert!(ledger.records()[1].succeeded());
    }

    #[test]
    fn test_last_diagnostic_tracks_latest_failure() {
        let mut ledger = Ledger::new();
        assert!(ledger.last_diagnostic().is_none());
        ledger.record(Utc::now(), Duration::ZERO, Some(parse_diag()));
        assert_eq!(ledger.last_diagnostic(), Some(&parse_diag()));
    }

    #[test]
    fn test_record_serializes_iso_timestamp() {
        let mut ledger = Ledger::new();
        let started = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        ledger.record(started, Duration::from_millis(42), None);
        let value = serde_json::to_value(&ledger.records()[0]).unwrap();
        assert_eq!(value["attemptNumber"], 1);
        assert_eq!(value["durationMs"], 42);
        assert!(value["timestamp"].as_str().unwrap().starts_with("2026-01-02T03:04:05"));
        assert!(value["diagnostic"].is_null());
    }
}
