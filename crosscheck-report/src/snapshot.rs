//! Serializable Report Snapshots
//!
//! A `ReportSnapshot` is the serde-friendly form of a run report: names,
//! durations, outcome statuses, and the publish context. Cleaned values
//! are included only when the cleaned type is serializable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use crosscheck_core::{FailureKind, Observation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::report::Report;

/// Serializable summary of one experiment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSnapshot {
    /// Experiment name.
    pub experiment: String,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
    /// Whether every candidate matched the control.
    pub matched: bool,
    /// One record per observation, control first.
    pub observations: Vec<ObservationRecord>,
    /// Context data supplied to the experiment.
    pub context: BTreeMap<String, Value>,
}

/// Serializable summary of one observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    /// Behavior name.
    pub name: String,
    /// Whether this is the control observation.
    pub control: bool,
    /// Execution duration in nanoseconds.
    pub duration_ns: u64,
    /// Outcome status.
    pub status: ObservationStatus,
    /// Failure message, when the behavior failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Cleaned value, when available and serializable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Whether this candidate mismatched the control.
    pub mismatched: bool,
    /// Whether this candidate's mismatch was suppressed by an ignore rule.
    pub ignored: bool,
}

/// Outcome status of a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    /// The behavior produced a value.
    Ok,
    /// The behavior returned an error.
    Error,
    /// The behavior panicked.
    Panic,
    /// The behavior ran past the drain window.
    Timeout,
}

impl From<FailureKind> for ObservationStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Error => ObservationStatus::Error,
            FailureKind::Panic => ObservationStatus::Panic,
            FailureKind::Timeout => ObservationStatus::Timeout,
        }
    }
}

fn record<T, C>(
    observation: &Observation<T, C>,
    control: bool,
    mismatched: bool,
    ignored: bool,
    value: Option<Value>,
) -> ObservationRecord {
    let (status, message) = match observation.failure() {
        Some(failure) => (failure.kind().into(), Some(failure.message().to_string())),
        None => (ObservationStatus::Ok, None),
    };
    ObservationRecord {
        name: observation.name().to_string(),
        control,
        duration_ns: observation.duration().as_nanos() as u64,
        status,
        message,
        value,
        mismatched,
        ignored,
    }
}

impl<T, C> Report<T, C> {
    /// Snapshot without cleaned values, available for any payload type.
    pub fn snapshot(&self) -> ReportSnapshot {
        self.snapshot_inner(|_| None)
    }

    fn snapshot_inner(
        &self,
        value_of: impl Fn(&Observation<T, C>) -> Option<Value>,
    ) -> ReportSnapshot {
        let mut observations =
            vec![record(self.control(), true, false, false, value_of(self.control()))];
        for (index, candidate) in self.candidates().iter().enumerate() {
            observations.push(record(
                candidate,
                false,
                self.is_index_mismatched(index),
                self.is_index_ignored(index),
                value_of(candidate),
            ));
        }
        ReportSnapshot {
            experiment: self.experiment().to_string(),
            timestamp: Utc::now(),
            matched: self.is_matched(),
            observations,
            context: self.context().clone(),
        }
    }
}

impl<T, C: Serialize> Report<T, C> {
    /// Snapshot including cleaned values serialized as JSON.
    pub fn snapshot_with_values(&self) -> ReportSnapshot {
        self.snapshot_inner(|observation| {
            observation
                .cleaned()
                .and_then(|v| serde_json::to_value(v).ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::{Behavior, Cleaner, default_comparator, fail_fast, observe};
    use std::sync::Arc;

    fn report_with_failure() -> Report<i32, String> {
        let cleaner: Cleaner<i32, String> = Arc::new(|v| format!("cleaned-{v}"));
        let ok: Behavior<i32> = Arc::new(|| Ok(7));
        let bad: Behavior<i32> = Arc::new(|| Err("storage offline".into()));
        let control = observe("control", &ok, Some(Arc::clone(&cleaner)));
        let candidate = observe("rewrite", &bad, Some(cleaner));
        let mut context = BTreeMap::new();
        context.insert("region".to_string(), Value::from("eu-west-1"));
        Report::assemble(
            "storage-rewrite",
            control,
            vec![candidate],
            &default_comparator(),
            &[],
            &fail_fast(),
            context,
        )
        .unwrap()
    }

    #[test]
    fn test_snapshot_shape() {
        let snapshot = report_with_failure().snapshot();
        assert_eq!(snapshot.experiment, "storage-rewrite");
        assert!(!snapshot.matched);
        assert_eq!(snapshot.observations.len(), 2);

        let control = &snapshot.observations[0];
        assert!(control.control);
        assert_eq!(control.status, ObservationStatus::Ok);
        assert!(control.message.is_none());
        assert!(!control.mismatched);

        let candidate = &snapshot.observations[1];
        assert!(!candidate.control);
        assert_eq!(candidate.status, ObservationStatus::Error);
        assert_eq!(candidate.message.as_deref(), Some("storage offline"));
        assert!(candidate.mismatched);
        assert!(!candidate.ignored);
    }

    #[test]
    fn test_snapshot_with_values_uses_cleaner() {
        let snapshot = report_with_failure().snapshot_with_values();
        assert_eq!(
            snapshot.observations[0].value,
            Some(Value::from("cleaned-7"))
        );
        // Failed candidate has no value to clean.
        assert!(snapshot.observations[1].value.is_none());
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let snapshot = report_with_failure().snapshot_with_values();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"experiment\":\"storage-rewrite\""));
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"region\":\"eu-west-1\""));

        let parsed: ReportSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.observations.len(), 2);
    }
}
