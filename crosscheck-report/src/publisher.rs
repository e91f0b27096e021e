//! Result Publishers
//!
//! The execution engine hands every completed run report to a `Publisher`.
//! Publisher failures are caught by the engine and routed through the
//! failure handler; they never surface to the experiment caller.

use std::io::Write;
use std::sync::Mutex;

use crosscheck_core::BoxError;
use serde::Serialize;

use crate::report::Report;

/// Consumes a completed run report.
pub trait Publisher<T, C = T>: Send + Sync {
    /// Publish one run report. Errors are routed to the experiment's
    /// failure handler under the publish tag.
    fn publish(&self, report: &Report<T, C>) -> Result<(), BoxError>;
}

/// Default publisher: logs each mismatched observation at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl<T, C> Publisher<T, C> for LogPublisher {
    fn publish(&self, report: &Report<T, C>) -> Result<(), BoxError> {
        for observation in report.mismatched() {
            let outcome = match observation.failure() {
                Some(failure) => failure.to_string(),
                None => "value differed from control".to_string(),
            };
            tracing::debug!(
                experiment = report.experiment(),
                candidate = observation.name(),
                duration_ms = observation.duration().as_millis() as u64,
                outcome = %outcome,
                "candidate mismatched control"
            );
        }
        Ok(())
    }
}

/// Writes one snapshot per run as a JSON line to the wrapped writer.
pub struct JsonLinesPublisher<W> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesPublisher<W> {
    /// Wrap a writer. The writer is shared behind a mutex so publishes
    /// from concurrent runs never interleave within a line.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the inner writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T, C, W> Publisher<T, C> for JsonLinesPublisher<W>
where
    C: Serialize,
    W: Write + Send,
{
    fn publish(&self, report: &Report<T, C>) -> Result<(), BoxError> {
        let snapshot = report.snapshot_with_values();
        let line = serde_json::to_string(&snapshot)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BoxError::from("publisher writer lock poisoned"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::{Behavior, default_comparator, fail_fast, observe};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn simple_report(control_value: i32, candidate_value: i32) -> Report<i32> {
        let control_behavior: Behavior<i32> = Arc::new(move || Ok(control_value));
        let candidate_behavior: Behavior<i32> = Arc::new(move || Ok(candidate_value));
        Report::assemble(
            "publisher-test",
            observe("control", &control_behavior, None),
            vec![observe("candidate", &candidate_behavior, None)],
            &default_comparator(),
            &[],
            &fail_fast(),
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_log_publisher_never_fails() {
        let publisher = LogPublisher;
        assert!(publisher.publish(&simple_report(1, 1)).is_ok());
        assert!(publisher.publish(&simple_report(1, 2)).is_ok());
    }

    #[test]
    fn test_json_lines_publisher_writes_one_line_per_run() {
        let publisher = JsonLinesPublisher::new(Vec::new());
        publisher.publish(&simple_report(1, 1)).unwrap();
        publisher.publish(&simple_report(1, 2)).unwrap();

        let bytes = publisher.into_inner();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["experiment"], "publisher-test");
        assert_eq!(first["matched"], true);

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["matched"], false);
    }
}
