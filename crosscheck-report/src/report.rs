//! Run Reports
//!
//! A `Report` is the immutable snapshot of one experiment run: the control
//! observation, every candidate observation, and the partition of
//! candidates into mismatched and ignored sets. Built fresh per run and
//! discarded after publishing.

use std::collections::BTreeMap;
use std::fmt;

use crosscheck_core::{
    Comparator, FailureHandler, IgnoreRule, Observation, OperationError, equivalent,
    should_ignore,
};
use serde_json::Value;

/// Immutable record of one experiment run.
///
/// Invariants: the mismatched and ignored sets are disjoint; every
/// candidate not equivalent to the control lands in exactly one of them;
/// there is exactly one observation per configured behavior.
pub struct Report<T, C = T> {
    experiment: String,
    control: Observation<T, C>,
    candidates: Vec<Observation<T, C>>,
    mismatched: Vec<usize>,
    ignored: Vec<usize>,
    context: BTreeMap<String, Value>,
}

impl<T, C> Report<T, C> {
    /// Partition candidate observations against the control and assemble
    /// the report.
    ///
    /// Fails only when the comparison engine or ignore evaluator routes an
    /// error that the failure handler propagates.
    pub fn assemble(
        experiment: impl Into<String>,
        control: Observation<T, C>,
        candidates: Vec<Observation<T, C>>,
        comparator: &Comparator<T>,
        ignores: &[IgnoreRule<T>],
        handler: &FailureHandler,
        context: BTreeMap<String, Value>,
    ) -> Result<Self, OperationError> {
        let mut mismatched = Vec::new();
        let mut ignored = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            if !equivalent(&control, candidate, comparator, handler)? {
                if should_ignore(&control, candidate, ignores, handler)? {
                    ignored.push(index);
                } else {
                    mismatched.push(index);
                }
            }
        }
        Ok(Self {
            experiment: experiment.into(),
            control,
            candidates,
            mismatched,
            ignored,
            context,
        })
    }

    /// Name of the experiment this run belongs to.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// The control observation.
    pub fn control(&self) -> &Observation<T, C> {
        &self.control
    }

    /// All non-control observations.
    pub fn candidates(&self) -> &[Observation<T, C>] {
        &self.candidates
    }

    /// Every observation of the run, control first.
    pub fn observations(&self) -> impl Iterator<Item = &Observation<T, C>> {
        std::iter::once(&self.control).chain(self.candidates.iter())
    }

    /// Candidates not equivalent to the control and not ignored.
    pub fn mismatched(&self) -> impl Iterator<Item = &Observation<T, C>> {
        self.mismatched.iter().map(|&i| &self.candidates[i])
    }

    /// Non-equivalent candidates suppressed by an ignore rule. Excluded
    /// from mismatch reporting, retained for observability.
    pub fn ignored(&self) -> impl Iterator<Item = &Observation<T, C>> {
        self.ignored.iter().map(|&i| &self.candidates[i])
    }

    /// Whether every candidate matched the control (ignored mismatches do
    /// not count against this).
    pub fn is_matched(&self) -> bool {
        self.mismatched.is_empty()
    }

    /// Whether any candidate mismatched the control without being ignored.
    pub fn is_mismatched(&self) -> bool {
        !self.is_matched()
    }

    /// Context data supplied to the experiment for publishing.
    pub fn context(&self) -> &BTreeMap<String, Value> {
        &self.context
    }

    pub(crate) fn is_index_mismatched(&self, index: usize) -> bool {
        self.mismatched.contains(&index)
    }

    pub(crate) fn is_index_ignored(&self, index: usize) -> bool {
        self.ignored.contains(&index)
    }
}

impl<T, C> fmt::Debug for Report<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("experiment", &self.experiment)
            .field("candidates", &self.candidates.len())
            .field("mismatched", &self.mismatched.len())
            .field("ignored", &self.ignored.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crosscheck_core::{Behavior, default_comparator, fail_fast, observe};
    use std::sync::Arc;

    fn value_obs(name: &str, value: i32) -> Observation<i32> {
        let behavior: Behavior<i32> = Arc::new(move || Ok(value));
        observe(name, &behavior, None)
    }

    fn failed_obs(name: &str, message: &'static str) -> Observation<i32> {
        let behavior: Behavior<i32> = Arc::new(move || Err(message.into()));
        observe(name, &behavior, None)
    }

    fn assemble(
        control: Observation<i32>,
        candidates: Vec<Observation<i32>>,
        ignores: &[IgnoreRule<i32>],
    ) -> Report<i32> {
        Report::assemble(
            "partition",
            control,
            candidates,
            &default_comparator(),
            ignores,
            &fail_fast(),
            BTreeMap::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_all_matching_candidates() {
        let report = assemble(
            value_obs("control", 7),
            vec![value_obs("a", 7), value_obs("b", 7)],
            &[],
        );
        assert!(report.is_matched());
        assert_eq!(report.candidates().len(), 2);
        assert_eq!(report.mismatched().count(), 0);
        assert_eq!(report.observations().count(), 3);
    }

    #[test]
    fn test_mismatched_candidate_is_partitioned() {
        let report = assemble(
            value_obs("control", 7),
            vec![value_obs("good", 7), value_obs("bad", 9)],
            &[],
        );
        assert!(report.is_mismatched());
        let names: Vec<&str> = report.mismatched().map(|o| o.name()).collect();
        assert_eq!(names, vec!["bad"]);
        assert_eq!(report.ignored().count(), 0);
    }

    #[test]
    fn test_ignored_candidate_leaves_run_matched() {
        let close_enough: IgnoreRule<i32> = Arc::new(|a, b| {
            Ok(matches!((a, b), (Some(a), Some(b)) if (a - b).abs() <= 2))
        });
        let report = assemble(
            value_obs("control", 7),
            vec![value_obs("near", 8)],
            &[close_enough],
        );
        assert!(report.is_matched());
        assert_eq!(report.mismatched().count(), 0);
        let names: Vec<&str> = report.ignored().map(|o| o.name()).collect();
        assert_eq!(names, vec!["near"]);
    }

    #[test]
    fn test_mismatched_and_ignored_are_disjoint() {
        let close_enough: IgnoreRule<i32> = Arc::new(|a, b| {
            Ok(matches!((a, b), (Some(a), Some(b)) if (a - b).abs() <= 2))
        });
        let report = assemble(
            value_obs("control", 7),
            vec![value_obs("near", 8), value_obs("far", 100)],
            &[close_enough],
        );
        assert!(report.is_mismatched());
        let mismatched: Vec<&str> = report.mismatched().map(|o| o.name()).collect();
        let ignored: Vec<&str> = report.ignored().map(|o| o.name()).collect();
        assert_eq!(mismatched, vec!["far"]);
        assert_eq!(ignored, vec!["near"]);
    }

    #[test]
    fn test_failed_candidate_mismatches_successful_control() {
        let report = assemble(
            value_obs("control", 7),
            vec![failed_obs("broken", "down")],
            &[],
        );
        assert!(report.is_mismatched());
    }

    #[test]
    fn test_matching_failures_count_as_matched() {
        let report = assemble(
            failed_obs("control", "shared outage"),
            vec![failed_obs("candidate", "shared outage")],
            &[],
        );
        assert!(report.is_matched());
    }
}
