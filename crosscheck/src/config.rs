//! Experiment Configuration
//!
//! The immutable value produced by the `Experiment` builder. Read-only
//! after construction and safe to share with worker threads; all mutable
//! state in a run (shuffled dispatch order, observation slots) is local to
//! that run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crosscheck_core::{Behavior, BoxError, Cleaner, Comparator, FailureHandler, IgnoreRule};
use crosscheck_report::Publisher;
use serde_json::Value;

/// Reserved name of the control observation. No candidate may use it.
pub const CONTROL_NAME: &str = "control";

/// Name given to a candidate added without an explicit name.
pub const DEFAULT_CANDIDATE_NAME: &str = "candidate";

/// Fixed window granted to outstanding candidates once the control has
/// resolved in concurrent mode.
pub(crate) const DRAIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Zero-argument gating predicate.
pub type Predicate = Arc<dyn Fn() -> Result<bool, BoxError> + Send + Sync>;

/// Setup hook invoked once before the behaviors are dispatched.
pub type BeforeRun = Arc<dyn Fn() -> Result<(), BoxError> + Send + Sync>;

/// Immutable definition of one experiment.
///
/// Built by [`crate::Experiment::build`]; validation (duplicate candidate
/// names, reserved names, a zero concurrency budget) happens there, never
/// at run time.
pub struct ExperimentConfig<T, C = T> {
    pub(crate) name: String,
    pub(crate) control: Behavior<T>,
    pub(crate) candidates: Vec<(String, Behavior<T>)>,
    pub(crate) comparator: Comparator<T>,
    pub(crate) ignores: Vec<IgnoreRule<T>>,
    pub(crate) concurrency: usize,
    pub(crate) enabled: Predicate,
    pub(crate) run_if: Predicate,
    pub(crate) before_run: Option<BeforeRun>,
    pub(crate) handler: FailureHandler,
    pub(crate) throw_on_mismatch: bool,
    pub(crate) cleaner: Option<Cleaner<T, C>>,
    pub(crate) context: BTreeMap<String, Value>,
    pub(crate) publisher: Arc<dyn Publisher<T, C>>,
    pub(crate) shuffle_seed: Option<u64>,
}

impl<T, C> ExperimentConfig<T, C> {
    /// Experiment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured candidate names, in insertion order.
    pub fn candidate_names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|(name, _)| name.as_str())
    }

    /// Concurrency budget used by the bounded-concurrent mode.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Whether a mismatched run fails the call with a mismatch error.
    pub fn throw_on_mismatch(&self) -> bool {
        self.throw_on_mismatch
    }
}

impl<T, C> std::fmt::Debug for ExperimentConfig<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentConfig")
            .field("name", &self.name)
            .field("candidates", &self.candidates.len())
            .field("concurrency", &self.concurrency)
            .field("throw_on_mismatch", &self.throw_on_mismatch)
            .finish()
    }
}
