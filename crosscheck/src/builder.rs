//! Experiment Builder
//!
//! Fluent assembly of an [`ExperimentConfig`]. Every callback-taking
//! method has an infallible form and a `try_` form for callbacks that can
//! fail; failures from the `try_` forms flow through the experiment's
//! failure handler or are captured as behavior failures.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crosscheck_core::{
    Behavior, BoxError, Cleaner, Comparator, FailureHandler, IgnoreRule, default_comparator,
    fail_fast,
};
use crosscheck_report::{LogPublisher, Publisher};
use serde_json::Value;

use crate::config::{
    BeforeRun, CONTROL_NAME, DEFAULT_CANDIDATE_NAME, ExperimentConfig, Predicate,
};
use crate::error::ConfigError;

fn always_true() -> Predicate {
    Arc::new(|| Ok(true))
}

/// Builder for an [`ExperimentConfig`].
pub struct Experiment<T, C = T> {
    name: String,
    control: Option<Behavior<T>>,
    candidates: Vec<(String, Behavior<T>)>,
    comparator: Comparator<T>,
    ignores: Vec<IgnoreRule<T>>,
    concurrency: usize,
    enabled: Predicate,
    run_if: Predicate,
    before_run: Option<BeforeRun>,
    handler: FailureHandler,
    throw_on_mismatch: bool,
    cleaner: Option<Cleaner<T, C>>,
    context: BTreeMap<String, Value>,
    publisher: Arc<dyn Publisher<T, C>>,
    shuffle_seed: Option<u64>,
}

impl<T: PartialEq, C> Experiment<T, C> {
    /// Start a new experiment using structural equality to compare values.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_comparator_arc(name, default_comparator())
    }
}

impl<T, C> Experiment<T, C> {
    /// Start a new experiment with a custom value comparator; use this
    /// when the payload type has no meaningful `PartialEq`.
    pub fn with_comparator<F>(name: impl Into<String>, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        Self::with_comparator_arc(name, Arc::new(move |a, b| Ok(comparator(a, b))))
    }

    fn with_comparator_arc(name: impl Into<String>, comparator: Comparator<T>) -> Self {
        Self {
            name: name.into(),
            control: None,
            candidates: Vec::new(),
            comparator,
            ignores: Vec::new(),
            concurrency: 1,
            enabled: always_true(),
            run_if: always_true(),
            before_run: None,
            handler: fail_fast(),
            throw_on_mismatch: false,
            cleaner: None,
            context: BTreeMap::new(),
            publisher: Arc::new(LogPublisher),
            shuffle_seed: None,
        }
    }

    /// The trusted behavior whose value is always returned to the caller.
    pub fn control<F>(mut self, behavior: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.control = Some(Arc::new(move || Ok(behavior())));
        self
    }

    /// Fallible form of [`Experiment::control`].
    pub fn try_control<F>(mut self, behavior: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.control = Some(Arc::new(behavior));
        self
    }

    /// Add a named candidate behavior to validate against the control.
    pub fn candidate<F>(mut self, name: impl Into<String>, behavior: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.candidates
            .push((name.into(), Arc::new(move || Ok(behavior()))));
        self
    }

    /// Fallible form of [`Experiment::candidate`].
    pub fn try_candidate<F>(mut self, name: impl Into<String>, behavior: F) -> Self
    where
        F: Fn() -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.candidates.push((name.into(), Arc::new(behavior)));
        self
    }

    /// Add a candidate under the default name. Adding two default
    /// candidates is a duplicate-name configuration error.
    pub fn attempt<F>(self, behavior: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.candidate(DEFAULT_CANDIDATE_NAME, behavior)
    }

    /// Replace the value comparator.
    pub fn compare<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.comparator = Arc::new(move |a, b| Ok(comparator(a, b)));
        self
    }

    /// Fallible form of [`Experiment::compare`]; errors route through the
    /// failure handler under the compare tag.
    pub fn try_compare<F>(mut self, comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.comparator = Arc::new(comparator);
        self
    }

    /// Add an ignore rule: a mismatched pair matching any rule is kept out
    /// of the mismatched set. Rules see the optional values of both sides.
    pub fn ignore<F>(mut self, rule: F) -> Self
    where
        F: Fn(Option<&T>, Option<&T>) -> bool + Send + Sync + 'static,
    {
        self.ignores.push(Arc::new(move |a, b| Ok(rule(a, b))));
        self
    }

    /// Fallible form of [`Experiment::ignore`].
    pub fn try_ignore<F>(mut self, rule: F) -> Self
    where
        F: Fn(Option<&T>, Option<&T>) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.ignores.push(Arc::new(rule));
        self
    }

    /// Gate the experiment on an enablement check (sampling, kill switch).
    pub fn enabled<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.enabled = Arc::new(move || Ok(predicate()));
        self
    }

    /// Fallible form of [`Experiment::enabled`].
    pub fn try_enabled<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.enabled = Arc::new(predicate);
        self
    }

    /// Gate the experiment on a per-call condition.
    pub fn run_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.run_if = Arc::new(move || Ok(predicate()));
        self
    }

    /// Fallible form of [`Experiment::run_if`].
    pub fn try_run_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn() -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.run_if = Arc::new(predicate);
        self
    }

    /// Expensive setup run exactly once before behaviors are dispatched.
    /// Its failure propagates uncaught; it is a setup failure, not an
    /// experiment outcome.
    pub fn before_run<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.before_run = Some(Arc::new(hook));
        self
    }

    /// Transform values into a publish-friendly representation. Computed
    /// lazily, only for successful observations.
    pub fn clean<F>(mut self, cleaner: F) -> Self
    where
        F: Fn(&T) -> C + Send + Sync + 'static,
    {
        self.cleaner = Some(Arc::new(cleaner));
        self
    }

    /// Attach context data published with every run report.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Fail the call with a mismatch error when the run mismatches. Forces
    /// synchronous publishing. Intended for test environments.
    pub fn throw_on_mismatch(mut self, throw: bool) -> Self {
        self.throw_on_mismatch = throw;
        self
    }

    /// Route control-plane failures through a custom handler instead of
    /// the fail-fast default.
    pub fn on_failure(mut self, handler: FailureHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Replace the result publisher.
    pub fn publisher(mut self, publisher: impl Publisher<T, C> + 'static) -> Self {
        self.publisher = Arc::new(publisher);
        self
    }

    /// Worker budget for the bounded-concurrent mode. Must be positive.
    pub fn concurrency(mut self, budget: usize) -> Self {
        self.concurrency = budget;
        self
    }

    /// Fix the dispatch-order shuffle for deterministic tests.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.shuffle_seed = Some(seed);
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<ExperimentConfig<T, C>, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        let control = self.control.ok_or(ConfigError::MissingControl)?;
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }
        let mut seen = HashSet::new();
        for (name, _) in &self.candidates {
            if name == CONTROL_NAME {
                return Err(ConfigError::ReservedName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateCandidate(name.clone()));
            }
        }
        Ok(ExperimentConfig {
            name: self.name,
            control,
            candidates: self.candidates,
            comparator: self.comparator,
            ignores: self.ignores,
            concurrency: self.concurrency,
            enabled: self.enabled,
            run_if: self.run_if,
            before_run: self.before_run,
            handler: self.handler,
            throw_on_mismatch: self.throw_on_mismatch,
            cleaner: self.cleaner,
            context: self.context,
            publisher: self.publisher,
            shuffle_seed: self.shuffle_seed,
        })
    }
}
