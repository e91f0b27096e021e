//! Observation Runner
//!
//! Executes a single behavior under crash isolation and wall-clock timing,
//! capturing either the produced value or the failure. `observe` never
//! fails itself: it is the boundary that keeps one behavior's failure from
//! aborting the whole run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::failure::{BoxError, Failure};
use crate::timing::Timer;

/// A zero-argument, possibly failing operation producing a value.
pub type Behavior<T> = Arc<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// Transforms a raw value into a publish-friendly representation.
pub type Cleaner<T, C> = Arc<dyn Fn(&T) -> C + Send + Sync>;

/// What one behavior execution produced: a value or a failure, never both.
pub enum Outcome<T> {
    /// The behavior returned a value.
    Value(T),
    /// The behavior failed; the record is kept for comparison and reporting.
    Failed(Failure),
}

/// The timed record of executing one behavior.
///
/// The cleaned value is computed lazily on first access and only exists
/// when the outcome is a value and a cleaner was configured.
pub struct Observation<T, C = T> {
    name: String,
    outcome: Outcome<T>,
    duration: Duration,
    cleaner: Option<Cleaner<T, C>>,
    cleaned: OnceLock<Option<C>>,
}

impl<T, C> Observation<T, C> {
    /// Behavior name; the control observation always uses the reserved name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Wall-clock duration of the execution.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The raw outcome.
    pub fn outcome(&self) -> &Outcome<T> {
        &self.outcome
    }

    /// The produced value, when the behavior succeeded.
    pub fn value(&self) -> Option<&T> {
        match &self.outcome {
            Outcome::Value(v) => Some(v),
            Outcome::Failed(_) => None,
        }
    }

    /// The captured failure, when the behavior failed.
    pub fn failure(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Value(_) => None,
            Outcome::Failed(f) => Some(f),
        }
    }

    /// Whether the behavior failed.
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// The cleaned value, computed on first access through the configured
    /// cleaner. `None` when the behavior failed or no cleaner was set.
    pub fn cleaned(&self) -> Option<&C> {
        self.cleaned
            .get_or_init(|| match (&self.outcome, &self.cleaner) {
                (Outcome::Value(v), Some(clean)) => Some(clean(v)),
                _ => None,
            })
            .as_ref()
    }

    /// Record a behavior that was still running when the drain window
    /// closed. Keeps report cardinality equal to the configured behavior
    /// count.
    pub fn timed_out(name: impl Into<String>, window: Duration) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Failed(Failure::timed_out(window)),
            duration: window,
            cleaner: None,
            cleaned: OnceLock::new(),
        }
    }
}

impl<T, C> fmt::Debug for Observation<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &self.outcome {
            Outcome::Value(_) => "value",
            Outcome::Failed(failure) => match failure.kind() {
                crate::FailureKind::Error => "error",
                crate::FailureKind::Panic => "panic",
                crate::FailureKind::Timeout => "timeout",
            },
        };
        f.debug_struct("Observation")
            .field("name", &self.name)
            .field("status", &status)
            .field("duration", &self.duration)
            .finish()
    }
}

/// Execute one behavior, timing it and capturing its value or failure.
///
/// Panics raised by the behavior are caught and recorded as failures; the
/// elapsed duration is recorded regardless of outcome.
pub fn observe<T, C>(
    name: impl Into<String>,
    behavior: &Behavior<T>,
    cleaner: Option<Cleaner<T, C>>,
) -> Observation<T, C> {
    let timer = Timer::start();
    let outcome = match catch_unwind(AssertUnwindSafe(|| behavior())) {
        Ok(Ok(value)) => Outcome::Value(value),
        Ok(Err(err)) => Outcome::Failed(Failure::from_error(err)),
        Err(payload) => Outcome::Failed(Failure::from_panic(payload)),
    };
    Observation {
        name: name.into(),
        outcome,
        duration: timer.elapsed(),
        cleaner,
        cleaned: OnceLock::new(),
    }
}
