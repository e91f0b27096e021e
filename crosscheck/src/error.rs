//! Experiment Errors
//!
//! Configuration errors are raised when an experiment is built; run errors
//! cover the three ways a call can fail: a propagated control-plane error,
//! the control behavior's own failure, or an explicit mismatch when the
//! experiment is configured to fail loudly.

use std::fmt;

use crosscheck_core::{BoxError, Failure, OperationError};
use crosscheck_report::Report;

/// Rejected experiment configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The experiment name was empty.
    #[error("experiment name must not be empty")]
    EmptyName,
    /// No control behavior was configured.
    #[error("experiment has no control behavior")]
    MissingControl,
    /// Two candidates share a name.
    #[error("duplicate candidate name: {0}")]
    DuplicateCandidate(String),
    /// A candidate used the name reserved for the control observation.
    #[error("candidate name '{0}' is reserved for the control observation")]
    ReservedName(String),
    /// The concurrency budget was zero.
    #[error("concurrency budget must be greater than 0")]
    InvalidConcurrency,
}

/// Raised when an experiment configured to throw on mismatches observes
/// one. Carries the full run report for inspection.
pub struct MismatchError<T, C = T> {
    experiment: String,
    report: Report<T, C>,
}

impl<T, C> MismatchError<T, C> {
    pub(crate) fn new(experiment: String, report: Report<T, C>) -> Self {
        Self { experiment, report }
    }

    /// Name of the experiment that mismatched.
    pub fn experiment(&self) -> &str {
        &self.experiment
    }

    /// The run report, including the mismatched observations.
    pub fn report(&self) -> &Report<T, C> {
        &self.report
    }

    /// Consume the error and take the run report.
    pub fn into_report(self) -> Report<T, C> {
        self.report
    }
}

impl<T, C> fmt::Debug for MismatchError<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MismatchError")
            .field("experiment", &self.experiment)
            .field("mismatched", &self.report.mismatched().count())
            .finish()
    }
}

impl<T, C> fmt::Display for MismatchError<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "experiment '{}' observations mismatched", self.experiment)
    }
}

impl<T, C> std::error::Error for MismatchError<T, C> {}

/// The ways a single experiment run can fail.
pub enum ExperimentError<T, C = T> {
    /// The run mismatched and the experiment is configured to throw.
    Mismatch(MismatchError<T, C>),
    /// The control behavior itself failed; re-raised to the caller.
    Control(Failure),
    /// A control-plane error the failure handler chose to propagate.
    Operation(OperationError),
    /// The before-run hook failed; setup failures propagate uncaught.
    Setup(BoxError),
}

impl<T, C> fmt::Debug for ExperimentError<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::Mismatch(e) => f.debug_tuple("Mismatch").field(e).finish(),
            ExperimentError::Control(e) => f.debug_tuple("Control").field(e).finish(),
            ExperimentError::Operation(e) => f.debug_tuple("Operation").field(e).finish(),
            ExperimentError::Setup(e) => f.debug_tuple("Setup").field(e).finish(),
        }
    }
}

impl<T, C> fmt::Display for ExperimentError<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::Mismatch(e) => write!(f, "{e}"),
            ExperimentError::Control(e) => write!(f, "{e}"),
            ExperimentError::Operation(e) => write!(f, "{e}"),
            ExperimentError::Setup(e) => write!(f, "before-run hook failed: {e}"),
        }
    }
}

impl<T, C> std::error::Error for ExperimentError<T, C> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExperimentError::Mismatch(_) => None,
            ExperimentError::Control(e) => std::error::Error::source(e),
            ExperimentError::Operation(e) => std::error::Error::source(e),
            ExperimentError::Setup(e) => Some(&**e),
        }
    }
}

impl<T, C> From<OperationError> for ExperimentError<T, C> {
    fn from(err: OperationError) -> Self {
        ExperimentError::Operation(err)
    }
}

impl<T, C> ExperimentError<T, C> {
    /// The mismatch details, when this is a mismatch error.
    pub fn as_mismatch(&self) -> Option<&MismatchError<T, C>> {
        match self {
            ExperimentError::Mismatch(e) => Some(e),
            _ => None,
        }
    }

    /// The control behavior's captured failure, when that is what failed.
    pub fn as_control_failure(&self) -> Option<&Failure> {
        match self {
            ExperimentError::Control(f) => Some(f),
            _ => None,
        }
    }
}
