#![warn(missing_docs)]
//! # Crosscheck
//!
//! Crosscheck runs a trusted "control" code path and one or more
//! "candidate" code paths side by side against the same logical request,
//! compares their outputs, and surfaces mismatches without changing
//! observable behavior for callers. It is built for validating refactors
//! in production before cutting over:
//!
//! - **Caller-invisible**: callers always get the control's value (or its
//!   failure); candidate failures never escape
//! - **Crash isolation**: a panicking candidate is captured as a failed
//!   observation, not a crashed request
//! - **Bounded concurrency**: candidates can run on a worker pool with a
//!   fixed drain window; stragglers are recorded as timed out, never
//!   silently dropped
//! - **Pluggable comparison**: custom comparators and ignore rules decide
//!   what counts as a reportable mismatch
//! - **Observable**: every run produces an immutable report handed to a
//!   publisher (tracing-backed by default, JSON lines available)
//!
//! ## Quick Start
//!
//! ```
//! use crosscheck::Experiment;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Experiment::<u64>::new("sum-rewrite")
//!     .control(|| (1..=10).sum())
//!     .candidate("closed-form", || 10 * 11 / 2)
//!     .build()?;
//!
//! let value = config.run()?;
//! assert_eq!(value, 55);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failing Loudly
//!
//! ```
//! use crosscheck::{Experiment, ExperimentError};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Experiment::<i32>::new("rounding-rewrite")
//!     .control(|| 10)
//!     .candidate("truncating", || 9)
//!     .throw_on_mismatch(true)
//!     .build()?;
//!
//! match config.run() {
//!     Err(ExperimentError::Mismatch(mismatch)) => {
//!         assert_eq!(mismatch.report().mismatched().count(), 1);
//!     }
//!     other => panic!("expected a mismatch, got {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod error;
mod executor;

pub use builder::Experiment;
pub use config::{BeforeRun, CONTROL_NAME, DEFAULT_CANDIDATE_NAME, ExperimentConfig, Predicate};
pub use error::{ConfigError, ExperimentError, MismatchError};

// Re-export core types
pub use crosscheck_core::{
    Behavior, BoxError, Cleaner, Comparator, Failure, FailureHandler, FailureKind, IgnoreRule,
    Observation, Operation, OperationError, Outcome, default_comparator, fail_fast, observe,
    swallow,
};

// Re-export report types
pub use crosscheck_report::{
    JsonLinesPublisher, LogPublisher, ObservationRecord, ObservationStatus, Publisher, Report,
    ReportSnapshot,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Experiment, ExperimentConfig, ExperimentError, FailureKind, LogPublisher, MismatchError,
        Operation, Publisher, Report, fail_fast, swallow,
    };
}
