#![warn(missing_docs)]
//! Crosscheck Core - Observation Runtime
//!
//! This crate provides the leaf machinery for running experiments:
//! - `Observation` and the `observe` runner that executes one behavior
//!   under crash isolation and wall-clock timing
//! - The comparison engine deciding whether two observations are equivalent
//! - The ignore evaluator that suppresses known-acceptable mismatches
//! - `Operation` tags and the failure-handler plumbing for control-plane
//!   errors

mod compare;
mod failure;
mod ignore;
mod observation;
mod operation;
mod timing;

pub use compare::{Comparator, default_comparator, equivalent};
pub use failure::{BoxError, Failure, FailureKind};
pub use ignore::{IgnoreRule, should_ignore};
pub use observation::{Behavior, Cleaner, Observation, Outcome, observe};
pub use operation::{FailureHandler, Operation, OperationError, fail_fast, route, swallow};
pub use timing::Timer;
