//! Control-Plane Operations and Failure Routing
//!
//! Errors raised while evaluating experiment plumbing (gating predicates,
//! the comparator, ignore rules, the publisher) are routed through a single
//! `FailureHandler` tagged with the `Operation` they originated from. The
//! handler decides per tag whether the error is swallowed or propagated.

use std::fmt;
use std::sync::Arc;

use crate::failure::BoxError;

/// Identifies which control-plane step a routed failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Evaluating the enabled predicate.
    Enabled,
    /// Evaluating the run-if predicate.
    RunIf,
    /// Comparing a candidate observation against the control.
    Compare,
    /// Evaluating ignore rules for a mismatched pair.
    Ignore,
    /// Publishing a completed run report.
    Publish,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Enabled => "enabled",
            Operation::RunIf => "run_if",
            Operation::Compare => "compare",
            Operation::Ignore => "ignore",
            Operation::Publish => "publish",
        };
        f.write_str(name)
    }
}

/// A control-plane failure the handler chose to propagate.
#[derive(Debug, thiserror::Error)]
#[error("{operation} step failed: {source}")]
pub struct OperationError {
    /// The step that raised the error.
    pub operation: Operation,
    /// The underlying error.
    #[source]
    pub source: BoxError,
}

/// Decides what happens to a control-plane error: `Ok(())` swallows it,
/// `Err` propagates it and fails the experiment call.
pub type FailureHandler = Arc<dyn Fn(Operation, BoxError) -> Result<(), BoxError> + Send + Sync>;

/// The default handler: propagate every routed error immediately.
pub fn fail_fast() -> FailureHandler {
    Arc::new(|_, err| Err(err))
}

/// A handler that swallows errors from the given operations and propagates
/// everything else.
pub fn swallow(operations: &[Operation]) -> FailureHandler {
    let allowed = operations.to_vec();
    Arc::new(move |operation, err| {
        if allowed.contains(&operation) {
            Ok(())
        } else {
            Err(err)
        }
    })
}

/// Route an error through the handler, attaching the operation tag when the
/// handler propagates it.
pub fn route(
    handler: &FailureHandler,
    operation: Operation,
    error: BoxError,
) -> Result<(), OperationError> {
    handler(operation, error).map_err(|source| OperationError { operation, source })
}
