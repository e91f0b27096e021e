//! Comparison Engine
//!
//! Decides whether two observations are equivalent. Successful values are
//! compared through a pluggable comparator; failures are compared by kind
//! and message. A comparator error is routed through the failure handler
//! under `Operation::Compare` and, when swallowed, counts as not
//! equivalent.

use std::sync::Arc;

use crate::failure::BoxError;
use crate::observation::{Observation, Outcome};
use crate::operation::{FailureHandler, Operation, OperationError, route};

/// Total comparison over two produced values.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Result<bool, BoxError> + Send + Sync>;

/// Structural equality via `PartialEq`, the comparator used when none is
/// supplied.
pub fn default_comparator<T: PartialEq>() -> Comparator<T> {
    Arc::new(|a, b| Ok(a == b))
}

/// Whether `candidate` is equivalent to `control`.
///
/// - Neither failed: the comparator's verdict on the two values.
/// - Both failed: failure kinds identical and messages equal.
/// - Exactly one failed: never equivalent.
pub fn equivalent<T, C>(
    control: &Observation<T, C>,
    candidate: &Observation<T, C>,
    comparator: &Comparator<T>,
    handler: &FailureHandler,
) -> Result<bool, OperationError> {
    match (control.outcome(), candidate.outcome()) {
        (Outcome::Value(a), Outcome::Value(b)) => match comparator(a, b) {
            Ok(equal) => Ok(equal),
            Err(err) => {
                route(handler, Operation::Compare, err)?;
                Ok(false)
            }
        },
        (Outcome::Failed(a), Outcome::Failed(b)) => Ok(a.same_as(b)),
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Behavior, observe};
    use crate::operation::{fail_fast, swallow};

    fn value_obs(name: &str, value: i32) -> Observation<i32> {
        let behavior: Behavior<i32> = Arc::new(move || Ok(value));
        observe(name, &behavior, None)
    }

    fn failed_obs(name: &str, message: &'static str) -> Observation<i32> {
        let behavior: Behavior<i32> = Arc::new(move || Err(message.into()));
        observe(name, &behavior, None)
    }

    #[test]
    fn test_equal_values_are_equivalent() {
        let control = value_obs("control", 7);
        let candidate = value_obs("candidate", 7);
        let verdict = equivalent(
            &control,
            &candidate,
            &default_comparator(),
            &fail_fast(),
        )
        .unwrap();
        assert!(verdict);
    }

    #[test]
    fn test_unequal_values_are_not_equivalent() {
        let control = value_obs("control", 7);
        let candidate = value_obs("candidate", 8);
        let verdict = equivalent(
            &control,
            &candidate,
            &default_comparator(),
            &fail_fast(),
        )
        .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_matching_failures_are_equivalent() {
        let control = failed_obs("control", "shared outage");
        let candidate = failed_obs("candidate", "shared outage");
        let verdict = equivalent(
            &control,
            &candidate,
            &default_comparator(),
            &fail_fast(),
        )
        .unwrap();
        assert!(verdict);
    }

    #[test]
    fn test_differing_failure_messages_are_not_equivalent() {
        let control = failed_obs("control", "outage a");
        let candidate = failed_obs("candidate", "outage b");
        let verdict = equivalent(
            &control,
            &candidate,
            &default_comparator(),
            &fail_fast(),
        )
        .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_one_failure_is_never_equivalent() {
        let control = value_obs("control", 7);
        let candidate = failed_obs("candidate", "down");
        let verdict = equivalent(
            &control,
            &candidate,
            &default_comparator(),
            &fail_fast(),
        )
        .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_broken_comparator_swallowed_means_not_equivalent() {
        let control = value_obs("control", 7);
        let candidate = value_obs("candidate", 7);
        let broken: Comparator<i32> = Arc::new(|_, _| Err("comparator bug".into()));
        let verdict = equivalent(
            &control,
            &candidate,
            &broken,
            &swallow(&[Operation::Compare]),
        )
        .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_broken_comparator_propagates_by_default() {
        let control = value_obs("control", 7);
        let candidate = value_obs("candidate", 7);
        let broken: Comparator<i32> = Arc::new(|_, _| Err("comparator bug".into()));
        let err = equivalent(&control, &candidate, &broken, &fail_fast()).unwrap_err();
        assert_eq!(err.operation, Operation::Compare);
    }
}
