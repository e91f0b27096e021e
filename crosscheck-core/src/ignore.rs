//! Ignore Evaluator
//!
//! Given a control/candidate pair that is already known not to be
//! equivalent, decides whether the mismatch should be suppressed from
//! reporting. Rules see the optional values of both observations (absent
//! when the behavior failed).

use std::sync::Arc;

use crate::failure::BoxError;
use crate::observation::Observation;
use crate::operation::{FailureHandler, Operation, OperationError, route};

/// Predicate deciding whether a mismatched pair should be ignored.
pub type IgnoreRule<T> =
    Arc<dyn Fn(Option<&T>, Option<&T>) -> Result<bool, BoxError> + Send + Sync>;

/// Whether at least one rule ignores the mismatch between `control` and
/// `candidate`. Unconditionally false with no rules. A rule error is
/// routed under `Operation::Ignore` and, when swallowed, yields false.
pub fn should_ignore<T, C>(
    control: &Observation<T, C>,
    candidate: &Observation<T, C>,
    rules: &[IgnoreRule<T>],
    handler: &FailureHandler,
) -> Result<bool, OperationError> {
    if rules.is_empty() {
        return Ok(false);
    }
    for rule in rules {
        match rule(control.value(), candidate.value()) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(err) => {
                route(handler, Operation::Ignore, err)?;
                return Ok(false);
            }
        }
    }
    Ok(false)
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

    #[test]
    fn test_no_rules_never_ignores() {
        let control = value_obs("control", 1);
        let candidate = value_obs("candidate", 2);
        assert!(!should_ignore(&control, &candidate, &[], &fail_fast()).unwrap());
    }

    #[test]
    fn test_any_matching_rule_ignores() {
        let control = value_obs("control", 1);
        let candidate = value_obs("candidate", 2);
        let never: IgnoreRule<i32> = Arc::new(|_, _| Ok(false));
        let off_by_one: IgnoreRule<i32> = Arc::new(|a, b| {
            Ok(matches!((a, b), (Some(a), Some(b)) if (a - b).abs() <= 1))
        });
        let verdict =
            should_ignore(&control, &candidate, &[never, off_by_one], &fail_fast()).unwrap();
        assert!(verdict);
    }

    #[test]
    fn test_failed_candidate_rules_see_absent_value() {
        let control = value_obs("control", 1);
        let behavior: Behavior<i32> = Arc::new(|| Err("down".into()));
        let candidate = observe("candidate", &behavior, None);
        let candidate_missing: IgnoreRule<i32> = Arc::new(|_, b| Ok(b.is_none()));
        let verdict =
            should_ignore(&control, &candidate, &[candidate_missing], &fail_fast()).unwrap();
        assert!(verdict);
    }

    #[test]
    fn test_rule_error_swallowed_yields_false() {
        let control = value_obs("control", 1);
        let candidate = value_obs("candidate", 2);
        let broken: IgnoreRule<i32> = Arc::new(|_, _| Err("rule bug".into()));
        let verdict = should_ignore(
            &control,
            &candidate,
            &[broken],
            &swallow(&[Operation::Ignore]),
        )
        .unwrap();
        assert!(!verdict);
    }

    #[test]
    fn test_rule_error_propagates_by_default() {
        let control = value_obs("control", 1);
        let candidate = value_obs("candidate", 2);
        let broken: IgnoreRule<i32> = Arc::new(|_, _| Err("rule bug".into()));
        let err = should_ignore(&control, &candidate, &[broken], &fail_fast()).unwrap_err();
        assert_eq!(err.operation, Operation::Ignore);
    }
}
