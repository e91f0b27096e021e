//! Behavior Failures
//!
//! A `Failure` is the captured record of a behavior that did not produce a
//! value: it returned an error, panicked, or ran past the concurrent drain
//! window. Failures are cloneable so the control's failure can be re-raised
//! to the caller while the same record stays inspectable in the run report.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Boxed error type carried by behaviors and control-plane callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Discriminant for how a behavior failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The behavior returned an error.
    Error,
    /// The behavior panicked; the payload is captured as the message.
    Panic,
    /// The behavior did not complete within the drain window.
    Timeout,
}

/// Captured failure of one behavior execution.
///
/// Two failures are considered the same (for equivalence purposes) when
/// their kinds are identical and their messages are equal. A missing
/// message is represented as the empty string.
#[derive(Debug, Clone)]
pub struct Failure {
    kind: FailureKind,
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Failure {
    /// Capture an error returned by a behavior.
    pub fn from_error(err: BoxError) -> Self {
        let message = err.to_string();
        Self {
            kind: FailureKind::Error,
            message,
            source: Some(Arc::from(err)),
        }
    }

    /// Capture a panic payload unwound out of a behavior.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        Self {
            kind: FailureKind::Panic,
            message,
            source: None,
        }
    }

    /// Record a behavior that was still running when the drain window closed.
    pub fn timed_out(window: Duration) -> Self {
        Self {
            kind: FailureKind::Timeout,
            message: format!("behavior did not complete within {}ms", window.as_millis()),
            source: None,
        }
    }

    /// How the behavior failed.
    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Failure message; empty when the underlying error had none.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether this records a drain-window timeout.
    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }

    /// Whether two failures are equivalent: identical kind, equal message.
    pub fn same_as(&self, other: &Failure) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            FailureKind::Panic => write!(f, "panic: {}", self.message),
            _ => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error(message: &str) -> BoxError {
        Box::new(std::io::Error::new(std::io::ErrorKind::Other, message))
    }

    #[test]
    fn test_error_capture_keeps_message_and_source() {
        let failure = Failure::from_error(io_error("disk on fire"));
        assert_eq!(failure.kind(), FailureKind::Error);
        assert_eq!(failure.message(), "disk on fire");
        assert!(std::error::Error::source(&failure).is_some());
    }

    #[test]
    fn test_panic_payload_extraction() {
        let from_str = Failure::from_panic(Box::new("boom"));
        assert_eq!(from_str.kind(), FailureKind::Panic);
        assert_eq!(from_str.message(), "boom");

        let from_string = Failure::from_panic(Box::new("kaboom".to_string()));
        assert_eq!(from_string.message(), "kaboom");

        let opaque = Failure::from_panic(Box::new(42_u32));
        assert_eq!(opaque.message(), "unknown panic");
    }

    #[test]
    fn test_same_as_requires_kind_and_message() {
        let a = Failure::from_error(io_error("nope"));
        let b = Failure::from_error(io_error("nope"));
        let c = Failure::from_error(io_error("other"));
        let p = Failure::from_panic(Box::new("nope"));

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
        assert!(!a.same_as(&p));
    }

    #[test]
    fn test_empty_messages_are_equal() {
        let a = Failure::from_error(io_error(""));
        let b = Failure::from_error(io_error(""));
        assert!(a.same_as(&b));
    }

    #[test]
    fn test_timeout_display() {
        let failure = Failure::timed_out(Duration::from_millis(5000));
        assert!(failure.is_timeout());
        assert!(failure.to_string().contains("5000ms"));
    }
}
