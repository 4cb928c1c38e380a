//! Error fixtures for exercising policies
//!
//! `TestError` and `OtherError` are distinct concrete types so filters keyed
//! on type can tell them apart; `WrappedError` carries an inner error
//! reachable through `source()`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;

/// Primary error type used by delegates under test
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TestError {
    /// Human-readable message
    pub message: String,
    /// Whether the error models a transient failure
    pub transient: bool,
}

impl TestError {
    /// A transient failure
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), transient: true }
    }

    /// A permanent failure
    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self { message: message.into(), transient: false }
    }
}

/// A second, unrelated error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("other: {0}")]
pub struct OtherError(pub String);

/// Error wrapping an inner `TestError`
#[derive(Debug, Error)]
#[error("wrapped: {context}")]
pub struct WrappedError {
    /// Outer context message
    pub context: String,
    /// Inner cause
    #[source]
    pub inner: TestError,
}

impl WrappedError {
    /// Wrap `inner` with a context message
    pub fn new<S: Into<String>>(context: S, inner: TestError) -> Self {
        Self { context: context.into(), inner }
    }
}

/// Shared call counter for delegates and processors
#[derive(Debug, Clone, Default)]
pub struct CallCounter {
    calls: Arc<AtomicU32>,
}

impl CallCounter {
    /// New counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and return the number of calls before this one
    pub fn bump(&self) -> u32 {
        self.calls.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of recorded calls
    pub fn count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    /// Validates that `WrappedError` exposes its inner error via `source()`.
    ///
    /// Assertions:
    /// - Ensures the source downcasts to `TestError`.
    /// - Confirms the inner message is preserved.
    #[test]
    fn test_wrapped_error_source() {
        let err = WrappedError::new("loading", TestError::transient("disk busy"));
        let source = err.source().and_then(|s| s.downcast_ref::<TestError>());
        assert_eq!(source.map(|e| e.message.as_str()), Some("disk busy"));
    }

    /// Tests that clones of a counter share state
    #[test]
    fn test_call_counter_shared() {
        let counter = CallCounter::new();
        let clone = counter.clone();
        assert_eq!(counter.bump(), 0);
        assert_eq!(clone.bump(), 1);
        assert_eq!(counter.count(), 2);
    }
}
