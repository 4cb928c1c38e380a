//! Per-invocation context handed to error processors

use std::sync::Arc;

use holdfast_common::impl_kind_conversions;

/// Which policy is handling the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Retry,
    Fallback,
    Simple,
}

impl_kind_conversions!(PolicyKind {
    Retry => "retry",
    Fallback => "fallback",
    Simple => "simple",
});

/// Context describing where an error is being processed.
///
/// Retry policies set [`attempt`](Self::attempt) to the zero-based try that
/// produced the error (offset by the configured start try). Other policies
/// leave it unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingContext {
    kind: PolicyKind,
    policy_name: Arc<str>,
    attempt: Option<u32>,
}

impl ProcessingContext {
    /// Context for a policy without attempt information
    pub fn new(kind: PolicyKind, policy_name: Arc<str>) -> Self {
        Self { kind, policy_name, attempt: None }
    }

    /// Context for a failed retry attempt
    pub fn retry(policy_name: Arc<str>, attempt: u32) -> Self {
        Self { kind: PolicyKind::Retry, policy_name, attempt: Some(attempt) }
    }

    pub fn kind(&self) -> PolicyKind {
        self.kind
    }

    pub fn policy_name(&self) -> &str {
        &self.policy_name
    }

    /// Zero-based attempt, `None` outside retry policies
    pub fn attempt(&self) -> Option<u32> {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates that only retry contexts carry an attempt number.
    ///
    /// Assertions:
    /// - Confirms `retry` sets kind and attempt.
    /// - Confirms `new` leaves the attempt unset.
    #[test]
    fn test_context_attempt_by_kind() {
        let name: Arc<str> = Arc::from("orders");
        let retry = ProcessingContext::retry(name.clone(), 2);
        assert_eq!(retry.kind(), PolicyKind::Retry);
        assert_eq!(retry.attempt(), Some(2));
        assert_eq!(retry.policy_name(), "orders");

        let fallback = ProcessingContext::new(PolicyKind::Fallback, name);
        assert_eq!(fallback.attempt(), None);
    }

    /// Tests kind name round trip through Display and FromStr
    #[test]
    fn test_policy_kind_names() {
        assert_eq!(PolicyKind::Simple.to_string(), "simple");
        assert_eq!("Fallback".parse::<PolicyKind>(), Ok(PolicyKind::Fallback));
        assert!("circuit".parse::<PolicyKind>().is_err());
    }
}
