//! Custom assertions for testing

// These assertions are designed to panic on failure
#![allow(clippy::missing_panics_doc)]

use std::time::Duration;

/// Assert that an error's Display output contains a substring
///
/// ```rust,ignore
/// let result: Result<(), String> = Err("retry budget exhausted".to_string());
/// holdfast_common::assert_error_contains!(result, "exhausted");
/// ```
#[macro_export]
macro_rules! assert_error_contains {
    ($result:expr, $substring:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error but got Ok"),
            Err(e) => {
                let error_msg = format!("{}", e);
                assert!(
                    error_msg.contains($substring),
                    "Error message '{}' does not contain '{}'",
                    error_msg,
                    $substring
                );
            }
        }
    };
}

/// Assert that a duration lies within `expected ± tolerance`
pub fn assert_duration_in_range(actual: Duration, expected: Duration, tolerance: Duration) {
    let min = expected.saturating_sub(tolerance);
    let max = expected.saturating_add(tolerance);

    assert!(
        actual >= min && actual <= max,
        "Duration {:?} not in range [{:?}, {:?}]",
        actual,
        min,
        max
    );
}

/// Assert that a duration does not exceed an upper bound
pub fn assert_duration_le(actual: Duration, bound: Duration) {
    assert!(actual <= bound, "Duration {:?} exceeds bound {:?}", actual, bound);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates inclusive bounds of `assert_duration_in_range`.
    #[test]
    fn test_duration_in_range_inclusive() {
        assert_duration_in_range(
            Duration::from_millis(90),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
        assert_duration_in_range(Duration::MAX, Duration::MAX, Duration::from_secs(1));
    }

    /// Tests that out-of-range durations panic
    #[test]
    #[should_panic(expected = "not in range")]
    fn test_duration_in_range_rejects() {
        assert_duration_in_range(
            Duration::from_millis(50),
            Duration::from_millis(100),
            Duration::from_millis(10),
        );
    }

    /// Tests the error substring macro on a string error
    #[test]
    fn test_assert_error_contains() {
        let result: Result<(), String> = Err("fallback delegate failed".to_string());
        crate::assert_error_contains!(result, "fallback");
    }
}
