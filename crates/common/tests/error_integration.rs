//! Integration tests for `holdfast_common::error`.
//!
//! These suites validate classification and delegation through
//! `impl_error_classification!` so downstream crates receive consistent
//! failure semantics.

use holdfast_common::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
use holdfast_common::impl_error_classification;
use thiserror::Error;

#[derive(Debug, Error)]
enum LoaderError {
    #[error("unknown delay kind: {0}")]
    UnknownKind(String),

    #[error("loader gave up")]
    GaveUp,

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_classification!(LoaderError, Common,
    Self::UnknownKind(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
    Self::GaveUp => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
    }
);

/// Validates that `CommonError` classification surfaces the expected
/// retryable, severity, and criticality combinations for each variant.
///
/// Assertions:
/// - Confirms `err.is_retryable()` equals `retryable`.
/// - Confirms `err.severity()` equals `severity`.
/// - Confirms `err.is_critical()` equals `critical`.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing delay section"), false, ErrorSeverity::Error, false),
        (CommonError::validation("factor", "must be > 0"), false, ErrorSeverity::Error, false),
        (
            CommonError::serialization_format("TOML", "expected table"),
            false,
            ErrorSeverity::Error,
            false,
        ),
        (CommonError::persistence("disk full"), true, ErrorSeverity::Error, false),
        (CommonError::internal("counter overflow"), false, ErrorSeverity::Critical, true),
    ];

    for (err, retryable, severity, critical) in cases {
        assert_eq!(err.is_retryable(), retryable, "retryable mismatch for {err}");
        assert_eq!(err.severity(), severity, "severity mismatch for {err}");
        assert_eq!(err.is_critical(), critical, "critical mismatch for {err}");
    }
}

/// Validates that module errors delegate classification to the embedded
/// `CommonError` and use their own arms otherwise.
///
/// Assertions:
/// - Confirms the `Common` arm forwards to `CommonError`.
/// - Confirms module-specific arms report their declared values.
#[test]
fn module_error_delegates_classification() {
    let common: LoaderError = CommonError::internal("broken").into();
    assert!(common.is_critical());
    assert_eq!(common.severity(), ErrorSeverity::Critical);

    let unknown = LoaderError::UnknownKind("fibonacci".to_string());
    assert!(!unknown.is_retryable());
    assert_eq!(unknown.to_string(), "unknown delay kind: fibonacci");

    let gave_up = LoaderError::GaveUp;
    assert!(gave_up.is_retryable());
    assert_eq!(gave_up.severity(), ErrorSeverity::Warning);
}

/// Validates `?` conversion from std and serde errors into `CommonResult`.
#[test]
fn std_errors_convert_with_question_mark() {
    fn parse(input: &str) -> CommonResult<u64> {
        let value: u64 = serde_json::from_str(input)?;
        Ok(value)
    }

    fn read_missing() -> CommonResult<String> {
        Ok(std::fs::read_to_string("/definitely/not/here/holdfast.toml")?)
    }

    assert_eq!(parse("42").ok(), Some(42));
    let err = parse("forty-two").unwrap_err();
    assert!(matches!(err, CommonError::Serialization { format: Some(ref f), .. } if f == "JSON"));

    let err = read_missing().unwrap_err();
    assert!(matches!(err, CommonError::Persistence { .. }));
}
