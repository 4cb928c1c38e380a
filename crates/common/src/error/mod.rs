//! Common error types shared by Holdfast crates
//!
//! The error handling system is built on three pieces:
//!
//! 1. **`CommonError`**: error patterns that show up in more than one crate
//!    (configuration, validation, serialization, persistence, internal
//!    invariants).
//! 2. **`ErrorClassification` trait**: a standard interface for classifying
//!    errors by retryability, severity and criticality.
//! 3. **`ErrorSeverity` enum**: a severity scale for logging decisions.
//!
//! Crate-specific errors should compose with `CommonError` rather than
//! duplicate its variants:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum PolicyError {
//!     #[error("Invalid retry count: {0}")]
//!     InvalidRetryCount(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//!
//! impl_error_classification!(PolicyError, Common,
//!     Self::InvalidRetryCount(_) => {
//!         retryable: false,
//!         severity: ErrorSeverity::Error,
//!         critical: false,
//!     }
//! );
//! ```

use std::fmt;

use thiserror::Error;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple crates
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error{}: {message}", field_suffix(.field))]
    Config { message: String, field: Option<String> },

    /// Validation errors
    #[error("Validation error for field '{field}': {message}")]
    Validation { field: String, message: String },

    /// Serialization or deserialization errors
    #[error("Serialization error{}: {message}", format_suffix(.format))]
    Serialization { message: String, format: Option<String> },

    /// File or other persistence errors
    #[error("Persistence error: {message}")]
    Persistence { message: String, path: Option<String> },

    /// Internal errors that shouldn't normally occur
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn field_suffix(field: &Option<String>) -> String {
    field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default()
}

fn format_suffix(format: &Option<String>) -> String {
    format.as_ref().map(|f| format!(" ({f})")).unwrap_or_default()
}

impl CommonError {
    /// Create a simple configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error for a specific field
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a validation error
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    /// Create a serialization error with format information
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), path: None }
    }

    /// Create a persistence error naming the path involved
    pub fn persistence_at<S: Into<String>, P: Into<String>>(path: P, message: S) -> Self {
        Self::Persistence { message: message.into(), path: Some(path.into()) }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Internal { .. } => ErrorSeverity::Critical,
            Self::Config { .. }
            | Self::Validation { .. }
            | Self::Serialization { .. }
            | Self::Persistence { .. } => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Error classification trait for consistent error handling across crates
///
/// Retry and fallback policies consult this to decide how loudly to report
/// an error; it never changes whether a policy handles the error (that is
/// the job of the error filter).
pub trait ErrorClassification {
    /// Check if this error is retryable
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

// Standard conversions from common error types
impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<toml::de::Error> for CommonError {
    fn from(err: toml::de::Error) -> Self {
        Self::serialization_format("TOML", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

/// Macro to implement ErrorClassification by delegating to CommonError
///
/// ```rust,ignore
/// impl_error_classification!(MyError, Common,
///     Self::Specific(_) => {
///         retryable: false,
///         severity: ErrorSeverity::Error,
///         critical: false,
///     }
/// );
/// ```
#[macro_export]
macro_rules! impl_error_classification {
    (
        $error_type:ty,
        $common_variant:ident
        $(,
            $variant:pat => {
                retryable: $retryable:expr,
                severity: $severity:expr,
                critical: $critical:expr
                $(,)?
            }
        )*
        $(,)?
    ) => {
        impl $crate::error::ErrorClassification for $error_type {
            fn is_retryable(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_retryable(),
                    $(
                        $variant => $retryable,
                    )*
                }
            }

            fn severity(&self) -> $crate::error::ErrorSeverity {
                match self {
                    Self::$common_variant(e) => e.severity(),
                    $(
                        $variant => $severity,
                    )*
                }
            }

            fn is_critical(&self) -> bool {
                match self {
                    Self::$common_variant(e) => e.is_critical(),
                    $(
                        $variant => $critical,
                    )*
                }
            }
        }
    };
}
