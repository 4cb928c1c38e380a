//! Error types used by the policy machinery
//!
//! Delegate errors are accepted as anything convertible into [`BoxedError`]
//! and stored as [`SharedError`] so the same error can sit in a
//! [`PolicyResult`](crate::PolicyResult) and be handed to error processors.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use holdfast_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use holdfast_common::{impl_error_classification, impl_kind_conversions};
use thiserror::Error;

/// Boxed error accepted from delegates and processors
pub type BoxedError = Box<dyn StdError + Send + Sync + 'static>;

/// Reference-counted error shared between results and processors
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Convert any delegate error into a [`SharedError`]
///
/// The concrete type survives the conversion, so filters keyed on it still
/// match after the error has been stored.
pub fn share_error<E: Into<BoxedError>>(error: E) -> SharedError {
    Arc::from(error.into())
}

/// Errors raised while building or loading policy configuration
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Delay strategy parameters are out of range
    #[error("Invalid delay configuration: {0}")]
    InvalidDelay(String),

    /// Retry count parameters are out of range
    #[error("Invalid retry configuration: {0}")]
    InvalidRetry(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_classification!(PolicyError, Common,
    Self::InvalidDelay(_) | Self::InvalidRetry(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    }
);

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}

impl From<toml::de::Error> for PolicyError {
    fn from(err: toml::de::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PolicyError>;

/// Marker error recorded when no delegate was supplied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("Delegate is not provided")]
pub struct NoDelegateError;

/// Marker error recorded when an operation observed cancellation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("Operation was canceled")]
pub struct OperationCanceledError;

/// Failure reported by an error processor
#[derive(Debug, Clone)]
pub enum ProcessorFault {
    /// The processor failed; the pipeline continues
    Faulted(SharedError),
    /// The processor observed cancellation; the pipeline stops
    Canceled,
}

impl ProcessorFault {
    /// Wrap any error as a fault
    pub fn faulted<E: Into<BoxedError>>(error: E) -> Self {
        Self::Faulted(share_error(error))
    }

    /// Whether this fault is a cancellation
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// The error carried by the fault, synthesising one for cancellation
    pub fn into_error(self) -> SharedError {
        match self {
            Self::Faulted(error) => error,
            Self::Canceled => Arc::new(OperationCanceledError),
        }
    }
}

impl fmt::Display for ProcessorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Faulted(error) => write!(f, "processor faulted: {error}"),
            Self::Canceled => f.write_str("processor canceled"),
        }
    }
}

/// Part of the policy machinery that raised a [`CatchBlockError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatchBlockSource {
    /// The error filter failed while being evaluated
    ErrorFilter,
    /// A custom error saver failed
    ErrorSaver,
    /// The fallback delegate failed
    Fallback,
    /// A policy result handler failed
    ResultHandler,
}

impl_kind_conversions!(CatchBlockSource {
    ErrorFilter => "error_filter",
    ErrorSaver => "error_saver",
    Fallback => "fallback",
    ResultHandler => "result_handler",
});

/// An error raised by the policy machinery itself rather than the delegate
#[derive(Debug, Clone)]
pub struct CatchBlockError {
    error: SharedError,
    origin: CatchBlockSource,
    critical: bool,
}

impl CatchBlockError {
    /// Record a non-critical machinery error
    pub fn new(error: SharedError, origin: CatchBlockSource) -> Self {
        Self { error, origin, critical: false }
    }

    /// Record a critical machinery error
    pub fn critical(error: SharedError, origin: CatchBlockSource) -> Self {
        Self { error, origin, critical: true }
    }

    /// The underlying error
    pub fn error(&self) -> &SharedError {
        &self.error
    }

    /// Which part of the machinery failed
    pub fn origin(&self) -> CatchBlockSource {
        self.origin
    }
}

impl fmt::Display for CatchBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.origin, self.error)
    }
}

impl StdError for CatchBlockError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.error)
    }
}

impl ErrorClassification for CatchBlockError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        if self.critical {
            ErrorSeverity::Critical
        } else {
            ErrorSeverity::Error
        }
    }

    fn is_critical(&self) -> bool {
        self.critical
    }
}
