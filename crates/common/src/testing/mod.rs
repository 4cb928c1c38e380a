//! Testing utilities and helpers
//!
//! - **[`assertions`]**: assertions for durations and error messages
//! - **[`fixtures`]**: error types and call counters for policy tests
//!
//! ```rust,ignore
//! use holdfast_common::testing::{CallCounter, TestError};
//!
//! let calls = CallCounter::new();
//! let op = || -> Result<u32, TestError> {
//!     if calls.bump() < 2 { Err(TestError::transient("flaky")) } else { Ok(7) }
//! };
//! ```

pub mod assertions;
pub mod fixtures;

pub use assertions::{assert_duration_in_range, assert_duration_le};
pub use fixtures::{CallCounter, OtherError, TestError, WrappedError};
