//! Common utility functions and helper macros
//!
//! - **[`macros`]**: string conversions for unit-variant enums
//! - **[`serde`]**: serialization helpers for durations

#[macro_use]
pub mod macros;
pub mod serde;

pub use self::serde::{duration_millis, duration_millis_opt};
