//! Tracing subscriber setup
//!
//! Policies log through `tracing` macros only; binaries and tests decide
//! where the events go by calling [`init_tracing`] (or installing their own
//! subscriber).

use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Output format for the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// `default_directive` is used when `RUST_LOG` is unset or invalid, e.g.
/// `"holdfast_core=debug"`. Returns `false` when a global subscriber was
/// already installed, which makes the call safe to repeat from tests.
pub fn init_tracing(default_directive: &str, format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let installed = match format {
        LogFormat::Pretty => fmt().with_env_filter(filter).with_target(true).try_init(),
        LogFormat::Json => fmt().json().with_env_filter(filter).with_target(true).try_init(),
    };

    installed.is_ok()
}

/// Install a test-friendly subscriber writing through the test harness.
///
/// Events are captured per test and only shown for failing tests.
pub fn init_test_tracing() -> bool {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init()
        .is_ok()
}
