//! # Holdfast Core
//!
//! Error-handling policies that wrap a unit of work and decide what to do
//! when it fails:
//!
//! - [`RetryPolicy`]: re-run the work up to a limited or infinite count,
//!   optionally waiting between attempts ([`RetryDelay`]).
//! - [`FallbackPolicy`]: run the work once and, on a handled failure, run a
//!   fallback delegate instead.
//! - [`SimplePolicy`]: run the work once and capture the outcome.
//!
//! Every policy shares the same failure machinery:
//!
//! 1. an [`ErrorFilter`] decides whether an error is in scope (include and
//!    exclude rules keyed on error type, inner error type, or predicates);
//! 2. a [`BulkErrorProcessor`] runs the registered [`ErrorProcessor`]s in
//!    order (logging, delays, custom side effects);
//! 3. the outcome is folded into a [`PolicyResult`], which is what every
//!    invocation returns instead of propagating the error.
//!
//! Cancellation is threaded through every layer with
//! [`tokio_util::sync::CancellationToken`].
//!
//! ```rust,ignore
//! use holdfast_core::prelude::*;
//!
//! let policy = RetryPolicy::new(3)
//!     .include_error::<std::io::Error>()
//!     .with_wait(RetryDelay::exponential(Duration::from_millis(50)).with_jitter(true));
//!
//! let result = policy.handle(|| read_sensor(), &CancellationToken::new());
//! if result.is_failed() {
//!     tracing::warn!(errors = result.errors().len(), "sensor read failed");
//! }
//! ```

pub mod catch_block;
pub mod config;
pub mod context;
pub mod delay;
pub mod error;
pub mod filter;
pub mod policy;
pub mod processor;
pub mod result;

pub use config::{DelaySettings, PolicySettings};
pub use context::{PolicyKind, ProcessingContext};
pub use delay::{DelayKind, JitterSource, RetryDelay, SeededJitter, ThreadRngJitter};
pub use error::{
    share_error, BoxedError, CatchBlockError, CatchBlockSource, ConfigResult, NoDelegateError,
    OperationCanceledError, PolicyError, ProcessorFault, SharedError,
};
pub use filter::{CompiledFilter, ErrorFilter, FilterScope};
pub use policy::fallback::FallbackPolicy;
pub use policy::retry::{RetryCountInfo, RetryPolicy, INFINITE_RETRY_SENTINEL};
pub use policy::simple::SimplePolicy;
pub use policy::{Policy, PolicyCore};
pub use processor::{
    BulkErrorProcessor, BulkProcessResult, DelayErrorProcessor, ErrorProcessor, FnErrorProcessor,
    LoggingErrorProcessor, ProcessorFailure, ProcessorFailureKind,
};
pub use result::{PolicyResult, PolicyResultFailedReason, PolicyStatus};

/// Everything needed to configure and run policies
pub mod prelude {
    pub use std::time::Duration;

    pub use tokio_util::sync::CancellationToken;

    pub use crate::{
        BulkErrorProcessor, ErrorFilter, ErrorProcessor, FallbackPolicy, FnErrorProcessor,
        LoggingErrorProcessor, Policy, PolicyKind, PolicyResult, ProcessingContext,
        ProcessorFault, RetryCountInfo, RetryDelay, RetryPolicy, SharedError, SimplePolicy,
    };
}
