//! Error processors and the pipeline that runs them
//!
//! An [`ErrorProcessor`] is a side-effecting step run for every handled
//! error: logging, waiting before the next retry, telemetry. Processors may
//! also replace the error that later processors see.
//!
//! [`BulkErrorProcessor`] runs processors in registration order, records
//! each failure, and stops early on cancellation.

mod bulk;
mod delay;
mod func;
mod logging;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::context::ProcessingContext;
use crate::error::{ProcessorFault, SharedError};

pub use bulk::{BulkErrorProcessor, BulkProcessResult, ProcessorFailure, ProcessorFailureKind};
pub use delay::DelayErrorProcessor;
pub use func::FnErrorProcessor;
pub use logging::LoggingErrorProcessor;

/// A step run for each error a policy handles
#[async_trait]
pub trait ErrorProcessor: Send + Sync {
    /// Name used in logs and failure records
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Process `error` on the calling thread.
    ///
    /// Returns the error later processors should see, usually `error`
    /// itself.
    fn process(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault>;

    /// Process `error` without blocking the runtime.
    ///
    /// Defaults to [`process`](Self::process); override when the processor
    /// waits or performs I/O.
    async fn process_async(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault> {
        self.process(error, context, token)
    }
}
