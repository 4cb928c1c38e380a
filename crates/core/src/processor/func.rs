use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::ErrorProcessor;
use crate::context::ProcessingContext;
use crate::error::{BoxedError, ProcessorFault, SharedError};

type ProcessFn = dyn Fn(SharedError, &ProcessingContext, &CancellationToken) -> Result<SharedError, ProcessorFault>
    + Send
    + Sync;

/// Error processor backed by a closure
///
/// ```rust,ignore
/// let audit = FnErrorProcessor::action("audit", |error, ctx| {
///     AUDIT_LOG.record(ctx.policy_name(), error.to_string());
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct FnErrorProcessor {
    name: String,
    func: Arc<ProcessFn>,
}

impl FnErrorProcessor {
    /// Full control: sees the token and may replace the error or fail
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(SharedError, &ProcessingContext, &CancellationToken) -> Result<SharedError, ProcessorFault>
            + Send
            + Sync
            + 'static,
    {
        Self { name: name.into(), func: Arc::new(func) }
    }

    /// Side effect only; the error passes through unchanged
    pub fn action<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&SharedError, &ProcessingContext) -> Result<(), BoxedError> + Send + Sync + 'static,
    {
        Self::new(name, move |error, context, _token| {
            action(&error, context).map_err(ProcessorFault::faulted)?;
            Ok(error)
        })
    }

    /// Replace the error seen by later processors
    pub fn map<F>(name: impl Into<String>, map: F) -> Self
    where
        F: Fn(SharedError, &ProcessingContext) -> SharedError + Send + Sync + 'static,
    {
        Self::new(name, move |error, context, _token| Ok(map(error, context)))
    }
}

impl ErrorProcessor for FnErrorProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn process(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault> {
        (self.func)(error, context, token)
    }
}

impl fmt::Debug for FnErrorProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnErrorProcessor").field("name", &self.name).finish_non_exhaustive()
    }
}
