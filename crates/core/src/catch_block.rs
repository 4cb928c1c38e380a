//! Handling of a single delegate error
//!
//! The catch-block handler is what every engine runs when its delegate
//! fails: consult the filter, ask the engine whether it may continue, run
//! the processor pipeline, and record each outcome on the result.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::ProcessingContext;
use crate::error::{CatchBlockError, CatchBlockSource, SharedError};
use crate::policy::PolicyCore;
use crate::processor::BulkProcessResult;
use crate::result::{PolicyResultFailedReason, PolicyStatus};

/// What the engine should do after an error was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchBlockOutcome {
    /// Handled; the engine may retry or fall back
    Handled,
    /// The filter rejected the error
    FilterUnsatisfied,
    /// The filter failed while deciding
    FilterFailed,
    /// The engine's own rule (for retries, the budget) refused to continue
    RulesRejected,
    /// A processor faulted and the policy treats that as fatal
    ProcessorFailed,
    /// The processor pipeline observed cancellation
    Canceled,
}

impl CatchBlockOutcome {
    pub fn is_handled(self) -> bool {
        self == Self::Handled
    }
}

/// Applies a policy's filter and processors to one error
pub struct CatchBlockHandler<'a> {
    core: &'a PolicyCore,
    token: &'a CancellationToken,
}

impl<'a> CatchBlockHandler<'a> {
    pub fn new(core: &'a PolicyCore, token: &'a CancellationToken) -> Self {
        Self { core, token }
    }

    /// Handle `error`, running processors on the calling thread.
    ///
    /// `can_continue` is only consulted once the filter accepted the error.
    pub fn handle<F>(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        status: &mut PolicyStatus,
        can_continue: F,
    ) -> CatchBlockOutcome
    where
        F: FnOnce() -> bool,
    {
        if let Some(outcome) = self.precheck(&error, status, can_continue) {
            return outcome;
        }
        let processed = self.core.processors().process(error, context, self.token);
        self.fold(processed, status)
    }

    /// Handle `error`, awaiting each processor
    pub async fn handle_async<F>(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        status: &mut PolicyStatus,
        can_continue: F,
    ) -> CatchBlockOutcome
    where
        F: FnOnce() -> bool,
    {
        if let Some(outcome) = self.precheck(&error, status, can_continue) {
            return outcome;
        }
        let processed = self.core.processors().process_async(error, context, self.token).await;
        self.fold(processed, status)
    }

    fn precheck<F>(
        &self,
        error: &SharedError,
        status: &mut PolicyStatus,
        can_continue: F,
    ) -> Option<CatchBlockOutcome>
    where
        F: FnOnce() -> bool,
    {
        match self.core.filter().accepts(&**error) {
            Ok(true) => {}
            Ok(false) => {
                debug!(policy = self.core.name(), error = %error, "Error rejected by filter");
                status.set_error_filter_unsatisfied();
                status.set_failed();
                return Some(CatchBlockOutcome::FilterUnsatisfied);
            }
            Err(filter_error) => {
                warn!(policy = self.core.name(), error = %filter_error, "Error filter failed");
                status.add_catch_block_error(CatchBlockError::critical(
                    filter_error,
                    CatchBlockSource::ErrorFilter,
                ));
                status.set_failed_with_reason(PolicyResultFailedReason::UnhandledError);
                return Some(CatchBlockOutcome::FilterFailed);
            }
        }

        if can_continue() {
            None
        } else {
            status.set_failed();
            Some(CatchBlockOutcome::RulesRejected)
        }
    }

    fn fold(&self, processed: BulkProcessResult, status: &mut PolicyStatus) -> CatchBlockOutcome {
        let canceled = processed.is_canceled();
        let faulted = processed.has_faults();
        status.add_bulk_errors(processed.into_failures());

        if canceled {
            status.set_failed_and_canceled();
            CatchBlockOutcome::Canceled
        } else if faulted && self.core.fails_on_processor_fault() {
            status.set_failed_with_reason(PolicyResultFailedReason::PolicyProcessorFailed);
            CatchBlockOutcome::ProcessorFailed
        } else {
            CatchBlockOutcome::Handled
        }
    }
}
