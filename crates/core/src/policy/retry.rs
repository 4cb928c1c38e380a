//! Retry policy
//!
//! Re-runs a delegate until it succeeds, the error filter rejects an error,
//! the retry budget runs out, or the token is canceled.
//!
//! Every failed attempt goes through the catch-block handler with a
//! [`ProcessingContext`] carrying the attempt index, so a
//! [`DelayErrorProcessor`] registered via [`RetryPolicy::with_wait`] can
//! back off between attempts.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{AttemptOutcome, Policy, PolicyCore};
use crate::catch_block::{CatchBlockHandler, CatchBlockOutcome};
use crate::context::{PolicyKind, ProcessingContext};
use crate::delay::RetryDelay;
use crate::error::{BoxedError, CatchBlockError, CatchBlockSource, ProcessorFault, SharedError};
use crate::processor::{DelayErrorProcessor, ErrorProcessor};
use crate::result::{PolicyResult, PolicyStatus};

/// Retry count used to represent "retry forever"
pub const INFINITE_RETRY_SENTINEL: u32 = u32::MAX - 1;

type CanRetryFn = Arc<dyn Fn(u32) -> bool + Send + Sync>;

/// How many times a delegate may be retried
#[derive(Clone)]
pub struct RetryCountInfo {
    retry_count: u32,
    start_try: u32,
    can_retry: Option<CanRetryFn>,
}

impl RetryCountInfo {
    /// At most `retries` retries after the first attempt
    pub fn limited(retries: u32) -> Self {
        Self { retry_count: retries.min(INFINITE_RETRY_SENTINEL), start_try: 0, can_retry: None }
    }

    pub fn infinite() -> Self {
        Self::limited(INFINITE_RETRY_SENTINEL)
    }

    /// Start counting attempts at `start_try` instead of zero
    pub fn with_start_try(mut self, start_try: u32) -> Self {
        self.start_try = start_try;
        self
    }

    /// Replace the default budget rule with a custom predicate over the
    /// attempt index
    pub fn with_can_retry<F>(mut self, can_retry: F) -> Self
    where
        F: Fn(u32) -> bool + Send + Sync + 'static,
    {
        self.can_retry = Some(Arc::new(can_retry));
        self
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn start_try(&self) -> u32 {
        self.start_try
    }

    pub fn is_infinite(&self) -> bool {
        self.retry_count == INFINITE_RETRY_SENTINEL
    }

    /// Whether another attempt may follow the failed `attempt`
    pub fn can_retry(&self, attempt: u32) -> bool {
        match &self.can_retry {
            Some(predicate) => predicate(attempt),
            None => attempt.saturating_sub(self.start_try) < self.retry_count,
        }
    }
}

impl fmt::Debug for RetryCountInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryCountInfo")
            .field("retry_count", &self.retry_count)
            .field("start_try", &self.start_try)
            .field("custom_rule", &self.can_retry.is_some())
            .finish()
    }
}

/// Per-invocation attempt index
struct AttemptCounter(AtomicU32);

impl AttemptCounter {
    fn new(start: u32) -> Self {
        Self(AtomicU32::new(start))
    }

    fn current(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }

    fn advance(&self) {
        // Saturates instead of wrapping
        let _ = self.0.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_add(1));
    }
}

/// Policy that retries a failing delegate
#[derive(Clone)]
pub struct RetryPolicy {
    core: PolicyCore,
    count: RetryCountInfo,
    error_saver: Option<Arc<dyn ErrorProcessor>>,
    fail_on_saver_error: bool,
}

impl RetryPolicy {
    /// Retry up to `retries` times after the first attempt
    pub fn new(retries: u32) -> Self {
        Self::with_count_info(RetryCountInfo::limited(retries))
    }

    /// Retry until success, filter rejection or cancellation
    pub fn infinite() -> Self {
        Self::with_count_info(RetryCountInfo::infinite())
    }

    pub fn with_count_info(count: RetryCountInfo) -> Self {
        Self {
            core: PolicyCore::new(PolicyKind::Retry),
            count,
            error_saver: None,
            fail_on_saver_error: false,
        }
    }

    /// Wait between attempts according to `delay`
    pub fn with_wait(mut self, delay: RetryDelay) -> Self {
        self.core.processors_mut().add_processor(DelayErrorProcessor::new(delay));
        self
    }

    /// Hand each error to `saver` instead of collecting it in
    /// [`PolicyResult::errors`]
    pub fn with_custom_error_saver<P: ErrorProcessor + 'static>(mut self, saver: P) -> Self {
        self.error_saver = Some(Arc::new(saver));
        self
    }

    /// Stop retrying when the custom error saver fails
    pub fn fail_on_saver_error(mut self, fail: bool) -> Self {
        self.fail_on_saver_error = fail;
        self
    }

    pub fn count_info(&self) -> &RetryCountInfo {
        &self.count
    }

    /// Run `func` until it succeeds or the policy gives up
    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    pub fn handle<T, E, F>(&self, mut func: F, token: &CancellationToken) -> PolicyResult<T>
    where
        F: FnMut() -> Result<T, E>,
        E: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        let attempts = AttemptCounter::new(self.count.start_try());

        loop {
            let attempt = attempts.current();
            if !self.ready_for(attempt, result.status_mut(), token) {
                break;
            }

            result.status_mut().record_attempt();
            let error = match AttemptOutcome::from_result(func(), token) {
                AttemptOutcome::Succeeded(value) => {
                    self.succeeded(value, attempt, &mut result);
                    break;
                }
                AttemptOutcome::Canceled(error) => {
                    self.canceled_during(error, attempt, result.status_mut());
                    break;
                }
                AttemptOutcome::Failed(error) => error,
            };

            let context = ProcessingContext::retry(self.core.shared_name(), attempt);
            if !self.save_error(Arc::clone(&error), &context, result.status_mut(), token) {
                break;
            }
            let outcome = CatchBlockHandler::new(&self.core, token).handle(
                error,
                &context,
                result.status_mut(),
                || self.count.can_retry(attempt),
            );
            if !self.should_continue(outcome, attempt) {
                break;
            }
            attempts.advance();
        }

        self.core.finish(result.status_mut(), token);
        result
    }

    /// Run `func` until it succeeds or the policy gives up, awaiting
    /// processors (including delays) between attempts
    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    pub async fn handle_async<T, E, F, Fut>(&self, mut func: F, token: &CancellationToken) -> PolicyResult<T>
    where
        F: FnMut(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        let attempts = AttemptCounter::new(self.count.start_try());

        loop {
            let attempt = attempts.current();
            if !self.ready_for(attempt, result.status_mut(), token) {
                break;
            }

            result.status_mut().record_attempt();
            let error = match AttemptOutcome::from_result(func(token.clone()).await, token) {
                AttemptOutcome::Succeeded(value) => {
                    self.succeeded(value, attempt, &mut result);
                    break;
                }
                AttemptOutcome::Canceled(error) => {
                    self.canceled_during(error, attempt, result.status_mut());
                    break;
                }
                AttemptOutcome::Failed(error) => error,
            };

            let context = ProcessingContext::retry(self.core.shared_name(), attempt);
            if !self.save_error_async(Arc::clone(&error), &context, result.status_mut(), token).await {
                break;
            }
            let outcome = CatchBlockHandler::new(&self.core, token)
                .handle_async(error, &context, result.status_mut(), || self.count.can_retry(attempt))
                .await;
            if !self.should_continue(outcome, attempt) {
                break;
            }
            attempts.advance();
        }

        self.core.finish(result.status_mut(), token);
        result
    }

    /// Check the token before an attempt; `false` means stop
    fn ready_for(&self, attempt: u32, status: &mut PolicyStatus, token: &CancellationToken) -> bool {
        if !token.is_cancelled() {
            return true;
        }
        if attempt == self.count.start_try() {
            debug!(policy = self.core.name(), "Canceled before first attempt");
            status.set_canceled();
        } else {
            debug!(policy = self.core.name(), attempt, "Canceled between attempts");
            status.set_failed_and_canceled();
        }
        false
    }

    fn succeeded<T>(&self, value: T, attempt: u32, result: &mut PolicyResult<T>) {
        debug!(policy = self.core.name(), attempt, "Attempt succeeded");
        result.set_ok(value, attempt == self.count.start_try());
    }

    fn canceled_during(&self, error: SharedError, attempt: u32, status: &mut PolicyStatus) {
        debug!(policy = self.core.name(), attempt, error = %error, "Attempt failed after cancellation");
        status.add_error(error);
        status.set_failed_and_canceled();
    }

    fn should_continue(&self, outcome: CatchBlockOutcome, attempt: u32) -> bool {
        match outcome {
            CatchBlockOutcome::Handled => {
                debug!(policy = self.core.name(), attempt, "Retrying after handled error");
                true
            }
            CatchBlockOutcome::RulesRejected => {
                warn!(policy = self.core.name(), attempt, "Retry attempts exhausted");
                false
            }
            other => {
                debug!(policy = self.core.name(), attempt, outcome = ?other, "Stopping retries");
                false
            }
        }
    }

    /// Record `error`; `false` means the saver failed fatally
    fn save_error(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        status: &mut PolicyStatus,
        token: &CancellationToken,
    ) -> bool {
        let Some(saver) = &self.error_saver else {
            status.add_error(error);
            return true;
        };
        status.set_unprocessed_error(Arc::clone(&error));
        match saver.process(error, context, token) {
            Ok(_) => true,
            Err(fault) => self.saver_failed(fault, status),
        }
    }

    async fn save_error_async(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        status: &mut PolicyStatus,
        token: &CancellationToken,
    ) -> bool {
        let Some(saver) = &self.error_saver else {
            status.add_error(error);
            return true;
        };
        status.set_unprocessed_error(Arc::clone(&error));
        match saver.process_async(error, context, token).await {
            Ok(_) => true,
            Err(fault) => self.saver_failed(fault, status),
        }
    }

    fn saver_failed(&self, fault: ProcessorFault, status: &mut PolicyStatus) -> bool {
        let error = fault.into_error();
        warn!(policy = self.core.name(), error = %error, "Custom error saver failed");
        status.add_catch_block_error(CatchBlockError::new(error, CatchBlockSource::ErrorSaver));
        if self.fail_on_saver_error {
            status.set_failed();
            false
        } else {
            true
        }
    }
}

impl Policy for RetryPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Retry
    }

    fn core(&self) -> &PolicyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.core
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("core", &self.core)
            .field("count", &self.count)
            .field("custom_error_saver", &self.error_saver.is_some())
            .field("fail_on_saver_error", &self.fail_on_saver_error)
            .finish()
    }
}
