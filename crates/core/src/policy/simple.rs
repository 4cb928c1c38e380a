//! Simple policy
//!
//! Runs a delegate once and folds its failure into a [`PolicyResult`] after
//! the filter and processors have seen it. With
//! [`rethrow_if_unsatisfied`](SimplePolicy::rethrow_if_unsatisfied), the
//! `execute` entry points hand filter-rejected errors straight back to the
//! caller instead.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::{AttemptOutcome, Policy, PolicyCore};
use crate::catch_block::{CatchBlockHandler, CatchBlockOutcome};
use crate::context::{PolicyKind, ProcessingContext};
use crate::error::{BoxedError, SharedError};
use crate::result::PolicyResult;

/// Policy that runs a delegate once
#[derive(Debug, Clone)]
pub struct SimplePolicy {
    core: PolicyCore,
    rethrow_if_unsatisfied: bool,
}

impl SimplePolicy {
    pub fn new() -> Self {
        Self { core: PolicyCore::new(PolicyKind::Simple), rethrow_if_unsatisfied: false }
    }

    /// Make `execute` return filter-rejected errors as `Err`
    pub fn rethrow_if_unsatisfied(mut self, rethrow: bool) -> Self {
        self.rethrow_if_unsatisfied = rethrow;
        self
    }

    /// Run `func` once; nothing is propagated
    pub fn handle<T, E, F>(&self, func: F, token: &CancellationToken) -> PolicyResult<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxedError>,
    {
        self.run(func, token).0
    }

    /// Run `func` once, returning a filter-rejected error when configured to
    pub fn execute<T, E, F>(&self, func: F, token: &CancellationToken) -> Result<PolicyResult<T>, SharedError>
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxedError>,
    {
        let (result, outcome) = self.run(func, token);
        self.rethrow(result, outcome)
    }

    pub async fn handle_async<T, E, F, Fut>(&self, func: F, token: &CancellationToken) -> PolicyResult<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxedError>,
    {
        self.run_async(func, token).await.0
    }

    pub async fn execute_async<T, E, F, Fut>(
        &self,
        func: F,
        token: &CancellationToken,
    ) -> Result<PolicyResult<T>, SharedError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxedError>,
    {
        let (result, outcome) = self.run_async(func, token).await;
        self.rethrow(result, outcome)
    }

    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    fn run<T, E, F>(&self, func: F, token: &CancellationToken) -> (PolicyResult<T>, Option<CatchBlockOutcome>)
    where
        F: FnOnce() -> Result<T, E>,
        E: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        let mut outcome = None;

        if self.start(&mut result, token) {
            let attempt = AttemptOutcome::from_result(func(), token);
            if let Some(error) = self.record(attempt, &mut result) {
                let context = ProcessingContext::new(PolicyKind::Simple, self.core.shared_name());
                let handled = CatchBlockHandler::new(&self.core, token).handle(
                    error,
                    &context,
                    result.status_mut(),
                    || true,
                );
                outcome = Some(handled);
            }
        }

        self.core.finish(result.status_mut(), token);
        (result, outcome)
    }

    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    async fn run_async<T, E, F, Fut>(
        &self,
        func: F,
        token: &CancellationToken,
    ) -> (PolicyResult<T>, Option<CatchBlockOutcome>)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        let mut outcome = None;

        if self.start(&mut result, token) {
            let attempt = AttemptOutcome::from_result(func(token.clone()).await, token);
            if let Some(error) = self.record(attempt, &mut result) {
                let context = ProcessingContext::new(PolicyKind::Simple, self.core.shared_name());
                let handled = CatchBlockHandler::new(&self.core, token)
                    .handle_async(error, &context, result.status_mut(), || true)
                    .await;
                outcome = Some(handled);
            }
        }

        self.core.finish(result.status_mut(), token);
        (result, outcome)
    }

    /// `false` when canceled before the delegate ran
    fn start<T>(&self, result: &mut PolicyResult<T>, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            debug!(policy = self.core.name(), "Canceled before delegate");
            result.status_mut().set_canceled();
            return false;
        }
        result.status_mut().record_attempt();
        true
    }

    /// Record the delegate outcome; returns the error still to be handled.
    ///
    /// A failure always fails the result since nothing recovers from it.
    fn record<T>(&self, attempt: AttemptOutcome<T>, result: &mut PolicyResult<T>) -> Option<SharedError> {
        match attempt {
            AttemptOutcome::Succeeded(value) => {
                result.set_ok(value, true);
                None
            }
            AttemptOutcome::Canceled(error) => {
                result.status_mut().add_error(error);
                result.status_mut().set_failed_and_canceled();
                None
            }
            AttemptOutcome::Failed(error) => {
                result.status_mut().add_error(Arc::clone(&error));
                result.status_mut().set_failed();
                Some(error)
            }
        }
    }

    fn rethrow<T>(
        &self,
        result: PolicyResult<T>,
        outcome: Option<CatchBlockOutcome>,
    ) -> Result<PolicyResult<T>, SharedError> {
        if self.rethrow_if_unsatisfied && outcome == Some(CatchBlockOutcome::FilterUnsatisfied) {
            if let Some(error) = result.last_error() {
                debug!(policy = self.core.name(), error = %error, "Rethrowing error rejected by filter");
                return Err(Arc::clone(error));
            }
        }
        Ok(result)
    }
}

impl Default for SimplePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for SimplePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Simple
    }

    fn core(&self) -> &PolicyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.core
    }
}
