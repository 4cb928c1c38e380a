//! Fallback policy
//!
//! Runs a primary delegate once. When it fails with an error the filter
//! accepts (and the processors did not cancel), a fallback delegate runs in
//! its place and its value becomes the result.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{AttemptOutcome, Policy, PolicyCore};
use crate::catch_block::CatchBlockHandler;
use crate::context::{PolicyKind, ProcessingContext};
use crate::error::{share_error, BoxedError, CatchBlockError, CatchBlockSource, SharedError};
use crate::result::PolicyResult;

type FallbackAction = Arc<dyn Fn(&CancellationToken) -> Result<(), BoxedError> + Send + Sync>;
type AsyncFallbackAction =
    Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, Result<(), BoxedError>> + Send + Sync>;

/// Policy that substitutes a fallback for a failed delegate
#[derive(Clone)]
pub struct FallbackPolicy {
    core: PolicyCore,
    fallback_action: Option<FallbackAction>,
    async_fallback_action: Option<AsyncFallbackAction>,
}

impl FallbackPolicy {
    pub fn new() -> Self {
        Self { core: PolicyCore::new(PolicyKind::Fallback), fallback_action: None, async_fallback_action: None }
    }

    /// Fallback used by [`handle_action`](Self::handle_action)
    pub fn with_fallback_action<F, E>(mut self, action: F) -> Self
    where
        F: Fn(&CancellationToken) -> Result<(), E> + Send + Sync + 'static,
        E: Into<BoxedError>,
    {
        let fallback: FallbackAction =
            Arc::new(move |token: &CancellationToken| action(token).map_err(Into::<BoxedError>::into));
        self.fallback_action = Some(fallback);
        self
    }

    /// Fallback used by [`handle_action_async`](Self::handle_action_async)
    pub fn with_async_fallback_action<F, Fut, E>(mut self, action: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxedError>,
    {
        let fallback: AsyncFallbackAction = Arc::new(move |token| {
            let pending = action(token);
            async move { pending.await.map_err(Into::<BoxedError>::into) }.boxed()
        });
        self.async_fallback_action = Some(fallback);
        self
    }

    /// Run `primary`; on a handled failure run `fallback` instead
    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    pub fn handle<T, E, FE, P, F>(&self, primary: P, fallback: F, token: &CancellationToken) -> PolicyResult<T>
    where
        P: FnOnce() -> Result<T, E>,
        F: FnOnce(&CancellationToken) -> Result<T, FE>,
        E: Into<BoxedError>,
        FE: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        if self.start(&mut result, token) {
            result.status_mut().record_attempt();
            if let Some(error) = self.primary_failed(AttemptOutcome::from_result(primary(), token), &mut result) {
                let context = ProcessingContext::new(PolicyKind::Fallback, self.core.shared_name());
                let outcome = CatchBlockHandler::new(&self.core, token).handle(
                    error,
                    &context,
                    result.status_mut(),
                    || true,
                );
                if outcome.is_handled() && self.fallback_allowed(&mut result, token) {
                    self.apply_fallback(fallback(token), &mut result, token);
                }
            }
        }

        self.core.finish(result.status_mut(), token);
        result
    }

    /// Async counterpart of [`handle`](Self::handle)
    #[instrument(level = "debug", skip_all, fields(policy = %self.core.name()))]
    pub async fn handle_async<T, E, FE, P, PFut, F, FFut>(
        &self,
        primary: P,
        fallback: F,
        token: &CancellationToken,
    ) -> PolicyResult<T>
    where
        P: FnOnce(CancellationToken) -> PFut,
        PFut: Future<Output = Result<T, E>>,
        F: FnOnce(CancellationToken) -> FFut,
        FFut: Future<Output = Result<T, FE>>,
        E: Into<BoxedError>,
        FE: Into<BoxedError>,
    {
        let mut result = PolicyResult::new(self.core.shared_name());
        if self.start(&mut result, token) {
            result.status_mut().record_attempt();
            let outcome = AttemptOutcome::from_result(primary(token.clone()).await, token);
            if let Some(error) = self.primary_failed(outcome, &mut result) {
                let context = ProcessingContext::new(PolicyKind::Fallback, self.core.shared_name());
                let outcome = CatchBlockHandler::new(&self.core, token)
                    .handle_async(error, &context, result.status_mut(), || true)
                    .await;
                if outcome.is_handled() && self.fallback_allowed(&mut result, token) {
                    let fallback_outcome = fallback(token.clone()).await;
                    self.apply_fallback(fallback_outcome, &mut result, token);
                }
            }
        }

        self.core.finish(result.status_mut(), token);
        result
    }

    /// Run `primary` with the configured fallback action.
    ///
    /// Without a configured action the result fails with
    /// [`DelegateIsNull`](crate::PolicyResultFailedReason::DelegateIsNull)
    /// and `primary` is never run.
    pub fn handle_action<E, P>(&self, primary: P, token: &CancellationToken) -> PolicyResult
    where
        P: FnOnce() -> Result<(), E>,
        E: Into<BoxedError>,
    {
        match &self.fallback_action {
            Some(action) => {
                let action = Arc::clone(action);
                self.handle(primary, move |token| action(token), token)
            }
            None => self.missing_fallback(token),
        }
    }

    /// Async counterpart of [`handle_action`](Self::handle_action).
    ///
    /// Prefers the async fallback action, then the blocking one.
    pub async fn handle_action_async<E, P, PFut>(&self, primary: P, token: &CancellationToken) -> PolicyResult
    where
        P: FnOnce(CancellationToken) -> PFut,
        PFut: Future<Output = Result<(), E>>,
        E: Into<BoxedError>,
    {
        if let Some(action) = &self.async_fallback_action {
            let action = Arc::clone(action);
            return self.handle_async(primary, move |token| action(token), token).await;
        }
        if let Some(action) = &self.fallback_action {
            let action = Arc::clone(action);
            return self
                .handle_async(primary, move |token| std::future::ready(action(&token)), token)
                .await;
        }
        self.missing_fallback(token)
    }

    fn missing_fallback(&self, token: &CancellationToken) -> PolicyResult {
        warn!(policy = self.core.name(), "No fallback action configured");
        let mut result = PolicyResult::for_missing_delegate(self.core.shared_name());
        self.core.finish(result.status_mut(), token);
        result
    }

    /// `false` when canceled before the primary ran
    fn start<T>(&self, result: &mut PolicyResult<T>, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            debug!(policy = self.core.name(), "Canceled before primary delegate");
            result.status_mut().set_canceled();
            return false;
        }
        true
    }

    /// Record the primary outcome; returns the error still to be handled
    fn primary_failed<T>(
        &self,
        outcome: AttemptOutcome<T>,
        result: &mut PolicyResult<T>,
    ) -> Option<SharedError> {
        match outcome {
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
                debug!(policy = self.core.name(), error = %error, "Primary delegate failed");
                result.status_mut().add_error(Arc::clone(&error));
                Some(error)
            }
        }
    }

    fn fallback_allowed<T>(&self, result: &mut PolicyResult<T>, token: &CancellationToken) -> bool {
        if token.is_cancelled() {
            result.status_mut().set_failed_and_canceled();
            return false;
        }
        true
    }

    fn apply_fallback<T, FE>(&self, outcome: Result<T, FE>, result: &mut PolicyResult<T>, token: &CancellationToken)
    where
        FE: Into<BoxedError>,
    {
        match outcome {
            Ok(value) => {
                debug!(policy = self.core.name(), "Fallback succeeded");
                result.set_ok(value, false);
            }
            Err(err) => {
                let error = share_error(err);
                warn!(policy = self.core.name(), error = %error, "Fallback delegate failed");
                result
                    .status_mut()
                    .add_catch_block_error(CatchBlockError::new(error, CatchBlockSource::Fallback));
                if token.is_cancelled() {
                    result.status_mut().set_failed_and_canceled();
                } else {
                    result.status_mut().set_failed();
                }
            }
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl Policy for FallbackPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Fallback
    }

    fn core(&self) -> &PolicyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut PolicyCore {
        &mut self.core
    }
}

impl fmt::Debug for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackPolicy")
            .field("core", &self.core)
            .field("fallback_action", &self.fallback_action.is_some())
            .field("async_fallback_action", &self.async_fallback_action.is_some())
            .finish()
    }
}
