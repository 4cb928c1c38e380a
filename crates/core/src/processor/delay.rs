use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ErrorProcessor;
use crate::context::ProcessingContext;
use crate::delay::RetryDelay;
use crate::error::{ProcessorFault, SharedError};

/// Longest uninterrupted sleep on the blocking path
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Waits according to a [`RetryDelay`] before letting the error through.
///
/// The attempt index comes from the processing context, so the wait grows
/// with each retry. Cancellation interrupts the wait and is reported as
/// [`ProcessorFault::Canceled`].
#[derive(Debug, Clone)]
pub struct DelayErrorProcessor {
    delay: RetryDelay,
}

impl DelayErrorProcessor {
    pub fn new(delay: RetryDelay) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> &RetryDelay {
        &self.delay
    }

    fn wait_for(&self, context: &ProcessingContext) -> Duration {
        let attempt = context.attempt().unwrap_or(0);
        let wait = self.delay.delay(attempt);
        debug!(policy = context.policy_name(), attempt, wait_ms = wait.as_millis() as u64, "Delaying next attempt");
        wait
    }
}

#[async_trait]
impl ErrorProcessor for DelayErrorProcessor {
    fn name(&self) -> &str {
        "delay"
    }

    fn process(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault> {
        let wait = self.wait_for(context);
        if sleep_unless_canceled(wait, token) {
            Ok(error)
        } else {
            Err(ProcessorFault::Canceled)
        }
    }

    async fn process_async(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault> {
        let wait = self.wait_for(context);
        tokio::select! {
            biased;
            () = token.cancelled() => Err(ProcessorFault::Canceled),
            () = tokio::time::sleep(wait) => Ok(error),
        }
    }
}

/// Sleep in short slices, returning `false` as soon as `token` is canceled
fn sleep_unless_canceled(duration: Duration, token: &CancellationToken) -> bool {
    let deadline = Instant::now().checked_add(duration);
    loop {
        if token.is_cancelled() {
            return false;
        }
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => WAIT_SLICE,
        };
        if remaining.is_zero() {
            return true;
        }
        std::thread::sleep(remaining.min(WAIT_SLICE));
    }
}
