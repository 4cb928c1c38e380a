use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use super::ErrorProcessor;
use crate::context::ProcessingContext;
use crate::error::{ProcessorFault, SharedError};

/// Logs every handled error through `tracing`
#[derive(Debug, Clone, Copy)]
pub struct LoggingErrorProcessor {
    level: Level,
}

impl LoggingErrorProcessor {
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for LoggingErrorProcessor {
    fn default() -> Self {
        Self::new(Level::WARN)
    }
}

impl ErrorProcessor for LoggingErrorProcessor {
    fn name(&self) -> &str {
        "logging"
    }

    fn process(
        &self,
        err: SharedError,
        context: &ProcessingContext,
        _token: &CancellationToken,
    ) -> Result<SharedError, ProcessorFault> {
        let policy = context.policy_name();
        let kind = context.kind();
        let attempt = context.attempt();

        if self.level == Level::ERROR {
            error!(policy, %kind, ?attempt, error = %err, "Policy handled error");
        } else if self.level == Level::WARN {
            warn!(policy, %kind, ?attempt, error = %err, "Policy handled error");
        } else if self.level == Level::INFO {
            info!(policy, %kind, ?attempt, error = %err, "Policy handled error");
        } else {
            debug!(policy, %kind, ?attempt, error = %err, "Policy handled error");
        }
        Ok(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use holdfast_common::observability::init_test_tracing;
    use holdfast_common::testing::TestError;

    use super::*;
    use crate::error::share_error;

    /// Tests that logging leaves the error untouched at every level
    #[test]
    fn test_logging_passes_error_through() {
        let _ = init_test_tracing();
        let ctx = ProcessingContext::retry(Arc::from("logged"), 3);
        for level in [Level::ERROR, Level::WARN, Level::INFO, Level::DEBUG, Level::TRACE] {
            let error = share_error(TestError::transient("flaky upstream"));
            let out = LoggingErrorProcessor::new(level).process(Arc::clone(&error), &ctx, &CancellationToken::new());
            assert!(out.is_ok_and(|e| Arc::ptr_eq(&e, &error)));
        }
        assert_eq!(LoggingErrorProcessor::default().level(), Level::WARN);
    }
}
