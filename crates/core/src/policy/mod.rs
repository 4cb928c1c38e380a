//! Policy engines and their shared configuration
//!
//! Every policy owns a [`PolicyCore`]: its name, error filter, processor
//! pipeline and result handlers. The [`Policy`] trait exposes the builder
//! methods for that shared part, so they read the same on every policy:
//!
//! ```rust,ignore
//! let policy = FallbackPolicy::new()
//!     .with_name("price-feed")
//!     .include_error::<FeedError>()
//!     .add_error_processor(LoggingErrorProcessor::default())
//!     .with_fallback_action(|_| use_cached_prices());
//! ```

pub mod fallback;
pub mod retry;
pub mod simple;

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::context::PolicyKind;
use crate::error::{share_error, BoxedError, CatchBlockError, CatchBlockSource, SharedError};
use crate::filter::ErrorFilter;
use crate::processor::{BulkErrorProcessor, ErrorProcessor};
use crate::result::{PolicyResultFailedReason, PolicyStatus};

type ResultHandler =
    Arc<dyn Fn(&mut PolicyStatus, &CancellationToken) -> Result<(), BoxedError> + Send + Sync>;

/// Configuration shared by every policy kind
#[derive(Clone)]
pub struct PolicyCore {
    name: Arc<str>,
    filter: ErrorFilter,
    processors: BulkErrorProcessor,
    result_handlers: Vec<ResultHandler>,
    fail_on_result_handler_error: bool,
    fail_on_processor_fault: bool,
}

impl PolicyCore {
    pub(crate) fn new(kind: PolicyKind) -> Self {
        Self {
            name: Arc::from(kind.to_string()),
            filter: ErrorFilter::new(),
            processors: BulkErrorProcessor::new(),
            result_handlers: Vec::new(),
            fail_on_result_handler_error: false,
            fail_on_processor_fault: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    pub fn filter(&self) -> &ErrorFilter {
        &self.filter
    }

    pub fn processors(&self) -> &BulkErrorProcessor {
        &self.processors
    }

    pub(crate) fn processors_mut(&mut self) -> &mut BulkErrorProcessor {
        &mut self.processors
    }

    /// Whether a faulted error processor fails the invocation
    pub fn fails_on_processor_fault(&self) -> bool {
        self.fail_on_processor_fault
    }

    /// Run result handlers and log the final outcome
    pub(crate) fn finish(&self, status: &mut PolicyStatus, token: &CancellationToken) {
        for handler in &self.result_handlers {
            if let Err(err) = handler(status, token) {
                let error = share_error(err);
                warn!(policy = %self.name, error = %error, "Policy result handler failed");
                status.add_catch_block_error(CatchBlockError::new(error, CatchBlockSource::ResultHandler));
                if self.fail_on_result_handler_error {
                    status.set_failed_with_reason(PolicyResultFailedReason::PolicyResultHandlerFailed);
                }
            }
        }

        debug!(
            policy = %self.name,
            failed = status.is_failed(),
            canceled = status.is_canceled(),
            attempts = status.attempts(),
            errors = status.errors().len(),
            "Policy invocation finished"
        );
    }
}

impl fmt::Debug for PolicyCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyCore")
            .field("name", &self.name)
            .field("filter", &self.filter)
            .field("processors", &self.processors)
            .field("result_handlers", &self.result_handlers.len())
            .field("fail_on_result_handler_error", &self.fail_on_result_handler_error)
            .field("fail_on_processor_fault", &self.fail_on_processor_fault)
            .finish()
    }
}

/// Builder methods shared by all policies
pub trait Policy: Sized {
    fn kind(&self) -> PolicyKind;

    fn core(&self) -> &PolicyCore;

    fn core_mut(&mut self) -> &mut PolicyCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// Name recorded in results and log spans (defaults to the policy kind)
    fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.core_mut().name = Arc::from(name.into());
        self
    }

    /// Handle only errors of type `E` (plus any other includes)
    fn include_error<E: StdError + 'static>(mut self) -> Self {
        self.core_mut().filter.include_error::<E>();
        self
    }

    fn include_error_where<E, F>(mut self, predicate: F) -> Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.core_mut().filter.include_error_where::<E, F>(predicate);
        self
    }

    fn include_inner_error<E: StdError + 'static>(mut self) -> Self {
        self.core_mut().filter.include_inner_error::<E>();
        self
    }

    fn include_inner_error_where<E, F>(mut self, predicate: F) -> Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.core_mut().filter.include_inner_error_where::<E, F>(predicate);
        self
    }

    /// Never handle errors of type `E`
    fn exclude_error<E: StdError + 'static>(mut self) -> Self {
        self.core_mut().filter.exclude_error::<E>();
        self
    }

    fn exclude_error_where<E, F>(mut self, predicate: F) -> Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.core_mut().filter.exclude_error_where::<E, F>(predicate);
        self
    }

    fn exclude_inner_error<E: StdError + 'static>(mut self) -> Self {
        self.core_mut().filter.exclude_inner_error::<E>();
        self
    }

    fn exclude_inner_error_where<E, F>(mut self, predicate: F) -> Self
    where
        E: StdError + 'static,
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.core_mut().filter.exclude_inner_error_where::<E, F>(predicate);
        self
    }

    /// Merge a prepared filter into this policy's filter
    fn with_filter(mut self, filter: &ErrorFilter) -> Self {
        self.core_mut().filter.append(filter);
        self
    }

    fn add_error_processor<P: ErrorProcessor + 'static>(mut self, processor: P) -> Self {
        self.core_mut().processors.add_processor(processor);
        self
    }

    /// Run `handler` after every invocation, before the result is returned
    fn add_result_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&mut PolicyStatus, &CancellationToken) -> Result<(), BoxedError> + Send + Sync + 'static,
    {
        self.core_mut().result_handlers.push(Arc::new(handler));
        self
    }

    fn fail_on_result_handler_error(mut self, fail: bool) -> Self {
        self.core_mut().fail_on_result_handler_error = fail;
        self
    }

    fn fail_on_processor_fault(mut self, fail: bool) -> Self {
        self.core_mut().fail_on_processor_fault = fail;
        self
    }
}

/// Delegate outcome as seen by the engines
pub(crate) enum AttemptOutcome<T> {
    Succeeded(T),
    Failed(SharedError),
    /// Failed while the token was canceled
    Canceled(SharedError),
}

impl<T> AttemptOutcome<T> {
    pub(crate) fn from_result<E>(outcome: Result<T, E>, token: &CancellationToken) -> Self
    where
        E: Into<BoxedError>,
    {
        match outcome {
            Ok(value) => Self::Succeeded(value),
            Err(err) if token.is_cancelled() => Self::Canceled(share_error(err)),
            Err(err) => Self::Failed(share_error(err)),
        }
    }
}
