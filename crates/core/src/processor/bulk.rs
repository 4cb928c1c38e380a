use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::ErrorProcessor;
use crate::context::ProcessingContext;
use crate::error::{ProcessorFault, SharedError};

/// How a processor failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorFailureKind {
    /// The processor returned an error
    Faulted,
    /// The token was canceled before or while the processor ran
    Canceled,
}

/// One processor's failure within a pipeline run
#[derive(Debug, Clone)]
pub struct ProcessorFailure {
    processor: String,
    kind: ProcessorFailureKind,
    error: Option<SharedError>,
}

impl ProcessorFailure {
    fn canceled(processor: &str) -> Self {
        Self { processor: processor.to_string(), kind: ProcessorFailureKind::Canceled, error: None }
    }

    // A fault observed while the token is canceled counts as cancellation.
    fn from_fault(processor: &str, fault: ProcessorFault, token: &CancellationToken) -> Self {
        let (kind, error) = match fault {
            ProcessorFault::Canceled => (ProcessorFailureKind::Canceled, None),
            ProcessorFault::Faulted(error) if token.is_cancelled() => {
                (ProcessorFailureKind::Canceled, Some(error))
            }
            ProcessorFault::Faulted(error) => (ProcessorFailureKind::Faulted, Some(error)),
        };
        Self { processor: processor.to_string(), kind, error }
    }

    /// Name of the failing processor
    pub fn processor(&self) -> &str {
        &self.processor
    }

    /// Whether the processor faulted or was canceled
    pub fn kind(&self) -> ProcessorFailureKind {
        self.kind
    }

    /// Error raised by the processor, absent for plain cancellation
    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    /// Shorthand for `kind() == Canceled`
    pub fn is_canceled(&self) -> bool {
        self.kind == ProcessorFailureKind::Canceled
    }
}

/// Outcome of one pipeline run
#[derive(Debug, Clone)]
pub struct BulkProcessResult {
    original: SharedError,
    current: SharedError,
    failures: Vec<ProcessorFailure>,
}

impl BulkProcessResult {
    fn new(error: SharedError) -> Self {
        Self { current: Arc::clone(&error), original: error, failures: Vec::new() }
    }

    /// The error the pipeline was started with
    pub fn original_error(&self) -> &SharedError {
        &self.original
    }

    /// The error after every processor that ran
    pub fn final_error(&self) -> &SharedError {
        &self.current
    }

    /// Failures in the order the processors ran
    pub fn failures(&self) -> &[ProcessorFailure] {
        &self.failures
    }

    /// Consume the result, keeping only the failures
    pub fn into_failures(self) -> Vec<ProcessorFailure> {
        self.failures
    }

    /// `true` when the run stopped on cancellation
    pub fn is_canceled(&self) -> bool {
        self.failures.iter().any(ProcessorFailure::is_canceled)
    }

    /// `true` when any processor faulted
    pub fn has_faults(&self) -> bool {
        self.failures.iter().any(|f| f.kind == ProcessorFailureKind::Faulted)
    }

    /// Fold one processor outcome in; returns `false` when the run must stop
    fn record(
        &mut self,
        processor: &str,
        outcome: Result<SharedError, ProcessorFault>,
        token: &CancellationToken,
    ) -> bool {
        match outcome {
            Ok(next) => {
                self.current = next;
                true
            }
            Err(fault) => {
                let failure = ProcessorFailure::from_fault(processor, fault, token);
                match failure.error() {
                    Some(error) => warn!(processor, kind = ?failure.kind, error = %error, "Error processor failed"),
                    None => warn!(processor, kind = ?failure.kind, "Error processor failed"),
                }
                let keep_going = !failure.is_canceled();
                self.failures.push(failure);
                keep_going
            }
        }
    }

    fn stop_canceled(&mut self, processor: &str) {
        debug!(processor, "Token canceled before error processor ran");
        self.failures.push(ProcessorFailure::canceled(processor));
    }
}

/// Ordered pipeline of error processors
#[derive(Clone, Default)]
pub struct BulkErrorProcessor {
    processors: Vec<Arc<dyn ErrorProcessor>>,
}

impl BulkErrorProcessor {
    /// Empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `processor`; processors run in the order they were added
    pub fn add_processor<P>(&mut self, processor: P) -> &mut Self
    where
        P: ErrorProcessor + 'static,
    {
        self.processors.push(Arc::new(processor));
        self
    }

    /// Register a processor already shared elsewhere
    pub fn add_shared(&mut self, processor: Arc<dyn ErrorProcessor>) -> &mut Self {
        self.processors.push(processor);
        self
    }

    /// Number of registered processors
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Run every processor on the calling thread
    pub fn process(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> BulkProcessResult {
        let mut result = BulkProcessResult::new(error);
        for processor in &self.processors {
            if token.is_cancelled() {
                result.stop_canceled(processor.name());
                break;
            }
            let outcome = processor.process(Arc::clone(&result.current), context, token);
            if !result.record(processor.name(), outcome, token) {
                break;
            }
        }
        result
    }

    /// Run every processor, awaiting each in turn
    pub async fn process_async(
        &self,
        error: SharedError,
        context: &ProcessingContext,
        token: &CancellationToken,
    ) -> BulkProcessResult {
        let mut result = BulkProcessResult::new(error);
        for processor in &self.processors {
            if token.is_cancelled() {
                result.stop_canceled(processor.name());
                break;
            }
            let outcome = processor.process_async(Arc::clone(&result.current), context, token).await;
            if !result.record(processor.name(), outcome, token) {
                break;
            }
        }
        result
    }
}

impl fmt::Debug for BulkErrorProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.processors.iter().map(|p| p.name())).finish()
    }
}
