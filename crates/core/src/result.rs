//! Outcome of a single policy invocation

use std::sync::Arc;

use crate::error::{CatchBlockError, NoDelegateError, SharedError};
use crate::processor::ProcessorFailure;

/// Why a result failed, when the failure came from the policy machinery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyResultFailedReason {
    /// Failed because the delegate failed, or not failed at all
    #[default]
    None,
    /// No delegate was available to run
    DelegateIsNull,
    /// An error processor faulted and the policy treats that as fatal
    PolicyProcessorFailed,
    /// The handling machinery itself failed (for example the error filter)
    UnhandledError,
    /// A result handler failed and the policy treats that as fatal
    PolicyResultHandlerFailed,
}

/// Value-independent part of a [`PolicyResult`]
///
/// Result handlers receive this by mutable reference after each
/// invocation.
#[derive(Debug, Clone, Default)]
pub struct PolicyStatus {
    policy_name: Option<Arc<str>>,
    failed: bool,
    canceled: bool,
    success: bool,
    attempts: u32,
    errors: Vec<SharedError>,
    unprocessed_error: Option<SharedError>,
    failed_reason: PolicyResultFailedReason,
    catch_block_errors: Vec<CatchBlockError>,
    bulk_errors: Vec<ProcessorFailure>,
    error_filter_unsatisfied: bool,
}

impl PolicyStatus {
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// The first attempt succeeded without any error
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Number of times the delegate was invoked
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delegate errors in the order they occurred
    pub fn errors(&self) -> &[SharedError] {
        &self.errors
    }

    pub fn last_error(&self) -> Option<&SharedError> {
        self.errors.last().or(self.unprocessed_error.as_ref())
    }

    /// Latest error handed to a custom error saver instead of [`errors`](Self::errors)
    pub fn unprocessed_error(&self) -> Option<&SharedError> {
        self.unprocessed_error.as_ref()
    }

    pub fn failed_reason(&self) -> PolicyResultFailedReason {
        self.failed_reason
    }

    /// Errors raised by filters, savers, fallbacks and result handlers
    pub fn catch_block_errors(&self) -> &[CatchBlockError] {
        &self.catch_block_errors
    }

    /// Processor failures from every pipeline run
    pub fn bulk_errors(&self) -> &[ProcessorFailure] {
        &self.bulk_errors
    }

    pub fn error_filter_unsatisfied(&self) -> bool {
        self.error_filter_unsatisfied
    }

    pub fn policy_name(&self) -> Option<&str> {
        self.policy_name.as_deref()
    }

    /// Mark the result failed. Failure is never undone.
    pub fn set_failed(&mut self) {
        self.failed = true;
        self.success = false;
    }

    /// Mark the result failed, keeping the first specific reason recorded
    pub(crate) fn set_failed_with_reason(&mut self, reason: PolicyResultFailedReason) {
        self.set_failed();
        if self.failed_reason == PolicyResultFailedReason::None {
            self.failed_reason = reason;
        }
    }

    pub(crate) fn set_canceled(&mut self) {
        self.canceled = true;
        self.success = false;
    }

    pub(crate) fn set_failed_and_canceled(&mut self) {
        self.set_failed();
        self.set_canceled();
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn add_error(&mut self, error: SharedError) {
        self.errors.push(error);
    }

    pub(crate) fn set_unprocessed_error(&mut self, error: SharedError) {
        self.unprocessed_error = Some(error);
    }

    pub(crate) fn add_catch_block_error(&mut self, error: CatchBlockError) {
        self.catch_block_errors.push(error);
    }

    pub(crate) fn add_bulk_errors<I>(&mut self, failures: I)
    where
        I: IntoIterator<Item = ProcessorFailure>,
    {
        self.bulk_errors.extend(failures);
    }

    pub(crate) fn set_error_filter_unsatisfied(&mut self) {
        self.error_filter_unsatisfied = true;
    }

    fn complete(&mut self, first_try: bool) {
        self.unprocessed_error = None;
        self.success = first_try && !self.failed && self.errors.is_empty();
    }
}

/// Outcome of one policy invocation, with the delegate's value when it
/// produced one
#[derive(Debug, Clone)]
pub struct PolicyResult<T = ()> {
    status: PolicyStatus,
    value: Option<T>,
}

impl<T> PolicyResult<T> {
    pub(crate) fn new(policy_name: Arc<str>) -> Self {
        Self {
            status: PolicyStatus { policy_name: Some(policy_name), ..PolicyStatus::default() },
            value: None,
        }
    }

    /// Failed result for an invocation with nothing to run
    pub(crate) fn for_missing_delegate(policy_name: Arc<str>) -> Self {
        let mut result = Self::new(policy_name);
        result.status.add_error(Arc::new(NoDelegateError));
        result.status.set_failed_with_reason(PolicyResultFailedReason::DelegateIsNull);
        result
    }

    /// Store the delegate's value; `first_try` marks first-attempt success
    pub(crate) fn set_ok(&mut self, value: T, first_try: bool) {
        self.value = Some(value);
        self.status.complete(first_try);
    }

    pub(crate) fn status_mut(&mut self) -> &mut PolicyStatus {
        &mut self.status
    }

    pub fn status(&self) -> &PolicyStatus {
        &self.status
    }

    pub fn into_status(self) -> PolicyStatus {
        self.status
    }

    /// The produced value, `None` when the invocation failed
    pub fn result(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_result(self) -> Option<T> {
        self.value
    }

    pub fn is_failed(&self) -> bool {
        self.status.is_failed()
    }

    pub fn is_canceled(&self) -> bool {
        self.status.is_canceled()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn attempts(&self) -> u32 {
        self.status.attempts()
    }

    pub fn errors(&self) -> &[SharedError] {
        self.status.errors()
    }

    pub fn last_error(&self) -> Option<&SharedError> {
        self.status.last_error()
    }

    pub fn unprocessed_error(&self) -> Option<&SharedError> {
        self.status.unprocessed_error()
    }

    pub fn failed_reason(&self) -> PolicyResultFailedReason {
        self.status.failed_reason()
    }

    pub fn catch_block_errors(&self) -> &[CatchBlockError] {
        self.status.catch_block_errors()
    }

    pub fn bulk_errors(&self) -> &[ProcessorFailure] {
        self.status.bulk_errors()
    }

    pub fn error_filter_unsatisfied(&self) -> bool {
        self.status.error_filter_unsatisfied()
    }

    pub fn policy_name(&self) -> Option<&str> {
        self.status.policy_name()
    }
}
