//! Integration tests for the fallback and simple policies

use std::sync::Arc;

use holdfast_common::testing::{CallCounter, OtherError, TestError};
use holdfast_core::prelude::*;
use holdfast_core::{CatchBlockSource, NoDelegateError, PolicyResultFailedReason};

/// Validates the fallback value replaces a handled primary failure.
///
/// Assertions:
/// - Confirms the fallback ran once with the caller's token.
/// - Confirms the result carries the fallback value and the primary error.
#[test]
fn test_fallback_replaces_handled_failure() {
    let fallbacks = CallCounter::new();
    let token = CancellationToken::new();

    let result = FallbackPolicy::new().include_error::<TestError>().handle(
        || Err::<String, _>(TestError::transient("primary cache miss")),
        |token| {
            fallbacks.bump();
            assert!(!token.is_cancelled());
            Ok::<_, OtherError>("stale copy".to_string())
        },
        &token,
    );

    assert_eq!(fallbacks.count(), 1);
    assert_eq!(result.result().map(String::as_str), Some("stale copy"));
    assert!(!result.is_failed());
    assert!(result.last_error().is_some_and(|e| e.is::<TestError>()));
}

/// Tests that primary success never calls the fallback
#[test]
fn test_primary_success_skips_fallback() {
    let fallbacks = CallCounter::new();
    let result = FallbackPolicy::new().handle(
        || Ok::<_, TestError>(5),
        |_| {
            fallbacks.bump();
            Ok::<_, TestError>(0)
        },
        &CancellationToken::new(),
    );

    assert_eq!(fallbacks.count(), 0);
    assert!(result.is_success());
    assert_eq!(result.into_result(), Some(5));
}

/// Validates an excluded error is not replaced by the fallback.
#[test]
fn test_excluded_error_is_not_replaced() {
    let fallbacks = CallCounter::new();
    let result = FallbackPolicy::new().exclude_error::<OtherError>().handle(
        || Err::<u8, _>(OtherError("quota".into())),
        |_| {
            fallbacks.bump();
            Ok::<_, TestError>(1)
        },
        &CancellationToken::new(),
    );

    assert_eq!(fallbacks.count(), 0);
    assert!(result.is_failed());
    assert!(result.error_filter_unsatisfied());
    assert!(result.result().is_none());
}

/// Validates the configured action path and the missing action path.
///
/// Assertions:
/// - Confirms a configured action runs after the primary fails.
/// - Confirms a missing action fails with `DelegateIsNull` without running the
///   primary.
#[test]
fn test_configured_fallback_action() {
    let fallbacks = CallCounter::new();
    let counter = fallbacks.clone();
    let policy = FallbackPolicy::new().with_fallback_action(move |_| {
        counter.bump();
        Ok::<_, TestError>(())
    });

    let result = policy.handle_action(|| Err::<(), _>(TestError::transient("down")), &CancellationToken::new());
    assert_eq!(fallbacks.count(), 1);
    assert!(!result.is_failed());

    let primaries = CallCounter::new();
    let missing = FallbackPolicy::new().handle_action(
        || {
            primaries.bump();
            Ok::<_, TestError>(())
        },
        &CancellationToken::new(),
    );
    assert_eq!(primaries.count(), 0);
    assert!(missing.is_failed());
    assert_eq!(missing.failed_reason(), PolicyResultFailedReason::DelegateIsNull);
    assert!(missing.last_error().is_some_and(|e| e.is::<NoDelegateError>()));
}

/// Validates the async action is preferred over the blocking one.
#[tokio::test]
async fn test_async_action_preferred() {
    let blocking = CallCounter::new();
    let asynchronous = CallCounter::new();
    let blocking_counter = blocking.clone();
    let async_counter = asynchronous.clone();

    let policy = FallbackPolicy::new()
        .with_fallback_action(move |_| {
            blocking_counter.bump();
            Ok::<_, TestError>(())
        })
        .with_async_fallback_action(move |_token| {
            let counter = async_counter.clone();
            async move {
                counter.bump();
                Ok::<_, TestError>(())
            }
        });

    let result = policy
        .handle_action_async(|_token| async { Err::<(), _>(TestError::transient("down")) }, &CancellationToken::new())
        .await;

    assert!(!result.is_failed());
    assert_eq!(asynchronous.count(), 1);
    assert_eq!(blocking.count(), 0);
}

/// Tests that a processor cancelling the token prevents the fallback
#[test]
fn test_cancel_in_processor_skips_fallback() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    let fallbacks = CallCounter::new();

    let policy = FallbackPolicy::new().add_error_processor(FnErrorProcessor::action("cancel", move |_, _| {
        canceller.cancel();
        Ok(())
    }));
    let result = policy.handle(
        || Err::<(), _>(TestError::transient("down")),
        |_| {
            fallbacks.bump();
            Ok::<_, TestError>(())
        },
        &token,
    );

    assert_eq!(fallbacks.count(), 0);
    assert!(result.is_failed());
    assert!(result.is_canceled());
}

/// Validates simple policy catch-block errors surface on the result.
///
/// Assertions:
/// - Confirms a failing result handler is recorded with its origin.
/// - Confirms it only fails the result when opted in.
#[test]
fn test_simple_result_handler_errors() {
    let lenient = SimplePolicy::new().add_result_handler(|_, _| Err(OtherError("audit down".into()).into()));
    let result = lenient.handle(|| Ok::<_, TestError>(()), &CancellationToken::new());
    assert!(!result.is_failed());
    assert_eq!(result.catch_block_errors().len(), 1);
    assert_eq!(result.catch_block_errors()[0].origin(), CatchBlockSource::ResultHandler);

    let strict = SimplePolicy::new()
        .fail_on_result_handler_error(true)
        .add_result_handler(|_, _| Err(OtherError("audit down".into()).into()));
    let result = strict.handle(|| Ok::<_, TestError>(()), &CancellationToken::new());
    assert!(result.is_failed());
    assert_eq!(result.failed_reason(), PolicyResultFailedReason::PolicyResultHandlerFailed);
}

/// Validates the simple policy passes the value through and names results.
#[test]
fn test_simple_named_success() {
    let policy = SimplePolicy::new().with_name("ledger-write");
    let result = policy.handle(|| Ok::<_, TestError>(Arc::new(7)), &CancellationToken::new());

    assert!(result.is_success());
    assert_eq!(result.policy_name(), Some("ledger-write"));
    assert_eq!(result.result().map(|v| **v), Some(7));
}

/// Tests the async simple policy with tokio-test's executor
#[test]
fn test_simple_async_failure() {
    let result = tokio_test::block_on(
        SimplePolicy::new()
            .include_error::<TestError>()
            .handle_async(|_token| async { Err::<(), _>(TestError::permanent("rejected")) }, &CancellationToken::new()),
    );

    assert!(result.is_failed());
    assert!(!result.error_filter_unsatisfied());
    assert_eq!(result.errors().len(), 1);
}
