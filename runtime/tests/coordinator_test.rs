//! Integration tests for the request lifecycle coordinator
//!
//! Every scenario runs against a scripted `MockDriver` and records the
//! dispatched notifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use saga_requests_core::action::Action;
use saga_requests_core::config::{RequestConfig, RequestInstance};
use saga_requests_core::error::{HookKind, RequestError};
use saga_requests_core::hooks::HookContext;
use saga_requests_core::request::{Outcome, Requests};
use saga_requests_runtime::retry::{RetryPolicy, retry_on_error};
use saga_requests_runtime::{RunError, RunOptions};
use saga_requests_testing::fixtures::{batch_action, request_action, tagged_request_action};
use saga_requests_testing::{MockClient, MockDriver, Reply, TestHarness, init_test_tracing};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wait until the driver has sent `count` descriptors
async fn wait_for_sends(driver: &MockDriver, count: usize) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while driver.send_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("requests were not sent in time");
}

// ============================================================================
// Classification
// ============================================================================

#[tokio::test]
async fn test_non_request_action_fails_fast() {
    init_test_tracing();
    let harness = TestHarness::new();

    let result = harness.run(Action::flat("INCREMENT")).await;

    assert!(matches!(result, Err(RunError::InvalidPayload(_))));
    assert!(harness.dispatcher.is_empty());
    assert_eq!(harness.driver.handlers_created(), 0);
}

#[tokio::test]
async fn test_non_array_batch_is_invalid() {
    let harness = TestHarness::new();
    let action = Action::flat("FETCH").with_field("requests", json!("/not-a-list"));

    let result = harness
        .run_with(action, RunOptions::new().with_dispatch_original(true))
        .await;

    assert!(matches!(result, Err(RunError::InvalidPayload(_))));
    assert!(harness.dispatcher.is_empty());
}

// ============================================================================
// Success and failure
// ============================================================================

#[tokio::test]
async fn test_single_request_success() {
    let harness = TestHarness::new();
    harness
        .driver
        .respond(json!({ "url": "/posts/1" }), Reply::ok(json!({ "data": { "id": 1 } })));
    let action = request_action("FETCH_POST", json!({ "url": "/posts/1" }));

    let outcome = harness.run(action.clone()).await.unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": { "id": 1 } })));

    let dispatched = harness.dispatcher.actions();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].action_type(), "FETCH_POST_SUCCESS");
    assert_eq!(dispatched[0].payload_field("data"), Some(&json!({ "id": 1 })));
    assert_eq!(dispatched[0].request_action(), Some(&action));
}

#[tokio::test]
async fn test_request_meta_is_carried_over() {
    let harness = TestHarness::new();
    let action = request_action("FETCH_POST", json!("/posts/1")).with_meta("page", json!(3));

    harness.run(action).await.unwrap();

    let success = &harness.dispatcher.actions()[0];
    assert_eq!(success.meta().values.get("page"), Some(&json!(3)));
}

#[tokio::test]
async fn test_failure_without_error_hook() {
    let harness = TestHarness::new();
    let error = RequestError::status(500, "boom");
    harness.driver.respond(json!("/posts/1"), Reply::err(error.clone()));

    let outcome = harness
        .run(request_action("FETCH_POST", json!("/posts/1")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(error.clone()));
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_POST_ERROR"]);
    assert_eq!(
        harness.dispatcher.actions()[0].payload_field("error"),
        Some(&json!({ "message": error.to_string(), "status": 500 }))
    );
}

#[tokio::test]
async fn test_batch_success_keeps_order() {
    let harness = TestHarness::new();

    let outcome = harness
        .run(batch_action("FETCH_ALL", vec![json!("/a"), json!("/b")]))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Response(json!([{ "data": "/a" }, { "data": "/b" }]))
    );
    assert_eq!(
        harness.dispatcher.actions()[0].payload_field("data"),
        Some(&json!(["/a", "/b"]))
    );
}

#[tokio::test]
async fn test_batch_member_failure_fails_whole_batch() {
    let harness = TestHarness::new();
    harness
        .driver
        .respond(json!("/b"), Reply::err(RequestError::transport("reset")));

    let outcome = harness
        .run(batch_action("FETCH_ALL", vec![json!("/a"), json!("/b"), json!("/c")]))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(RequestError::transport("reset")));
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ALL_ERROR"]);
}

#[tokio::test]
async fn test_dispatch_original_comes_first() {
    let harness = TestHarness::new();
    let action = request_action("FETCH_POST", json!("/posts/1"));

    harness
        .run_with(action.clone(), RunOptions::new().with_dispatch_original(true))
        .await
        .unwrap();

    assert_eq!(harness.dispatcher.types(), vec!["FETCH_POST", "FETCH_POST_SUCCESS"]);
    assert_eq!(harness.dispatcher.actions()[0], action);
}

#[tokio::test]
async fn test_tagged_actions_get_tagged_notifications() {
    let harness = TestHarness::new();
    harness
        .driver
        .respond(json!("/fail"), Reply::err(RequestError::status(404, "missing")));

    harness
        .run(tagged_request_action("FETCH", json!("/ok")))
        .await
        .unwrap();
    harness
        .run(tagged_request_action("FETCH", json!("/fail")))
        .await
        .unwrap();

    let actions = harness.dispatcher.actions();
    let success = actions[0].to_value();
    assert_eq!(success["type"], json!("FETCH_SUCCESS"));
    assert_eq!(success["payload"], json!({ "data": "/ok" }));

    let error = actions[1].to_value();
    assert_eq!(error["type"], json!("FETCH_ERROR"));
    assert_eq!(error["error"], json!(true));
    assert_eq!(error["payload"]["status"], json!(404));
}

// ============================================================================
// Hooks
// ============================================================================

#[tokio::test]
async fn test_on_request_replaces_descriptor() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_request(|requests, _ctx| async move {
            match requests {
                Requests::Single(request) => Ok::<_, RequestError>(Requests::Single(json!({ "wrapped": request }))),
                batch @ Requests::Batch(_) => Ok(batch),
            }
        })
    });

    harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(harness.driver.sent_requests(), vec![json!({ "wrapped": "/a" })]);
}

#[tokio::test]
async fn test_on_request_rejection_skips_sending() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_request(|_requests, _ctx| async {
            Err::<Requests, _>(RequestError::hook(HookKind::Request, "not allowed"))
        })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Error(RequestError::hook(HookKind::Request, "not allowed"))
    );
    assert_eq!(harness.driver.send_count(), 0);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
    assert_eq!(harness.driver.release_count(), 1);
}

#[tokio::test]
async fn test_on_request_cannot_turn_single_into_batch() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_request(|_requests, _ctx| async {
            Ok::<_, RequestError>(Requests::Batch(vec![json!("/x"), json!("/y")]))
        })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        Outcome::Error(RequestError::Hook {
            hook: HookKind::Request,
            ..
        })
    ));
    assert_eq!(harness.driver.send_count(), 0);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn test_on_request_cannot_turn_batch_into_single() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_request(|_requests, _ctx| async {
            Ok::<_, RequestError>(Requests::Single(json!("/x")))
        })
    });

    let outcome = harness
        .run(batch_action("FETCH_ALL", vec![json!("/a"), json!("/b")]))
        .await
        .unwrap();

    assert!(!outcome.is_response());
    assert_eq!(harness.driver.send_count(), 0);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ALL_ERROR"]);
}

#[tokio::test]
async fn test_on_success_replaces_response() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_success(|response, _ctx| async move {
            Ok::<_, RequestError>(json!({ "data": { "wrapped": response["data"] } }))
        })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": { "wrapped": "/a" } })));
    assert_eq!(
        harness.dispatcher.actions()[0].payload_field("data"),
        Some(&json!({ "wrapped": "/a" }))
    );
}

#[tokio::test]
async fn test_on_success_failure_enters_error_path() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_success(|_response, _ctx| async {
            Err::<Value, _>(RequestError::hook(HookKind::Success, "bad shape"))
        })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Error(RequestError::hook(HookKind::Success, "bad shape"))
    );
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn test_on_error_recovers() {
    let driver = MockDriver::new();
    driver.respond(json!("/a"), Reply::err(RequestError::status(503, "down")));
    let harness = TestHarness::configured(driver, |builder| {
        builder.on_error(|_error, _ctx| async { Ok::<_, RequestError>(json!({ "data": "cached" })) })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": "cached" })));
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_SUCCESS"]);
    assert_eq!(
        harness.dispatcher.actions()[0].payload_field("data"),
        Some(&json!("cached"))
    );
}

#[tokio::test]
async fn test_on_error_can_replace_error_and_dispatch() {
    let driver = MockDriver::new();
    driver.respond(json!("/a"), Reply::err(RequestError::status(500, "down")));
    let harness = TestHarness::configured(driver, |builder| {
        builder.on_error(|_error, ctx: HookContext| async move {
            ctx.dispatch(Action::flat("INCREMENT_ERROR_COUNTER"));
            Err::<Value, _>(RequestError::transport("replaced"))
        })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(RequestError::transport("replaced")));
    assert_eq!(
        harness.dispatcher.types(),
        vec!["INCREMENT_ERROR_COUNTER", "FETCH_ERROR"]
    );
}

#[tokio::test]
async fn test_on_error_runs_at_most_once() {
    let error_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&error_calls);
    let harness = TestHarness::configured(MockDriver::new(), move |builder| {
        builder
            .on_success(|_response, _ctx| async {
                Err::<Value, _>(RequestError::hook(HookKind::Success, "always invalid"))
            })
            .on_error(move |_error, _ctx| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, RequestError>(json!({ "data": "recovered" })) }
            })
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        Outcome::Error(RequestError::hook(HookKind::Success, "always invalid"))
    );
    assert_eq!(error_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn test_hooks_can_send_extra_requests() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_success(|response, ctx: HookContext| async move {
            let author = ctx.send_request(json!("/author")).await?;
            Ok::<_, RequestError>(json!({ "data": { "post": response["data"], "author": author["data"] } }))
        })
    });

    harness
        .run(request_action("FETCH", json!("/post")))
        .await
        .unwrap();

    assert_eq!(harness.driver.sent_requests(), vec![json!("/post"), json!("/author")]);
    assert_eq!(
        harness.dispatcher.actions()[0].payload_field("data"),
        Some(&json!({ "post": "/post", "author": "/author" }))
    );
}

#[tokio::test]
async fn test_silent_mode_skips_hooks_and_dispatch() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&hook_calls);
    let harness = TestHarness::configured(MockDriver::new(), move |builder| {
        builder.on_request(move |requests, _ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, RequestError>(requests) }
        })
    });

    let outcome = harness
        .run_with(
            request_action("FETCH", json!("/a")),
            RunOptions::silent().with_dispatch_original(true),
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": "/a" })));
    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
    assert!(harness.dispatcher.is_empty());
}

#[tokio::test]
async fn test_silent_failure_dispatches_nothing() {
    let error_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&error_calls);
    let driver = MockDriver::new();
    driver.respond(json!("/down"), Reply::err(RequestError::status(500, "boom")));
    let harness = TestHarness::configured(driver, move |builder| {
        builder.on_error(move |_error, _ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RequestError>(json!({ "data": "recovered" })) }
        })
    });

    let outcome = harness
        .run_with(request_action("FETCH", json!("/down")), RunOptions::silent())
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(RequestError::status(500, "boom")));
    assert!(harness.dispatcher.is_empty());
    assert_eq!(error_calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.driver.release_count(), 1);
}

#[tokio::test]
async fn test_silent_batch_failure_dispatches_nothing() {
    let error_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&error_calls);
    let driver = MockDriver::new();
    driver.respond(json!("/b"), Reply::err(RequestError::status(503, "unavailable")));
    let harness = TestHarness::configured(driver, move |builder| {
        builder.on_error(move |_error, _ctx| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, RequestError>(json!([])) }
        })
    });

    let outcome = harness
        .run_with(
            batch_action("FETCH_ALL", vec![json!("/a"), json!("/b")]),
            RunOptions::silent(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(RequestError::status(503, "unavailable")));
    assert!(harness.dispatcher.is_empty());
    assert_eq!(error_calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Success payload mapping
// ============================================================================

#[tokio::test]
async fn test_success_payload_failure_is_fatal() {
    let harness = TestHarness::new();
    harness.driver.fail_success_payload();

    let result = harness.run(request_action("FETCH", json!("/a"))).await;

    assert!(matches!(result, Err(RunError::SuccessPayload(RequestError::Payload(_)))));
    assert!(harness.dispatcher.is_empty());
    assert_eq!(harness.driver.release_count(), 1);
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_in_flight_request() {
    let driver = MockDriver::new().with_abort_support();
    driver.respond(json!("/slow"), Reply::Pending);
    let harness = TestHarness::with_driver(driver);
    let action = request_action("FETCH_POST", json!("/slow"));
    let token = CancellationToken::new();

    let task = tokio::spawn({
        let coordinator = harness.coordinator.clone();
        let token = token.clone();
        let action = action.clone();
        async move { coordinator.run_cancellable(action, RunOptions::new(), &token).await }
    });

    wait_for_sends(&harness.driver, 1).await;
    token.cancel();

    assert_eq!(task.await.unwrap(), Err(RunError::Cancelled));
    assert_eq!(harness.driver.abort_count(), 1);
    assert_eq!(harness.driver.release_count(), 1);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_POST_ABORT"]);
    assert_eq!(harness.dispatcher.actions()[0].request_action(), Some(&action));
}

#[tokio::test]
async fn test_cancel_without_abort_support_still_notifies() {
    let driver = MockDriver::new();
    driver.respond(json!("/slow"), Reply::Pending);
    let aborted = Arc::new(AtomicUsize::new(0));
    let abort_calls = Arc::clone(&aborted);
    let harness = TestHarness::configured(driver, move |builder| {
        builder.on_abort(move |ctx: HookContext| {
            abort_calls.fetch_add(1, Ordering::SeqCst);
            async move { ctx.dispatch(Action::flat("ABORT_OBSERVED")) }
        })
    });
    let token = CancellationToken::new();

    let task = tokio::spawn({
        let coordinator = harness.coordinator.clone();
        let token = token.clone();
        async move {
            coordinator
                .run_cancellable(request_action("FETCH", json!("/slow")), RunOptions::new(), &token)
                .await
        }
    });

    wait_for_sends(&harness.driver, 1).await;
    token.cancel();

    assert!(task.await.unwrap().unwrap_err().is_cancelled());
    assert_eq!(harness.driver.abort_count(), 0);
    assert_eq!(aborted.load(Ordering::SeqCst), 1);
    assert_eq!(harness.dispatcher.types(), vec!["ABORT_OBSERVED", "FETCH_ABORT"]);
}

#[tokio::test]
async fn test_cancel_during_hook_never_sends() {
    let harness = TestHarness::configured(MockDriver::new(), |builder| {
        builder.on_request(|_requests, _ctx| futures::future::pending::<Result<Requests, RequestError>>())
    });
    let token = CancellationToken::new();
    token.cancel();

    let result = harness
        .coordinator
        .run_cancellable(request_action("FETCH", json!("/a")), RunOptions::new(), &token)
        .await;

    assert_eq!(result, Err(RunError::Cancelled));
    assert_eq!(harness.driver.send_count(), 0);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ABORT"]);
}

#[tokio::test]
async fn test_silent_cancel_aborts_without_notifying() {
    let driver = MockDriver::new().with_abort_support();
    driver.respond(json!("/slow"), Reply::Pending);
    let harness = TestHarness::with_driver(driver);
    let token = CancellationToken::new();

    let task = tokio::spawn({
        let coordinator = harness.coordinator.clone();
        let token = token.clone();
        async move {
            coordinator
                .run_cancellable(request_action("FETCH", json!("/slow")), RunOptions::silent(), &token)
                .await
        }
    });

    wait_for_sends(&harness.driver, 1).await;
    token.cancel();

    assert_eq!(task.await.unwrap(), Err(RunError::Cancelled));
    assert_eq!(harness.driver.abort_count(), 1);
    assert!(harness.dispatcher.is_empty());
}

#[tokio::test]
async fn test_completed_request_ignores_late_cancel() {
    let harness = TestHarness::with_driver(MockDriver::new().with_abort_support());
    let token = CancellationToken::new();

    let outcome = harness
        .coordinator
        .run_cancellable(request_action("FETCH", json!("/a")), RunOptions::new(), &token)
        .await
        .unwrap();
    token.cancel();

    assert!(outcome.is_response());
    assert_eq!(harness.driver.abort_count(), 0);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_SUCCESS"]);
}

// ============================================================================
// Handler lifecycle and configuration
// ============================================================================

#[tokio::test]
async fn test_handlers_released_on_every_path() {
    let driver = MockDriver::new();
    driver.respond(json!("/fail"), Reply::err(RequestError::transport("down")));
    let harness = TestHarness::with_driver(driver);

    harness.run(request_action("FETCH", json!("/ok"))).await.unwrap();
    harness.run(request_action("FETCH", json!("/fail"))).await.unwrap();
    let _ = harness.run(Action::flat("NOT_A_REQUEST")).await;

    harness.driver.fail_success_payload();
    let _ = harness.run(request_action("FETCH", json!("/ok"))).await;

    assert_eq!(harness.driver.handlers_created(), 3);
    assert_eq!(harness.driver.release_count(), 3);
}

#[tokio::test]
async fn test_config_replacement_only_affects_later_invocations() {
    let driver = MockDriver::new();
    driver.respond(
        json!("/slow"),
        Reply::ok(json!({ "data": "slow" })).after(Duration::from_millis(50)),
    );
    let harness = TestHarness::with_driver(driver.clone());

    let first = tokio::spawn({
        let harness = harness.clone();
        async move { harness.run(request_action("FETCH", json!("/slow"))).await }
    });
    wait_for_sends(&driver, 1).await;

    harness.coordinator.config().replace(RequestInstance::new(
        MockClient::new("replacement"),
        RequestConfig::builder(driver.clone())
            .success_type(|action_type| format!("{action_type}_DONE"))
            .build(),
    ));
    harness.run(request_action("FETCH", json!("/fast"))).await.unwrap();
    first.await.unwrap().unwrap();

    assert_eq!(harness.dispatcher.of_type("FETCH_SUCCESS").len(), 1);
    assert_eq!(harness.dispatcher.of_type("FETCH_DONE").len(), 1);

    let clients: Vec<String> = driver.sent().into_iter().map(|sent| sent.client).collect();
    assert_eq!(clients, vec!["default", "replacement"]);
}

// ============================================================================
// Retry
// ============================================================================

fn fast_retries(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .build()
}

#[tokio::test]
async fn test_retry_hook_recovers_transient_failures() {
    let driver = MockDriver::new();
    driver
        .respond(json!("/flaky"), Reply::err(RequestError::status(503, "unavailable")))
        .respond(json!("/flaky"), Reply::err(RequestError::status(503, "unavailable")))
        .respond(json!("/flaky"), Reply::ok(json!({ "data": "finally" })));
    let harness =
        TestHarness::configured(driver, |builder| builder.on_error(retry_on_error(fast_retries(3))));

    let outcome = harness
        .run(request_action("FETCH", json!("/flaky")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": "finally" })));
    assert_eq!(harness.driver.send_count(), 3);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_SUCCESS"]);
}

#[tokio::test]
async fn test_retry_hook_gives_up() {
    let driver = MockDriver::new();
    driver.respond(json!("/down"), Reply::err(RequestError::status(503, "unavailable")));
    let harness =
        TestHarness::configured(driver, |builder| builder.on_error(retry_on_error(fast_retries(2))));

    let outcome = harness
        .run(request_action("FETCH", json!("/down")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Error(RequestError::status(503, "unavailable")));
    assert_eq!(harness.driver.send_count(), 3); // original + 2 retries
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn test_retry_hook_skips_client_errors() {
    let driver = MockDriver::new();
    driver.respond(json!("/missing"), Reply::err(RequestError::status(404, "missing")));
    let harness =
        TestHarness::configured(driver, |builder| builder.on_error(retry_on_error(fast_retries(3))));

    harness
        .run(request_action("FETCH", json!("/missing")))
        .await
        .unwrap();

    assert_eq!(harness.driver.send_count(), 1);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_ERROR"]);
}

#[tokio::test]
async fn test_retry_hook_resends_transformed_descriptor() {
    let authed = json!({ "url": "/a", "auth": "tok" });
    let driver = MockDriver::new();
    driver
        .respond(authed.clone(), Reply::err(RequestError::status(503, "unavailable")))
        .respond(authed.clone(), Reply::ok(json!({ "data": "authed" })));
    let harness = TestHarness::configured(driver, |builder| {
        builder
            .on_request(|requests, _ctx| async move {
                match requests {
                    Requests::Single(url) => {
                        Ok::<_, RequestError>(Requests::Single(json!({ "url": url, "auth": "tok" })))
                    },
                    batch @ Requests::Batch(_) => Ok(batch),
                }
            })
            .on_error(retry_on_error(fast_retries(3)))
    });

    let outcome = harness
        .run(request_action("FETCH", json!("/a")))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Response(json!({ "data": "authed" })));
    assert_eq!(harness.driver.sent_requests(), vec![authed.clone(), authed]);
    assert_eq!(harness.dispatcher.types(), vec!["FETCH_SUCCESS"]);
}
