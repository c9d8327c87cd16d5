//! Scripted driver for coordinator tests
//!
//! [`MockDriver`] answers every descriptor from a per-descriptor script of
//! [`Reply`] values and records what the coordinator did with its handlers:
//! - every sent descriptor, with the client it was sent through
//! - how many handler sets were created, aborted and released

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use saga_requests_core::config::RequestConfig;
use saga_requests_core::driver::{Driver, RequestHandlers, SendFuture};
use saga_requests_core::error::RequestError;
use saga_requests_core::request::Requests;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Scripted answer to one send
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Resolve with a response
    Ok(Value),
    /// Fail with an error
    Err(RequestError),
    /// Wait, then answer
    Delayed(Duration, Box<Reply>),
    /// Never resolve
    Pending,
}

impl Reply {
    /// Successful reply
    #[must_use]
    pub const fn ok(response: Value) -> Self {
        Self::Ok(response)
    }

    /// Failed reply
    #[must_use]
    pub const fn err(error: RequestError) -> Self {
        Self::Err(error)
    }

    /// Answer with `self` after `delay`
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }

    fn resolve(self) -> SendFuture<'static> {
        Box::pin(async move {
            match self {
                Self::Ok(response) => Ok(response),
                Self::Err(error) => Err(error),
                Self::Delayed(delay, reply) => {
                    tokio::time::sleep(delay).await;
                    reply.resolve().await
                },
                Self::Pending => futures::future::pending().await,
            }
        })
    }
}

/// Transport client handed to [`MockDriver`] handlers.
///
/// Only carries a name, so tests can tell which instance a request went
/// through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockClient {
    name: String,
}

impl MockClient {
    /// Client called `name`
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The client name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new("default")
    }
}

/// A descriptor as it reached the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    /// Name of the client it was sent through
    pub client: String,
    /// The descriptor
    pub request: Value,
}

#[derive(Debug, Default)]
struct MockState {
    script: RwLock<Vec<(Value, VecDeque<Reply>)>>,
    sent: RwLock<Vec<SentRequest>>,
    handlers_created: AtomicUsize,
    aborts: AtomicUsize,
    releases: AtomicUsize,
    supports_abort: AtomicBool,
    fail_success_payload: AtomicBool,
}

/// Driver answering from a script.
///
/// Clones share their script and counters, so a test keeps one clone and
/// hands the other to [`RequestConfig::builder`].
///
/// Unscripted descriptors succeed with `{ "data": <descriptor> }`. The
/// success payload is the response's `data` field (per member for batches),
/// the error payload `{ "message", "status" }`.
///
/// # Example
///
/// ```
/// use saga_requests_testing::{MockDriver, Reply};
/// use saga_requests_core::error::RequestError;
/// use serde_json::json;
///
/// let driver = MockDriver::new();
/// driver
///     .respond(json!("/flaky"), Reply::err(RequestError::status(503, "unavailable")))
///     .respond(json!("/flaky"), Reply::ok(json!({ "data": "ok" })));
///
/// assert_eq!(driver.send_count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    /// Driver with an empty script
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `reply` for `request`.
    ///
    /// Replies for the same descriptor are used in order; the last one
    /// repeats once the queue is down to it.
    pub fn respond(&self, request: Value, reply: Reply) -> &Self {
        let mut script = self.state.script.write().unwrap();
        match script.iter_mut().find(|(scripted, _)| *scripted == request) {
            Some((_, replies)) => replies.push_back(reply),
            None => script.push((request, VecDeque::from([reply]))),
        }
        drop(script);
        self
    }

    /// Make handlers report abort support
    #[must_use]
    pub fn with_abort_support(self) -> Self {
        self.state.supports_abort.store(true, Ordering::SeqCst);
        self
    }

    /// Make [`Driver::success_payload`] fail from now on
    pub fn fail_success_payload(&self) {
        self.state.fail_success_payload.store(true, Ordering::SeqCst);
    }

    /// Every descriptor sent so far, in send order
    #[must_use]
    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.sent.read().unwrap().clone()
    }

    /// Sent descriptors without client names
    #[must_use]
    pub fn sent_requests(&self) -> Vec<Value> {
        self.sent().into_iter().map(|sent| sent.request).collect()
    }

    /// Number of descriptors sent
    #[must_use]
    pub fn send_count(&self) -> usize {
        self.state.sent.read().unwrap().len()
    }

    /// Number of handler sets created (one per invocation)
    #[must_use]
    pub fn handlers_created(&self) -> usize {
        self.state.handlers_created.load(Ordering::SeqCst)
    }

    /// Number of `abort_request` calls
    #[must_use]
    pub fn abort_count(&self) -> usize {
        self.state.aborts.load(Ordering::SeqCst)
    }

    /// Number of `release` calls
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &Value) -> Reply {
        let mut script = self.state.script.write().unwrap();
        let replies = script
            .iter_mut()
            .find(|(scripted, _)| scripted == request)
            .map(|(_, replies)| replies);

        match replies {
            Some(replies) if replies.len() > 1 => replies.pop_front().unwrap(),
            Some(replies) => replies.front().cloned().unwrap(),
            None => Reply::Ok(json!({ "data": request })),
        }
    }
}

impl Driver for MockDriver {
    type Instance = MockClient;

    fn request_handlers(
        &self,
        client: &MockClient,
        _config: &RequestConfig<Self>,
    ) -> Arc<dyn RequestHandlers> {
        self.state.handlers_created.fetch_add(1, Ordering::SeqCst);
        Arc::new(MockHandlers {
            driver: self.clone(),
            client: client.name().to_string(),
        })
    }

    fn success_payload(&self, response: &Value, requests: &Requests) -> Result<Value, RequestError> {
        if self.state.fail_success_payload.load(Ordering::SeqCst) {
            return Err(RequestError::Payload("unmappable response".to_string()));
        }

        Ok(match requests {
            Requests::Single(_) => data_of(response),
            Requests::Batch(_) => Value::Array(
                response
                    .as_array()
                    .map(|responses| responses.iter().map(data_of).collect())
                    .unwrap_or_default(),
            ),
        })
    }

    fn error_payload(&self, error: &RequestError) -> Value {
        json!({
            "message": error.to_string(),
            "status": error.status_code(),
        })
    }
}

fn data_of(response: &Value) -> Value {
    response
        .get("data")
        .cloned()
        .unwrap_or_else(|| response.clone())
}

struct MockHandlers {
    driver: MockDriver,
    client: String,
}

impl RequestHandlers for MockHandlers {
    fn send_request(&self, request: Value) -> SendFuture<'_> {
        let reply = self.driver.next_reply(&request);
        self.driver.state.sent.write().unwrap().push(SentRequest {
            client: self.client.clone(),
            request,
        });
        reply.resolve()
    }

    fn supports_abort(&self) -> bool {
        self.driver.state.supports_abort.load(Ordering::SeqCst)
    }

    fn abort_request(&self) {
        self.driver.state.aborts.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.driver.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}
