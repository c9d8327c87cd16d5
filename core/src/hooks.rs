//! Lifecycle hooks.
//!
//! Hooks are user-supplied async functions interposed at fixed points of an
//! invocation:
//!
//! | hook | runs | may |
//! |---|---|---|
//! | `on_request` | before sending | transform, validate or reject the descriptor(s) |
//! | `on_success` | after a response | transform the response, or fail it |
//! | `on_error` | after a failure | recover with a response, or fail with a (new) error |
//! | `on_abort` | on cancellation | observe |
//!
//! Hooks never run in silent invocations.

use crate::action::Action;
use crate::dispatch::Dispatch;
use crate::driver::{RequestHandlers, SendFuture, execute};
use crate::error::RequestError;
use crate::request::Requests;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future returned by hooks
pub type HookFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// `on_request`: replaces the descriptor(s) about to be sent
pub type OnRequest =
    Arc<dyn Fn(Requests, HookContext) -> HookFuture<Result<Requests, RequestError>> + Send + Sync>;

/// `on_success`: replaces the response
pub type OnSuccess =
    Arc<dyn Fn(Value, HookContext) -> HookFuture<Result<Value, RequestError>> + Send + Sync>;

/// `on_error`: `Ok` recovers with a response, `Err` keeps failing
pub type OnError =
    Arc<dyn Fn(RequestError, HookContext) -> HookFuture<Result<Value, RequestError>> + Send + Sync>;

/// `on_abort`: observes cancellation
pub type OnAbort = Arc<dyn Fn(HookContext) -> HookFuture<()> + Send + Sync>;

/// What a hook can see and do.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct HookContext {
    action: Arc<Action>,
    requests: Arc<Requests>,
    dispatcher: Arc<dyn Dispatch>,
    handlers: Arc<dyn RequestHandlers>,
}

impl HookContext {
    /// Context for one invocation, starting from the descriptor(s) of `action`
    #[must_use]
    pub fn new(
        action: Arc<Action>,
        requests: Requests,
        dispatcher: Arc<dyn Dispatch>,
        handlers: Arc<dyn RequestHandlers>,
    ) -> Self {
        Self {
            action,
            requests: Arc::new(requests),
            dispatcher,
            handlers,
        }
    }

    /// The same context, carrying the descriptor(s) actually sent
    #[must_use]
    pub fn with_requests(mut self, requests: Requests) -> Self {
        self.requests = Arc::new(requests);
        self
    }

    /// The request action being processed
    #[must_use]
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The descriptor(s) of the invocation, after `on_request` replaced them
    #[must_use]
    pub fn requests(&self) -> &Requests {
        &self.requests
    }

    /// Dispatch an unrelated action (counters, progress, ..)
    pub fn dispatch(&self, action: Action) {
        self.dispatcher.dispatch(action);
    }

    /// Send one more request through the invocation's handlers
    pub fn send_request(&self, request: Value) -> SendFuture<'_> {
        self.handlers.send_request(request)
    }

    /// Re-send `requests` with the same single/batch semantics as the invocation.
    ///
    /// # Errors
    ///
    /// Returns the first failure, as [`execute`] does.
    pub async fn resend(&self, requests: &Requests) -> Result<Value, RequestError> {
        execute(self.handlers.as_ref(), requests).await
    }
}

impl fmt::Debug for HookContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("action", &self.action.action_type())
            .finish_non_exhaustive()
    }
}

/// The optional hooks of a configuration
#[derive(Clone, Default)]
pub struct Hooks {
    /// Runs before sending
    pub on_request: Option<OnRequest>,
    /// Runs after a response
    pub on_success: Option<OnSuccess>,
    /// Runs after a failure
    pub on_error: Option<OnError>,
    /// Runs on cancellation
    pub on_abort: Option<OnAbort>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("on_request", &self.on_request.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_abort", &self.on_abort.is_some())
            .finish()
    }
}
