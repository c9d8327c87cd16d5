//! Request lifecycle coordinator.
//!
//! One invocation takes one request action through an explicit state machine:
//!
//! ```text
//!            ┌────────────┐
//!            │ Intercept  │ on_request
//!            └─────┬──────┘
//!                  ▼
//!            ┌────────────┐   error    ┌────────────┐  on_error Err  ┌────────────┐
//!            │    Send    ├───────────►│   Failed   ├───────────────►│   Reject   │──► _ERROR
//!            └─────┬──────┘            └─────┬──────┘                └────────────┘
//!                  │ response                │ on_error Ok
//!                  ▼                         ▼
//!            ┌────────────┐◄─────────────────┘
//!            │  Respond   │ on_success (Err ──► Failed)
//!            └─────┬──────┘
//!                  ▼
//!            ┌────────────┐
//!            │  Resolve   │──► _SUCCESS
//!            └────────────┘
//! ```
//!
//! Every await (hooks and network calls) is a checkpoint raced against the
//! invocation's [`CancellationToken`]. A cancelled checkpoint leaves the state
//! machine for the abort path: `abort_request`, `on_abort`, `_ABORT`.
//!
//! The single/batch mode comes from the action. An `on_request` hook that
//! returns the other kind fails the invocation like a rejecting hook.
//!
//! Silent invocations skip hooks and dispatch nothing; the returned value is
//! the same as in a non-silent run without hooks.

use crate::config_store::ConfigStore;
use crate::error::RunError;
use crate::metrics::RequestMetrics;
use saga_requests_core::action::Action;
use saga_requests_core::config::RequestInstance;
use saga_requests_core::dispatch::Dispatch;
use saga_requests_core::driver::{Driver, RequestHandlers, execute};
use saga_requests_core::error::{HookKind, InvalidPayloadError, RequestError};
use saga_requests_core::hooks::HookContext;
use saga_requests_core::request::{Outcome, Requests, is_request_action};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Per-invocation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Dispatch the request action itself before anything else
    pub dispatch_original: bool,
    /// Skip hooks and dispatch nothing
    pub silent: bool,
}

impl RunOptions {
    /// Defaults: no original dispatch, not silent
    #[must_use]
    pub const fn new() -> Self {
        Self {
            dispatch_original: false,
            silent: false,
        }
    }

    /// Silent options, for callers that only want the outcome
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            dispatch_original: false,
            silent: true,
        }
    }

    /// Set whether the original action is dispatched first
    #[must_use]
    pub const fn with_dispatch_original(mut self, dispatch_original: bool) -> Self {
        self.dispatch_original = dispatch_original;
        self
    }

    /// Set silent mode
    #[must_use]
    pub const fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

/// Run one request action to its terminal state.
///
/// Dependencies are passed explicitly: `instance` is the configuration
/// snapshot this invocation keeps for its whole lifetime, `dispatcher`
/// receives notifications, and `token` cancels the invocation.
///
/// # Returns
///
/// - `Ok(Outcome::Response)` after a direct or recovered success
/// - `Ok(Outcome::Error)` after an unrecovered failure
///
/// # Errors
///
/// - [`RunError::InvalidPayload`]: the action carries no request; nothing was
///   dispatched and the driver was never consulted
/// - [`RunError::Cancelled`]: `token` fired before the invocation finished;
///   the abort notification (if not silent) has been dispatched
/// - [`RunError::SuccessPayload`]: the driver could not map the final
///   response; no notification was dispatched
#[tracing::instrument(
    skip_all,
    name = "run_request",
    fields(action_type = %action.action_type(), silent = options.silent)
)]
pub async fn run_request<D: Driver>(
    instance: Arc<RequestInstance<D>>,
    dispatcher: Arc<dyn Dispatch>,
    action: Action,
    options: RunOptions,
    token: &CancellationToken,
) -> Result<Outcome, RunError> {
    if !is_request_action(&action) {
        return Err(InvalidPayloadError::new(action.action_type()).into());
    }
    let requests = Requests::from_action(&action)?;

    let started = Instant::now();
    RequestMetrics::record_started(requests.mode());
    tracing::debug!(mode = requests.mode(), count = requests.len(), "Starting request");

    if options.dispatch_original && !options.silent {
        dispatcher.dispatch(action.clone());
    }

    let handlers = instance
        .driver()
        .request_handlers(instance.instance(), instance.config());
    let _release = ReleaseGuard(Arc::clone(&handlers));

    let action = Arc::new(action);
    let ctx = HookContext::new(
        Arc::clone(&action),
        requests.clone(),
        Arc::clone(&dispatcher),
        Arc::clone(&handlers),
    );

    let mut invocation = Invocation {
        instance,
        dispatcher,
        action,
        handlers,
        ctx,
        silent: options.silent,
        token,
        error_hook_used: false,
    };

    match invocation.drive(Phase::Intercept(requests)).await {
        Ok(outcome) => {
            match &outcome {
                Outcome::Response(_) => RequestMetrics::record_succeeded(started.elapsed()),
                Outcome::Error(_) => RequestMetrics::record_failed(started.elapsed()),
            }
            Ok(outcome)
        },
        Err(Halt::Fatal(error)) => {
            tracing::error!(error = %error, "Success payload mapping failed");
            RequestMetrics::record_failed(started.elapsed());
            Err(RunError::SuccessPayload(error))
        },
        Err(Halt::Cancelled) => {
            invocation.abort().await;
            RequestMetrics::record_aborted();
            Err(RunError::Cancelled)
        },
    }
}

/// State of one invocation between checkpoints
#[derive(Debug)]
enum Phase {
    /// `on_request` may replace the descriptor(s)
    Intercept(Requests),
    /// The descriptor(s) are in flight
    Send(Requests),
    /// A call or hook failed; `on_error` may recover
    Failed {
        requests: Requests,
        error: RequestError,
    },
    /// Terminal failure
    Reject(RequestError),
    /// A response is available; `on_success` may replace it
    Respond {
        requests: Requests,
        response: Value,
    },
    /// Map the final response and notify
    Resolve {
        requests: Requests,
        response: Value,
    },
}

/// Result of advancing one phase
#[derive(Debug)]
enum Step {
    Next(Phase),
    Done(Outcome),
}

/// Why the state machine stopped without an outcome
#[derive(Debug)]
enum Halt {
    Cancelled,
    Fatal(RequestError),
}

struct Invocation<'a, D: Driver> {
    instance: Arc<RequestInstance<D>>,
    dispatcher: Arc<dyn Dispatch>,
    action: Arc<Action>,
    handlers: Arc<dyn RequestHandlers>,
    ctx: HookContext,
    silent: bool,
    token: &'a CancellationToken,
    error_hook_used: bool,
}

impl<D: Driver> Invocation<'_, D> {
    async fn drive(&mut self, mut phase: Phase) -> Result<Outcome, Halt> {
        loop {
            match self.step(phase).await? {
                Step::Next(next) => phase = next,
                Step::Done(outcome) => return Ok(outcome),
            }
        }
    }

    async fn step(&mut self, phase: Phase) -> Result<Step, Halt> {
        let hooks = &self.instance.config().hooks;

        let next = match phase {
            Phase::Intercept(requests) => match hooks.on_request.as_ref().filter(|_| !self.silent) {
                Some(on_request) => {
                    let hook = on_request(requests.clone(), self.ctx.clone());
                    match self.checkpoint(hook).await? {
                        // The single/batch mode is fixed by the action
                        Ok(replaced) if replaced.is_batch() != requests.is_batch() => {
                            let error = RequestError::hook(
                                HookKind::Request,
                                format!(
                                    "on_request returned a {} for a {} request",
                                    replaced.mode(),
                                    requests.mode()
                                ),
                            );
                            tracing::warn!(error = %error, "Request rejected");
                            Phase::Failed { requests, error }
                        },
                        Ok(replaced) => {
                            self.ctx = self.ctx.clone().with_requests(replaced.clone());
                            Phase::Send(replaced)
                        },
                        Err(error) => Phase::Failed { requests, error },
                    }
                },
                None => Phase::Send(requests),
            },

            Phase::Send(requests) => {
                let result = self
                    .checkpoint(execute(self.handlers.as_ref(), &requests))
                    .await?;
                match result {
                    Ok(response) => Phase::Respond { requests, response },
                    Err(error) => {
                        tracing::warn!(error = %error, "Request failed");
                        Phase::Failed { requests, error }
                    },
                }
            },

            Phase::Failed { requests, error } => {
                let on_error = hooks
                    .on_error
                    .as_ref()
                    .filter(|_| !self.silent && !self.error_hook_used);
                let Some(on_error) = on_error else {
                    return Ok(Step::Next(Phase::Reject(error)));
                };

                self.error_hook_used = true;
                let hook = on_error(error, self.ctx.clone());
                match self.checkpoint(hook).await? {
                    Ok(response) => {
                        tracing::debug!("Failure recovered by on_error");
                        RequestMetrics::record_recovered();
                        Phase::Respond { requests, response }
                    },
                    Err(error) => Phase::Reject(error),
                }
            },

            Phase::Reject(error) => {
                let payload = self.instance.driver().error_payload(&error);
                if !self.silent {
                    let notification = self
                        .instance
                        .config()
                        .error_notification(&self.action, payload);
                    self.dispatcher.dispatch(notification);
                }
                return Ok(Step::Done(Outcome::Error(error)));
            },

            Phase::Respond { requests, response } => {
                match hooks.on_success.as_ref().filter(|_| !self.silent) {
                    Some(on_success) => {
                        let hook = on_success(response, self.ctx.clone());
                        match self.checkpoint(hook).await? {
                            Ok(response) => Phase::Resolve { requests, response },
                            Err(error) => Phase::Failed { requests, error },
                        }
                    },
                    None => Phase::Resolve { requests, response },
                }
            },

            Phase::Resolve { requests, response } => {
                let payload = self
                    .instance
                    .driver()
                    .success_payload(&response, &requests)
                    .map_err(Halt::Fatal)?;
                if !self.silent {
                    let notification = self
                        .instance
                        .config()
                        .success_notification(&self.action, payload);
                    self.dispatcher.dispatch(notification);
                }
                tracing::debug!("Request succeeded");
                return Ok(Step::Done(Outcome::Response(response)));
            },
        };

        Ok(Step::Next(next))
    }

    /// Await `fut` unless the invocation is cancelled first
    async fn checkpoint<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(Halt::Cancelled),
            output = fut => Ok(output),
        }
    }

    async fn abort(&self) {
        tracing::info!("Request cancelled");

        if self.handlers.supports_abort() {
            self.handlers.abort_request();
        }

        if self.silent {
            return;
        }

        if let Some(on_abort) = &self.instance.config().hooks.on_abort {
            on_abort(self.ctx.clone()).await;
        }

        let notification = self.instance.config().abort_notification(&self.action);
        self.dispatcher.dispatch(notification);
    }
}

/// Releases the invocation's handlers on every exit path
struct ReleaseGuard(Arc<dyn RequestHandlers>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Runs invocations against the instance currently held by a [`ConfigStore`].
///
/// # Example
///
/// ```ignore
/// let coordinator = Coordinator::new(ConfigStore::new(instance), Arc::new(channel.clone()));
///
/// let outcome = coordinator
///     .run(Action::flat("FETCH_POST").with_field("request", json!({ "url": "/posts/1" })), RunOptions::new())
///     .await?;
/// ```
pub struct Coordinator<D: Driver> {
    config: ConfigStore<D>,
    dispatcher: Arc<dyn Dispatch>,
}

impl<D: Driver> Coordinator<D> {
    /// Coordinator reading `config` and writing to `dispatcher`
    #[must_use]
    pub fn new(config: ConfigStore<D>, dispatcher: Arc<dyn Dispatch>) -> Self {
        Self { config, dispatcher }
    }

    /// The configuration store
    #[must_use]
    pub const fn config(&self) -> &ConfigStore<D> {
        &self.config
    }

    /// The dispatcher notifications go to
    #[must_use]
    pub fn dispatcher(&self) -> Arc<dyn Dispatch> {
        Arc::clone(&self.dispatcher)
    }

    /// Run `action` to completion; it cannot be cancelled.
    ///
    /// # Errors
    ///
    /// See [`run_request`].
    pub async fn run(&self, action: Action, options: RunOptions) -> Result<Outcome, RunError> {
        self.run_cancellable(action, options, &CancellationToken::new())
            .await
    }

    /// Run `action` until it finishes or `token` is cancelled.
    ///
    /// # Errors
    ///
    /// See [`run_request`].
    pub async fn run_cancellable(
        &self,
        action: Action,
        options: RunOptions,
        token: &CancellationToken,
    ) -> Result<Outcome, RunError> {
        run_request(
            self.config.current(),
            Arc::clone(&self.dispatcher),
            action,
            options,
            token,
        )
        .await
    }
}

impl<D: Driver> Clone for Coordinator<D> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}
