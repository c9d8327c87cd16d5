//! Request configuration.
//!
//! A [`RequestConfig`] is built once from defaults plus overrides and never
//! mutated afterwards. It is paired with the transport client in a
//! [`RequestInstance`] and handed explicitly to every invocation, which keeps
//! its own `Arc` snapshot for its whole lifetime.
//!
//! # Example
//!
//! ```ignore
//! let config = RequestConfig::builder(HttpDriver)
//!     .on_error(|error, ctx| async move {
//!         ctx.dispatch(Action::flat("INCREMENT_ERROR_COUNTER"));
//!         Err(error)
//!     })
//!     .build();
//!
//! let instance = RequestInstance::new(reqwest::Client::new(), config);
//! ```

use crate::action::{Action, ActionShape};
use crate::driver::Driver;
use crate::error::RequestError;
use crate::hooks::{HookContext, HookFuture, Hooks, OnAbort, OnError, OnRequest, OnSuccess};
use crate::notification;
use crate::request::Requests;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Derives a notification type from a request action type
pub type TypeFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Shapes a success or error notification from the request action and payload
pub type ShapeFn = Arc<dyn Fn(&Action, Value) -> ActionShape + Send + Sync>;

/// Shapes an abort notification from the request action
pub type AbortShapeFn = Arc<dyn Fn(&Action) -> ActionShape + Send + Sync>;

/// Immutable configuration read by every invocation.
pub struct RequestConfig<D: Driver> {
    /// The transport adapter
    pub driver: Arc<D>,
    /// Success notification type derivation
    pub success: TypeFn,
    /// Error notification type derivation
    pub error: TypeFn,
    /// Abort notification type derivation
    pub abort: TypeFn,
    /// Success notification shaping
    pub success_action: ShapeFn,
    /// Error notification shaping
    pub error_action: ShapeFn,
    /// Abort notification shaping
    pub abort_action: AbortShapeFn,
    /// Optional lifecycle hooks
    pub hooks: Hooks,
}

impl<D: Driver> RequestConfig<D> {
    /// Start from the defaults for `driver`
    #[must_use]
    pub fn builder(driver: D) -> RequestConfigBuilder<D> {
        RequestConfigBuilder::new(driver)
    }

    /// Success notification for `action`
    #[must_use]
    pub fn success_notification(&self, action: &Action, payload: Value) -> Action {
        Action::from_shape(
            (self.success)(action.action_type()),
            (self.success_action)(action, payload),
        )
    }

    /// Error notification for `action`
    #[must_use]
    pub fn error_notification(&self, action: &Action, payload: Value) -> Action {
        Action::from_shape(
            (self.error)(action.action_type()),
            (self.error_action)(action, payload),
        )
    }

    /// Abort notification for `action`
    #[must_use]
    pub fn abort_notification(&self, action: &Action) -> Action {
        Action::from_shape((self.abort)(action.action_type()), (self.abort_action)(action))
    }
}

impl<D: Driver> Clone for RequestConfig<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            success: Arc::clone(&self.success),
            error: Arc::clone(&self.error),
            abort: Arc::clone(&self.abort),
            success_action: Arc::clone(&self.success_action),
            error_action: Arc::clone(&self.error_action),
            abort_action: Arc::clone(&self.abort_action),
            hooks: self.hooks.clone(),
        }
    }
}

impl<D: Driver> fmt::Debug for RequestConfig<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("driver", &std::any::type_name::<D>())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// Builder merging overrides over the default configuration.
///
/// Defaults:
/// - types: `_SUCCESS`, `_ERROR`, `_ABORT` suffixes
/// - shapes: [`notification::success_action`], [`notification::error_action`],
///   [`notification::abort_action`]
/// - hooks: none
pub struct RequestConfigBuilder<D: Driver> {
    config: RequestConfig<D>,
}

impl<D: Driver> RequestConfigBuilder<D> {
    fn new(driver: D) -> Self {
        Self {
            config: RequestConfig {
                driver: Arc::new(driver),
                success: Arc::new(notification::success),
                error: Arc::new(notification::error),
                abort: Arc::new(notification::abort),
                success_action: Arc::new(notification::success_action),
                error_action: Arc::new(notification::error_action),
                abort_action: Arc::new(notification::abort_action),
                hooks: Hooks::default(),
            },
        }
    }

    /// Override success type derivation
    #[must_use]
    pub fn success_type(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.config.success = Arc::new(f);
        self
    }

    /// Override error type derivation
    #[must_use]
    pub fn error_type(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.config.error = Arc::new(f);
        self
    }

    /// Override abort type derivation
    #[must_use]
    pub fn abort_type(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.config.abort = Arc::new(f);
        self
    }

    /// Override success shaping
    #[must_use]
    pub fn success_action(
        mut self,
        f: impl Fn(&Action, Value) -> ActionShape + Send + Sync + 'static,
    ) -> Self {
        self.config.success_action = Arc::new(f);
        self
    }

    /// Override error shaping
    #[must_use]
    pub fn error_action(
        mut self,
        f: impl Fn(&Action, Value) -> ActionShape + Send + Sync + 'static,
    ) -> Self {
        self.config.error_action = Arc::new(f);
        self
    }

    /// Override abort shaping
    #[must_use]
    pub fn abort_action(mut self, f: impl Fn(&Action) -> ActionShape + Send + Sync + 'static) -> Self {
        self.config.abort_action = Arc::new(f);
        self
    }

    /// Set the `on_request` hook
    #[must_use]
    pub fn on_request<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Requests, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Requests, RequestError>> + Send + 'static,
    {
        let on_request: OnRequest = Arc::new(move |requests, ctx| -> HookFuture<Result<Requests, RequestError>> {
            Box::pin(hook(requests, ctx))
        });
        self.config.hooks.on_request = Some(on_request);
        self
    }

    /// Set the `on_success` hook
    #[must_use]
    pub fn on_success<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Value, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let on_success: OnSuccess = Arc::new(move |response, ctx| -> HookFuture<Result<Value, RequestError>> {
            Box::pin(hook(response, ctx))
        });
        self.config.hooks.on_success = Some(on_success);
        self
    }

    /// Set the `on_error` hook
    #[must_use]
    pub fn on_error<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RequestError, HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RequestError>> + Send + 'static,
    {
        let on_error: OnError = Arc::new(move |error, ctx| -> HookFuture<Result<Value, RequestError>> {
            Box::pin(hook(error, ctx))
        });
        self.config.hooks.on_error = Some(on_error);
        self
    }

    /// Set the `on_abort` hook
    #[must_use]
    pub fn on_abort<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(HookContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let on_abort: OnAbort = Arc::new(move |ctx| -> HookFuture<()> { Box::pin(hook(ctx)) });
        self.config.hooks.on_abort = Some(on_abort);
        self
    }

    /// Replace all hooks at once
    #[must_use]
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.config.hooks = hooks;
        self
    }

    /// Finish the configuration
    #[must_use]
    pub fn build(self) -> RequestConfig<D> {
        self.config
    }
}

/// A transport client paired with its configuration.
///
/// Invocations capture an `Arc<RequestInstance<D>>` when they start; swapping
/// the instance elsewhere never affects them.
pub struct RequestInstance<D: Driver> {
    instance: D::Instance,
    config: RequestConfig<D>,
}

impl<D: Driver> RequestInstance<D> {
    /// Pair `instance` with `config`
    #[must_use]
    pub const fn new(instance: D::Instance, config: RequestConfig<D>) -> Self {
        Self { instance, config }
    }

    /// The transport client
    #[must_use]
    pub const fn instance(&self) -> &D::Instance {
        &self.instance
    }

    /// The configuration
    #[must_use]
    pub const fn config(&self) -> &RequestConfig<D> {
        &self.config
    }

    /// The driver
    #[must_use]
    pub fn driver(&self) -> &D {
        &self.config.driver
    }
}

impl<D: Driver> fmt::Debug for RequestInstance<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInstance")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
