//! Retry logic with exponential backoff for handling transient failures.
//!
//! The coordinator never retries on its own. Retrying is layered on top of
//! it through the `on_error` hook: [`retry_on_error`] builds such a hook,
//! re-sending the descriptor(s) `on_request` produced through the
//! invocation's handlers until one attempt succeeds or the policy gives up.
//!
//! # Example
//!
//! ```rust,ignore
//! use saga_requests_runtime::retry::{RetryPolicy, retry_on_error};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .max_retries(5)
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(10))
//!     .multiplier(2.0)
//!     .build();
//!
//! let config = RequestConfig::builder(HttpDriver)
//!     .on_error(retry_on_error(policy))
//!     .build();
//! ```

use crate::metrics::RetryMetrics;
use saga_requests_core::error::RequestError;
use saga_requests_core::hooks::{HookContext, HookFuture};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for exponential backoff.
///
/// # Default Values
///
/// - `max_retries`: 3
/// - `initial_delay`: 100ms
/// - `max_delay`: 30 seconds
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Add up to 50% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            max_retries: None,
            initial_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: false,
        }
    }

    /// Calculate delay for a given attempt number.
    ///
    /// Uses exponential backoff: delay = initial_delay * (multiplier ^ attempt),
    /// capped at `max_delay`. With jitter enabled the result is scaled by a
    /// random factor in `0.5..=1.0` to spread out concurrent retries.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )] // Delays are far below the ranges where these casts lose meaning
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        use rand::Rng;

        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            capped_ms * rand::thread_rng().gen_range(0.5..=1.0)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms as u64)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_retries: Option<usize>,
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: bool,
}

impl RetryPolicyBuilder {
    /// Set maximum number of retries.
    #[must_use]
    pub const fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Set initial delay before first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Enable random jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_delay: self.initial_delay.unwrap_or(defaults.initial_delay),
            max_delay: self.max_delay.unwrap_or(defaults.max_delay),
            multiplier: self.multiplier.unwrap_or(defaults.multiplier),
            jitter: self.jitter,
        }
    }
}

/// Continue retrying an operation whose first attempt already failed with `error`.
///
/// The operation runs up to `policy.max_retries` more times.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once retries
/// are exhausted.
///
/// # Example
///
/// ```rust
/// use saga_requests_runtime::retry::{RetryPolicy, retry_after_failure};
///
/// # async fn example() -> Result<(), String> {
/// let result = retry_after_failure(
///     &RetryPolicy::default(),
///     "first attempt failed".to_string(),
///     || async { Ok::<_, String>(42) },
///     |_| true,
/// )
/// .await?;
///
/// assert_eq!(result, 42);
/// # Ok(())
/// # }
/// ```
pub async fn retry_after_failure<F, Fut, T, E, P>(
    policy: &RetryPolicy,
    error: E,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut last_error = error;

    for attempt in 0..policy.max_retries {
        if !is_retryable(&last_error) {
            tracing::warn!(error = %last_error, "Error is not retryable, failing immediately");
            return Err(last_error);
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            attempt,
            delay_ms = delay.as_millis(),
            error = %last_error,
            "Operation failed, retrying..."
        );
        RetryMetrics::record_attempt();
        sleep(delay).await;

        match operation().await {
            Ok(result) => {
                tracing::info!(attempt, "Operation succeeded after retry");
                RetryMetrics::record_success();
                return Ok(result);
            },
            Err(error) => last_error = error,
        }
    }

    if is_retryable(&last_error) {
        tracing::error!(error = %last_error, "Operation failed after max retries");
        RetryMetrics::record_exhausted();
    }
    Err(last_error)
}

/// Whether a failure is worth retrying.
///
/// Transport failures without a status, timeouts (408), throttling (429) and
/// server errors (5xx) are; hook failures and client errors are not.
#[must_use]
pub fn is_transient(error: &RequestError) -> bool {
    match error {
        RequestError::Transport { status: None, .. } => true,
        RequestError::Transport {
            status: Some(status),
            ..
        } => *status == 408 || *status == 429 || *status >= 500,
        RequestError::Hook { .. } | RequestError::InvalidDescriptor(_) | RequestError::Payload(_) => false,
    }
}

/// `on_error` hook re-sending transient failures according to `policy`.
///
/// The descriptor(s) are the ones the invocation sent, after `on_request`
/// transformed them, with the invocation's single/batch mode. The failure
/// that triggered the hook counts as the first attempt.
pub fn retry_on_error(
    policy: RetryPolicy,
) -> impl Fn(RequestError, HookContext) -> HookFuture<Result<Value, RequestError>> + Send + Sync + 'static
{
    retry_on_error_if(policy, is_transient)
}

/// `on_error` hook re-sending failures accepted by `is_retryable`.
pub fn retry_on_error_if<P>(
    policy: RetryPolicy,
    is_retryable: P,
) -> impl Fn(RequestError, HookContext) -> HookFuture<Result<Value, RequestError>> + Send + Sync + 'static
where
    P: Fn(&RequestError) -> bool + Copy + Send + Sync + 'static,
{
    move |error: RequestError, ctx: HookContext| -> HookFuture<Result<Value, RequestError>> {
        let policy = policy.clone();
        Box::pin(async move {
            let requests = ctx.requests().clone();
            retry_after_failure(&policy, error, || ctx.resend(&requests), is_retryable).await
        })
    }
}
