//! Continuous dispatch watcher.
//!
//! [`RequestWatcher::watch_requests`] starts an independent invocation for
//! every request action observed on a stream: no de-duplication, no
//! concurrency cap. Narrower policies are opt-in:
//!
//! - [`RequestWatcher::watch_latest`]: one action type, a new action cancels
//!   the previous in-flight invocation (latest wins)
//! - [`RequestWatcher::run_until_cancelled_by`]: one invocation raced
//!   against the first cancel action of a given type
//!
//! Every invocation runs on its own task with a child of the watcher's
//! shutdown token, so [`RequestWatcher::shutdown`] sends all of them down
//! the abort path.

use crate::channel::ActionChannel;
use crate::config_store::ConfigStore;
use crate::coordinator::{Coordinator, RunOptions};
use crate::error::{RunError, WatcherError};
use futures::{Stream, StreamExt};
use saga_requests_core::action::Action;
use saga_requests_core::driver::Driver;
use saga_requests_core::request::{Outcome, is_request_action};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Configuration for [`RequestWatcher`] instances
///
/// # Example
///
/// ```ignore
/// let config = WatcherConfig::default()
///     .with_run_options(RunOptions::silent())
///     .with_shutdown_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    /// Options for invocations started from a stream
    ///
    /// `dispatch_original` is ignored by the watch loops: the original action
    /// is already on the stream.
    pub run_options: RunOptions,
    /// Default timeout for graceful shutdown
    pub shutdown_timeout: Duration,
}

impl WatcherConfig {
    /// Set the options for stream-started invocations
    #[must_use]
    pub const fn with_run_options(mut self, options: RunOptions) -> Self {
        self.run_options = options;
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            run_options: RunOptions::new(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle to an invocation running on its own task.
#[derive(Debug)]
pub struct RequestTask {
    token: CancellationToken,
    handle: JoinHandle<Result<Outcome, RunError>>,
}

impl RequestTask {
    /// Cancel the invocation; it takes the abort path
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The invocation's cancellation token
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the task has finished
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the invocation's result.
    ///
    /// # Errors
    ///
    /// Returns the invocation's [`RunError`], or [`RunError::TaskFailed`] if
    /// the task panicked.
    pub async fn join(self) -> Result<Outcome, RunError> {
        match self.handle.await {
            Ok(result) => result,
            Err(error) => Err(RunError::TaskFailed(error.to_string())),
        }
    }
}

/// Spawns coordinator invocations for request actions.
///
/// Cloning is cheap; clones share the shutdown token and the count of
/// running invocations.
pub struct RequestWatcher<D: Driver> {
    coordinator: Coordinator<D>,
    channel: ActionChannel,
    config: WatcherConfig,
    shutdown: CancellationToken,
    pending: Arc<AtomicUsize>,
}

impl<D: Driver> RequestWatcher<D> {
    /// Watcher dispatching into `channel` with default configuration
    #[must_use]
    pub fn new(config: ConfigStore<D>, channel: ActionChannel) -> Self {
        Self::with_config(config, channel, WatcherConfig::default())
    }

    /// Watcher with custom configuration
    #[must_use]
    pub fn with_config(
        config: ConfigStore<D>,
        channel: ActionChannel,
        watcher_config: WatcherConfig,
    ) -> Self {
        let coordinator = Coordinator::new(config, Arc::new(channel.clone()));

        Self {
            coordinator,
            channel,
            config: watcher_config,
            shutdown: CancellationToken::new(),
            pending: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The coordinator invocations run on
    #[must_use]
    pub const fn coordinator(&self) -> &Coordinator<D> {
        &self.coordinator
    }

    /// The channel notifications are dispatched to
    #[must_use]
    pub const fn channel(&self) -> &ActionChannel {
        &self.channel
    }

    /// Number of invocations still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Start one invocation on its own task
    #[must_use]
    pub fn spawn(&self, action: Action, options: RunOptions) -> RequestTask {
        let token = self.shutdown.child_token();
        let handle = self.spawn_with_token(action, options, token.clone());
        RequestTask { token, handle }
    }

    fn spawn_with_token(
        &self,
        action: Action,
        options: RunOptions,
        token: CancellationToken,
    ) -> JoinHandle<Result<Outcome, RunError>> {
        self.pending.fetch_add(1, Ordering::SeqCst);
        let pending_guard = PendingGuard(Arc::clone(&self.pending));
        let coordinator = self.coordinator.clone();

        tokio::spawn(async move {
            let _pending_guard = pending_guard;

            let result = coordinator.run_cancellable(action, options, &token).await;
            match &result {
                Err(RunError::Cancelled) => tracing::debug!("Invocation cancelled"),
                Err(error) => tracing::warn!(error = %error, "Invocation ended without outcome"),
                Ok(_) => {},
            }
            result
        })
    }

    /// Run every request action from `actions`, each on its own task.
    ///
    /// Non-request actions are ignored. Returns when the stream ends or the
    /// watcher shuts down; invocations already started keep running.
    #[tracing::instrument(skip_all, name = "watch_requests")]
    pub async fn watch_requests<S>(&self, actions: S)
    where
        S: Stream<Item = Action> + Send,
    {
        let options = self.config.run_options.with_dispatch_original(false);
        let mut actions = std::pin::pin!(actions);

        while let Some(action) = self.next_action(&mut actions).await {
            if !is_request_action(&action) {
                continue;
            }
            tracing::debug!(action_type = action.action_type(), "Request action observed");
            drop(self.spawn_with_token(action, options, self.shutdown.child_token()));
        }

        tracing::debug!("Stopped watching requests");
    }

    /// Run request actions of `action_type`, cancelling the previous one each
    /// time a new one arrives.
    ///
    /// The replaced invocation takes the abort path, so it dispatches its
    /// abort notification.
    #[tracing::instrument(skip(self, actions), name = "watch_latest")]
    pub async fn watch_latest<S>(&self, actions: S, action_type: &str)
    where
        S: Stream<Item = Action> + Send,
    {
        let options = self.config.run_options.with_dispatch_original(false);
        let mut actions = std::pin::pin!(actions);
        let mut latest: Option<CancellationToken> = None;

        while let Some(action) = self.next_action(&mut actions).await {
            if action.action_type() != action_type || !is_request_action(&action) {
                continue;
            }

            if let Some(previous) = latest.take() {
                tracing::debug!("Superseding in-flight request");
                previous.cancel();
            }

            let token = self.shutdown.child_token();
            drop(self.spawn_with_token(action, options, token.clone()));
            latest = Some(token);
        }
    }

    /// Run `action` on the current task, cancelling it when an action of
    /// `cancel_type` is dispatched to the channel first.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Cancelled`] if the cancel action (or shutdown) won
    /// the race, or any other error of the invocation.
    #[tracing::instrument(skip(self, action, options), name = "run_until_cancelled_by")]
    pub async fn run_until_cancelled_by(
        &self,
        action: Action,
        cancel_type: &str,
        options: RunOptions,
    ) -> Result<Outcome, RunError> {
        // Subscribe BEFORE starting to avoid missing an early cancel
        let mut cancels = self.channel.stream();
        let token = self.shutdown.child_token();

        let run = self.coordinator.run_cancellable(action, options, &token);
        tokio::pin!(run);

        loop {
            tokio::select! {
                result = &mut run => return result,
                Some(observed) = cancels.next(), if !token.is_cancelled() => {
                    if observed.action_type() == cancel_type {
                        tracing::debug!(cancel_type, "Cancel action observed");
                        token.cancel();
                    }
                }
            }
        }
    }

    /// Stop watching and cancel every running invocation.
    ///
    /// Waits up to `timeout` for the invocations to finish their abort path.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::ShutdownTimeout`] if invocations are still
    /// running when the timeout expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), WatcherError> {
        tracing::info!("Initiating watcher shutdown");
        self.shutdown.cancel();

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(10);

        loop {
            let pending = self.pending();
            if pending == 0 {
                tracing::info!("All invocations finished, shutdown successful");
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(pending, "Shutdown timeout: {} invocations still running", pending);
                return Err(WatcherError::ShutdownTimeout(pending));
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Shut down with [`WatcherConfig::shutdown_timeout`].
    ///
    /// # Errors
    ///
    /// See [`shutdown`](Self::shutdown).
    pub async fn shutdown_default(&self) -> Result<(), WatcherError> {
        self.shutdown(self.config.shutdown_timeout).await
    }

    async fn next_action<S>(&self, actions: &mut std::pin::Pin<&mut S>) -> Option<Action>
    where
        S: Stream<Item = Action>,
    {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => None,
            next = actions.next() => next,
        }
    }
}

impl<D: Driver> Clone for RequestWatcher<D> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
            channel: self.channel.clone(),
            config: self.config,
            shutdown: self.shutdown.clone(),
            pending: Arc::clone(&self.pending),
        }
    }
}

/// Guard that decrements the pending counter on drop
struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
