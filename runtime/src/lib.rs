//! # Saga Requests Runtime
//!
//! Runtime implementation for coordinating request actions.
//!
//! This crate runs request actions through their lifecycle and feeds the
//! resulting notifications back into the dispatch pipeline.
//!
//! ## Core Components
//!
//! - **Coordinator**: the cancellable state machine running one request action
//! - **Action Channel**: broadcast dispatch pipeline notifications flow into
//! - **Config Store**: holder of the active request instance, swapped wholesale
//! - **Watcher**: spawns an invocation for every request action on a stream,
//!   with latest-wins and cancel-on-action variants
//!
//! ## Example
//!
//! ```ignore
//! use saga_requests_runtime::{ActionChannel, ConfigStore, RequestWatcher};
//!
//! let channel = ActionChannel::new();
//! let watcher = RequestWatcher::new(ConfigStore::new(instance), channel.clone());
//!
//! // Run every request action dispatched from now on
//! tokio::spawn({
//!     let watcher = watcher.clone();
//!     let actions = channel.stream();
//!     async move { watcher.watch_requests(actions).await }
//! });
//!
//! channel.dispatch(Action::flat("FETCH_POST").with_field("request", json!({ "url": "/posts/1" })));
//! ```

/// Broadcast dispatch channel
pub mod channel;

/// Swappable request instance holder
pub mod config_store;

/// Request lifecycle state machine
pub mod coordinator;

/// Prometheus metrics for observability
pub mod metrics;

/// Retry logic with exponential backoff
pub mod retry;

/// Continuous dispatch watcher and cancellation policies
pub mod watcher;

/// Error types for the request runtime
pub mod error {
    use saga_requests_core::error::{InvalidPayloadError, RequestError};
    use thiserror::Error;

    /// Ways an invocation can end without an [`Outcome`](saga_requests_core::request::Outcome)
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum RunError {
        /// The action is not a request action
        ///
        /// Raised before any side effect.
        #[error(transparent)]
        InvalidPayload(#[from] InvalidPayloadError),

        /// The invocation was cancelled before reaching a terminal state
        ///
        /// The abort notification has already been dispatched (unless silent).
        #[error("Request cancelled")]
        Cancelled,

        /// The driver could not map the final response into a success payload
        ///
        /// Fatal for this invocation only; nothing was dispatched.
        #[error("Success payload mapping failed: {0}")]
        SuccessPayload(RequestError),

        /// The task running the invocation panicked or was aborted
        #[error("Invocation task failed: {0}")]
        TaskFailed(String),
    }

    impl RunError {
        /// Whether the invocation was cancelled
        #[must_use]
        pub const fn is_cancelled(&self) -> bool {
            matches!(self, Self::Cancelled)
        }
    }

    /// Errors from the watcher's lifecycle
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum WatcherError {
        /// Shutdown timed out waiting for invocations to finish
        ///
        /// Some invocations were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} invocations still running")]
        ShutdownTimeout(usize),
    }
}

pub use channel::ActionChannel;
pub use config_store::ConfigStore;
pub use coordinator::{Coordinator, RunOptions, run_request};
pub use error::{RunError, WatcherError};
pub use watcher::{RequestTask, RequestWatcher, WatcherConfig};
