//! # Saga Requests Core
//!
//! Core traits and types for coordinating request actions.
//!
//! A *request action* describes one or more network calls. The runtime
//! executes those calls through a pluggable [`Driver`](driver::Driver) and
//! reports the outcome back into the same dispatch pipeline as a
//! *notification action* (`_SUCCESS`, `_ERROR` or `_ABORT`).
//!
//! ## Core Concepts
//!
//! - **Action**: JSON-shaped input/output of the pipeline, flat or tagged
//! - **Requests**: the opaque descriptor(s) carried by a request action
//! - **Driver**: transport adapter producing per-invocation handlers
//! - **Config**: immutable notification types, shapes and hooks
//! - **Hooks**: async functions interposed before sending, after success,
//!   after failure and on abort
//! - **Dispatch**: append-only sink notifications are written to
//!
//! ## Example
//!
//! ```ignore
//! use saga_requests_core::prelude::*;
//!
//! let config = RequestConfig::builder(HttpDriver)
//!     .on_success(|response, _ctx| async move { Ok(response) })
//!     .build();
//! let instance = Arc::new(RequestInstance::new(client, config));
//!
//! let action = Action::flat("FETCH_POST").with_field("request", json!({ "url": "/posts/1" }));
//! assert!(is_request_action(&action));
//! ```

/// Action model (flat and tagged conventions, metadata, wire format)
pub mod action;

/// Request configuration and instances
pub mod config;

/// Dispatch sink abstraction
pub mod dispatch;

/// Driver and request handler traits
pub mod driver;

/// Error taxonomy
pub mod error;

/// Lifecycle hooks
pub mod hooks;

/// Default notification types and shapes
pub mod notification;

/// Request classification, extraction and outcomes
pub mod request;

/// Commonly used items
pub mod prelude {
    pub use crate::action::{Action, ActionBody, ActionShape, Meta};
    pub use crate::config::{RequestConfig, RequestConfigBuilder, RequestInstance};
    pub use crate::dispatch::{Dispatch, NoopDispatch};
    pub use crate::driver::{Driver, RequestHandlers, SendFuture};
    pub use crate::error::{HookKind, InvalidPayloadError, RequestError};
    pub use crate::hooks::{HookContext, Hooks};
    pub use crate::request::{Outcome, Requests, is_request_action};
}

// Re-export commonly used types
pub use serde_json::{Value, json};
