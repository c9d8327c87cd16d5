//! Error taxonomy for request coordination.
//!
//! - [`InvalidPayloadError`]: programmer error, the action carries no request
//! - [`RequestError`]: transport and hook failures, eligible for recovery
//!   through the `on_error` hook

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// The action carries neither `request` nor `requests`.
///
/// Raised before any side effect; never silenced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid request action `{action_type}`: payload must contain `request` or `requests`")]
pub struct InvalidPayloadError {
    /// Type of the rejected action
    pub action_type: String,
}

impl InvalidPayloadError {
    /// New error for the given action type
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
        }
    }
}

/// Lifecycle hook that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// `on_request`
    Request,
    /// `on_success`
    Success,
    /// `on_error`
    Error,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "on_request"),
            Self::Success => write!(f, "on_success"),
            Self::Error => write!(f, "on_error"),
        }
    }
}

/// A failed request, as seen by hooks and drivers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// The transport reported a failure
    #[error("Transport error: {message}")]
    Transport {
        /// Human-readable description
        message: String,
        /// Status code reported by the transport, if any
        status: Option<u16>,
        /// Response body or other driver data, if any
        data: Option<Value>,
    },

    /// A lifecycle hook failed
    #[error("Hook `{hook}` failed: {message}")]
    Hook {
        /// The hook that failed
        hook: HookKind,
        /// Human-readable description
        message: String,
    },

    /// The descriptor could not be interpreted by the driver
    #[error("Invalid request descriptor: {0}")]
    InvalidDescriptor(String),

    /// The driver could not map a response into a payload
    #[error("Payload mapping failed: {0}")]
    Payload(String),
}

impl RequestError {
    /// Transport failure with only a message
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
            data: None,
        }
    }

    /// Transport failure with a status code
    #[must_use]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
            data: None,
        }
    }

    /// Failure raised by a hook
    #[must_use]
    pub fn hook(hook: HookKind, message: impl Into<String>) -> Self {
        Self::Hook {
            hook,
            message: message.into(),
        }
    }

    /// Status code, for transport failures that carry one
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}
