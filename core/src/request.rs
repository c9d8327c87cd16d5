//! Request classification and extraction.
//!
//! An action is a *request action* when its effective payload carries a
//! `request` (single call) or `requests` (ordered batch) entry. Descriptors are
//! opaque JSON values handed untouched to the driver.

use crate::action::Action;
use crate::error::{InvalidPayloadError, RequestError};
use serde_json::Value;

/// Payload key for a single request descriptor
pub const REQUEST_KEY: &str = "request";

/// Payload key for a batch of request descriptors
pub const REQUESTS_KEY: &str = "requests";

/// Whether `action` describes one or more network requests.
///
/// Entries set to `null`, `false`, `0` or `""` count as absent. Any other
/// value, including an empty array or object, makes a request action.
///
/// # Example
///
/// ```
/// use saga_requests_core::action::Action;
/// use saga_requests_core::request::is_request_action;
/// use serde_json::json;
///
/// assert!(is_request_action(&Action::flat("FETCH").with_field("request", json!("/a"))));
/// assert!(is_request_action(&Action::tagged("FETCH", json!({ "requests": [] }))));
/// assert!(!is_request_action(&Action::flat("INCREMENT")));
/// ```
#[must_use]
pub fn is_request_action(action: &Action) -> bool {
    [REQUEST_KEY, REQUESTS_KEY]
        .iter()
        .any(|key| action.payload_field(key).is_some_and(is_set))
}

/// Whether a `request`/`requests` entry carries something
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::Number(number) => number.as_f64().is_none_or(|n| n.abs() > 0.0),
        Value::String(string) => !string.is_empty(),
        Value::Bool(true) | Value::Array(_) | Value::Object(_) => true,
    }
}

/// Descriptor(s) carried by a request action.
///
/// The variant taken at extraction time is kept for the whole invocation: a
/// single request produces a single response, a batch produces an array of
/// responses in descriptor order.
#[derive(Clone, Debug, PartialEq)]
pub enum Requests {
    /// One request
    Single(Value),
    /// Ordered batch, executed concurrently
    Batch(Vec<Value>),
}

impl Requests {
    /// Extract the descriptor(s) from a request action.
    ///
    /// `request` takes precedence over `requests`. Unset entries are skipped
    /// as in [`is_request_action`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPayloadError`] if the action carries neither key, or if
    /// `requests` is not an array.
    pub fn from_action(action: &Action) -> Result<Self, InvalidPayloadError> {
        let invalid = || InvalidPayloadError::new(action.action_type());

        match action.payload_field(REQUEST_KEY) {
            Some(request) if is_set(request) => Ok(Self::Single(request.clone())),
            _ => match action.payload_field(REQUESTS_KEY) {
                Some(Value::Array(requests)) => Ok(Self::Batch(requests.clone())),
                _ => Err(invalid()),
            },
        }
    }

    /// Whether this is a batch
    #[must_use]
    pub const fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    /// Number of network calls this will perform
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(requests) => requests.len(),
        }
    }

    /// Whether no network call will be made (an empty batch)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Label used in logs and metrics
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Single(_) => "single",
            Self::Batch(_) => "batch",
        }
    }
}

impl From<Requests> for Value {
    fn from(requests: Requests) -> Self {
        match requests {
            Requests::Single(request) => request,
            Requests::Batch(requests) => Self::Array(requests),
        }
    }
}

/// Terminal result of a non-cancelled invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    /// The request (or its recovery) succeeded
    Response(Value),
    /// The request failed and was not recovered
    Error(RequestError),
}

impl Outcome {
    /// The response, if successful
    #[must_use]
    pub const fn response(&self) -> Option<&Value> {
        match self {
            Self::Response(response) => Some(response),
            Self::Error(_) => None,
        }
    }

    /// The error, if failed
    #[must_use]
    pub const fn error(&self) -> Option<&RequestError> {
        match self {
            Self::Response(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Whether the invocation succeeded
    #[must_use]
    pub const fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }
}
