//! Driver abstraction over concrete transports.
//!
//! A [`Driver`] turns opaque request descriptors into network calls and maps
//! responses and errors into notification payloads. The coordinator never
//! looks inside descriptors or responses; it only moves them between the
//! driver, the hooks and the dispatch channel.
//!
//! This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
//! `async fn` so that handlers stay object safe and can be shared with hooks
//! as `Arc<dyn RequestHandlers>`.

use crate::config::RequestConfig;
use crate::error::RequestError;
use crate::request::Requests;
use futures::future::try_join_all;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by [`RequestHandlers::send_request`]
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, RequestError>> + Send + 'a>>;

/// Per-invocation request handlers.
///
/// Resolved from the driver at the start of every invocation and owned by
/// that invocation alone. The coordinator calls [`release`](Self::release)
/// exactly once when the invocation ends, whatever the exit path.
pub trait RequestHandlers: Send + Sync {
    /// Perform one network call
    fn send_request(&self, request: Value) -> SendFuture<'_>;

    /// Whether [`abort_request`](Self::abort_request) does anything
    fn supports_abort(&self) -> bool {
        false
    }

    /// Tell in-flight calls to abort.
    ///
    /// Best effort: the remote side effect is not guaranteed to be undone.
    fn abort_request(&self) {}

    /// Driver-level cleanup at the end of the invocation
    fn release(&self) {}
}

/// Transport adapter.
///
/// # Example
///
/// ```ignore
/// struct HttpDriver;
///
/// impl Driver for HttpDriver {
///     type Instance = reqwest::Client;
///
///     fn request_handlers(
///         &self,
///         client: &reqwest::Client,
///         _config: &RequestConfig<Self>,
///     ) -> Arc<dyn RequestHandlers> {
///         Arc::new(HttpHandlers::new(client.clone()))
///     }
///
///     fn success_payload(&self, response: &Value, _requests: &Requests) -> Result<Value, RequestError> {
///         Ok(response["body"].clone())
///     }
///
///     fn error_payload(&self, error: &RequestError) -> Value {
///         json!({ "message": error.to_string() })
///     }
/// }
/// ```
pub trait Driver: Send + Sync + Sized + 'static {
    /// Transport client the handlers are bound to
    type Instance: Send + Sync + 'static;

    /// Handlers bound to `instance` for a single invocation
    fn request_handlers(
        &self,
        instance: &Self::Instance,
        config: &RequestConfig<Self>,
    ) -> Arc<dyn RequestHandlers>;

    /// Map a response (an array of responses for batches) into the success payload.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Payload`] if the response cannot be mapped.
    fn success_payload(&self, response: &Value, requests: &Requests) -> Result<Value, RequestError>;

    /// Map a failure into the error payload
    fn error_payload(&self, error: &RequestError) -> Value;
}

/// Execute `requests` through `handlers`.
///
/// A single request resolves to its response. A batch runs every member
/// concurrently and resolves to the array of responses in descriptor order;
/// the first member to fail fails the whole batch and the remaining members
/// are dropped.
///
/// # Errors
///
/// Returns the error of the single request, or of the first failing batch
/// member.
pub async fn execute(
    handlers: &dyn RequestHandlers,
    requests: &Requests,
) -> Result<Value, RequestError> {
    match requests {
        Requests::Single(request) => handlers.send_request(request.clone()).await,
        Requests::Batch(batch) => {
            let responses =
                try_join_all(batch.iter().map(|request| handlers.send_request(request.clone())))
                    .await?;
            Ok(Value::Array(responses))
        },
    }
}
