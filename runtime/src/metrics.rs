//! Prometheus metrics for request coordination.
//!
//! The coordinator records one counter per terminal path plus a latency
//! histogram:
//! - `requests_started_total{mode}`
//! - `requests_succeeded_total` / `requests_failed_total` / `requests_aborted_total`
//! - `requests_recovered_total` (failures turned into responses by `on_error`)
//! - `request_duration_seconds`
//!
//! Nothing is exported unless a recorder is installed, e.g. with
//! [`MetricsServer::start`].
//!
//! # Example
//!
//! ```rust,no_run
//! use saga_requests_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Installs the global recorder; the handle renders the scrape body.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address the scrape endpoint is meant to be served on
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a metrics recorder is already installed (e.g., in tests), the
    /// installation is skipped and `Ok(())` is returned.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "requests_started_total",
        "Total number of request invocations started"
    );
    describe_counter!(
        "requests_succeeded_total",
        "Total number of invocations that ended with a response"
    );
    describe_counter!(
        "requests_failed_total",
        "Total number of invocations that ended with an error"
    );
    describe_counter!(
        "requests_recovered_total",
        "Total number of failures recovered by the on_error hook"
    );
    describe_counter!(
        "requests_aborted_total",
        "Total number of invocations cancelled before completion"
    );
    describe_histogram!(
        "request_duration_seconds",
        "Time from invocation start to its terminal state"
    );

    describe_counter!("retry_attempts_total", "Total number of retry attempts");
    describe_counter!(
        "retry_successes_total",
        "Total number of successful retries"
    );
    describe_counter!(
        "retry_exhausted_total",
        "Total number of retry loops that exhausted max retries"
    );
}

/// Request lifecycle metrics recorder.
pub struct RequestMetrics;

impl RequestMetrics {
    /// Record an invocation start.
    pub fn record_started(mode: &'static str) {
        counter!("requests_started_total", "mode" => mode).increment(1);
    }

    /// Record an invocation that ended with a response.
    pub fn record_succeeded(duration: Duration) {
        counter!("requests_succeeded_total").increment(1);
        histogram!("request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an invocation that ended with an error.
    pub fn record_failed(duration: Duration) {
        counter!("requests_failed_total").increment(1);
        histogram!("request_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a failure recovered by `on_error`.
    pub fn record_recovered() {
        counter!("requests_recovered_total").increment(1);
    }

    /// Record a cancelled invocation.
    pub fn record_aborted() {
        counter!("requests_aborted_total").increment(1);
    }
}

/// Retry metrics recorder.
pub struct RetryMetrics;

impl RetryMetrics {
    /// Record a retry attempt.
    pub fn record_attempt() {
        counter!("retry_attempts_total").increment(1);
    }

    /// Record a successful retry.
    pub fn record_success() {
        counter!("retry_successes_total").increment(1);
    }

    /// Record exhausted retries.
    pub fn record_exhausted() {
        counter!("retry_exhausted_total").increment(1);
    }
}
