//! # Saga Requests Testing
//!
//! Testing utilities for request coordination.
//!
//! This crate provides:
//! - [`MockDriver`]: a driver answering from a per-descriptor script
//! - [`RecordingDispatcher`]: a dispatch sink that keeps every action
//! - [`fixtures`]: request action builders
//! - [`TestHarness`]: a coordinator wired to both
//!
//! ## Example
//!
//! ```ignore
//! use saga_requests_testing::{TestHarness, fixtures::request_action};
//!
//! #[tokio::test]
//! async fn fetch_post() {
//!     let harness = TestHarness::new();
//!
//!     harness.run(request_action("FETCH_POST", json!("/posts/1"))).await?;
//!
//!     assert_eq!(harness.dispatcher.types(), vec!["FETCH_POST_SUCCESS"]);
//! }
//! ```

mod driver_mocks;
mod recording;

pub use driver_mocks::{MockClient, MockDriver, Reply, SentRequest};
pub use recording::RecordingDispatcher;

use saga_requests_core::action::Action;
use saga_requests_core::config::{RequestConfig, RequestConfigBuilder, RequestInstance};
use saga_requests_core::request::Outcome;
use saga_requests_runtime::{ConfigStore, Coordinator, RunError, RunOptions};
use std::sync::Arc;

/// Request action builders.
pub mod fixtures {
    use saga_requests_core::action::Action;
    use serde_json::{Value, json};

    /// Flat action carrying one descriptor
    #[must_use]
    pub fn request_action(action_type: &str, request: Value) -> Action {
        Action::flat(action_type).with_field("request", request)
    }

    /// Flat action carrying a batch of descriptors
    #[must_use]
    pub fn batch_action(action_type: &str, requests: Vec<Value>) -> Action {
        Action::flat(action_type).with_field("requests", Value::Array(requests))
    }

    /// Tagged action carrying one descriptor under `payload`
    #[must_use]
    pub fn tagged_request_action(action_type: &str, request: Value) -> Action {
        Action::tagged(action_type, json!({ "request": request }))
    }
}

/// Install a `tracing` subscriber writing to the test output.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Instance over `driver` with default configuration and the default client
#[must_use]
pub fn mock_instance(driver: &MockDriver) -> RequestInstance<MockDriver> {
    RequestInstance::new(MockClient::default(), RequestConfig::builder(driver.clone()).build())
}

/// Coordinator wired to a [`MockDriver`] and a [`RecordingDispatcher`].
#[derive(Clone)]
pub struct TestHarness {
    /// The scripted driver
    pub driver: MockDriver,
    /// Where notifications land
    pub dispatcher: RecordingDispatcher,
    /// The coordinator under test
    pub coordinator: Coordinator<MockDriver>,
}

impl TestHarness {
    /// Harness with the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_driver(MockDriver::new())
    }

    /// Harness over an existing driver
    #[must_use]
    pub fn with_driver(driver: MockDriver) -> Self {
        Self::configured(driver, |builder| builder)
    }

    /// Harness whose configuration is adjusted by `configure`
    #[must_use]
    pub fn configured(
        driver: MockDriver,
        configure: impl FnOnce(RequestConfigBuilder<MockDriver>) -> RequestConfigBuilder<MockDriver>,
    ) -> Self {
        let config = configure(RequestConfig::builder(driver.clone())).build();
        let store = ConfigStore::new(RequestInstance::new(MockClient::default(), config));
        let dispatcher = RecordingDispatcher::new();
        let coordinator = Coordinator::new(store, Arc::new(dispatcher.clone()));

        Self {
            driver,
            dispatcher,
            coordinator,
        }
    }

    /// Run `action` with default options
    ///
    /// # Errors
    ///
    /// Whatever the invocation returns.
    pub async fn run(&self, action: Action) -> Result<Outcome, RunError> {
        self.coordinator.run(action, RunOptions::new()).await
    }

    /// Run `action` with `options`
    ///
    /// # Errors
    ///
    /// Whatever the invocation returns.
    pub async fn run_with(&self, action: Action, options: RunOptions) -> Result<Outcome, RunError> {
        self.coordinator.run(action, options).await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
