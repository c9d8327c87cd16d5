//! Dispatcher that records every action it receives

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only follows a panicking test

use saga_requests_core::action::Action;
use saga_requests_core::dispatch::Dispatch;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// In-memory [`Dispatch`] sink.
///
/// Clones share the recorded actions.
///
/// # Example
///
/// ```
/// use saga_requests_testing::RecordingDispatcher;
/// use saga_requests_core::action::Action;
/// use saga_requests_core::dispatch::Dispatch;
///
/// let dispatcher = RecordingDispatcher::new();
/// dispatcher.dispatch(Action::flat("PING"));
///
/// assert_eq!(dispatcher.types(), vec!["PING"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    actions: Arc<RwLock<Vec<Action>>>,
}

impl RecordingDispatcher {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded action, in dispatch order
    #[must_use]
    pub fn actions(&self) -> Vec<Action> {
        self.actions.read().unwrap().clone()
    }

    /// Types of the recorded actions, in dispatch order
    #[must_use]
    pub fn types(&self) -> Vec<String> {
        self.actions
            .read()
            .unwrap()
            .iter()
            .map(|action| action.action_type().to_string())
            .collect()
    }

    /// Recorded actions of `action_type`
    #[must_use]
    pub fn of_type(&self, action_type: &str) -> Vec<Action> {
        self.actions
            .read()
            .unwrap()
            .iter()
            .filter(|action| action.action_type() == action_type)
            .cloned()
            .collect()
    }

    /// Number of recorded actions
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.read().unwrap().len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.actions.write().unwrap().clear();
    }

    /// Wait until an action of `action_type` is recorded.
    ///
    /// Returns `None` if none shows up within `timeout`.
    pub async fn wait_for(&self, action_type: &str, timeout: Duration) -> Option<Action> {
        let start = Instant::now();
        let poll_interval = Duration::from_millis(5);

        loop {
            if let Some(action) = self.of_type(action_type).into_iter().next() {
                return Some(action);
            }
            if start.elapsed() >= timeout {
                return None;
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl Dispatch for RecordingDispatcher {
    fn dispatch(&self, action: Action) {
        self.actions.write().unwrap().push(action);
    }
}
