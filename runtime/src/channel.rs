//! Broadcast action channel.
//!
//! [`ActionChannel`] is the dispatch pipeline the coordinator writes
//! notifications to. Every subscriber receives a clone of every action
//! dispatched after it subscribed, which is how the watcher picks up request
//! actions and how cancel races observe cancel actions.

use futures::Stream;
use saga_requests_core::action::Action;
use saga_requests_core::dispatch::Dispatch;
use std::pin::Pin;
use tokio::sync::broadcast;

/// Stream of dispatched actions
pub type ActionStream = Pin<Box<dyn Stream<Item = Action> + Send>>;

/// Default number of actions buffered per subscriber
pub const DEFAULT_CAPACITY: usize = 256;

/// Fan-out dispatch channel.
///
/// Cloning is cheap and every clone dispatches into the same channel.
///
/// # Example
///
/// ```ignore
/// let channel = ActionChannel::new();
/// let mut rx = channel.subscribe();
///
/// channel.dispatch(Action::flat("PING"));
/// assert_eq!(rx.recv().await?.action_type(), "PING");
/// ```
#[derive(Debug, Clone)]
pub struct ActionChannel {
    sender: broadcast::Sender<Action>,
}

impl ActionChannel {
    /// Channel with [`DEFAULT_CAPACITY`]
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Channel buffering `capacity` actions per subscriber.
    ///
    /// Increase if subscribers frequently lag.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Raw receiver for every subsequently dispatched action
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Action> {
        self.sender.subscribe()
    }

    /// Stream of every subsequently dispatched action.
    ///
    /// Lagged subscribers skip the dropped actions with a warning; the
    /// stream ends when every sender is gone.
    #[must_use]
    pub fn stream(&self) -> ActionStream {
        let mut rx = self.subscribe();

        Box::pin(async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(action) => yield action,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Action subscriber lagged, {} actions skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ActionChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch for ActionChannel {
    fn dispatch(&self, action: Action) {
        tracing::trace!(action_type = action.action_type(), "Dispatching action");
        // No subscribers is not an error: the action is simply unobserved
        let _ = self.sender.send(action);
    }
}
