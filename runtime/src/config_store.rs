//! Swappable holder for the active request instance.
//!
//! The instance itself is immutable; the store only ever replaces it
//! wholesale. Invocations take a snapshot when they start, so a replacement
//! affects invocations started afterwards and never the ones in flight.

use saga_requests_core::config::RequestInstance;
use saga_requests_core::driver::Driver;
use std::sync::Arc;
use tokio::sync::watch;

/// Holder of the current `Arc<RequestInstance<D>>`.
///
/// Cloning is cheap; clones observe each other's replacements.
pub struct ConfigStore<D: Driver> {
    current: Arc<watch::Sender<Arc<RequestInstance<D>>>>,
}

impl<D: Driver> ConfigStore<D> {
    /// Store holding `instance`
    #[must_use]
    pub fn new(instance: RequestInstance<D>) -> Self {
        let (current, _) = watch::channel(Arc::new(instance));
        Self {
            current: Arc::new(current),
        }
    }

    /// Snapshot of the current instance
    #[must_use]
    pub fn current(&self) -> Arc<RequestInstance<D>> {
        Arc::clone(&self.current.borrow())
    }

    /// Replace the instance for invocations started from now on
    pub fn replace(&self, instance: RequestInstance<D>) {
        tracing::info!("Replacing request instance");
        self.current.send_replace(Arc::new(instance));
    }

    /// Receiver notified on every replacement
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<RequestInstance<D>>> {
        self.current.subscribe()
    }
}

impl<D: Driver> Clone for ConfigStore<D> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
        }
    }
}

impl<D: Driver> std::fmt::Debug for ConfigStore<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("current", &*self.current.borrow())
            .finish()
    }
}
