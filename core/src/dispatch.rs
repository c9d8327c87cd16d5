//! The dispatch surface notifications are written to.

use crate::action::Action;
use std::sync::Arc;

/// Append-only sink for actions.
///
/// Implemented by the runtime's action channel; test code records into a
/// vector instead. Dispatching never fails from the caller's point of view:
/// a sink with no listeners simply drops the action.
pub trait Dispatch: Send + Sync {
    /// Dispatch an action into the pipeline
    fn dispatch(&self, action: Action);
}

impl<T: Dispatch + ?Sized> Dispatch for Arc<T> {
    fn dispatch(&self, action: Action) {
        (**self).dispatch(action);
    }
}

/// Sink that discards every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatch;

impl Dispatch for NoopDispatch {
    fn dispatch(&self, _action: Action) {}
}
