//! Default notification types and shapes.
//!
//! Every notification links back to its request action through
//! `meta.requestAction` and mirrors the request action's payload convention:
//!
//! | outcome | flat | tagged |
//! |---|---|---|
//! | success | `{ data }` | `{ payload: { data } }` |
//! | error | `{ error: <payload> }` | `{ payload: <payload>, error: true }` |
//! | abort | `{}` | `{}` |

use crate::action::{Action, ActionBody, ActionShape};
use serde_json::{Map, Value, json};

/// Suffix of success notification types
pub const SUCCESS_SUFFIX: &str = "_SUCCESS";

/// Suffix of error notification types
pub const ERROR_SUFFIX: &str = "_ERROR";

/// Suffix of abort notification types
pub const ABORT_SUFFIX: &str = "_ABORT";

/// `FETCH` → `FETCH_SUCCESS`
#[must_use]
pub fn success(action_type: &str) -> String {
    format!("{action_type}{SUCCESS_SUFFIX}")
}

/// `FETCH` → `FETCH_ERROR`
#[must_use]
pub fn error(action_type: &str) -> String {
    format!("{action_type}{ERROR_SUFFIX}")
}

/// `FETCH` → `FETCH_ABORT`
#[must_use]
pub fn abort(action_type: &str) -> String {
    format!("{action_type}{ABORT_SUFFIX}")
}

/// Default success shape
#[must_use]
pub fn success_action(action: &Action, data: Value) -> ActionShape {
    let body = if action.body().is_tagged() {
        ActionBody::Tagged {
            payload: json!({ "data": data }),
            error: false,
        }
    } else {
        ActionBody::Flat(Map::from_iter([("data".to_string(), data)]))
    };

    ActionShape {
        body,
        meta: action.meta().linked_to(action),
    }
}

/// Default error shape
#[must_use]
pub fn error_action(action: &Action, error: Value) -> ActionShape {
    let body = if action.body().is_tagged() {
        ActionBody::Tagged {
            payload: error,
            error: true,
        }
    } else {
        ActionBody::Flat(Map::from_iter([("error".to_string(), error)]))
    };

    ActionShape {
        body,
        meta: action.meta().linked_to(action),
    }
}

/// Default abort shape: metadata only
#[must_use]
pub fn abort_action(action: &Action) -> ActionShape {
    ActionShape {
        body: ActionBody::empty(),
        meta: action.meta().linked_to(action),
    }
}
