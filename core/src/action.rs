//! Action model shared by request actions and the notifications derived from them.
//!
//! Two payload conventions flow through the same dispatch pipeline:
//!
//! - **Flat**: fields live next to `type` (`{ "type": "FETCH", "request": {..} }`)
//! - **Tagged**: everything lives under `payload`
//!   (`{ "type": "FETCH", "payload": { "request": {..} } }`), with an optional
//!   `error: true` marker
//!
//! The convention is decided once, when the [`Action`] is built, and carried as
//! an [`ActionBody`] variant from then on. Notifications mirror whatever the
//! originating request action used.
//!
//! # Wire Format
//!
//! [`Action`] serializes to and from plain JSON objects:
//!
//! ```text
//! { "type": "FETCH_POST_SUCCESS",
//!   "data": { .. },
//!   "meta": { "requestAction": { "type": "FETCH_POST", .. } } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON key holding the action type
pub const TYPE_KEY: &str = "type";

/// JSON key holding the payload of a tagged action
pub const PAYLOAD_KEY: &str = "payload";

/// JSON key holding the error marker of a tagged action
pub const ERROR_KEY: &str = "error";

/// JSON key holding the metadata bag
pub const META_KEY: &str = "meta";

/// Metadata key linking a notification back to its request action
pub const REQUEST_ACTION_KEY: &str = "requestAction";

/// Errors raised while decoding an [`Action`] from JSON.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The value is not a JSON object
    #[error("Action must be a JSON object")]
    NotAnObject,

    /// The object has no string `type` field
    #[error("Action is missing a string `type` field")]
    MissingType,

    /// `meta` is present but not an object
    #[error("Action meta must be a JSON object")]
    InvalidMeta,
}

/// Body of an action, tagged with the payload convention it uses.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionBody {
    /// Flat convention: fields sit next to `type`
    Flat(Map<String, Value>),

    /// Tagged convention: a single `payload` plus an error marker
    Tagged {
        /// The action payload
        payload: Value,
        /// Whether the action reports an error
        error: bool,
    },
}

impl ActionBody {
    /// Empty flat body
    #[must_use]
    pub fn empty() -> Self {
        Self::Flat(Map::new())
    }

    /// Whether this body uses the tagged convention
    #[must_use]
    pub const fn is_tagged(&self) -> bool {
        matches!(self, Self::Tagged { .. })
    }

    /// The object request keys are looked up in.
    ///
    /// For flat bodies this is the field map itself; for tagged bodies it is
    /// the payload, when the payload is an object.
    #[must_use]
    pub fn effective_payload(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Flat(fields) => Some(fields),
            Self::Tagged { payload, .. } => payload.as_object(),
        }
    }
}

/// Metadata attached to an action.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Meta {
    /// The request action a notification was derived from
    pub request_action: Option<Box<Action>>,

    /// Caller-supplied key-value pairs
    pub values: Map<String, Value>,
}

impl Meta {
    /// Whether the bag carries nothing at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.request_action.is_none() && self.values.is_empty()
    }

    /// Copy of this metadata pointing back at `action`
    #[must_use]
    pub fn linked_to(&self, action: &Action) -> Self {
        Self {
            request_action: Some(Box::new(action.clone())),
            values: self.values.clone(),
        }
    }
}

impl TryFrom<Map<String, Value>> for Meta {
    type Error = ActionError;

    fn try_from(mut values: Map<String, Value>) -> Result<Self, Self::Error> {
        let request_action = match values.remove(REQUEST_ACTION_KEY) {
            None | Some(Value::Null) => None,
            Some(value) => Some(Box::new(Action::try_from(value)?)),
        };

        Ok(Self {
            request_action,
            values,
        })
    }
}

impl From<Meta> for Value {
    fn from(meta: Meta) -> Self {
        let mut object = meta.values;
        if let Some(action) = meta.request_action {
            object.insert(REQUEST_ACTION_KEY.to_string(), Value::from(*action));
        }
        Value::Object(object)
    }
}

/// Body and metadata of an action whose type is decided elsewhere.
///
/// Produced by the notification shaping functions; the coordinator pairs it
/// with the derived notification type via [`Action::from_shape`].
#[derive(Clone, Debug, PartialEq)]
pub struct ActionShape {
    /// Body of the resulting action
    pub body: ActionBody,
    /// Metadata of the resulting action
    pub meta: Meta,
}

/// An action flowing through the dispatch pipeline.
///
/// Actions are immutable once built; the builder methods consume `self`.
///
/// # Example
///
/// ```
/// use saga_requests_core::action::Action;
/// use serde_json::json;
///
/// let action = Action::flat("FETCH_POST")
///     .with_field("request", json!({ "url": "/posts/1" }))
///     .with_meta("page", json!(1));
///
/// assert_eq!(action.action_type(), "FETCH_POST");
/// assert!(!action.body().is_tagged());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Action {
    action_type: String,
    body: ActionBody,
    meta: Meta,
}

impl Action {
    /// New flat action with no fields
    #[must_use]
    pub fn flat(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            body: ActionBody::empty(),
            meta: Meta::default(),
        }
    }

    /// New tagged action carrying `payload`.
    ///
    /// A `null` payload does not survive the wire: the decoded action is
    /// flat with no fields.
    #[must_use]
    pub fn tagged(action_type: impl Into<String>, payload: Value) -> Self {
        Self {
            action_type: action_type.into(),
            body: ActionBody::Tagged {
                payload,
                error: false,
            },
            meta: Meta::default(),
        }
    }

    /// Assemble an action from a type and a pre-built shape
    #[must_use]
    pub fn from_shape(action_type: impl Into<String>, shape: ActionShape) -> Self {
        Self {
            action_type: action_type.into(),
            body: shape.body,
            meta: shape.meta,
        }
    }

    /// Add a field.
    ///
    /// On flat actions the field sits next to `type`; on tagged actions it is
    /// inserted into the payload object (a non-object payload is replaced).
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        match &mut self.body {
            ActionBody::Flat(fields) => {
                fields.insert(key.into(), value);
            },
            ActionBody::Tagged { payload, .. } => {
                if !payload.is_object() {
                    *payload = Value::Object(Map::new());
                }
                if let Value::Object(fields) = payload {
                    fields.insert(key.into(), value);
                }
            },
        }
        self
    }

    /// Add a metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.values.insert(key.into(), value);
        self
    }

    /// The action type
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// The action body
    #[must_use]
    pub const fn body(&self) -> &ActionBody {
        &self.body
    }

    /// The action metadata
    #[must_use]
    pub const fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Look up a key in the effective payload
    #[must_use]
    pub fn payload_field(&self, key: &str) -> Option<&Value> {
        self.body.effective_payload().and_then(|fields| fields.get(key))
    }

    /// The request action this notification was derived from, if any
    #[must_use]
    pub fn request_action(&self) -> Option<&Self> {
        self.meta.request_action.as_deref()
    }

    /// Serialize to the JSON wire form
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

/// Decodes the JSON wire form.
///
/// A non-null `payload` selects the tagged convention. Only `type`, `payload`,
/// `error` and `meta` are read then; other top-level fields are dropped.
impl TryFrom<Value> for Action {
    type Error = ActionError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let Value::Object(mut fields) = value else {
            return Err(ActionError::NotAnObject);
        };

        let Some(Value::String(action_type)) = fields.remove(TYPE_KEY) else {
            return Err(ActionError::MissingType);
        };

        let meta = match fields.remove(META_KEY) {
            None | Some(Value::Null) => Meta::default(),
            Some(Value::Object(values)) => Meta::try_from(values)?,
            Some(_) => return Err(ActionError::InvalidMeta),
        };

        let body = match fields.remove(PAYLOAD_KEY) {
            Some(payload) if !payload.is_null() => ActionBody::Tagged {
                payload,
                error: fields
                    .get(ERROR_KEY)
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            },
            _ => ActionBody::Flat(fields),
        };

        Ok(Self {
            action_type,
            body,
            meta,
        })
    }
}

impl From<Action> for Value {
    fn from(action: Action) -> Self {
        let mut object = Map::new();

        match action.body {
            ActionBody::Flat(fields) => object.extend(fields),
            ActionBody::Tagged { payload, error } => {
                object.insert(PAYLOAD_KEY.to_string(), payload);
                if error {
                    object.insert(ERROR_KEY.to_string(), Value::Bool(true));
                }
            },
        }

        // `type` and `meta` win over flat fields of the same name
        object.insert(TYPE_KEY.to_string(), Value::String(action.action_type));
        if !action.meta.is_empty() {
            object.insert(META_KEY.to_string(), Value::from(action.meta));
        }

        Value::Object(object)
    }
}
