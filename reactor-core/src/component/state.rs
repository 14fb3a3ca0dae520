//! Component state and handler errors.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::{RecordId, StoreError};

/// Ordered field mapping; the only mutable part of a component.
pub type State = Map<String, Value>;

/// Initial properties passed at join time.
pub type Props = Map<String, Value>;

/// Named fields carried by an event.
pub type Payload = Map<String, Value>;

/// Failure raised by a handler, a mount hook, or a read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn missing_field(name: &str) -> Self {
        Self::new(format!("missing or invalid field `{name}`"))
    }
}

impl From<StoreError> for HandlerError {
    fn from(err: StoreError) -> Self {
        Self::new(err.to_string())
    }
}

/// Typed access to state, props and payload fields.
pub trait FieldsExt {
    fn str_field(&self, name: &str) -> Option<&str>;

    fn bool_field(&self, name: &str) -> Option<bool>;

    /// A record id given either as a number or a numeric string.
    fn record_id(&self, name: &str) -> Option<RecordId>;

    fn require_str(&self, name: &str) -> Result<&str, HandlerError> {
        self.str_field(name).ok_or_else(|| HandlerError::missing_field(name))
    }

    fn require_bool(&self, name: &str) -> Result<bool, HandlerError> {
        self.bool_field(name).ok_or_else(|| HandlerError::missing_field(name))
    }

    fn require_record_id(&self, name: &str) -> Result<RecordId, HandlerError> {
        self.record_id(name).ok_or_else(|| HandlerError::missing_field(name))
    }
}

impl FieldsExt for Map<String, Value> {
    fn str_field(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    fn bool_field(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => match text.as_str() {
                "true" | "on" => Some(true),
                "false" | "off" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn record_id(&self, name: &str) -> Option<RecordId> {
        match self.get(name)? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

/// Render a JSON scalar as an id string (`"a"` stays `a`, `7` becomes `7`).
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn typed_getters() {
        let f = fields(json!({"text": "a", "done": true, "flag": "on", "id": "12", "n": 3}));

        assert_eq!(f.str_field("text"), Some("a"));
        assert_eq!(f.bool_field("done"), Some(true));
        assert_eq!(f.bool_field("flag"), Some(true));
        assert_eq!(f.record_id("id"), Some(12));
        assert_eq!(f.record_id("n"), Some(3));
        assert_eq!(f.record_id("text"), None);
    }

    #[test]
    fn require_reports_the_field() {
        let f = fields(json!({}));
        let err = f.require_str("new_item").unwrap_err();
        assert!(err.message().contains("new_item"));
    }

    #[test]
    fn store_errors_convert() {
        let err = HandlerError::from(StoreError::Backend("down".into()));
        assert_eq!(err.to_string(), "store backend failure: down");
    }

    #[test]
    fn id_strings() {
        assert_eq!(id_string(&json!("a")), Some("a".to_string()));
        assert_eq!(id_string(&json!(7)), Some("7".to_string()));
        assert_eq!(id_string(&json!(null)), None);
    }
}
