//! Batch input normalisation

use serde_json::Value;
use tracing::debug;

use super::BatchError;
use crate::domain::json_kind;

/// An ordered, validated list of story payloads
#[derive(Debug, Clone, PartialEq)]
pub struct BatchInput(Vec<Value>);

impl BatchInput {
    /// Accept a list of objects or a single object
    ///
    /// A single object becomes a one-element batch. Anything else, including
    /// a list with a non-object element, is rejected as a whole.
    pub fn parse(value: Value) -> Result<Self, BatchError> {
        debug!("BatchInput::parse: called");
        match value {
            Value::Array(items) => {
                if let Some((index, item)) = items.iter().enumerate().find(|(_, item)| !item.is_object()) {
                    return Err(BatchError::MalformedInput(format!(
                        "item {} must be a story object, got {}",
                        index + 1,
                        json_kind(item)
                    )));
                }
                Ok(Self(items))
            }
            Value::Object(_) => Ok(Self(vec![value])),
            other => Err(BatchError::MalformedInput(format!(
                "expected a list of stories or a single story, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Parse JSON text, then normalise as [`BatchInput::parse`]
    pub fn from_json(text: &str) -> Result<Self, BatchError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| BatchError::MalformedInput(format!("invalid JSON: {}", e)))?;
        Self::parse(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.0
    }

    pub fn into_items(self) -> Vec<Value> {
        self.0
    }
}
