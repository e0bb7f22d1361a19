//! StoryRequest - the immutable input for one orchestration

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::id::generate_story_id;

/// Title used when a payload carries none
pub const UNTITLED: &str = "Untitled";

/// Minimum word length (exclusive) for a title word to become a research keyword
const KEYWORD_MIN_LEN: usize = 5;

/// Errors from validating a story payload
#[derive(Debug, Error, PartialEq)]
pub enum StoryError {
    #[error("Story payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Story field '{field}' must be {expected}")]
    InvalidField { field: &'static str, expected: &'static str },
}

/// Name of a JSON value's type for error messages
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A work item to estimate
///
/// Holds the original payload so that fields the core does not know about
/// reach the estimation service untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StoryRequest {
    id: String,
    title: String,
    acceptance_criteria: String,
    payload: Map<String, Value>,
}

impl StoryRequest {
    /// Build a story from a JSON payload
    ///
    /// `id` may be a string or number and is generated when absent. The
    /// acceptance criteria are read from `acceptance_criteria` or `gherkin`,
    /// as a string or a list of strings.
    pub fn from_value(value: Value) -> Result<Self, StoryError> {
        debug!("StoryRequest::from_value: called");
        let mut payload = match value {
            Value::Object(map) => map,
            other => return Err(StoryError::NotAnObject(json_kind(&other))),
        };

        // Only a missing or blank id is written back; a supplied one is forwarded as given
        let id = match payload.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                let id = generate_story_id();
                payload.insert("id".to_string(), Value::String(id.clone()));
                id
            }
            Some(_) => {
                return Err(StoryError::InvalidField {
                    field: "id",
                    expected: "a string or number",
                });
            }
        };

        let title = match payload.get("title") {
            None | Some(Value::Null) => UNTITLED.to_string(),
            Some(Value::String(s)) if s.trim().is_empty() => UNTITLED.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(StoryError::InvalidField {
                    field: "title",
                    expected: "a string",
                });
            }
        };

        let criteria = payload.get("acceptance_criteria").or_else(|| payload.get("gherkin"));
        let acceptance_criteria = match criteria {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => {
                let lines: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                lines
                    .ok_or(StoryError::InvalidField {
                        field: "acceptance_criteria",
                        expected: "a string or a list of strings",
                    })?
                    .join("\n")
            }
            Some(_) => {
                return Err(StoryError::InvalidField {
                    field: "acceptance_criteria",
                    expected: "a string or a list of strings",
                });
            }
        };

        Ok(Self {
            id,
            title,
            acceptance_criteria,
            payload,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn acceptance_criteria(&self) -> &str {
        &self.acceptance_criteria
    }

    /// The payload as sent to the estimation service, with `id` filled in only when it was missing
    pub fn to_value(&self) -> Value {
        Value::Object(self.payload.clone())
    }

    /// Words of the lower-cased title longer than five characters
    pub fn research_keywords(&self) -> Vec<String> {
        self.title
            .to_lowercase()
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().count() > KEYWORD_MIN_LEN)
            .map(str::to_string)
            .collect()
    }
}
