//! Terminal outcomes of one story

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::TechnicalPlan;

/// Why a story terminated in failure
///
/// A research timeout is deliberately absent: it degrades to placeholder
/// findings and never ends a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Payload unparsable or wrongly shaped
    MalformedInput,
    /// Estimation service replied with a failure
    UpstreamFailure,
    /// No estimate within the fan-in window
    EstimationTimeout,
    /// Plan generation errored, timed out, or returned an unusable structure
    GenerationFailure,
    /// No terminal reply at all within the batch-level budget
    BatchItemTimeout,
}

impl FailureReason {
    /// Peers that do not tag their failures are treated as upstream failures
    fn untagged() -> Self {
        Self::UpstreamFailure
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::UpstreamFailure => "upstream_failure",
            Self::EstimationTimeout => "estimation_timeout",
            Self::GenerationFailure => "generation_failure",
            Self::BatchItemTimeout => "batch_item_timeout",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure body delivered to the submitter: `{error: true, message, story_title, reason}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub error: bool,
    pub message: String,
    pub story_title: String,
    #[serde(default = "FailureReason::untagged")]
    pub reason: FailureReason,
}

impl FailureRecord {
    pub fn new(reason: FailureReason, message: impl Into<String>, story_title: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            story_title: story_title.into(),
            reason,
        }
    }

    /// Parse a `failure` body
    pub fn from_body(body: &Value) -> Option<Self> {
        serde_json::from_value(body.clone()).ok()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// One entry of a batch report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoryOutcome {
    Failed(FailureRecord),
    Planned(TechnicalPlan),
}

impl StoryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Planned(_))
    }

    pub fn story_title(&self) -> &str {
        match self {
            Self::Planned(plan) => &plan.story_title,
            Self::Failed(record) => &record.story_title,
        }
    }

    pub fn plan(&self) -> Option<&TechnicalPlan> {
        match self {
            Self::Planned(plan) => Some(plan),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            Self::Planned(_) => None,
            Self::Failed(record) => Some(record),
        }
    }
}
