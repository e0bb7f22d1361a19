//! TechnicalPlan - structured output of plan generation

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::estimate::EstimateResult;
use super::story::StoryRequest;

/// Why a generated plan could not be accepted
#[derive(Debug, Error, PartialEq)]
pub enum PlanParseError {
    #[error("plan is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("plan does not match the expected structure: {0}")]
    Structure(String),

    #[error("plan list is empty")]
    Empty,
}

/// Overall complexity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// One task in the action plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTask {
    pub task_name: String,
    pub estimated_hours: f64,
    #[serde(default)]
    pub details: String,
}

/// Work breakdown within the accepted budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub description: String,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
}

impl ActionPlan {
    pub fn total_hours(&self) -> f64 {
        self.tasks.iter().map(|t| t.estimated_hours).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RisksAndDependencies {
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// Technical plan for one story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalPlan {
    #[serde(default)]
    pub story_id: String,
    #[serde(default)]
    pub story_title: String,
    #[serde(default = "default_true")]
    pub ml_estimate_accepted: bool,
    pub effort: f64,
    pub time: f64,
    pub overall_complexity: Complexity,
    pub action_plan: ActionPlan,
    #[serde(default)]
    pub key_considerations: Vec<String>,
    #[serde(default)]
    pub risks_and_dependencies: RisksAndDependencies,
}

fn default_true() -> bool {
    true
}

impl TechnicalPlan {
    /// Parse model output into a plan
    ///
    /// Accepts a bare object or a list whose first element is the plan, with
    /// or without a surrounding markdown code fence.
    pub fn parse(text: &str) -> Result<Self, PlanParseError> {
        debug!(text_len = text.len(), "TechnicalPlan::parse: called");
        let json = strip_code_fence(text);
        let value: Value = serde_json::from_str(json).map_err(|e| PlanParseError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a plan from an already-decoded JSON value
    pub fn from_value(value: Value) -> Result<Self, PlanParseError> {
        let value = match value {
            Value::Array(mut items) => {
                if items.is_empty() {
                    return Err(PlanParseError::Empty);
                }
                items.swap_remove(0)
            }
            other => other,
        };
        serde_json::from_value(value).map_err(|e| PlanParseError::Structure(e.to_string()))
    }

    /// Tie the plan to the story it was generated for
    ///
    /// The estimate is the fixed budget, so the plan reports it verbatim.
    pub fn anchor_to(mut self, story: &StoryRequest, estimate: &EstimateResult) -> Self {
        self.story_id = story.id().to_string();
        self.story_title = story.title().to_string();
        self.effort = estimate.effort;
        self.time = estimate.duration;
        self.ml_estimate_accepted = true;
        self
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line (```json)
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_list_form() {
        let plan = TechnicalPlan::parse(&fixtures::plan_json("Add export to PDF")).unwrap();
        assert_eq!(plan.story_title, "Add export to PDF");
        assert_eq!(plan.overall_complexity, Complexity::Medium);
        assert_eq!(plan.action_plan.tasks.len(), 2);
        assert_eq!(plan.action_plan.total_hours(), 5.5);
    }

    #[test]
    fn test_parse_fenced_object() {
        let inner = json!({
            "effort": 3,
            "time": 5,
            "overall_complexity": "Low",
            "action_plan": {"description": "small"}
        });
        let text = format!("```json\n{}\n```", inner);
        let plan = TechnicalPlan::parse(&text).unwrap();
        assert_eq!(plan.overall_complexity, Complexity::Low);
        assert!(plan.action_plan.tasks.is_empty());
        assert!(plan.ml_estimate_accepted);
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = TechnicalPlan::parse("Sure! Here is your plan: ...").unwrap_err();
        assert!(matches!(err, PlanParseError::InvalidJson(_)));
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let err = TechnicalPlan::parse(r#"{"effort": 1, "time": 2, "overall_complexity": "Huge"}"#).unwrap_err();
        assert!(matches!(err, PlanParseError::Structure(_)));

        assert_eq!(TechnicalPlan::parse("[]").unwrap_err(), PlanParseError::Empty);
    }

    #[test]
    fn test_anchor_to_story_and_estimate() {
        let story = StoryRequest::from_value(json!({"id": "S-1", "title": "Add export to PDF"})).unwrap();
        let plan = fixtures::plan("something else").anchor_to(&story, &EstimateResult::new(5.0, 8.0));

        assert_eq!(plan.story_id, "S-1");
        assert_eq!(plan.story_title, "Add export to PDF");
        assert_eq!(plan.effort, 5.0);
        assert_eq!(plan.time, 8.0);
    }
}
