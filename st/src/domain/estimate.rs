//! Intermediate results gathered during fan-in

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Placeholder recorded when research is missing
pub const NO_RESEARCH: &str = "no external research";

/// Numeric output of the estimation service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateResult {
    /// Effort in story points
    pub effort: f64,

    /// Duration in hours
    #[serde(rename = "time")]
    pub duration: f64,
}

impl EstimateResult {
    pub fn new(effort: f64, duration: f64) -> Self {
        Self { effort, duration }
    }

    /// Parse an `inform{effort, time}` body; both values must be finite
    pub fn from_body(body: &Value) -> Option<Self> {
        let estimate: Self = serde_json::from_value(body.clone()).ok()?;
        (estimate.effort.is_finite() && estimate.duration.is_finite()).then_some(estimate)
    }

    /// Round both values to two decimals, as replies on the wire are
    pub fn rounded(self) -> Self {
        Self {
            effort: (self.effort * 100.0).round() / 100.0,
            duration: (self.duration * 100.0).round() / 100.0,
        }
    }
}

/// Free-text research summary, or the placeholder when research is absent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResearchFindings {
    Summary(String),
    Unavailable,
}

impl ResearchFindings {
    /// Parse an `inform{summary}` body; anything empty or unexpected degrades
    pub fn from_body(body: &Value) -> Self {
        match body.get("summary").and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => Self::Summary(s.to_string()),
            _ => Self::Unavailable,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Summary(_))
    }

    /// JSON form handed to plan generation
    pub fn to_value(&self) -> Value {
        match self {
            Self::Summary(summary) => json!({ "summary": summary }),
            Self::Unavailable => json!({ "info": NO_RESEARCH }),
        }
    }
}
