//! Domain types for story estimation
//!
//! - [`StoryRequest`]: immutable input, payload passed through untouched
//! - [`EstimateResult`] / [`ResearchFindings`]: intermediate fan-in results
//! - [`TechnicalPlan`]: plan generation output
//! - [`FailureRecord`] / [`StoryOutcome`]: terminal results

mod estimate;
mod id;
mod outcome;
mod plan;
mod story;

pub use estimate::{EstimateResult, NO_RESEARCH, ResearchFindings};
pub use id::{CorrelationId, generate_story_id};
pub use outcome::{FailureReason, FailureRecord, StoryOutcome};
pub use plan::{ActionPlan, Complexity, PlanParseError, PlanTask, RisksAndDependencies, TechnicalPlan};
pub use story::{StoryError, StoryRequest, UNTITLED};

pub(crate) use story::json_kind;

#[cfg(test)]
pub(crate) use plan::fixtures;
