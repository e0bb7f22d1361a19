//! External collaborators behind traits
//!
//! The orchestration core only sees these through the transport (estimator,
//! researcher) or through [`PlanGenerator`]. Each message-based service comes
//! with an agent that exposes it on an address.

mod error;
mod estimator;
mod plan_generator;
mod researcher;

pub use error::ServiceError;
pub use estimator::{Estimator, EstimatorAgent, HttpEstimator};
pub use plan_generator::{LlmPlanGenerator, PlanError, PlanGenerator};
pub use researcher::{
    NO_RESULTS_SUMMARY, OfflineResearcher, ResearchRequest, Researcher, ResearcherAgent, SearchResearcher, generate_queries, summarize,
};
