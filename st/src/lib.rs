//! storytwin - story effort estimation orchestrator
//!
//! Each story is fanned out to an estimation service and a research service
//! over an in-process message transport, merged under per-service timeouts,
//! turned into a technical plan, and answered with exactly one terminal
//! reply. Batches run stories one at a time and aggregate a report.
//!
//! # Modules
//!
//! - [`transport`]: addressed envelopes between named agents
//! - [`registry`]: correlation-id partitioning of a shared mailbox
//! - [`orchestrator`]: the per-story state machine
//! - [`batch`]: sequential batch coordination and reporting
//! - [`services`]: estimator, researcher and plan generator adapters

pub mod batch;
pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod orchestrator;
pub mod prompts;
pub mod registry;
pub mod runtime;
pub mod services;
pub mod transport;

pub use batch::{BatchCoordinator, BatchError, BatchInput, BatchReport, BatchTotals};
pub use config::{Config, TimeoutConfig};
pub use domain::{
    CorrelationId, EstimateResult, FailureReason, FailureRecord, ResearchFindings, StoryOutcome, StoryRequest,
    TechnicalPlan,
};
pub use orchestrator::{Orchestrator, OrchestratorService, OrchestratorState, ServiceAddresses};
pub use registry::{CorrelationRegistry, Inbox};
pub use runtime::{Runtime, Services};
pub use transport::{Address, Envelope, Performative, Transport};
