//! Per-story orchestration context

use tracing::debug;

use super::state::{IllegalTransition, OrchestratorState};
use crate::domain::{
    CorrelationId, EstimateResult, FailureReason, FailureRecord, ResearchFindings, StoryOutcome, StoryRequest,
    TechnicalPlan,
};
use crate::transport::{Address, Envelope};

/// Mutable state owned by exactly one orchestrator for one story
///
/// Created once the payload is accepted and consumed when the story reaches
/// a terminal state.
#[derive(Debug)]
pub struct OrchestrationContext {
    story: StoryRequest,
    request: Envelope,
    state: OrchestratorState,
    pub estimate: Option<EstimateResult>,
    pub findings: Option<ResearchFindings>,
    pub plan: Option<TechnicalPlan>,
    pub error: Option<FailureRecord>,
}

impl OrchestrationContext {
    pub fn new(story: StoryRequest, request: Envelope) -> Self {
        Self {
            story,
            request,
            state: OrchestratorState::Receive,
            estimate: None,
            findings: None,
            plan: None,
            error: None,
        }
    }

    pub fn story(&self) -> &StoryRequest {
        &self.story
    }

    /// The submitter's original request, replied to on completion
    pub fn request(&self) -> &Envelope {
        &self.request
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.request.correlation_id
    }

    pub fn submitter(&self) -> &Address {
        &self.request.from
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Move to `next` if the transition table allows it
    pub fn transition(&mut self, next: OrchestratorState) -> Result<(), IllegalTransition> {
        if !self.state.can_transition_to(next) {
            return Err(IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(correlation_id = %self.correlation_id().short(), from = %self.state, to = %next, "transition");
        self.state = next;
        Ok(())
    }

    /// Record a failure; the caller moves to HANDLE_FAILURE
    pub fn fail(&mut self, reason: FailureReason, message: impl Into<String>) -> OrchestratorState {
        self.error = Some(FailureRecord::new(reason, message, self.story.title()));
        OrchestratorState::HandleFailure
    }

    /// Jump straight to HANDLE_FAILURE after a transition bug
    pub fn abort(&mut self, err: IllegalTransition) {
        self.error = Some(FailureRecord::new(
            FailureReason::UpstreamFailure,
            format!("Internal orchestration error: {}", err),
            self.story.title(),
        ));
        self.state = OrchestratorState::HandleFailure;
    }

    /// Terminal outcome; a plan only counts once FINALIZE was reached
    pub fn into_outcome(self) -> StoryOutcome {
        match (self.state, self.plan, self.error) {
            (OrchestratorState::Finalize, Some(plan), _) => StoryOutcome::Planned(plan),
            (_, _, Some(record)) => StoryOutcome::Failed(record),
            (state, _, None) => StoryOutcome::Failed(FailureRecord::new(
                FailureReason::UpstreamFailure,
                format!("Orchestration ended in {} without a result", state),
                self.story.title(),
            )),
        }
    }
}
