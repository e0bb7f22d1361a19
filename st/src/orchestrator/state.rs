//! Orchestrator states and the legal transitions between them

use thiserror::Error;

/// Where a story is in its orchestration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrchestratorState {
    Receive,
    Dispatch,
    AwaitResults,
    GeneratePlan,
    Finalize,
    HandleFailure,
}

use OrchestratorState::*;

/// Every legal (from, to) pair
const TRANSITIONS: &[(OrchestratorState, OrchestratorState)] = &[
    (Receive, Dispatch),
    (Dispatch, AwaitResults),
    (AwaitResults, GeneratePlan),
    (AwaitResults, HandleFailure),
    (GeneratePlan, Finalize),
    (GeneratePlan, HandleFailure),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal orchestrator transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: OrchestratorState,
    pub to: OrchestratorState,
}

impl OrchestratorState {
    pub fn can_transition_to(self, next: OrchestratorState) -> bool {
        TRANSITIONS.contains(&(self, next))
    }

    /// Terminal states deliver the result and end the instance
    pub fn is_terminal(self) -> bool {
        matches!(self, Finalize | HandleFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Receive => "RECEIVE",
            Dispatch => "DISPATCH",
            AwaitResults => "AWAIT_RESULTS",
            GeneratePlan => "GENERATE_PLAN",
            Finalize => "FINALIZE",
            HandleFailure => "HANDLE_FAILURE",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrchestratorState; 6] = [Receive, Dispatch, AwaitResults, GeneratePlan, Finalize, HandleFailure];

    #[test]
    fn test_success_path_is_legal() {
        let path = [Receive, Dispatch, AwaitResults, GeneratePlan, Finalize];
        assert!(path.windows(2).all(|w| w[0].can_transition_to(w[1])));
    }

    #[test]
    fn test_failure_only_from_await_and_generate() {
        let sources: Vec<_> = ALL.iter().filter(|s| s.can_transition_to(HandleFailure)).collect();
        assert_eq!(sources, vec![&AwaitResults, &GeneratePlan]);
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for state in ALL.iter().filter(|s| s.is_terminal()) {
            assert!(ALL.iter().all(|next| !state.can_transition_to(*next)));
        }
        assert!(!Receive.can_transition_to(GeneratePlan));
    }
}
