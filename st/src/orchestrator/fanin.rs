//! Fan-in: collect the estimation and research replies for one story

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::ServiceAddresses;
use crate::domain::{EstimateResult, FailureReason, ResearchFindings};
use crate::registry::Inbox;
use crate::transport::{Envelope, Performative};

/// Result of waiting on both services
#[derive(Debug, Clone, PartialEq)]
pub enum FanIn {
    /// Estimate present; findings may be the placeholder
    Ready {
        estimate: EstimateResult,
        findings: ResearchFindings,
    },
    Failed {
        reason: FailureReason,
        message: String,
    },
}

/// Wait up to `budget` for both replies
///
/// Returns as soon as both have arrived or the estimation service fails.
/// A missing research reply degrades to [`ResearchFindings::Unavailable`];
/// a missing estimate is an estimation timeout.
pub async fn await_results(inbox: &mut Inbox, services: &ServiceAddresses, budget: Duration) -> FanIn {
    let deadline = Instant::now() + budget;
    let mut estimate: Option<EstimateResult> = None;
    let mut findings: Option<ResearchFindings> = None;

    while estimate.is_none() || findings.is_none() {
        let Some(envelope) = inbox.recv_until(deadline).await else {
            break;
        };

        if envelope.from == services.estimator {
            if estimate.is_some() {
                debug!("await_results: duplicate estimation reply ignored");
                continue;
            }
            match read_estimate(&envelope) {
                Ok(Some(result)) => {
                    info!(effort = result.effort, time = result.duration, "Estimate received");
                    estimate = Some(result);
                }
                Ok(None) => {}
                Err(message) => {
                    return FanIn::Failed {
                        reason: FailureReason::UpstreamFailure,
                        message,
                    };
                }
            }
        } else if envelope.from == services.researcher {
            if findings.is_some() {
                debug!("await_results: duplicate research reply ignored");
                continue;
            }
            let received = match envelope.performative {
                Performative::Inform => ResearchFindings::from_body(&envelope.body),
                _ => ResearchFindings::Unavailable,
            };
            info!(available = received.is_available(), "Research findings received");
            findings = Some(received);
        } else {
            debug!(from = %envelope.from, "await_results: message from unexpected sender ignored");
        }
    }

    let Some(estimate) = estimate else {
        return FanIn::Failed {
            reason: FailureReason::EstimationTimeout,
            message: format!("Estimation service did not reply within {}ms", budget.as_millis()),
        };
    };

    let findings = findings.unwrap_or_else(|| {
        warn!(budget_ms = budget.as_millis() as u64, "No research reply in time, continuing without research");
        ResearchFindings::Unavailable
    });

    FanIn::Ready { estimate, findings }
}

/// `Ok(None)` for a reply that carries no verdict (e.g. a stray confirm)
fn read_estimate(envelope: &Envelope) -> Result<Option<EstimateResult>, String> {
    match envelope.performative {
        Performative::Inform => EstimateResult::from_body(&envelope.body)
            .map(Some)
            .ok_or_else(|| format!("Estimation service returned an invalid estimate: {}", envelope.body)),
        Performative::Failure => {
            let error = match envelope.body.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => envelope.body.to_string(),
            };
            Err(format!("Estimation service failed: {}", error))
        }
        other => {
            debug!(performative = %other, "read_estimate: ignoring");
            Ok(None)
        }
    }
}
