//! BatchCoordinator - drives stories through the orchestrator one at a time

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{BatchError, BatchInput, BatchReport};
use crate::config::TimeoutConfig;
use crate::domain::{FailureReason, FailureRecord, StoryOutcome, TechnicalPlan, UNTITLED};
use crate::registry::{CorrelationRegistry, spawn_router};
use crate::transport::{Address, Envelope, Mailbox, Outbox, Performative};

/// Submits stories to the orchestrator address and collects their outcomes
#[derive(Clone)]
pub struct BatchCoordinator {
    outbox: Outbox,
    registry: CorrelationRegistry,
    orchestrator: Address,
    timeouts: TimeoutConfig,
}

impl BatchCoordinator {
    /// Coordinator over an already-routed outbox
    ///
    /// Replies to `outbox`'s address must reach `registry`, e.g. through
    /// [`spawn_router`].
    pub fn new(outbox: Outbox, registry: CorrelationRegistry, orchestrator: Address, timeouts: TimeoutConfig) -> Self {
        Self {
            outbox,
            registry,
            orchestrator,
            timeouts,
        }
    }

    /// Take over `mailbox` and route its replies
    ///
    /// Returns the coordinator and the receiver for `request` envelopes that
    /// arrive at the mailbox (batches submitted by other agents).
    pub fn attach(
        mailbox: Mailbox,
        orchestrator: Address,
        timeouts: TimeoutConfig,
        inbox_buffer: usize,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        let registry = CorrelationRegistry::new(inbox_buffer);
        let (outbox, rx) = mailbox.split();
        let requests = spawn_router(rx, registry.clone(), inbox_buffer);
        (Self::new(outbox, registry, orchestrator, timeouts), requests)
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Validate a raw batch, then run it
    ///
    /// Malformed input is rejected before any story is sent.
    pub async fn run_batch(&self, input: Value) -> Result<BatchReport, BatchError> {
        let input = BatchInput::parse(input)?;
        Ok(self.run(input).await)
    }

    /// Run every story in order; one outcome per story
    pub async fn run(&self, input: BatchInput) -> BatchReport {
        let total = input.len();
        info!(stories = total, orchestrator = %self.orchestrator, "Batch started");

        let mut outcomes = Vec::with_capacity(total);
        for (index, story) in input.into_items().into_iter().enumerate() {
            let outcome = self.run_item(index + 1, total, story).await;
            outcomes.push(outcome);
        }

        let report = BatchReport::new(outcomes);
        info!(
            succeeded = report.totals.succeeded,
            failed = report.totals.failed,
            effort = report.totals.effort,
            time = report.totals.time,
            "Batch finished"
        );
        report
    }

    async fn run_item(&self, position: usize, total: usize, story: Value) -> StoryOutcome {
        let title = story.get("title").and_then(Value::as_str).unwrap_or(UNTITLED).to_string();
        let mut inbox = self.registry.open().await;
        let correlation_id = inbox.id().clone();
        info!(position, total, %title, correlation_id = %correlation_id.short(), "Submitting story");

        let outcome = match self
            .outbox
            .send(&self.orchestrator, Performative::Request, story, &correlation_id)
            .await
        {
            Ok(()) => {
                let deadline = Instant::now() + self.timeouts.batch_item_timeout();
                loop {
                    match inbox.recv_until(deadline).await {
                        Some(reply) => {
                            if let Some(outcome) = read_reply(&reply, &title) {
                                break outcome;
                            }
                        }
                        None => {
                            warn!(position, %title, "No reply from orchestrator within the batch item budget");
                            break StoryOutcome::Failed(FailureRecord::new(
                                FailureReason::BatchItemTimeout,
                                format!(
                                    "Timed out waiting for orchestrator after {}ms",
                                    self.timeouts.batch_item_timeout().as_millis()
                                ),
                                title.as_str(),
                            ));
                        }
                    }
                }
            }
            Err(e) => StoryOutcome::Failed(FailureRecord::new(
                FailureReason::UpstreamFailure,
                format!("Could not reach orchestrator: {}", e),
                title.as_str(),
            )),
        };

        self.registry.close(&correlation_id).await;
        info!(position, %title, success = outcome.is_success(), "Story finished");
        outcome
    }
}

/// Terminal outcome carried by `reply`, or None if it is not terminal
fn read_reply(reply: &Envelope, title: &str) -> Option<StoryOutcome> {
    match reply.performative {
        Performative::Inform => Some(match TechnicalPlan::from_value(reply.body.clone()) {
            Ok(plan) => StoryOutcome::Planned(plan),
            Err(e) => StoryOutcome::Failed(FailureRecord::new(
                FailureReason::MalformedInput,
                format!("Unreadable plan from orchestrator: {}", e),
                title,
            )),
        }),
        Performative::Failure => Some(StoryOutcome::Failed(FailureRecord::from_body(&reply.body).unwrap_or_else(
            || FailureRecord::new(FailureReason::UpstreamFailure, reply.body.to_string(), title),
        ))),
        other => {
            debug!(performative = %other, "read_reply: not terminal");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::config::TransportConfig;
    use crate::domain::fixtures;
    use crate::transport::{Transport, TransportHandle};

    fn timeouts() -> TimeoutConfig {
        TimeoutConfig::from_durations(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(150),
        )
    }

    async fn setup() -> (TransportHandle, BatchCoordinator, Mailbox) {
        let transport = Transport::spawn(TransportConfig::default());
        let planner = transport.register("planner").await.unwrap();
        let orchestrator = transport.register("reasoner").await.unwrap();
        let (coordinator, _requests) = BatchCoordinator::attach(planner, Address::from("reasoner"), timeouts(), 8);
        (transport, coordinator, orchestrator)
    }

    #[tokio::test]
    async fn test_malformed_batch_sends_nothing() {
        let (_transport, coordinator, mut orchestrator) = setup().await;

        let err = coordinator.run_batch(json!(42)).await.unwrap_err();
        assert!(matches!(err, BatchError::MalformedInput(_)));
        assert!(orchestrator.recv_timeout(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test]
    async fn test_replies_map_to_outcomes_in_order() {
        let (_transport, coordinator, mut orchestrator) = setup().await;

        // Fake orchestrator: plan the first, fail the second, garble the third
        tokio::spawn(async move {
            let mut n = 0;
            while let Some(request) = orchestrator.recv().await {
                n += 1;
                let title = request.body["title"].as_str().unwrap().to_string();
                let (performative, body) = match n {
                    1 => (Performative::Inform, serde_json::from_str::<Value>(&fixtures::plan_json(&title)).unwrap()),
                    2 => (
                        Performative::Failure,
                        FailureRecord::new(FailureReason::EstimationTimeout, "slow", title).to_value(),
                    ),
                    _ => (Performative::Inform, json!({"oops": true})),
                };
                orchestrator.reply(&request, Performative::Confirm, json!({})).await.unwrap();
                orchestrator.reply(&request, performative, body).await.unwrap();
            }
        });

        let report = coordinator
            .run_batch(json!([{"title": "one"}, {"title": "two"}, {"title": "three"}]))
            .await
            .unwrap();

        assert_eq!(report.len(), 3);
        assert_eq!(report.outcomes[0].plan().unwrap().story_title, "one");
        assert_eq!(report.outcomes[1].failure().unwrap().reason, FailureReason::EstimationTimeout);
        assert_eq!(report.outcomes[2].failure().unwrap().reason, FailureReason::MalformedInput);
        assert_eq!(report.totals.succeeded, 1);
        assert!(coordinator.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_silent_orchestrator_yields_batch_item_timeout() {
        let (_transport, coordinator, _orchestrator) = setup().await;

        let report = coordinator.run_batch(json!({"title": "stalled"})).await.unwrap();

        let record = report.outcomes[0].failure().unwrap();
        assert_eq!(record.reason, FailureReason::BatchItemTimeout);
        assert_eq!(record.story_title, "stalled");
        assert_eq!((report.totals.succeeded, report.totals.failed), (0, 1));
        assert_eq!(report.totals.effort, 0.0);
    }
}
