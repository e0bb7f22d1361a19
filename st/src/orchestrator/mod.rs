//! Per-story orchestration
//!
//! An [`Orchestrator`] drives one story through
//! `RECEIVE -> DISPATCH -> AWAIT_RESULTS -> GENERATE_PLAN -> FINALIZE`, or to
//! `HANDLE_FAILURE`, and sends exactly one terminal reply to the submitter.
//! [`OrchestratorService`] hosts the public address and runs a fresh
//! orchestrator per incoming request.

mod context;
mod fanin;
mod service;
mod state;

pub use context::OrchestrationContext;
pub use fanin::{FanIn, await_results};
pub use service::OrchestratorService;
pub use state::{IllegalTransition, OrchestratorState};

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::config::{AddressConfig, TimeoutConfig};
use crate::domain::{FailureReason, FailureRecord, StoryOutcome, StoryRequest, UNTITLED};
use crate::registry::{CorrelationRegistry, Inbox};
use crate::services::PlanGenerator;
use crate::transport::{Address, Envelope, Outbox, Performative};

/// Where the message-based services live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddresses {
    pub estimator: Address,
    pub researcher: Address,
}

impl ServiceAddresses {
    pub fn from_config(config: &AddressConfig) -> Self {
        Self {
            estimator: Address::from(config.estimator.as_str()),
            researcher: Address::from(config.researcher.as_str()),
        }
    }
}

/// Drives a single story to a terminal state
///
/// Cheap to clone; every clone shares the outbox, registry and plan generator
/// but [`Orchestrator::run`] builds a fresh context for each story.
#[derive(Clone)]
pub struct Orchestrator {
    outbox: Outbox,
    registry: CorrelationRegistry,
    services: ServiceAddresses,
    timeouts: TimeoutConfig,
    planner: Arc<dyn PlanGenerator>,
}

impl Orchestrator {
    pub fn new(
        outbox: Outbox,
        registry: CorrelationRegistry,
        services: ServiceAddresses,
        timeouts: TimeoutConfig,
        planner: Arc<dyn PlanGenerator>,
    ) -> Self {
        Self {
            outbox,
            registry,
            services,
            timeouts,
            planner,
        }
    }

    /// Orchestrate the story in `request`
    ///
    /// `inbox` must be registered under the request's correlation id. The
    /// registry entry is closed before this returns, whatever the outcome.
    pub async fn run(&self, request: Envelope, mut inbox: Inbox) -> StoryOutcome {
        let correlation_id = request.correlation_id.clone();
        debug!(correlation_id = %correlation_id.short(), from = %request.from, "Orchestrator::run: called");

        let outcome = match StoryRequest::from_value(request.body.clone()) {
            Ok(story) => {
                let ctx = OrchestrationContext::new(story, request);
                self.drive(ctx, &mut inbox).await
            }
            Err(e) => {
                let title = request.body.get("title").and_then(Value::as_str).unwrap_or(UNTITLED);
                warn!(correlation_id = %correlation_id.short(), error = %e, "Rejected malformed story");
                let record = FailureRecord::new(FailureReason::MalformedInput, e.to_string(), title);
                self.reply(&request, Performative::Failure, record.to_value()).await;
                StoryOutcome::Failed(record)
            }
        };

        self.registry.close(&correlation_id).await;
        outcome
    }

    async fn drive(&self, mut ctx: OrchestrationContext, inbox: &mut Inbox) -> StoryOutcome {
        info!(
            correlation_id = %ctx.correlation_id().short(),
            story_id = %ctx.story().id(),
            title = %ctx.story().title(),
            "Story received"
        );

        let mut plan_body = Value::Null;
        let mut next = OrchestratorState::Dispatch;
        loop {
            if let Err(e) = ctx.transition(next) {
                error!(error = %e, "Orchestration aborted");
                ctx.abort(e);
            }

            next = match ctx.state() {
                OrchestratorState::Receive => OrchestratorState::Dispatch,
                OrchestratorState::Dispatch => {
                    self.dispatch(&ctx).await;
                    OrchestratorState::AwaitResults
                }
                OrchestratorState::AwaitResults => self.collect(&mut ctx, inbox).await,
                OrchestratorState::GeneratePlan => match self.generate_plan(&mut ctx).await {
                    Some(body) => {
                        plan_body = body;
                        OrchestratorState::Finalize
                    }
                    None => OrchestratorState::HandleFailure,
                },
                OrchestratorState::Finalize | OrchestratorState::HandleFailure => break,
            };
        }

        if ctx.state() == OrchestratorState::Finalize {
            info!(title = %ctx.story().title(), "Story planned");
            self.reply(ctx.request(), Performative::Inform, plan_body).await;
        } else {
            let body = ctx.error.as_ref().map(FailureRecord::to_value).unwrap_or_else(|| {
                FailureRecord::new(FailureReason::UpstreamFailure, "Unknown failure", ctx.story().title()).to_value()
            });
            error!(title = %ctx.story().title(), reason = %body["reason"], message = %body["message"], "Story failed");
            self.reply(ctx.request(), Performative::Failure, body).await;
        }

        ctx.into_outcome()
    }

    /// Send both service requests concurrently; delivery is fire-and-forget
    async fn dispatch(&self, ctx: &OrchestrationContext) {
        let story = ctx.story();
        let research_body = json!({
            "title": story.title(),
            "queries": story.research_keywords(),
        });

        let (estimation, research) = tokio::join!(
            self.outbox.send(
                &self.services.estimator,
                Performative::Request,
                story.to_value(),
                ctx.correlation_id()
            ),
            self.outbox.send(
                &self.services.researcher,
                Performative::Request,
                research_body,
                ctx.correlation_id()
            ),
        );

        if let Err(e) = estimation {
            warn!(error = %e, "Estimation request not sent");
        }
        if let Err(e) = research {
            warn!(error = %e, "Research request not sent");
        }
    }

    async fn collect(&self, ctx: &mut OrchestrationContext, inbox: &mut Inbox) -> OrchestratorState {
        match await_results(inbox, &self.services, self.timeouts.wait_budget()).await {
            FanIn::Ready { estimate, findings } => {
                ctx.estimate = Some(estimate);
                ctx.findings = Some(findings);
                OrchestratorState::GeneratePlan
            }
            FanIn::Failed { reason, message } => ctx.fail(reason, message),
        }
    }

    /// Serialized plan on success; on failure the error is recorded in `ctx`
    async fn generate_plan(&self, ctx: &mut OrchestrationContext) -> Option<Value> {
        let (Some(estimate), Some(findings)) = (ctx.estimate, ctx.findings.clone()) else {
            ctx.fail(FailureReason::GenerationFailure, "Plan generation started without an estimate");
            return None;
        };

        let budget = self.timeouts.plan_generation_timeout();
        let generated = tokio::time::timeout(budget, self.planner.generate(ctx.story(), &estimate, &findings)).await;

        let plan = match generated {
            Ok(Ok(plan)) => plan.anchor_to(ctx.story(), &estimate),
            Ok(Err(e)) => {
                ctx.fail(FailureReason::GenerationFailure, format!("Plan generation failed: {}", e));
                return None;
            }
            Err(_) => {
                ctx.fail(
                    FailureReason::GenerationFailure,
                    format!("Plan generation timed out after {}ms", budget.as_millis()),
                );
                return None;
            }
        };

        match serde_json::to_value(&plan) {
            Ok(body) => {
                ctx.plan = Some(plan);
                Some(body)
            }
            Err(e) => {
                ctx.fail(FailureReason::GenerationFailure, format!("Plan could not be serialized: {}", e));
                None
            }
        }
    }

    async fn reply(&self, request: &Envelope, performative: Performative, body: Value) {
        if let Err(e) = self.outbox.reply(request, performative, body).await {
            warn!(to = %request.from, error = %e, "Terminal reply not sent");
        }
    }
}
