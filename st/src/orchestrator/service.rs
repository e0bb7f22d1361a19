//! Orchestrator host: one public address, one orchestrator per story

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::domain::{FailureReason, FailureRecord, UNTITLED};
use crate::registry::{CorrelationRegistry, spawn_router};
use crate::transport::{Envelope, Mailbox, Outbox, Performative};

/// Accepts story requests and runs each in its own task
pub struct OrchestratorService {
    orchestrator: Orchestrator,
    outbox: Outbox,
    registry: CorrelationRegistry,
    requests: mpsc::Receiver<Envelope>,
}

impl OrchestratorService {
    /// Take over `mailbox`: requests come here, replies are routed through `registry`
    ///
    /// `build` receives this address's outbox and returns the orchestrator
    /// template cloned for every story.
    pub fn new(
        mailbox: Mailbox,
        registry: CorrelationRegistry,
        request_buffer: usize,
        build: impl FnOnce(Outbox) -> Orchestrator,
    ) -> Self {
        let (outbox, rx) = mailbox.split();
        let requests = spawn_router(rx, registry.clone(), request_buffer);
        let orchestrator = build(outbox.clone());
        Self {
            orchestrator,
            outbox,
            registry,
            requests,
        }
    }

    /// Serve until the mailbox closes
    pub async fn run(mut self) {
        info!(address = %self.outbox.address(), "Orchestrator service started");

        while let Some(request) = self.requests.recv().await {
            let correlation_id = request.correlation_id.clone();
            debug!(correlation_id = %correlation_id.short(), from = %request.from, "OrchestratorService: request");

            match self.registry.adopt(correlation_id).await {
                Ok(inbox) => {
                    let orchestrator = self.orchestrator.clone();
                    tokio::spawn(async move {
                        orchestrator.run(request, inbox).await;
                    });
                }
                Err(e) => {
                    warn!(error = %e, "Refusing request with reused correlation id");
                    let title = request.body.get("title").and_then(Value::as_str).unwrap_or(UNTITLED);
                    let record = FailureRecord::new(FailureReason::MalformedInput, e.to_string(), title);
                    if let Err(e) = self.outbox.reply(&request, Performative::Failure, record.to_value()).await {
                        warn!(error = %e, "OrchestratorService: reply not sent");
                    }
                }
            }
        }

        info!(address = %self.outbox.address(), "Orchestrator service stopped");
    }
}
