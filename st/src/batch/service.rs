//! Batch submission over the transport

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::{BatchCoordinator, BatchInput};
use crate::transport::{Envelope, Performative};

/// Hosts the coordinator address for batches sent by other agents
///
/// For each `request`: a malformed batch gets one `failure` reply; an
/// accepted batch gets a `confirm` reply, then a `result` reply carrying the
/// report once every story has finished.
pub struct BatchService {
    coordinator: BatchCoordinator,
    requests: mpsc::Receiver<Envelope>,
}

impl BatchService {
    pub fn new(coordinator: BatchCoordinator, requests: mpsc::Receiver<Envelope>) -> Self {
        Self { coordinator, requests }
    }

    /// Serve batches one after another until the mailbox closes
    pub async fn run(mut self) {
        let outbox = self.coordinator.outbox().clone();
        info!(address = %outbox.address(), "Batch service started");

        while let Some(request) = self.requests.recv().await {
            let input = match BatchInput::parse(request.body.clone()) {
                Ok(input) => input,
                Err(e) => {
                    warn!(from = %request.from, error = %e, "Rejected batch");
                    let body = json!({ "error": true, "message": e.to_string() });
                    if let Err(e) = outbox.reply(&request, Performative::Failure, body).await {
                        warn!(error = %e, "BatchService: reply not sent");
                    }
                    continue;
                }
            };

            let ack = json!({ "info": format!("batch of {} stories received", input.len()) });
            if let Err(e) = outbox.reply(&request, Performative::Confirm, ack).await {
                warn!(error = %e, "BatchService: confirm not sent");
            }

            let report = self.coordinator.run(input).await;
            let body = match serde_json::to_value(&report) {
                Ok(body) => body,
                Err(e) => json!({ "error": true, "message": format!("Report could not be serialized: {}", e) }),
            };
            if let Err(e) = outbox.reply(&request, Performative::Result, body).await {
                warn!(error = %e, "BatchService: result not sent");
            }
        }

        info!(address = %outbox.address(), "Batch service stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::batch::BatchReport;
    use crate::config::{TimeoutConfig, TransportConfig};
    use crate::domain::{CorrelationId, FailureReason};
    use crate::transport::{Address, Transport};

    #[tokio::test]
    async fn test_confirm_then_result() {
        let transport = Transport::spawn(TransportConfig::default());
        let planner = transport.register("planner").await.unwrap();
        let _orchestrator = transport.register("reasoner").await.unwrap();
        let mut client = transport.register("client").await.unwrap();

        let timeouts = TimeoutConfig::from_durations(
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        let (coordinator, requests) = BatchCoordinator::attach(planner, Address::from("reasoner"), timeouts, 8);
        tokio::spawn(BatchService::new(coordinator, requests).run());

        let planner = Address::from("planner");
        let id = CorrelationId::new();
        client.send(&planner, Performative::Request, json!("nope"), &id).await.unwrap();
        let rejected = client.recv_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(rejected.performative, Performative::Failure);
        assert_eq!(rejected.body["error"], true);

        let id = CorrelationId::new();
        client
            .send(&planner, Performative::Request, json!([{"title": "a"}, {"title": "b"}]), &id)
            .await
            .unwrap();

        let confirm = client.recv_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(confirm.performative, Performative::Confirm);
        assert_eq!(confirm.body["info"], "batch of 2 stories received");

        let result = client.recv_timeout(Duration::from_secs(2)).await.unwrap();
        assert_eq!(result.performative, Performative::Result);
        assert_eq!(result.correlation_id, id);
        let report: BatchReport = serde_json::from_value(result.body).unwrap();
        assert_eq!(report.len(), 2);
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.failure().map(|f| f.reason) == Some(FailureReason::BatchItemTimeout))
        );
    }
}
