//! Mailbox pump: requests to the owner, replies to their conversation

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::transport::{Envelope, Performative};

use super::CorrelationRegistry;

/// Drain an agent's mailbox
///
/// `request` envelopes start new work and are forwarded to the returned
/// receiver; every other envelope belongs to an existing conversation and
/// is routed by correlation id through `registry`. The task ends when the
/// mailbox closes or the request receiver is dropped.
pub fn spawn_router(
    mut mailbox_rx: mpsc::Receiver<Envelope>,
    registry: CorrelationRegistry,
    request_buffer: usize,
) -> mpsc::Receiver<Envelope> {
    let (request_tx, request_rx) = mpsc::channel(request_buffer.max(1));

    tokio::spawn(async move {
        debug!("router started");
        while let Some(envelope) = mailbox_rx.recv().await {
            match envelope.performative {
                Performative::Request => {
                    if request_tx.send(envelope).await.is_err() {
                        debug!("router: request receiver dropped");
                        break;
                    }
                }
                Performative::Inform | Performative::Confirm | Performative::Failure | Performative::Result => {
                    let correlation_id = envelope.correlation_id.clone();
                    let from = envelope.from.clone();
                    if !registry.route(envelope).await {
                        info!(correlation_id = %correlation_id, %from, "Dropped reply for closed or unknown conversation");
                    }
                }
            }
        }
        debug!("router stopped");
    });

    request_rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CorrelationId;
    use crate::transport::Address;
    use serde_json::json;
    use std::time::Duration;

    fn envelope(performative: Performative, id: &CorrelationId) -> Envelope {
        Envelope {
            to: Address::from("reasoner"),
            from: Address::from("planner"),
            correlation_id: id.clone(),
            performative,
            body: json!({}),
        }
    }

    #[tokio::test]
    async fn test_router_splits_requests_and_replies() {
        let registry = CorrelationRegistry::new(4);
        let mut inbox = registry.open().await;
        let (tx, rx) = mpsc::channel(8);
        let mut requests = spawn_router(rx, registry.clone(), 4);

        let fresh = CorrelationId::new();
        tx.send(envelope(Performative::Request, &fresh)).await.unwrap();
        tx.send(envelope(Performative::Inform, inbox.id())).await.unwrap();
        tx.send(envelope(Performative::Inform, &CorrelationId::new())).await.unwrap();

        let request = tokio::time::timeout(Duration::from_secs(1), requests.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(request.correlation_id, fresh);

        let reply = inbox.recv_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.performative, Performative::Inform);

        drop(tx);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(registry.metrics().await.dropped, 1);
    }
}
