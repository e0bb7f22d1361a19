//! Main Transport task implementation

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::config::TransportConfig;

use super::envelope::{Address, Envelope};
use super::mailbox::TransportHandle;
use super::messages::{TransportError, TransportMetrics, TransportRequest};

/// In-process message bus between named agents
///
/// One task owns the address table; agents talk to it through a
/// [`TransportHandle`] and receive through their [`super::Mailbox`].
pub struct Transport {
    config: TransportConfig,
    tx: mpsc::Sender<TransportRequest>,
    rx: mpsc::Receiver<TransportRequest>,
}

impl Transport {
    /// Create a new Transport with the given configuration
    pub fn new(config: TransportConfig) -> Self {
        debug!(?config, "Transport::new: called");
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self { config, tx, rx }
    }

    /// Create the transport and spawn its task, returning a handle
    pub fn spawn(config: TransportConfig) -> TransportHandle {
        let transport = Self::new(config);
        let handle = transport.handle();
        tokio::spawn(transport.run());
        handle
    }

    /// Get a handle for registering agents and sending
    pub fn handle(&self) -> TransportHandle {
        TransportHandle::new(self.tx.clone(), self.config.mailbox_buffer)
    }

    /// Run the Transport task
    ///
    /// This consumes the Transport and runs until shutdown is requested or
    /// every handle is dropped.
    pub async fn run(mut self) {
        let mut registry: HashMap<Address, mpsc::Sender<Envelope>> = HashMap::new();
        let mut metrics = TransportMetrics::default();

        info!("Transport started");

        while let Some(req) = self.rx.recv().await {
            match req {
                TransportRequest::Register { address, tx, reply_tx } => {
                    let result = match registry.entry(address.clone()) {
                        // A mailbox whose receiver is gone may be replaced
                        Entry::Occupied(mut slot) if slot.get().is_closed() => {
                            debug!(%address, "Replacing closed mailbox");
                            slot.insert(tx);
                            Ok(())
                        }
                        Entry::Occupied(_) => {
                            warn!(%address, "Address already registered");
                            Err(TransportError::AddressInUse(address))
                        }
                        Entry::Vacant(slot) => {
                            debug!(%address, "Registering address");
                            slot.insert(tx);
                            Ok(())
                        }
                    };
                    metrics.registered_addresses = registry.len();
                    let _ = reply_tx.send(result);
                }

                TransportRequest::Unregister { address } => {
                    debug!(%address, "Unregistering address");
                    registry.remove(&address);
                    metrics.registered_addresses = registry.len();
                }

                TransportRequest::Deliver(envelope) => {
                    metrics.messages_received += 1;

                    if envelope.payload_size() > self.config.max_payload_size {
                        warn!(
                            to = %envelope.to,
                            from = %envelope.from,
                            max = self.config.max_payload_size,
                            "Payload too large, dropping envelope"
                        );
                        metrics.oversize_rejected += 1;
                        continue;
                    }

                    let Some(tx) = registry.get(&envelope.to) else {
                        warn!(to = %envelope.to, from = %envelope.from, "Unknown address, dropping envelope");
                        metrics.undeliverable += 1;
                        continue;
                    };

                    debug!(
                        to = %envelope.to,
                        from = %envelope.from,
                        correlation_id = %envelope.correlation_id.short(),
                        performative = %envelope.performative,
                        "Delivering envelope"
                    );

                    // Never block the bus on one slow mailbox
                    match tx.try_send(envelope) {
                        Ok(()) => metrics.messages_delivered += 1,
                        Err(TrySendError::Full(env)) => {
                            warn!(to = %env.to, "Mailbox full, dropping envelope");
                            metrics.undeliverable += 1;
                        }
                        Err(TrySendError::Closed(env)) => {
                            warn!(to = %env.to, "Mailbox closed, dropping envelope");
                            metrics.undeliverable += 1;
                        }
                    }
                }

                TransportRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(metrics.clone());
                }

                TransportRequest::Shutdown => {
                    info!("Transport shutting down");
                    break;
                }
            }
        }

        info!("Transport stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CorrelationId;
    use crate::transport::Performative;
    use serde_json::json;
    use std::time::Duration;

    fn small_config() -> TransportConfig {
        TransportConfig {
            channel_buffer: 16,
            mailbox_buffer: 4,
            inbox_buffer: 4,
            max_payload_size: 256,
        }
    }

    #[tokio::test]
    async fn test_transport_register_and_deliver() {
        let handle = Transport::spawn(small_config());

        let a = handle.register("alpha").await.unwrap();
        let mut b = handle.register("beta").await.unwrap();

        let cid = CorrelationId::new();
        a.send(&"beta".into(), Performative::Request, json!({"n": 1}), &cid)
            .await
            .unwrap();

        let env = b.recv_timeout(Duration::from_secs(1)).await.expect("delivered");
        assert_eq!(env.from, Address::from("alpha"));
        assert_eq!(env.correlation_id, cid);
        assert_eq!(env.body["n"], 1);

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.registered_addresses, 2);
        assert_eq!(metrics.messages_delivered, 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_rejects_duplicate_address() {
        let handle = Transport::spawn(small_config());

        let _first = handle.register("alpha").await.unwrap();
        let second = handle.register("alpha").await;
        assert!(matches!(second, Err(TransportError::AddressInUse(_))));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_reuses_address_after_mailbox_dropped() {
        let handle = Transport::spawn(small_config());

        let first = handle.register("alpha").await.unwrap();
        drop(first);
        assert!(handle.register("alpha").await.is_ok());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_counts_undeliverable_and_oversize() {
        let handle = Transport::spawn(small_config());
        let a = handle.register("alpha").await.unwrap();
        let mut b = handle.register("beta").await.unwrap();
        let cid = CorrelationId::new();

        a.send(&"nobody".into(), Performative::Inform, json!({}), &cid)
            .await
            .unwrap();
        a.send(&"beta".into(), Performative::Inform, json!({"blob": "x".repeat(1024)}), &cid)
            .await
            .unwrap();

        assert!(b.recv_timeout(Duration::from_millis(100)).await.is_none());

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.undeliverable, 1);
        assert_eq!(metrics.oversize_rejected, 1);
        assert_eq!(metrics.messages_delivered, 0);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_unregister() {
        let handle = Transport::spawn(small_config());
        let a = handle.register("alpha").await.unwrap();
        let _b = handle.register("beta").await.unwrap();

        handle.unregister(&"beta".into()).await.unwrap();
        a.send(&"beta".into(), Performative::Inform, json!({}), &CorrelationId::new())
            .await
            .unwrap();

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.registered_addresses, 1);
        assert_eq!(metrics.undeliverable, 1);

        handle.shutdown().await.unwrap();
    }
}
