//! Correlation Registry
//!
//! Partitions one agent's shared mailbox into per-conversation inboxes.
//! Every live correlation id maps to exactly one [`Inbox`]; a message is
//! routed to at most one of them, and once an id is closed nothing is
//! routed to it again.

mod router;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::CorrelationId;
use crate::transport::Envelope;

pub use router::spawn_router;

/// Errors from registry operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Correlation id already open: {0}")]
    AlreadyOpen(CorrelationId),

    #[error("Correlation id was already used: {0}")]
    Retired(CorrelationId),
}

/// Registry counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryMetrics {
    pub open: usize,
    pub opened_total: u64,
    pub routed: u64,
    pub dropped: u64,
}

struct RegistryInner {
    open: HashMap<CorrelationId, mpsc::Sender<Envelope>>,
    /// Closed ids; kept so an id is never reused for the registry's lifetime
    retired: HashSet<CorrelationId>,
    metrics: RegistryMetrics,
}

/// Maps in-flight correlation ids to their conversation inbox
#[derive(Clone)]
pub struct CorrelationRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    inbox_buffer: usize,
}

impl CorrelationRegistry {
    pub fn new(inbox_buffer: usize) -> Self {
        debug!(%inbox_buffer, "CorrelationRegistry::new: called");
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                open: HashMap::new(),
                retired: HashSet::new(),
                metrics: RegistryMetrics::default(),
            })),
            inbox_buffer: inbox_buffer.max(1),
        }
    }

    /// Mint a fresh correlation id and register its inbox
    pub async fn open(&self) -> Inbox {
        let mut inner = self.inner.lock().await;
        let mut id = CorrelationId::new();
        while inner.open.contains_key(&id) || inner.retired.contains(&id) {
            id = CorrelationId::new();
        }
        debug!(correlation_id = %id, "CorrelationRegistry::open: minted");
        self.insert(&mut inner, id)
    }

    /// Register an id minted by a peer, so one id spans the whole conversation
    pub async fn adopt(&self, id: CorrelationId) -> Result<Inbox, RegistryError> {
        debug!(correlation_id = %id, "CorrelationRegistry::adopt: called");
        let mut inner = self.inner.lock().await;
        if inner.open.contains_key(&id) {
            return Err(RegistryError::AlreadyOpen(id));
        }
        if inner.retired.contains(&id) {
            return Err(RegistryError::Retired(id));
        }
        Ok(self.insert(&mut inner, id))
    }

    fn insert(&self, inner: &mut RegistryInner, id: CorrelationId) -> Inbox {
        let (tx, rx) = mpsc::channel(self.inbox_buffer);
        inner.open.insert(id.clone(), tx);
        inner.metrics.opened_total += 1;
        inner.metrics.open = inner.open.len();
        Inbox { id, rx }
    }

    /// Deliver an envelope to the inbox registered for its correlation id
    ///
    /// Returns false when no inbox is open for the id (e.g. a late reply
    /// after the conversation was closed); the envelope is dropped.
    pub async fn route(&self, envelope: Envelope) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(tx) = inner.open.get(&envelope.correlation_id) else {
            debug!(
                correlation_id = %envelope.correlation_id,
                from = %envelope.from,
                "CorrelationRegistry::route: no open conversation, dropping"
            );
            inner.metrics.dropped += 1;
            return false;
        };

        match tx.try_send(envelope) {
            Ok(()) => {
                inner.metrics.routed += 1;
                true
            }
            Err(TrySendError::Full(env)) => {
                warn!(correlation_id = %env.correlation_id, from = %env.from, "Inbox full, dropping");
                inner.metrics.dropped += 1;
                false
            }
            Err(TrySendError::Closed(env)) => {
                debug!(correlation_id = %env.correlation_id, "Inbox receiver gone, dropping");
                inner.metrics.dropped += 1;
                false
            }
        }
    }

    /// Remove a conversation; later messages for it are dropped
    pub async fn close(&self, id: &CorrelationId) {
        let mut inner = self.inner.lock().await;
        if inner.open.remove(id).is_some() {
            debug!(correlation_id = %id, "CorrelationRegistry::close: closed");
        }
        inner.retired.insert(id.clone());
        inner.metrics.open = inner.open.len();
    }

    pub async fn is_open(&self, id: &CorrelationId) -> bool {
        self.inner.lock().await.open.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.open.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn metrics(&self) -> RegistryMetrics {
        self.inner.lock().await.metrics.clone()
    }
}

/// Messages belonging to one conversation
pub struct Inbox {
    id: CorrelationId,
    rx: mpsc::Receiver<Envelope>,
}

impl Inbox {
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }

    /// Next message, or None once `deadline` passes
    pub async fn recv_until(&mut self, deadline: Instant) -> Option<Envelope> {
        tokio::time::timeout_at(deadline, self.rx.recv()).await.ok().flatten()
    }

    /// Next message, or None after `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Envelope> {
        self.recv_until(Instant::now() + timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Address, Performative};
    use proptest::prelude::*;
    use serde_json::json;

    fn envelope(id: &CorrelationId, body: serde_json::Value) -> Envelope {
        Envelope {
            to: Address::from("reasoner"),
            from: Address::from("estimator"),
            correlation_id: id.clone(),
            performative: Performative::Inform,
            body,
        }
    }

    #[tokio::test]
    async fn test_open_route_close() {
        let registry = CorrelationRegistry::new(4);
        let mut inbox = registry.open().await;
        let id = inbox.id().clone();

        assert!(registry.is_open(&id).await);
        assert!(registry.route(envelope(&id, json!({"n": 1}))).await);

        let env = inbox.recv_timeout(Duration::from_millis(100)).await.unwrap();
        assert_eq!(env.body["n"], 1);

        registry.close(&id).await;
        assert!(!registry.is_open(&id).await);
        assert!(!registry.route(envelope(&id, json!({"n": 2}))).await);
        assert!(registry.is_empty().await);

        let metrics = registry.metrics().await;
        assert_eq!(metrics.routed, 1);
        assert_eq!(metrics.dropped, 1);
    }

    #[tokio::test]
    async fn test_unknown_id_dropped() {
        let registry = CorrelationRegistry::new(4);
        let _inbox = registry.open().await;
        assert!(!registry.route(envelope(&CorrelationId::new(), json!({}))).await);
    }

    #[tokio::test]
    async fn test_adopt_rejects_open_and_retired_ids() {
        let registry = CorrelationRegistry::new(4);
        let id = CorrelationId::from_string("thread-1");

        let _inbox = registry.adopt(id.clone()).await.unwrap();
        assert_eq!(
            registry.adopt(id.clone()).await.err(),
            Some(RegistryError::AlreadyOpen(id.clone()))
        );

        registry.close(&id).await;
        assert_eq!(registry.adopt(id.clone()).await.err(), Some(RegistryError::Retired(id)));
    }

    #[tokio::test]
    async fn test_full_inbox_drops_instead_of_blocking() {
        let registry = CorrelationRegistry::new(1);
        let inbox = registry.open().await;
        let id = inbox.id().clone();

        assert!(registry.route(envelope(&id, json!({"n": 1}))).await);
        assert!(!registry.route(envelope(&id, json!({"n": 2}))).await);
    }

    #[tokio::test]
    async fn test_recv_times_out() {
        let registry = CorrelationRegistry::new(4);
        let mut inbox = registry.open().await;
        assert!(inbox.recv_timeout(Duration::from_millis(20)).await.is_none());
    }

    proptest! {
        #[test]
        fn prop_messages_never_cross_conversations(targets in proptest::collection::vec(0usize..8, 1..40)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let registry = CorrelationRegistry::new(64);
                let mut inboxes = Vec::new();
                for _ in 0..8 {
                    inboxes.push(registry.open().await);
                }

                let ids: HashSet<CorrelationId> = inboxes.iter().map(|i| i.id().clone()).collect();
                prop_assert_eq!(ids.len(), 8);

                for (seq, target) in targets.iter().enumerate() {
                    let id = inboxes[*target].id().clone();
                    let routed = registry.route(envelope(&id, json!({"seq": seq}))).await;
                    prop_assert!(routed);
                }

                for (index, inbox) in inboxes.iter_mut().enumerate() {
                    let expected: Vec<usize> = targets
                        .iter()
                        .enumerate()
                        .filter(|(_, t)| **t == index)
                        .map(|(seq, _)| seq)
                        .collect();
                    let mut received = Vec::new();
                    while let Some(env) = inbox.recv_timeout(Duration::from_millis(5)).await {
                        prop_assert_eq!(&env.correlation_id, inbox.id());
                        received.push(env.body["seq"].as_u64().unwrap() as usize);
                    }
                    prop_assert_eq!(received, expected);
                }
                Ok(())
            })?;
        }
    }
}
