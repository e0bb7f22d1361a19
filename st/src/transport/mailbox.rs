//! Client interface to the Transport
//!
//! - [`TransportHandle`]: cloneable; registers agents and reads metrics
//! - [`Mailbox`]: one agent's address with its receive side
//! - [`Outbox`]: cloneable send-only view of a mailbox

use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::domain::CorrelationId;

use super::envelope::{Address, Envelope, Performative};
use super::messages::{TransportError, TransportMetrics, TransportRequest};

/// Handle to the Transport task
#[derive(Clone)]
pub struct TransportHandle {
    tx: mpsc::Sender<TransportRequest>,
    mailbox_buffer: usize,
}

impl TransportHandle {
    pub(crate) fn new(tx: mpsc::Sender<TransportRequest>, mailbox_buffer: usize) -> Self {
        Self { tx, mailbox_buffer }
    }

    /// Register an agent under `address` and return its mailbox
    pub async fn register(&self, address: impl Into<Address>) -> Result<Mailbox, TransportError> {
        let address = address.into();
        debug!(%address, "TransportHandle::register: called");
        let (msg_tx, msg_rx) = mpsc::channel(self.mailbox_buffer);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(TransportRequest::Register {
                address: address.clone(),
                tx: msg_tx,
                reply_tx,
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)??;

        Ok(Mailbox {
            outbox: Outbox {
                tx: self.tx.clone(),
                address,
            },
            rx: msg_rx,
        })
    }

    /// Remove an agent's address
    pub async fn unregister(&self, address: &Address) -> Result<(), TransportError> {
        debug!(%address, "TransportHandle::unregister: called");
        self.tx
            .send(TransportRequest::Unregister {
                address: address.clone(),
            })
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Get current transport metrics
    pub async fn metrics(&self) -> Result<TransportMetrics, TransportError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(TransportRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| TransportError::ChannelClosed)?;
        reply_rx.await.map_err(|_| TransportError::ChannelClosed)
    }

    /// Request shutdown of the Transport
    pub async fn shutdown(&self) -> Result<(), TransportError> {
        self.tx
            .send(TransportRequest::Shutdown)
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// Send-only view of an agent's address
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<TransportRequest>,
    address: Address,
}

impl Outbox {
    /// This agent's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Send a message; delivery is fire-and-forget
    pub async fn send(
        &self,
        to: &Address,
        performative: Performative,
        body: Value,
        correlation_id: &CorrelationId,
    ) -> Result<(), TransportError> {
        debug!(from = %self.address, %to, %performative, "Outbox::send: called");
        self.send_envelope(Envelope {
            to: to.clone(),
            from: self.address.clone(),
            correlation_id: correlation_id.clone(),
            performative,
            body,
        })
        .await
    }

    /// Reply to a received envelope (same correlation id, back to its sender)
    pub async fn reply(&self, original: &Envelope, performative: Performative, body: Value) -> Result<(), TransportError> {
        let mut envelope = original.reply(performative, body);
        envelope.from = self.address.clone();
        self.send_envelope(envelope).await
    }

    /// Send a fully built envelope
    pub async fn send_envelope(&self, envelope: Envelope) -> Result<(), TransportError> {
        self.tx
            .send(TransportRequest::Deliver(envelope))
            .await
            .map_err(|_| TransportError::ChannelClosed)
    }
}

/// One agent's address and its incoming messages
pub struct Mailbox {
    outbox: Outbox,
    rx: mpsc::Receiver<Envelope>,
}

impl Mailbox {
    /// This agent's address
    pub fn address(&self) -> &Address {
        self.outbox.address()
    }

    /// A cloneable sender for this address
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Split into the send side and the raw receive side
    pub fn split(self) -> (Outbox, mpsc::Receiver<Envelope>) {
        (self.outbox, self.rx)
    }

    pub async fn send(
        &self,
        to: &Address,
        performative: Performative,
        body: Value,
        correlation_id: &CorrelationId,
    ) -> Result<(), TransportError> {
        self.outbox.send(to, performative, body, correlation_id).await
    }

    pub async fn reply(&self, original: &Envelope, performative: Performative, body: Value) -> Result<(), TransportError> {
        self.outbox.reply(original, performative, body).await
    }

    /// Wait for the next message
    ///
    /// Returns None once the transport has dropped this mailbox.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Wait for the next message, giving up after `timeout`
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Envelope> {
        debug!(address = %self.outbox.address, ?timeout, "Mailbox::recv_timeout: called");
        tokio::time::timeout(timeout, self.rx.recv()).await.ok().flatten()
    }
}
