//! Message types for the Transport actor

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::envelope::{Address, Envelope};

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Address already registered: {0}")]
    AddressInUse(Address),
}

/// Internal requests to the Transport task
#[derive(Debug)]
pub enum TransportRequest {
    /// Register a mailbox under an address
    Register {
        address: Address,
        tx: mpsc::Sender<Envelope>,
        reply_tx: oneshot::Sender<Result<(), TransportError>>,
    },

    /// Remove a mailbox
    Unregister { address: Address },

    /// Deliver an envelope to its `to` address
    Deliver(Envelope),

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<TransportMetrics>,
    },

    /// Shutdown the transport
    Shutdown,
}

/// Transport metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportMetrics {
    pub registered_addresses: usize,
    pub messages_received: u64,
    pub messages_delivered: u64,
    /// Unknown address, closed or full mailbox
    pub undeliverable: u64,
    pub oversize_rejected: u64,
}
