//! Transport for inter-agent messaging
//!
//! Addressable, asynchronous message passing between named agents. The
//! core only relies on two primitives:
//! - **send:** `(to, performative, body, correlation id)`, fire-and-forget
//! - **receive:** next message or none after a timeout
//!
//! Matching replies to conversations is the job of
//! [`crate::registry::CorrelationRegistry`], not the transport.

mod bus;
mod envelope;
mod mailbox;
mod messages;

pub use bus::Transport;
pub use envelope::{Address, Envelope, Performative};
pub use mailbox::{Mailbox, Outbox, TransportHandle};
pub use messages::{TransportError, TransportMetrics, TransportRequest};
