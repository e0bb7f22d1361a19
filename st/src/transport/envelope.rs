//! Message envelope carried by the transport

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::CorrelationId;

/// Name of an agent on the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Intent of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performative {
    /// Ask the receiver to do something
    Request,
    /// Successful answer carrying data
    Inform,
    /// Acknowledgement that a request was accepted
    Confirm,
    /// The request could not be served
    Failure,
    /// Final aggregate answer (batch report)
    Result,
}

impl Performative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Inform => "inform",
            Self::Confirm => "confirm",
            Self::Failure => "failure",
            Self::Result => "result",
        }
    }
}

impl std::fmt::Display for Performative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A message between two agents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub to: Address,
    pub from: Address,
    #[serde(rename = "correlation-id")]
    pub correlation_id: CorrelationId,
    pub performative: Performative,
    pub body: Value,
}

impl Envelope {
    /// Build the reply to this envelope: addressed back to the sender, same correlation id
    pub fn reply(&self, performative: Performative, body: Value) -> Envelope {
        Envelope {
            to: self.from.clone(),
            from: self.to.clone(),
            correlation_id: self.correlation_id.clone(),
            performative,
            body,
        }
    }

    /// Serialized body size in bytes
    pub fn payload_size(&self) -> usize {
        serde_json::to_vec(&self.body).map(|v| v.len()).unwrap_or(usize::MAX)
    }
}
