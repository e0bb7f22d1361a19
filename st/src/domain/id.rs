//! Identifier generation
//!
//! Correlation ids are opaque UUIDv7 strings. Story ids use the format
//! `STORY-{6-char-hex}`, e.g. `STORY-3fa9c1`.

use serde::{Deserialize, Serialize};

/// Generate a story id for a payload that did not carry one
pub fn generate_story_id() -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    // The tail of a v7 uuid is random; the head is a millisecond timestamp
    let hex_suffix = &uuid[uuid.len() - 6..];
    format!("STORY-{}", hex_suffix)
}

/// Token tying together every message of one story's conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Mint a fresh id
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Wrap an id minted elsewhere (e.g. read off the wire)
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the full id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log lines
    pub fn short(&self) -> &str {
        let end = self.0.len().min(8);
        &self.0[..end]
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
