//! StoryTwin configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Main StoryTwin configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Per-service and per-item wait budgets
    pub timeouts: TimeoutConfig,

    /// Agent addresses on the transport
    pub addresses: AddressConfig,

    /// Transport channel sizing
    pub transport: TransportConfig,

    /// LLM provider configuration (plan generation)
    pub llm: LlmConfig,

    /// Estimation service endpoint
    pub estimator: EstimatorConfig,

    /// Research service configuration
    pub research: ResearchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate()?;

        let addrs = [
            &self.addresses.orchestrator,
            &self.addresses.estimator,
            &self.addresses.researcher,
            &self.addresses.coordinator,
        ];
        for (i, a) in addrs.iter().enumerate() {
            if a.trim().is_empty() {
                return Err(eyre::eyre!("Agent addresses must not be empty"));
            }
            if addrs[i + 1..].contains(a) {
                return Err(eyre::eyre!("Agent address '{}' is used more than once", a));
            }
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .storytwin.yml
        let local_config = PathBuf::from(".storytwin.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/storytwin/storytwin.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("storytwin").join("storytwin.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Wait budgets for one story's conversation
///
/// Injected into the Orchestrator and the BatchCoordinator at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long the estimation service may take to reply
    #[serde(rename = "estimation-timeout-ms")]
    pub estimation_timeout_ms: u64,

    /// How long the research service may take to reply
    #[serde(rename = "research-timeout-ms")]
    pub research_timeout_ms: u64,

    /// How long plan generation may take
    #[serde(rename = "plan-generation-timeout-ms")]
    pub plan_generation_timeout_ms: u64,

    /// How long the batch coordinator waits for one story's terminal reply
    #[serde(rename = "batch-item-timeout-ms")]
    pub batch_item_timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            estimation_timeout_ms: 80_000,
            research_timeout_ms: 1_000_000,
            plan_generation_timeout_ms: 120_000,
            batch_item_timeout_ms: 1_200_000,
        }
    }
}

impl TimeoutConfig {
    /// Build a config from explicit durations (mostly for tests and embedding)
    pub fn from_durations(estimation: Duration, research: Duration, plan_generation: Duration, batch_item: Duration) -> Self {
        Self {
            estimation_timeout_ms: estimation.as_millis() as u64,
            research_timeout_ms: research.as_millis() as u64,
            plan_generation_timeout_ms: plan_generation.as_millis() as u64,
            batch_item_timeout_ms: batch_item.as_millis() as u64,
        }
    }

    pub fn estimation_timeout(&self) -> Duration {
        Duration::from_millis(self.estimation_timeout_ms)
    }

    pub fn research_timeout(&self) -> Duration {
        Duration::from_millis(self.research_timeout_ms)
    }

    pub fn plan_generation_timeout(&self) -> Duration {
        Duration::from_millis(self.plan_generation_timeout_ms)
    }

    pub fn batch_item_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_item_timeout_ms)
    }

    /// Fan-in window: either reply may legitimately arrive late relative to the other
    pub fn wait_budget(&self) -> Duration {
        let budget = self.estimation_timeout().max(self.research_timeout());
        debug!(?budget, "TimeoutConfig::wait_budget: called");
        budget
    }

    /// Upper bound for one story to reach a terminal state inside the Orchestrator
    pub fn story_budget(&self) -> Duration {
        self.wait_budget() + self.plan_generation_timeout()
    }

    /// Reject budgets that cannot work together
    pub fn validate(&self) -> Result<()> {
        if self.estimation_timeout_ms == 0
            || self.research_timeout_ms == 0
            || self.plan_generation_timeout_ms == 0
            || self.batch_item_timeout_ms == 0
        {
            return Err(eyre::eyre!("Timeouts must be greater than zero"));
        }
        if self.batch_item_timeout() < self.story_budget() {
            return Err(eyre::eyre!(
                "batch-item-timeout-ms ({}) must be at least max(estimation, research) + plan-generation ({} ms)",
                self.batch_item_timeout_ms,
                self.story_budget().as_millis()
            ));
        }
        Ok(())
    }
}

/// Agent addresses on the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressConfig {
    /// Public address of the orchestrator host
    pub orchestrator: String,

    /// Estimation service address
    pub estimator: String,

    /// Research service address
    pub researcher: String,

    /// Batch coordinator address
    pub coordinator: String,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self {
            orchestrator: "reasoner".to_string(),
            estimator: "estimator".to_string(),
            researcher: "researcher".to_string(),
            coordinator: "planner".to_string(),
        }
    }
}

/// Transport channel sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Channel buffer size for transport requests
    #[serde(rename = "channel-buffer")]
    pub channel_buffer: usize,

    /// Channel buffer size for each agent mailbox
    #[serde(rename = "mailbox-buffer")]
    pub mailbox_buffer: usize,

    /// Channel buffer size for each correlation inbox
    #[serde(rename = "inbox-buffer")]
    pub inbox_buffer: usize,

    /// Max payload size in bytes (1MB default)
    #[serde(rename = "max-payload-size")]
    pub max_payload_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1000,
            mailbox_buffer: 100,
            inbox_buffer: 8,
            max_payload_size: 1024 * 1024,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "anthropic" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 120_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn get_api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .map_err(|_| eyre::eyre!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }
}

/// Estimation service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Model-serving endpoint that accepts a story and returns `{effort, time}`
    pub url: String,

    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000/predict".to_string(),
            timeout_ms: 60_000,
        }
    }
}

/// Research service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Search API endpoint
    pub endpoint: String,

    /// Environment variable containing the search API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Environment variable containing the search engine id
    #[serde(rename = "cx-env")]
    pub cx_env: String,

    /// Technologies appended to generated queries
    #[serde(rename = "tech-stack")]
    pub tech_stack: Vec<String>,

    /// Results fetched per query
    #[serde(rename = "max-results-per-query")]
    pub max_results_per_query: u32,

    /// Sentences kept in the summary
    #[serde(rename = "max-sentences")]
    pub max_sentences: usize,

    /// HTTP timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
            api_key_env: "GOOGLE_API_KEY".to_string(),
            cx_env: "GOOGLE_CX".to_string(),
            tech_stack: Vec::new(),
            max_results_per_query: 3,
            max_sentences: 4,
            timeout_ms: 15_000,
        }
    }
}
