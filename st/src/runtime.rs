//! In-process wiring of every agent
//!
//! Boots the transport, the estimator and researcher agents, the orchestrator
//! host and the batch coordinator, each at its configured address.

use std::sync::Arc;

use eyre::{Context, Result};
use tracing::{info, warn};

use crate::batch::{BatchCoordinator, BatchService};
use crate::config::Config;
use crate::llm::create_client;
use crate::orchestrator::{Orchestrator, OrchestratorService, ServiceAddresses};
use crate::prompts::PromptLoader;
use crate::registry::CorrelationRegistry;
use crate::services::{
    Estimator, EstimatorAgent, HttpEstimator, LlmPlanGenerator, OfflineResearcher, PlanGenerator, Researcher,
    ResearcherAgent, SearchResearcher,
};
use crate::transport::{Address, Transport, TransportError, TransportHandle, TransportMetrics};

/// The three external collaborators
#[derive(Clone)]
pub struct Services {
    pub estimator: Arc<dyn Estimator>,
    pub researcher: Arc<dyn Researcher>,
    pub planner: Arc<dyn PlanGenerator>,
}

impl Services {
    /// Real adapters from config
    ///
    /// Research falls back to [`OfflineResearcher`] when search credentials
    /// are missing; estimation and plan generation are required.
    pub fn from_config(config: &Config) -> Result<Self> {
        let estimator = HttpEstimator::from_config(&config.estimator).context("Failed to create estimator client")?;

        let researcher: Arc<dyn Researcher> = match SearchResearcher::from_config(&config.research) {
            Ok(researcher) => Arc::new(researcher),
            Err(e) => {
                warn!(error = %e, "Web research disabled");
                Arc::new(OfflineResearcher)
            }
        };

        let llm = create_client(&config.llm).context("Failed to create LLM client")?;
        let root = std::env::current_dir().context("Failed to read current directory")?;
        let planner = LlmPlanGenerator::new(llm, PromptLoader::new(root), config.llm.max_tokens);

        Ok(Self {
            estimator: Arc::new(estimator),
            researcher,
            planner: Arc::new(planner),
        })
    }
}

/// A running set of agents on one in-process transport
pub struct Runtime {
    transport: TransportHandle,
    coordinator: BatchCoordinator,
}

impl Runtime {
    pub async fn start(config: &Config, services: Services) -> Result<Self, TransportError> {
        let addresses = &config.addresses;
        let transport = Transport::spawn(config.transport.clone());

        let estimator = transport.register(addresses.estimator.as_str()).await?;
        tokio::spawn(EstimatorAgent::new(services.estimator, estimator).run());

        let researcher = transport.register(addresses.researcher.as_str()).await?;
        tokio::spawn(ResearcherAgent::new(services.researcher, researcher).run());

        let orchestrator_mailbox = transport.register(addresses.orchestrator.as_str()).await?;
        let registry = CorrelationRegistry::new(config.transport.inbox_buffer);
        let service_addresses = ServiceAddresses::from_config(addresses);
        let timeouts = config.timeouts.clone();
        let planner = services.planner;
        let orchestrator = OrchestratorService::new(
            orchestrator_mailbox,
            registry.clone(),
            config.transport.mailbox_buffer,
            |outbox| Orchestrator::new(outbox, registry, service_addresses, timeouts, planner),
        );
        tokio::spawn(orchestrator.run());

        let coordinator_mailbox = transport.register(addresses.coordinator.as_str()).await?;
        let (coordinator, requests) = BatchCoordinator::attach(
            coordinator_mailbox,
            Address::from(addresses.orchestrator.as_str()),
            config.timeouts.clone(),
            config.transport.inbox_buffer,
        );
        tokio::spawn(BatchService::new(coordinator.clone(), requests).run());

        info!(
            orchestrator = %addresses.orchestrator,
            coordinator = %addresses.coordinator,
            "Runtime started"
        );
        Ok(Self { transport, coordinator })
    }

    /// Coordinator for submitting batches directly
    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    pub fn transport(&self) -> &TransportHandle {
        &self.transport
    }

    pub async fn metrics(&self) -> Result<TransportMetrics, TransportError> {
        self.transport.metrics().await
    }

    /// Stop the transport; every agent loop ends as its mailbox closes
    pub async fn shutdown(self) -> Result<(), TransportError> {
        info!("Runtime shutting down");
        self.transport.shutdown().await
    }
}
