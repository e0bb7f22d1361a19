//! Estimation service: HTTP adapter plus its transport agent

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::ServiceError;
use crate::config::EstimatorConfig;
use crate::domain::EstimateResult;
use crate::transport::{Envelope, Mailbox, Outbox, Performative};

/// Predicts (effort, duration) for a story payload
#[async_trait]
pub trait Estimator: Send + Sync {
    async fn estimate(&self, story: &Value) -> Result<EstimateResult, ServiceError>;
}

/// Estimator backed by a model-serving endpoint
///
/// POSTs the story JSON and expects `{"effort": number, "time": number}`.
pub struct HttpEstimator {
    http: Client,
    url: String,
}

impl HttpEstimator {
    pub fn from_config(config: &EstimatorConfig) -> Result<Self, ServiceError> {
        debug!(url = %config.url, "HttpEstimator::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl Estimator for HttpEstimator {
    async fn estimate(&self, story: &Value) -> Result<EstimateResult, ServiceError> {
        debug!(url = %self.url, "HttpEstimator::estimate: called");
        let response = self.http.post(self.url.as_str()).json(story).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        EstimateResult::from_body(&body)
            .ok_or_else(|| ServiceError::InvalidResponse(format!("expected {{effort, time}}, got {}", body)))
    }
}

/// Exposes an [`Estimator`] on the transport
///
/// Every `request` gets exactly one reply: `inform{effort, time}` rounded to
/// two decimals, or `failure{error}`.
pub struct EstimatorAgent {
    estimator: Arc<dyn Estimator>,
    mailbox: Mailbox,
}

impl EstimatorAgent {
    pub fn new(estimator: Arc<dyn Estimator>, mailbox: Mailbox) -> Self {
        Self { estimator, mailbox }
    }

    /// Serve requests until the mailbox closes
    pub async fn run(self) {
        let (outbox, mut rx) = self.mailbox.split();
        info!(address = %outbox.address(), "Estimator agent started");

        while let Some(envelope) = rx.recv().await {
            if envelope.performative != Performative::Request {
                debug!(performative = %envelope.performative, "EstimatorAgent: ignoring non-request");
                continue;
            }
            let estimator = self.estimator.clone();
            let outbox = outbox.clone();
            tokio::spawn(async move { handle_request(estimator.as_ref(), &outbox, envelope).await });
        }

        info!(address = %outbox.address(), "Estimator agent stopped");
    }
}

async fn handle_request(estimator: &dyn Estimator, outbox: &Outbox, envelope: Envelope) {
    let title = envelope.body.get("title").and_then(Value::as_str).unwrap_or("N/A");
    info!(correlation_id = %envelope.correlation_id, %title, "Estimation requested");

    let (performative, body) = match estimator.estimate(&envelope.body).await {
        Ok(estimate) => {
            let estimate = estimate.rounded();
            info!(%title, effort = estimate.effort, time = estimate.duration, "Estimation produced");
            (Performative::Inform, json!({ "effort": estimate.effort, "time": estimate.duration }))
        }
        Err(e) => {
            warn!(%title, error = %e, "Estimation failed");
            (Performative::Failure, json!({ "error": format!("Estimator internal error: {}", e) }))
        }
    };

    if let Err(e) = outbox.reply(&envelope, performative, body).await {
        warn!(error = %e, "EstimatorAgent: reply not sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::domain::CorrelationId;
    use crate::transport::Transport;

    struct FixedEstimator(Option<EstimateResult>);

    #[async_trait]
    impl Estimator for FixedEstimator {
        async fn estimate(&self, _story: &Value) -> Result<EstimateResult, ServiceError> {
            self.0
                .ok_or_else(|| ServiceError::InvalidResponse("model not loaded".to_string()))
        }
    }

    async fn ask(estimator: FixedEstimator) -> Envelope {
        let transport = Transport::spawn(TransportConfig::default());
        let agent_mailbox = transport.register("estimator").await.unwrap();
        let mut client = transport.register("reasoner").await.unwrap();
        tokio::spawn(EstimatorAgent::new(Arc::new(estimator), agent_mailbox).run());

        let id = CorrelationId::new();
        client
            .send(&"estimator".into(), Performative::Request, json!({"title": "Add export to PDF"}), &id)
            .await
            .unwrap();
        let reply = client.recv_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.correlation_id, id);
        reply
    }

    #[tokio::test]
    async fn test_agent_replies_rounded_estimate() {
        let reply = ask(FixedEstimator(Some(EstimateResult::new(3.14159, 10.005)))).await;
        assert_eq!(reply.performative, Performative::Inform);
        assert_eq!(reply.body["effort"], 3.14);
        assert!(EstimateResult::from_body(&reply.body).is_some());
    }

    #[tokio::test]
    async fn test_agent_replies_failure_with_error() {
        let reply = ask(FixedEstimator(None)).await;
        assert_eq!(reply.performative, Performative::Failure);
        let error = reply.body["error"].as_str().unwrap();
        assert!(error.contains("model not loaded"));
    }
}
