//! Plan generation: LLM-backed technical plans

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{EstimateResult, PlanParseError, ResearchFindings, StoryRequest, TechnicalPlan};
use crate::llm::{CompletionRequest, LlmClient, LlmError, Message};
use crate::prompts::{PlanPromptContext, PromptLoader};

/// Errors from producing a technical plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Model output is not a valid plan: {0}")]
    Malformed(#[from] PlanParseError),
}

/// Turns a story, its estimate and research into a technical plan
///
/// Implementations must be cancel-safe: the orchestrator drops the future
/// when the plan-generation budget runs out.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate(
        &self,
        story: &StoryRequest,
        estimate: &EstimateResult,
        findings: &ResearchFindings,
    ) -> Result<TechnicalPlan, PlanError>;
}

/// [`PlanGenerator`] that prompts an LLM and parses its JSON answer
pub struct LlmPlanGenerator {
    llm: Arc<dyn LlmClient>,
    prompts: PromptLoader,
    max_tokens: u32,
}

impl LlmPlanGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, prompts: PromptLoader, max_tokens: u32) -> Self {
        Self {
            llm,
            prompts,
            max_tokens,
        }
    }
}

#[async_trait]
impl PlanGenerator for LlmPlanGenerator {
    async fn generate(
        &self,
        story: &StoryRequest,
        estimate: &EstimateResult,
        findings: &ResearchFindings,
    ) -> Result<TechnicalPlan, PlanError> {
        debug!(story_id = %story.id(), "LlmPlanGenerator::generate: called");
        let context = PlanPromptContext::new(story, estimate, findings);
        let (system_prompt, user_prompt) = self
            .prompts
            .technical_plan(&context)
            .map_err(|e| PlanError::Prompt(e.to_string()))?;

        let response = self
            .llm
            .complete(CompletionRequest {
                system_prompt,
                messages: vec![Message::user(user_prompt)],
                max_tokens: self.max_tokens,
            })
            .await?;

        let text = response.content.ok_or(PlanError::EmptyResponse)?;
        let plan = TechnicalPlan::parse(&text)?;
        info!(
            story_id = %story.id(),
            tasks = plan.action_plan.tasks.len(),
            output_tokens = response.usage.output_tokens,
            "Plan generated"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures;
    use crate::llm::client::mock::MockLlmClient;
    use serde_json::json;

    fn story() -> StoryRequest {
        StoryRequest::from_value(json!({"id": "STORY-1", "title": "Add export to PDF"})).unwrap()
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_plan() {
        let text = format!("```json\n{}\n```", fixtures::plan_json("Add export to PDF"));
        let llm = Arc::new(MockLlmClient::with_text(text));
        let generator = LlmPlanGenerator::new(llm.clone(), PromptLoader::embedded_only(), 2048);

        let plan = generator
            .generate(&story(), &EstimateResult::new(5.0, 20.0), &ResearchFindings::Unavailable)
            .await
            .unwrap();

        assert_eq!(plan.story_title, "Add export to PDF");
        assert_eq!(llm.call_count(), 1);
        let request = llm.last_request().unwrap();
        assert_eq!(request.max_tokens, 2048);
        assert!(request.messages[0].content.contains("STORY-1"));
    }

    #[tokio::test]
    async fn test_generate_rejects_prose() {
        let llm = Arc::new(MockLlmClient::with_text("Sure! Here is your plan: do the work."));
        let generator = LlmPlanGenerator::new(llm, PromptLoader::embedded_only(), 2048);

        let err = generator
            .generate(&story(), &EstimateResult::new(5.0, 20.0), &ResearchFindings::Unavailable)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Malformed(PlanParseError::InvalidJson(_))));
    }

    #[tokio::test]
    async fn test_generate_surfaces_llm_error() {
        let generator = LlmPlanGenerator::new(Arc::new(MockLlmClient::new(vec![])), PromptLoader::embedded_only(), 2048);

        let err = generator
            .generate(&story(), &EstimateResult::new(5.0, 20.0), &ResearchFindings::Unavailable)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::Llm(_)));
    }
}
