//! Prompt Loader
//!
//! Loads prompt templates from files or falls back to embedded defaults.

use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use super::embedded;
use crate::domain::{EstimateResult, ResearchFindings, StoryRequest};

/// Context for rendering the technical-plan template
#[derive(Debug, Clone, Serialize)]
pub struct PlanPromptContext {
    /// Story payload, pretty-printed JSON
    pub story: String,
    /// `{effort, time}` pretty-printed JSON
    pub estimate: String,
    /// Research findings or the no-research placeholder
    pub research: String,
    pub story_id: String,
    pub budget_hours: f64,
}

impl PlanPromptContext {
    pub fn new(story: &StoryRequest, estimate: &EstimateResult, findings: &ResearchFindings) -> Self {
        debug!(story_id = %story.id(), "PlanPromptContext::new: called");
        let pretty = |v: &serde_json::Value| serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string());
        let estimate_value = serde_json::json!({ "effort": estimate.effort, "time": estimate.duration });
        Self {
            story: pretty(&story.to_value()),
            estimate: pretty(&estimate_value),
            research: pretty(&findings.to_value()),
            story_id: story.id().to_string(),
            budget_hours: estimate.duration,
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// Override directory (e.g., `.storytwin/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `<root>/.storytwin/prompts` before the embedded defaults
    pub fn new(root: impl AsRef<Path>) -> Self {
        let user_dir = root.as_ref().join(".storytwin/prompts");
        Self {
            hbs: Self::engine(),
            user_dir: if user_dir.exists() { Some(user_dir) } else { None },
        }
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Self {
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        hbs.set_strict_mode(true);
        hbs
    }

    /// Load a template by name
    ///
    /// Checks `{user_dir}/{name}.pmt` first, then the embedded fallback.
    fn load_template(&self, name: &str) -> Result<String> {
        if let Some(ref user_dir) = self.user_dir {
            let path = user_dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from user override: {:?}", path);
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<T: Serialize>(&self, template_name: &str, context: &T) -> Result<String> {
        let template = self.load_template(template_name)?;
        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// System prompt and user prompt for one story's plan
    pub fn technical_plan(&self, context: &PlanPromptContext) -> Result<(String, String)> {
        let system = self.load_template("technical-plan-system")?;
        let user = self.render("technical-plan", context)?;
        Ok((system, user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> PlanPromptContext {
        let story = StoryRequest::from_value(json!({
            "id": "STORY-42",
            "title": "Add export to PDF",
            "acceptance_criteria": "Given a report\nWhen I click export\nThen a PDF downloads",
        }))
        .unwrap();
        PlanPromptContext::new(&story, &EstimateResult::new(5.0, 12.5), &ResearchFindings::Unavailable)
    }

    #[test]
    fn test_technical_plan_renders_inputs() {
        let loader = PromptLoader::embedded_only();
        let (system, user) = loader.technical_plan(&context()).unwrap();

        assert!(system.contains("Tech Lead"));
        assert!(user.contains("Add export to PDF"));
        assert!(user.contains("\"story_id\": \"STORY-42\""));
        assert!(user.contains("12.5 hours"));
        assert!(user.contains("no external research"));
        // Triple-stash keeps JSON quotes unescaped
        assert!(!user.contains("&quot;"));
    }

    #[test]
    fn test_user_override_wins() {
        let dir = tempfile::tempdir().unwrap();
        let prompts = dir.path().join(".storytwin/prompts");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("technical-plan.pmt"), "Plan {{story_id}} in {{budget_hours}}h").unwrap();

        let loader = PromptLoader::new(dir.path());
        let (_, user) = loader.technical_plan(&context()).unwrap();
        assert_eq!(user, "Plan STORY-42 in 12.5h");
    }

    #[test]
    fn test_unknown_template() {
        let loader = PromptLoader::embedded_only();
        assert!(loader.load_template("nonexistent-template").is_err());
    }
}
