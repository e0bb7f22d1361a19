//! Prompt templates
//!
//! Handlebars templates for plan generation, loaded from an override
//! directory when present and otherwise from the embedded defaults.

mod embedded;
mod loader;

pub use loader::{PlanPromptContext, PromptLoader};
