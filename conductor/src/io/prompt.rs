//! Bundled agent instructions rendered with minijinja.

use anyhow::{Context, Result, anyhow};
use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

const CODING_AGENT_TEMPLATE: &str = include_str!("prompts/coding_agent.md");
const REPO_QA_TEMPLATE: &str = include_str!("prompts/repo_qa.md");

/// Names accepted by [`load_prompt`].
pub const PROMPT_NAMES: [&str; 2] = ["coding_agent", "repo_qa"];

/// Values available to every prompt template.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    pub agent_name: String,
    pub project_path: Option<String>,
    pub has_lsp_walker: bool,
}

fn template_source(name: &str) -> Option<&'static str> {
    match name {
        "coding_agent" => Some(CODING_AGENT_TEMPLATE),
        "repo_qa" => Some(REPO_QA_TEMPLATE),
        _ => None,
    }
}

/// Render the bundled prompt called `name`.
pub fn load_prompt(name: &str, ctx: &PromptContext) -> Result<String> {
    let source = template_source(name).ok_or_else(|| {
        anyhow!(
            "prompt '{name}' was not found (available: {})",
            PROMPT_NAMES.join(", ")
        )
    })?;
    let mut env = Environment::new();
    env.add_template(name, source)
        .with_context(|| format!("compile prompt {name}"))?;
    let rendered = env
        .get_template(name)?
        .render(ctx)
        .with_context(|| format!("render prompt {name}"))?;
    debug!(prompt = name, bytes = rendered.len(), "rendered prompt");
    Ok(rendered.trim().to_string())
}
