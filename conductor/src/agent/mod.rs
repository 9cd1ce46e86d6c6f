//! LLM agents and the runner traits workflows consume.
//!
//! Workflows only see [`AgentRunner`] and [`ExplorationRunner`]. The concrete
//! [`Agent`] pairs bundled instructions with a [`ChatModel`] chosen by
//! [`provider::create_model`]; tests pass closures instead.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::AgentError;

pub mod cli_model;
pub mod factory;
pub mod provider;
pub mod reply;

pub use factory::{coding_agent, coding_agent_with_walker, repository_qa_agent};
pub use provider::{ChatModel, ChatRequest, McpLaunch, Provider, create_model};
pub use reply::{AgentReply, TextContent, coerce_to_text};

/// Sends a prompt to an agent and returns its text reply.
pub trait AgentRunner {
    fn run(&self, prompt: &str) -> Result<String, AgentError>;
}

/// Like [`AgentRunner`], scoped to a project directory.
pub trait ExplorationRunner {
    fn explore(&self, prompt: &str, project_path: Option<&Path>) -> Result<String, AgentError>;
}

impl<F> AgentRunner for F
where
    F: Fn(&str) -> Result<String, AgentError>,
{
    fn run(&self, prompt: &str) -> Result<String, AgentError> {
        self(prompt)
    }
}

impl<F> ExplorationRunner for F
where
    F: Fn(&str, Option<&Path>) -> Result<String, AgentError>,
{
    fn explore(&self, prompt: &str, project_path: Option<&Path>) -> Result<String, AgentError> {
        self(prompt, project_path)
    }
}

/// A named agent: instructions plus the model that answers.
pub struct Agent {
    pub name: String,
    instructions: String,
    model: Box<dyn ChatModel>,
    workdir: Option<PathBuf>,
    mcp_servers: Vec<McpLaunch>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        model: Box<dyn ChatModel>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            model,
            workdir: None,
            mcp_servers: Vec::new(),
        }
    }

    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn with_mcp_servers(mut self, servers: Vec<McpLaunch>) -> Self {
        self.mcp_servers = servers;
        self
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn mcp_servers(&self) -> &[McpLaunch] {
        &self.mcp_servers
    }

    fn request(&self, prompt: &str, workdir: Option<&Path>) -> ChatRequest {
        ChatRequest {
            instructions: self.instructions.clone(),
            prompt: prompt.to_string(),
            workdir: workdir.map(Path::to_path_buf).or_else(|| self.workdir.clone()),
            mcp_servers: self.mcp_servers.clone(),
        }
    }
}

impl AgentRunner for Agent {
    #[instrument(skip_all, fields(agent = %self.name, model = %self.model.describe()))]
    fn run(&self, prompt: &str) -> Result<String, AgentError> {
        info!(prompt_bytes = prompt.len(), "running agent");
        let reply = self.model.complete(&self.request(prompt, None))?;
        Ok(coerce_to_text(&reply))
    }
}

impl ExplorationRunner for Agent {
    #[instrument(skip_all, fields(agent = %self.name, model = %self.model.describe()))]
    fn explore(&self, prompt: &str, project_path: Option<&Path>) -> Result<String, AgentError> {
        info!(
            prompt_bytes = prompt.len(),
            project_path = ?project_path,
            "running exploration agent"
        );
        let reply = self.model.complete(&self.request(prompt, project_path))?;
        Ok(coerce_to_text(&reply))
    }
}
