//! Ready-made agents built from [`AppConfig`].

use std::path::{Path, PathBuf};

use tracing::debug;

use super::provider::{McpLaunch, create_model};
use super::Agent;
use crate::core::command::tokenize;
use crate::error::AgentError;
use crate::io::config::{AppConfig, LspWalkerConfig};
use crate::io::prompt::{PromptContext, load_prompt};

/// MCP server name used for the language-server walker.
pub const LSP_WALKER_NAME: &str = "lsp_walker";

/// General coding agent with the bundled `coding_agent` instructions.
pub fn coding_agent(config: &AppConfig) -> Result<Agent, AgentError> {
    let model = create_model(config)?;
    let instructions = render("coding_agent", config, None, false)?;
    Ok(Agent::new(config.agent.name.clone(), instructions, model))
}

/// Coding agent scoped to `project_path` (default: the current directory)
/// with only the LSP walker attached.
pub fn coding_agent_with_walker(
    config: &AppConfig,
    project_path: Option<&Path>,
) -> Result<Agent, AgentError> {
    let model = create_model(config)?;
    let project = resolve_project_path(project_path)?;
    let walker = lsp_walker_launch(&config.mcp, &project)?;
    debug!(walker = walker.is_some(), project = %project.display(), "walker coding agent tools");

    let instructions = render("coding_agent", config, Some(&project), walker.is_some())?;
    Ok(Agent::new(config.agent.name.clone(), instructions, model)
        .with_workdir(project)
        .with_mcp_servers(walker.into_iter().collect()))
}

/// Agent for questions about the repository at `project_path` (default: the
/// current directory). It sees the LSP walker and every configured MCP server.
pub fn repository_qa_agent(
    config: &AppConfig,
    project_path: Option<&Path>,
) -> Result<Agent, AgentError> {
    let model = create_model(config)?;
    let project = resolve_project_path(project_path)?;

    let mut servers = Vec::new();
    if let Some(walker) = lsp_walker_launch(&config.mcp, &project)? {
        servers.push(walker);
    }
    servers.extend(
        config
            .mcp_servers
            .iter()
            .filter(|(name, _)| name.as_str() != LSP_WALKER_NAME)
            .map(|(name, entry)| entry.launch(name)),
    );
    debug!(servers = servers.len(), project = %project.display(), "repository agent tools");

    let has_walker = servers.iter().any(|server| server.name == LSP_WALKER_NAME);
    let instructions = render("repo_qa", config, Some(&project), has_walker)?;
    Ok(Agent::new(config.agent.name.clone(), instructions, model)
        .with_workdir(project)
        .with_mcp_servers(servers))
}

/// Launch line for the LSP walker, or `None` when the command is blank.
///
/// `--context` is appended when configured and not already present;
/// `--project` is appended unless the command sets it. The walker timeout
/// bounds both startup and each tool call.
pub fn lsp_walker_launch(
    settings: &LspWalkerConfig,
    project_path: &Path,
) -> Result<Option<McpLaunch>, AgentError> {
    let command = settings.lsp_walker_command.trim();
    if command.is_empty() {
        return Ok(None);
    }
    let mut parts = tokenize(command)
        .map_err(|err| AgentError::Configuration(format!("mcp.lsp_walker_command: {err}")))?;

    if let Some(context) = settings.lsp_walker_context.as_deref().filter(|c| !c.is_empty())
        && !has_flag(&parts, "--context")
    {
        parts.push("--context".to_string());
        parts.push(context.to_string());
    }
    if !has_flag(&parts, "--project") {
        parts.push("--project".to_string());
        parts.push(project_path.display().to_string());
    }

    let mut parts = parts.into_iter();
    let Some(program) = parts.next() else {
        return Ok(None);
    };
    Ok(Some(McpLaunch {
        name: LSP_WALKER_NAME.to_string(),
        command: program,
        args: parts.collect(),
        env: Default::default(),
        startup_timeout_sec: Some(settings.lsp_walker_timeout_secs as f64),
        tool_timeout_sec: Some(settings.lsp_walker_timeout_secs as f64),
    }))
}

fn has_flag(parts: &[String], flag: &str) -> bool {
    let prefix = format!("{flag}=");
    parts
        .iter()
        .any(|part| part == flag || part.starts_with(&prefix))
}

fn resolve_project_path(project_path: Option<&Path>) -> Result<PathBuf, AgentError> {
    let path = match project_path {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir().map_err(|err| {
            AgentError::Configuration(format!("cannot read current directory: {err}"))
        })?,
    };
    Ok(path.canonicalize().unwrap_or(path))
}

fn render(
    name: &str,
    config: &AppConfig,
    project: Option<&Path>,
    has_lsp_walker: bool,
) -> Result<String, AgentError> {
    let ctx = PromptContext {
        agent_name: config.agent.name.clone(),
        project_path: project.map(|path| path.display().to_string()),
        has_lsp_walker,
    };
    load_prompt(name, &ctx).map_err(|err| AgentError::Configuration(format!("{err:#}")))
}
