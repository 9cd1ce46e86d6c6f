//! Model providers and the factory that turns configuration into a model.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::cli_model::{CliChatModel, CliFlavor};
use super::reply::AgentReply;
use crate::error::AgentError;
use crate::io::config::AppConfig;

/// Closed set of model backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "azure_openai")]
    AzureOpenAi,
    Anthropic,
    Gemini,
    /// A user-configured agent command; needs no credentials.
    Command,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAi,
        Provider::AzureOpenAi,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::Command,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::AzureOpenAi => "azure_openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Command => "command",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalised = value.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalised)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.as_str()).collect();
                format!("unknown provider `{value}` (expected one of: {})", known.join(", "))
            })
    }
}

/// An MCP server the agent should be able to reach.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpLaunch {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Seconds the agent waits for the server to come up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startup_timeout_sec: Option<f64>,
    /// Seconds the agent waits for a single tool call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_timeout_sec: Option<f64>,
}

/// Everything a model needs to answer one prompt.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub instructions: String,
    pub prompt: String,
    pub workdir: Option<PathBuf>,
    pub mcp_servers: Vec<McpLaunch>,
}

/// A backend that answers prompts.
pub trait ChatModel {
    /// Short label for logs, e.g. `codex:gpt-4o-mini`.
    fn describe(&self) -> String;

    fn complete(&self, request: &ChatRequest) -> Result<AgentReply, AgentError>;
}

/// Build the model for the configured provider.
///
/// Missing credentials fail here, before any agent is spawned.
pub fn create_model(config: &AppConfig) -> Result<Box<dyn ChatModel>, AgentError> {
    let agent = &config.agent;
    let credentials = &config.credentials;
    let timeout = Duration::from_secs(agent.timeout_secs);
    debug!(provider = %agent.provider, "creating chat model");

    let model = match agent.provider {
        Provider::OpenAi => {
            let key = required(
                credentials.openai_api_key.as_deref(),
                "OpenAI API key not configured. Set OPENAI_API_KEY.",
            )?;
            let mut env = BTreeMap::from([("OPENAI_API_KEY".to_string(), key.to_string())]);
            if let Some(base_url) = &credentials.openai_base_url {
                env.insert("OPENAI_BASE_URL".to_string(), base_url.clone());
            }
            CliChatModel::new(
                CliFlavor::Codex {
                    model: agent.openai_model.clone(),
                },
                timeout,
            )
            .with_env(env)
        }
        Provider::Anthropic => {
            let key = required(
                credentials.anthropic_api_key.as_deref(),
                "Anthropic API key not configured. Set ANTHROPIC_API_KEY.",
            )?;
            CliChatModel::new(
                CliFlavor::Claude {
                    model: agent.anthropic_model.clone(),
                },
                timeout,
            )
            .with_env(BTreeMap::from([("ANTHROPIC_API_KEY".to_string(), key.to_string())]))
        }
        Provider::Gemini => {
            let key = required(
                credentials.gemini_api_key.as_deref(),
                "Gemini API key not configured. Set GEMINI_API_KEY.",
            )?;
            CliChatModel::new(
                CliFlavor::Gemini {
                    model: agent.gemini_model.clone(),
                },
                timeout,
            )
            .with_env(BTreeMap::from([("GEMINI_API_KEY".to_string(), key.to_string())]))
        }
        Provider::AzureOpenAi => {
            let missing = credentials.missing_azure_settings();
            if !missing.is_empty() {
                return Err(AgentError::Configuration(format!(
                    "Azure OpenAI settings missing: {}",
                    missing.join(", ")
                )));
            }
            return Err(AgentError::ProviderNotAvailable(
                "azure_openai has no agent CLI integration; \
                 use the `command` provider with an Azure-backed CLI"
                    .to_string(),
            ));
        }
        Provider::Command => {
            if agent.command.is_empty() {
                return Err(AgentError::Configuration(
                    "agent.command must be set when provider is `command`. \
                     Set CONDUCTOR_AGENT_COMMAND."
                        .to_string(),
                ));
            }
            CliChatModel::new(
                CliFlavor::Command {
                    argv: agent.command.clone(),
                },
                timeout,
            )
        }
    };
    Ok(Box::new(model))
}

fn required<'a>(value: Option<&'a str>, message: &str) -> Result<&'a str, AgentError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AgentError::Configuration(message.to_string()))
}
