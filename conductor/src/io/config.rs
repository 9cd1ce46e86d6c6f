//! Application configuration stored in `<config home>/conductor/config.toml`.
//!
//! The file is optional. Environment variables are read through an injected
//! lookup so tests never touch the process environment.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Provider;
use crate::core::command::tokenize;
use crate::error::ConfigError;
use crate::io::mcp_config::McpServerEntry;

/// Overrides the base directory that holds `conductor/config.toml`.
pub const CONFIG_HOME_ENV: &str = "CONDUCTOR_CONFIG_HOME";
pub const PROVIDER_ENV: &str = "CONDUCTOR_PROVIDER";
pub const MODEL_ENV: &str = "CONDUCTOR_MODEL";
pub const AGENT_COMMAND_ENV: &str = "CONDUCTOR_AGENT_COMMAND";
pub const AGENT_TIMEOUT_ENV: &str = "CONDUCTOR_AGENT_TIMEOUT_SECS";

/// Environment lookup; `main` passes `std::env::var`, tests pass a map.
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,

    pub mcp: LspWalkerConfig,

    /// Raw `[commands]` table; see [`crate::io::commands_config`].
    #[serde(skip_serializing_if = "toml::Table::is_empty")]
    pub commands: toml::Table,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mcp_servers: BTreeMap<String, McpServerEntry>,

    /// Provider secrets. Never written to disk.
    #[serde(skip)]
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    pub provider: Provider,

    /// Display name used in prompts and the welcome banner.
    pub name: String,

    pub openai_model: String,
    pub anthropic_model: String,
    pub gemini_model: String,

    /// Agent argv for the `command` provider. `{prompt}` is substituted.
    pub command: Vec<String>,

    /// Wall-clock limit for one agent invocation.
    pub timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            name: "Conductor Agent".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            anthropic_model: "claude-3-5-sonnet-latest".to_string(),
            gemini_model: "gemini-1.5-pro".to_string(),
            command: Vec::new(),
            timeout_secs: 10 * 60,
        }
    }
}

impl AgentConfig {
    /// Model name for the active provider, if it has one.
    pub fn model(&self) -> Option<&str> {
        match self.provider {
            Provider::OpenAi | Provider::AzureOpenAi => Some(&self.openai_model),
            Provider::Anthropic => Some(&self.anthropic_model),
            Provider::Gemini => Some(&self.gemini_model),
            Provider::Command => None,
        }
    }

    fn set_model(&mut self, model: String) {
        match self.provider {
            Provider::OpenAi | Provider::AzureOpenAi => self.openai_model = model,
            Provider::Anthropic => self.anthropic_model = model,
            Provider::Gemini => self.gemini_model = model,
            Provider::Command => {}
        }
    }
}

/// The language-server walker exposed to repository agents over MCP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LspWalkerConfig {
    /// Shell-style launch command. Empty disables the walker.
    pub lsp_walker_command: String,
    /// Value for `--context` unless the command already sets one.
    pub lsp_walker_context: Option<String>,
    pub lsp_walker_timeout_secs: u64,
}

impl Default for LspWalkerConfig {
    fn default() -> Self {
        Self {
            lsp_walker_command:
                "uvx --from git+https://github.com/oraios/serena serena start-mcp-server".to_string(),
            lsp_walker_context: Some("ide-assistant".to_string()),
            lsp_walker_timeout_secs: 120,
        }
    }
}

/// Provider secrets read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub azure_openai_api_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub azure_openai_api_version: Option<String>,
    pub azure_openai_deployment: Option<String>,
}

impl Credentials {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            openai_api_key: read("OPENAI_API_KEY"),
            openai_base_url: read("OPENAI_BASE_URL"),
            anthropic_api_key: read("ANTHROPIC_API_KEY"),
            gemini_api_key: read("GEMINI_API_KEY"),
            azure_openai_api_key: read("AZURE_OPENAI_API_KEY"),
            azure_openai_endpoint: read("AZURE_OPENAI_ENDPOINT"),
            azure_openai_api_version: read("AZURE_OPENAI_API_VERSION"),
            azure_openai_deployment: read("AZURE_OPENAI_DEPLOYMENT"),
        }
    }

    /// Names of the Azure variables that are not set.
    pub fn missing_azure_settings(&self) -> Vec<&'static str> {
        [
            ("AZURE_OPENAI_API_KEY", &self.azure_openai_api_key),
            ("AZURE_OPENAI_ENDPOINT", &self.azure_openai_endpoint),
            ("AZURE_OPENAI_API_VERSION", &self.azure_openai_api_version),
            ("AZURE_OPENAI_DEPLOYMENT", &self.azure_openai_deployment),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("openai_api_key", &redact(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("anthropic_api_key", &redact(&self.anthropic_api_key))
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("azure_openai_api_key", &redact(&self.azure_openai_api_key))
            .field("azure_openai_endpoint", &self.azure_openai_endpoint)
            .field("azure_openai_api_version", &self.azure_openai_api_version)
            .field("azure_openai_deployment", &self.azure_openai_deployment)
            .finish()
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.timeout_secs == 0 {
            return Err(ConfigError::Invalid("agent.timeout_secs must be > 0".to_string()));
        }
        if self.mcp.lsp_walker_timeout_secs == 0 {
            return Err(ConfigError::Invalid("mcp.lsp_walker_timeout_secs must be > 0".to_string()));
        }
        if self.agent.provider == Provider::Command
            && self.agent.command.first().is_none_or(|program| program.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "agent.command must be a non-empty array when provider is `command`".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply `CONDUCTOR_*` overrides and read credentials.
    pub fn apply_env(&mut self, lookup: EnvLookup<'_>) -> Result<(), ConfigError> {
        if let Some(provider) = lookup(PROVIDER_ENV) {
            self.agent.provider = provider
                .parse()
                .map_err(|err| ConfigError::Invalid(format!("{PROVIDER_ENV}: {err}")))?;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|m| !m.trim().is_empty()) {
            self.agent.set_model(model);
        }
        if let Some(command) = lookup(AGENT_COMMAND_ENV) {
            self.agent.command = tokenize(&command)
                .map_err(|err| ConfigError::Invalid(format!("{AGENT_COMMAND_ENV}: {err}")))?;
        }
        if let Some(timeout) = lookup(AGENT_TIMEOUT_ENV) {
            self.agent.timeout_secs = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{AGENT_TIMEOUT_ENV} must be a whole number of seconds, got `{timeout}`"
                ))
            })?;
        }
        self.credentials = Credentials::from_lookup(lookup);
        Ok(())
    }
}

/// `$CONDUCTOR_CONFIG_HOME/conductor/config.toml`, falling back to the
/// platform config directory.
pub fn config_path(lookup: EnvLookup<'_>) -> Result<PathBuf, ConfigError> {
    let home = match lookup(CONFIG_HOME_ENV).filter(|value| !value.trim().is_empty()) {
        Some(home) => PathBuf::from(home),
        None => dirs::config_dir().ok_or_else(|| {
            ConfigError::Invalid(format!(
                "cannot determine the configuration directory; set {CONFIG_HOME_ENV}"
            ))
        })?,
    };
    Ok(home.join("conductor").join("config.toml"))
}

/// Load config from `path`, then apply the environment.
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path, lookup: EnvLookup<'_>) -> Result<AppConfig, ConfigError> {
    let mut cfg = if path.exists() {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        debug!(path = %path.display(), "config file missing, using defaults");
        AppConfig::default()
    };
    cfg.apply_env(lookup)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let parent = path.parent().ok_or_else(|| {
        ConfigError::Invalid(format!("config path missing parent {}", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(write_err)?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents).map_err(write_err)?;
    fs::rename(&tmp_path, path).map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml"), &env(&[])).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn file_values_and_env_overrides_combine() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[agent]
provider = "anthropic"
timeout_secs = 30

[commands.tests]
unit = "cargo test"
"#,
        )
        .expect("write");

        let cfg = load_config(
            &path,
            &env(&[(MODEL_ENV, "claude-opus"), ("ANTHROPIC_API_KEY", "sk-ant")]),
        )
        .expect("load");
        assert_eq!(cfg.agent.provider, Provider::Anthropic);
        assert_eq!(cfg.agent.timeout_secs, 30);
        assert_eq!(cfg.agent.model(), Some("claude-opus"));
        assert_eq!(cfg.credentials.anthropic_api_key.as_deref(), Some("sk-ant"));
        assert!(cfg.commands.contains_key("tests"));
    }

    #[test]
    fn command_provider_from_env_is_tokenized() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(&env(&[
            (PROVIDER_ENV, "command"),
            (AGENT_COMMAND_ENV, "my-agent --mode 'fast path'"),
        ]))
        .expect("apply");
        assert_eq!(cfg.agent.command, vec!["my-agent", "--mode", "fast path"]);
        cfg.validate().expect("valid");
    }

    #[test]
    fn validate_rejects_zero_timeout_and_missing_command() {
        let mut cfg = AppConfig::default();
        cfg.agent.timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.agent.provider = Provider::Command;
        assert!(cfg.validate().unwrap_err().to_string().contains("agent.command"));
    }

    #[test]
    fn bad_env_values_are_invalid() {
        let mut cfg = AppConfig::default();
        assert!(cfg.apply_env(&env(&[(PROVIDER_ENV, "bedrock")])).is_err());
        assert!(cfg.apply_env(&env(&[(AGENT_TIMEOUT_ENV, "soon")])).is_err());
    }

    #[test]
    fn config_path_honours_override() {
        let path = config_path(&env(&[(CONFIG_HOME_ENV, "/tmp/home")])).expect("path");
        assert_eq!(path, PathBuf::from("/tmp/home/conductor/config.toml"));
    }

    #[test]
    fn credentials_stay_out_of_serialized_config_and_debug() {
        let mut cfg = AppConfig::default();
        cfg.credentials.openai_api_key = Some("sk-secret".to_string());
        let rendered = toml::to_string(&cfg).expect("serialize");
        assert!(!rendered.contains("sk-secret"));
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }

    #[test]
    fn write_atomic_creates_parent_dirs() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested/config.toml");
        write_atomic(&path, "x = 1\n").expect("write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "x = 1\n");
        assert!(!path.with_extension("toml.tmp").exists());
    }
}
