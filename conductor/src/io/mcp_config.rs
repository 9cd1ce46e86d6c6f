//! MCP server definitions kept in the `[mcp_servers.<name>]` tables of the
//! config file.
//!
//! Edits go through the raw TOML table so unrelated sections and unknown keys
//! survive a save.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::McpLaunch;
use crate::error::ConfigError;
use crate::io::config::write_atomic;

const SECTION: &str = "mcp_servers";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").expect("server name pattern should be valid")
});

/// One `[mcp_servers.<name>]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerEntry {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_timeout_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_timeout_sec: Option<f64>,
    /// Keys this tool does not interpret, kept as written.
    #[serde(flatten)]
    pub extras: toml::Table,
}

impl McpServerEntry {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: BTreeMap::new(),
            startup_timeout_sec: None,
            tool_timeout_sec: None,
            extras: toml::Table::new(),
        }
    }

    pub fn launch(&self, name: &str) -> McpLaunch {
        McpLaunch {
            name: name.to_string(),
            command: self.command.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
            startup_timeout_sec: self.startup_timeout_sec,
            tool_timeout_sec: self.tool_timeout_sec,
        }
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.command.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "MCP server `{name}` must define a non-empty command"
            )));
        }
        for (field, value) in [
            ("startup_timeout_sec", self.startup_timeout_sec),
            ("tool_timeout_sec", self.tool_timeout_sec),
        ] {
            if let Some(value) = value
                && !(value.is_finite() && value > 0.0)
            {
                return Err(ConfigError::Invalid(format!(
                    "MCP server `{name}`: {field} must be a positive number"
                )));
            }
        }
        Ok(())
    }
}

pub fn validate_server_name(name: &str) -> Result<(), ConfigError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "invalid MCP server name `{name}`: use letters, digits, `-` or `_`"
        )))
    }
}

/// All configured servers, sorted by name. A missing file has none.
pub fn load_mcp_servers(path: &Path) -> Result<BTreeMap<String, McpServerEntry>, ConfigError> {
    let document = read_document(path)?;
    let Some(section) = document.get(SECTION) else {
        return Ok(BTreeMap::new());
    };
    let table = section.as_table().ok_or_else(|| {
        ConfigError::Invalid(format!("{SECTION} must be a table of server definitions"))
    })?;

    let mut servers = BTreeMap::new();
    for (name, value) in table {
        let entry: McpServerEntry = value
            .clone()
            .try_into()
            .map_err(|err| ConfigError::Invalid(format!("invalid MCP server `{name}`: {err}")))?;
        entry.validate(name)?;
        servers.insert(name.clone(), entry);
    }
    Ok(servers)
}

/// Insert or replace one server definition.
pub fn save_mcp_server(path: &Path, name: &str, entry: &McpServerEntry) -> Result<(), ConfigError> {
    validate_server_name(name)?;
    entry.validate(name)?;

    let mut document = read_document(path)?;
    let section = document
        .entry(SECTION)
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    let table = section.as_table_mut().ok_or_else(|| {
        ConfigError::Invalid(format!("{SECTION} must be a table of server definitions"))
    })?;
    table.insert(name.to_string(), toml::Value::try_from(entry)?);

    write_document(path, &document)?;
    info!(server = name, path = %path.display(), "saved MCP server");
    Ok(())
}

/// Remove one server. Returns whether it existed.
pub fn remove_mcp_server(path: &Path, name: &str) -> Result<bool, ConfigError> {
    validate_server_name(name)?;
    if !path.exists() {
        return Ok(false);
    }
    let mut document = read_document(path)?;
    let Some(table) = document.get_mut(SECTION).and_then(toml::Value::as_table_mut) else {
        return Ok(false);
    };
    if table.remove(name).is_none() {
        return Ok(false);
    }
    if table.is_empty() {
        document.remove(SECTION);
    }
    write_document(path, &document)?;
    info!(server = name, path = %path.display(), "removed MCP server");
    Ok(true)
}

/// Pretty JSON object of servers keyed by name.
pub fn dump_mcp_servers_json(
    servers: &BTreeMap<String, McpServerEntry>,
) -> Result<String, ConfigError> {
    serde_json::to_string_pretty(servers)
        .map_err(|err| ConfigError::Invalid(format!("cannot render MCP servers as JSON: {err}")))
}

fn read_document(path: &Path) -> Result<toml::Table, ConfigError> {
    if !path.exists() {
        return Ok(toml::Table::new());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_document(path: &Path, document: &toml::Table) -> Result<(), ConfigError> {
    let mut buf = toml::to_string_pretty(document)?;
    if !buf.ends_with('\n') {
        buf.push('\n');
    }
    write_atomic(path, &buf)
}
