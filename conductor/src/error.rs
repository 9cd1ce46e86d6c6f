//! Typed errors shared across the registry, executor, agents and workflows.
//!
//! Validation and execution failures are distinct types so the CLI can map
//! each family to its own message and exit code. Non-zero exit codes are not
//! errors; they are carried by [`crate::core::result::CommandResult`].

use std::path::PathBuf;

use thiserror::Error;

use crate::core::command::display_argv;

/// Failure to normalise a registration or resolve a specification.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("command specification cannot be empty")]
    EmptySpecification,

    #[error("cannot tokenize command `{input}`: {source}")]
    Tokenize {
        input: String,
        #[source]
        source: shell_words::ParseError,
    },
}

/// A command could not be started, or did not finish before its timeout.
#[derive(Debug, Clone, Error)]
#[error("{}", self.render())]
pub struct CommandExecutionError {
    pub argv: Vec<String>,
    pub message: String,
    pub stderr: Option<String>,
}

impl CommandExecutionError {
    pub fn new(argv: &[String], message: impl Into<String>, stderr: Option<String>) -> Self {
        Self {
            argv: argv.to_vec(),
            message: message.into(),
            stderr,
        }
    }

    fn render(&self) -> String {
        let mut rendered = format!("{}\nCommand: {}", self.message, display_argv(&self.argv));
        if let Some(stderr) = self.stderr.as_deref().map(str::trim)
            && !stderr.is_empty()
        {
            rendered.push_str("\nStderr: ");
            rendered.push_str(stderr);
        }
        rendered
    }
}

/// Any failure surfaced by [`crate::io::command_executor::CommandRunner`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Execution(#[from] CommandExecutionError),
}

/// Failures at the agent boundary.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// Credentials or settings are missing; raised before any agent runs.
    #[error("agent is not configured: {0}")]
    Configuration(String),

    /// The agent ran and failed.
    #[error("{0}")]
    Execution(String),

    /// The configured provider has no usable integration.
    #[error("provider not available: {0}")]
    ProviderNotAvailable(String),
}

/// A workflow chain aborted in the named step.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("step `{step}` failed: {source}")]
    Agent {
        step: &'static str,
        #[source]
        source: AgentError,
    },

    #[error("step `{step}` failed: {source}")]
    Command {
        step: &'static str,
        #[source]
        source: CommandError,
    },
}

impl WorkflowError {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Agent { step, .. } | Self::Command { step, .. } => step,
        }
    }
}

/// Malformed or unreadable configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_lists_command_and_trimmed_stderr() {
        let argv = vec!["uv".to_string(), "run".to_string(), "a b".to_string()];
        let err =
            CommandExecutionError::new(&argv, "Test command timed out", Some("  boom \n".into()));
        assert_eq!(
            err.to_string(),
            "Test command timed out\nCommand: uv run 'a b'\nStderr: boom"
        );
    }

    #[test]
    fn execution_error_omits_blank_stderr() {
        let argv = vec!["missing".to_string()];
        let err = CommandExecutionError::new(&argv, "not found", Some("   ".into()));
        assert_eq!(err.to_string(), "not found\nCommand: missing");
    }
}
