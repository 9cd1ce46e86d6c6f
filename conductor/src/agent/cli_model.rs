//! Chat models backed by agent command-line tools.
//!
//! Each flavor knows how to build the argv for its CLI, where to find the
//! final reply, and how to hand MCP servers to the agent. The prompt goes to
//! stdin unless an argument carries the `{prompt}` placeholder.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::provider::{ChatModel, ChatRequest, McpLaunch};
use super::reply::AgentReply;
use crate::core::command::display_argv;
use crate::error::AgentError;
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, run_process};

/// Placeholder replaced by the full prompt inside a custom agent argv.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Which agent CLI to drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliFlavor {
    /// `codex exec`; the reply is read from `--output-last-message`.
    Codex { model: String },
    /// `claude --print`; the reply is the JSON envelope on stdout.
    Claude { model: String },
    Gemini { model: String },
    /// Arbitrary user command; the reply is stdout.
    Command { argv: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    argv: Vec<String>,
    stdin: Option<String>,
    env: BTreeMap<String, String>,
}

pub struct CliChatModel {
    flavor: CliFlavor,
    timeout: Duration,
    env: BTreeMap<String, String>,
}

impl CliChatModel {
    pub fn new(flavor: CliFlavor, timeout: Duration) -> Self {
        Self {
            flavor,
            timeout,
            env: BTreeMap::new(),
        }
    }

    /// Extra environment for the agent process, on top of the inherited one.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    fn invocation(&self, request: &ChatRequest, output_file: Option<&Path>) -> Invocation {
        match &self.flavor {
            CliFlavor::Codex { model } => {
                let mut argv = strings([
                    "codex",
                    "exec",
                    "--skip-git-repo-check",
                    "--model",
                    model.as_str(),
                ]);
                if let Some(path) = output_file {
                    argv.push("--output-last-message".to_string());
                    argv.push(path.display().to_string());
                }
                argv.extend(codex_mcp_overrides(&request.mcp_servers));
                argv.push("-".to_string());
                Invocation {
                    argv,
                    stdin: Some(compose_prompt(&request.instructions, &request.prompt)),
                    env: BTreeMap::new(),
                }
            }
            CliFlavor::Claude { model } => {
                let mut argv = strings([
                    "claude",
                    "--print",
                    "--output-format",
                    "json",
                    "--model",
                    model.as_str(),
                ]);
                if !request.instructions.trim().is_empty() {
                    argv.push("--append-system-prompt".to_string());
                    argv.push(request.instructions.clone());
                }
                if !request.mcp_servers.is_empty() {
                    argv.push("--mcp-config".to_string());
                    argv.push(claude_mcp_config(&request.mcp_servers));
                }
                Invocation {
                    argv,
                    stdin: Some(request.prompt.clone()),
                    env: claude_mcp_timeouts(&request.mcp_servers),
                }
            }
            CliFlavor::Gemini { model } => Invocation {
                argv: strings(["gemini", "--model", model.as_str()]),
                stdin: Some(compose_prompt(&request.instructions, &request.prompt)),
                env: BTreeMap::new(),
            },
            CliFlavor::Command { argv } => {
                let prompt = compose_prompt(&request.instructions, &request.prompt);
                if argv.iter().any(|arg| arg.contains(PROMPT_PLACEHOLDER)) {
                    Invocation {
                        argv: argv
                            .iter()
                            .map(|arg| arg.replace(PROMPT_PLACEHOLDER, &prompt))
                            .collect(),
                        stdin: None,
                        env: BTreeMap::new(),
                    }
                } else {
                    Invocation {
                        argv: argv.clone(),
                        stdin: Some(prompt),
                        env: BTreeMap::new(),
                    }
                }
            }
        }
    }

    fn spawn(&self, invocation: &Invocation, workdir: Option<&Path>) -> Result<String, AgentError> {
        let Some((program, args)) = invocation.argv.split_first() else {
            return Err(AgentError::Configuration("agent command is empty".to_string()));
        };
        let mut cmd = Command::new(program);
        cmd.args(args).envs(&self.env).envs(&invocation.env);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        info!(program = %program, workdir = ?workdir, "starting agent process");
        let output = run_process(
            cmd,
            invocation.stdin.as_deref().map(str::as_bytes),
            Some(self.timeout),
            DEFAULT_OUTPUT_LIMIT_BYTES,
        )
        .map_err(|err| AgentError::Execution(format!("failed to start `{program}`: {err}")))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "agent process timed out");
            return Err(AgentError::Execution(format!(
                "`{program}` timed out after {}s",
                self.timeout.as_secs()
            )));
        }
        if !output.status.success() {
            let stderr = output.stderr_lossy();
            warn!(exit_code = output.exit_code(), "agent process failed");
            let mut message = format!("`{program}` exited with code {}", output.exit_code());
            if !stderr.trim().is_empty() {
                message.push_str(": ");
                message.push_str(stderr.trim());
            }
            return Err(AgentError::Execution(message));
        }
        if output.stdout_truncated > 0 {
            warn!(truncated = output.stdout_truncated, "agent reply truncated");
        }
        debug!(stdout_bytes = output.stdout.len(), "agent process finished");
        Ok(output.stdout_lossy())
    }
}

impl ChatModel for CliChatModel {
    fn describe(&self) -> String {
        match &self.flavor {
            CliFlavor::Codex { model } => format!("codex:{model}"),
            CliFlavor::Claude { model } => format!("claude:{model}"),
            CliFlavor::Gemini { model } => format!("gemini:{model}"),
            CliFlavor::Command { argv } => format!("command:{}", display_argv(argv)),
        }
    }

    #[instrument(
        skip_all,
        fields(model = %self.describe(), mcp_servers = request.mcp_servers.len())
    )]
    fn complete(&self, request: &ChatRequest) -> Result<AgentReply, AgentError> {
        match &self.flavor {
            CliFlavor::Codex { .. } => {
                let reply_file = tempfile::Builder::new()
                    .prefix("conductor-reply-")
                    .suffix(".txt")
                    .tempfile()
                    .map_err(|err| AgentError::Execution(format!("create reply file: {err}")))?;
                let invocation = self.invocation(request, Some(reply_file.path()));
                let stdout = self.spawn(&invocation, request.workdir.as_deref())?;
                let reply = fs::read_to_string(reply_file.path()).map_err(|err| {
                    AgentError::Execution(format!(
                        "read reply file {}: {err}",
                        reply_file.path().display()
                    ))
                })?;
                let reply = if reply.trim().is_empty() { stdout } else { reply };
                Ok(AgentReply::Text(reply.trim().to_string()))
            }
            CliFlavor::Claude { .. } => {
                let invocation = self.invocation(request, None);
                let stdout = self.spawn(&invocation, request.workdir.as_deref())?;
                parse_claude_reply(&stdout)
            }
            CliFlavor::Gemini { .. } | CliFlavor::Command { .. } => {
                if !request.mcp_servers.is_empty() {
                    debug!("agent CLI has no MCP configuration flag; servers ignored");
                }
                let invocation = self.invocation(request, None);
                let stdout = self.spawn(&invocation, request.workdir.as_deref())?;
                Ok(AgentReply::Text(stdout.trim().to_string()))
            }
        }
    }
}

/// Instructions followed by the task, separated by a blank line.
fn compose_prompt(instructions: &str, prompt: &str) -> String {
    let instructions = instructions.trim();
    if instructions.is_empty() {
        prompt.to_string()
    } else {
        format!("{instructions}\n\n{prompt}")
    }
}

fn parse_claude_reply(stdout: &str) -> Result<AgentReply, AgentError> {
    match serde_json::from_str::<serde_json::Value>(stdout.trim()) {
        Ok(value) => {
            if value.get("is_error").and_then(serde_json::Value::as_bool) == Some(true) {
                let detail = value
                    .get("result")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown error");
                return Err(AgentError::Execution(format!("claude reported an error: {detail}")));
            }
            Ok(AgentReply::Structured(value))
        }
        Err(_) => Ok(AgentReply::Text(stdout.trim().to_string())),
    }
}

/// `-c mcp_servers.<name>.<key>=<toml>` overrides understood by `codex`.
fn codex_mcp_overrides(servers: &[McpLaunch]) -> Vec<String> {
    let mut overrides = Vec::new();
    for server in servers {
        let prefix = format!("mcp_servers.{}", server.name);
        overrides.push("-c".to_string());
        overrides.push(format!(
            "{prefix}.command={}",
            toml::Value::String(server.command.clone())
        ));
        overrides.push("-c".to_string());
        overrides.push(format!(
            "{prefix}.args={}",
            toml::Value::Array(server.args.iter().cloned().map(toml::Value::String).collect())
        ));
        for (key, value) in &server.env {
            overrides.push("-c".to_string());
            overrides.push(format!("{prefix}.env.{key}={}", toml::Value::String(value.clone())));
        }
        for (key, value) in [
            ("startup_timeout_sec", server.startup_timeout_sec),
            ("tool_timeout_sec", server.tool_timeout_sec),
        ] {
            if let Some(secs) = value {
                overrides.push("-c".to_string());
                overrides.push(format!("{prefix}.{key}={}", toml::Value::Float(secs)));
            }
        }
    }
    overrides
}

/// `claude` reads MCP timeouts, in milliseconds, from its environment and
/// applies them to every server, so the longest configured value wins.
fn claude_mcp_timeouts(servers: &[McpLaunch]) -> BTreeMap<String, String> {
    let longest = |pick: fn(&McpLaunch) -> Option<f64>| {
        servers
            .iter()
            .filter_map(pick)
            .fold(None, |acc: Option<f64>, secs| Some(acc.map_or(secs, |a| a.max(secs))))
    };
    let mut env = BTreeMap::new();
    for (key, secs) in [
        ("MCP_TIMEOUT", longest(|s| s.startup_timeout_sec)),
        ("MCP_TOOL_TIMEOUT", longest(|s| s.tool_timeout_sec)),
    ] {
        if let Some(secs) = secs {
            env.insert(key.to_string(), format!("{}", (secs * 1000.0).round() as u64));
        }
    }
    env
}

fn claude_mcp_config(servers: &[McpLaunch]) -> String {
    let servers: serde_json::Map<String, serde_json::Value> = servers
        .iter()
        .map(|server| {
            (
                server.name.clone(),
                json!({
                    "command": server.command,
                    "args": server.args,
                    "env": server.env,
                }),
            )
        })
        .collect();
    json!({ "mcpServers": servers }).to_string()
}

fn strings<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| (*part).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(prompt: &str) -> ChatRequest {
        ChatRequest {
            instructions: "You are terse.".to_string(),
            prompt: prompt.to_string(),
            workdir: None,
            mcp_servers: Vec::new(),
        }
    }

    fn walker() -> McpLaunch {
        McpLaunch {
            name: "lsp".to_string(),
            command: "lsp-walker".to_string(),
            args: vec!["--project".to_string(), "/repo".to_string()],
            env: BTreeMap::from([("LOG".to_string(), "1".to_string())]),
            startup_timeout_sec: Some(30.0),
            tool_timeout_sec: Some(90.5),
        }
    }

    fn model(argv: &[&str]) -> CliChatModel {
        CliChatModel::new(
            CliFlavor::Command {
                argv: argv.iter().map(|s| (*s).to_string()).collect(),
            },
            Duration::from_secs(5),
        )
    }

    #[test]
    fn codex_argv_carries_model_output_file_and_mcp_overrides() {
        let model = CliChatModel::new(
            CliFlavor::Codex {
                model: "gpt-4o-mini".to_string(),
            },
            Duration::from_secs(5),
        );
        let mut req = request("fix it");
        req.mcp_servers.push(walker());
        let invocation = model.invocation(&req, Some(Path::new("/tmp/out.txt")));
        assert_eq!(
            &invocation.argv[..7],
            [
                "codex",
                "exec",
                "--skip-git-repo-check",
                "--model",
                "gpt-4o-mini",
                "--output-last-message",
                "/tmp/out.txt"
            ]
        );
        assert!(invocation.argv.contains(&r#"mcp_servers.lsp.command="lsp-walker""#.to_string()));
        assert!(invocation.argv.contains(&r#"mcp_servers.lsp.env.LOG="1""#.to_string()));
        assert!(invocation.argv.contains(&"mcp_servers.lsp.startup_timeout_sec=30.0".to_string()));
        assert!(invocation.argv.contains(&"mcp_servers.lsp.tool_timeout_sec=90.5".to_string()));
        assert!(invocation.env.is_empty());
        assert_eq!(invocation.argv.last().map(String::as_str), Some("-"));
        assert_eq!(invocation.stdin.as_deref(), Some("You are terse.\n\nfix it"));
    }

    #[test]
    fn claude_argv_passes_mcp_config_as_json() {
        let model = CliChatModel::new(
            CliFlavor::Claude {
                model: "claude-3-5-sonnet-latest".to_string(),
            },
            Duration::from_secs(5),
        );
        let mut req = request("hello");
        req.mcp_servers.push(walker());
        let invocation = model.invocation(&req, None);
        let position = invocation
            .argv
            .iter()
            .position(|arg| arg == "--mcp-config")
            .expect("mcp flag");
        let config: serde_json::Value =
            serde_json::from_str(&invocation.argv[position + 1]).expect("json");
        assert_eq!(config["mcpServers"]["lsp"]["command"], "lsp-walker");
        assert_eq!(invocation.env.get("MCP_TIMEOUT").map(String::as_str), Some("30000"));
        assert_eq!(invocation.env.get("MCP_TOOL_TIMEOUT").map(String::as_str), Some("90500"));
        assert_eq!(invocation.stdin.as_deref(), Some("hello"));
    }

    #[test]
    fn claude_error_envelope_is_an_execution_error() {
        let err = parse_claude_reply(r#"{"is_error": true, "result": "quota"}"#).unwrap_err();
        assert!(err.to_string().contains("quota"));
        let reply = parse_claude_reply(r#"{"result": "done"}"#).expect("reply");
        assert_eq!(crate::agent::coerce_to_text(&reply), "done");
    }

    #[cfg(unix)]
    #[test]
    fn command_flavor_feeds_prompt_on_stdin() {
        let reply = model(&["cat"]).complete(&request("ping")).expect("reply");
        assert_eq!(reply, AgentReply::Text("You are terse.\n\nping".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn placeholder_moves_prompt_into_argv() {
        let mut req = request("ping");
        req.instructions.clear();
        let reply = model(&["echo", "got:{prompt}"]).complete(&req).expect("reply");
        assert_eq!(reply, AgentReply::Text("got:ping".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_carries_stderr() {
        let err = model(&["sh", "-c", "echo rate limited >&2; exit 2"])
            .complete(&request("x"))
            .unwrap_err();
        let AgentError::Execution(message) = err else {
            panic!("expected execution error");
        };
        assert!(message.contains("exited with code 2"));
        assert!(message.contains("rate limited"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_is_an_execution_error() {
        let model = CliChatModel::new(
            CliFlavor::Command {
                argv: vec!["sleep".to_string(), "5".to_string()],
            },
            Duration::from_millis(200),
        );
        let err = model.complete(&request("x")).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
