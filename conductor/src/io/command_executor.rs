//! Executes resolved commands and records their results.
//!
//! The [`CommandRunner`] trait decouples workflows from real process
//! execution. Tests use scripted runners that return predetermined
//! [`CommandResult`]s without spawning anything.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::core::command::CommandArgv;
use crate::core::registry::CommandRegistry;
use crate::core::result::CommandResult;
use crate::error::{CommandError, CommandExecutionError};
use crate::io::process::{DEFAULT_OUTPUT_LIMIT_BYTES, run_process};

/// Abstraction over command execution backends.
pub trait CommandRunner {
    /// Run the first invocation `spec` resolves to.
    fn run(&self, spec: &str, timeout: Option<Duration>) -> Result<CommandResult, CommandError>;

    /// Run every invocation `spec` resolves to, in order, regardless of
    /// earlier exit codes.
    fn run_all(
        &self,
        spec: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<CommandResult>, CommandError>;
}

/// Runs commands directly (no shell) with a fixed working directory and
/// environment.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    registry: CommandRegistry,
    cwd: Option<PathBuf>,
    env: Option<BTreeMap<String, String>>,
    output_limit_bytes: usize,
}

impl CommandExecutor {
    pub fn new(registry: CommandRegistry) -> Self {
        Self {
            registry,
            cwd: None,
            env: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Replace the child environment entirely. Without this the parent
    /// environment is inherited.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Bytes kept per output stream; the rest is replaced by a notice.
    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }

    #[instrument(skip_all, fields(command = %argv))]
    fn execute(
        &self,
        argv: &CommandArgv,
        timeout: Option<Duration>,
    ) -> Result<CommandResult, CommandExecutionError> {
        info!(
            cwd = ?self.cwd,
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
            "running command"
        );

        let mut cmd = Command::new(argv.program());
        cmd.args(argv.args());
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        if let Some(env) = &self.env {
            cmd.env_clear().envs(env);
        }

        let output = run_process(cmd, None, timeout, self.output_limit_bytes).map_err(|err| {
            warn!(err = %err, "failed to run command");
            CommandExecutionError::new(argv.as_slice(), err.to_string(), None)
        })?;

        if output.timed_out {
            return Err(CommandExecutionError::new(
                argv.as_slice(),
                format!("command timed out after {:.2}s", output.elapsed.as_secs_f64()),
                Some(output.stderr_lossy()),
            ));
        }

        let result = CommandResult {
            command: argv.as_slice().to_vec(),
            returncode: output.exit_code(),
            stdout: output.stdout_lossy() + &output.stdout_truncated_notice(),
            stderr: output.stderr_lossy() + &output.stderr_truncated_notice(),
            duration: output.elapsed,
        };
        info!(
            returncode = result.returncode,
            duration_ms = result.duration.as_millis() as u64,
            "command finished"
        );
        Ok(result)
    }
}

impl CommandRunner for CommandExecutor {
    fn run(&self, spec: &str, timeout: Option<Duration>) -> Result<CommandResult, CommandError> {
        let argv = self.registry.resolve(spec)?;
        Ok(self.execute(&argv, timeout)?)
    }

    fn run_all(
        &self,
        spec: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<CommandResult>, CommandError> {
        let sequence = self.registry.resolve_all(spec)?;
        let mut results = Vec::with_capacity(sequence.len());
        for argv in &sequence {
            results.push(self.execute(argv, timeout)?);
        }
        Ok(results)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::command::CommandStep;
    use crate::error::RegistryError;

    fn executor_with(
        alias: &str,
        input: impl Into<crate::core::command::CommandInput>,
    ) -> CommandExecutor {
        let mut registry = CommandRegistry::empty();
        registry.register(alias, input).expect("register");
        CommandExecutor::new(registry)
    }

    #[test]
    fn runs_registered_alias() {
        let executor = executor_with("echo", vec!["sh", "-c", "echo hello"]);
        let result = executor.run("echo", None).expect("run");
        assert!(result.succeeded());
        assert!(result.stdout.contains("hello"));
        assert_eq!(result.command, vec!["sh", "-c", "echo hello"]);
    }

    #[test]
    fn nonzero_exit_is_a_result() {
        let executor = CommandExecutor::new(CommandRegistry::empty());
        let result = executor
            .run("sh -c 'echo nope >&2; exit 4'", None)
            .expect("run");
        assert_eq!(result.returncode, 4);
        assert!(!result.succeeded());
        assert_eq!(result.stderr.trim(), "nope");
    }

    #[test]
    fn missing_program_is_an_execution_error() {
        let executor = CommandExecutor::new(CommandRegistry::empty());
        let err = executor.run("definitely-not-a-real-program-xyz --flag", None).unwrap_err();
        match err {
            CommandError::Execution(err) => {
                assert_eq!(err.argv, vec!["definitely-not-a-real-program-xyz", "--flag"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn timeout_is_an_execution_error_with_stderr() {
        let executor = CommandExecutor::new(CommandRegistry::empty());
        let err = executor
            .run(
                "sh -c 'echo warming up >&2; exec sleep 5'",
                Some(Duration::from_millis(200)),
            )
            .unwrap_err();
        let CommandError::Execution(err) = err else {
            panic!("expected execution error");
        };
        assert!(err.message.contains("timed out"));
        assert_eq!(err.stderr.as_deref().map(str::trim), Some("warming up"));
    }

    #[test]
    fn timeout_kills_commands_that_fork() {
        let executor = CommandExecutor::new(CommandRegistry::empty());
        let started = std::time::Instant::now();
        let err = executor
            .run("sh -c 'sleep 4; echo done'", Some(Duration::from_millis(300)))
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
        let CommandError::Execution(err) = err else {
            panic!("expected execution error");
        };
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn large_output_is_truncated_with_notice() {
        let executor = CommandExecutor::new(CommandRegistry::empty()).with_output_limit(5);
        let result = executor.run("sh -c 'echo 0123456789'", None).expect("run");
        assert_eq!(result.stdout, "01234\n[stdout truncated 6 bytes]\n");
        assert_eq!(result.stderr, "");
    }

    #[test]
    fn empty_spec_is_a_registry_error() {
        let executor = CommandExecutor::new(CommandRegistry::new());
        let err = executor.run("", None).unwrap_err();
        assert!(matches!(
            err,
            CommandError::Registry(RegistryError::EmptySpecification)
        ));
    }

    #[test]
    fn run_all_does_not_short_circuit() {
        let executor = executor_with(
            "quality",
            vec![CommandStep::from("sh -c 'exit 1'"), CommandStep::from("sh -c 'echo second'")],
        );
        let results = executor.run_all("quality", None).expect("run all");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].returncode, 1);
        assert!(results[1].succeeded());
        assert_eq!(results[1].stdout.trim(), "second");

        let first_only = executor.run("quality", None).expect("run");
        assert_eq!(first_only.returncode, 1);
    }

    #[test]
    fn uses_working_directory_and_env() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write");
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "hi".to_string());
        env.insert(
            "PATH".to_string(),
            std::env::var("PATH").unwrap_or_default(),
        );
        let executor = CommandExecutor::new(CommandRegistry::empty())
            .with_cwd(temp.path())
            .with_env(env);
        let result = executor
            .run("sh -c 'cat marker.txt; echo \" $GREETING\"'", None)
            .expect("run");
        assert_eq!(result.stdout.trim(), "here hi");
    }
}
