//! Test-only fakes for command runners and agents.
//!
//! Both fakes record every call so tests can assert on the exact specs and
//! prompts a workflow produced.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agent::{AgentRunner, ExplorationRunner};
use crate::core::result::CommandResult;
use crate::error::{AgentError, CommandError, CommandExecutionError};
use crate::io::command_executor::CommandRunner;

/// Build a result without running anything.
pub fn command_result(
    command: &[&str],
    returncode: i32,
    stdout: &str,
    stderr: &str,
) -> CommandResult {
    CommandResult {
        command: command.iter().map(|part| (*part).to_string()).collect(),
        returncode,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        duration: Duration::from_millis(250),
    }
}

/// Returns queued results in order and records each requested command.
///
/// An exhausted queue yields an execution error naming the command.
#[derive(Default)]
pub struct ScriptedCommandRunner {
    results: RefCell<VecDeque<CommandResult>>,
    calls: RefCell<Vec<(String, Option<Duration>)>>,
}

impl ScriptedCommandRunner {
    pub fn new(results: Vec<CommandResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn specs(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(spec, _)| spec.clone()).collect()
    }

    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.calls.borrow().iter().map(|(_, timeout)| *timeout).collect()
    }

    fn next(&self, spec: &str, timeout: Option<Duration>) -> Result<CommandResult, CommandError> {
        self.calls.borrow_mut().push((spec.to_string(), timeout));
        self.results.borrow_mut().pop_front().ok_or_else(|| {
            CommandError::Execution(CommandExecutionError::new(
                &[spec.to_string()],
                "no scripted result left",
                None,
            ))
        })
    }
}

impl CommandRunner for ScriptedCommandRunner {
    fn run(&self, spec: &str, timeout: Option<Duration>) -> Result<CommandResult, CommandError> {
        self.next(spec, timeout)
    }

    fn run_all(
        &self,
        spec: &str,
        timeout: Option<Duration>,
    ) -> Result<Vec<CommandResult>, CommandError> {
        self.next(spec, timeout).map(|result| vec![result])
    }
}

/// Agent fake that answers from a script, or echoes a fixed reply.
pub struct RecordingAgent {
    replies: RefCell<VecDeque<Result<String, AgentError>>>,
    fallback: String,
    prompts: RefCell<Vec<String>>,
    project_paths: RefCell<Vec<Option<PathBuf>>>,
}

impl RecordingAgent {
    /// Always answers `reply`.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), reply)
    }

    /// Answers from `replies` in order, then `fallback`.
    pub fn scripted(replies: Vec<Result<String, AgentError>>, fallback: impl Into<String>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            fallback: fallback.into(),
            prompts: RefCell::new(Vec::new()),
            project_paths: RefCell::new(Vec::new()),
        }
    }

    /// Fails every call.
    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(AgentError::Execution(message.to_string()))], String::new())
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    pub fn project_paths(&self) -> Vec<Option<PathBuf>> {
        self.project_paths.borrow().clone()
    }

    fn answer(&self, prompt: &str) -> Result<String, AgentError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

impl AgentRunner for RecordingAgent {
    fn run(&self, prompt: &str) -> Result<String, AgentError> {
        self.answer(prompt)
    }
}

impl ExplorationRunner for RecordingAgent {
    fn explore(&self, prompt: &str, project_path: Option<&Path>) -> Result<String, AgentError> {
        self.project_paths
            .borrow_mut()
            .push(project_path.map(Path::to_path_buf));
        self.answer(prompt)
    }
}
