//! Two-step lint chain: run a linter, then ask an agent for fixes.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentRunner;
use crate::core::result::CommandResult;
use crate::error::WorkflowError;
use crate::io::command_executor::CommandRunner;

use super::{Step, StepInput, Workflow, WorkflowRun};

pub const WORKFLOW_NAME: &str = "Linter Workflow";
pub const LINT_STEP: &str = "Run linter";
pub const PROPOSE_FIXES_STEP: &str = "Propose fixes for linter issues";

pub const DEFAULT_FIX_INSTRUCTIONS: &str = "Review the linter findings and propose precise, \
actionable code edits to resolve all issues. Provide unified diffs for each file that should be \
changed, and explain the rationale briefly.";

const SUMMARY_HEADING: &str = "\n\nLinter summary (raw output included):\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinterWorkflowConfig {
    /// Alias or literal command line; targets are appended.
    pub linter_command: String,
    pub targets: Vec<String>,
    pub project_path: Option<PathBuf>,
    /// Replaces [`DEFAULT_FIX_INSTRUCTIONS`] when non-empty.
    pub fix_instructions: Option<String>,
    pub lint_timeout: Option<Duration>,
}

impl LinterWorkflowConfig {
    /// The linter command followed by the escaped targets.
    pub fn command_spec(&self) -> String {
        if self.targets.is_empty() {
            return self.linter_command.clone();
        }
        let targets: Vec<String> = self.targets.iter().map(|t| shell_escape(t)).collect();
        format!("{} {}", self.linter_command, targets.join(" "))
    }

    fn fix_instructions(&self) -> &str {
        self.fix_instructions
            .as_deref()
            .filter(|text| !text.is_empty())
            .unwrap_or(DEFAULT_FIX_INSTRUCTIONS)
    }
}

struct LinterState<'a> {
    config: &'a LinterWorkflowConfig,
    commands: &'a dyn CommandRunner,
    fixer: &'a dyn AgentRunner,
    results: Vec<CommandResult>,
}

/// A lint chain bound to its configuration and runners.
pub struct LinterWorkflow<'a> {
    workflow: Workflow<LinterState<'a>>,
    state: LinterState<'a>,
}

impl LinterWorkflow<'_> {
    pub fn name(&self) -> &'static str {
        self.workflow.name
    }

    pub fn description(&self) -> &'static str {
        self.workflow.description
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.workflow.step_names()
    }

    pub fn run(mut self) -> Result<WorkflowRun, WorkflowError> {
        self.workflow.run(&mut self.state)
    }
}

pub fn create_linter_workflow<'a>(
    config: &'a LinterWorkflowConfig,
    commands: &'a dyn CommandRunner,
    fixer: &'a dyn AgentRunner,
) -> LinterWorkflow<'a> {
    let workflow = Workflow::new(
        WORKFLOW_NAME,
        "Run the configured linter against targets and ask a coding agent to propose fixes \
         for issues.",
        vec![
            Step::new(LINT_STEP, run_linter),
            Step::new(PROPOSE_FIXES_STEP, propose_fixes),
        ],
    );
    LinterWorkflow {
        workflow,
        state: LinterState {
            config,
            commands,
            fixer,
            results: Vec::new(),
        },
    }
}

fn run_linter(
    state: &mut LinterState<'_>,
    _input: &StepInput<'_>,
) -> Result<String, WorkflowError> {
    let result = state
        .commands
        .run(&state.config.command_spec(), state.config.lint_timeout)
        .map_err(|source| WorkflowError::Command {
            step: LINT_STEP,
            source,
        })?;
    let summary = lint_summary(&result);
    state.results.push(result);
    Ok(summary)
}

fn propose_fixes(
    state: &mut LinterState<'_>,
    input: &StepInput<'_>,
) -> Result<String, WorkflowError> {
    let prompt = format!(
        "{}{SUMMARY_HEADING}{}",
        state.config.fix_instructions(),
        input.step_content(LINT_STEP).unwrap_or_default()
    );
    state
        .fixer
        .run(&prompt)
        .map_err(|source| WorkflowError::Agent {
            step: PROPOSE_FIXES_STEP,
            source,
        })
}

/// Quote a target so shell word splitting gives it back unchanged.
///
/// Plain tokens pass through. Empty tokens become `''`. Tokens holding
/// whitespace or any of `' " $ `` ` are single-quoted, with embedded single
/// quotes written as `'\''`.
pub fn shell_escape(token: &str) -> String {
    if token.is_empty() {
        return "''".to_string();
    }
    let needs_quotes = token
        .chars()
        .any(|ch| ch.is_whitespace() || matches!(ch, '\'' | '"' | '$' | '`'));
    if needs_quotes {
        format!("'{}'", token.replace('\'', r"'\''"))
    } else {
        token.to_string()
    }
}

/// Lint result for the fix prompt. Output blocks are always present.
pub fn lint_summary(result: &CommandResult) -> String {
    let verdict = if result.returncode != 0 {
        "Issues found"
    } else {
        "No issues detected"
    };
    format!(
        "Command: {}\nExit code: {} ({verdict})\nDuration: {:.2}s\n\nStdout:\n{}\n\nStderr:\n{}",
        result.command_display(),
        result.returncode,
        result.duration.as_secs_f64(),
        result.stdout.trim(),
        result.stderr.trim(),
    )
    .trim()
    .to_string()
}
