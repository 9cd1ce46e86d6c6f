//! Five-step test-driven development chain.
//!
//! Explore the codebase, have an agent write tests, run them expecting
//! failure, have an agent implement the feature, then run the tests again
//! expecting success. Test outcomes are annotated, never fatal.

use std::path::PathBuf;
use std::time::Duration;

use crate::agent::{AgentRunner, ExplorationRunner};
use crate::core::result::CommandResult;
use crate::error::WorkflowError;
use crate::io::command_executor::CommandRunner;

use super::{Step, StepInput, Workflow, WorkflowRun, append_context};

pub const WORKFLOW_NAME: &str = "TDD Workflow";
pub const EXPLORE_STEP: &str = "Explore codebase";
pub const DESIGN_TESTS_STEP: &str = "Design tests";
pub const INITIAL_TEST_RUN_STEP: &str = "Execute tests (expect failure)";
pub const IMPLEMENT_STEP: &str = "Implement feature";
pub const FINAL_TEST_RUN_STEP: &str = "Execute tests (expect success)";

pub const EXPECTATION_MET: &str = "Tests behaved as expected.";
pub const EXPECTATION_MISSED: &str = "Test outcome did not match the expectation.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TddWorkflowConfig {
    pub exploration_prompt: String,
    pub test_prompt: String,
    pub implementation_prompt: String,
    /// Alias or literal command line.
    pub test_command: String,
    pub project_path: Option<PathBuf>,
    pub test_timeout: Option<Duration>,
}

/// Collaborators for one TDD run.
pub struct TddRunners<'a> {
    pub commands: &'a dyn CommandRunner,
    pub explorer: &'a dyn ExplorationRunner,
    pub test_writer: &'a dyn AgentRunner,
    /// Falls back to `test_writer` when absent.
    pub implementer: Option<&'a dyn AgentRunner>,
}

struct TddState<'a> {
    config: &'a TddWorkflowConfig,
    commands: &'a dyn CommandRunner,
    explorer: &'a dyn ExplorationRunner,
    test_writer: &'a dyn AgentRunner,
    implementer: &'a dyn AgentRunner,
    test_results: Vec<CommandResult>,
}

/// A TDD chain bound to its configuration and runners.
pub struct TddWorkflow<'a> {
    workflow: Workflow<TddState<'a>>,
    state: TddState<'a>,
}

impl TddWorkflow<'_> {
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

pub fn create_tdd_workflow<'a>(
    config: &'a TddWorkflowConfig,
    runners: TddRunners<'a>,
) -> TddWorkflow<'a> {
    let state = TddState {
        config,
        commands: runners.commands,
        explorer: runners.explorer,
        test_writer: runners.test_writer,
        implementer: runners.implementer.unwrap_or(runners.test_writer),
        test_results: Vec::new(),
    };
    let workflow = Workflow::new(
        WORKFLOW_NAME,
        "Run exploration, tests, and implementation in a TDD loop.",
        vec![
            Step::new(EXPLORE_STEP, explore),
            Step::new(DESIGN_TESTS_STEP, design_tests),
            Step::new(INITIAL_TEST_RUN_STEP, initial_test_run),
            Step::new(IMPLEMENT_STEP, implement_feature),
            Step::new(FINAL_TEST_RUN_STEP, final_test_run),
        ],
    );
    TddWorkflow { workflow, state }
}

fn explore(state: &mut TddState<'_>, _input: &StepInput<'_>) -> Result<String, WorkflowError> {
    state
        .explorer
        .explore(&state.config.exploration_prompt, state.config.project_path.as_deref())
        .map_err(|source| WorkflowError::Agent {
            step: EXPLORE_STEP,
            source,
        })
}

fn design_tests(state: &mut TddState<'_>, input: &StepInput<'_>) -> Result<String, WorkflowError> {
    let prompt = append_context(
        &state.config.test_prompt,
        "Context from exploration:",
        input.step_content(EXPLORE_STEP),
    );
    state
        .test_writer
        .run(&prompt)
        .map_err(|source| WorkflowError::Agent {
            step: DESIGN_TESTS_STEP,
            source,
        })
}

fn initial_test_run(
    state: &mut TddState<'_>,
    _input: &StepInput<'_>,
) -> Result<String, WorkflowError> {
    run_tests(state, INITIAL_TEST_RUN_STEP, false)
}

fn implement_feature(
    state: &mut TddState<'_>,
    input: &StepInput<'_>,
) -> Result<String, WorkflowError> {
    let mut prompt = append_context(
        &state.config.implementation_prompt,
        "Context from exploration:",
        input.step_content(EXPLORE_STEP),
    );
    prompt = append_context(&prompt, "Tests to satisfy:", input.step_content(DESIGN_TESTS_STEP));
    if let Some(latest) = state.test_results.last() {
        prompt = append_context(
            &prompt,
            "Latest test run (expected failure):",
            Some(&latest.to_prompt_block()),
        );
    }
    state
        .implementer
        .run(&prompt)
        .map_err(|source| WorkflowError::Agent {
            step: IMPLEMENT_STEP,
            source,
        })
}

fn final_test_run(
    state: &mut TddState<'_>,
    _input: &StepInput<'_>,
) -> Result<String, WorkflowError> {
    run_tests(state, FINAL_TEST_RUN_STEP, true)
}

fn run_tests(
    state: &mut TddState<'_>,
    step: &'static str,
    expect_success: bool,
) -> Result<String, WorkflowError> {
    let result = state
        .commands
        .run(&state.config.test_command, state.config.test_timeout)
        .map_err(|source| WorkflowError::Command { step, source })?;
    let summary = test_summary(&result, expect_success);
    state.test_results.push(result);
    Ok(summary)
}

/// Verbose result followed by a line saying whether the outcome matched.
pub fn test_summary(result: &CommandResult, expect_success: bool) -> String {
    let status = if result.succeeded() == expect_success {
        EXPECTATION_MET
    } else {
        EXPECTATION_MISSED
    };
    format!("{}\n\n{status}", result.format())
}
