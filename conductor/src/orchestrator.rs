//! Entry points used by the CLI.
//!
//! Each function builds the agents and command executor a task needs from
//! [`AppConfig`], runs it, and returns plain values. Agent construction
//! happens before any step runs, so missing credentials fail fast.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::agent::{AgentRunner, coding_agent, coding_agent_with_walker, repository_qa_agent};
use crate::error::{AgentError, ConfigError};
use crate::io::command_executor::CommandExecutor;
use crate::io::commands_config::{CommandCategory, WorkflowCommandConfig};
use crate::io::config::AppConfig;
use crate::workflow::WorkflowRun;
use crate::workflow::linter::{LinterWorkflowConfig, create_linter_workflow};
use crate::workflow::tdd::{TddRunners, TddWorkflowConfig, create_tdd_workflow};

/// Ask the coding agent a single question.
#[instrument(skip_all)]
pub fn run_coding_agent(config: &AppConfig, prompt: &str) -> Result<String, AgentError> {
    coding_agent(config)?.run(prompt)
}

/// Ask the coding agent, with the LSP walker attached, to work on
/// `project_path`.
#[instrument(skip_all, fields(project = ?project_path))]
pub fn run_walker_coding_agent(
    config: &AppConfig,
    prompt: &str,
    project_path: Option<&Path>,
) -> Result<String, AgentError> {
    coding_agent_with_walker(config, project_path)?.run(prompt)
}

/// Ask the repository agent a question about `project_path`.
#[instrument(skip_all, fields(project = ?project_path))]
pub fn run_repository_qa_agent(
    config: &AppConfig,
    prompt: &str,
    project_path: Option<&Path>,
) -> Result<String, AgentError> {
    repository_qa_agent(config, project_path)?.run(prompt)
}

/// Command aliases from the app config, overlaid with an optional standalone
/// commands file.
pub fn workflow_commands(
    config: &AppConfig,
    commands_file: Option<&Path>,
) -> Result<WorkflowCommandConfig> {
    let base = WorkflowCommandConfig::from_table(&config.commands)
        .context("load [commands] from config")?;
    match commands_file {
        Some(path) => {
            let extra = WorkflowCommandConfig::load(path)
                .with_context(|| format!("load commands file {}", path.display()))?;
            Ok(base.merged_with(extra))
        }
        None => Ok(base),
    }
}

/// Run the TDD chain with a repository agent for exploration and the coding
/// agent for tests and implementation.
#[instrument(skip_all, fields(test_command = %workflow.test_command))]
pub fn run_tdd_workflow(
    config: &AppConfig,
    workflow: &TddWorkflowConfig,
    commands: &WorkflowCommandConfig,
) -> Result<WorkflowRun> {
    let explorer = repository_qa_agent(config, workflow.project_path.as_deref())
        .context("build exploration agent")?;
    let coder = coding_agent(config).context("build coding agent")?;
    let executor = executor_for(commands, CommandCategory::Tests, workflow.project_path.as_deref());

    let chain = create_tdd_workflow(
        workflow,
        TddRunners {
            commands: &executor,
            explorer: &explorer,
            test_writer: &coder,
            implementer: None,
        },
    );
    info!(
        workflow = chain.name(),
        description = chain.description(),
        steps = ?chain.step_names(),
        "running workflow"
    );
    chain.run().context("TDD workflow failed")
}

/// Run the lint chain with the coding agent proposing fixes.
#[instrument(skip_all, fields(linter = %workflow.linter_command, targets = workflow.targets.len()))]
pub fn run_linter_workflow(
    config: &AppConfig,
    workflow: &LinterWorkflowConfig,
    commands: &WorkflowCommandConfig,
) -> Result<WorkflowRun> {
    let fixer = coding_agent(config).context("build coding agent")?;
    let executor = executor_for(commands, CommandCategory::Lint, workflow.project_path.as_deref());

    let chain = create_linter_workflow(workflow, &executor, &fixer);
    info!(
        workflow = chain.name(),
        description = chain.description(),
        steps = ?chain.step_names(),
        "running workflow"
    );
    chain.run().context("linter workflow failed")
}

fn executor_for(
    commands: &WorkflowCommandConfig,
    category: CommandCategory,
    project_path: Option<&Path>,
) -> CommandExecutor {
    let executor = CommandExecutor::new(commands.registry_for(category));
    match project_path {
        Some(path) => executor.with_cwd(path),
        None => executor,
    }
}

/// Timeout flag value in seconds; zero means no limit.
pub fn timeout_from_secs(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|secs| *secs > 0).map(Duration::from_secs)
}

/// Whether `err` stems from missing or invalid configuration rather than a
/// failed run.
pub fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.downcast_ref::<ConfigError>().is_some()
            || matches!(cause.downcast_ref::<AgentError>(), Some(AgentError::Configuration(_)))
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::agent::Provider;
    use crate::workflow::linter::{LINT_STEP, PROPOSE_FIXES_STEP};
    use crate::workflow::tdd::{EXPECTATION_MET, FINAL_TEST_RUN_STEP};
    use std::fs;

    fn cat_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.agent.provider = Provider::Command;
        config.agent.command = vec!["cat".to_string()];
        config.mcp.lsp_walker_command = String::new();
        config
    }

    #[test]
    fn coding_agent_echoes_through_cat() {
        let reply = run_coding_agent(&cat_config(), "add a flag").expect("reply");
        assert!(reply.ends_with("add a flag"));
        assert!(reply.contains("Conductor Agent"));
    }

    #[test]
    fn walker_coding_agent_runs_in_project() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut config = cat_config();
        config.agent.command = vec!["sh".to_string(), "-c".to_string(), "pwd; cat".to_string()];

        let reply =
            run_walker_coding_agent(&config, "rename it", Some(temp.path())).expect("reply");
        let project = temp.path().canonicalize().expect("canonicalize");
        assert!(reply.starts_with(&project.display().to_string()), "{reply}");
        assert!(reply.ends_with("rename it"));
    }

    #[test]
    fn tdd_runs_against_project_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("marker"), "").expect("write");
        let mut config = cat_config();
        config.commands = toml::from_str("[tests]\ncheck = \"test -f marker\"\n").expect("toml");

        let workflow = TddWorkflowConfig {
            exploration_prompt: "look around".to_string(),
            test_prompt: "write tests".to_string(),
            implementation_prompt: "implement".to_string(),
            test_command: "check".to_string(),
            project_path: Some(temp.path().to_path_buf()),
            test_timeout: Some(Duration::from_secs(30)),
        };
        let commands = workflow_commands(&config, None).expect("commands");
        let run = run_tdd_workflow(&config, &workflow, &commands).expect("run");

        assert_eq!(run.steps.len(), 5);
        assert!(run.step_content(FINAL_TEST_RUN_STEP).expect("final").ends_with(EXPECTATION_MET));
    }

    #[test]
    fn linter_reports_issues_and_forwards_summary() {
        let config = cat_config();
        let workflow = LinterWorkflowConfig {
            linter_command: "sh -c 'echo \"E501 line too long\"; exit 1'".to_string(),
            targets: Vec::new(),
            project_path: None,
            fix_instructions: Some("Fix it.".to_string()),
            lint_timeout: None,
        };
        let run = run_linter_workflow(&config, &workflow, &WorkflowCommandConfig::default())
            .expect("run");

        assert!(run.step_content(LINT_STEP).expect("lint").contains("Exit code: 1 (Issues found)"));
        let fixes = run.step_content(PROPOSE_FIXES_STEP).expect("fixes");
        assert!(fixes.contains("Fix it."));
        assert!(fixes.contains("E501 line too long"));
    }

    #[test]
    fn commands_file_overrides_config_aliases() {
        let temp = tempfile::tempdir().expect("tempdir");
        let file = temp.path().join("commands.toml");
        fs::write(&file, "[lint]\nruff = \"ruff check --fix\"\n").expect("write");
        let mut config = cat_config();
        config.commands = toml::from_str("[lint]\nruff = \"ruff check\"\n").expect("toml");

        let commands = workflow_commands(&config, Some(&file)).expect("commands");
        assert_eq!(commands.lint["ruff"].first().as_slice(), ["ruff", "check", "--fix"]);
    }

    #[test]
    fn missing_credentials_are_configuration_errors() {
        let workflow = LinterWorkflowConfig {
            linter_command: "true".to_string(),
            targets: Vec::new(),
            project_path: None,
            fix_instructions: None,
            lint_timeout: None,
        };
        let err = run_linter_workflow(
            &AppConfig::default(),
            &workflow,
            &WorkflowCommandConfig::default(),
        )
        .unwrap_err();
        assert!(is_configuration_error(&err));

        let failed = anyhow::Error::new(AgentError::Execution("boom".to_string()));
        assert!(!is_configuration_error(&failed));
    }

    #[test]
    fn zero_timeout_means_unlimited() {
        assert_eq!(timeout_from_secs(Some(0)), None);
        assert_eq!(timeout_from_secs(Some(5)), Some(Duration::from_secs(5)));
        assert_eq!(timeout_from_secs(None), None);
    }
}
