//! CLI tests for the `tdd` and `lint` workflows.
//!
//! Commands run for real inside a temp project. The agent is `cat`, so each
//! agent step's content is the prompt it was given.

#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use conductor::exit_codes;
use conductor::workflow::WorkflowRun;
use conductor::workflow::linter::{LINT_STEP, PROPOSE_FIXES_STEP};
use conductor::workflow::tdd::{
    EXPECTATION_MET, EXPECTATION_MISSED, FINAL_TEST_RUN_STEP, INITIAL_TEST_RUN_STEP,
};

fn conductor(config_home: &Path) -> Command {
    let dir = config_home.join("conductor");
    fs::create_dir_all(&dir).expect("config dir");
    fs::write(dir.join("config.toml"), "[mcp]\nlsp_walker_command = \"\"\n").expect("write config");

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_conductor"));
    cmd.env("CONDUCTOR_CONFIG_HOME", config_home)
        .env("CONDUCTOR_PROVIDER", "command")
        .env("CONDUCTOR_AGENT_COMMAND", "cat")
        .env_remove("RUST_LOG");
    cmd
}

fn parse_run(output: &Output) -> WorkflowRun {
    serde_json::from_slice(&output.stdout).expect("workflow run json")
}

#[test]
fn tdd_json_records_every_step() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let project = tempfile::tempdir().expect("project");

    let output = conductor(config_home.path())
        .args(["tdd", "explore", "write tests", "implement", "-t", "true", "--json", "--path"])
        .arg(project.path())
        .output()
        .expect("conductor tdd");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let run = parse_run(&output);
    assert_eq!(run.steps.len(), 5);
    let initial = run.step_content(INITIAL_TEST_RUN_STEP).expect("initial");
    assert!(initial.ends_with(EXPECTATION_MISSED));
    assert!(run.step_content(FINAL_TEST_RUN_STEP).expect("final").ends_with(EXPECTATION_MET));
}

#[test]
fn tdd_uses_aliases_from_commands_file() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let project = tempfile::tempdir().expect("project");
    let commands = project.path().join("commands.toml");
    fs::write(&commands, "[tests]\nsuite = \"sh -c 'echo suite ran'\"\n").expect("write commands");

    let output = conductor(config_home.path())
        .args(["tdd", "explore", "write tests", "implement", "-t", "suite", "--json", "--commands"])
        .arg(&commands)
        .output()
        .expect("conductor tdd");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let run = parse_run(&output);
    assert!(run.step_content(FINAL_TEST_RUN_STEP).expect("final").contains("suite ran"));
}

#[test]
fn lint_prints_step_sections() {
    let config_home = tempfile::tempdir().expect("tempdir");
    let project = tempfile::tempdir().expect("project");
    fs::write(project.path().join("a b.py"), "import os\n").expect("write target");

    let output = conductor(config_home.path())
        .args(["lint", "ls", "a b.py", "--fix-instructions", "Tidy up.", "--path"])
        .arg(project.path())
        .output()
        .expect("conductor lint");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&format!(" {LINT_STEP} ")));
    assert!(stdout.contains(&format!(" {PROPOSE_FIXES_STEP} ")));
    assert!(stdout.contains("Command: ls 'a b.py'"));
    assert!(stdout.contains("(No issues detected)"));
    assert!(stdout.contains("Tidy up."));
    assert!(!stdout.contains("Workflow summary"));
}

#[test]
fn lint_with_missing_program_fails() {
    let config_home = tempfile::tempdir().expect("tempdir");

    let output = conductor(config_home.path())
        .args(["lint", "conductor-no-such-linter", "src"])
        .output()
        .expect("conductor lint");

    assert_eq!(output.status.code(), Some(exit_codes::FAILED));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("conductor-no-such-linter"), "{stderr}");
}
