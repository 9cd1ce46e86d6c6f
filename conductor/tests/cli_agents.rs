//! CLI tests for the welcome banner and the single-prompt agent commands.
//!
//! Agents run through the `command` provider with `cat`, so replies echo the
//! composed prompt back.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use conductor::exit_codes;

fn conductor(config_home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_conductor"));
    cmd.env("CONDUCTOR_CONFIG_HOME", config_home)
        .env_remove("RUST_LOG")
        .env_remove("CONDUCTOR_PROVIDER")
        .env_remove("CONDUCTOR_MODEL")
        .env_remove("CONDUCTOR_AGENT_COMMAND")
        .env_remove("OPENAI_API_KEY");
    cmd
}

fn write_config(config_home: &Path, contents: &str) {
    let dir = config_home.join("conductor");
    fs::create_dir_all(&dir).expect("config dir");
    fs::write(dir.join("config.toml"), contents).expect("write config");
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn no_arguments_prints_welcome() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = conductor(temp.path()).output().expect("conductor");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).starts_with("Welcome to Conductor!"));
}

#[test]
fn missing_api_key_exits_with_config_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = conductor(temp.path())
        .args(["agent", "hello"])
        .output()
        .expect("conductor agent");

    assert_eq!(output.status.code(), Some(exit_codes::CONFIG));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "{stderr}");
}

#[test]
fn invalid_config_file_exits_with_config_code() {
    let temp = tempfile::tempdir().expect("tempdir");
    write_config(temp.path(), "[agent]\ntimeout_secs = 0\n");

    let output = conductor(temp.path())
        .args(["agent", "hello"])
        .output()
        .expect("conductor agent");

    assert_eq!(output.status.code(), Some(exit_codes::CONFIG));
}

#[cfg(unix)]
#[test]
fn agent_prints_reply_from_command_provider() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = conductor(temp.path())
        .env("CONDUCTOR_PROVIDER", "command")
        .env("CONDUCTOR_AGENT_COMMAND", "cat")
        .args(["agent", "rename the helper"])
        .output()
        .expect("conductor agent");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(stdout(&output).trim_end().ends_with("rename the helper"));
}

#[cfg(unix)]
#[test]
fn repo_agent_mentions_project_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = tempfile::tempdir().expect("project");
    write_config(temp.path(), "[mcp]\nlsp_walker_command = \"\"\n");

    let output = conductor(temp.path())
        .env("CONDUCTOR_PROVIDER", "command")
        .env("CONDUCTOR_AGENT_COMMAND", "cat")
        .args(["repo-agent", "where is main?", "--path"])
        .arg(project.path())
        .output()
        .expect("conductor repo-agent");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let reply = stdout(&output);
    let canonical = project.path().canonicalize().expect("canonicalize");
    assert!(reply.contains(&canonical.display().to_string()), "{reply}");
    assert!(reply.trim_end().ends_with("where is main?"));
}

#[cfg(unix)]
#[test]
fn lsp_agent_works_inside_project() {
    let temp = tempfile::tempdir().expect("tempdir");
    let project = tempfile::tempdir().expect("project");
    write_config(
        temp.path(),
        "[agent]\nprovider = \"command\"\ncommand = [\"sh\", \"-c\", \"pwd; cat\"]\n\n\
         [mcp]\nlsp_walker_command = \"lsp-walker\"\n",
    );

    let output = conductor(temp.path())
        .args(["lsp-agent", "extract a helper", "--path"])
        .arg(project.path())
        .output()
        .expect("conductor lsp-agent");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let reply = stdout(&output);
    let canonical = project.path().canonicalize().expect("canonicalize");
    assert!(reply.starts_with(&canonical.display().to_string()), "{reply}");
    assert!(reply.contains("language-server walker"), "{reply}");
    assert!(reply.trim_end().ends_with("extract a helper"));
}

#[test]
fn repo_agent_rejects_missing_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = conductor(temp.path())
        .args(["repo-agent", "q", "--path"])
        .arg(temp.path().join("nope"))
        .output()
        .expect("conductor repo-agent");

    assert!(!output.status.success());
}
