//! Captured outcome of one command invocation.

use std::time::Duration;

use serde::Serialize;

use super::command::display_argv;

/// Exit code, output and duration of a finished command.
///
/// A non-zero exit code is an ordinary result, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub command: Vec<String>,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.returncode == 0
    }

    pub fn command_display(&self) -> String {
        display_argv(&self.command)
    }

    /// Verbose rendering for terminal output.
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!("Command: {}", self.command_display()),
            format!("Exit code: {}", self.returncode),
            format!("Duration: {:.2}s", self.duration.as_secs_f64()),
        ];
        push_output_blocks(&mut lines, &self.stdout, &self.stderr);
        lines.join("\n")
    }

    /// Compact rendering for embedding in prompts. Omits the duration.
    pub fn to_prompt_block(&self) -> String {
        let mut lines = vec![
            format!("Command: {}", self.command_display()),
            format!("Exit code: {}", self.returncode),
        ];
        push_output_blocks(&mut lines, &self.stdout, &self.stderr);
        lines.join("\n")
    }
}

fn push_output_blocks(lines: &mut Vec<String>, stdout: &str, stderr: &str) {
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        lines.push(format!("Stdout:\n{stdout}"));
    }
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        lines.push(format!("Stderr:\n{stderr}"));
    }
}

fn serialize_secs<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
