//! Side-effecting helpers: processes, configuration files and prompts.

pub mod command_executor;
pub mod commands_config;
pub mod config;
pub mod mcp_config;
pub mod process;
pub mod prompt;
