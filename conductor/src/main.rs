//! Command-line entry point for conductor.
//!
//! Runs coding and repository agents, and the TDD and linter workflows that
//! pair agents with real test and lint commands. MCP server definitions are
//! managed in the same config file the agents read.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};

use conductor::core::command::display_argv;
use conductor::exit_codes;
use conductor::io::config::{AppConfig, EnvLookup, config_path, load_config};
use conductor::io::mcp_config::{
    McpServerEntry, dump_mcp_servers_json, load_mcp_servers, remove_mcp_server, save_mcp_server,
};
use conductor::logging;
use conductor::orchestrator::{
    is_configuration_error, run_coding_agent, run_linter_workflow, run_repository_qa_agent,
    run_tdd_workflow, run_walker_coding_agent, timeout_from_secs, workflow_commands,
};
use conductor::workflow::WorkflowRun;
use conductor::workflow::linter::LinterWorkflowConfig;
use conductor::workflow::tdd::TddWorkflowConfig;

const WELCOME_MESSAGE: &str = "Welcome to Conductor!";
const WELCOME_HINT: &str = "Run `conductor --help` to see the available commands.";
const CONFIG_HINT: &str = "Check the agent settings: set the provider's API key \
(e.g. OPENAI_API_KEY), or pick another provider with CONDUCTOR_PROVIDER.";
const RULE_WIDTH: usize = 80;

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Agent-driven coding workflows with real test and lint commands"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the welcome message.
    Welcome,
    /// Send a prompt to the coding agent.
    Agent {
        /// Prompt to send to the coding agent.
        prompt: String,
    },
    /// Send a prompt to the coding agent with the LSP walker attached.
    LspAgent {
        /// Prompt to send to the coding agent.
        prompt: String,
        /// Project directory the agent works in (default: current directory).
        #[arg(short = 'p', long = "path", value_parser = existing_dir)]
        path: Option<PathBuf>,
    },
    /// Ask the repository agent a question about a project.
    RepoAgent {
        /// Prompt to send to the repository agent.
        prompt: String,
        /// Project directory to explore (default: current directory).
        #[arg(short = 'p', long = "path", value_parser = existing_dir)]
        path: Option<PathBuf>,
    },
    /// Run the TDD workflow: explore, write tests, run, implement, run again.
    Tdd(TddArgs),
    /// Run a linter and ask the coding agent to propose fixes.
    Lint(LintArgs),
    /// Manage MCP server definitions.
    #[command(subcommand)]
    Mcp(McpCommand),
}

#[derive(Args)]
struct TddArgs {
    /// Prompt that drives the initial code exploration.
    exploration_prompt: String,
    /// Prompt for the agent that designs tests.
    test_prompt: String,
    /// Prompt for implementing production code.
    implementation_prompt: String,
    /// Test command alias (e.g. `pytest`) or a full command line.
    #[arg(short = 't', long, default_value = "pytest")]
    test_command: String,
    #[command(flatten)]
    common: WorkflowArgs,
}

#[derive(Args)]
struct LintArgs {
    /// Linter command or alias (e.g. `ruff check`).
    linter_command: String,
    /// Files or directories to lint.
    #[arg(required = true)]
    targets: Vec<String>,
    /// Instructions for the agent that replace the default fix request.
    #[arg(long)]
    fix_instructions: Option<String>,
    #[command(flatten)]
    common: WorkflowArgs,
}

#[derive(Args)]
struct WorkflowArgs {
    /// Project directory the workflow operates in.
    #[arg(short = 'p', long = "path", value_parser = existing_dir)]
    path: Option<PathBuf>,
    /// Extra TOML file with `[tests]` and `[lint]` command aliases.
    #[arg(long)]
    commands: Option<PathBuf>,
    /// Per-command timeout in seconds (0 disables it).
    #[arg(long)]
    timeout: Option<u64>,
    /// Print the run record as JSON instead of step sections.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum McpCommand {
    /// List configured servers.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Print one server as JSON.
    Get { name: String },
    /// Add or replace a server.
    Add {
        name: String,
        /// Program that starts the server.
        command: String,
        /// Arguments passed to the program.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
        /// Environment variable for the server, as KEY=VALUE.
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,
        /// Seconds to wait for the server to start.
        #[arg(long)]
        startup_timeout: Option<f64>,
        /// Seconds to wait for a tool call.
        #[arg(long)]
        tool_timeout: Option<f64>,
    },
    /// Remove a server.
    Remove { name: String },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let lookup = |key: &str| std::env::var(key).ok();
    let code = match run(cli, &lookup) {
        Ok(()) => exit_codes::OK,
        Err(err) if is_configuration_error(&err) => {
            eprintln!("error: {err:#}");
            eprintln!("{CONFIG_HINT}");
            exit_codes::CONFIG
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli, lookup: EnvLookup<'_>) -> Result<()> {
    match cli.command.unwrap_or(Command::Welcome) {
        Command::Welcome => {
            println!("{WELCOME_MESSAGE}");
            println!("{WELCOME_HINT}");
            Ok(())
        }
        Command::Agent { prompt } => {
            let config = app_config(lookup)?;
            let reply = run_coding_agent(&config, &prompt).context("coding agent failed")?;
            println!("{reply}");
            Ok(())
        }
        Command::LspAgent { prompt, path } => {
            let config = app_config(lookup)?;
            let reply = run_walker_coding_agent(&config, &prompt, path.as_deref())
                .context("coding agent failed")?;
            println!("{reply}");
            Ok(())
        }
        Command::RepoAgent { prompt, path } => {
            let config = app_config(lookup)?;
            let reply = run_repository_qa_agent(&config, &prompt, path.as_deref())
                .context("repository agent failed")?;
            println!("{reply}");
            Ok(())
        }
        Command::Tdd(args) => cmd_tdd(args, lookup),
        Command::Lint(args) => cmd_lint(args, lookup),
        Command::Mcp(command) => cmd_mcp(command, lookup),
    }
}

fn app_config(lookup: EnvLookup<'_>) -> Result<AppConfig> {
    let path = config_path(lookup)?;
    load_config(&path, lookup).with_context(|| format!("load config {}", path.display()))
}

fn cmd_tdd(args: TddArgs, lookup: EnvLookup<'_>) -> Result<()> {
    let config = app_config(lookup)?;
    let commands = workflow_commands(&config, args.common.commands.as_deref())?;
    let workflow = TddWorkflowConfig {
        exploration_prompt: args.exploration_prompt,
        test_prompt: args.test_prompt,
        implementation_prompt: args.implementation_prompt,
        test_command: args.test_command,
        project_path: args.common.path,
        test_timeout: timeout_from_secs(args.common.timeout),
    };
    let run = run_tdd_workflow(&config, &workflow, &commands)?;
    print_run(&run, args.common.json)
}

fn cmd_lint(args: LintArgs, lookup: EnvLookup<'_>) -> Result<()> {
    let config = app_config(lookup)?;
    let commands = workflow_commands(&config, args.common.commands.as_deref())?;
    let workflow = LinterWorkflowConfig {
        linter_command: args.linter_command,
        targets: args.targets,
        project_path: args.common.path,
        fix_instructions: args.fix_instructions,
        lint_timeout: timeout_from_secs(args.common.timeout),
    };
    let run = run_linter_workflow(&config, &workflow, &commands)?;
    print_run(&run, args.common.json)
}

fn cmd_mcp(command: McpCommand, lookup: EnvLookup<'_>) -> Result<()> {
    let path = config_path(lookup)?;
    match command {
        McpCommand::List { json } => {
            let servers = load_mcp_servers(&path)?;
            if json {
                println!("{}", dump_mcp_servers_json(&servers)?);
            } else if servers.is_empty() {
                println!("No MCP servers configured.");
            } else {
                for (name, entry) in &servers {
                    let mut argv = vec![entry.command.clone()];
                    argv.extend(entry.args.iter().cloned());
                    println!("{name}: {}", display_argv(&argv));
                }
            }
            Ok(())
        }
        McpCommand::Get { name } => {
            let mut servers = load_mcp_servers(&path)?;
            let entry = servers
                .remove(&name)
                .ok_or_else(|| anyhow!("no MCP server named `{name}`"))?;
            let single = BTreeMap::from([(name, entry)]);
            println!("{}", dump_mcp_servers_json(&single)?);
            Ok(())
        }
        McpCommand::Add {
            name,
            command,
            args,
            env,
            startup_timeout,
            tool_timeout,
        } => {
            let mut entry = McpServerEntry::new(command, args);
            entry.env = env.into_iter().collect();
            entry.startup_timeout_sec = startup_timeout;
            entry.tool_timeout_sec = tool_timeout;
            save_mcp_server(&path, &name, &entry)?;
            println!("Saved MCP server `{name}` to {}.", path.display());
            Ok(())
        }
        McpCommand::Remove { name } => {
            if remove_mcp_server(&path, &name)? {
                println!("Removed MCP server `{name}`.");
                Ok(())
            } else {
                Err(anyhow!("no MCP server named `{name}`"))
            }
        }
    }
}

fn print_run(run: &WorkflowRun, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(run).context("serialize workflow run")?);
        return Ok(());
    }
    for step in &run.steps {
        println!("{}", rule(&step.name));
        println!("{}", step.content);
    }
    let last = run.steps.last().map(|step| step.content.as_str());
    if let Some(content) = run.content.as_deref()
        && last != Some(content)
    {
        println!("{}", rule("Workflow summary"));
        println!("{content}");
    }
    Ok(())
}

/// Title centred in a horizontal line.
fn rule(title: &str) -> String {
    format!("{:─^width$}", format!(" {title} "), width = RULE_WIDTH)
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = Path::new(value);
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else {
        Err(format!("`{value}` is not an existing directory"))
    }
}

fn parse_env_pair(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, val)) if !key.is_empty() => Ok((key.to_string(), val.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{value}`")),
    }
}
