//! Agent-driven coding workflows with real test and lint commands.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure logic for command specifications: alias registry,
//!   argument vectors and command results. No I/O.
//! - **[`io`]**: Side effects: subprocess execution, configuration files and
//!   bundled prompts.
//! - **[`agent`]**: Model providers and the runner traits workflows consume.
//! - **[`workflow`]**: The step chain and the TDD and linter workflows.
//!
//! [`orchestrator`] wires these together for the CLI.

pub mod agent;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
