//! Deterministic command handling shared by the executor and workflows.
//!
//! Core modules perform no I/O. They turn registrations and specifications
//! into argument vectors and describe finished commands.

pub mod command;
pub mod registry;
pub mod result;
