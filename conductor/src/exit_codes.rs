//! Stable exit codes for the conductor CLI.

/// Command succeeded.
pub const OK: i32 = 0;
/// An agent, command or workflow failed.
pub const FAILED: i32 = 1;
/// Configuration is missing or invalid (credentials, config files, arguments).
pub const CONFIG: i32 = 2;
