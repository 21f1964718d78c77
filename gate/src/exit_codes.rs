//! Stable exit codes for gate CLI commands.

/// Command succeeded. `stop` always exits with this once a decision is written,
/// whether it approves or blocks.
pub const OK: i32 = 0;
/// `validate` found a violation, or a command could not complete.
pub const INVALID: i32 = 1;
