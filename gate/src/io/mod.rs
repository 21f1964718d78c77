//! I/O helpers for the gate: documents on disk, config, the status command,
//! and the hook wire format.

pub mod config;
pub mod documents;
pub mod git;
pub mod hook;
pub mod layout;
pub mod marker;
pub mod process;
