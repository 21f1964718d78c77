//! Deterministic, pure checks run by the gate.
//!
//! Core modules must be free of I/O side effects. Each check takes in-memory
//! documents and returns either success or its first violation.

pub mod review_integrity;
pub mod schema;
pub mod transitions;
pub mod types;
pub mod worktree;
