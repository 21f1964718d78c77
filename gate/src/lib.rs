//! Stop gate for an iterative, externally-driven work loop.
//!
//! The loop edits `ralph/tasks.json` between iterations and asks to stop at the
//! end of each one. This crate decides whether that stop is allowed. The
//! architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic checks (schema, review integrity,
//!   per-mode transitions, worktree policy). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (documents on disk, config, `git`,
//!   the hook wire format). Isolated so checks can run against fakes.
//!
//! [`gate`] runs the checks in order and turns the first violation into a
//! block decision.

pub mod core;
pub mod exit_codes;
pub mod gate;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
