//! Canonical paths the gate reads, relative to the working directory.

use std::path::{Path, PathBuf};

/// Directory holding the task list and gate config.
pub const RALPH_DIR: &str = "ralph";
/// Iteration marker file; its absence disables the gate.
pub const MARKER_FILE: &str = ".ralph-active";
pub const TASKS_FILE: &str = "tasks.json";
pub const CONFIG_FILE: &str = "gate.toml";

/// All paths the gate reads for a project root.
#[derive(Debug, Clone)]
pub struct GatePaths {
    pub root: PathBuf,
    pub ralph_dir: PathBuf,
    pub tasks_path: PathBuf,
    pub marker_path: PathBuf,
    pub config_path: PathBuf,
}

impl GatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let ralph_dir = root.join(RALPH_DIR);
        Self {
            root: root.clone(),
            tasks_path: ralph_dir.join(TASKS_FILE),
            config_path: ralph_dir.join(CONFIG_FILE),
            marker_path: root.join(MARKER_FILE),
            ralph_dir,
        }
    }

    /// True when the iteration marker exists as a regular file.
    pub fn gate_active(&self) -> bool {
        self.marker_path.is_file()
    }

    /// The `ralph/` directory, if it exists.
    pub fn find_ralph_dir(&self) -> Option<&Path> {
        self.ralph_dir.is_dir().then_some(self.ralph_dir.as_path())
    }

    /// Tasks path relative to the root, for messages.
    pub fn tasks_display(&self) -> String {
        format!("{RALPH_DIR}/{TASKS_FILE}")
    }
}
