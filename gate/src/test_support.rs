//! Test-only helpers: story fixtures, a temp workspace, and a fake probe.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde_json::Value;
use tempfile::TempDir;

use crate::core::types::{ReviewStatus, ReviewTriple, Snapshot, Story, TaskList, WorktreeState};
use crate::io::git::{StatusRequest, WorktreeProbe};
use crate::io::layout::GatePaths;

/// Unreviewed, not-passing story with deterministic defaults.
pub fn story(id: &str) -> Story {
    Story {
        id: id.to_string(),
        title: format!("{id} title"),
        passes: false,
        priority: 1.0,
        acceptance_criteria: vec!["It works".to_string()],
        review_status: ReviewStatus::None,
        review_count: 0,
        review_feedback: String::new(),
        notes: String::new(),
    }
}

/// Story approved after one review, with notes.
pub fn approved_story(id: &str) -> Story {
    Story {
        passes: true,
        review_status: ReviewStatus::Approved,
        review_count: 1,
        notes: "done".to_string(),
        ..story(id)
    }
}

pub fn task_list(stories: Vec<Story>) -> TaskList {
    TaskList {
        project: "test".to_string(),
        branch_name: "ralph/test".to_string(),
        description: "Test tasks".to_string(),
        user_stories: stories,
    }
}

pub fn triple(passes: bool, review_status: ReviewStatus, review_count: i64) -> ReviewTriple {
    ReviewTriple {
        passes,
        review_status,
        review_count,
    }
}

pub fn snapshot<const N: usize>(entries: [(&str, ReviewTriple); N]) -> Snapshot {
    Snapshot {
        stories: entries
            .into_iter()
            .map(|(id, triple)| (id.to_string(), triple))
            .collect(),
        ..Snapshot::default()
    }
}

/// Probe that always reports the same state and counts calls.
#[derive(Debug)]
pub struct StaticWorktreeProbe {
    state: WorktreeState,
    calls: Cell<usize>,
}

impl StaticWorktreeProbe {
    pub fn new(state: WorktreeState) -> Self {
        Self {
            state,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl WorktreeProbe for StaticWorktreeProbe {
    fn probe(&self, _request: &StatusRequest) -> WorktreeState {
        self.calls.set(self.calls.get() + 1);
        self.state.clone()
    }
}

/// Temporary project root with an empty `ralph/` directory.
pub struct TestWorkspace {
    _temp: TempDir,
    paths: GatePaths,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create temp dir")?;
        let paths = GatePaths::new(temp.path());
        fs::create_dir_all(&paths.ralph_dir).context("create ralph dir")?;
        Ok(Self { _temp: temp, paths })
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn write_tasks(&self, tasks: &TaskList) -> Result<()> {
        write_json(&self.paths.tasks_path, tasks)
    }

    pub fn write_tasks_value(&self, value: &Value) -> Result<()> {
        write_json(&self.paths.tasks_path, value)
    }

    pub fn write_tasks_raw(&self, contents: &str) -> Result<()> {
        write_file(&self.paths.tasks_path, contents)
    }

    pub fn write_marker(&self, value: &Value) -> Result<()> {
        write_json(&self.paths.marker_path, value)
    }

    pub fn write_marker_raw(&self, contents: &str) -> Result<()> {
        write_file(&self.paths.marker_path, contents)
    }

    pub fn write_config(&self, contents: &str) -> Result<()> {
        write_file(&self.paths.config_path, contents)
    }

    /// Write an arbitrary file relative to the root.
    pub fn write_file(&self, relative: &str, contents: &str) -> Result<PathBuf> {
        let path = self.paths.root.join(relative);
        write_file(&path, contents)?;
        Ok(path)
    }

    /// Initialize a git repository and commit everything present.
    pub fn init_git(&self) -> Result<()> {
        self.git(&["init", "-q"])?;
        self.git(&["config", "user.email", "test@test.com"])?;
        self.git(&["config", "user.name", "Test"])?;
        self.git(&["config", "commit.gpgsign", "false"])?;
        self.commit_all("init")
    }

    pub fn commit_all(&self, message: &str) -> Result<()> {
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "--allow-empty", "-m", message])
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.paths.root)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    write_file(path, &payload)
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))
}
