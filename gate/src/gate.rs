//! Gatekeeper for stop requests from the iterative work loop.
//!
//! A stop is only approved when, in this order:
//!
//! 1. `ralph/tasks.json` can be read and parsed,
//! 2. it is structurally valid,
//! 3. its review state is internally consistent,
//! 4. the change since the pre-iteration snapshot is legal for the iteration mode,
//! 5. the working tree has no uncommitted changes.
//!
//! The first failing check blocks. Checks 1-4 fail closed; check 5 fails open
//! when `git status` cannot give an answer. Without `.ralph-active` the gate is
//! inactive and every stop is approved.

use std::fmt;
use std::path::Path;

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::core::review_integrity::check_review_integrity;
use crate::core::schema::validate_task_list;
use crate::core::transitions::check_transitions;
use crate::core::types::{IterationMarker, TaskList};
use crate::core::worktree::check_worktree;
use crate::io::config::{GateConfig, load_config};
use crate::io::documents::load_json_file;
use crate::io::git::{StatusRequest, WorktreeProbe};
use crate::io::hook::Decision;
use crate::io::layout::GatePaths;
use crate::io::marker::load_marker;

/// The check that produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Layout,
    Configuration,
    TaskListLoad,
    Schema,
    ReviewIntegrity,
    Transition,
    RepositoryState,
}

impl CheckKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Layout => "layout",
            Self::Configuration => "configuration",
            Self::TaskListLoad => "task_list_load",
            Self::Schema => "schema",
            Self::ReviewIntegrity => "review_integrity",
            Self::Transition => "transition",
            Self::RepositoryState => "repository_state",
        }
    }

    fn reason_prefix(self) -> &'static str {
        match self {
            Self::Layout | Self::TaskListLoad => "",
            Self::Configuration => "Gate configuration invalid: ",
            Self::Schema => "Task list validation failed: ",
            Self::ReviewIntegrity => "Review integrity check failed: ",
            Self::Transition => "Transition validation failed: ",
            Self::RepositoryState => "Repository state check failed: ",
        }
    }
}

/// First violation found, tagged with the check that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocked {
    pub check: CheckKind,
    pub message: String,
}

impl Blocked {
    fn new(check: CheckKind, message: impl fmt::Display) -> Self {
        Self {
            check,
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.check.reason_prefix(), self.message)
    }
}

/// Decide whether the loop may stop. Never panics and never errors: every
/// failure is folded into the decision.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn run_gate<P: WorktreeProbe>(root: &Path, probe: &P) -> Decision {
    let paths = GatePaths::new(root);
    if !paths.gate_active() {
        debug!("no iteration marker; gate inactive");
        return Decision::Approve;
    }

    match evaluate(&paths, probe) {
        Ok(()) => {
            info!("all checks passed; approving stop");
            Decision::Approve
        }
        Err(blocked) => {
            info!(check = blocked.check.label(), "blocking stop");
            Decision::block(blocked.to_string())
        }
    }
}

/// Run the document checks (load, schema, review integrity) without the
/// transition or repository checks. Backs the `validate` command.
pub fn validate_only(root: &Path) -> anyhow::Result<TaskList> {
    let paths = GatePaths::new(root);
    let inputs = load_inputs(&paths).map_err(|blocked| anyhow!(blocked.to_string()))?;
    check_review_integrity(&inputs.tasks, &inputs.marker)
        .map_err(|v| anyhow!(Blocked::new(CheckKind::ReviewIntegrity, v).to_string()))?;
    Ok(inputs.tasks)
}

struct GateInputs {
    config: GateConfig,
    marker: IterationMarker,
    tasks: TaskList,
}

fn evaluate<P: WorktreeProbe>(paths: &GatePaths, probe: &P) -> Result<(), Blocked> {
    let GateInputs {
        config,
        marker,
        tasks,
    } = load_inputs(paths)?;

    check_review_integrity(&tasks, &marker)
        .map_err(|v| Blocked::new(CheckKind::ReviewIntegrity, v))?;
    check_transitions(&tasks, &marker).map_err(|v| Blocked::new(CheckKind::Transition, v))?;

    let request = StatusRequest {
        workdir: paths.root.clone(),
        timeout: config.status_timeout(),
        output_limit_bytes: config.status_output_limit_bytes,
    };
    check_worktree(&probe.probe(&request))
        .map_err(|v| Blocked::new(CheckKind::RepositoryState, v))?;
    Ok(())
}

/// Locate, load, and structurally validate everything the checks read.
fn load_inputs(paths: &GatePaths) -> Result<GateInputs, Blocked> {
    paths
        .find_ralph_dir()
        .ok_or_else(|| Blocked::new(CheckKind::Layout, "Cannot find ralph/ directory"))?;

    let config = load_config(&paths.config_path)
        .map_err(|err| Blocked::new(CheckKind::Configuration, format!("{err:#}")))?;

    let marker = if paths.gate_active() {
        load_marker(&paths.marker_path, config.default_review_cap)
    } else {
        IterationMarker::with_review_cap(config.default_review_cap)
    };

    let doc = load_json_file(&paths.tasks_path).ok_or_else(|| {
        Blocked::new(
            CheckKind::TaskListLoad,
            format!("Cannot read or parse {}", paths.tasks_display()),
        )
    })?;
    let tasks = validate_task_list(&doc).map_err(|v| Blocked::new(CheckKind::Schema, v))?;
    debug!(stories = tasks.user_stories.len(), "task list loaded");

    Ok(GateInputs {
        config,
        marker,
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{StatusEntry, WorktreeState};
    use crate::test_support::{StaticWorktreeProbe, TestWorkspace, approved_story, story, task_list};
    use serde_json::json;

    fn clean() -> StaticWorktreeProbe {
        StaticWorktreeProbe::new(WorktreeState::Clean)
    }

    fn reason(decision: &Decision) -> &str {
        decision.reason().expect("expected block")
    }

    #[test]
    fn inactive_gate_approves_without_reading_anything() {
        let ws = TestWorkspace::new().expect("workspace");
        assert_eq!(run_gate(ws.root(), &clean()), Decision::Approve);
    }

    #[test]
    fn missing_ralph_dir_blocks() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join(".ralph-active"), "{}").expect("write marker");
        let decision = run_gate(temp.path(), &clean());
        assert_eq!(reason(&decision), "Cannot find ralph/ directory");
    }

    #[test]
    fn unreadable_task_list_blocks() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        ws.write_tasks_raw("{ broken").expect("tasks");
        let decision = run_gate(ws.root(), &clean());
        assert_eq!(reason(&decision), "Cannot read or parse ralph/tasks.json");
    }

    #[test]
    fn schema_violation_is_prefixed() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        ws.write_tasks_value(&json!({"project": "p", "description": "d", "userStories": []}))
            .expect("tasks");
        let decision = run_gate(ws.root(), &clean());
        assert!(reason(&decision).starts_with("Task list validation failed: "));
        assert!(reason(&decision).contains("branchName"));
    }

    #[test]
    fn malformed_marker_degrades_to_defaults() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker_raw("not json").expect("marker");
        let mut s = story("US-001");
        s.passes = true;
        s.notes = "done".to_string();
        ws.write_tasks(&task_list(vec![s])).expect("tasks");
        let decision = run_gate(ws.root(), &clean());
        assert!(reason(&decision).starts_with("Review integrity check failed: "));
    }

    #[test]
    fn invalid_config_blocks() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        ws.write_tasks(&task_list(vec![story("US-001")])).expect("tasks");
        ws.write_config("status_timeout_secs = 0\n").expect("config");
        let decision = run_gate(ws.root(), &clean());
        assert!(reason(&decision).starts_with("Gate configuration invalid: "));
    }

    #[test]
    fn config_review_cap_applies_when_marker_has_none() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        let mut s = story("US-001");
        s.review_count = 3;
        ws.write_tasks(&task_list(vec![s])).expect("tasks");
        assert_eq!(run_gate(ws.root(), &clean()), Decision::Approve);

        ws.write_config("default_review_cap = 1\n").expect("config");
        let decision = run_gate(ws.root(), &clean());
        assert!(reason(&decision).contains("exceeds reviewCap+1 (2)"));
    }

    #[test]
    fn dirty_worktree_blocks_last() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({"skipReview": true})).expect("marker");
        ws.write_tasks(&task_list(vec![approved_story("US-001")]))
            .expect("tasks");
        let probe = StaticWorktreeProbe::new(WorktreeState::Dirty(vec![StatusEntry {
            code: "??".to_string(),
            path: "dirty.txt".to_string(),
        }]));
        let decision = run_gate(ws.root(), &probe);
        assert!(reason(&decision).starts_with("Repository state check failed: "));
        assert!(reason(&decision).contains("uncommitted"));
        assert_eq!(probe.calls(), 1);
    }

    #[test]
    fn unknown_worktree_state_approves() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        ws.write_tasks(&task_list(vec![story("US-001")])).expect("tasks");
        let probe = StaticWorktreeProbe::new(WorktreeState::Unknown("no git".to_string()));
        assert_eq!(run_gate(ws.root(), &probe), Decision::Approve);
    }

    #[test]
    fn earlier_failure_skips_worktree_probe() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({})).expect("marker");
        let mut s = story("US-001");
        s.review_status = crate::core::types::ReviewStatus::Approved;
        ws.write_tasks(&task_list(vec![s])).expect("tasks");
        let probe = clean();
        assert!(!run_gate(ws.root(), &probe).is_approve());
        assert_eq!(probe.calls(), 0);
    }

    #[test]
    fn validate_only_ignores_transitions() {
        let ws = TestWorkspace::new().expect("workspace");
        ws.write_marker(&json!({
            "iterationMode": "implement",
            "preIterationSnapshot": {
                "US-001": {"passes": false, "reviewStatus": null, "reviewCount": 0}
            }
        }))
        .expect("marker");
        ws.write_tasks(&task_list(vec![approved_story("US-001")]))
            .expect("tasks");
        let tasks = validate_only(ws.root()).expect("valid");
        assert_eq!(tasks.user_stories.len(), 1);
        assert!(!run_gate(ws.root(), &clean()).is_approve());
    }

    #[test]
    fn validate_only_reports_integrity_failures() {
        let ws = TestWorkspace::new().expect("workspace");
        let mut s = story("US-001");
        s.review_status = crate::core::types::ReviewStatus::ChangesRequested;
        ws.write_tasks(&task_list(vec![s])).expect("tasks");
        let err = validate_only(ws.root()).expect_err("should fail");
        assert!(err.to_string().contains("reviewFeedback"));
    }
}
