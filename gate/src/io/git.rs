//! Working-tree probe backed by `git status`.
//!
//! The probe never fails: anything that prevents a definite answer becomes
//! [`WorktreeState::Unknown`], which the gate treats as "do not block".

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::types::{StatusEntry, WorktreeState};
use crate::io::process::run_with_timeout;

/// Inputs for one working-tree probe.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Source of working-tree state, swappable in tests.
pub trait WorktreeProbe {
    fn probe(&self, request: &StatusRequest) -> WorktreeState;
}

/// Runs `git status --porcelain=v1 -uall` in the request's workdir.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitWorktreeProbe;

impl WorktreeProbe for GitWorktreeProbe {
    #[instrument(skip_all, fields(workdir = %request.workdir.display()))]
    fn probe(&self, request: &StatusRequest) -> WorktreeState {
        let mut cmd = Command::new("git");
        cmd.args(["status", "--porcelain=v1", "-uall"])
            .current_dir(&request.workdir);

        let output = match run_with_timeout(cmd, request.timeout, request.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => {
                warn!(err = %format!("{err:#}"), "git status could not run");
                return WorktreeState::Unknown(format!("git status could not run: {err:#}"));
            }
        };
        if output.timed_out {
            return WorktreeState::Unknown(format!(
                "git status timed out after {}s",
                request.timeout.as_secs()
            ));
        }
        if !output.succeeded() {
            let stderr = output.stderr_lossy();
            debug!(exit_code = ?output.status.code(), stderr = %stderr.trim(), "git status failed");
            return WorktreeState::Unknown(format!("git status failed: {}", stderr.trim()));
        }

        let entries = parse_status(&output.stdout_lossy());
        if entries.is_empty() {
            debug!("worktree is clean");
            WorktreeState::Clean
        } else {
            debug!(changed = entries.len(), "worktree not clean");
            WorktreeState::Dirty(entries)
        }
    }
}

/// Parse porcelain output. Lines that do not parse are kept verbatim so that
/// any non-empty output still reports the tree as dirty.
pub fn parse_status(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            parse_status_line(line).unwrap_or_else(|_| StatusEntry {
                code: "??".to_string(),
                path: line.trim().to_string(),
            })
        })
        .collect()
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    let (Some(code), Some(rest)) = (line.get(..2), line.get(3..)) else {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    };
    let path = match rest.split_once(" -> ") {
        Some((_, new)) => new.trim(),
        None => rest.trim(),
    };
    if path.is_empty() {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    Ok(StatusEntry {
        code: code.to_string(),
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_untracked_line() {
        let e = parse_status_line("?? foo.txt").expect("parse");
        assert_eq!(
            e,
            StatusEntry {
                code: "??".to_string(),
                path: "foo.txt".to_string()
            }
        );
    }

    #[test]
    fn parses_modified_line() {
        let e = parse_status_line(" M src/main.rs").expect("parse");
        assert_eq!(e.code, " M");
        assert_eq!(e.path, "src/main.rs");
    }

    #[test]
    fn parses_rename_line_uses_new_path() {
        let e = parse_status_line("R  old.txt -> new.txt").expect("parse");
        assert_eq!(e.path, "new.txt");
    }

    #[test]
    fn unparsable_lines_still_count_as_dirty() {
        let entries = parse_status("\nM\n M ralph/tasks.json\n");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "M");
        assert_eq!(entries[1].path, "ralph/tasks.json");
    }

    #[test]
    fn probe_outside_repository_is_unknown() {
        let temp = tempfile::tempdir().expect("tempdir");
        let request = StatusRequest {
            workdir: temp.path().to_path_buf(),
            timeout: Duration::from_secs(10),
            output_limit_bytes: 10_000,
        };
        let state = GitWorktreeProbe.probe(&request);
        assert!(matches!(state, WorktreeState::Unknown(_)), "{state:?}");
    }
}
