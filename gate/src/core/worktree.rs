//! Uncommitted-change policy for the observed working tree.

use std::fmt;

use tracing::warn;

use crate::core::types::{StatusEntry, WorktreeState};

/// Maximum number of paths listed in the block message.
pub const MAX_LISTED_PATHS: usize = 20;

/// The working tree has changes that must be committed before stopping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncommittedChanges {
    pub entries: Vec<StatusEntry>,
}

impl fmt::Display for UncommittedChanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "You have uncommitted changes. Before stopping, you must:")?;
        writeln!(
            f,
            "1. Update ralph/progress.txt with what was accomplished + learnings"
        )?;
        writeln!(
            f,
            "2. Consider if any lasting patterns belong in CLAUDE.md or .claude/rules/"
        )?;
        write!(
            f,
            "3. Commit ALL changes including progress.txt and tasks.json updates"
        )?;

        if self.entries.is_empty() {
            return Ok(());
        }
        write!(f, "\n\nUncommitted:")?;
        for entry in self.entries.iter().take(MAX_LISTED_PATHS) {
            write!(f, "\n{} {}", entry.code, entry.path)?;
        }
        let hidden = self.entries.len().saturating_sub(MAX_LISTED_PATHS);
        if hidden > 0 {
            write!(f, "\n... and {hidden} more")?;
        }
        Ok(())
    }
}

/// Block on a dirty tree. An undeterminable state does not block.
pub fn check_worktree(state: &WorktreeState) -> Result<(), UncommittedChanges> {
    match state {
        WorktreeState::Clean => Ok(()),
        WorktreeState::Dirty(entries) => Err(UncommittedChanges {
            entries: entries.clone(),
        }),
        WorktreeState::Unknown(reason) => {
            warn!(%reason, "cannot determine worktree state; not blocking");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: &str, path: &str) -> StatusEntry {
        StatusEntry {
            code: code.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn clean_and_unknown_do_not_block() {
        assert_eq!(check_worktree(&WorktreeState::Clean), Ok(()));
        assert_eq!(
            check_worktree(&WorktreeState::Unknown("git timed out".to_string())),
            Ok(())
        );
    }

    #[test]
    fn dirty_blocks_with_commit_instructions() {
        let state = WorktreeState::Dirty(vec![entry("??", "dirty.txt")]);
        let err = check_worktree(&state).expect_err("should block");
        let message = err.to_string();
        assert!(message.to_lowercase().contains("uncommitted"));
        assert!(message.contains("ralph/progress.txt"));
        assert!(message.ends_with("?? dirty.txt"));
    }

    #[test]
    fn long_path_lists_are_truncated() {
        let entries = (0..25)
            .map(|i| entry(" M", &format!("src/file{i}.rs")))
            .collect();
        let err = check_worktree(&WorktreeState::Dirty(entries)).expect_err("block");
        let message = err.to_string();
        assert!(message.contains("src/file19.rs"));
        assert!(!message.contains("src/file20.rs"));
        assert!(message.ends_with("... and 5 more"));
    }
}
