//! Shared deterministic types for gate core logic.
//!
//! These types describe the task-list document, the iteration marker, and the
//! observed working-tree state. They carry no I/O and compare by value so the
//! checks built on them stay deterministic.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Review state of a story.
///
/// `None` is written as JSON `null`; the string `"none"` is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Option<String>", into = "Option<String>")]
pub enum ReviewStatus {
    None,
    NeedsReview,
    ChangesRequested,
    Approved,
}

impl ReviewStatus {
    /// Parse a raw `reviewStatus` value. Returns `None` for unknown strings.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        match raw {
            None | Some("none") => Some(Self::None),
            Some("needs_review") => Some(Self::NeedsReview),
            Some("changes_requested") => Some(Self::ChangesRequested),
            Some("approved") => Some(Self::Approved),
            Some(_) => None,
        }
    }

    /// Wire label, or `None` for the unreviewed state.
    pub fn as_wire(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::NeedsReview => Some("needs_review"),
            Self::ChangesRequested => Some("changes_requested"),
            Self::Approved => Some("approved"),
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire().unwrap_or("null"))
    }
}

impl TryFrom<Option<String>> for ReviewStatus {
    type Error = String;

    fn try_from(raw: Option<String>) -> Result<Self, Self::Error> {
        Self::parse(raw.as_deref())
            .ok_or_else(|| format!("unknown reviewStatus '{}'", raw.unwrap_or_default()))
    }
}

impl From<ReviewStatus> for Option<String> {
    fn from(status: ReviewStatus) -> Self {
        status.as_wire().map(str::to_string)
    }
}

/// One unit of work in `tasks.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub passes: bool,
    pub priority: f64,
    pub acceptance_criteria: Vec<String>,
    pub review_status: ReviewStatus,
    pub review_count: i64,
    pub review_feedback: String,
    pub notes: String,
}

impl Story {
    /// The review-relevant projection of this story.
    pub fn triple(&self) -> ReviewTriple {
        ReviewTriple {
            passes: self.passes,
            review_status: self.review_status,
            review_count: self.review_count,
        }
    }
}

/// Parsed `tasks.json` after schema validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskList {
    pub project: String,
    pub branch_name: String,
    pub description: String,
    pub user_stories: Vec<Story>,
}

/// Reduced per-story state compared across an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewTriple {
    pub passes: bool,
    pub review_status: ReviewStatus,
    pub review_count: i64,
}

/// Role of the iteration that just finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationMode {
    Implement,
    Review,
    ReviewFix,
    /// A mode this gate does not know; transition checks are skipped.
    Unknown(String),
}

impl IterationMode {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "implement" => Self::Implement,
            "review" => Self::Review,
            "review-fix" => Self::ReviewFix,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Implement => "implement",
            Self::Review => "review",
            Self::ReviewFix => "review-fix",
            Self::Unknown(raw) => raw,
        }
    }
}

/// Story triples captured before the iteration, keyed by story id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub stories: BTreeMap<String, ReviewTriple>,
    /// Entries that did not parse as a triple, with the parse error.
    pub unreadable: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty() && self.unreadable.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stories.len() + self.unreadable.len()
    }
}

/// Default `reviewCap` when neither the marker nor config provides one.
pub const DEFAULT_REVIEW_CAP: u32 = 5;

/// Control settings read from `.ralph-active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationMarker {
    pub skip_review: bool,
    pub review_cap: u32,
    pub iteration_mode: Option<IterationMode>,
    pub pre_iteration_snapshot: Option<Snapshot>,
}

impl Default for IterationMarker {
    fn default() -> Self {
        Self::with_review_cap(DEFAULT_REVIEW_CAP)
    }
}

impl IterationMarker {
    pub fn with_review_cap(review_cap: u32) -> Self {
        Self {
            skip_review: false,
            review_cap,
            iteration_mode: None,
            pre_iteration_snapshot: None,
        }
    }
}

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Observed state of the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeState {
    Clean,
    Dirty(Vec<StatusEntry>),
    /// Status could not be determined (tool missing, timeout, non-zero exit).
    Unknown(String),
}
