//! Per-iteration transition checks against the pre-iteration snapshot.
//!
//! Each story is a small state machine over `(passes, reviewStatus, reviewCount)`.
//! The iteration mode selects which moves are legal:
//!
//! - `implement`: only `none -> needs_review`; new stories start unreviewed.
//! - `review`: at most one story changes; it gains exactly one review and ends
//!   `approved` (passes) or `changes_requested` (not passing).
//! - `review-fix`: at most one story moves `changes_requested -> needs_review`
//!   with `passes` and `reviewCount` untouched.
//!
//! Stories only present in the snapshot are ignored. Unknown modes are not checked.

use std::fmt;

use tracing::{debug, warn};

use crate::core::types::{
    IterationMarker, IterationMode, ReviewStatus, ReviewTriple, Snapshot, TaskList,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionViolation {
    ImplementSetPasses { story: String },
    ImplementApproved { story: String, from: ReviewStatus },
    ImplementReviewCount { story: String, from: i64, to: i64 },
    ImplementStatusChange {
        story: String,
        from: ReviewStatus,
        to: ReviewStatus,
    },
    NewStoryPasses { story: String },
    NewStoryStatus { story: String, status: ReviewStatus },
    NewStoryReviewCount { story: String, count: i64 },
    ReviewMultipleStories { stories: Vec<String> },
    ReviewCountStep { story: String, from: i64, to: i64 },
    ReviewApprovedWithoutPasses { story: String },
    ReviewRejectedWithPasses { story: String },
    ReviewNotTerminal { story: String, status: ReviewStatus },
    FixMultipleStories { stories: Vec<String> },
    FixChangedPasses { story: String, from: bool, to: bool },
    FixWrongStatus {
        story: String,
        from: ReviewStatus,
        to: ReviewStatus,
    },
    FixWrongOrigin { story: String, from: ReviewStatus },
    FixReviewCount { story: String, from: i64, to: i64 },
    UnreadableSnapshotEntry { story: String, detail: String },
}

const IMPLEMENT_PREFIX: &str = "Implement iterations cannot set passes=true or approve stories. \
                                Only review iterations may approve.";
const FIX_PREFIX: &str = "Review-fix iterations cannot approve stories.";

impl fmt::Display for TransitionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImplementSetPasses { story } => write!(
                f,
                "{IMPLEMENT_PREFIX} Story {story} had illegal transition: passes false -> true."
            ),
            Self::ImplementApproved { story, from } => write!(
                f,
                "{IMPLEMENT_PREFIX} Story {story} had illegal transition: \
                 reviewStatus '{from}' -> 'approved'."
            ),
            Self::ImplementReviewCount { story, from, to } => write!(
                f,
                "{IMPLEMENT_PREFIX} Story {story} had illegal transition: reviewCount {from} -> {to}."
            ),
            Self::ImplementStatusChange { story, from, to } => write!(
                f,
                "Implement iterations cannot change reviewStatus from '{from}' to '{to}' \
                 on story {story}."
            ),
            Self::NewStoryPasses { story } => write!(
                f,
                "New story {story} must start with passes=false (got passes=true)."
            ),
            Self::NewStoryStatus { story, status } => write!(
                f,
                "New story {story} must start with reviewStatus=null (got '{status}')."
            ),
            Self::NewStoryReviewCount { story, count } => write!(
                f,
                "New story {story} must start with reviewCount=0 (got {count})."
            ),
            Self::ReviewMultipleStories { stories } => write!(
                f,
                "Review iteration made illegal transition: modified review fields on \
                 multiple stories ({}). Review may only modify one story per iteration.",
                stories.join(", ")
            ),
            Self::ReviewCountStep { story, from, to } => write!(
                f,
                "Review iteration made illegal transition on story {story}: reviewCount must \
                 increment by exactly 1 (was {from}, now {to})."
            ),
            Self::ReviewApprovedWithoutPasses { story } => write!(
                f,
                "Review iteration made illegal transition on story {story}: \
                 set reviewStatus='approved' but passes is still false."
            ),
            Self::ReviewRejectedWithPasses { story } => write!(
                f,
                "Review iteration made illegal transition on story {story}: \
                 set reviewStatus='changes_requested' but passes is true."
            ),
            Self::ReviewNotTerminal { story, status } => write!(
                f,
                "Review iteration made illegal transition on story {story}: reviewStatus \
                 changed to '{status}'; must be 'approved' or 'changes_requested' after a review."
            ),
            Self::FixMultipleStories { stories } => write!(
                f,
                "Review-fix iteration made illegal transition: modified review fields on \
                 multiple stories ({}). Review-fix may only modify one story per iteration.",
                stories.join(", ")
            ),
            Self::FixChangedPasses { story, from, to } => write!(
                f,
                "{FIX_PREFIX} Story {story} must go back to needs_review for re-review. \
                 Illegal transition: passes {from} -> {to}."
            ),
            Self::FixWrongStatus { story, from, to } => write!(
                f,
                "{FIX_PREFIX} Story {story} must go back to needs_review for re-review. \
                 Illegal transition: reviewStatus '{from}' -> '{to}'."
            ),
            Self::FixWrongOrigin { story, from } => write!(
                f,
                "Review-fix iterations may only resubmit stories with changes requested. \
                 Story {story} moved to needs_review from '{from}'."
            ),
            Self::FixReviewCount { story, from, to } => write!(
                f,
                "{FIX_PREFIX} Story {story} had illegal transition: reviewCount {from} -> {to}."
            ),
            Self::UnreadableSnapshotEntry { story, detail } => write!(
                f,
                "Cannot verify story {story}: its preIterationSnapshot entry is malformed \
                 ({detail})."
            ),
        }
    }
}

/// Before/after triple for a story present in both snapshot and document.
#[derive(Debug, Clone, Copy)]
struct Delta<'a> {
    id: &'a str,
    before: ReviewTriple,
    after: ReviewTriple,
}

impl Delta<'_> {
    fn is_dirty(&self) -> bool {
        self.before != self.after
    }
}

/// Snapshot-vs-document diff, in document order.
#[derive(Debug, Default)]
struct StoryDiff<'a> {
    existing: Vec<Delta<'a>>,
    added: Vec<(&'a str, ReviewTriple)>,
}

impl<'a> StoryDiff<'a> {
    /// Fails on the first document story whose snapshot entry did not parse.
    fn new(tasks: &'a TaskList, snapshot: &Snapshot) -> Result<Self, TransitionViolation> {
        let mut diff = Self::default();
        for story in &tasks.user_stories {
            if let Some(detail) = snapshot.unreadable.get(&story.id) {
                return Err(TransitionViolation::UnreadableSnapshotEntry {
                    story: story.id.clone(),
                    detail: detail.clone(),
                });
            }
            let after = story.triple();
            match snapshot.stories.get(&story.id) {
                Some(before) => diff.existing.push(Delta {
                    id: story.id.as_str(),
                    before: *before,
                    after,
                }),
                None => diff.added.push((story.id.as_str(), after)),
            }
        }
        Ok(diff)
    }

    fn changed(&self) -> Vec<Delta<'a>> {
        self.existing
            .iter()
            .copied()
            .filter(Delta::is_dirty)
            .collect()
    }
}

/// Check that this iteration's changes are legal for its mode.
///
/// Skipped when `skipReview` is set, or when the mode or snapshot is missing.
pub fn check_transitions(
    tasks: &TaskList,
    marker: &IterationMarker,
) -> Result<(), TransitionViolation> {
    if marker.skip_review {
        return Ok(());
    }
    let (Some(mode), Some(snapshot)) = (&marker.iteration_mode, &marker.pre_iteration_snapshot)
    else {
        debug!("no iteration mode or snapshot; transition check skipped");
        return Ok(());
    };

    let check: fn(&StoryDiff<'_>) -> Result<(), TransitionViolation> = match mode {
        IterationMode::Implement => check_implement,
        IterationMode::Review => check_review,
        IterationMode::ReviewFix => check_review_fix,
        IterationMode::Unknown(raw) => {
            warn!(mode = %raw, "unknown iteration mode; transition check skipped");
            return Ok(());
        }
    };

    let diff = StoryDiff::new(tasks, snapshot)?;
    let stale = snapshot
        .unreadable
        .keys()
        .filter(|id| !tasks.user_stories.iter().any(|s| &s.id == *id))
        .count();
    if stale > 0 {
        debug!(stale, "ignoring malformed snapshot entries for removed stories");
    }
    check(&diff)
}

fn check_implement(diff: &StoryDiff<'_>) -> Result<(), TransitionViolation> {
    for delta in &diff.existing {
        let story = || delta.id.to_string();
        let (before, after) = (delta.before, delta.after);

        if !before.passes && after.passes {
            return Err(TransitionViolation::ImplementSetPasses { story: story() });
        }
        if before.review_status != ReviewStatus::Approved
            && after.review_status == ReviewStatus::Approved
        {
            return Err(TransitionViolation::ImplementApproved {
                story: story(),
                from: before.review_status,
            });
        }
        if before.review_count != after.review_count {
            return Err(TransitionViolation::ImplementReviewCount {
                story: story(),
                from: before.review_count,
                to: after.review_count,
            });
        }
        let submitted = before.review_status == ReviewStatus::None
            && after.review_status == ReviewStatus::NeedsReview;
        if before.review_status != after.review_status && !submitted {
            return Err(TransitionViolation::ImplementStatusChange {
                story: story(),
                from: before.review_status,
                to: after.review_status,
            });
        }
    }

    for (id, triple) in &diff.added {
        let story = || id.to_string();
        if triple.passes {
            return Err(TransitionViolation::NewStoryPasses { story: story() });
        }
        if triple.review_status != ReviewStatus::None {
            return Err(TransitionViolation::NewStoryStatus {
                story: story(),
                status: triple.review_status,
            });
        }
        if triple.review_count != 0 {
            return Err(TransitionViolation::NewStoryReviewCount {
                story: story(),
                count: triple.review_count,
            });
        }
    }

    Ok(())
}

fn check_review(diff: &StoryDiff<'_>) -> Result<(), TransitionViolation> {
    let changed = diff.changed();
    let delta = match changed.as_slice() {
        // TODO: surface a no-op review as a warning in the decision once the
        // hook output carries non-blocking messages.
        [] => {
            debug!("review iteration changed no stories");
            return Ok(());
        }
        [single] => *single,
        many => {
            return Err(TransitionViolation::ReviewMultipleStories {
                stories: many.iter().map(|d| d.id.to_string()).collect(),
            });
        }
    };

    let story = || delta.id.to_string();
    let (before, after) = (delta.before, delta.after);
    if before.review_count.checked_add(1) != Some(after.review_count) {
        return Err(TransitionViolation::ReviewCountStep {
            story: story(),
            from: before.review_count,
            to: after.review_count,
        });
    }

    match after.review_status {
        ReviewStatus::Approved if !after.passes => {
            Err(TransitionViolation::ReviewApprovedWithoutPasses { story: story() })
        }
        ReviewStatus::ChangesRequested if after.passes => {
            Err(TransitionViolation::ReviewRejectedWithPasses { story: story() })
        }
        ReviewStatus::Approved | ReviewStatus::ChangesRequested => Ok(()),
        status => Err(TransitionViolation::ReviewNotTerminal {
            story: story(),
            status,
        }),
    }
}

fn check_review_fix(diff: &StoryDiff<'_>) -> Result<(), TransitionViolation> {
    let changed = diff.changed();
    let delta = match changed.as_slice() {
        [] => return Ok(()),
        [single] => *single,
        many => {
            return Err(TransitionViolation::FixMultipleStories {
                stories: many.iter().map(|d| d.id.to_string()).collect(),
            });
        }
    };

    let story = || delta.id.to_string();
    let (before, after) = (delta.before, delta.after);
    if before.passes != after.passes {
        return Err(TransitionViolation::FixChangedPasses {
            story: story(),
            from: before.passes,
            to: after.passes,
        });
    }
    if after.review_status != ReviewStatus::NeedsReview {
        return Err(TransitionViolation::FixWrongStatus {
            story: story(),
            from: before.review_status,
            to: after.review_status,
        });
    }
    if before.review_status != ReviewStatus::ChangesRequested {
        return Err(TransitionViolation::FixWrongOrigin {
            story: story(),
            from: before.review_status,
        });
    }
    if before.review_count != after.review_count {
        return Err(TransitionViolation::FixReviewCount {
            story: story(),
            from: before.review_count,
            to: after.review_count,
        });
    }
    Ok(())
}
