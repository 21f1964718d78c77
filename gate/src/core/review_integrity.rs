//! Review-state invariants that hold regardless of history.
//!
//! - `passes == true` requires `reviewStatus == approved` (only a review approves).
//! - `reviewStatus == approved` requires `passes == true`.
//! - `reviewStatus == changes_requested` requires non-blank `reviewFeedback`.
//! - `reviewCount <= reviewCap + 1`.

use std::fmt;

use crate::core::types::{IterationMarker, ReviewStatus, TaskList};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    PassesWithoutApproval { story: String, status: ReviewStatus },
    ApprovedWithoutPasses { story: String },
    MissingFeedback { story: String },
    ReviewCountExceedsCap { story: String, count: i64, limit: i64 },
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassesWithoutApproval { story, status } => write!(
                f,
                "Story {story} has passes=true but reviewStatus is '{status}', not 'approved'. \
                 Only review iterations may approve stories. Set passes back to false or \
                 complete the review cycle."
            ),
            Self::ApprovedWithoutPasses { story } => write!(
                f,
                "Story {story} has reviewStatus='approved' but passes=false. \
                 These fields must be in sync."
            ),
            Self::MissingFeedback { story } => write!(
                f,
                "Story {story} has reviewStatus='changes_requested' but empty reviewFeedback. \
                 Review must explain what needs fixing."
            ),
            Self::ReviewCountExceedsCap {
                story,
                count,
                limit,
            } => write!(
                f,
                "Story {story} has reviewCount={count} which exceeds reviewCap+1 ({limit}). \
                 Possible corruption."
            ),
        }
    }
}

/// Check every story's review state, stopping at the first violation.
///
/// Returns `Ok(())` without looking at the stories when `skipReview` is set.
pub fn check_review_integrity(
    tasks: &TaskList,
    marker: &IterationMarker,
) -> Result<(), IntegrityViolation> {
    if marker.skip_review {
        return Ok(());
    }

    let limit = i64::from(marker.review_cap) + 1;
    for story in &tasks.user_stories {
        let id = || story.id.clone();

        if story.passes && story.review_status != ReviewStatus::Approved {
            return Err(IntegrityViolation::PassesWithoutApproval {
                story: id(),
                status: story.review_status,
            });
        }
        if story.review_status == ReviewStatus::Approved && !story.passes {
            return Err(IntegrityViolation::ApprovedWithoutPasses { story: id() });
        }
        if story.review_status == ReviewStatus::ChangesRequested
            && story.review_feedback.trim().is_empty()
        {
            return Err(IntegrityViolation::MissingFeedback { story: id() });
        }
        if story.review_count > limit {
            return Err(IntegrityViolation::ReviewCountExceedsCap {
                story: id(),
                count: story.review_count,
                limit,
            });
        }
    }

    Ok(())
}
