//! Per-unit progress accumulation.
//!
//! Counters only ever increase, and the done predicate is always computed
//! from them, never stored.

use kaprogress_shared::{ContentItemProgress, ProgressCounts, ProgressPayload, UnitSnapshot};
use tracing::warn;

use crate::classify::{ContentCategory, classify};

/// What a single fold step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FoldOutcome {
    /// One counter was incremented.
    Counted {
        category: ContentCategory,
        completed: bool,
    },
    /// The item's type tag was not recognized; nothing was counted.
    Unknown(String),
}

/// Mutable aggregate for one unit visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitProgress {
    counts: ProgressCounts,
}

impl UnitProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one item record.
    pub fn fold(&mut self, record: &ContentItemProgress) -> FoldOutcome {
        let (category, completed) = classify(record);
        let c = &mut self.counts;
        let counter = match (&category, completed) {
            (ContentCategory::Article, true) => &mut c.completed_articles,
            (ContentCategory::Article, false) => &mut c.unread_articles,
            (ContentCategory::Video, true) => &mut c.completed_videos,
            (ContentCategory::Video, false) => &mut c.unwatched_videos,
            (ContentCategory::Exercise, true) => &mut c.completed_exercises,
            (ContentCategory::Exercise, false) => &mut c.unmastered_exercises,
            (ContentCategory::Unknown(tag), _) => {
                warn!(typename = %tag, "unknown content item type, not counted");
                return FoldOutcome::Unknown(tag.clone());
            }
        };
        *counter = counter.saturating_add(1);
        FoldOutcome::Counted {
            category,
            completed,
        }
    }

    /// Count every item of one response payload. Returns how many were unknown.
    pub fn fold_payload(&mut self, payload: &ProgressPayload) -> usize {
        payload
            .items()
            .iter()
            .filter(|item| matches!(self.fold(item), FoldOutcome::Unknown(_)))
            .count()
    }

    pub fn counts(&self) -> ProgressCounts {
        self.counts
    }

    pub fn is_done(&self) -> bool {
        self.counts.is_done()
    }

    /// Freeze into a snapshot owned by the caller.
    pub fn into_snapshot(
        self,
        course: impl Into<String>,
        unit_title: impl Into<String>,
    ) -> UnitSnapshot {
        UnitSnapshot {
            course: course.into(),
            unit_title: unit_title.into(),
            counts: self.counts,
        }
    }
}
