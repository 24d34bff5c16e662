//! Core domain types and the progress endpoint's wire format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Body of a progress/mastery query response.
///
/// Only `data.user.contentItemProgresses` is read. Every level is optional so
/// that a logged-out or partial response decodes to an empty item list
/// instead of failing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressPayload {
    #[serde(default)]
    pub data: Option<ProgressData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressData {
    #[serde(default)]
    pub user: Option<ProgressUser>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressUser {
    #[serde(default, rename = "contentItemProgresses")]
    pub content_item_progresses: Option<Vec<ContentItemProgress>>,
}

/// One content item record as sent by the site.
///
/// Fields of an unexpected JSON type read as absent, so one odd record
/// never rejects the rest of its payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItemProgress {
    /// `"COMPLETE"` when done; anything else (or absent) is not done.
    #[serde(default, rename = "completionStatus", deserialize_with = "lenient_string")]
    pub completion_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_content")]
    pub content: Option<ContentRef>,
}

/// The `content` object of an item; only its GraphQL type name matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRef {
    #[serde(default, rename = "__typename", deserialize_with = "lenient_string")]
    pub typename: Option<String>,
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(de)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

fn lenient_content<'de, D: Deserializer<'de>>(de: D) -> Result<Option<ContentRef>, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(de)?).ok())
}

impl ProgressPayload {
    /// Parse a raw response body.
    pub fn from_json(body: &str) -> crate::Result<Self> {
        serde_json::from_str(body).map_err(|e| crate::KaProgressError::parse(e.to_string()))
    }

    /// Item records in the order the site listed them.
    pub fn items(&self) -> &[ContentItemProgress] {
        self.data
            .as_ref()
            .and_then(|d| d.user.as_ref())
            .and_then(|u| u.content_item_progresses.as_deref())
            .unwrap_or(&[])
    }
}

impl ContentItemProgress {
    /// The content type tag, or `""` when absent.
    pub fn typename(&self) -> &str {
        self.content
            .as_ref()
            .and_then(|c| c.typename.as_deref())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Counters and snapshots
// ---------------------------------------------------------------------------

/// The six per-unit counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCounts {
    pub completed_articles: u32,
    pub unread_articles: u32,
    pub completed_videos: u32,
    pub unwatched_videos: u32,
    pub completed_exercises: u32,
    pub unmastered_exercises: u32,
}

impl ProgressCounts {
    /// True when nothing needs attention. An empty unit is done.
    pub fn is_done(&self) -> bool {
        self.unread_articles == 0 && self.unmastered_exercises == 0 && self.unwatched_videos == 0
    }
}

/// Finished counters for one unit visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// Title of the owning course.
    pub course: String,
    /// Display title of the unit.
    pub unit_title: String,
    #[serde(flatten)]
    pub counts: ProgressCounts,
}

impl UnitSnapshot {
    pub fn is_done(&self) -> bool {
        self.counts.is_done()
    }
}

/// Ordered unit snapshots for one course, in discovery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseReport {
    /// Course slug the report was traversed from.
    pub slug: String,
    pub title: String,
    pub units: Vec<UnitSnapshot>,
    /// Units discovered but skipped because their visit failed.
    pub skipped_units: usize,
    pub generated_at: DateTime<Utc>,
}

impl CourseReport {
    /// Number of units with nothing left to do.
    pub fn done_units(&self) -> usize {
        self.units.iter().filter(|u| u.is_done()).count()
    }
}
