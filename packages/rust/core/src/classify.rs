//! Content item classification.

use kaprogress_shared::ContentItemProgress;

/// Status value the site uses for a finished item.
pub const COMPLETE: &str = "COMPLETE";

/// Kind of a content item, from its `__typename` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCategory {
    Article,
    Video,
    Exercise,
    /// Any other tag, including an absent or empty one. Carries the raw tag.
    Unknown(String),
}

impl ContentCategory {
    pub fn from_typename(typename: &str) -> Self {
        match typename {
            "Article" => Self::Article,
            "Video" => Self::Video,
            "Exercise" => Self::Exercise,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Map one record to its category and whether it is complete.
///
/// Only the literal `"COMPLETE"` status counts as complete; there is no
/// partial state.
pub fn classify(record: &ContentItemProgress) -> (ContentCategory, bool) {
    let category = ContentCategory::from_typename(record.typename());
    let completed = record.completion_status.as_deref() == Some(COMPLETE);
    (category, completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::item;
    use kaprogress_shared::ContentRef;

    #[test]
    fn known_typenames() {
        for (tag, expected) in [
            ("Article", ContentCategory::Article),
            ("Video", ContentCategory::Video),
            ("Exercise", ContentCategory::Exercise),
        ] {
            let (category, completed) = classify(&item(tag, "COMPLETE"));
            assert_eq!(category, expected);
            assert!(completed);
        }
    }

    #[test]
    fn unknown_and_missing_typenames() {
        let (category, _) = classify(&item("Challenge", "COMPLETE"));
        assert_eq!(category, ContentCategory::Unknown("Challenge".into()));

        let (category, _) = classify(&item("", "COMPLETE"));
        assert_eq!(category, ContentCategory::Unknown(String::new()));

        let no_content = ContentItemProgress {
            completion_status: Some("COMPLETE".into()),
            content: None,
        };
        assert_eq!(classify(&no_content).0, ContentCategory::Unknown(String::new()));

        let no_tag = ContentItemProgress {
            completion_status: None,
            content: Some(ContentRef { typename: None }),
        };
        assert_eq!(classify(&no_tag).0, ContentCategory::Unknown(String::new()));
    }

    #[test]
    fn typename_match_is_case_sensitive() {
        let (category, _) = classify(&item("article", "COMPLETE"));
        assert_eq!(category, ContentCategory::Unknown("article".into()));
    }

    #[test]
    fn only_literal_complete_is_completed() {
        for status in ["INCOMPLETE", "UNSTARTED", "complete", "COMPLETED", ""] {
            let (_, completed) = classify(&item("Video", status));
            assert!(!completed, "status {status:?} must not count as complete");
        }

        let missing = ContentItemProgress {
            completion_status: None,
            ..item("Video", "")
        };
        assert!(!classify(&missing).1);
    }
}
