//! Harvested records and run statistics.

use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::source::SourceKind;

/// A video or post whose comments are harvested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// Platform identifier (video id, post shortcode)
    pub id: String,

    /// Video title, or the first line of the post body
    pub title: String,

    /// Publication instant as reported by the source
    pub published_at: DateTime<FixedOffset>,

    /// Post body, when the source exposes one
    pub body_text: Option<String>,

    /// Canonical URL of the item
    pub url: String,
}

/// A single harvested comment. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Comment {
    /// Comment text as displayed
    pub text: String,

    /// Publication date in the reference zone
    pub published_at: NaiveDate,

    /// Identifier of the item the comment belongs to
    pub source_item_id: String,

    /// Title of the item the comment belongs to
    pub source_title: String,

    /// URL of the item the comment belongs to
    pub source_url: String,

    /// Platform comment identifier, when the source exposes one
    pub comment_id: Option<String>,
}

impl Comment {
    /// Key used to drop a comment delivered twice within one run.
    ///
    /// Comments without a platform id are never treated as duplicates.
    pub fn dedup_key(&self) -> Option<(&str, &str)> {
        self.comment_id
            .as_deref()
            .map(|id| (self.source_item_id.as_str(), id))
    }
}

/// Outcome of one harvest run, returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestReport {
    /// Source variant the run used
    pub source: SourceKind,

    /// Rows written to the export
    pub comment_count: usize,

    /// Resolved path of the export file
    pub exported_path: PathBuf,

    /// Distinct content items inside the window
    pub items_seen: usize,

    /// Items dropped by the item-level exclusion markers
    pub items_skipped: usize,

    /// Items whose comment harvest failed part-way
    pub items_failed: usize,

    /// Comments dropped by the exclusion keywords
    pub comments_excluded: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
