//! Tabular export of harvested comments.
//!
//! Every source exports the same three columns (date, comment text, item
//! URL). Only the header labels differ, see [`ColumnLabels`].
//!
//! ```text
//! {output_dir}/
//! ├── youtube_comments.csv     # published_at,comment,video_url
//! └── instagram_comments.csv   # date,comment,link
//! ```

pub mod local;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Comment, HeaderStyle};
use crate::source::SourceKind;

// Re-export for convenience
pub use local::CsvSink;

/// Date format of the exported date column.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header row of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLabels {
    pub published_at: &'static str,
    pub comment: &'static str,
    pub source_url: &'static str,
}

impl ColumnLabels {
    /// Labels of the REST API export.
    pub const API: Self = Self {
        published_at: "published_at",
        comment: "comment",
        source_url: "video_url",
    };

    /// Labels of the browser automation export.
    pub const AUTOMATION: Self = Self {
        published_at: "date",
        comment: "comment",
        source_url: "link",
    };

    /// Labels shared by all sources.
    pub const UNIFIED: Self = Self {
        published_at: "published_at",
        comment: "comment",
        source_url: "source_url",
    };

    pub fn for_source(kind: SourceKind, style: HeaderStyle) -> Self {
        match (style, kind) {
            (HeaderStyle::Unified, _) => Self::UNIFIED,
            (HeaderStyle::Source, SourceKind::YouTube) => Self::API,
            (HeaderStyle::Source, SourceKind::Instagram) => Self::AUTOMATION,
        }
    }

    pub fn as_array(&self) -> [&'static str; 3] {
        [self.published_at, self.comment, self.source_url]
    }
}

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRow {
    pub published_at: String,
    pub comment: String,
    pub source_url: String,
}

impl From<&Comment> for ExportRow {
    fn from(comment: &Comment) -> Self {
        Self {
            published_at: comment.published_at.format(DATE_FORMAT).to_string(),
            comment: comment.text.clone(),
            source_url: comment.source_url.clone(),
        }
    }
}

/// Materialized export: labels plus rows, detached from the comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    labels: ColumnLabels,
    rows: Vec<ExportRow>,
}

impl ExportTable {
    pub fn new(labels: ColumnLabels, rows: Vec<ExportRow>) -> Self {
        Self { labels, rows }
    }

    /// Project comments in their current order.
    pub fn from_comments(labels: ColumnLabels, comments: &[Comment]) -> Self {
        Self::new(labels, comments.iter().map(ExportRow::from).collect())
    }

    pub fn labels(&self) -> ColumnLabels {
        self.labels
    }

    pub fn rows(&self) -> &[ExportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Trait for export backends.
#[async_trait]
pub trait TabularSink: Send + Sync {
    /// Write `table` to `path`, replacing any existing file and creating
    /// missing parent directories. Returns the resolved path.
    async fn write(&self, table: &ExportTable, path: &Path) -> Result<PathBuf>;
}
