// src/services/filter.rs

//! Keyword exclusion.
//!
//! A text is excluded when it contains any keyword of the set, compared
//! case-insensitively as a plain substring.

use serde::{Deserialize, Serialize};

use crate::models::Comment;

/// Lower-cased exclusion keywords, fixed for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExclusionSet {
    keywords: Vec<String>,
}

impl ExclusionSet {
    /// Build a set from raw keywords; blank entries are ignored.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        keywords.sort();
        keywords.dedup();
        Self { keywords }
    }

    /// Whether `text` contains any keyword.
    pub fn matches(&self, text: &str) -> bool {
        if self.keywords.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
    }

    /// First keyword found in `text`, for diagnostics.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }

    /// Keep only comments that match no keyword.
    pub fn retain_comments(&self, comments: Vec<Comment>) -> Vec<Comment> {
        comments
            .into_iter()
            .filter(|c| !self.matches(&c.text))
            .collect()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl From<Vec<String>> for ExclusionSet {
    fn from(keywords: Vec<String>) -> Self {
        Self::new(keywords)
    }
}

impl From<ExclusionSet> for Vec<String> {
    fn from(set: ExclusionSet) -> Self {
        set.keywords
    }
}
