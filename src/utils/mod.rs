//! Utility functions and helpers.

pub mod http;
pub mod log;
pub mod retry;

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static POST_PATH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/(?:p|reel|tv)/([A-Za-z0-9_-]+)").ok());

/// Extract a post shortcode from an Instagram URL.
///
/// Matches `/p/{code}`, `/reel/{code}` and `/tv/{code}`, with or without
/// a leading account segment.
pub fn extract_post_id(url: &str) -> Option<String> {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());

    POST_PATH
        .as_ref()?
        .captures(&path)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Join an endpoint path onto an API root without losing the root's own path.
pub fn endpoint(base_url: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    Url::parse(&base)?.join(path.trim_start_matches('/'))
}
