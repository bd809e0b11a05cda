//! Comment sources.
//!
//! A source resolves an account name, lists the account's content items
//! newest-first inside a [`TimeWindow`], and lists the comments of one item.
//! Both listings are lazy: pages are fetched only as the caller pulls.
//!
//! - [`YouTubeSource`]: YouTube Data API v3, cursor pagination
//! - [`InstagramSource`]: browser automation through a [`BrowserDriver`]
//!
//! [`BrowserDriver`]: crate::browser::BrowserDriver

mod instagram;
mod youtube;

pub use instagram::InstagramSource;
pub use youtube::YouTubeSource;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::browser::WebDriverClient;
use crate::error::{AppError, Result};
use crate::models::{Comment, Config, ContentItem, Credentials, TimeWindow};
use crate::utils::retry::RetryPolicy;

/// Which source variant a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    YouTube,
    Instagram,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::Instagram => "instagram",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "youtube" => Ok(Self::YouTube),
            "instagram" => Ok(Self::Instagram),
            other => Err(AppError::validation(format!(
                "unknown source '{other}' (expected youtube or instagram)"
            ))),
        }
    }
}

/// Identity, content and comment capability of one platform.
///
/// Implementations hold exactly one client handle or browser session;
/// [`close`](CommentSource::close) releases it and must tolerate repeated calls.
#[async_trait]
pub trait CommentSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Map a human-readable account or channel name to the platform identifier.
    ///
    /// Zero matches is [`AppError::NotFound`].
    async fn resolve_identifier(&self, name: &str) -> Result<String>;

    /// Content items of `id` inside `window`, newest first.
    ///
    /// Items after the window are skipped; the first item before it ends the
    /// sequence.
    fn enumerate_content<'a>(
        &'a self,
        id: &'a str,
        window: &'a TimeWindow,
    ) -> BoxStream<'a, Result<ContentItem>>;

    /// Raw comments of one item, dated in the window's reference zone.
    fn enumerate_comments<'a>(
        &'a self,
        item: &'a ContentItem,
        window: &'a TimeWindow,
    ) -> BoxStream<'a, Result<Comment>>;

    /// Release the underlying client or browser session.
    async fn close(&self) -> Result<()>;
}

/// Open the source selected by `kind`.
pub async fn open_source(
    config: &Config,
    credentials: &Credentials,
    kind: SourceKind,
) -> Result<Box<dyn CommentSource>> {
    match kind {
        SourceKind::YouTube => {
            let source = YouTubeSource::new(
                &config.youtube,
                credentials.api_key()?,
                RetryPolicy::from(&config.retry),
            )?;
            Ok(Box::new(source))
        }
        SourceKind::Instagram => {
            let (username, password) = credentials.login()?;
            let driver = WebDriverClient::connect(&config.instagram).await?;
            Ok(Box::new(InstagramSource::new(
                Box::new(driver),
                config.instagram.clone(),
                username,
                password,
            )))
        }
    }
}
