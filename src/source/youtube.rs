// src/source/youtube.rs

//! YouTube Data API v3 source.
//!
//! Resolution uses `search?type=channel`, content listing uses
//! `search?type=video&order=date` bounded by `publishedAfter` /
//! `publishedBefore`, and comments come from `commentThreads`. Every page
//! follows `nextPageToken` until it is absent.

use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::{
    Comment, ContentItem, TimeWindow, WindowPosition, YouTubeConfig, parse_timestamp,
};
use crate::source::{CommentSource, SourceKind};
use crate::utils::endpoint;
use crate::utils::http::{create_async_client, ensure_success};
use crate::utils::retry::RetryPolicy;

/// Status and reason the API answers with when comments are disabled on a video.
const COMMENTS_DISABLED_STATUS: u16 = 403;
const COMMENTS_DISABLED_REASON: &str = "commentsDisabled";

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelHit {
    id: ChannelRef,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelRef {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoHit {
    id: VideoRef,
    snippet: VideoSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRef {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    title: String,
    published_at: String,
}

#[derive(Debug, Deserialize)]
struct CommentThread {
    snippet: ThreadSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Deserialize)]
struct TopLevelComment {
    #[serde(default)]
    id: Option<String>,
    snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_display: String,
    published_at: String,
}

/// Error body of a failed API call.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    errors: Vec<ErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ErrorReason {
    #[serde(default)]
    reason: String,
}

/// A 403 means "comments disabled" only when the body says so. Quota and
/// permission 403s stay errors.
fn is_comments_disabled(err: &AppError) -> bool {
    let AppError::Source {
        status: Some(COMMENTS_DISABLED_STATUS),
        message,
        ..
    } = err
    else {
        return false;
    };
    serde_json::from_str::<ErrorBody>(message).is_ok_and(|body| {
        body.error
            .errors
            .iter()
            .any(|e| e.reason == COMMENTS_DISABLED_REASON)
    })
}

/// REST API source.
pub struct YouTubeSource {
    client: reqwest::Client,
    config: YouTubeConfig,
    api_key: String,
    retry: RetryPolicy,
}

impl YouTubeSource {
    pub fn new(config: &YouTubeConfig, api_key: &str, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            config: config.clone(),
            api_key: api_key.to_string(),
            retry,
        })
    }

    /// GET one page of `path`, retrying transient failures.
    async fn get_page<T: DeserializeOwned>(
        &self,
        stage: &str,
        context: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Page<T>> {
        let url = endpoint(&self.config.base_url, path)?;
        let url = &url;
        let label = format!("{stage} ({context})");

        self.retry
            .run(&label, move || async move {
                let response = self
                    .client
                    .get(url.clone())
                    .query(query)
                    .query(&[("key", self.api_key.as_str())])
                    .send()
                    .await
                    .map_err(|e| AppError::Http(e.without_url()))?;
                let response = ensure_success(response, stage, context).await?;
                response
                    .json::<Page<T>>()
                    .await
                    .map_err(|e| AppError::source(stage, context, e.without_url()))
            })
            .await
    }

    fn watch_url(&self, video_id: &str) -> String {
        format!("{}{}", self.config.watch_url, video_id)
    }

    fn to_item(&self, channel_id: &str, hit: VideoHit) -> Result<Option<ContentItem>> {
        let Some(id) = hit.id.video_id else {
            log::debug!("Listing for {} returned a hit without videoId", channel_id);
            return Ok(None);
        };
        let published_at = parse_timestamp(&hit.snippet.published_at).ok_or_else(|| {
            AppError::source(
                "list videos",
                &id,
                format!("invalid publishedAt '{}'", hit.snippet.published_at),
            )
        })?;

        Ok(Some(ContentItem {
            url: self.watch_url(&id),
            title: hit.snippet.title,
            published_at,
            body_text: None,
            id,
        }))
    }
}

#[async_trait]
impl CommentSource for YouTubeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    async fn resolve_identifier(&self, name: &str) -> Result<String> {
        let query = [
            ("part", "snippet".to_string()),
            ("q", name.to_string()),
            ("type", "channel".to_string()),
            ("maxResults", "1".to_string()),
        ];
        let page: Page<ChannelHit> = self
            .get_page("resolve channel", name, "search", &query)
            .await?;

        page.items
            .into_iter()
            .find_map(|hit| hit.id.channel_id)
            .ok_or_else(|| AppError::not_found("resolve channel", name))
    }

    fn enumerate_content<'a>(
        &'a self,
        channel_id: &'a str,
        window: &'a TimeWindow,
    ) -> BoxStream<'a, Result<ContentItem>> {
        Box::pin(try_stream! {
            let mut page_token: Option<String> = None;
            let mut page_no = 0usize;

            loop {
                page_no += 1;
                let mut query = vec![
                    ("part", "id,snippet".to_string()),
                    ("channelId", channel_id.to_string()),
                    ("maxResults", self.config.content_page_size.to_string()),
                    ("order", "date".to_string()),
                    ("type", "video".to_string()),
                    ("publishedAfter", window.start_rfc3339()),
                    ("publishedBefore", window.end_rfc3339()),
                ];
                if let Some(token) = &page_token {
                    query.push(("pageToken", token.clone()));
                }

                let page: Page<VideoHit> = self
                    .get_page("list videos", channel_id, "search", &query)
                    .await?;
                log::debug!(
                    "Video page {} for {}: {} items",
                    page_no,
                    channel_id,
                    page.items.len()
                );

                for hit in page.items {
                    let Some(item) = self.to_item(channel_id, hit)? else {
                        continue;
                    };
                    match window.position(&item.published_at) {
                        WindowPosition::After => {
                            log::debug!("Video {} is newer than the window, skipping", item.id);
                        }
                        WindowPosition::Before => {
                            log::debug!("Video {} is older than the window, stopping", item.id);
                            return;
                        }
                        WindowPosition::Inside => yield item,
                    }
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        })
    }

    fn enumerate_comments<'a>(
        &'a self,
        item: &'a ContentItem,
        window: &'a TimeWindow,
    ) -> BoxStream<'a, Result<Comment>> {
        Box::pin(try_stream! {
            let mut page_token: Option<String> = None;

            loop {
                let mut query = vec![
                    ("part", "snippet".to_string()),
                    ("videoId", item.id.clone()),
                    ("textFormat", "plainText".to_string()),
                    ("maxResults", self.config.comment_page_size.to_string()),
                ];
                if let Some(token) = &page_token {
                    query.push(("pageToken", token.clone()));
                }

                let page = self
                    .get_page::<CommentThread>("list comments", &item.id, "commentThreads", &query)
                    .await;
                let page = match page {
                    Err(e) if is_comments_disabled(&e) => {
                        log::warn!("Comments disabled for video {}, skipping", item.id);
                        return;
                    }
                    other => other?,
                };

                for thread in page.items {
                    let TopLevelComment { id, snippet } = thread.snippet.top_level_comment;
                    let Some(published_at) = parse_timestamp(&snippet.published_at) else {
                        log::debug!(
                            "Skipping comment on {} with invalid publishedAt '{}'",
                            item.id,
                            snippet.published_at
                        );
                        continue;
                    };
                    yield Comment {
                        text: snippet.text_display,
                        published_at: window.local_date(&published_at),
                        source_item_id: item.id.clone(),
                        source_title: item.title.clone(),
                        source_url: item.url.clone(),
                        comment_id: id,
                    };
                }

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
