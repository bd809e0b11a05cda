// src/source/instagram.rs

//! Instagram source driven through a browser session.
//!
//! The profile page has no date filter, so enumeration opens the newest post
//! and walks the post viewer with its "next" control, classifying each post
//! by its rendered timestamp. Comments are read from the open post after
//! expanding every "load more" control.

use std::collections::HashSet;
use std::time::Duration;

use async_stream::{stream, try_stream};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use futures::stream::BoxStream;

use crate::browser::{BrowserDriver, ElementId, Locator, wait_for, wait_for_all};
use crate::error::{AppError, Result};
use crate::models::{
    Comment, ContentItem, InstagramConfig, TimeWindow, WindowPosition, parse_timestamp,
};
use crate::source::{CommentSource, SourceKind};
use crate::utils::{endpoint, extract_post_id};

/// Progress of the "load more comments" loop on one post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadState {
    /// Rendered comments are visible; a "load more" control may remain
    Listing,
    /// A "load more" click was issued and the list is re-rendering
    LoadingMore,
    /// No control left, or the click ceiling was reached
    Exhausted,
}

/// Post currently shown in the viewer.
struct OpenPost {
    id: String,
    url: String,
    published_at: DateTime<FixedOffset>,
}

/// Browser automation source.
pub struct InstagramSource {
    driver: Box<dyn BrowserDriver>,
    config: InstagramConfig,
    username: String,
    password: String,
}

impl InstagramSource {
    pub fn new(
        driver: Box<dyn BrowserDriver>,
        config: InstagramConfig,
        username: &str,
        password: &str,
    ) -> Self {
        Self {
            driver,
            config,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.config.page_load_timeout_secs)
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.config.element_timeout_secs)
    }

    fn short_timeout(&self) -> Duration {
        Duration::from_secs(self.config.short_timeout_secs)
    }

    fn poll(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    async fn pause(&self, millis: u64) {
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    async fn wait(&self, selector: &str, timeout: Duration) -> Result<Option<ElementId>> {
        wait_for(
            self.driver.as_ref(),
            &Locator::css(selector),
            timeout,
            self.poll(),
        )
        .await
    }

    /// Fill in and submit the login form.
    async fn login(&self) -> Result<()> {
        let selectors = &self.config.selectors;
        let url = endpoint(&self.config.base_url, "accounts/login/")?;
        self.driver.goto(url.as_str()).await?;

        let username = self
            .wait(&selectors.username_field, self.page_load_timeout())
            .await?
            .ok_or_else(|| AppError::source("login", url.as_str(), "login form did not render"))?;
        self.driver.send_keys(&username, &self.username).await?;

        let password = self
            .driver
            .find(&Locator::css(&selectors.password_field))
            .await?
            .ok_or_else(|| AppError::source("login", url.as_str(), "password field missing"))?;
        self.driver.send_keys(&password, &self.password).await?;

        let submit = self
            .driver
            .find(&Locator::css(&selectors.submit_button))
            .await?
            .ok_or_else(|| AppError::source("login", url.as_str(), "submit button missing"))?;
        self.driver.click(&submit).await?;

        self.pause(self.config.login_delay_ms).await;
        log::info!("Submitted login for {}", self.username);
        Ok(())
    }

    /// Open the profile and click its newest post.
    async fn open_first_post(&self, account: &str) -> Result<bool> {
        let url = endpoint(&self.config.base_url, &format!("{account}/"))?;
        self.driver.goto(url.as_str()).await?;

        let Some(post) = self
            .wait(&self.config.selectors.post_link, self.element_timeout())
            .await?
        else {
            return Ok(false);
        };
        self.driver.click(&post).await?;
        self.pause(self.config.settle_delay_ms).await;
        Ok(true)
    }

    /// Identify the post in the viewer by its URL and timestamp.
    async fn read_open_post(&self) -> Result<OpenPost> {
        let url = self.driver.current_url().await?;
        let time = self
            .wait(&self.config.selectors.post_time, self.element_timeout())
            .await?
            .ok_or_else(|| AppError::source("read post", &url, "timestamp not rendered"))?;
        let raw = self
            .driver
            .attribute(&time, "datetime")
            .await?
            .unwrap_or_default();
        let published_at = parse_timestamp(&raw).ok_or_else(|| {
            AppError::source("read post", &url, format!("invalid datetime '{raw}'"))
        })?;

        Ok(OpenPost {
            id: extract_post_id(&url).unwrap_or_else(|| url.clone()),
            url,
            published_at,
        })
    }

    /// Body text of the open post, `None` when the caption never renders.
    async fn read_body(&self) -> Result<Option<String>> {
        match self
            .wait(&self.config.selectors.post_body, self.short_timeout())
            .await?
        {
            Some(body) => Ok(Some(self.driver.text(&body).await?)),
            None => Ok(None),
        }
    }

    /// Click "next" in the post viewer. `false` when there is no next post.
    async fn advance(&self) -> Result<bool> {
        let Some(next) = self
            .wait(&self.config.selectors.next_button, self.short_timeout())
            .await?
        else {
            return Ok(false);
        };
        self.driver.click(&next).await?;
        self.pause(self.config.settle_delay_ms).await;
        Ok(true)
    }

    /// Click "load more" until it disappears or the ceiling is hit.
    ///
    /// Returns the number of clicks issued.
    async fn expand_comments(&self, item_id: &str) -> Result<usize> {
        let ceiling = self.config.max_load_more;
        let mut clicks = 0;
        let mut state = LoadState::Listing;

        loop {
            state = match state {
                LoadState::Listing => {
                    match self
                        .wait(&self.config.selectors.load_more_button, self.short_timeout())
                        .await?
                    {
                        Some(_) if clicks >= ceiling => {
                            log::warn!(
                                "Post {}: stopped loading comments after {} clicks",
                                item_id,
                                clicks
                            );
                            LoadState::Exhausted
                        }
                        Some(button) => {
                            self.driver.click(&button).await?;
                            clicks += 1;
                            LoadState::LoadingMore
                        }
                        None => LoadState::Exhausted,
                    }
                }
                LoadState::LoadingMore => {
                    self.pause(self.config.load_more_delay_ms).await;
                    LoadState::Listing
                }
                LoadState::Exhausted => return Ok(clicks),
            };
        }
    }

    /// Parse one rendered comment node. `None` for nodes that are not comments.
    async fn read_comment(
        &self,
        node: &ElementId,
        item: &ContentItem,
        window: &TimeWindow,
    ) -> Result<Option<Comment>> {
        let selectors = &self.config.selectors;

        let Some(text_el) = self
            .driver
            .find_within(node, &Locator::css(&selectors.comment_text))
            .await?
        else {
            return Ok(None);
        };
        let text = self.driver.text(&text_el).await?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let Some(time_el) = self
            .driver
            .find_within(node, &Locator::css(&selectors.comment_time))
            .await?
        else {
            return Ok(None);
        };
        let raw = self
            .driver
            .attribute(&time_el, "datetime")
            .await?
            .unwrap_or_default();
        let Some(published_at) = parse_timestamp(&raw) else {
            return Ok(None);
        };

        let comment_id = match self
            .driver
            .find_within(node, &Locator::css(&selectors.comment_link))
            .await?
        {
            Some(link) => self.driver.attribute(&link, "href").await?,
            None => None,
        };

        Ok(Some(Comment {
            text,
            published_at: window.local_date(&published_at),
            source_item_id: item.id.clone(),
            source_title: item.title.clone(),
            source_url: item.url.clone(),
            comment_id,
        }))
    }
}

/// First non-empty line of a post body.
fn title_from_body(body: Option<&str>, fallback: &str) -> String {
    body.and_then(|b| b.lines().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or(fallback)
        .to_string()
}

#[async_trait]
impl CommentSource for InstagramSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Instagram
    }

    /// Log in, then confirm the profile renders at least one post.
    async fn resolve_identifier(&self, account: &str) -> Result<String> {
        let handle = account.trim().trim_start_matches('@').trim_matches('/');
        if handle.is_empty() {
            return Err(AppError::not_found("resolve account", account));
        }

        self.login().await?;

        let url = endpoint(&self.config.base_url, &format!("{handle}/"))?;
        self.driver.goto(url.as_str()).await?;
        match self
            .wait(&self.config.selectors.post_link, self.page_load_timeout())
            .await?
        {
            Some(_) => Ok(handle.to_string()),
            None => Err(AppError::not_found("resolve account", account)),
        }
    }

    fn enumerate_content<'a>(
        &'a self,
        account: &'a str,
        window: &'a TimeWindow,
    ) -> BoxStream<'a, Result<ContentItem>> {
        Box::pin(stream! {
            match self.open_first_post(account).await {
                Ok(true) => {}
                Ok(false) => {
                    log::info!("Profile {} has no posts", account);
                    return;
                }
                Err(e) => {
                    log::warn!("Could not open first post of {}: {}", account, e);
                    return;
                }
            }

            let mut visited: HashSet<String> = HashSet::new();
            loop {
                if visited.len() >= self.config.max_items {
                    log::warn!(
                        "Visited {} posts of {}, stopping",
                        visited.len(),
                        account
                    );
                    break;
                }

                let post = match self.read_open_post().await {
                    Ok(post) => post,
                    Err(e) => {
                        log::warn!("Post page of {} failed, ending: {}", account, e);
                        break;
                    }
                };
                if !visited.insert(post.id.clone()) {
                    log::warn!("Post {} seen again, viewer did not advance", post.id);
                    break;
                }

                match window.position(&post.published_at) {
                    WindowPosition::After => {
                        log::debug!("Post {} is newer than the window, skipping", post.id);
                    }
                    WindowPosition::Before => {
                        log::debug!("Post {} is older than the window, stopping", post.id);
                        break;
                    }
                    WindowPosition::Inside => {
                        let body_text = match self.read_body().await {
                            Ok(body) => body,
                            Err(e) => {
                                log::warn!("Post {} body failed, ending: {}", post.id, e);
                                break;
                            }
                        };
                        yield Ok(ContentItem {
                            title: title_from_body(body_text.as_deref(), &post.id),
                            id: post.id,
                            published_at: post.published_at,
                            body_text,
                            url: post.url,
                        });
                    }
                }

                match self.advance().await {
                    Ok(true) => {}
                    Ok(false) => {
                        log::info!("No next post after {} posts", visited.len());
                        break;
                    }
                    Err(e) => {
                        log::warn!("Advancing past post failed, ending: {}", e);
                        break;
                    }
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
            let clicks = self.expand_comments(&item.id).await?;
            let nodes = wait_for_all(
                self.driver.as_ref(),
                &Locator::css(&self.config.selectors.comment_item),
                self.element_timeout(),
                self.poll(),
            )
            .await?;
            log::debug!(
                "Post {}: {} comment nodes after {} load-more clicks",
                item.id,
                nodes.len(),
                clicks
            );

            for node in &nodes {
                match self.read_comment(node, item, window).await {
                    Ok(Some(comment)) => yield comment,
                    Ok(None) => {}
                    Err(e) => log::debug!("Post {}: skipping malformed comment node: {}", item.id, e),
                }
            }
        })
    }

    async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}
