//! Browser automation capability.
//!
//! The automation source drives a page through [`BrowserDriver`]. Lookups
//! return `Ok(None)` / an empty list when nothing matches, so "element not
//! present" stays distinct from a transport failure.

mod webdriver;

pub use webdriver::WebDriverClient;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::Result;

/// How to locate an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// Strategy name as used by the WebDriver protocol.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::XPath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::XPath(v) => v,
        }
    }
}

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// Operations the harvester needs from a browser session.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to `url` and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<()>;

    /// URL of the current page.
    async fn current_url(&self) -> Result<String>;

    /// First element matching `locator`, if any.
    async fn find(&self, locator: &Locator) -> Result<Option<ElementId>>;

    /// All elements matching `locator`.
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementId>>;

    /// First descendant of `parent` matching `locator`, if any.
    async fn find_within(&self, parent: &ElementId, locator: &Locator)
    -> Result<Option<ElementId>>;

    async fn click(&self, element: &ElementId) -> Result<()>;

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<()>;

    /// Rendered text of the element.
    async fn text(&self, element: &ElementId) -> Result<String>;

    /// Attribute value, `None` if the attribute is absent.
    async fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>>;

    /// End the session. Must be safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Poll until `locator` matches or `timeout` elapses.
///
/// Returns `Ok(None)` on timeout; driver errors are returned as-is.
pub async fn wait_for(
    driver: &dyn BrowserDriver,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<Option<ElementId>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(element) = driver.find(locator).await? {
            return Ok(Some(element));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(poll).await;
    }
}

/// Poll until at least one element matches `locator` or `timeout` elapses.
pub async fn wait_for_all(
    driver: &dyn BrowserDriver,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> Result<Vec<ElementId>> {
    let deadline = Instant::now() + timeout;
    loop {
        let found = driver.find_all(locator).await?;
        if !found.is_empty() || Instant::now() >= deadline {
            return Ok(found);
        }
        tokio::time::sleep(poll).await;
    }
}
