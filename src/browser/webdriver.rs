// src/browser/webdriver.rs

//! W3C WebDriver client over HTTP.
//!
//! Talks to chromedriver (or any W3C endpoint) directly with reqwest. One
//! client owns exactly one browser session.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use crate::browser::{BrowserDriver, ElementId, Locator};
use crate::error::{AppError, Result};
use crate::models::InstagramConfig;
use crate::utils::{endpoint, http::create_driver_client};

/// Key under which W3C endpoints return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Slack added to the page-load timeout for the HTTP client itself.
const HTTP_TIMEOUT_SLACK_SECS: u64 = 30;

/// Decoded WebDriver reply.
enum Reply {
    Value(Value),
    NoSuchElement,
}

/// A live WebDriver session.
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
    closed: AtomicBool,
}

impl WebDriverClient {
    /// Start a Chrome session on the configured WebDriver endpoint.
    pub async fn connect(config: &InstagramConfig) -> Result<Self> {
        let http = create_driver_client(config.page_load_timeout_secs + HTTP_TIMEOUT_SLACK_SECS)?;

        let mut args = vec!["--no-sandbox", "--disable-dev-shm-usage"];
        if config.headless {
            args.push("--headless=new");
        }
        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args }
                }
            }
        });

        let url = endpoint(&config.webdriver_url, "session")?;
        let response = http.post(url).json(&capabilities).send().await?;
        let value = match decode(response, "new session").await? {
            Reply::Value(value) => value,
            Reply::NoSuchElement => {
                return Err(AppError::source("new session", "webdriver", "unexpected reply"));
            }
        };
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::source("new session", "webdriver", "missing sessionId"))?
            .to_string();

        log::info!("WebDriver session {} started", session_id);

        let client = Self {
            http,
            base_url: config.webdriver_url.clone(),
            session_id,
            closed: AtomicBool::new(false),
        };
        let timeouts = client
            .command(
                Method::POST,
                "timeouts",
                Some(json!({ "pageLoad": config.page_load_timeout_secs * 1000 })),
            )
            .await;
        if let Err(e) = timeouts {
            // no source owns the session yet, release it here
            if let Err(close_err) = client.close().await {
                log::warn!("Closing session {} failed: {}", client.session_id, close_err);
            }
            return Err(e);
        }
        Ok(client)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Reply> {
        let path = if path.is_empty() {
            format!("session/{}", self.session_id)
        } else {
            format!("session/{}/{}", self.session_id, path)
        };
        let url = endpoint(&self.base_url, &path)?;

        let mut request = self.http.request(method, url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        decode(response, &path).await
    }

    async fn value(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        match self.command(method, path, body).await? {
            Reply::Value(value) => Ok(value),
            Reply::NoSuchElement => Err(AppError::source(path, &self.session_id, "no such element")),
        }
    }

    fn locator_body(locator: &Locator) -> Value {
        json!({ "using": locator.strategy(), "value": locator.value() })
    }
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn goto(&self, url: &str) -> Result<()> {
        self.value(Method::POST, "url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn current_url(&self) -> Result<String> {
        let value = self.value(Method::GET, "url", None).await?;
        value
            .as_str()
            .map(String::from)
            .ok_or_else(|| AppError::source("url", &self.session_id, "url is not a string"))
    }

    async fn find(&self, locator: &Locator) -> Result<Option<ElementId>> {
        match self
            .command(Method::POST, "element", Some(Self::locator_body(locator)))
            .await?
        {
            Reply::Value(value) => Ok(element_ref(&value)),
            Reply::NoSuchElement => Ok(None),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementId>> {
        match self
            .command(Method::POST, "elements", Some(Self::locator_body(locator)))
            .await?
        {
            Reply::Value(Value::Array(items)) => Ok(items.iter().filter_map(element_ref).collect()),
            Reply::Value(_) | Reply::NoSuchElement => Ok(Vec::new()),
        }
    }

    async fn find_within(
        &self,
        parent: &ElementId,
        locator: &Locator,
    ) -> Result<Option<ElementId>> {
        let path = format!("element/{}/element", parent.0);
        match self
            .command(Method::POST, &path, Some(Self::locator_body(locator)))
            .await?
        {
            Reply::Value(value) => Ok(element_ref(&value)),
            Reply::NoSuchElement => Ok(None),
        }
    }

    async fn click(&self, element: &ElementId) -> Result<()> {
        let path = format!("element/{}/click", element.0);
        self.value(Method::POST, &path, Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> Result<()> {
        let path = format!("element/{}/value", element.0);
        self.value(Method::POST, &path, Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    async fn text(&self, element: &ElementId) -> Result<String> {
        let path = format!("element/{}/text", element.0);
        let value = self.value(Method::GET, &path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, element: &ElementId, name: &str) -> Result<Option<String>> {
        let path = format!("element/{}/attribute/{}", element.0, name);
        let value = self.value(Method::GET, &path, None).await?;
        Ok(value.as_str().map(String::from))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.value(Method::DELETE, "", None).await?;
        log::info!("WebDriver session {} closed", self.session_id);
        Ok(())
    }
}

/// Decode a WebDriver response body into its `value`, mapping protocol errors.
async fn decode(response: reqwest::Response, context: &str) -> Result<Reply> {
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if status.is_success() {
        return Ok(Reply::Value(value));
    }

    let error = value.get("error").and_then(Value::as_str).unwrap_or_default();
    if error == "no such element" {
        return Ok(Reply::NoSuchElement);
    }

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(error)
        .to_string();
    Err(AppError::source_status(
        "webdriver",
        context,
        status.as_u16(),
        format!("{error}: {message}"),
    ))
}

fn element_ref(value: &Value) -> Option<ElementId> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
}
