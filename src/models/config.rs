//! Application configuration structures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::source::SourceKind;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Source selection and window settings
    #[serde(default)]
    pub harvest: HarvestConfig,

    /// Exclusion keywords
    #[serde(default)]
    pub filter: FilterConfig,

    /// Export target and header style
    #[serde(default)]
    pub export: ExportConfig,

    /// Retry policy for transient transport errors
    #[serde(default)]
    pub retry: RetryConfig,

    /// YouTube Data API settings
    #[serde(default)]
    pub youtube: YouTubeConfig,

    /// Instagram browser automation settings
    #[serde(default)]
    pub instagram: InstagramConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if !(-12..=14).contains(&self.harvest.utc_offset_hours) {
            return Err(AppError::validation(
                "harvest.utc_offset_hours must be within -12..=14",
            ));
        }
        if self.export.output_dir.as_os_str().is_empty() {
            return Err(AppError::validation("export.output_dir is empty"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(AppError::validation(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms",
            ));
        }
        if self.youtube.timeout_secs == 0 {
            return Err(AppError::validation("youtube.timeout_secs must be > 0"));
        }
        if !(1..=50).contains(&self.youtube.content_page_size) {
            return Err(AppError::validation(
                "youtube.content_page_size must be within 1..=50",
            ));
        }
        if !(1..=100).contains(&self.youtube.comment_page_size) {
            return Err(AppError::validation(
                "youtube.comment_page_size must be within 1..=100",
            ));
        }
        if self.instagram.max_items == 0 {
            return Err(AppError::validation("instagram.max_items must be > 0"));
        }
        if self.instagram.max_load_more == 0 {
            return Err(AppError::validation("instagram.max_load_more must be > 0"));
        }
        if self.instagram.element_timeout_secs == 0 || self.instagram.page_load_timeout_secs == 0 {
            return Err(AppError::validation("instagram timeouts must be > 0"));
        }
        Ok(())
    }

    /// Export path for a run, honoring an explicit override.
    pub fn export_path(&self, kind: SourceKind, override_path: Option<&Path>) -> PathBuf {
        match override_path {
            Some(path) => path.to_path_buf(),
            None => {
                let file_name = self
                    .export
                    .file_name
                    .clone()
                    .unwrap_or_else(|| format!("{}_comments.csv", kind.as_str()));
                self.export.output_dir.join(file_name)
            }
        }
    }
}

/// Source selection and window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Which source variant to run
    #[serde(default = "defaults::source")]
    pub source: SourceKind,

    /// Hours east of UTC in which caller dates are interpreted
    #[serde(default = "defaults::utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            source: defaults::source(),
            utc_offset_hours: defaults::utc_offset_hours(),
        }
    }
}

/// Exclusion keyword settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Comments containing any of these are dropped
    #[serde(default = "defaults::comment_keywords")]
    pub comment_keywords: Vec<String>,

    /// Posts whose body contains any of these are skipped with their comments
    #[serde(default = "defaults::item_markers")]
    pub item_markers: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            comment_keywords: defaults::comment_keywords(),
            item_markers: defaults::item_markers(),
        }
    }
}

/// Header row labelling for the exported table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HeaderStyle {
    /// Labels native to each source (`published_at,comment,video_url` / `date,comment,link`)
    #[default]
    Source,
    /// One label set for every source (`published_at,comment,source_url`)
    Unified,
}

/// Export target settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving export files
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    /// File name inside `output_dir` (default: `{source}_comments.csv`)
    #[serde(default)]
    pub file_name: Option<String>,

    /// Header labelling
    #[serde(default)]
    pub header_style: HeaderStyle,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            file_name: None,
            header_style: HeaderStyle::default(),
        }
    }
}

/// Bounded retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per request, including the first
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling delay
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            initial_backoff_ms: defaults::initial_backoff(),
            max_backoff_ms: defaults::max_backoff(),
        }
    }
}

/// YouTube Data API v3 settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    /// API root, overridable for tests and proxies
    #[serde(default = "defaults::youtube_base_url")]
    pub base_url: String,

    /// Prefix for exported video links
    #[serde(default = "defaults::youtube_watch_url")]
    pub watch_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Videos per listing page (API maximum 50)
    #[serde(default = "defaults::content_page_size")]
    pub content_page_size: u32,

    /// Comment threads per page (API maximum 100)
    #[serde(default = "defaults::comment_page_size")]
    pub comment_page_size: u32,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::youtube_base_url(),
            watch_url: defaults::youtube_watch_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            content_page_size: defaults::content_page_size(),
            comment_page_size: defaults::comment_page_size(),
        }
    }
}

/// Instagram browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    /// WebDriver endpoint (chromedriver, selenium)
    #[serde(default = "defaults::webdriver_url")]
    pub webdriver_url: String,

    /// Site root
    #[serde(default = "defaults::instagram_base_url")]
    pub base_url: String,

    /// Run the browser without a window
    #[serde(default)]
    pub headless: bool,

    /// Wait bound for page loads and login form
    #[serde(default = "defaults::page_load_timeout")]
    pub page_load_timeout_secs: u64,

    /// Wait bound for post timestamp and comment list
    #[serde(default = "defaults::element_timeout")]
    pub element_timeout_secs: u64,

    /// Wait bound for optional controls (next, load more, post body)
    #[serde(default = "defaults::short_timeout")]
    pub short_timeout_secs: u64,

    /// Interval between element presence checks
    #[serde(default = "defaults::poll_interval")]
    pub poll_interval_ms: u64,

    /// Pause after opening or advancing a post
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    /// Pause after each "load more comments" click
    #[serde(default = "defaults::load_more_delay")]
    pub load_more_delay_ms: u64,

    /// Pause after submitting the login form
    #[serde(default = "defaults::login_delay")]
    pub login_delay_ms: u64,

    /// Maximum distinct posts visited per run
    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// Maximum "load more comments" clicks per post
    #[serde(default = "defaults::max_load_more")]
    pub max_load_more: usize,

    /// CSS selectors for the page elements the harvester touches
    #[serde(default)]
    pub selectors: InstagramSelectors,
}

impl Default for InstagramConfig {
    fn default() -> Self {
        Self {
            webdriver_url: defaults::webdriver_url(),
            base_url: defaults::instagram_base_url(),
            headless: false,
            page_load_timeout_secs: defaults::page_load_timeout(),
            element_timeout_secs: defaults::element_timeout(),
            short_timeout_secs: defaults::short_timeout(),
            poll_interval_ms: defaults::poll_interval(),
            settle_delay_ms: defaults::settle_delay(),
            load_more_delay_ms: defaults::load_more_delay(),
            login_delay_ms: defaults::login_delay(),
            max_items: defaults::max_items(),
            max_load_more: defaults::max_load_more(),
            selectors: InstagramSelectors::default(),
        }
    }
}

/// CSS selectors used against the Instagram web UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramSelectors {
    #[serde(default = "defaults::sel_username")]
    pub username_field: String,
    #[serde(default = "defaults::sel_password")]
    pub password_field: String,
    #[serde(default = "defaults::sel_submit")]
    pub submit_button: String,
    #[serde(default = "defaults::sel_post_link")]
    pub post_link: String,
    #[serde(default = "defaults::sel_post_time")]
    pub post_time: String,
    #[serde(default = "defaults::sel_post_body")]
    pub post_body: String,
    #[serde(default = "defaults::sel_next_button")]
    pub next_button: String,
    #[serde(default = "defaults::sel_load_more")]
    pub load_more_button: String,
    #[serde(default = "defaults::sel_comment_item")]
    pub comment_item: String,
    #[serde(default = "defaults::sel_comment_text")]
    pub comment_text: String,
    #[serde(default = "defaults::sel_comment_time")]
    pub comment_time: String,
    /// Permalink inside a comment node, its `href` identifies the comment
    #[serde(default = "defaults::sel_comment_link")]
    pub comment_link: String,
}

impl Default for InstagramSelectors {
    fn default() -> Self {
        Self {
            username_field: defaults::sel_username(),
            password_field: defaults::sel_password(),
            submit_button: defaults::sel_submit(),
            post_link: defaults::sel_post_link(),
            post_time: defaults::sel_post_time(),
            post_body: defaults::sel_post_body(),
            next_button: defaults::sel_next_button(),
            load_more_button: defaults::sel_load_more(),
            comment_item: defaults::sel_comment_item(),
            comment_text: defaults::sel_comment_text(),
            comment_time: defaults::sel_comment_time(),
            comment_link: defaults::sel_comment_link(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// Secrets read once at process start.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub const API_KEY_VAR: &'static str = "YOUTUBE_API_KEY";
    pub const USERNAME_VAR: &'static str = "INSTAGRAM_USERNAME";
    pub const PASSWORD_VAR: &'static str = "INSTAGRAM_PASSWORD";

    /// Read credentials from the environment, loading `.env` first if present.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }

        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: read(Self::API_KEY_VAR),
            username: read(Self::USERNAME_VAR),
            password: read(Self::PASSWORD_VAR),
        }
    }

    /// Fail unless the secrets the given source needs are present.
    pub fn require_for(&self, kind: SourceKind) -> Result<()> {
        match kind {
            SourceKind::YouTube => self.api_key().map(|_| ()),
            SourceKind::Instagram => self.login().map(|_| ()),
        }
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::config(format!("{} is not set", Self::API_KEY_VAR)))
    }

    pub fn login(&self) -> Result<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(user), Some(pass)) => Ok((user, pass)),
            _ => Err(AppError::config(format!(
                "{} and {} must both be set",
                Self::USERNAME_VAR,
                Self::PASSWORD_VAR
            ))),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("username", &mask(&self.username))
            .field("password", &mask(&self.password))
            .finish()
    }
}

mod defaults {
    use std::path::PathBuf;

    use crate::source::SourceKind;

    // Harvest defaults
    pub fn source() -> SourceKind {
        SourceKind::YouTube
    }
    pub fn utc_offset_hours() -> i32 {
        9
    }

    // Filter defaults
    pub fn comment_keywords() -> Vec<String> {
        vec!["이벤트".into(), "참가".into()]
    }
    pub fn item_markers() -> Vec<String> {
        vec!["이벤트".into()]
    }

    // Export defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("dataset")
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn initial_backoff() -> u64 {
        500
    }
    pub fn max_backoff() -> u64 {
        8_000
    }

    // YouTube defaults
    pub fn youtube_base_url() -> String {
        "https://www.googleapis.com/youtube/v3".into()
    }
    pub fn youtube_watch_url() -> String {
        "https://www.youtube.com/watch?v=".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; comment-harvester/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn content_page_size() -> u32 {
        50
    }
    pub fn comment_page_size() -> u32 {
        100
    }

    // Instagram defaults
    pub fn webdriver_url() -> String {
        "http://localhost:9515".into()
    }
    pub fn instagram_base_url() -> String {
        "https://www.instagram.com".into()
    }
    pub fn page_load_timeout() -> u64 {
        15
    }
    pub fn element_timeout() -> u64 {
        10
    }
    pub fn short_timeout() -> u64 {
        5
    }
    pub fn poll_interval() -> u64 {
        250
    }
    pub fn settle_delay() -> u64 {
        3_000
    }
    pub fn load_more_delay() -> u64 {
        2_000
    }
    pub fn login_delay() -> u64 {
        10_000
    }
    pub fn max_items() -> usize {
        50
    }
    pub fn max_load_more() -> usize {
        50
    }

    // Selector defaults
    pub fn sel_username() -> String {
        "input[name='username']".into()
    }
    pub fn sel_password() -> String {
        "input[name='password']".into()
    }
    pub fn sel_submit() -> String {
        "button[type='submit']".into()
    }
    pub fn sel_post_link() -> String {
        "a[href*='/p/']".into()
    }
    pub fn sel_post_time() -> String {
        "time.x1p4m5qa".into()
    }
    pub fn sel_post_body() -> String {
        "div._a9zs > h1".into()
    }
    pub fn sel_next_button() -> String {
        "button._abl- > div > span > svg[aria-label=\"다음\"]".into()
    }
    pub fn sel_load_more() -> String {
        "button._abl- > div > svg[aria-label=\"댓글 더 읽어들이기\"]".into()
    }
    pub fn sel_comment_item() -> String {
        "ul li".into()
    }
    pub fn sel_comment_text() -> String {
        "span._ap3a".into()
    }
    pub fn sel_comment_time() -> String {
        "time".into()
    }
    pub fn sel_comment_link() -> String {
        "a[href*='/c/']".into()
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
}
