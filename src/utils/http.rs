// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::Response;

use crate::error::{AppError, Result};
use crate::models::YouTubeConfig;

/// Create a configured asynchronous HTTP client for the REST source.
pub fn create_async_client(config: &YouTubeConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Create a client for talking to a local WebDriver endpoint.
///
/// The timeout must outlast the slowest browser command (page loads).
pub fn create_driver_client(timeout_secs: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?;
    Ok(client)
}

/// Turn a non-success response into a `Source` error carrying its status and body.
pub async fn ensure_success(response: Response, stage: &str, context: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::source_status(
        stage,
        context,
        status.as_u16(),
        if body.is_empty() {
            status.to_string()
        } else {
            body
        },
    ))
}
