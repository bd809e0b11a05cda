// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed date string or inverted range
    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// Identifier resolution returned nothing
    #[error("{stage}: no match for '{name}'")]
    NotFound { stage: String, name: String },

    /// Transport, quota or parsing failure reported by a source
    #[error("Source error during {stage} for {context}: {message}")]
    Source {
        stage: String,
        context: String,
        status: Option<u16>,
        message: String,
    },

    /// Tabular sink could not write the export
    #[error("Export to {path} failed: {message}")]
    Export { path: String, message: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSV encoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Run was cancelled by the caller
    #[error("Harvest cancelled")]
    Cancelled,
}

impl AppError {
    /// Create an invalid window error.
    pub fn invalid_window(message: impl Into<String>) -> Self {
        Self::InvalidWindow(message.into())
    }

    /// Create a not-found error for a resolution stage.
    pub fn not_found(stage: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            stage: stage.into(),
            name: name.into(),
        }
    }

    /// Create a source error without an HTTP status.
    pub fn source(
        stage: impl Into<String>,
        context: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Source {
            stage: stage.into(),
            context: context.into(),
            status: None,
            message: message.to_string(),
        }
    }

    /// Create a source error carrying the HTTP status the source answered with.
    pub fn source_status(
        stage: impl Into<String>,
        context: impl Into<String>,
        status: u16,
        message: impl fmt::Display,
    ) -> Self {
        Self::Source {
            stage: stage.into(),
            context: context.into(),
            status: Some(status),
            message: message.to_string(),
        }
    }

    /// Create an export error for the given target path.
    pub fn export(path: &Path, message: impl fmt::Display) -> Self {
        Self::Export {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status attached to a source error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Source { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, connection failures, HTTP 429 and 5xx answers are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
            }
            Self::Source {
                status: Some(status),
                ..
            } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}
