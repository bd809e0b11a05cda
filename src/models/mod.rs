// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod content;
mod window;

// Re-export all public types
pub use config::{
    Config, Credentials, ExportConfig, FilterConfig, HarvestConfig, HeaderStyle, InstagramConfig,
    InstagramSelectors, LoggingConfig, RetryConfig, YouTubeConfig,
};
pub use content::{Comment, ContentItem, HarvestReport};
pub use window::{TimeWindow, WindowPosition, offset_from_hours, parse_timestamp};
