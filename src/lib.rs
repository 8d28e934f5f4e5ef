//! Ticket Harvester: an unattended ticket-vendor ingestion pipeline
//!
//! This crate crawls the search pages of several ticket vendors, normalizes
//! the events and ticket tiers it finds into a common schema, persists them,
//! and periodically re-checks stored events to pick up price, availability
//! and sold-out changes.

pub mod config;
pub mod crawler;
pub mod model;
pub mod refresh;
pub mod storage;
pub mod vendors;

use thiserror::Error;

/// Main error type for harvester operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request to {url} timed out after {attempts} attempts")]
    Timeout { url: String, attempts: u32 },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("{vendor} extraction failed: {message}")]
    Extraction {
        vendor: &'static str,
        message: String,
    },

    #[error("Unrecognised date/time '{input}': {message}")]
    DateParse { input: String, message: String },

    #[error("Unrecognised price '{0}'")]
    PriceParse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("No crawler registered for vendor {0}")]
    UnknownVendor(model::VendorId),

    #[error("Event {event_id} already has a vendor event id assigned")]
    IdentityReassigned { event_id: i64 },
}

impl HarvestError {
    /// Shorthand for a markup/JSON shape error raised by a vendor adapter
    pub fn extraction(vendor: &'static str, message: impl Into<String>) -> Self {
        Self::Extraction {
            vendor,
            message: message.into(),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Unknown vendor id in config: {0}")]
    UnknownVendor(model::VendorId),
}

/// Result type alias for harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{EventInfo, TicketInfo, VendorSearchListing};
