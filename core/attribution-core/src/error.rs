//! Error types for attribution-core operations.
//!
//! Most of the engine degrades to empty results instead of failing; these
//! variants cover the few places where a caller has to hear about a problem.

use std::path::PathBuf;

/// All errors that can occur in attribution-core operations.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    // ─────────────────────────────────────────────────────────────────────
    // Input Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid URL: {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Could not determine a default location for {0}")]
    NoDefaultPath(&'static str),

    // ─────────────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Expiry of {ttl_days} days is out of range")]
    TtlOutOfRange { ttl_days: i64 },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl AttributionError {
    pub fn invalid_url(url: &str, source: url::ParseError) -> Self {
        AttributionError::InvalidUrl {
            url: url.to_string(),
            source,
        }
    }
}

/// Convenience type alias for Results using AttributionError.
pub type Result<T> = std::result::Result<T, AttributionError>;
