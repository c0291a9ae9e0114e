//! Error types for cfddns
//!
//! Per-family problems (a failed echo request, a failed patch) are not errors
//! at this level: they are absorbed into `AddressSnapshot` and `UpdateOutcome`.
//! What remains here is what aborts a cycle or prevents startup.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for cfddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cfddns
#[derive(Error, Debug)]
pub enum Error {
    /// Address resolution errors (single echo request)
    #[error("Address resolution error: {0}")]
    Resolution(String),

    /// The zone record set could not be fetched; aborts the whole cycle
    #[error("Zone directory lookup failed: {source}")]
    Directory {
        /// The underlying collaborator error
        #[source]
        source: Box<Error>,
    },

    /// The cycle did not finish before its deadline
    #[error("Watch cycle timed out after {0:?}")]
    CycleTimeout(Duration),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Zone or record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Wrap a collaborator error as a directory failure
    pub fn directory(source: Error) -> Self {
        Self::Directory {
            source: Box::new(source),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error aborted a cycle because the record set was unavailable
    pub fn is_directory_failure(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }

    /// Whether this error is a cycle deadline expiry
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::CycleTimeout(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
