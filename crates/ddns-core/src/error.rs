//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing credentials, unknown provider, unresolved zone)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Public IP resolution errors
    #[error("IP resolution error: {0}")]
    IpResolution(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport errors (timeouts, refused connections, non-2xx status)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider client was never initialized for this deployment
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Notification delivery errors
    #[error("Notification error: {0}")]
    Notify(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IP resolution error
    pub fn ip_resolution(msg: impl Into<String>) -> Self {
        Self::IpResolution(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an "unavailable" error for an uninitialized provider
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a notification error
    pub fn notify(msg: impl Into<String>) -> Self {
        Self::Notify(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status to the matching error variant
    ///
    /// 401/403 → `Authentication`, 404 → `NotFound`, 429 → `RateLimited`,
    /// anything else → `Provider` carrying the response body.
    pub fn from_status(provider: &str, status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::auth(format!(
                "{provider} rejected the credentials (status {status}): {body}"
            )),
            404 => Self::NotFound(format!("{provider} returned 404: {body}")),
            429 => Self::RateLimited(format!(
                "{provider} rate limit exceeded (status {status})"
            )),
            500..=599 => Self::provider(
                provider,
                format!("server error (transient): {status} - {body}"),
            ),
            _ => Self::provider(provider, format!("request failed: {status} - {body}")),
        }
    }
}
