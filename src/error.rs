//! Error types for Stormdeck
//!
//! Defines a comprehensive error enum covering all failure modes across the system.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for Stormdeck operations
pub type Result<T> = std::result::Result<T, StormdeckError>;

/// Comprehensive error type for Stormdeck operations
#[derive(Error, Debug)]
pub enum StormdeckError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level errors (no response, connect failure, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream HTTP errors (the service answered with a non-success status)
    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Locally suppressed by the sliding-window rate limiter
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed or structurally invalid response payloads
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistent store read/write failures
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Anyhow errors (for more context)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

impl crate::access::retry::RetryableError for StormdeckError {
    fn retry_decision(&self) -> crate::access::retry::RetryDecision {
        use crate::access::retry::RetryDecision;

        match self {
            // Retryable errors
            StormdeckError::Network(_) => RetryDecision::Retry,
            StormdeckError::Upstream { status, .. } => match status {
                500..=599 => RetryDecision::Retry,
                _ => RetryDecision::NoRetry,
            },
            StormdeckError::Http(e) => {
                // Connect failures and timeouts count as network-level failures
                if e.is_connect() || e.is_timeout() {
                    RetryDecision::Retry
                } else if e.is_status() {
                    if let Some(status) = e.status() {
                        match status.as_u16() {
                            500..=599 => RetryDecision::Retry,
                            _ => RetryDecision::NoRetry,
                        }
                    } else {
                        RetryDecision::NoRetry
                    }
                } else {
                    RetryDecision::NoRetry
                }
            }
            // Non-retryable errors
            StormdeckError::Config(_) => RetryDecision::NoRetry,
            StormdeckError::RateLimited(_) => RetryDecision::NoRetry,
            StormdeckError::Validation(_) => RetryDecision::NoRetry,
            StormdeckError::Storage(_) => RetryDecision::NoRetry,
            StormdeckError::Io(_) => RetryDecision::NoRetry,
            StormdeckError::Json(_) => RetryDecision::NoRetry,
            StormdeckError::Yaml(_) => RetryDecision::NoRetry,
            StormdeckError::Database(_) => RetryDecision::NoRetry,
            StormdeckError::Other(_) => RetryDecision::NoRetry,
            StormdeckError::Anyhow(_) => RetryDecision::NoRetry,
        }
    }
}
