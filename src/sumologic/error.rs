//! Errors returned by the Sumo Logic client.

use std::time::Duration;
use thiserror::Error;

/// Result alias for client operations
pub type Result<T> = std::result::Result<T, SumoError>;

/// Sumo Logic client errors.
#[derive(Debug, Error)]
pub enum SumoError {
    /// The API answered with a non-success status
    #[error("{method} {url} failed with status {status}: {body}")]
    Api {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The `If-Match` etag was stale and the update was rejected
    #[error("{method} {url} rejected: etag is stale (status {status}): {body}")]
    EtagMismatch {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Failed to parse response from {url} (status {status}): {source}")]
    Parse {
        url: String,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The retry deadline elapsed without a successful response
    #[error("Request timed out after {timeout:?} ({attempts} attempts){}", last_error_suffix(.last_error))]
    TimeoutExceeded {
        timeout: Duration,
        attempts: u32,
        last_error: Option<String>,
    },

    #[error("Collector '{0}' not found")]
    CollectorNotFound(String),

    #[error("Source '{name}' not found on collector '{collector}'")]
    SourceNotFound { name: String, collector: String },

    #[error("Source {0} was returned without an etag")]
    MissingEtag(u64),

    #[error("{0} is not implemented yet")]
    NotImplemented(&'static str),

    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Invalid collector name pattern: {0}")]
    NamePattern(#[from] regex::Error),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    match last_error {
        Some(err) => format!(", last error: {}", err),
        None => String::new(),
    }
}

impl SumoError {
    /// Whether a failed attempt may be retried within a timeout budget.
    ///
    /// A stale etag stays stale, so retrying the same write can only hide
    /// the conflict.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SumoError::Api { .. } | SumoError::Transport(_))
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SumoError::Api { status, .. }
            | SumoError::EtagMismatch { status, .. }
            | SumoError::Parse { status, .. } => Some(*status),
            SumoError::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
