//! Error types for the HTTP client facade.
//!
//! # Design
//! One enum covers every way a call can fail. Bad statuses keep the response
//! head. Every failure that can happen after the response started keeps the
//! text read so far, since that is usually what explains the failure.

use std::time::Duration;

use thiserror::Error;

use crate::http::ResponseHead;

/// Errors returned by `Client` operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URI could not be parsed, or uses a scheme other than http/https.
    #[error("invalid URI: {0}")]
    InvalidUri(String),

    /// Connection or socket failure reported by the transport. `body` holds
    /// any response text read before the failure.
    #[error("transport error: {message}")]
    Transport { message: String, body: String },

    /// No progress within the idle timeout. The request was aborted.
    #[error("request timed out after {after:?} without activity")]
    Timeout { after: Duration, body: String },

    /// Status >= 400 that the caller did not whitelist.
    #[error("request returned bad status: {status}")]
    Status {
        status: u16,
        head: ResponseHead,
        body: String,
    },

    /// The response body is not valid JSON for the requested type.
    #[error("failed to decode response body: {message}")]
    Decode { message: String, body: String },

    /// Local file or sink failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        FetchError::Transport {
            message: message.into(),
            body: String::new(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        FetchError::Timeout {
            after,
            body: String::new(),
        }
    }

    /// Response text attached to the error, if any was read.
    pub fn partial_body(&self) -> Option<&str> {
        match self {
            FetchError::Status { body, .. }
            | FetchError::Decode { body, .. }
            | FetchError::Transport { body, .. }
            | FetchError::Timeout { body, .. }
                if !body.is_empty() =>
            {
                Some(body)
            }
            _ => None,
        }
    }

    /// Response head for bad-status errors.
    pub fn response(&self) -> Option<&ResponseHead> {
        match self {
            FetchError::Status { head, .. } => Some(head),
            _ => None,
        }
    }

    pub(crate) fn with_partial_body(self, partial: String) -> Self {
        match self {
            FetchError::Status { status, head, .. } => FetchError::Status {
                status,
                head,
                body: partial,
            },
            FetchError::Transport { message, .. } => FetchError::Transport {
                message,
                body: partial,
            },
            FetchError::Timeout { after, .. } => FetchError::Timeout {
                after,
                body: partial,
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::InvalidUri(err.to_string())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            FetchError::InvalidUri(err.to_string())
        } else {
            FetchError::transport(err.to_string())
        }
    }
}
