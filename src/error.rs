// Typed errors that drive pipeline control flow.
//
// Plumbing uses anyhow; these enums exist where a caller has to decide
// what to do next (retry, skip, abort) based on the kind of failure.

use std::time::Duration;

use thiserror::Error;

/// Failure while collecting from an external source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The provider asked us to slow down (HTTP 429 or equivalent).
    #[error("rate limited by {source_name}")]
    RateLimited {
        source_name: &'static str,
        retry_after: Option<Duration>,
    },

    /// Network hiccup or 5xx, worth another attempt.
    #[error("transient error from {source_name}: {message}")]
    Transient {
        source_name: &'static str,
        message: String,
    },

    /// Bad credentials, malformed request, browser won't start. Retrying won't help.
    #[error("unrecoverable error from {source_name}: {message}")]
    Fatal {
        source_name: &'static str,
        message: String,
    },
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Transient { .. }
        )
    }

    /// Classify an HTTP status from a source API.
    pub fn from_status(source_name: &'static str, status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            SourceError::RateLimited {
                source_name,
                retry_after: None,
            }
        } else if status.is_server_error() || status == reqwest::StatusCode::REQUEST_TIMEOUT {
            SourceError::Transient {
                source_name,
                message: format!("{status}: {body}"),
            }
        } else {
            SourceError::Fatal {
                source_name,
                message: format!("{status}: {body}"),
            }
        }
    }

    /// Classify a reqwest transport error. Timeouts and connection failures
    /// are transient; anything else (bad URL, decode failure) is not.
    pub fn from_reqwest(source_name: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() {
            SourceError::Transient {
                source_name,
                message: err.to_string(),
            }
        } else {
            SourceError::Fatal {
                source_name,
                message: err.to_string(),
            }
        }
    }
}

/// A completion that isn't exactly "0" or "1".
#[derive(Debug, Error, PartialEq, Eq)]
#[error("indeterminate classification response: {raw:?}")]
pub struct ParseError {
    pub raw: String,
}

/// Stage-level failure surfaced to the orchestrator.
#[derive(Debug, Error)]
pub enum StageError {
    /// Structural problem (e.g. a required column missing from the raw
    /// schema). Fatal: the stage is not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything else that stopped the stage (store unreachable, I/O).
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl StageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StageError::Failed(_))
    }
}
