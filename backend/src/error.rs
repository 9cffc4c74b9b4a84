use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure surfaced by the transport to the upstream video API.
///
/// Messages never include the request URL, which carries the API key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("upstream rate limit exceeded (status {status})")]
    RateLimited { status: u16 },

    #[error("upstream resource not found")]
    NotFound,

    #[error("upstream request failed with status {status}")]
    Status { status: u16 },

    #[error("upstream API error: {message}")]
    Api { code: u16, message: String },

    #[error("upstream service unreachable: {0}")]
    Network(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),
}

impl UpstreamError {
    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network(_) => true,
            Self::Status { status } => *status >= 500,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::NotFound | Self::Malformed(_) => false,
        }
    }

    /// Maps an HTTP status plus the optional `error` object of the body.
    pub fn from_status(status: u16, api_message: Option<String>, reason: Option<&str>) -> Self {
        let quota_exceeded = matches!(
            reason,
            Some("quotaExceeded" | "rateLimitExceeded" | "userRateLimitExceeded")
        );

        match status {
            429 => Self::RateLimited { status },
            403 if quota_exceeded => Self::RateLimited { status },
            404 => Self::NotFound,
            _ => match api_message {
                Some(message) => Self::Api {
                    code: status,
                    message,
                },
                None => Self::Status { status },
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("unrecognized identifier format: {0}")]
    Classification(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("ingestion cancelled")]
    Cancelled,

    #[error("at least one target is required")]
    EmptyInput,

    #[error("no valid video URLs or IDs found")]
    NoValidTargets,
}

impl HarvestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Classification(_) => ErrorKind::Classification,
            Self::NotFound(_) | Self::Upstream(UpstreamError::NotFound) => ErrorKind::NotFound,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::EmptyInput | Self::NoValidTargets => ErrorKind::InvalidInput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Classification,
    NotFound,
    Upstream,
    Cancelled,
    InvalidInput,
}
