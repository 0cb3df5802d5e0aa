// src/sources/error.rs
use std::time::Duration;

use thiserror::Error;

use crate::sources::types::SourceTag;

/// Failure of a single upstream call. Never escapes the aggregator; it is
/// logged, counted, and turned into an empty contribution.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{tag} transport error: {message}")]
    Transport { tag: SourceTag, message: String },

    #[error("{tag} did not answer within {after:?}")]
    Timeout { tag: SourceTag, after: Duration },

    #[error("{tag} returned HTTP {status}")]
    Status { tag: SourceTag, status: u16 },

    #[error("{tag} response could not be decoded: {message}")]
    Decode { tag: SourceTag, message: String },

    #[error("{tag} client received a {got} request")]
    RequestMismatch { tag: SourceTag, got: SourceTag },
}

impl SourceError {
    pub fn tag(&self) -> SourceTag {
        match self {
            SourceError::Transport { tag, .. }
            | SourceError::Timeout { tag, .. }
            | SourceError::Status { tag, .. }
            | SourceError::Decode { tag, .. }
            | SourceError::RequestMismatch { tag, .. } => *tag,
        }
    }

    /// Stable label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transport { .. } => "transport",
            SourceError::Timeout { .. } => "timeout",
            SourceError::Status { .. } => "status",
            SourceError::Decode { .. } => "decode",
            SourceError::RequestMismatch { .. } => "mismatch",
        }
    }

    pub(crate) fn from_reqwest(tag: SourceTag, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return SourceError::Timeout {
                tag,
                after: timeout,
            };
        }
        if err.is_decode() {
            return SourceError::Decode {
                tag,
                message: err.to_string(),
            };
        }
        SourceError::Transport {
            tag,
            message: err.to_string(),
        }
    }
}
