//! Error taxonomy of the synchronization engine.
//!
//! Fetch failures never escape a polling session: they are logged and retried
//! on the next tick. `SyncError` is what callers of the public API can see.

/// Failure while talking to the remote data source. Every variant is
/// recoverable by the next poll tick.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    #[error("unexpected status {status} on {endpoint}")]
    UnexpectedStatus { endpoint: String, status: u16 },
    #[error("malformed payload on {endpoint}: {message}")]
    Payload { endpoint: String, message: String },
}

impl SourceError {
    pub fn transport(endpoint: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Transport { endpoint: endpoint.into(), message: err.to_string() }
    }

    pub fn payload(endpoint: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Payload { endpoint: endpoint.into(), message: err.to_string() }
    }

    /// All source errors are retried on the next tick; kept explicit so
    /// callers do not have to know the variant list.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::UnexpectedStatus { .. } | Self::Payload { .. }
        )
    }
}

/// Errors surfaced by the public engine API.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid subscription key: {0}")]
    InvalidKey(String),
}
