//! Error types for the mapping and sync layer.

use crate::destination::DestinationError;
use crate::lookup::LookupError;
use booksync_types::IsbnError;
use serde::Serialize;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, SyncError>;

/// Broad grouping of failures, so a UI can tell "nothing is configured"
/// apart from "the network or service is having trouble".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing settings or an empty mapping. The user must act.
    Configuration,
    /// Credentials rejected. Fatal until reconfigured.
    Credentials,
    /// Network or remote service trouble. Retrying may help.
    Network,
    /// The looked-up book does not exist.
    NotFound,
    /// Bad input from the caller.
    InvalidInput,
    /// Local storage or encoding failure.
    Internal,
}

/// Errors surfaced by the core. Expected business conditions (empty
/// mappings, rejected fields) are reported in results, not here; a failed
/// validation shows up as a `validation` failure in the
/// [`SyncResult`](booksync_types::SyncResult).
#[derive(Debug, Error)]
pub enum SyncError {
    /// Lookup found no record for the ISBN.
    #[error("book not found: {0}")]
    NotFound(String),

    /// Network or server unreachable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Destination credentials invalid.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Schema refresh failed; the cached schema was left untouched.
    #[error("schema fetch failed: {0}")]
    SchemaFetch(#[source] DestinationError),

    #[error("invalid ISBN: {0}")]
    InvalidIsbn(#[from] IsbnError),

    /// Mapping store failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Required settings are missing.
    #[error("not configured: {0}")]
    Config(String),
}

impl SyncError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Auth(_) => ErrorCategory::Credentials,
            Self::SchemaFetch(e) => e.category(),
            Self::Config(_) => ErrorCategory::Configuration,
            Self::InvalidIsbn(_) => ErrorCategory::InvalidInput,
            Self::Storage(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if the caller may reasonably retry the same request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Network
    }
}

impl From<LookupError> for SyncError {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::NotFound(isbn) => Self::NotFound(isbn),
            LookupError::Transport(msg) => Self::Transport(msg),
            LookupError::InvalidIsbn(e) => Self::InvalidIsbn(e),
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
