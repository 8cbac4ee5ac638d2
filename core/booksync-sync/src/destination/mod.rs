//! Destination table collaborators.
//!
//! The core talks to the external table service through two traits:
//! [`SchemaSource`] lists the table's columns and [`RowWriter`] performs a
//! create-or-update write. [`FeishuTable`] implements both against the
//! Feishu bitable open API.

pub mod feishu;

pub use feishu::{FeishuConfig, FeishuTable};

use crate::error::ErrorCategory;
use async_trait::async_trait;
use booksync_types::{DestinationField, FieldId, RowId, UpsertOperation};
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for destination operations.
pub type DestinationResult<T> = Result<T, DestinationError>;

/// Errors reported by the destination service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DestinationError {
    /// Credentials missing, invalid or expired.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The service could not be reached or answered with a server error.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service rejected the request.
    #[error("API error {code}: {msg}")]
    Api { code: i64, msg: String },

    /// The payload could not be written at all.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Table coordinates are missing from the configuration.
    #[error("destination not configured: {0}")]
    NotConfigured(String),
}

impl DestinationError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Auth(_) => ErrorCategory::Credentials,
            Self::Transport(_) => ErrorCategory::Network,
            Self::Api { .. } | Self::MalformedPayload(_) => ErrorCategory::InvalidInput,
            Self::NotConfigured(_) => ErrorCategory::Configuration,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Identifies the row an upsert should update, if one exists.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationKey {
    pub field: DestinationField,
    pub value: String,
}

/// One cell of an outbound write, already in the destination's format.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: DestinationField,
    pub value: serde_json::Value,
}

/// What the destination did with an upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertResponse {
    pub row_id: RowId,
    pub operation: UpsertOperation,
    /// Fields left out of the row, with the reason.
    pub rejected: BTreeMap<FieldId, String>,
}

/// Lists the destination table's columns.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Returns the current columns in table order.
    async fn list_fields(&self) -> DestinationResult<Vec<DestinationField>>;
}

/// Writes one row to the destination table.
#[async_trait]
pub trait RowWriter: Send + Sync {
    /// Creates or updates a row. With a correlation key the destination
    /// decides whether a matching row already exists; without one it
    /// creates a row.
    async fn upsert(
        &self,
        correlation: Option<&CorrelationKey>,
        fields: &BTreeMap<FieldId, FieldWrite>,
    ) -> DestinationResult<UpsertResponse>;
}
