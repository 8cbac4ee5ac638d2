//! Sync requests and results.

use crate::ids::{FieldId, RowId};
use crate::mapping::FieldMapping;
use crate::record::BookRecord;
use crate::report::BrokenReason;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One sync attempt's input. Built fresh per attempt and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRequest {
    pub record: BookRecord,
    pub mapping: FieldMapping,
}

impl SyncRequest {
    pub fn new(record: BookRecord, mapping: FieldMapping) -> Self {
        Self { record, mapping }
    }
}

/// Overall status of a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Succeeded,
    PartiallySucceeded,
    Failed,
}

/// Whether the destination created a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOperation {
    Created,
    Updated,
}

/// Why a key was left out of the outbound write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    Unmapped,
    BrokenReference { reason: BrokenReason },
    /// The attempt was aborted before writing anything.
    ValidationFailed,
}

/// What happened to one source key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FieldOutcome {
    Written { field_id: FieldId },
    Skipped { reason: SkipReason },
    Rejected { field_id: FieldId, reason: String },
    /// Included in a write that failed as a whole.
    NotWritten { field_id: FieldId },
}

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Local validation stopped the attempt; the network was not contacted.
    Validation,
    Auth,
    Transport,
    MalformedPayload,
    Api,
    /// Destination settings are missing.
    NotConfigured,
}

/// Human-readable explanation attached to a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFailure {
    pub kind: FailureKind,
    pub reason: String,
}

/// Structured result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub status: SyncStatus,
    pub per_field_outcomes: BTreeMap<String, FieldOutcome>,
    pub destination_row_id: Option<RowId>,
    pub operation: Option<UpsertOperation>,
    pub failure: Option<SyncFailure>,
}

impl SyncResult {
    #[must_use]
    pub fn outcome(&self, key: &str) -> Option<&FieldOutcome> {
        self.per_field_outcomes.get(key)
    }

    /// Keys that reached the destination row.
    pub fn written_keys(&self) -> impl Iterator<Item = &str> {
        self.per_field_outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FieldOutcome::Written { .. }))
            .map(|(k, _)| k.as_str())
    }

    /// Keys the destination refused.
    pub fn rejected_keys(&self) -> impl Iterator<Item = &str> {
        self.per_field_outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FieldOutcome::Rejected { .. }))
            .map(|(k, _)| k.as_str())
    }
}
