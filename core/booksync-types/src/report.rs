//! Mapping validation reports.

use crate::ids::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a mapping entry points at something that cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokenReason {
    /// The field id is not in the current schema snapshot.
    MissingField,
    /// The field exists but is flagged not selectable.
    Unselectable,
    /// The field cannot hold the record value's kind.
    IncompatibleValue,
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::MissingField => "field no longer exists in the destination table",
            Self::Unselectable => "field type cannot be written",
            Self::IncompatibleValue => "field type does not accept this value",
        })
    }
}

/// Status of one source key after reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyStatus {
    Mapped { field_id: FieldId },
    Unmapped,
    BrokenReference { field_id: FieldId, reason: BrokenReason },
}

impl KeyStatus {
    #[must_use]
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped { .. })
    }
}

/// Per-key entry in a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyReport {
    pub status: KeyStatus,
    /// False for mapping entries whose key the record does not carry. Such
    /// entries are reported but never counted or written.
    pub in_record: bool,
}

/// Reasons a validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ValidationFailure {
    /// No key is mapped to a writable field: nothing to sync.
    NoMappings,
    /// Several keys target the same destination field.
    DuplicateDestinationTarget { field_id: FieldId, keys: Vec<String> },
}

impl ValidationFailure {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoMappings => "no_mappings",
            Self::DuplicateDestinationTarget { .. } => "duplicate_destination_target",
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMappings => f.write_str("nothing to sync: no fields are mapped"),
            Self::DuplicateDestinationTarget { field_id, keys } => write!(
                f,
                "fields {} are all mapped to destination field {field_id}",
                keys.join(", ")
            ),
        }
    }
}

/// Advisory outcome of reconciling a mapping against a schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub keys: BTreeMap<String, KeyReport>,
    pub mapped_count: usize,
    pub total_count: usize,
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    /// Returns true if a sync is permitted.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn status(&self, key: &str) -> Option<&KeyStatus> {
        self.keys.get(key).map(|r| &r.status)
    }

    /// Keys present in the record and mapped to a writable field.
    pub fn writable(&self) -> impl Iterator<Item = (&str, &FieldId)> {
        self.keys.iter().filter_map(|(key, report)| match &report.status {
            KeyStatus::Mapped { field_id } if report.in_record => Some((key.as_str(), field_id)),
            _ => None,
        })
    }

    /// Keys whose mapping entry is broken.
    pub fn broken(&self) -> impl Iterator<Item = (&str, BrokenReason)> {
        self.keys.iter().filter_map(|(key, report)| match &report.status {
            KeyStatus::BrokenReference { reason, .. } => Some((key.as_str(), *reason)),
            _ => None,
        })
    }
}
