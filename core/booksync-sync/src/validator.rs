//! Reconciles a field mapping against the current schema snapshot.
//!
//! [`validate`] is a pure function: it reads the record, mapping and
//! snapshot and returns an advisory [`ValidationReport`]. It never edits
//! the mapping; broken entries are reported, not repaired.

use crate::schema_cache::SchemaSnapshot;
use booksync_types::{
    BookRecord, BrokenReason, FieldId, FieldMapping, KeyReport, KeyStatus, ValidationFailure,
    ValidationReport, ValueKind,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Caller-controlled validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// Record keys shown to the user but never mapped, counted or written.
    pub display_only: BTreeSet<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            display_only: BTreeSet::from(["cover_image".to_string()]),
        }
    }
}

impl ValidationOptions {
    fn is_display_only(&self, key: &str) -> bool {
        self.display_only.contains(key)
    }
}

/// Validates `mapping` for `record` against `snapshot`.
pub fn validate(
    record: &BookRecord,
    mapping: &FieldMapping,
    snapshot: &SchemaSnapshot,
    options: &ValidationOptions,
) -> ValidationReport {
    let mut keys = BTreeMap::new();
    let mut total_count = 0;

    for (key, value) in record.iter() {
        if options.is_display_only(key) {
            continue;
        }
        total_count += 1;
        let status = key_status(mapping.get(key), Some(value.kind()), snapshot);
        keys.insert(
            key.to_string(),
            KeyReport {
                status,
                in_record: true,
            },
        );
    }

    // Entries for keys this record lacks are still checked so stale
    // references stay visible.
    for (key, field_id) in mapping.iter() {
        if options.is_display_only(key) || record.contains_key(key) {
            continue;
        }
        keys.insert(
            key.to_string(),
            KeyReport {
                status: key_status(Some(field_id), None, snapshot),
                in_record: false,
            },
        );
    }

    let mut by_target: BTreeMap<&FieldId, Vec<String>> = BTreeMap::new();
    for (key, report) in &keys {
        if let KeyStatus::Mapped { field_id } = &report.status {
            if report.in_record {
                by_target.entry(field_id).or_default().push(key.clone());
            }
        }
    }
    let mapped_count = by_target.values().map(Vec::len).sum();

    let mut failures = Vec::new();
    if mapped_count == 0 {
        failures.push(ValidationFailure::NoMappings);
    }
    failures.extend(
        by_target
            .into_iter()
            .filter(|(_, keys)| keys.len() > 1)
            .map(|(field_id, keys)| ValidationFailure::DuplicateDestinationTarget {
                field_id: field_id.clone(),
                keys,
            }),
    );

    ValidationReport {
        keys,
        mapped_count,
        total_count,
        failures,
    }
}

fn key_status(
    field_id: Option<&FieldId>,
    kind: Option<ValueKind>,
    snapshot: &SchemaSnapshot,
) -> KeyStatus {
    let Some(field_id) = field_id else {
        return KeyStatus::Unmapped;
    };

    let broken = |reason| KeyStatus::BrokenReference {
        field_id: field_id.clone(),
        reason,
    };

    match snapshot.find(field_id) {
        None => broken(BrokenReason::MissingField),
        Some(field) if !field.selectable => broken(BrokenReason::Unselectable),
        Some(field) if kind.is_some_and(|k| !field.accepts(k)) => {
            broken(BrokenReason::IncompatibleValue)
        }
        Some(_) => KeyStatus::Mapped {
            field_id: field_id.clone(),
        },
    }
}
