//! User-chosen associations from record keys to destination fields.

use crate::ids::FieldId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Maps source record keys to destination field ids.
///
/// A key that is absent is unmapped. Two keys may point at the same field;
/// that is a caller error which the validator reports rather than resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping {
    entries: BTreeMap<String, FieldId>,
}

/// A single user edit to a [`FieldMapping`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MappingEdit {
    /// Point `key` at `field_id`, replacing any previous target.
    Assign { key: String, field_id: FieldId },
    /// Mark `key` unmapped.
    Clear { key: String },
    /// Drop every entry.
    Reset,
}

impl FieldMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of an `Assign` edit.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, field_id: impl Into<FieldId>) -> Self {
        self.entries.insert(key.into(), field_id.into());
        self
    }

    /// Applies one edit and returns the resulting mapping. Mapping edits are
    /// local and have no side effects until a sync is requested.
    #[must_use]
    pub fn apply(mut self, edit: MappingEdit) -> Self {
        match edit {
            MappingEdit::Assign { key, field_id } => {
                self.entries.insert(key, field_id);
            }
            MappingEdit::Clear { key } => {
                self.entries.remove(&key);
            }
            MappingEdit::Reset => self.entries.clear(),
        }
        self
    }

    /// Applies edits in order.
    #[must_use]
    pub fn apply_all(self, edits: impl IntoIterator<Item = MappingEdit>) -> Self {
        edits.into_iter().fold(self, Self::apply)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldId> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn is_mapped(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Iterates `(key, field_id)` in sorted key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldId)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Distinct destination fields referenced by this mapping.
    #[must_use]
    pub fn targets(&self) -> BTreeSet<&FieldId> {
        self.entries.values().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, FieldId)> for FieldMapping {
    fn from_iter<T: IntoIterator<Item = (String, FieldId)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
