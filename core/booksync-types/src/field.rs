//! Destination schema descriptors.

use crate::ids::FieldId;
use crate::record::ValueKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The column type of a destination field.
///
/// Serialized as the table service's numeric type code so snapshots can be
/// stored and compared without a lookup table. Codes this crate does not
/// know about survive as [`FieldType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub enum FieldType {
    Text,
    Number,
    SingleSelect,
    MultiSelect,
    DateTime,
    Checkbox,
    User,
    Phone,
    Url,
    Attachment,
    SingleLink,
    Formula,
    DuplexLink,
    Location,
    CreatedTime,
    ModifiedTime,
    CreatedUser,
    ModifiedUser,
    AutoNumber,
    Other(u32),
}

impl FieldType {
    /// Returns what kinds of value a field of this type can hold.
    ///
    /// This is the only place type codes are interpreted; everything else
    /// asks [`Capabilities`].
    #[must_use]
    pub fn capabilities(self) -> Capabilities {
        match self {
            Self::Text => Capabilities::TEXT
                .union(Capabilities::NUMBER)
                .union(Capabilities::DATE)
                .union(Capabilities::LINK),
            Self::Number => Capabilities::NUMBER,
            Self::SingleSelect | Self::MultiSelect => Capabilities::TEXT,
            Self::DateTime => Capabilities::DATE,
            Self::Url => Capabilities::LINK,
            Self::Attachment => Capabilities::ATTACHMENT,
            _ => Capabilities::NONE,
        }
    }

    /// Returns true if this type can accept any value kind the engine
    /// writes.
    #[must_use]
    pub fn is_selectable(self) -> bool {
        let caps = self.capabilities();
        ValueKind::WRITABLE.iter().any(|kind| caps.accepts(*kind))
    }

    /// Human-readable type name for logs and UIs.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::SingleSelect => "single select",
            Self::MultiSelect => "multi select",
            Self::DateTime => "date",
            Self::Checkbox => "checkbox",
            Self::User => "user",
            Self::Phone => "phone",
            Self::Url => "url",
            Self::Attachment => "attachment",
            Self::SingleLink => "single link",
            Self::Formula => "formula",
            Self::DuplexLink => "duplex link",
            Self::Location => "location",
            Self::CreatedTime => "created time",
            Self::ModifiedTime => "modified time",
            Self::CreatedUser => "created by",
            Self::ModifiedUser => "modified by",
            Self::AutoNumber => "auto number",
            Self::Other(_) => "unknown",
        }
    }
}

impl From<u32> for FieldType {
    fn from(code: u32) -> Self {
        match code {
            1 => Self::Text,
            2 => Self::Number,
            3 => Self::SingleSelect,
            4 => Self::MultiSelect,
            5 => Self::DateTime,
            7 => Self::Checkbox,
            11 => Self::User,
            13 => Self::Phone,
            15 => Self::Url,
            17 => Self::Attachment,
            18 => Self::SingleLink,
            20 => Self::Formula,
            21 => Self::DuplexLink,
            22 => Self::Location,
            1001 => Self::CreatedTime,
            1002 => Self::ModifiedTime,
            1003 => Self::CreatedUser,
            1004 => Self::ModifiedUser,
            1005 => Self::AutoNumber,
            other => Self::Other(other),
        }
    }
}

impl From<FieldType> for u32 {
    fn from(ty: FieldType) -> Self {
        match ty {
            FieldType::Text => 1,
            FieldType::Number => 2,
            FieldType::SingleSelect => 3,
            FieldType::MultiSelect => 4,
            FieldType::DateTime => 5,
            FieldType::Checkbox => 7,
            FieldType::User => 11,
            FieldType::Phone => 13,
            FieldType::Url => 15,
            FieldType::Attachment => 17,
            FieldType::SingleLink => 18,
            FieldType::Formula => 20,
            FieldType::DuplexLink => 21,
            FieldType::Location => 22,
            FieldType::CreatedTime => 1001,
            FieldType::ModifiedTime => 1002,
            FieldType::CreatedUser => 1003,
            FieldType::ModifiedUser => 1004,
            FieldType::AutoNumber => 1005,
            FieldType::Other(code) => code,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Set of value kinds a destination field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const TEXT: Self = Self(1);
    pub const NUMBER: Self = Self(1 << 1);
    pub const DATE: Self = Self(1 << 2);
    pub const LINK: Self = Self(1 << 3);
    pub const ATTACHMENT: Self = Self(1 << 4);

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the capability needed to hold a value of `kind`.
    #[must_use]
    pub const fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => Self::TEXT,
            ValueKind::Number => Self::NUMBER,
            ValueKind::Date => Self::DATE,
            ValueKind::Link => Self::LINK,
            ValueKind::Image => Self::ATTACHMENT,
        }
    }

    /// Capability predicate: can a field with these capabilities hold a
    /// value of `kind`?
    #[must_use]
    pub const fn accepts(self, kind: ValueKind) -> bool {
        self.contains(Self::for_kind(kind))
    }
}

/// One column of the destination table.
///
/// Supplied entirely by the destination; the core never invents or renames
/// these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationField {
    pub id: FieldId,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub selectable: bool,
}

impl DestinationField {
    /// Builds a descriptor whose `selectable` flag is derived from the type.
    pub fn new(id: impl Into<FieldId>, name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            field_type,
            selectable: field_type.is_selectable(),
        }
    }

    /// Returns true if this field may be assigned a value of `kind`.
    /// Unselectable fields accept nothing.
    #[must_use]
    pub fn accepts(&self, kind: ValueKind) -> bool {
        self.selectable && self.field_type.capabilities().accepts(kind)
    }
}
