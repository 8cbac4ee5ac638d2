//! Identifier types used throughout booksync.
//!
//! All identifiers are opaque strings owned by some other party (the
//! destination table service, or the caller choosing a scope). They are
//! never generated or rewritten locally.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an identifier string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Identifier of a destination column, as issued by the table service
    /// (e.g. `fldA1b2C3`).
    FieldId
);

string_id!(
    /// Identifier of a destination row, as issued by the table service.
    RowId
);

string_id!(
    /// Logical destination a mapping belongs to (usually a table id), so
    /// mappings for different tables never collide.
    Scope
);
