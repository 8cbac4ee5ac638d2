//! Core type definitions for booksync.
//!
//! - [`BookRecord`] / [`BookValue`]: source-side bibliographic data
//! - [`DestinationField`] / [`FieldType`] / [`Capabilities`]: the externally
//!   owned table schema
//! - [`FieldMapping`] / [`MappingEdit`]: user-chosen key-to-field links
//! - [`ValidationReport`]: reconciliation of a mapping against a schema
//! - [`SyncRequest`] / [`SyncResult`]: input and output of one sync attempt
//!
//! All payloads serialize to plain JSON with string, number and boolean
//! leaves.

mod field;
mod ids;
mod isbn;
mod mapping;
mod record;
mod report;
mod sync;

pub use field::{Capabilities, DestinationField, FieldType};
pub use ids::{FieldId, RowId, Scope};
pub use isbn::{Isbn, IsbnError};
pub use mapping::{FieldMapping, MappingEdit};
pub use record::{BookRecord, BookValue, RecordError, ValueKind};
pub use report::{BrokenReason, KeyReport, KeyStatus, ValidationFailure, ValidationReport};
pub use sync::{
    FailureKind, FieldOutcome, SkipReason, SyncFailure, SyncRequest, SyncResult, SyncStatus,
    UpsertOperation,
};
