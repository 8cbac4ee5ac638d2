//! Field mapping and sync engine for booksync.
//!
//! Takes a book record looked up by ISBN and writes it into a user's
//! bitable table, whose columns are owned by the table service and may
//! change at any time.
//!
//! ## Components
//!
//! - **Schema cache**: last-fetched destination columns, swapped atomically
//! - **Mapping store**: SQLite persistence of `source key -> field id`
//!   mappings per destination scope
//! - **Validator**: pure reconciliation of a mapping against the schema
//! - **Engine**: converts mapped values and performs the upsert
//! - **Destination / Lookup**: the Feishu bitable and Douban clients
//!
//! ## Sync Process
//!
//! 1. **Lookup**: resolve the ISBN to a [`BookRecord`](booksync_types::BookRecord)
//! 2. **Schema**: refresh the destination columns if needed
//! 3. **Validate**: classify every key as mapped, unmapped or broken
//! 4. **Write**: upsert the mapped values, correlated on the ISBN
//! 5. **Report**: one outcome per source key
//!
//! # Example
//!
//! ```
//! use booksync_sync::{validate, SchemaSnapshot, ValidationOptions};
//! use booksync_types::{BookRecord, DestinationField, FieldMapping, FieldType};
//!
//! let record = BookRecord::new("Dune").unwrap().with("author", "Herbert");
//! let snapshot = SchemaSnapshot::new(vec![DestinationField::new("fldA", "Title", FieldType::Text)]);
//! let mapping = FieldMapping::new().with("title", "fldA");
//!
//! let report = validate(&record, &mapping, &snapshot, &ValidationOptions::default());
//! assert!(report.passed());
//! assert_eq!(report.mapped_count, 1);
//! assert_eq!(report.total_count, 2);
//! ```

pub mod destination;
mod engine;
mod error;
pub mod lookup;
pub mod mapping_store;
pub mod schema_cache;
mod service;
mod validator;

pub use destination::{
    CorrelationKey, DestinationError, DestinationResult, FeishuConfig, FeishuTable, FieldWrite,
    RowWriter, SchemaSource, UpsertResponse,
};
pub use engine::{EngineConfig, PhaseEvent, SyncEngine, SyncPhase, cell_value};
pub use error::{CoreResult, ErrorCategory, SyncError};
pub use lookup::{BookLookup, DoubanConfig, DoubanLookup, LookupError, LookupResult};
pub use mapping_store::MappingStore;
pub use schema_cache::{SchemaCache, SchemaSnapshot};
pub use service::{BookSync, IsbnSyncOutcome};
pub use validator::{ValidationOptions, validate};
