//! The facade the HTTP layer talks to.

use crate::destination::{FeishuConfig, FeishuTable, RowWriter, SchemaSource};
use crate::engine::{EngineConfig, SyncEngine};
use crate::error::{CoreResult, SyncError};
use crate::lookup::{BookLookup, DoubanConfig, DoubanLookup};
use crate::mapping_store::MappingStore;
use crate::schema_cache::SchemaCache;
use crate::validator::validate;
use booksync_types::{
    BookRecord, DestinationField, FailureKind, FieldMapping, Isbn, MappingEdit, Scope,
    SyncRequest, SyncResult, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// The looked-up book together with the outcome of syncing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsbnSyncOutcome {
    pub book: BookRecord,
    pub result: SyncResult,
}

/// Schema cache, mapping store, sync engine and lookup behind one handle.
pub struct BookSync {
    schema: Arc<SchemaCache>,
    store: MappingStore,
    engine: SyncEngine,
    lookup: Arc<dyn BookLookup>,
}

impl BookSync {
    pub fn new(
        source: Arc<dyn SchemaSource>,
        writer: Arc<dyn RowWriter>,
        lookup: Arc<dyn BookLookup>,
        store: MappingStore,
        config: EngineConfig,
    ) -> Self {
        let schema = Arc::new(SchemaCache::new(source));
        let engine = SyncEngine::new(Arc::clone(&schema), writer, config);
        Self {
            schema,
            store,
            engine,
            lookup,
        }
    }

    /// Wires the Feishu table and Douban lookup together.
    pub fn from_config(
        feishu: FeishuConfig,
        douban: DoubanConfig,
        store: MappingStore,
        config: EngineConfig,
    ) -> CoreResult<Self> {
        let table = Arc::new(FeishuTable::new(feishu).map_err(|e| SyncError::Config(e.to_string()))?);
        let lookup = Arc::new(DoubanLookup::new(douban)?);
        Ok(Self::new(table.clone(), table, lookup, store, config))
    }

    /// Returns the destination fields, refreshing the cache if it is empty,
    /// stale or `force` is set.
    pub async fn get_schema(&self, force: bool) -> CoreResult<Vec<DestinationField>> {
        let snapshot = self.schema.get_or_refresh(force).await?;
        Ok(snapshot.fields().to_vec())
    }

    pub fn load_mapping(&self, scope: &Scope) -> CoreResult<FieldMapping> {
        self.store.load(scope)
    }

    pub fn save_mapping(&self, scope: &Scope, mapping: &FieldMapping) -> CoreResult<()> {
        self.store.save(scope, mapping)
    }

    /// Applies edits to the stored mapping of `scope` and returns the result.
    /// Concurrent edits of one scope are applied one after another.
    pub fn edit_mapping(
        &self,
        scope: &Scope,
        edits: impl IntoIterator<Item = MappingEdit>,
    ) -> CoreResult<FieldMapping> {
        self.store.update(scope, |mapping| mapping.apply_all(edits))
    }

    /// Validates a mapping for a record against the current schema.
    pub async fn validate(
        &self,
        record: &BookRecord,
        mapping: &FieldMapping,
    ) -> CoreResult<ValidationReport> {
        let snapshot = self.schema.get_or_refresh(false).await?;
        Ok(validate(
            record,
            mapping,
            &snapshot,
            &self.engine.config().validation,
        ))
    }

    /// Syncs a record. Only schema fetch failures are returned as errors;
    /// everything that happens during the attempt is in the result.
    pub async fn sync(&self, record: BookRecord, mapping: FieldMapping) -> CoreResult<SyncResult> {
        self.schema.get_or_refresh(false).await?;

        let result = self.engine.sync(&SyncRequest::new(record, mapping)).await;

        // The table may have changed under us; refetch before the next attempt.
        if result
            .failure
            .as_ref()
            .is_some_and(|f| f.kind == FailureKind::Api)
        {
            self.schema.mark_stale();
        }
        Ok(result)
    }

    /// Looks a book up and syncs it with the mapping stored for `scope`.
    pub async fn sync_isbn(&self, scope: &Scope, isbn: &str) -> CoreResult<IsbnSyncOutcome> {
        let isbn: Isbn = isbn.parse()?;
        let book = self.lookup.fetch_by_isbn(&isbn).await?;
        let mapping = self.load_mapping(scope)?;

        info!("Syncing \"{}\" ({}) to scope {}", book.title(), isbn, scope);
        let result = self.sync(book.clone(), mapping).await?;
        Ok(IsbnSyncOutcome { book, result })
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.schema
    }
}
