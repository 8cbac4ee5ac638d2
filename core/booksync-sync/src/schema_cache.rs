//! Last-fetched destination schema.
//!
//! The cache holds an immutable [`SchemaSnapshot`] behind an `Arc`. A
//! refresh fetches the new field list without holding any lock and then
//! swaps the snapshot in one step, so readers see either the old or the new
//! set, never a mix. A failed refresh leaves the old snapshot in place.

use crate::destination::SchemaSource;
use crate::error::{CoreResult, SyncError};
use booksync_types::{DestinationField, FieldId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Immutable set of destination fields, in table order.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    fields: Vec<DestinationField>,
    index: HashMap<FieldId, usize>,
    fetched_at: Option<DateTime<Utc>>,
}

impl SchemaSnapshot {
    /// Builds a snapshot. If a field id repeats, the first occurrence wins.
    pub fn new(fields: Vec<DestinationField>) -> Self {
        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            index.entry(field.id.clone()).or_insert(i);
        }
        Self {
            fields,
            index,
            fetched_at: Some(Utc::now()),
        }
    }

    /// The snapshot of a cache that was never filled.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn find(&self, id: &FieldId) -> Option<&DestinationField> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[DestinationField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// When the snapshot was fetched; `None` for the empty initial snapshot.
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }
}

/// Caches the destination schema fetched from a [`SchemaSource`].
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    current: RwLock<Arc<SchemaSnapshot>>,
    stale: AtomicBool,
}

impl SchemaCache {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            current: RwLock::new(Arc::new(SchemaSnapshot::empty())),
            stale: AtomicBool::new(true),
        }
    }

    /// Fetches the schema and replaces the cached snapshot.
    pub async fn refresh(&self) -> CoreResult<Arc<SchemaSnapshot>> {
        let fields = match self.source.list_fields().await {
            Ok(fields) => fields,
            Err(e) => {
                warn!("Schema refresh failed, keeping cached schema: {}", e);
                return Err(SyncError::SchemaFetch(e));
            }
        };

        let snapshot = Arc::new(SchemaSnapshot::new(fields));
        *self.current.write().await = Arc::clone(&snapshot);
        self.stale.store(false, Ordering::Release);

        info!("Schema refreshed: {} fields", snapshot.len());
        Ok(snapshot)
    }

    /// Returns the last successfully fetched snapshot (empty if none).
    pub async fn get(&self) -> Arc<SchemaSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    /// Returns the cached snapshot, refreshing first if forced, stale or
    /// empty.
    pub async fn get_or_refresh(&self, force: bool) -> CoreResult<Arc<SchemaSnapshot>> {
        let cached = self.get().await;
        if force || self.is_stale() || cached.is_empty() {
            return self.refresh().await;
        }
        Ok(cached)
    }

    /// Flags the cache so the next [`get_or_refresh`](Self::get_or_refresh)
    /// refetches.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }
}
