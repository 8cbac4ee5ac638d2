//! Persistent storage for field mappings, keyed by destination scope.
//!
//! Uses its own SQLite file; each scope is a flat `source_key -> field_id`
//! table. Saves and updates replace a scope inside one transaction, so a
//! failed write leaves the previous mapping loadable.

use crate::error::{CoreResult, SyncError};
use booksync_types::{FieldId, FieldMapping, Scope};
use rusqlite::{Connection, params};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Persistent store for field mappings backed by SQLite.
#[derive(Clone)]
pub struct MappingStore {
    conn: Arc<Mutex<Connection>>,
}

impl MappingStore {
    /// Opens (or creates) a mapping store at the given path.
    pub fn new(path: &str) -> CoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| SyncError::Storage(format!("failed to open mapping store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory mapping store (for testing).
    pub fn open_in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            SyncError::Storage(format!("failed to open in-memory mapping store: {e}"))
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> CoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Storage("mapping store lock poisoned".to_string()))
    }

    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS field_mappings (
                scope TEXT NOT NULL,
                source_key TEXT NOT NULL,
                field_id TEXT NOT NULL,
                PRIMARY KEY (scope, source_key)
            );
            ",
        )?;
        Ok(())
    }

    /// Loads the mapping saved for a scope. Unknown scopes load empty.
    pub fn load(&self, scope: &Scope) -> CoreResult<FieldMapping> {
        let conn = self.lock()?;
        let mapping = read_scope(&conn, scope)?;
        debug!("Loaded {} mapping entries for scope {}", mapping.len(), scope);
        Ok(mapping)
    }

    /// Replaces the mapping saved for a scope.
    pub fn save(&self, scope: &Scope, mapping: &FieldMapping) -> CoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_scope(&tx, scope, mapping)?;
        tx.commit()?;

        info!("Saved {} mapping entries for scope {}", mapping.len(), scope);
        Ok(())
    }

    /// Reads, edits and writes back the mapping of a scope as one step.
    ///
    /// The store lock and a single transaction are held throughout, so
    /// concurrent updates of the same scope never overwrite each other.
    pub fn update<F>(&self, scope: &Scope, edit: F) -> CoreResult<FieldMapping>
    where
        F: FnOnce(FieldMapping) -> FieldMapping,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mapping = edit(read_scope(&tx, scope)?);
        write_scope(&tx, scope, &mapping)?;
        tx.commit()?;

        info!("Updated scope {} to {} mapping entries", scope, mapping.len());
        Ok(mapping)
    }
}

fn read_scope(conn: &Connection, scope: &Scope) -> CoreResult<FieldMapping> {
    let mut stmt =
        conn.prepare("SELECT source_key, field_id FROM field_mappings WHERE scope = ?1")?;
    let mapping = stmt
        .query_map(params![scope.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, FieldId::new(row.get::<_, String>(1)?)))
        })?
        .collect::<Result<FieldMapping, _>>()?;
    Ok(mapping)
}

fn write_scope(conn: &Connection, scope: &Scope, mapping: &FieldMapping) -> CoreResult<()> {
    conn.execute(
        "DELETE FROM field_mappings WHERE scope = ?1",
        params![scope.as_str()],
    )?;

    let mut insert = conn
        .prepare("INSERT INTO field_mappings (scope, source_key, field_id) VALUES (?1, ?2, ?3)")?;
    for (key, field_id) in mapping.iter() {
        insert.execute(params![scope.as_str(), key, field_id.as_str()])?;
    }
    Ok(())
}
