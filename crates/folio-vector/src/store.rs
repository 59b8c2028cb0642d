//! SQLite-backed vector store with exhaustive distance scan.

use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use folio_core::traits::VectorStore;
use folio_core::types::{CollectionMeta, IndexEntry, Neighbor};
use folio_core::{Error, Result};

use crate::search::nearest;
use crate::{table, writer};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = table::open_db(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite vector store");
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self { conn: Arc::new(Mutex::new(table::open_in_memory()?)) })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| Error::Store("sqlite connection lock poisoned".into()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| Error::Store(format!("sqlite worker failed: {e}")))?
    }

    fn require_meta(conn: &Connection, name: &str) -> Result<CollectionMeta> {
        table::get_meta(conn, name)?.ok_or_else(|| Error::NotFound(format!("collection '{name}'")))
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<()> {
        let (name, meta) = (name.to_string(), meta.clone());
        self.with_conn(move |conn| {
            if table::get_meta(conn, &name)?.is_some() {
                return Err(Error::Store(format!("collection '{name}' already exists")));
            }
            table::set_meta(conn, &name, &meta)
        })
        .await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let name = name.to_string();
        self.with_conn(move |conn| table::delete(conn, &name)).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| table::list_names(conn)).await
    }

    async fn collection_meta(&self, name: &str) -> Result<Option<CollectionMeta>> {
        let name = name.to_string();
        self.with_conn(move |conn| table::get_meta(conn, &name)).await
    }

    async fn update_meta(&self, name: &str, meta: &CollectionMeta) -> Result<()> {
        let (name, meta) = (name.to_string(), meta.clone());
        self.with_conn(move |conn| {
            Self::require_meta(conn, &name)?;
            table::set_meta(conn, &name, &meta)
        })
        .await
    }

    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()> {
        let (name, entries) = (name.to_string(), entries.to_vec());
        self.with_conn(move |conn| {
            let meta = Self::require_meta(conn, &name)?;
            if let Some(bad) = entries.iter().find(|e| e.vector.len() != meta.dim) {
                return Err(Error::Store(format!(
                    "entry '{}' has dimension {}, collection expects {}",
                    bad.chunk.id,
                    bad.vector.len(),
                    meta.dim
                )));
            }
            writer::insert_entries(conn, &name, &entries)
        })
        .await
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        let (name, vector) = (name.to_string(), vector.to_vec());
        self.with_conn(move |conn| {
            let meta = Self::require_meta(conn, &name)?;
            if vector.len() != meta.dim {
                return Err(Error::Store(format!("query has dimension {}, expected {}", vector.len(), meta.dim)));
            }
            let entries = writer::read_entries(conn, &name)?;
            Ok(nearest(meta.metric, &vector, &entries, top_k))
        })
        .await
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let name = name.to_string();
        self.with_conn(move |conn| {
            Self::require_meta(conn, &name)?;
            writer::count_entries(conn, &name)
        })
        .await
    }
}
