//! Process-local vector store, used by tests and `index.backend = "memory"`.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use folio_core::traits::VectorStore;
use folio_core::types::{CollectionMeta, IndexEntry, Neighbor};
use folio_core::{Error, Result};

use crate::search::nearest;

struct MemCollection {
    meta: CollectionMeta,
    entries: BTreeMap<String, IndexEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, MemCollection>>> {
        self.collections.read().map_err(|_| Error::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, MemCollection>>> {
        self.collections.write().map_err(|_| Error::Store("memory store lock poisoned".into()))
    }
}

fn missing(name: &str) -> Error { Error::NotFound(format!("collection '{name}'")) }

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<()> {
        let mut map = self.write()?;
        if map.contains_key(name) {
            return Err(Error::Store(format!("collection '{name}' already exists")));
        }
        map.insert(name.to_string(), MemCollection { meta: meta.clone(), entries: BTreeMap::new() });
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.write()?.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn collection_meta(&self, name: &str) -> Result<Option<CollectionMeta>> {
        Ok(self.read()?.get(name).map(|c| c.meta.clone()))
    }

    async fn update_meta(&self, name: &str, meta: &CollectionMeta) -> Result<()> {
        let mut map = self.write()?;
        let collection = map.get_mut(name).ok_or_else(|| missing(name))?;
        collection.meta = meta.clone();
        Ok(())
    }

    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut map = self.write()?;
        let collection = map.get_mut(name).ok_or_else(|| missing(name))?;
        let dim = collection.meta.dim;
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dim) {
            return Err(Error::Store(format!(
                "entry '{}' has dimension {}, collection expects {dim}",
                bad.chunk.id,
                bad.vector.len()
            )));
        }
        for entry in entries {
            collection.entries.insert(entry.chunk.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<Neighbor>> {
        let map = self.read()?;
        let collection = map.get(name).ok_or_else(|| missing(name))?;
        if vector.len() != collection.meta.dim {
            return Err(Error::Store(format!("query has dimension {}, expected {}", vector.len(), collection.meta.dim)));
        }
        Ok(nearest(collection.meta.metric, vector, collection.entries.values(), top_k))
    }

    async fn count(&self, name: &str) -> Result<usize> {
        let map = self.read()?;
        Ok(map.get(name).ok_or_else(|| missing(name))?.entries.len())
    }
}
