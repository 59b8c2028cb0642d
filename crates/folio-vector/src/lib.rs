//! Vector storage and the knowledge index built on top of it.

pub mod knowledge;
pub mod memory;
pub mod schema;
pub mod search;
pub mod store;
pub mod table;
pub mod writer;

use std::path::Path;
use std::sync::Arc;

use folio_core::config::StoreBackend;
use folio_core::traits::VectorStore;
use folio_core::Result;

pub use knowledge::{BuildReport, IndexOptions, IndexState, KnowledgeIndex};
pub use memory::MemoryStore;
pub use store::SqliteStore;

/// Opens the configured backend; `path` is ignored for the memory store.
pub fn open_store(backend: StoreBackend, path: &Path) -> Result<Arc<dyn VectorStore>> {
    Ok(match backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(path)?),
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
    })
}
