use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{CollectionMeta, Document, IndexEntry, Neighbor, SearchResult};

/// Turns text into fixed-size vectors. Implementations are blocking and
/// may be CPU heavy; async callers should run them off the executor.
pub trait Embedder: Send + Sync {
    /// Stable identifier of the embedding function (e.g. `fake:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Persistence for named collections of embedded chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, name: &str, meta: &CollectionMeta) -> Result<()>;
    async fn delete_collection(&self, name: &str) -> Result<()>;
    async fn list_collections(&self) -> Result<Vec<String>>;
    async fn collection_meta(&self, name: &str) -> Result<Option<CollectionMeta>>;
    async fn update_meta(&self, name: &str, meta: &CollectionMeta) -> Result<()>;
    /// Inserts or replaces `entries` as one batch: either all are visible
    /// afterwards or none are.
    async fn upsert(&self, name: &str, entries: &[IndexEntry]) -> Result<()>;
    /// Nearest neighbours of `vector`, closest first.
    async fn query(&self, name: &str, vector: &[f32], top_k: usize) -> Result<Vec<Neighbor>>;
    async fn count(&self, name: &str) -> Result<usize>;
}

pub trait DocumentSource: Send + Sync {
    fn list_documents(&self, root: &Path) -> Result<Vec<Document>>;
    /// Plain text of `document`; empty when it cannot be read.
    fn extract_text(&self, document: &Document) -> String;
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult>;
}
