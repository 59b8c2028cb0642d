//! Knowledge index: turns documents into embedded chunks and answers
//! similarity queries.
//!
//! Every build lands in a generation collection named
//! `"{collection}_g{generation}"`. A rebuild fills a fresh generation and
//! only then swaps the active pointer, so readers see either the previous
//! set or the new one. Writers are serialised; readers share the pointer.

use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use folio_core::chunker::Chunker;
use folio_core::traits::{DocumentSource, Embedder, Retriever, VectorStore};
use folio_core::types::{Chunk, CollectionMeta, DistanceMetric, Document, IndexEntry, SearchResult};
use folio_core::{Error, Result};

#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub collection: String,
    pub metric: DistanceMetric,
    pub chunker: Chunker,
    pub show_progress: bool,
}

impl IndexOptions {
    pub fn new(collection: impl Into<String>) -> Self {
        Self { collection: collection.into(), metric: DistanceMetric::Cosine, chunker: Chunker::default(), show_progress: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Empty,
    Ready,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub collection: String,
    pub documents: usize,
    pub skipped: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
struct ActiveCollection {
    name: String,
    meta: CollectionMeta,
}

struct WriterState {
    next_generation: u64,
    /// Collections built by another embedder; removed by the next write.
    stale: Vec<String>,
}

struct Prepared {
    entries: Vec<IndexEntry>,
    documents: usize,
    skipped: usize,
}

pub struct KnowledgeIndex {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    source: Arc<dyn DocumentSource>,
    options: IndexOptions,
    active: RwLock<Option<ActiveCollection>>,
    writer: Mutex<WriterState>,
}

fn parse_generation(prefix: &str, name: &str) -> Option<u64> {
    name.strip_prefix(prefix)?.strip_prefix("_g")?.parse().ok()
}

fn embedding_err(e: Error) -> Error {
    match e {
        Error::EmbeddingService(_) => e,
        other => Error::EmbeddingService(other.to_string()),
    }
}

impl KnowledgeIndex {
    /// Adopts the newest generation of `options.collection` when it was
    /// built by the same embedder; otherwise the index starts empty.
    pub async fn open(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        source: Arc<dyn DocumentSource>,
        options: IndexOptions,
    ) -> Result<Self> {
        let mut generations: Vec<(u64, String)> = store
            .list_collections()
            .await?
            .into_iter()
            .filter_map(|name| parse_generation(&options.collection, &name).map(|g| (g, name)))
            .collect();
        generations.sort();
        let next_generation = generations.last().map_or(1, |(g, _)| g + 1);

        let mut active = None;
        let mut stale = Vec::new();
        if let Some((_, latest)) = generations.pop() {
            match store.collection_meta(&latest).await? {
                Some(meta) if meta.embedder_id == embedder.embedder_id() && meta.dim == embedder.dim() => {
                    tracing::info!(collection = %latest, "loaded existing knowledge index");
                    active = Some(ActiveCollection { name: latest, meta });
                }
                Some(meta) => {
                    tracing::warn!(
                        collection = %latest,
                        stored = %meta.embedder_id,
                        current = %embedder.embedder_id(),
                        "index was built by a different embedder; it will be replaced on the next build"
                    );
                    stale.push(latest);
                }
                None => stale.push(latest),
            }
        }
        for (_, leftover) in generations {
            if active.is_some() {
                tracing::debug!(collection = %leftover, "removing superseded generation");
                if let Err(e) = store.delete_collection(&leftover).await {
                    tracing::warn!(collection = %leftover, error = %e, "could not remove superseded generation");
                }
            } else {
                stale.push(leftover);
            }
        }

        Ok(Self {
            store,
            embedder,
            source,
            options,
            active: RwLock::new(active),
            writer: Mutex::new(WriterState { next_generation, stale }),
        })
    }

    pub async fn state(&self) -> IndexState {
        if self.active.read().await.is_some() { IndexState::Ready } else { IndexState::Empty }
    }

    /// Name of the collection currently served, if any.
    pub async fn active_collection(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|a| a.name.clone())
    }

    pub async fn len(&self) -> Result<usize> {
        let guard = self.active.read().await;
        match guard.as_ref() {
            Some(active) => self.store.count(&active.name).await,
            None => Ok(0),
        }
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub fn embedder_id(&self) -> &str { self.embedder.embedder_id() }

    /// Adds `documents` to the active collection, creating the first
    /// generation when the index is empty. Either every chunk of the call
    /// is inserted or none is.
    pub async fn build(&self, documents: &[Document]) -> Result<BuildReport> {
        let mut writer = self.writer.lock().await;
        let current = self.active.read().await.clone();

        let Some(active) = current else {
            let report = self.build_generation(&mut writer, documents).await?;
            self.drop_stale(&mut writer).await;
            return Ok(report);
        };

        let prepared = self.prepare(documents, active.meta.documents).await?;
        if prepared.documents > 0 {
            // The sequence range is persisted before the chunks so a failed
            // upsert leaves a gap and a failed reservation inserts nothing.
            let mut meta = active.meta.clone();
            meta.documents += prepared.documents as u64;
            self.store.update_meta(&active.name, &meta).await?;
            if let Some(a) = self.active.write().await.as_mut() {
                a.meta = meta;
            }
            self.store.upsert(&active.name, &prepared.entries).await?;
        }
        let report = BuildReport {
            collection: active.name,
            documents: prepared.documents,
            skipped: prepared.skipped,
            chunks: prepared.entries.len(),
        };
        tracing::info!(collection = %report.collection, chunks = report.chunks, documents = report.documents, "appended documents to knowledge index");
        Ok(report)
    }

    /// Replaces the whole index with `documents`. Queries keep seeing the
    /// previous generation until the new one is complete; on failure the
    /// previous generation stays active.
    pub async fn rebuild(&self, documents: &[Document]) -> Result<BuildReport> {
        let mut writer = self.writer.lock().await;
        let report = self.build_generation(&mut writer, documents).await?;
        self.drop_stale(&mut writer).await;
        Ok(report)
    }

    /// Builds from `root` only when nothing usable is loaded yet.
    pub async fn load_or_build(&self, root: &Path) -> Result<Option<BuildReport>> {
        if self.state().await == IndexState::Ready {
            return Ok(None);
        }
        let documents = self.source.list_documents(root)?;
        self.build(&documents).await.map(Some)
    }

    pub async fn refresh(&self, root: &Path) -> Result<BuildReport> {
        let documents = self.source.list_documents(root)?;
        self.rebuild(&documents).await
    }

    /// Top matches for `text`, most relevant first. Failures are logged and
    /// reported as no results.
    pub async fn query(&self, text: &str, top_k: usize) -> Vec<SearchResult> {
        if top_k == 0 || self.state().await == IndexState::Empty {
            return vec![];
        }
        let vector = match self.embed_query(text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed");
                return vec![];
            }
        };

        let guard = self.active.read().await;
        let Some(active) = guard.as_ref() else { return vec![] };
        let neighbors = match self.store.query(&active.name, &vector, top_k).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %Error::IndexQuery(e.to_string()), "knowledge index query failed");
                return vec![];
            }
        };
        let metric = active.meta.metric;
        drop(guard);

        let mut results: Vec<SearchResult> = neighbors
            .into_iter()
            .map(|n| SearchResult {
                relevance_score: n.distance.map_or(1.0, |d| 1.0 - metric.normalize(d)),
                content: n.chunk.text,
                source: n.chunk.source,
            })
            .collect();
        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(top_k);
        results
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let texts = vec![text.to_string()];
        let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::EmbeddingService(e.to_string()))??;
        vectors.pop().ok_or_else(|| Error::EmbeddingService("embedder returned no vector".into()))
    }

    async fn build_generation(&self, writer: &mut WriterState, documents: &[Document]) -> Result<BuildReport> {
        let prepared = self.prepare(documents, 0).await?;
        let name = format!("{}_g{}", self.options.collection, writer.next_generation);
        writer.next_generation += 1;
        let meta = CollectionMeta {
            embedder_id: self.embedder.embedder_id().to_string(),
            dim: self.embedder.dim(),
            metric: self.options.metric,
            documents: prepared.documents as u64,
        };

        self.store.create_collection(&name, &meta).await?;
        if let Err(e) = self.store.upsert(&name, &prepared.entries).await {
            if let Err(cleanup) = self.store.delete_collection(&name).await {
                tracing::warn!(collection = %name, error = %cleanup, "could not discard failed generation");
            }
            return Err(e);
        }

        let previous = self.active.write().await.replace(ActiveCollection { name: name.clone(), meta });
        if let Some(previous) = previous {
            if let Err(e) = self.store.delete_collection(&previous.name).await {
                tracing::warn!(collection = %previous.name, error = %e, "could not remove previous generation");
            }
        }

        let report = BuildReport {
            collection: name,
            documents: prepared.documents,
            skipped: prepared.skipped,
            chunks: prepared.entries.len(),
        };
        tracing::info!(collection = %report.collection, chunks = report.chunks, documents = report.documents, skipped = report.skipped, "knowledge index built");
        Ok(report)
    }

    async fn drop_stale(&self, writer: &mut WriterState) {
        for name in writer.stale.drain(..) {
            if let Err(e) = self.store.delete_collection(&name).await {
                tracing::warn!(collection = %name, error = %e, "could not remove stale collection");
            }
        }
    }

    /// Extracts, chunks and embeds off the async executor.
    async fn prepare(&self, documents: &[Document], first_seq: u64) -> Result<Prepared> {
        let source = Arc::clone(&self.source);
        let embedder = Arc::clone(&self.embedder);
        let chunker = self.options.chunker;
        let documents = documents.to_vec();
        let progress = self.progress_bar(documents.len());

        tokio::task::spawn_blocking(move || {
            let mut entries = Vec::new();
            let mut processed = 0usize;
            let mut skipped = 0usize;
            for document in &documents {
                progress.set_message(document.name.clone());
                let text = source.extract_text(document);
                if text.trim().is_empty() {
                    tracing::info!(document = %document.name, "skipping document without text");
                    skipped += 1;
                    progress.inc(1);
                    continue;
                }
                let pieces = chunker.chunk(&text);
                let vectors = embedder.embed_batch(&pieces).map_err(embedding_err)?;
                if vectors.len() != pieces.len() {
                    return Err(Error::EmbeddingService(format!(
                        "embedder returned {} vectors for {} chunks",
                        vectors.len(),
                        pieces.len()
                    )));
                }
                let doc_seq = first_seq + processed as u64;
                let stem = document.stem();
                for (i, (text, vector)) in pieces.into_iter().zip(vectors).enumerate() {
                    entries.push(IndexEntry {
                        chunk: Chunk {
                            id: format!("{stem}_chunk_{doc_seq}_{i}"),
                            text,
                            source: document.name.clone(),
                            chunk_index: i,
                            file_type: document.extension.clone(),
                        },
                        vector,
                    });
                }
                processed += 1;
                progress.inc(1);
            }
            progress.finish_and_clear();
            Ok(Prepared { entries, documents: processed, skipped })
        })
        .await
        .map_err(|e| Error::EmbeddingService(format!("embedding worker failed: {e}")))?
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

#[async_trait]
impl Retriever for KnowledgeIndex {
    async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
        self.query(query, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::parse_generation;

    #[test]
    fn generation_names() {
        assert_eq!(parse_generation("portfolio", "portfolio_g3"), Some(3));
        assert_eq!(parse_generation("portfolio", "portfolio_g"), None);
        assert_eq!(parse_generation("portfolio", "portfolio_archive_g1"), None);
        assert_eq!(parse_generation("portfolio", "other_g1"), None);
    }
}
