//! Domain types shared by the index and the conversation layers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type ChunkId = String;

/// A source file discovered under the documents root.
///
/// `name` is the file name (`resume.txt`) and `extension` the lowercase
/// suffix including the dot (`.txt`), or empty when the file has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub name: String,
    pub extension: String,
}

impl Document {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        Self { path, name, extension }
    }

    /// File name without its extension; falls back to the full name.
    pub fn stem(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map_or_else(|| self.name.clone(), |s| s.to_string_lossy().to_string())
    }
}

/// A window of words cut from one document, independently embedded.
///
/// - `id`: `"{stem}_chunk_{doc_seq}_{chunk_index}"`, unique within a collection
/// - `source`: file name of the parent document
/// - `chunk_index`: position within the parent document
/// - `file_type`: extension of the parent document, with the dot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub text: String,
    pub source: String,
    pub chunk_index: usize,
    pub file_type: String,
}

/// A chunk together with its embedding, as held by a vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`.
    #[default]
    Cosine,
    /// Squared euclidean distance, in `[0, 4]` for unit vectors.
    L2,
}

impl DistanceMetric {
    /// Maps a raw distance onto `[0, 1]`, assuming unit-length vectors.
    pub fn normalize(self, distance: f32) -> f32 {
        let scaled = match self {
            Self::Cosine => distance / 2.0,
            Self::L2 => distance / 4.0,
        };
        scaled.clamp(0.0, 1.0)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::L2 => "l2",
        }
    }
}

/// Metadata stored next to every collection.
///
/// `documents` is the next free document sequence number, so chunk ids
/// stay unique across repeated builds into the same collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionMeta {
    pub embedder_id: String,
    pub dim: usize,
    pub metric: DistanceMetric,
    #[serde(default)]
    pub documents: u64,
}

/// A raw hit from a vector store. `distance` is `None` when the backend
/// cannot report one.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub chunk: Chunk,
    pub distance: Option<f32>,
}

/// A retrieval result handed to the conversation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub source: String,
    pub relevance_score: f32,
}
