use thiserror::Error;

/// Failures surfaced by the folio crates.
///
/// Some variants are absorbed close to where they happen: `Extraction`
/// skips a document, `IndexQuery` degrades a query to no results and the
/// tool variants are reported back to the model as structured payloads.
/// The rest propagate to the caller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to extract text from {path}: {message}")]
    Extraction { path: String, message: String },

    #[error("Embedding service failed: {0}")]
    EmbeddingService(String),

    #[error("Vector store failed: {0}")]
    Store(String),

    #[error("Index query failed: {0}")]
    IndexQuery(String),

    #[error("Unknown function: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {message}")]
    InvalidToolArguments { tool: String, message: String },

    #[error("Model service error: {0}")]
    ModelService(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
