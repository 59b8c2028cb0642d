//! Core domain for the folio assistant: documents, chunks, the error
//! taxonomy, collaborator traits and configuration.

pub mod chunker;
pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use chunker::Chunker;
pub use error::{Error, Result};
