//! Filesystem document source: walks a directory and extracts plain text
//! from the supported file types.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::traits::DocumentSource;
use crate::types::Document;

pub const SUPPORTED_EXTENSIONS: &[&str] = &[".txt", ".md", ".pdf", ".docx"];

#[derive(Debug, Default, Clone, Copy)]
pub struct DataProcessor;

impl DataProcessor {
    pub fn new() -> Self { Self }

    pub fn is_supported(document: &Document) -> bool {
        SUPPORTED_EXTENSIONS.contains(&document.extension.as_str())
    }

    fn read_text_file(path: &Path) -> Result<String> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
        }
    }

    fn read_pdf(path: &Path) -> Result<String> {
        let extraction = |message: String| Error::Extraction { path: path.display().to_string(), message };
        let pdf = lopdf::Document::load(path).map_err(|e| extraction(e.to_string()))?;
        let mut text = String::new();
        for page in pdf.get_pages().keys() {
            match pdf.extract_text(&[*page]) {
                Ok(page_text) => { text.push_str(&page_text); text.push('\n'); }
                Err(e) => tracing::debug!(path = %path.display(), page, error = %e, "skipping unreadable pdf page"),
            }
        }
        if text.trim().is_empty() {
            return Err(extraction("no extractable text".into()));
        }
        Ok(text)
    }

    /// Paragraph text of `word/document.xml`, one paragraph per line.
    fn read_docx(path: &Path) -> Result<String> {
        let extraction = |message: String| Error::Extraction { path: path.display().to_string(), message };
        let mut archive = zip::ZipArchive::new(fs::File::open(path)?).map_err(|e| extraction(e.to_string()))?;
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .map_err(|e| extraction(e.to_string()))?
            .read_to_string(&mut xml)?;

        let mut reader = Reader::from_str(&xml);
        let mut paragraphs = Vec::new();
        let mut current = String::new();
        let mut in_text = false;
        loop {
            match reader.read_event().map_err(|e| extraction(e.to_string()))? {
                Event::Start(e) if e.local_name().as_ref() == b"t" => in_text = true,
                Event::End(e) => match e.local_name().as_ref() {
                    b"t" => in_text = false,
                    b"p" => paragraphs.push(std::mem::take(&mut current)),
                    _ => {}
                },
                Event::Empty(e) => match e.local_name().as_ref() {
                    b"tab" => current.push('\t'),
                    b"br" => current.push('\n'),
                    _ => {}
                },
                Event::Text(t) if in_text => current.push_str(&t.unescape().map_err(|e| extraction(e.to_string()))?),
                Event::Eof => break,
                _ => {}
            }
        }
        if !current.is_empty() {
            paragraphs.push(current);
        }
        Ok(paragraphs.join("\n"))
    }

    /// Like [`DocumentSource::extract_text`] but reports why extraction failed.
    pub fn try_extract_text(&self, document: &Document) -> Result<String> {
        match document.extension.as_str() {
            ".txt" | ".md" => Self::read_text_file(&document.path),
            ".pdf" => Self::read_pdf(&document.path),
            ".docx" => Self::read_docx(&document.path),
            other => Err(Error::Extraction {
                path: document.path.display().to_string(),
                message: format!("unsupported file type '{other}'"),
            }),
        }
    }
}

impl DocumentSource for DataProcessor {
    /// Supported files under `root`, sorted by path. A missing root is an
    /// empty corpus, not an error.
    fn list_documents(&self, root: &Path) -> Result<Vec<Document>> {
        if !root.exists() {
            tracing::warn!(root = %root.display(), "documents directory does not exist");
            return Ok(vec![]);
        }
        let mut documents: Vec<Document> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| Document::from_path(e.path()))
            .filter(Self::is_supported)
            .collect();
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(root = %root.display(), count = documents.len(), "listed documents");
        Ok(documents)
    }

    fn extract_text(&self, document: &Document) -> String {
        self.try_extract_text(document).unwrap_or_else(|e| {
            tracing::warn!(document = %document.name, error = %e, "could not extract text");
            String::new()
        })
    }
}
