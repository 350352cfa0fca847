use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open document: {0}")]
    OpenError(String),
    #[error("failed to extract text: {0}")]
    ExtractionError(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for document text extraction.
///
/// Implementors return the raw text of the whole document, pages joined by
/// newlines. Locating the bibliography inside that text is the job of
/// `refverify_parsing::locate`.
pub trait TextSource: Send + Sync {
    /// Extract the full text content of a document.
    fn extract_text(&self, path: &Path) -> Result<String, BackendError>;
}

/// Reads an already-extracted UTF-8 text file.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextSource;

impl TextSource for PlainTextSource {
    fn extract_text(&self, path: &Path) -> Result<String, BackendError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
