//! Document text extraction.
//!
//! Extractors turn a file into page-segmented plain text plus whatever
//! title/author metadata the format carries. No OCR: image-only documents
//! yield `ExtractionError::NoText`.

mod pdftotext;
mod text;

pub use pdftotext::PopplerExtractor;
pub use text::PlainTextExtractor;

use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("No extractable text in {0}")]
    NoText(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Text of one page. Page numbers start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// Extracted document text and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedDocument {
    pub text: String,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    /// Build a document from page texts, numbering pages from 1.
    pub fn from_pages(
        pages: impl IntoIterator<Item = String>,
        title: Option<String>,
        author: Option<String>,
    ) -> Self {
        let pages: Vec<PageText> = pages
            .into_iter()
            .zip(1u32..)
            .map(|(text, page_number)| PageText { page_number, text })
            .collect();
        let text = join_pages(&pages);
        Self {
            text,
            page_count: pages.len() as u32,
            title,
            author,
            pages,
        }
    }

    /// Whether any page has non-whitespace text.
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.text.trim().is_empty())
    }
}

/// Join page texts in page order, separated by blank lines.
pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|p| p.text.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Something that turns a file into text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractionError>;
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "text"];

/// Detect a file's MIME type from its first bytes.
fn sniff_mime(path: &Path) -> Result<Option<&'static str>, ExtractionError> {
    let mut file = std::fs::File::open(path)?;
    let mut buffer = [0u8; 8192];
    let bytes_read = file.read(&mut buffer)?;
    Ok(infer::get(&buffer[..bytes_read]).map(|t| t.mime_type()))
}

/// Choose an extractor for `path`.
///
/// PDFs are detected by content; plain text by extension.
pub fn extractor_for(path: &Path) -> Result<Box<dyn DocumentExtractor>, ExtractionError> {
    match sniff_mime(path)? {
        Some("application/pdf") => return Ok(Box::new(PopplerExtractor::new())),
        Some(other) => return Err(ExtractionError::Unsupported(other.to_string())),
        None => {}
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        Ok(Box::new(PlainTextExtractor))
    } else {
        Err(ExtractionError::Unsupported(path.display().to_string()))
    }
}
