//! PDF extraction with poppler-utils (`pdftotext`, `pdfinfo`).

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{DocumentExtractor, ExtractedDocument, ExtractionError};

/// Map a finished subprocess to its stdout, or the matching error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => Err(ExtractionError::ExtractionFailed(format!(
            "{}: {}",
            tool_name,
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Metadata read from `pdfinfo`.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct PdfInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub pages: Option<u32>,
}

/// Parse `pdfinfo` output. Empty values are treated as missing.
pub(crate) fn parse_pdfinfo(output: &str) -> PdfInfo {
    let mut info = PdfInfo::default();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Title" => info.title = Some(value.to_string()),
            "Author" => info.author = Some(value.to_string()),
            "Pages" => info.pages = value.parse().ok(),
            _ => {}
        }
    }
    info
}

/// Split `pdftotext` output into pages on form feeds.
///
/// pdftotext ends every page with `\x0c`, so the trailing empty piece is
/// dropped.
pub(crate) fn split_pages(output: &str) -> Vec<String> {
    let mut pages: Vec<String> = output.split('\x0c').map(str::to_string).collect();
    if pages.last().is_some_and(|p| p.trim().is_empty()) && pages.len() > 1 {
        pages.pop();
    }
    pages
}

/// Extracts embedded PDF text. Image-only PDFs produce `NoText`.
#[derive(Debug, Default, Clone)]
pub struct PopplerExtractor;

impl PopplerExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn pdfinfo(&self, path: &Path) -> Result<PdfInfo, ExtractionError> {
        let result = Command::new("pdfinfo").arg(path).output().await;
        handle_cmd_output(result, "pdfinfo").map(|out| parse_pdfinfo(&out))
    }

    async fn pdftotext(&self, path: &Path) -> Result<String, ExtractionError> {
        let result = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(path)
            .arg("-")
            .output()
            .await;
        handle_cmd_output(result, "pdftotext")
    }
}

#[async_trait]
impl DocumentExtractor for PopplerExtractor {
    fn name(&self) -> &str {
        "pdftotext"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractionError> {
        let info = self.pdfinfo(path).await?;
        let text = self.pdftotext(path).await?;
        let pages = split_pages(&text);

        if let Some(expected) = info.pages {
            if expected as usize != pages.len() {
                debug!(
                    "pdfinfo reports {} pages, pdftotext produced {}",
                    expected,
                    pages.len()
                );
            }
        }

        let document = ExtractedDocument::from_pages(pages, info.title, info.author);
        if !document.has_text() {
            return Err(ExtractionError::NoText(path.display().to_string()));
        }
        debug!(
            "Extracted {} chars from {} pages of {}",
            document.text.len(),
            document.page_count,
            path.display()
        );
        Ok(document)
    }
}
