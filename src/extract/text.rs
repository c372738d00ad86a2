//! Plain-text and Markdown files.

use std::path::Path;

use async_trait::async_trait;

use super::{DocumentExtractor, ExtractedDocument, ExtractionError};

/// Reads a UTF-8 text file. Form feeds split it into pages; a file
/// without one is a single page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    fn name(&self) -> &str {
        "text"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedDocument, ExtractionError> {
        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8_lossy(&bytes);

        let title = content
            .lines()
            .find_map(|line| line.strip_prefix("# "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let pages = content.split('\x0c').map(str::to_string);
        let document = ExtractedDocument::from_pages(pages, title, None);
        if !document.has_text() {
            return Err(ExtractionError::NoText(path.display().to_string()));
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_markdown_title_and_pages() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(file, "intro\n# Sparse Attention\nbody\x0cpage two").unwrap();

        let doc = PlainTextExtractor.extract(file.path()).await.unwrap();
        assert_eq!(doc.title.as_deref(), Some("Sparse Attention"));
        assert_eq!(doc.page_count, 2);
        assert_eq!(doc.pages[1].text, "page two");
    }

    #[tokio::test]
    async fn test_file_without_form_feed_is_one_page() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "first line\n\nsecond paragraph\n").unwrap();

        let doc = PlainTextExtractor.extract(file.path()).await.unwrap();
        assert_eq!(doc.page_count, 1);
        assert_eq!(doc.pages[0].page_number, 1);
        assert!(doc.pages[0].text.contains("second paragraph"));
        assert_eq!(doc.title, None);
    }

    #[tokio::test]
    async fn test_empty_file_has_no_text() {
        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        assert!(matches!(
            PlainTextExtractor.extract(file.path()).await,
            Err(ExtractionError::NoText(_))
        ));
    }
}
