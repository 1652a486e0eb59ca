//! Document text extraction.

use std::panic::{self, AssertUnwindSafe};

use crate::{Error, Result};

/// Turns an uploaded document into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes`, reading at most `max_pages` pages when set.
    fn extract(&self, bytes: &[u8], max_pages: Option<usize>) -> Result<String>;
}

/// PDF text extraction via `pdf-extract`.
///
/// Each non-empty page contributes its text followed by a newline.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, bytes: &[u8], max_pages: Option<usize>) -> Result<String> {
        if bytes.is_empty() {
            return Err(Error::Extraction("document is empty".to_string()));
        }

        // pdf-extract panics on some malformed inputs
        let pages = panic::catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem_by_pages(bytes)
        }))
        .map_err(|_| Error::Extraction("PDF parser crashed on this document".to_string()))?
        .map_err(|e| Error::Extraction(e.to_string()))?;

        let text = join_pages(pages, max_pages);
        tracing::debug!(chars = text.len(), "extracted PDF text");
        Ok(text)
    }
}

fn join_pages(pages: Vec<String>, max_pages: Option<usize>) -> String {
    let limit = max_pages.unwrap_or(usize::MAX);
    let mut text = String::new();
    for page in pages.into_iter().take(limit) {
        if page.is_empty() {
            continue;
        }
        text.push_str(&page);
        text.push('\n');
    }
    text
}
