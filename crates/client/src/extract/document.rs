//! Plain text from downloaded artifacts, for analysis prompts.
//!
//! PDFs go through `pdf-extract`, HTML through `scraper`. Anything else is
//! read as lossy UTF-8. Whitespace runs are collapsed to single spaces.

use scraper::Html;
use std::path::{Path, PathBuf};

/// Elements whose text never reaches a prompt.
const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Html,
    Text,
}

impl DocumentFormat {
    /// Sniff the format from the leading bytes.
    pub fn detect(bytes: &[u8]) -> Self {
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
        let head = head.trim_start();

        if head.starts_with("%PDF") {
            return DocumentFormat::Pdf;
        }

        let lowered = head.to_ascii_lowercase();
        if lowered.starts_with("<!doctype html") || lowered.starts_with("<html") || lowered.contains("<body") {
            DocumentFormat::Html
        } else {
            DocumentFormat::Text
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("DOCUMENT_ERROR: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("DOCUMENT_ERROR: text extraction failed: {0}")]
    Extract(String),

    #[error("DOCUMENT_ERROR: no text in {0}")]
    NoText(PathBuf),
}

/// Text of an in-memory document.
pub fn text_from_bytes(bytes: &[u8]) -> Result<String, DocumentError> {
    let text = match DocumentFormat::detect(bytes) {
        DocumentFormat::Pdf => {
            let raw = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
                .map_err(|_| DocumentError::Extract("PDF parser panicked".into()))?
                .map_err(|e| DocumentError::Extract(e.to_string()))?;
            collapse_whitespace(&raw)
        }
        DocumentFormat::Html => html_text(&String::from_utf8_lossy(bytes)),
        DocumentFormat::Text => collapse_whitespace(&String::from_utf8_lossy(bytes)),
    };
    Ok(text)
}

/// Text of the artifact at `path`.
///
/// Extraction runs on the blocking pool. A malformed PDF, including one that
/// makes the parser panic, surfaces as [`DocumentError::Extract`].
pub async fn document_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| DocumentError::Io { path: path.to_path_buf(), source })?;

    let text = tokio::task::spawn_blocking(move || text_from_bytes(&bytes))
        .await
        .map_err(|e| DocumentError::Extract(format!("extractor task failed: {e}")))??;

    if text.is_empty() {
        return Err(DocumentError::NoText(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), chars = text.chars().count(), "document text extracted");
    Ok(text)
}

/// The longest prefix of `text` holding at most `budget` characters.
pub fn truncate_chars(text: &str, budget: usize) -> &str {
    match text.char_indices().nth(budget) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn html_text(html: &str) -> String {
    let document = Html::parse_document(html);

    document
        .tree
        .nodes()
        .filter(|node| {
            node.parent()
                .and_then(|parent| parent.value().as_element())
                .is_none_or(|element| !SKIPPED_ELEMENTS.contains(&element.name()))
        })
        .filter_map(|node| node.value().as_text())
        .flat_map(|text| text.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
