//! PDF text extraction, exposed to the blood report agent as a tool.
//!
//! Extraction never fails with an error: every problem (missing file,
//! corrupt PDF, pages without text) is logged and reported as
//! [`ExtractionResult::Failure`] so callers can branch on a value.

use async_trait::async_trait;
use lopdf::Document;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Outcome of extracting a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    /// Page texts concatenated in page order
    Text(String),
    Failure,
}

impl ExtractionResult {
    /// The failure indicator as forwarded to the diagnoser: `{"status":"failure"}`
    pub fn failure_payload() -> String {
        json!({ "status": "failure" }).to_string()
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ExtractionResult::Failure)
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> ExtractionResult;
}

/// Extracts text from PDFs with `lopdf`
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> ExtractionResult {
        let owned_path: PathBuf = path.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || extract_pages(&owned_path)).await;

        match outcome {
            Ok(Ok(text)) if text.trim().is_empty() => {
                warn!(path = %path.display(), "PDF contains no extractable text");
                ExtractionResult::Failure
            }
            Ok(Ok(text)) => {
                info!(
                    path = %path.display(),
                    characters = text.len(),
                    "Extracted text from PDF"
                );
                ExtractionResult::Text(text)
            }
            Ok(Err(e)) => {
                error!(path = %path.display(), error = %e, "Error extracting text");
                ExtractionResult::Failure
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "PDF extraction worker aborted");
                ExtractionResult::Failure
            }
        }
    }
}

fn extract_pages(path: &Path) -> Result<String, lopdf::Error> {
    let document = Document::load(path)?;
    let mut text = String::new();
    // get_pages is keyed by page number, so iteration is in page order
    for page_number in document.get_pages().keys() {
        text.push_str(&document.extract_text(&[*page_number])?);
    }
    Ok(text)
}
