//! Plain text from uploaded documents.

use crate::types::{AppError, Result};
use std::path::Path;

/// Upload formats, recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// UTF-8 text or markdown
    Text,
    Pdf,
}

/// Extensions accepted by [`DocumentKind::from_filename`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "markdown", "text"];

impl DocumentKind {
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "txt" | "md" | "markdown" | "text" => Ok(DocumentKind::Text),
            _ => Err(AppError::InvalidInput(format!(
                "Unsupported file type for '{}'. Supported: .{}",
                filename,
                SUPPORTED_EXTENSIONS.join(", .")
            ))),
        }
    }
}

/// Decode `bytes` as a document of `kind`.
///
/// PDF parsing is CPU-bound and runs on the blocking pool; a parser panic on a
/// malformed file is reported like any other unreadable upload.
pub async fn extract_text(kind: DocumentKind, filename: &str, bytes: Vec<u8>) -> Result<String> {
    match kind {
        DocumentKind::Text => String::from_utf8(bytes)
            .map_err(|_| AppError::InvalidInput(format!("'{}' is not valid UTF-8 text", filename))),
        DocumentKind::Pdf => {
            let parsed =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                    .await;
            match parsed {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(e)) => Err(AppError::InvalidInput(format!(
                    "Could not read PDF '{}': {}",
                    filename, e
                ))),
                Err(join_error) => {
                    tracing::warn!(filename = %filename, error = %join_error, "PDF parser aborted");
                    Err(AppError::InvalidInput(format!("Could not read PDF '{}'", filename)))
                }
            }
        }
    }
}
