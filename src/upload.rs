//! Upload handling: bytes in, extracted text out, optionally persisted.
//!
//! The uploaded bytes are written to a named temporary file carrying the
//! original extension (some tools sniff it), extraction runs on a blocking
//! thread, and the temporary file is removed when it goes out of scope on
//! every path.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::ExtractionConfig;
use crate::extract::{
    Attempt, Extraction, ExtractionDispatcher, FileKind, EXTRACTION_FAILED_MESSAGE,
};
use crate::models::{FileContent, Upload};
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("upload is empty")]
    Empty,
}

/// Extraction result for one upload, before persistence.
#[derive(Debug, Clone)]
pub struct ExtractedUpload {
    pub kind: FileKind,
    pub extraction: Extraction,
    pub source_sha256: String,
}

#[derive(Debug, Clone)]
pub enum UploadOutcome {
    Stored(FileContent),
    /// Every extractor failed; nothing was persisted.
    Failed {
        kind: FileKind,
        attempts: Vec<Attempt>,
    },
}

impl UploadOutcome {
    /// Stored text, or the extraction-failure sentinel.
    pub fn text(&self) -> &str {
        match self {
            UploadOutcome::Stored(content) => &content.text,
            UploadOutcome::Failed { .. } => EXTRACTION_FAILED_MESSAGE,
        }
    }
}

/// Classify, spool to a temp file and extract, without persisting anything.
pub async fn extract_upload(
    dispatcher: Arc<ExtractionDispatcher>,
    upload: &Upload,
    config: &ExtractionConfig,
) -> Result<ExtractedUpload> {
    if upload.bytes.is_empty() {
        return Err(UploadError::Empty.into());
    }
    if upload.bytes.len() > config.max_upload_bytes {
        return Err(UploadError::TooLarge {
            size: upload.bytes.len(),
            limit: config.max_upload_bytes,
        }
        .into());
    }

    let kind = FileKind::from_upload(upload.content_type.as_deref(), &upload.filename);
    let suffix = Path::new(&upload.filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e))
        .unwrap_or_default();

    let mut spool = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(&suffix)
        .tempfile()
        .context("Failed to create temporary upload file")?;
    spool
        .write_all(&upload.bytes)
        .and_then(|_| spool.flush())
        .context("Failed to write temporary upload file")?;

    tracing::debug!(
        filename = %upload.filename,
        kind = %kind,
        bytes = upload.bytes.len(),
        "extracting upload"
    );

    let path = spool.path().to_path_buf();
    let extraction = tokio::task::spawn_blocking(move || dispatcher.extract(&path, kind))
        .await
        .context("Extraction task failed")?;
    drop(spool);

    Ok(ExtractedUpload {
        kind,
        extraction,
        source_sha256: format!("{:x}", Sha256::digest(&upload.bytes)),
    })
}

/// Extract an upload and persist the text as a new [`FileContent`].
///
/// A soft extraction failure is an `Ok(UploadOutcome::Failed)`; only
/// validation and persistence problems are errors.
pub async fn process_upload(
    dispatcher: Arc<ExtractionDispatcher>,
    store: &dyn Store,
    upload: Upload,
    config: &ExtractionConfig,
) -> Result<UploadOutcome> {
    let extracted = extract_upload(dispatcher, &upload, config).await?;

    let (text, extractor) = match extracted.extraction {
        Extraction::Text {
            text, extractor, ..
        } => (text, extractor),
        Extraction::Failed { attempts } => {
            tracing::warn!(filename = %upload.filename, "upload not stored: extraction failed");
            return Ok(UploadOutcome::Failed {
                kind: extracted.kind,
                attempts,
            });
        }
    };

    let (text, truncated) = truncate_chars(text, config.max_stored_chars);
    let content = FileContent {
        id: Uuid::new_v4().to_string(),
        filename: upload.filename,
        content_type: upload.content_type,
        kind: extracted.kind,
        extractor: extractor.to_string(),
        text,
        truncated,
        source_sha256: extracted.source_sha256,
        created_at: Utc::now().timestamp(),
    };
    store.save_file_content(&content).await?;

    tracing::info!(
        id = %content.id,
        filename = %content.filename,
        extractor,
        truncated,
        "file content stored"
    );
    Ok(UploadOutcome::Stored(content))
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(mut text: String, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => {
            text.truncate(byte);
            (text, true)
        }
        None => (text, false),
    }
}
