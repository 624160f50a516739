//! Storage abstraction for extracted text and embedded chunks.
//!
//! The [`Store`] trait is the single persistence seam of the pipeline. Two
//! backends implement it:
//! - [`SqliteStore`]: `file_contents` and `document_embeddings` tables via sqlx.
//! - [`InMemoryStore`]: `RwLock`-guarded vectors for tests and dry runs.
//!
//! A store handle is created once at process start, shared behind an `Arc`
//! and closed at shutdown.

mod memory;
mod sqlite;

use std::collections::HashSet;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::{ChunkRecord, FileContent};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`save_file_content`](Store::save_file_content) | Persist extracted text (insert-only) |
/// | [`get_file_content`](Store::get_file_content) | Load extracted text by id |
/// | [`replace_chunks`](Store::replace_chunks) | Delete then insert every chunk of a document |
/// | [`chunks_for_document`](Store::chunks_for_document) | Chunks of one document, by index |
/// | [`delete_document_chunks`](Store::delete_document_chunks) | Drop a document from the index |
/// | [`scan_chunks`](Store::scan_chunks) | Every chunk, in stable scan order |
#[async_trait]
pub trait Store: Send + Sync {
    async fn save_file_content(&self, content: &FileContent) -> Result<()>;

    async fn get_file_content(&self, id: &str) -> Result<Option<FileContent>>;

    /// Replace all chunks of `document_id`. Afterwards exactly `chunks` exist
    /// for it; no earlier chunk index survives. Fails without touching the
    /// store when a record names another document or repeats a chunk index.
    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()>;

    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Returns the number of chunks removed.
    async fn delete_document_chunks(&self, document_id: &str) -> Result<u64>;

    async fn scan_chunks(&self) -> Result<Vec<ChunkRecord>>;

    /// Release backend resources. Further calls may fail.
    async fn close(&self) {}
}

/// Reject a replacement batch that would break `(document_id, chunk_index)`
/// uniqueness or write chunks under another document.
pub(crate) fn check_chunk_batch(document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(chunks.len());
    for chunk in chunks {
        if chunk.document_id != document_id {
            bail!(
                "chunk {} belongs to document '{}', not '{}'",
                chunk.chunk_index,
                chunk.document_id,
                document_id
            );
        }
        if !seen.insert(chunk.chunk_index) {
            bail!(
                "duplicate chunk index {} for document '{}'",
                chunk.chunk_index,
                document_id
            );
        }
    }
    Ok(())
}
