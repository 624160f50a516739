//! Core data models shared by the extraction, indexing and search pipeline.

use serde::Serialize;

use crate::extract::FileKind;

/// An uploaded file as received from a client, before it touches disk.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Extracted plain text of one upload, persisted under an opaque id.
///
/// Rows are written once and never updated.
#[derive(Debug, Clone, Serialize)]
pub struct FileContent {
    pub id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub kind: FileKind,
    /// Name of the extractor whose output was kept.
    pub extractor: String,
    pub text: String,
    /// True when `text` was cut to the configured maximum length.
    pub truncated: bool,
    pub source_sha256: String,
    pub created_at: i64,
}

/// One chunk of an indexed document together with its embedding.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    /// Empty when the vector is missing; such chunks are skipped by search.
    pub embedding: Vec<f32>,
    pub metadata: serde_json::Value,
    pub indexed_at: i64,
}

/// A ranked chunk returned from semantic search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub document_id: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub similarity: f32,
    pub metadata: serde_json::Value,
}
