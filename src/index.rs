//! Document indexing: chunk, embed, then replace the document's chunk set.
//!
//! Chunking and embedding both complete before the store is touched, so a
//! failure in either leaves the previously indexed chunks intact.

use chrono::Utc;

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::{EmbedError, EmbeddingProvider};
use crate::models::ChunkRecord;
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("document id must not be empty")]
    EmptyDocumentId,
    #[error("document produced no chunks")]
    NoChunks,
    #[error("embeddings unavailable: {0}")]
    EmbeddingsUnavailable(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("embedder returned {actual} vectors for {expected} chunks")]
    CountMismatch { expected: usize, actual: usize },
    #[error("file content {0} not found")]
    ContentNotFound(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<EmbedError> for IndexError {
    fn from(e: EmbedError) -> Self {
        match e {
            EmbedError::Unavailable(reason) => IndexError::EmbeddingsUnavailable(reason),
            EmbedError::Failed(reason) => IndexError::Embedding(reason),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexReport {
    pub document_id: String,
    pub chunks: usize,
    pub model: String,
    pub dims: usize,
}

/// Chunk `text`, embed every chunk and atomically replace the chunk set of
/// `document_id`.
pub async fn index_document(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    document_id: &str,
    text: &str,
    metadata: serde_json::Value,
    chunking: &ChunkingConfig,
    batch_size: usize,
) -> Result<IndexReport, IndexError> {
    if document_id.trim().is_empty() {
        return Err(IndexError::EmptyDocumentId);
    }

    let pieces = chunk_text(text, chunking.chunk_size, chunking.overlap);
    if pieces.iter().all(|p| p.trim().is_empty()) {
        return Err(IndexError::NoChunks);
    }

    let mut vectors = Vec::with_capacity(pieces.len());
    for batch in pieces.chunks(batch_size.max(1)) {
        vectors.extend(embedder.embed(batch).await?);
    }
    if vectors.len() != pieces.len() {
        return Err(IndexError::CountMismatch {
            expected: pieces.len(),
            actual: vectors.len(),
        });
    }

    let indexed_at = Utc::now().timestamp();
    let records: Vec<ChunkRecord> = pieces
        .into_iter()
        .zip(vectors)
        .enumerate()
        .map(|(i, (text, embedding))| ChunkRecord {
            document_id: document_id.to_string(),
            chunk_index: i as i64,
            text,
            embedding,
            metadata: metadata.clone(),
            indexed_at,
        })
        .collect();

    store.replace_chunks(document_id, &records).await?;

    tracing::info!(
        document_id,
        chunks = records.len(),
        model = embedder.model_name(),
        "document indexed"
    );
    Ok(IndexReport {
        document_id: document_id.to_string(),
        chunks: records.len(),
        model: embedder.model_name().to_string(),
        dims: embedder.dims(),
    })
}

/// Index previously extracted text under `document_id`.
///
/// The chunk metadata is `metadata` extended with `content_id` and
/// `filename`.
pub async fn index_content(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    document_id: &str,
    content_id: &str,
    metadata: serde_json::Value,
    chunking: &ChunkingConfig,
    batch_size: usize,
) -> Result<IndexReport, IndexError> {
    let content = store
        .get_file_content(content_id)
        .await?
        .ok_or_else(|| IndexError::ContentNotFound(content_id.to_string()))?;

    let mut metadata = match metadata {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    metadata.insert("content_id".to_string(), content.id.clone().into());
    metadata.insert("filename".to_string(), content.filename.clone().into());

    index_document(
        store,
        embedder,
        document_id,
        &content.text,
        serde_json::Value::Object(metadata),
        chunking,
        batch_size,
    )
    .await
}

/// Remove a document from the index. Returns the number of chunks deleted.
pub async fn delete_document(store: &dyn Store, document_id: &str) -> anyhow::Result<u64> {
    let deleted = store.delete_document_chunks(document_id).await?;
    tracing::info!(document_id, deleted, "document removed from index");
    Ok(deleted)
}
