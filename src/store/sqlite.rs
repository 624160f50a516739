//! SQLite-backed [`Store`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{check_chunk_batch, Store};
use crate::config::DbConfig;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::models::{ChunkRecord, FileContent};
use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn open(config: &DbConfig) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }
}

fn chunk_from_row(row: &SqliteRow) -> Result<ChunkRecord> {
    let embedding: Option<Vec<u8>> = row.try_get("embedding")?;
    let metadata_json: String = row.try_get("metadata_json")?;
    Ok(ChunkRecord {
        document_id: row.try_get("document_id")?,
        chunk_index: row.try_get("chunk_index")?,
        text: row.try_get("chunk_text")?,
        embedding: embedding.as_deref().map(blob_to_vec).unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json).unwrap_or(serde_json::json!({})),
        indexed_at: row.try_get("indexed_at")?,
    })
}

const CHUNK_COLUMNS: &str =
    "document_id, chunk_index, chunk_text, embedding, metadata_json, indexed_at";

#[async_trait]
impl Store for SqliteStore {
    async fn save_file_content(&self, content: &FileContent) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_contents (id, filename, content_type, kind, extractor,
                                       text, truncated, source_sha256, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&content.id)
        .bind(&content.filename)
        .bind(&content.content_type)
        .bind(content.kind.as_str())
        .bind(&content.extractor)
        .bind(&content.text)
        .bind(content.truncated)
        .bind(&content.source_sha256)
        .bind(content.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save file content {}", content.id))?;
        Ok(())
    }

    async fn get_file_content(&self, id: &str) -> Result<Option<FileContent>> {
        let row = sqlx::query(
            r#"
            SELECT id, filename, content_type, kind, extractor, text, truncated,
                   source_sha256, created_at
            FROM file_contents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let kind: String = row.try_get("kind")?;
        Ok(Some(FileContent {
            id: row.try_get("id")?,
            filename: row.try_get("filename")?,
            content_type: row.try_get("content_type")?,
            kind: kind.parse()?,
            extractor: row.try_get("extractor")?,
            text: row.try_get("text")?,
            truncated: row.try_get("truncated")?,
            source_sha256: row.try_get("source_sha256")?,
            created_at: row.try_get("created_at")?,
        }))
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        check_chunk_batch(document_id, chunks)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM document_embeddings WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            let blob = (!chunk.embedding.is_empty()).then(|| vec_to_blob(&chunk.embedding));
            sqlx::query(
                r#"
                INSERT INTO document_embeddings (document_id, chunk_index, chunk_text,
                                                 embedding, metadata_json, indexed_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(blob)
            .bind(chunk.metadata.to_string())
            .bind(chunk.indexed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM document_embeddings WHERE document_id = ? ORDER BY chunk_index"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    async fn delete_document_chunks(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_embeddings WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn scan_chunks(&self) -> Result<Vec<ChunkRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHUNK_COLUMNS} FROM document_embeddings ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(chunk_from_row).collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("database pool closed");
    }
}
