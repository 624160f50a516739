use anyhow::Result;
use sqlx::SqlitePool;

/// Create every table and index the store needs. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // Extracted text, written once per successful upload
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS file_contents (
            id TEXT PRIMARY KEY,
            filename TEXT NOT NULL,
            content_type TEXT,
            kind TEXT NOT NULL,
            extractor TEXT NOT NULL,
            text TEXT NOT NULL,
            truncated INTEGER NOT NULL DEFAULT 0,
            source_sha256 TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Chunk text plus its embedding, one row per (document, chunk)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_embeddings (
            document_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            embedding BLOB,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            indexed_at INTEGER NOT NULL,
            UNIQUE(document_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_document_embeddings_document_id ON document_embeddings(document_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_file_contents_created_at ON file_contents(created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("schema migrations applied");
    Ok(())
}
