//! In-memory [`Store`] for tests and dry runs.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{check_chunk_batch, Store};
use crate::models::{ChunkRecord, FileContent};

#[derive(Default)]
pub struct InMemoryStore {
    contents: RwLock<HashMap<String, FileContent>>,
    chunks: RwLock<Vec<ChunkRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| anyhow!("in-memory store lock poisoned"))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn save_file_content(&self, content: &FileContent) -> Result<()> {
        let mut contents = write(&self.contents)?;
        if contents.contains_key(&content.id) {
            return Err(anyhow!("file content {} already exists", content.id));
        }
        contents.insert(content.id.clone(), content.clone());
        Ok(())
    }

    async fn get_file_content(&self, id: &str) -> Result<Option<FileContent>> {
        Ok(read(&self.contents)?.get(id).cloned())
    }

    async fn replace_chunks(&self, document_id: &str, chunks: &[ChunkRecord]) -> Result<()> {
        check_chunk_batch(document_id, chunks)?;
        let mut stored = write(&self.chunks)?;
        stored.retain(|c| c.document_id != document_id);
        stored.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let mut found: Vec<ChunkRecord> = read(&self.chunks)?
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.chunk_index);
        Ok(found)
    }

    async fn delete_document_chunks(&self, document_id: &str) -> Result<u64> {
        let mut stored = write(&self.chunks)?;
        let before = stored.len();
        stored.retain(|c| c.document_id != document_id);
        Ok((before - stored.len()) as u64)
    }

    async fn scan_chunks(&self) -> Result<Vec<ChunkRecord>> {
        Ok(read(&self.chunks)?.clone())
    }
}
