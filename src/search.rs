//! Brute-force semantic search over every stored chunk.
//!
//! The query is embedded once, then compared against each chunk's vector by
//! cosine similarity. There is no ANN index: cost is linear in the number of
//! stored chunks.

use crate::embedding::{cosine_similarity, embed_query, EmbedError, EmbeddingProvider};
use crate::models::SearchHit;
use crate::store::Store;

/// Why a search could not run.
#[derive(Debug, Clone, PartialEq)]
pub enum Unavailable {
    Embeddings(String),
    Store(String),
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::Embeddings(r) => write!(f, "embeddings unavailable: {}", r),
            Unavailable::Store(r) => write!(f, "store unavailable: {}", r),
        }
    }
}

/// Result of [`semantic_search`]. An empty `Hits` means nothing matched.
#[derive(Debug, Clone)]
pub enum SearchOutcome {
    Hits(Vec<SearchHit>),
    Unavailable(Unavailable),
}

impl SearchOutcome {
    /// Collapse to a plain list, treating unavailability as no results.
    pub fn into_hits(self) -> Vec<SearchHit> {
        match self {
            SearchOutcome::Hits(hits) => hits,
            SearchOutcome::Unavailable(_) => Vec::new(),
        }
    }
}

/// Rank stored chunks by similarity to `query` and keep the best `top_k`.
pub async fn semantic_search(
    store: &dyn Store,
    embedder: &dyn EmbeddingProvider,
    query: &str,
    top_k: usize,
) -> SearchOutcome {
    if query.trim().is_empty() || top_k == 0 {
        return SearchOutcome::Hits(Vec::new());
    }

    let query_vec = match embed_query(embedder, query).await {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "query embedding failed");
            let reason = match e {
                EmbedError::Unavailable(r) | EmbedError::Failed(r) => r,
            };
            return SearchOutcome::Unavailable(Unavailable::Embeddings(reason));
        }
    };

    let chunks = match store.scan_chunks().await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "chunk scan failed");
            return SearchOutcome::Unavailable(Unavailable::Store(e.to_string()));
        }
    };

    let scanned = chunks.len();
    let mut hits: Vec<SearchHit> = chunks
        .into_iter()
        .filter(|c| !c.embedding.is_empty() && c.embedding.len() == query_vec.len())
        .map(|c| SearchHit {
            similarity: cosine_similarity(&query_vec, &c.embedding),
            document_id: c.document_id,
            chunk_index: c.chunk_index,
            chunk_text: c.text,
            metadata: c.metadata,
        })
        .filter(|h| h.similarity.is_finite())
        .collect();

    // Stable: equal scores keep scan order.
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(top_k);

    tracing::debug!(scanned, returned = hits.len(), "semantic search complete");
    SearchOutcome::Hits(hits)
}
