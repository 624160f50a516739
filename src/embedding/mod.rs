//! Sentence-embedding providers and vector utilities.
//!
//! [`EmbeddingProvider`] turns a batch of texts into one vector per text, in
//! input order. Implementations:
//! - **[`DisabledProvider`]**: always [`EmbedError::Unavailable`].
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **[`OllamaProvider`]**: `POST {url}/api/embed` on a local Ollama.
//! - **`LocalProvider`**: in-process inference with fastembed (default
//!   feature) or tract (`local-embeddings-tract`). The model is downloaded to
//!   `embedding.cache_dir` on first use and then runs offline.
//!
//! Vectors are persisted as little-endian `f32` BLOBs ([`vec_to_blob`],
//! [`blob_to_vec`]) and compared with [`cosine_similarity`].
//!
//! # Retries
//!
//! Remote providers make a single attempt unless `embedding.max_retries` is
//! raised. Retries apply to HTTP 429, 5xx and network errors, with
//! exponential backoff (1s, 2s, 4s, ... capped at 32s). Other 4xx responses
//! fail immediately.

#[cfg(feature = "local-embeddings-tract")]
mod local_tract;

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Default model for the local provider.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    /// The provider cannot serve requests at all (disabled, no key, model missing).
    #[error("embeddings unavailable: {0}")]
    Unavailable(String),
    /// A request was attempted and failed.
    #[error("embedding failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Model identifier, e.g. `"all-minilm-l6-v2"`.
    fn model_name(&self) -> &str;
    /// Vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed `texts`, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;
}

/// Embed a single text, e.g. a search query.
pub async fn embed_query(
    provider: &dyn EmbeddingProvider,
    text: &str,
) -> Result<Vec<f32>, EmbedError> {
    provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| EmbedError::Failed("empty embedding response".to_string()))
}

// ============ Disabled Provider ============

pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Err(EmbedError::Unavailable(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Remote HTTP helpers ============

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// POST `body` as JSON, retrying transient failures up to `max_retries` times.
async fn post_json(
    client: &reqwest::Client,
    backend: &str,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value, EmbedError> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(backend, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| EmbedError::Failed(format!("{backend} response: {e}")));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = EmbedError::Failed(format!("{backend} API error {status}: {body_text}"));
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(EmbedError::Failed(format!(
                    "{backend} connection error ({url}): {e}"
                )));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| EmbedError::Failed(format!("{backend} embedding failed"))))
}

fn json_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|items| items.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ OpenAI Provider ============

pub struct OpenAIProvider {
    model: String,
    dims: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        Ok(Self {
            model,
            dims,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| EmbedError::Unavailable("OPENAI_API_KEY not set".to_string()))?;
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let json = post_json(
            &self.client,
            "OpenAI",
            "https://api.openai.com/v1/embeddings",
            Some(&api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// `data[].embedding`, reordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| EmbedError::Failed("invalid OpenAI response: missing data".to_string()))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let vector = item.get("embedding").and_then(json_vector).ok_or_else(|| {
            EmbedError::Failed("invalid OpenAI response: missing embedding".to_string())
        })?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = post_json(
            &self.client,
            "Ollama",
            &endpoint,
            None,
            &body,
            self.max_retries,
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>, EmbedError> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            EmbedError::Failed("invalid Ollama response: missing embeddings".to_string())
        })?
        .iter()
        .map(|e| {
            json_vector(e).ok_or_else(|| {
                EmbedError::Failed("invalid Ollama response: embedding is not an array".to_string())
            })
        })
        .collect()
}

// ============ Local Provider (fastembed or tract) ============

#[cfg(any(
    feature = "local-embeddings-fastembed",
    feature = "local-embeddings-tract"
))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "bge-base-en-v1.5" | "multilingual-e5-base" => 768,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    use fastembed::EmbeddingModel;
    match name {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

/// In-process embeddings via fastembed (ONNX Runtime).
///
/// The model is initialized on the first `embed` call and then reused for
/// the life of the provider.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    variant: fastembed::EmbeddingModel,
    cache_dir: std::path::PathBuf,
    batch_size: usize,
    loaded: std::sync::Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let variant = fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            variant,
            cache_dir: config.cache_dir.clone(),
            batch_size: config.batch_size,
            loaded: Default::default(),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let loaded = self.loaded.clone();
        let variant = self.variant.clone();
        let cache_dir = self.cache_dir.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| EmbedError::Failed("local model lock poisoned".to_string()))?;

            if guard.is_none() {
                tracing::info!(cache_dir = %cache_dir.display(), "loading local embedding model");
                let model = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(variant)
                        .with_cache_dir(cache_dir)
                        .with_show_download_progress(false),
                )
                .map_err(|e| EmbedError::Unavailable(format!("failed to load local model: {e}")))?;
                *guard = Some(model);
            }

            let model = guard
                .as_mut()
                .ok_or_else(|| EmbedError::Unavailable("local model not loaded".to_string()))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| EmbedError::Failed(format!("local embedding failed: {e}")))
        })
        .await
        .map_err(|e| EmbedError::Failed(format!("embedding task failed: {e}")))?
    }
}

/// In-process embeddings via tract-onnx and tokenizers, pure Rust.
///
/// Like the fastembed provider, the tokenizer and optimized plan are built
/// on the first `embed` call and kept for the life of the provider.
#[cfg(all(
    feature = "local-embeddings-tract",
    not(feature = "local-embeddings-fastembed")
))]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    cache_dir: std::path::PathBuf,
    batch_size: usize,
    loaded: std::sync::Arc<std::sync::Mutex<Option<local_tract::TractModel>>>,
}

#[cfg(all(
    feature = "local-embeddings-tract",
    not(feature = "local-embeddings-fastembed")
))]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        local_tract::model_manifest(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            cache_dir: config.cache_dir.clone(),
            batch_size: config.batch_size,
            loaded: Default::default(),
        })
    }
}

#[cfg(all(
    feature = "local-embeddings-tract",
    not(feature = "local-embeddings-fastembed")
))]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let loaded = self.loaded.clone();
        let model_name = self.model_name.clone();
        let cache_dir = self.cache_dir.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| EmbedError::Failed("local model lock poisoned".to_string()))?;

            if guard.is_none() {
                tracing::info!(
                    model = %model_name,
                    cache_dir = %cache_dir.display(),
                    "loading local embedding model"
                );
                *guard = Some(local_tract::TractModel::load(&model_name, &cache_dir)?);
            }

            let model = guard
                .as_ref()
                .ok_or_else(|| EmbedError::Unavailable("local model not loaded".to_string()))?;
            model.embed(batch_size, &texts)
        })
        .await
        .map_err(|e| EmbedError::Failed(format!("embedding task failed: {e}")))?
    }
}

/// Build the provider named by `embedding.provider`.
///
/// Called once at startup; the returned provider is shared for the life of
/// the process.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledProvider)),
        "openai" => Ok(Box::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Box::new(OllamaProvider::new(config)?)),
        #[cfg(any(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"))]
        "local" => Ok(Box::new(LocalProvider::new(config)?)),
        #[cfg(not(any(
            feature = "local-embeddings-fastembed",
            feature = "local-embeddings-tract"
        )))]
        "local" => bail!(
            "Local embedding provider requires one of: --features local-embeddings-fastembed, --features local-embeddings-tract"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a vector as little-endian `f32` bytes.
///
/// ```rust
/// use bharat_rag::embedding::{blob_to_vec, vec_to_blob};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12);
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Returns `0.0` for empty vectors, vectors of different lengths, and
/// zero-norm vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_roundtrip_preserves_values() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn cosine_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn disabled_provider_is_unavailable() {
        let err = embed_query(&DisabledProvider, "hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Unavailable(_)));
    }

    #[test]
    fn openai_response_is_reordered_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn ollama_response_requires_embeddings() {
        let ok = serde_json::json!({ "embeddings": [[0.5, 0.5]] });
        assert_eq!(parse_ollama_response(&ok).unwrap(), vec![vec![0.5, 0.5]]);

        let bad = serde_json::json!({ "error": "model not found" });
        assert!(matches!(
            parse_ollama_response(&bad),
            Err(EmbedError::Failed(_))
        ));
    }

    #[test]
    fn remote_providers_need_model_and_dims() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_provider(&config).is_err());

        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            model: Some("nomic-embed-text".to_string()),
            dims: Some(768),
            ..EmbeddingConfig::default()
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.dims(), 768);
    }

    #[test]
    fn disabled_provider_is_created_from_config() {
        let config = EmbeddingConfig {
            provider: "disabled".to_string(),
            ..EmbeddingConfig::default()
        };
        assert_eq!(create_provider(&config).unwrap().model_name(), "disabled");
    }
}
