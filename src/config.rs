//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults that
//! match the behavior of the hosted assistant (500-character chunks with a
//! 50-character overlap, `all-minilm-l6-v2` embeddings, Groq completions).
//! Secrets never live in the file: `GROQ_API_KEY` and `OPENAI_API_KEY` are
//! read from the environment, optionally seeded from a `.env` file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::extract::PdfStrategy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    /// PDF strategies in the order they are attempted.
    #[serde(default = "default_pdf_order")]
    pub pdf_order: Vec<PdfStrategy>,
    /// Extracted text longer than this (in characters) is truncated before storage.
    #[serde(default = "default_max_stored_chars")]
    pub max_stored_chars: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Tesseract language list, e.g. `"eng+hin"`.
    #[serde(default = "default_ocr_languages")]
    pub ocr_languages: String,
    #[serde(default = "default_pdftotext")]
    pub pdftotext_bin: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_bin: String,
    #[serde(default = "default_tesseract")]
    pub tesseract_bin: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_order: default_pdf_order(),
            max_stored_chars: default_max_stored_chars(),
            max_upload_bytes: default_max_upload_bytes(),
            ocr_languages: default_ocr_languages(),
            pdftotext_bin: default_pdftotext(),
            pdftoppm_bin: default_pdftoppm(),
            tesseract_bin: default_tesseract(),
        }
    }
}

fn default_pdf_order() -> Vec<PdfStrategy> {
    vec![
        PdfStrategy::PdfExtract,
        PdfStrategy::Lopdf,
        PdfStrategy::Pdftotext,
        PdfStrategy::Ocr,
    ]
}
fn default_max_stored_chars() -> usize {
    50_000
}
fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_ocr_languages() -> String {
    "eng".to_string()
}
fn default_pdftotext() -> String {
    "pdftotext".to_string()
}
fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}
fn default_tesseract() -> String {
    "tesseract".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Where local models are downloaded and cached.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            url: None,
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./data/embedding_models")
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_limit() -> usize {
    5
}
fn default_max_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Front-end model name used when a request names none (see [`crate::llm::resolve_model`]).
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    /// Document text beyond this many characters is cut before prompting.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            default_model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "LLaMA3".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_max_context_chars() -> usize {
    12_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:5001".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.extraction.pdf_order.is_empty() {
        bail!("extraction.pdf_order must name at least one strategy");
    }
    if config.extraction.max_stored_chars == 0 {
        bail!("extraction.max_stored_chars must be > 0");
    }

    if config.retrieval.default_limit == 0 {
        bail!("retrieval.default_limit must be >= 1");
    }
    if config.retrieval.default_limit > config.retrieval.max_limit {
        bail!("retrieval.default_limit must not exceed retrieval.max_limit");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, local, openai, or ollama.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        bail!("llm.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse("[db]\npath = \"./data/b.sqlite\"\n").unwrap();
        assert_eq!(cfg.chunking.chunk_size, 500);
        assert_eq!(cfg.chunking.overlap, 50);
        assert_eq!(cfg.extraction.pdf_order, default_pdf_order());
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.embedding.max_retries, 0);
        assert_eq!(cfg.retrieval.default_limit, 5);
        assert_eq!(cfg.server.bind, "127.0.0.1:5001");
    }

    #[test]
    fn pdf_order_is_configurable() {
        let cfg = parse(
            "[db]\npath = \"x\"\n[extraction]\npdf_order = [\"pdftotext\", \"pdf-extract\"]\n",
        )
        .unwrap();
        assert_eq!(
            cfg.extraction.pdf_order,
            vec![PdfStrategy::Pdftotext, PdfStrategy::PdfExtract]
        );
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = parse("[db]\npath = \"x\"\n[chunking]\nchunk_size = 50\noverlap = 50\n")
            .unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn remote_provider_requires_model_and_dims() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }
}
