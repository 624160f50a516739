//! CLI command implementations for the `bharat` binary.
//!
//! Each `run_*` function loads what it needs from the config, prints a
//! human-readable report to stdout and returns. Warnings go through
//! `tracing` to stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{ExtractionDispatcher, EXTRACTION_FAILED_MESSAGE};
use crate::fields::{extract_fields, parse_schema};
use crate::index::{delete_document, index_content, index_document};
use crate::llm::{chat_reply, GroqClient};
use crate::models::Upload;
use crate::search::{semantic_search, SearchOutcome};
use crate::store::{SqliteStore, Store};
use crate::upload::{extract_upload, process_upload, UploadOutcome};

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Upload {
        filename,
        content_type: None,
        bytes,
    })
}

fn embedder(config: &Config) -> Result<Box<dyn EmbeddingProvider>> {
    create_provider(&config.embedding)
}

pub async fn run_init(config: &Config) -> Result<()> {
    let store = SqliteStore::open(&config.db).await?;
    store.close().await;
    println!("Database initialized at {}", config.db.path.display());
    Ok(())
}

pub fn run_capabilities(config: &Config) -> Result<()> {
    let caps = ExtractionDispatcher::detect(&config.extraction).capabilities();

    println!("{:<12} {:<10} PATH", "TOOL", "STATUS");
    for tool in &caps.tools {
        let status = if tool.available { "found" } else { "missing" };
        println!("{:<12} {:<10} {}", tool.name, status, tool.program);
    }
    println!();
    println!("{:<8} EXTRACTORS", "KIND");
    for chain in &caps.chains {
        let extractors = if chain.extractors.is_empty() {
            "(none)".to_string()
        } else {
            chain.extractors.join(" -> ")
        };
        println!("{:<8} {}", chain.kind, extractors);
    }
    Ok(())
}

/// Extract a local file. With `store`, the text is persisted and its
/// content id printed first.
pub async fn run_extract(
    config: &Config,
    path: &Path,
    type_hint: Option<&str>,
    store: bool,
) -> Result<()> {
    let mut upload = read_upload(path)?;
    upload.content_type = type_hint.map(str::to_string);
    let dispatcher = Arc::new(ExtractionDispatcher::detect(&config.extraction));

    if store {
        let sqlite = SqliteStore::open(&config.db).await?;
        let outcome = process_upload(dispatcher, &sqlite, upload, &config.extraction).await;
        sqlite.close().await;
        match outcome? {
            UploadOutcome::Stored(content) => {
                println!("content_id: {}", content.id);
                println!("extractor:  {}", content.extractor);
                println!("truncated:  {}", content.truncated);
                println!();
                println!("{}", content.text);
            }
            UploadOutcome::Failed { attempts, .. } => {
                for attempt in &attempts {
                    eprintln!("  {}: {}", attempt.extractor, attempt.error);
                }
                println!("{}", EXTRACTION_FAILED_MESSAGE);
            }
        }
        return Ok(());
    }

    let extracted = extract_upload(dispatcher, &upload, &config.extraction).await?;
    println!("{}", extracted.extraction.into_text());
    Ok(())
}

pub async fn run_index(
    config: &Config,
    document_id: &str,
    content_id: Option<&str>,
    file: Option<&Path>,
    metadata: Option<&str>,
) -> Result<()> {
    let metadata: serde_json::Value = match metadata {
        Some(raw) => serde_json::from_str(raw).context("--metadata must be valid JSON")?,
        None => serde_json::json!({}),
    };
    let embedder = embedder(config)?;
    let store = SqliteStore::open(&config.db).await?;
    let batch_size = config.embedding.batch_size;

    let result = match (content_id, file) {
        (Some(content_id), None) => {
            index_content(
                &store,
                embedder.as_ref(),
                document_id,
                content_id,
                metadata,
                &config.chunking,
                batch_size,
            )
            .await
        }
        (None, Some(path)) => {
            let dispatcher = Arc::new(ExtractionDispatcher::detect(&config.extraction));
            let upload = read_upload(path)?;
            let extracted = extract_upload(dispatcher, &upload, &config.extraction).await?;
            if !extracted.extraction.is_success() {
                store.close().await;
                bail!("{}", EXTRACTION_FAILED_MESSAGE);
            }
            let mut metadata = metadata;
            if let Some(map) = metadata.as_object_mut() {
                map.insert("filename".to_string(), upload.filename.clone().into());
            }
            index_document(
                &store,
                embedder.as_ref(),
                document_id,
                &extracted.extraction.into_text(),
                metadata,
                &config.chunking,
                batch_size,
            )
            .await
        }
        _ => {
            store.close().await;
            bail!("exactly one of --content-id or --file is required");
        }
    };
    store.close().await;

    let report = result?;
    println!("index {}", report.document_id);
    println!("  chunks: {}", report.chunks);
    println!("  model:  {} ({} dims)", report.model, report.dims);
    Ok(())
}

pub async fn run_delete(config: &Config, document_id: &str) -> Result<()> {
    let store = SqliteStore::open(&config.db).await?;
    let deleted = delete_document(&store, document_id).await;
    store.close().await;
    println!("deleted {} chunks for {}", deleted?, document_id);
    Ok(())
}

pub async fn run_search(config: &Config, query: &str, limit: Option<usize>) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let limit = limit
        .unwrap_or(config.retrieval.default_limit)
        .clamp(1, config.retrieval.max_limit);
    let embedder = embedder(config)?;
    let store = SqliteStore::open(&config.db).await?;
    let outcome = semantic_search(&store, embedder.as_ref(), query, limit).await;
    store.close().await;

    match outcome {
        SearchOutcome::Unavailable(reason) => {
            println!("Search unavailable: {}", reason);
        }
        SearchOutcome::Hits(hits) if hits.is_empty() => {
            println!("No results.");
        }
        SearchOutcome::Hits(hits) => {
            for (i, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.3}] {} #{}",
                    i + 1,
                    hit.similarity,
                    hit.document_id,
                    hit.chunk_index
                );
                let preview: String = hit.chunk_text.chars().take(200).collect();
                println!("    {}", preview.replace('\n', " "));
            }
        }
    }
    Ok(())
}

fn assistant(config: &Config) -> Result<Assistant> {
    let chat = Arc::new(GroqClient::new(&config.llm)?);
    Ok(Assistant::new(chat, &config.llm))
}

pub async fn run_summarize(config: &Config, path: &Path) -> Result<()> {
    let assistant = assistant(config)?;
    let dispatcher = Arc::new(ExtractionDispatcher::detect(&config.extraction));
    let store = SqliteStore::open(&config.db).await?;
    let outcome = process_upload(dispatcher, &store, read_upload(path)?, &config.extraction).await;
    store.close().await;

    let content = match outcome? {
        UploadOutcome::Stored(content) => content,
        UploadOutcome::Failed { .. } => bail!("{}", EXTRACTION_FAILED_MESSAGE),
    };
    let summary = assistant.summarize_document(&content.text).await?;
    println!("content_id: {}", content.id);
    println!();
    println!("{}", summary);
    Ok(())
}

pub async fn run_ask(config: &Config, content_id: &str, question: &str) -> Result<()> {
    let assistant = assistant(config)?;
    let store = SqliteStore::open(&config.db).await?;
    let answer = assistant.answer_question(&store, content_id, question).await;
    store.close().await;
    println!("{}", answer?);
    Ok(())
}

/// Print `field: value` lines for every schema field found in stored text.
pub async fn run_fields(config: &Config, content_id: &str, specs: &[String]) -> Result<()> {
    let schema = parse_schema(specs);
    if schema.is_empty() {
        bail!("at least one --field is required");
    }

    let store = SqliteStore::open(&config.db).await?;
    let content = store.get_file_content(content_id).await;
    store.close().await;
    let Some(content) = content? else {
        bail!("file content {} not found", content_id);
    };

    let found = extract_fields(&content.text, &schema);
    for field in schema.keys() {
        match found.get(field) {
            Some(value) => println!("{}: {}", field, value),
            None => println!("{}: (not found)", field),
        }
    }
    Ok(())
}

pub async fn run_chat(
    config: &Config,
    message: &str,
    model: Option<&str>,
    language: Option<&str>,
) -> Result<()> {
    let chat = GroqClient::new(&config.llm)?;
    let model = model.unwrap_or(&config.llm.default_model);
    println!("{}", chat_reply(&chat, Some(model), language, message).await);
    Ok(())
}
