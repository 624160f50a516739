//! HTTP API over extraction, indexing, search and the document assistant.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/api/health` | Health check (returns version) |
//! | `GET`    | `/api/capabilities` | Extractor chains and external tool probes |
//! | `POST`   | `/api/chat` | Chat proxy to the LLM |
//! | `POST`   | `/api/extract` | Multipart `file` upload → stored extracted text |
//! | `GET`    | `/api/file-contents/{id}` | Stored extracted text |
//! | `POST`   | `/api/documents/{id}/index` | Chunk, embed and index a document |
//! | `DELETE` | `/api/documents/{id}` | Drop a document from the index |
//! | `POST`   | `/api/search` | Semantic search |
//! | `POST`   | `/api/summarize-pdf` | Multipart `pdf` upload → summary |
//! | `POST`   | `/api/ask-pdf-question` | Question over stored extracted text |
//! | `POST`   | `/api/extract-fields` | Schema-driven fields from stored or inline text |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `payload_too_large`
//! (413), `embeddings_unavailable` (503), `internal` (500).
//!
//! An upload whose extraction fails is not an error: the response carries
//! `success: false` and the extraction-failure message.

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::{Assistant, AssistantError};
use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::extract::{Capabilities, ExtractionDispatcher, FileKind, EXTRACTION_FAILED_MESSAGE};
use crate::fields::extract_fields;
use crate::index::{delete_document, index_content, index_document, IndexError, IndexReport};
use crate::llm::{chat_reply, ChatModel, GroqClient};
use crate::models::{FileContent, SearchHit, Upload};
use crate::search::{semantic_search, SearchOutcome};
use crate::store::{SqliteStore, Store};
use crate::upload::{process_upload, UploadError, UploadOutcome};

/// Multipart framing allowance on top of the configured upload size.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn Store>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub dispatcher: Arc<ExtractionDispatcher>,
    pub chat: Arc<dyn ChatModel>,
    pub assistant: Arc<Assistant>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        dispatcher: Arc<ExtractionDispatcher>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        let assistant = Arc::new(Assistant::new(chat.clone(), &config.llm));
        Self {
            config: Arc::new(config),
            store,
            embedder,
            dispatcher,
            chat,
            assistant,
        }
    }

    /// Production wiring: SQLite store, configured embedder, probed
    /// extractors and the Groq client.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.db).await?);
        let embedder: Arc<dyn EmbeddingProvider> = create_provider(&config.embedding)?.into();
        let dispatcher = Arc::new(ExtractionDispatcher::detect(&config.extraction));
        let chat = Arc::new(GroqClient::new(&config.llm)?);
        Ok(Self::new(config.clone(), store, embedder, dispatcher, chat))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let body_limit = state.config.extraction.max_upload_bytes + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/capabilities", get(handle_capabilities))
        .route("/api/chat", post(handle_chat))
        .route("/api/extract", post(handle_extract))
        .route("/api/file-contents/{id}", get(handle_get_file_content))
        .route("/api/documents/{id}/index", post(handle_index))
        .route("/api/documents/{id}", axum::routing::delete(handle_delete))
        .route("/api/search", post(handle_search))
        .route("/api/summarize-pdf", post(handle_summarize_pdf))
        .route("/api/ask-pdf-question", post(handle_ask_pdf_question))
        .route("/api/extract-fields", post(handle_extract_fields))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// Bind `[server].bind` and serve until Ctrl-C, then close the store.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let state = AppState::from_config(config).await?;
    let store = state.store.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "HTTP server listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<UploadError>() {
            Some(UploadError::TooLarge { .. }) => {
                Self::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", err.to_string())
            }
            Some(UploadError::Empty) => Self::bad_request(err.to_string()),
            None => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                Self::internal(format!("{err:#}"))
            }
        }
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::EmptyDocumentId | IndexError::NoChunks => {
                Self::bad_request(err.to_string())
            }
            IndexError::ContentNotFound(_) => Self::not_found(err.to_string()),
            IndexError::EmbeddingsUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "embeddings_unavailable",
                err.to_string(),
            ),
            IndexError::Embedding(_) | IndexError::CountMismatch { .. } | IndexError::Store(_) => {
                tracing::error!(error = %err, "indexing failed");
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::NotFound(_) => Self::not_found(err.to_string()),
            AssistantError::EmptyInput(_) => Self::bad_request(err.to_string()),
            AssistantError::Other(e) => e.into(),
        }
    }
}

// ============ Multipart ============

/// Read the first multipart field called `field_name` into an [`Upload`].
async fn read_upload(mut multipart: Multipart, field_name: &str) -> Result<Upload, AppError> {
    loop {
        let field = multipart.next_field().await.map_err(multipart_error)?;
        let Some(field) = field else {
            return Err(AppError::bad_request(format!(
                "multipart field '{}' is required",
                field_name
            )));
        };
        if field.name() != Some(field_name) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", e.body_text())
    } else {
        AppError::bad_request(e.body_text())
    }
}

// ============ GET /api/health, /api/capabilities ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_capabilities(State(state): State<AppState>) -> Json<Capabilities> {
    Json(state.dispatcher.capabilities())
}

// ============ POST /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
    model: Option<String>,
    language: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if req.message.trim().is_empty() {
        return Err(AppError::bad_request("message must not be empty"));
    }
    let model = req
        .model
        .as_deref()
        .unwrap_or(&state.config.llm.default_model);
    let reply = chat_reply(
        state.chat.as_ref(),
        Some(model),
        req.language.as_deref(),
        &req.message,
    )
    .await;
    Ok(Json(ChatResponse { reply }))
}

// ============ POST /api/extract ============

#[derive(Serialize)]
struct ExtractResponse {
    success: bool,
    content_id: Option<String>,
    kind: FileKind,
    extractor: Option<String>,
    text: String,
    truncated: bool,
}

async fn handle_extract(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, AppError> {
    let upload = read_upload(multipart, "file").await?;
    let outcome = process_upload(
        state.dispatcher.clone(),
        state.store.as_ref(),
        upload,
        &state.config.extraction,
    )
    .await?;

    Ok(Json(match outcome {
        UploadOutcome::Stored(content) => ExtractResponse {
            success: true,
            content_id: Some(content.id),
            kind: content.kind,
            extractor: Some(content.extractor),
            text: content.text,
            truncated: content.truncated,
        },
        UploadOutcome::Failed { kind, .. } => ExtractResponse {
            success: false,
            content_id: None,
            kind,
            extractor: None,
            text: EXTRACTION_FAILED_MESSAGE.to_string(),
            truncated: false,
        },
    }))
}

// ============ GET /api/file-contents/{id} ============

async fn handle_get_file_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileContent>, AppError> {
    state
        .store
        .get_file_content(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("file content {} not found", id)))
}

// ============ POST /api/documents/{id}/index, DELETE /api/documents/{id} ============

#[derive(Deserialize)]
struct IndexRequest {
    content_id: Option<String>,
    text: Option<String>,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Serialize)]
struct IndexResponse {
    success: bool,
    #[serde(flatten)]
    report: IndexReport,
}

async fn handle_index(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    let store = state.store.as_ref();
    let embedder = state.embedder.as_ref();
    let chunking = &state.config.chunking;
    let batch_size = state.config.embedding.batch_size;

    let report = match (req.content_id, req.text) {
        (Some(content_id), None) => {
            index_content(
                store,
                embedder,
                &document_id,
                &content_id,
                req.metadata,
                chunking,
                batch_size,
            )
            .await?
        }
        (None, Some(text)) => {
            index_document(
                store,
                embedder,
                &document_id,
                &text,
                req.metadata,
                chunking,
                batch_size,
            )
            .await?
        }
        _ => {
            return Err(AppError::bad_request(
                "exactly one of content_id or text is required",
            ))
        }
    };

    Ok(Json(IndexResponse {
        success: true,
        report,
    }))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    deleted: u64,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let deleted = delete_document(state.store.as_ref(), &document_id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        deleted,
    }))
}

// ============ POST /api/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    if req.query.trim().is_empty() {
        return Err(AppError::bad_request("query must not be empty"));
    }
    let retrieval = &state.config.retrieval;
    let limit = req
        .limit
        .unwrap_or(retrieval.default_limit)
        .clamp(1, retrieval.max_limit);

    let outcome = semantic_search(
        state.store.as_ref(),
        state.embedder.as_ref(),
        &req.query,
        limit,
    )
    .await;

    Ok(Json(match outcome {
        SearchOutcome::Hits(results) => SearchResponse {
            status: "ok",
            reason: None,
            results,
        },
        SearchOutcome::Unavailable(reason) => SearchResponse {
            status: "unavailable",
            reason: Some(reason.to_string()),
            results: Vec::new(),
        },
    }))
}

// ============ POST /api/summarize-pdf, /api/ask-pdf-question ============

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummaryResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pdf_content_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn handle_summarize_pdf(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SummaryResponse>, AppError> {
    let upload = read_upload(multipart, "pdf").await?;
    let outcome = process_upload(
        state.dispatcher.clone(),
        state.store.as_ref(),
        upload,
        &state.config.extraction,
    )
    .await?;

    let content = match outcome {
        UploadOutcome::Stored(content) => content,
        UploadOutcome::Failed { .. } => {
            return Ok(Json(SummaryResponse {
                success: false,
                summary: None,
                pdf_content_id: None,
                message: Some(EXTRACTION_FAILED_MESSAGE.to_string()),
            }))
        }
    };

    let summary = state.assistant.summarize_document(&content.text).await?;
    Ok(Json(SummaryResponse {
        success: true,
        summary: Some(summary),
        pdf_content_id: Some(content.id),
        message: None,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AskRequest {
    pdf_content_id: String,
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    success: bool,
    answer: String,
}

async fn handle_ask_pdf_question(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let answer = state
        .assistant
        .answer_question(state.store.as_ref(), &req.pdf_content_id, &req.question)
        .await?;
    Ok(Json(AskResponse {
        success: true,
        answer,
    }))
}

// ============ POST /api/extract-fields ============

#[derive(Deserialize)]
struct FieldsRequest {
    content_id: Option<String>,
    text: Option<String>,
    schema: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct FieldsResponse {
    success: bool,
    fields: BTreeMap<String, String>,
}

async fn handle_extract_fields(
    State(state): State<AppState>,
    Json(req): Json<FieldsRequest>,
) -> Result<Json<FieldsResponse>, AppError> {
    if req.schema.is_empty() {
        return Err(AppError::bad_request("schema must name at least one field"));
    }
    let text = match (req.content_id, req.text) {
        (Some(content_id), None) => {
            state
                .store
                .get_file_content(&content_id)
                .await?
                .ok_or_else(|| {
                    AppError::not_found(format!("file content {} not found", content_id))
                })?
                .text
        }
        (None, Some(text)) => text,
        _ => {
            return Err(AppError::bad_request(
                "exactly one of content_id or text is required",
            ))
        }
    };

    Ok(Json(FieldsResponse {
        success: true,
        fields: extract_fields(&text, &req.schema),
    }))
}
