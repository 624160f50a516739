//! # Bharat CLI (`bharat`)
//!
//! Command-line front end for extraction, indexing, search and the document
//! assistant, and the entry point for the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! bharat --config ./config/bharat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bharat init` | Create the SQLite database and run schema migrations |
//! | `bharat capabilities` | Show extractor chains and external tool availability |
//! | `bharat extract <file>` | Extract text from a file |
//! | `bharat index <document-id>` | Chunk, embed and index a document |
//! | `bharat search "<query>"` | Semantic search |
//! | `bharat delete <document-id>` | Remove a document from the index |
//! | `bharat summarize <file>` | Extract and summarize a document |
//! | `bharat ask <content-id> "<question>"` | Ask about stored text |
//! | `bharat fields <content-id> --field name=Label` | Pull labelled fields from stored text |
//! | `bharat chat "<message>"` | One-shot chat |
//! | `bharat serve` | Start the HTTP API |

use bharat_rag::{commands, config, logging, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bharat RAG: document extraction, semantic search and a multi-lingual
/// chat assistant.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. Secrets (`GROQ_API_KEY`, `OPENAI_API_KEY`) are read from the
/// environment or a `.env` file.
#[derive(Parser)]
#[command(name = "bharat", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/bharat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// List extractor chains per file kind and probe external tools.
    Capabilities,

    /// Extract text from a local file.
    Extract {
        file: PathBuf,

        /// Override the detected type with a MIME type or extension (e.g. `pdf`).
        #[arg(long = "type")]
        type_hint: Option<String>,

        /// Persist the extracted text and print its content id.
        #[arg(long)]
        store: bool,
    },

    /// Chunk, embed and index a document, replacing any previous chunks.
    Index {
        document_id: String,

        /// Index previously stored text.
        #[arg(long, conflicts_with = "file")]
        content_id: Option<String>,

        /// Extract and index a local file.
        #[arg(long)]
        file: Option<PathBuf>,

        /// JSON object attached to every chunk.
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Semantic search over indexed chunks.
    Search {
        query: String,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove a document's chunks from the index.
    Delete { document_id: String },

    /// Extract, store and summarize a document.
    Summarize { file: PathBuf },

    /// Answer a question from stored extracted text.
    Ask { content_id: String, question: String },

    /// Extract `Label: value` fields from stored text.
    Fields {
        content_id: String,

        /// `field` or `field=Label`; repeat for more fields.
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
    },

    /// Send one chat message and print the reply.
    Chat {
        message: String,

        /// Front-end model name, e.g. `LLaMA3-versatile`.
        #[arg(long)]
        model: Option<String>,

        /// Reply language code, e.g. `hi` or `ta`.
        #[arg(long)]
        language: Option<String>,
    },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Capabilities => commands::run_capabilities(&cfg)?,
        Commands::Extract {
            file,
            type_hint,
            store,
        } => commands::run_extract(&cfg, &file, type_hint.as_deref(), store).await?,
        Commands::Index {
            document_id,
            content_id,
            file,
            metadata,
        } => {
            commands::run_index(
                &cfg,
                &document_id,
                content_id.as_deref(),
                file.as_deref(),
                metadata.as_deref(),
            )
            .await?
        }
        Commands::Search { query, limit } => commands::run_search(&cfg, &query, limit).await?,
        Commands::Delete { document_id } => commands::run_delete(&cfg, &document_id).await?,
        Commands::Summarize { file } => commands::run_summarize(&cfg, &file).await?,
        Commands::Ask {
            content_id,
            question,
        } => commands::run_ask(&cfg, &content_id, &question).await?,
        Commands::Fields { content_id, fields } => {
            commands::run_fields(&cfg, &content_id, &fields).await?
        }
        Commands::Chat {
            message,
            model,
            language,
        } => {
            commands::run_chat(&cfg, &message, model.as_deref(), language.as_deref()).await?
        }
        Commands::Serve => server::run_server(&cfg).await?,
    }

    Ok(())
}
