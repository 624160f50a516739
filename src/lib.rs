//! # Bharat RAG
//!
//! Backend for a multi-lingual AI chat assistant: document text extraction,
//! chunking, embeddings and semantic search, plus LLM-backed chat, document
//! summaries and question answering.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│  Extractors │──▶│ file_contents│──▶│ Assistant│──▶ Groq
//! │ (bytes)  │   │ PDF/OOXML/  │   │   (SQLite)   │   │ summary/ │
//! └──────────┘   │ CSV/OCR/txt │   └──────┬───────┘   │   Q&A    │
//!                └─────────────┘          │           └──────────┘
//!                                         ▼
//!                               ┌──────────────────┐   ┌──────────┐
//!                               │ Chunk + Embed    │──▶│  Search  │
//!                               │ (document index) │   │ (cosine) │
//!                               └──────────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! bharat init                           # create database
//! bharat extract report.pdf --store     # extract and persist text
//! bharat index report --content-id <id> # chunk + embed
//! bharat search "monsoon rainfall"
//! bharat serve                          # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Multi-format extraction with fallback chains |
//! | [`fields`] | Schema-driven `label: value` field extraction |
//! | [`upload`] | Upload validation, spooling and persistence |
//! | [`chunk`] | Overlapping text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Document indexing |
//! | [`search`] | Cosine-similarity search |
//! | [`store`] | Persistence trait with SQLite and in-memory backends |
//! | [`llm`] | Chat-completion client |
//! | [`assistant`] | Document summaries and Q&A |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing setup |

pub mod assistant;
pub mod chunk;
pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod fields;
pub mod index;
pub mod llm;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod store;
pub mod upload;
