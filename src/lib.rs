//! RoadSafe - guideline-grounded road-safety recommendations
//!
//! A retrieval-augmented assistant that maps road-condition reports and sensor readings to
//! recommendations citing IRC / MoRTH road-safety guidelines.
//!
//! # Overview
//!
//! RoadSafe works in two phases:
//! - `roadsafe index` reads the guideline spreadsheet, embeds every record and persists a
//!   similarity index
//! - `roadsafe chat`, `ask` and `serve` embed each user turn, retrieve the nearest
//!   guideline records and ask a language model for a recommendation
//!
//! # Architecture
//!
//! - `config` - Settings, credentials and prompt templates
//! - `ingest` - Spreadsheet and CSV reading
//! - `embedding` - Embedding generation
//! - `vector_store` - Similarity index backends
//! - `indexer` - Offline index build
//! - `rag` - Retrieval, prompt assembly, generation and the turn handler
//! - `sensor` - Sensor block formatting
//! - `session` - Chat history
//! - `export` - Transcript export (PDF, JSON, text)
//!
//! # Example
//!
//! ```rust,no_run
//! use roadsafe::config::{Credentials, Prompts, Settings};
//! use roadsafe::embedding::OpenAIEmbedder;
//! use roadsafe::rag::{Assistant, OpenAIGenerator, PromptAssembler, Retriever};
//! use roadsafe::session::ChatHistory;
//! use roadsafe::vector_store::open_index;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let credentials = Credentials::from_env(&settings.provider);
//!
//!     let embedder = Arc::new(OpenAIEmbedder::from_settings(&settings, &credentials)?);
//!     let retriever = Retriever::new(open_index(&settings)?, embedder);
//!     let assembler = PromptAssembler::new(
//!         Prompts::default(),
//!         settings.rag.template,
//!         settings.rag.context_chars,
//!     );
//!     let generator = Arc::new(OpenAIGenerator::from_settings(&settings, &credentials)?);
//!     let assistant = Assistant::new(retriever, assembler, generator);
//!
//!     let mut history = ChatHistory::new();
//!     if let Some(analysis) = assistant.handle(&mut history, "pothole on highway", "").await? {
//!         println!("{}", analysis.answer);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod indexer;
pub mod ingest;
pub mod openai;
pub mod rag;
pub mod sensor;
pub mod session;
pub mod vector_store;

pub use error::{Result, RoadSafeError};
