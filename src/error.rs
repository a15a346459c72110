//! Error types for roadsafe.

use thiserror::Error;

/// Library-level error type for roadsafe operations.
#[derive(Error, Debug)]
pub enum RoadSafeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Index not found at {0}. Run 'roadsafe index <file>' first.")]
    IndexNotFound(String),

    #[error("Index mismatch: {0}. Rebuild the index with 'roadsafe index <file>'.")]
    IndexMismatch(String),

    #[error("RAG error: {0}")]
    Rag(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for roadsafe operations.
pub type Result<T> = std::result::Result<T, RoadSafeError>;
