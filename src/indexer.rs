//! Offline index builder.
//!
//! Turns the guideline table into a persisted similarity index: one document per record,
//! one embedding per document. Every build replaces whatever the index held before.

use crate::embedding::Embedder;
use crate::error::{Result, RoadSafeError};
use crate::ingest::{read_table, Table};
use crate::vector_store::{Document, IndexMeta, VectorStore};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Builds the similarity index from a table of guideline records.
pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    vector_store: Arc<dyn VectorStore>,
}

impl IndexBuilder {
    /// Create a builder writing into `vector_store`.
    pub fn new(embedder: Arc<dyn Embedder>, vector_store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            vector_store,
        }
    }

    /// Read a table from `path` and index it.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn build(&self, path: &Path) -> Result<BuildReport> {
        let table = read_table(path)?;
        info!("Read {} records from {}", table.len(), path.display());
        self.build_from_table(&table, &path.display().to_string())
            .await
    }

    /// Index an in-memory table.
    pub async fn build_from_table(&self, table: &Table, source: &str) -> Result<BuildReport> {
        let texts = table.document_texts();

        // Embed everything before touching the store so a provider failure leaves the
        // previous index in place.
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(RoadSafeError::Embedding(format!(
                "Expected {} embeddings, received {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let documents: Vec<Document> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(row, (content, embedding))| Document::new(row, content, embedding))
            .collect();

        let replaced = self.vector_store.clear().await?;
        if replaced > 0 {
            warn!("Replacing {} previously indexed documents", replaced);
        }

        let indexed = self.vector_store.insert_batch(&documents).await?;

        let meta = IndexMeta {
            embedding_model: self.embedder.model().to_string(),
            dimensions: self.embedder.dimensions(),
            document_count: indexed,
            source: source.to_string(),
            built_at: Utc::now(),
        };
        self.vector_store.set_meta(&meta).await?;
        self.vector_store.flush().await?;

        info!("Indexed {} documents with {}", indexed, meta.embedding_model);

        Ok(BuildReport {
            documents_indexed: indexed,
            documents_replaced: replaced,
            meta,
        })
    }
}

/// Result of an index build.
#[derive(Debug)]
pub struct BuildReport {
    /// Number of documents written.
    pub documents_indexed: usize,
    /// Number of documents the previous index held.
    pub documents_replaced: usize,
    /// Metadata recorded with the index.
    pub meta: IndexMeta,
}
