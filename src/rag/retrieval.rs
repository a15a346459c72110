//! Nearest-neighbour retrieval over the guideline index.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::{SearchResult, VectorStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fetches the guideline records closest to a piece of text.
pub struct Retriever {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    top_k: usize,
}

impl Retriever {
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            top_k: 3,
        }
    }

    /// Set the default number of records returned by [`Retriever::retrieve_default`].
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Return at most `k` records ordered by ascending distance to `text`.
    ///
    /// The text is embedded once. Every one of the `k` nearest records is returned,
    /// however distant.
    #[instrument(skip(self, text))]
    pub async fn retrieve(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedder.embed(text).await?;
        let results = self.vector_store.search(&query_embedding, k).await?;
        debug!("Retrieved {} records", results.len());
        Ok(results)
    }

    /// Retrieve with the configured `top_k`.
    pub async fn retrieve_default(&self, text: &str) -> Result<Vec<SearchResult>> {
        self.retrieve(text, self.top_k).await
    }
}
