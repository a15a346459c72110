//! In-memory vector store implementation.
//!
//! Useful for testing, and as the search engine behind loaded snapshots.

use super::{rank, Document, IndexMeta, SearchResult, VectorStore};
use crate::error::{Result, RoadSafeError};
use async_trait::async_trait;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store. Documents are kept in insertion order.
pub struct MemoryVectorStore {
    documents: RwLock<Vec<Document>>,
    meta: RwLock<Option<IndexMeta>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            meta: RwLock::new(None),
        }
    }

    /// Create a store holding the given documents and metadata.
    pub fn with_documents(documents: Vec<Document>, meta: Option<IndexMeta>) -> Self {
        Self {
            documents: RwLock::new(documents),
            meta: RwLock::new(meta),
        }
    }

    /// Copy of all documents, in insertion order.
    pub fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.read_docs()?.clone())
    }

    /// Copy of the current metadata.
    pub fn current_meta(&self) -> Result<Option<IndexMeta>> {
        self.meta
            .read()
            .map(|m| m.clone())
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn read_docs(&self) -> Result<RwLockReadGuard<'_, Vec<Document>>> {
        self.documents
            .read()
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write_docs(&self) -> Result<RwLockWriteGuard<'_, Vec<Document>>> {
        self.documents
            .write()
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert_batch(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self.write_docs()?;
        store.extend_from_slice(docs);
        Ok(docs.len())
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let docs = self.read_docs()?;
        Ok(rank(docs.iter().cloned(), query_embedding, limit))
    }

    async fn clear(&self) -> Result<usize> {
        let mut docs = self.write_docs()?;
        let removed = docs.len();
        docs.clear();
        drop(docs);

        let mut meta = self
            .meta
            .write()
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        *meta = None;
        Ok(removed)
    }

    async fn document_count(&self) -> Result<usize> {
        Ok(self.read_docs()?.len())
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        self.current_meta()
    }

    async fn set_meta(&self, meta: &IndexMeta) -> Result<()> {
        let mut current = self
            .meta
            .write()
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        *current = Some(meta.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
