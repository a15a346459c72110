//! Immutable JSON snapshot store.
//!
//! A build writes the whole index to a single `index.json` file. Opening the snapshot loads
//! it into memory; an opened snapshot rejects every mutation.

use super::{Document, IndexMeta, MemoryVectorStore, SearchResult, VectorStore};
use crate::error::{Result, RoadSafeError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    format_version: u32,
    meta: IndexMeta,
    documents: Vec<Document>,
}

/// Snapshot-backed vector store.
pub struct SnapshotVectorStore {
    path: PathBuf,
    inner: MemoryVectorStore,
    writable: bool,
}

impl SnapshotVectorStore {
    /// Start a new snapshot that will be written to `path` on flush.
    pub fn create(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            inner: MemoryVectorStore::new(),
            writable: true,
        }
    }

    /// Load a snapshot for read-only querying.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: SnapshotFile = serde_json::from_str(&content)?;

        if file.format_version != FORMAT_VERSION {
            return Err(RoadSafeError::IndexMismatch(format!(
                "snapshot format version {} is not supported (expected {})",
                file.format_version, FORMAT_VERSION
            )));
        }

        info!(
            "Loaded snapshot {:?} with {} documents",
            path,
            file.documents.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryVectorStore::with_documents(file.documents, Some(file.meta)),
            writable: false,
        })
    }

    /// Build metadata held by the snapshot.
    pub fn index_meta(&self) -> Result<Option<IndexMeta>> {
        self.inner.current_meta()
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(RoadSafeError::VectorStore(format!(
                "snapshot {} is read-only; rebuild it with 'roadsafe index'",
                self.path.display()
            )))
        }
    }
}

#[async_trait]
impl VectorStore for SnapshotVectorStore {
    async fn insert_batch(&self, docs: &[Document]) -> Result<usize> {
        self.ensure_writable()?;
        self.inner.insert_batch(docs).await
    }

    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.inner.search(query_embedding, limit).await
    }

    async fn clear(&self) -> Result<usize> {
        self.ensure_writable()?;
        self.inner.clear().await
    }

    async fn document_count(&self) -> Result<usize> {
        self.inner.document_count().await
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        self.inner.meta().await
    }

    async fn set_meta(&self, meta: &IndexMeta) -> Result<()> {
        self.ensure_writable()?;
        self.inner.set_meta(meta).await
    }

    /// Write the snapshot atomically: a temporary file in the same directory is renamed
    /// over the target.
    #[instrument(skip(self))]
    async fn flush(&self) -> Result<()> {
        self.ensure_writable()?;

        let meta = self.inner.current_meta()?.ok_or_else(|| {
            RoadSafeError::VectorStore("cannot write a snapshot without build metadata".to_string())
        })?;
        let file = SnapshotFile {
            format_version: FORMAT_VERSION,
            meta,
            documents: self.inner.documents()?,
        };

        let dir = self
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, &file)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .map_err(|e| RoadSafeError::Io(e.error))?;

        info!(
            "Wrote snapshot {:?} with {} documents",
            self.path,
            file.documents.len()
        );
        Ok(())
    }
}
