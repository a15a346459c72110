//! Vector store abstraction for roadsafe.
//!
//! Provides a trait-based interface over the persisted similarity index. Two on-disk
//! backends exist: an incremental SQLite store and an immutable JSON snapshot.

mod memory;
mod snapshot;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use snapshot::SnapshotVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::{Settings, StoreBackend};
use crate::error::{Result, RoadSafeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// A guideline record stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// Position of the source record in the input table.
    pub row: usize,
    /// Flattened record text.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document.
    pub fn new(row: usize, content: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            row,
            content,
            embedding,
            indexed_at: Utc::now(),
        }
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Cosine similarity to the query (higher is closer).
    pub score: f32,
}

impl SearchResult {
    /// Cosine distance to the query (lower is closer).
    pub fn distance(&self) -> f32 {
        1.0 - self.score
    }
}

/// Build metadata recorded alongside the documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMeta {
    /// Embedding model used to build the index.
    pub embedding_model: String,
    /// Embedding dimensions.
    pub dimensions: usize,
    /// Number of documents written by the build.
    pub document_count: usize,
    /// Source file the index was built from.
    pub source: String,
    /// When the build finished.
    pub built_at: DateTime<Utc>,
}

impl IndexMeta {
    /// Check that query-time embeddings are compatible with this index.
    pub fn ensure_compatible(&self, model: &str, dimensions: usize) -> Result<()> {
        if self.embedding_model != model {
            return Err(RoadSafeError::IndexMismatch(format!(
                "index was built with embedding model '{}', configured model is '{}'",
                self.embedding_model, model
            )));
        }
        if self.dimensions != dimensions {
            return Err(RoadSafeError::IndexMismatch(format!(
                "index has {} dimensions, configured embedding has {}",
                self.dimensions, dimensions
            )));
        }
        Ok(())
    }
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert documents, keeping their order.
    async fn insert_batch(&self, docs: &[Document]) -> Result<usize>;

    /// Return the `limit` documents closest to the query, by descending similarity.
    ///
    /// No threshold is applied. Ties keep insertion order.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    /// Remove every document and the build metadata.
    async fn clear(&self) -> Result<usize>;

    /// Get total document count.
    async fn document_count(&self) -> Result<usize>;

    /// Read the build metadata, if the index has been built.
    async fn meta(&self) -> Result<Option<IndexMeta>>;

    /// Record build metadata.
    async fn set_meta(&self, meta: &IndexMeta) -> Result<()>;

    /// Persist pending changes.
    async fn flush(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Score documents against a query and keep the `limit` best.
///
/// The sort is stable, so equal scores keep the order documents were given in. A score that
/// is not a number ranks as the least similar.
pub(crate) fn rank<I>(documents: I, query_embedding: &[f32], limit: usize) -> Vec<SearchResult>
where
    I: IntoIterator<Item = Document>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut results: Vec<SearchResult> = documents
        .into_iter()
        .map(|document| {
            let score = cosine_similarity(query_embedding, &document.embedding);
            let score = if score.is_nan() { -1.0 } else { score };
            SearchResult { document, score }
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(limit);
    results
}

/// Path of the backing file for a backend inside the index directory.
pub fn index_file(index_dir: &Path, backend: StoreBackend) -> PathBuf {
    match backend {
        StoreBackend::Sqlite => index_dir.join("index.db"),
        StoreBackend::Snapshot => index_dir.join("index.json"),
    }
}

/// Open an existing index for querying.
///
/// Fails when the index has not been built, or was built with a different embedding model
/// or dimension than the one configured.
pub fn open_index(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let backend = settings.vector_store.provider;
    let path = index_file(&settings.index_dir(), backend);

    if !path.exists() {
        return Err(RoadSafeError::IndexNotFound(path.display().to_string()));
    }

    let (store, meta): (Arc<dyn VectorStore>, Option<IndexMeta>) = match backend {
        StoreBackend::Sqlite => {
            let store = SqliteVectorStore::new(&path)?;
            let meta = store.read_meta()?;
            (Arc::new(store), meta)
        }
        StoreBackend::Snapshot => {
            let store = SnapshotVectorStore::open(&path)?;
            let meta = store.index_meta()?;
            (Arc::new(store), meta)
        }
    };

    // A build that failed before writing metadata leaves an unusable file behind.
    let meta = meta.ok_or_else(|| {
        warn!("{} has no build metadata", path.display());
        RoadSafeError::IndexNotFound(path.display().to_string())
    })?;
    meta.ensure_compatible(&settings.embedding.model, settings.embedding.dimensions as usize)?;

    info!(
        "Opened {} index at {} ({} documents)",
        backend,
        path.display(),
        meta.document_count
    );
    Ok(store)
}

/// Create (or reopen for overwriting) the index a build writes into.
pub fn create_index(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let backend = settings.vector_store.provider;
    let path = index_file(&settings.index_dir(), backend);

    let store: Arc<dyn VectorStore> = match backend {
        StoreBackend::Sqlite => Arc::new(SqliteVectorStore::new(&path)?),
        StoreBackend::Snapshot => Arc::new(SnapshotVectorStore::create(&path)),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(model: &str, dimensions: usize) -> IndexMeta {
        IndexMeta {
            embedding_model: model.to_string(),
            dimensions,
            document_count: 0,
            source: "guidelines.xlsx".to_string(),
            built_at: Utc::now(),
        }
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_rank_orders_by_distance_and_limits() {
        let docs = vec![
            Document::new(0, "far".to_string(), vec![0.0, 1.0]),
            Document::new(1, "near".to_string(), vec![1.0, 0.1]),
            Document::new(2, "middle".to_string(), vec![1.0, 1.0]),
        ];

        let results = rank(docs.clone(), &[1.0, 0.0], 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.content, "near");
        assert_eq!(results[1].document.content, "middle");
        assert!(results[0].distance() <= results[1].distance());

        assert!(rank(docs, &[1.0, 0.0], 0).is_empty());
    }

    #[test]
    fn test_rank_keeps_insertion_order_on_ties() {
        let docs = vec![
            Document::new(0, "first".to_string(), vec![1.0, 0.0]),
            Document::new(1, "second".to_string(), vec![2.0, 0.0]),
        ];
        let results = rank(docs, &[1.0, 0.0], 5);
        assert_eq!(results[0].document.content, "first");
        assert_eq!(results[1].document.content, "second");
    }

    #[test]
    fn test_rank_places_nan_scores_last() {
        let docs = vec![
            Document::new(0, "broken".to_string(), vec![f32::NAN, 0.0]),
            Document::new(1, "match".to_string(), vec![1.0, 0.0]),
            Document::new(2, "orthogonal".to_string(), vec![0.0, 1.0]),
        ];
        let results = rank(docs, &[1.0, 0.0], 5);
        let order: Vec<&str> = results.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(order, vec!["match", "orthogonal", "broken"]);
    }

    #[test]
    fn test_meta_compatibility() {
        let m = meta("text-embedding-3-small", 1536);
        assert!(m.ensure_compatible("text-embedding-3-small", 1536).is_ok());
        assert!(matches!(
            m.ensure_compatible("all-mpnet-base-v2", 1536),
            Err(RoadSafeError::IndexMismatch(_))
        ));
        assert!(matches!(
            m.ensure_compatible("text-embedding-3-small", 768),
            Err(RoadSafeError::IndexMismatch(_))
        ));
    }

    #[test]
    fn test_open_missing_index_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.index_dir = dir.path().join("index").display().to_string();

        for backend in [StoreBackend::Sqlite, StoreBackend::Snapshot] {
            settings.vector_store.provider = backend;
            assert!(matches!(
                open_index(&settings),
                Err(RoadSafeError::IndexNotFound(_))
            ));
        }
    }

    #[test]
    fn test_index_without_metadata_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.index_dir = dir.path().display().to_string();

        // An interrupted build leaves the database file without metadata.
        create_index(&settings).unwrap();
        assert!(index_file(dir.path(), StoreBackend::Sqlite).exists());

        assert!(matches!(
            open_index(&settings),
            Err(RoadSafeError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_open_rejects_index_built_with_other_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.vector_store.index_dir = dir.path().display().to_string();
        settings.embedding.dimensions = 2;

        let store = create_index(&settings).unwrap();
        store
            .insert_batch(&[Document::new(0, "a".to_string(), vec![1.0, 0.0])])
            .await
            .unwrap();
        store.set_meta(&meta("other-model", 2)).await.unwrap();
        store.flush().await.unwrap();

        assert!(matches!(
            open_index(&settings),
            Err(RoadSafeError::IndexMismatch(_))
        ));

        settings.embedding.model = "other-model".to_string();
        assert!(open_index(&settings).is_ok());
    }
}
