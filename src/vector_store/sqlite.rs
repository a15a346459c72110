//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust. The guideline corpus is a few
//! hundred rows, so a full scan per query is cheap.

use super::{rank, Document, IndexMeta, SearchResult, VectorStore};
use crate::error::{Result, RoadSafeError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    row_index INTEGER NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_row ON documents(row_index);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const META_KEY: &str = "build";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open or create a SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RoadSafeError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Read build metadata without going through the async trait.
    pub fn read_meta(&self) -> Result<Option<IndexMeta>> {
        let conn = self.lock()?;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM index_meta WHERE key = ?1",
                params![META_KEY],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let row_index: i64 = row.get(1)?;
        let embedding_bytes: Vec<u8> = row.get(3)?;
        let indexed_at_str: String = row.get(4)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            row: usize::try_from(row_index).unwrap_or_default(),
            content: row.get(2)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs))]
    async fn insert_batch(&self, docs: &[Document]) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            tx.execute(
                r#"
                INSERT OR REPLACE INTO documents (id, row_index, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    doc.id.to_string(),
                    doc.row as i64,
                    doc.content,
                    Self::embedding_to_bytes(&doc.embedding),
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Batch inserted {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, row_index, content, embedding, indexed_at
            FROM documents
            ORDER BY rowid
            "#,
        )?;

        let docs = stmt
            .query_map([], Self::row_to_document)?
            .collect::<rusqlite::Result<Vec<Document>>>()?;

        let results = rank(docs, query_embedding, limit);
        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute("DELETE FROM documents", [])?;
        tx.execute("DELETE FROM index_meta", [])?;
        tx.commit()?;

        info!("Cleared {} documents", deleted);
        Ok(deleted)
    }

    async fn document_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn meta(&self) -> Result<Option<IndexMeta>> {
        self.read_meta()
    }

    async fn set_meta(&self, meta: &IndexMeta) -> Result<()> {
        let json = serde_json::to_string(meta)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO index_meta (key, value) VALUES (?1, ?2)",
            params![META_KEY, json],
        )?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_vector_store() {
        let store = SqliteVectorStore::in_memory().unwrap();

        let docs = vec![
            Document::new(0, "Fog | IRC:SP:73 | reduce speed".to_string(), vec![1.0, 0.0, 0.0]),
            Document::new(1, "Pothole | IRC:82 | repair".to_string(), vec![0.0, 1.0, 0.0]),
            Document::new(2, "Curve | IRC:38 | signage".to_string(), vec![0.6, 0.8, 0.0]),
        ];
        assert_eq!(store.insert_batch(&docs).await.unwrap(), 3);
        assert_eq!(store.document_count().await.unwrap(), 3);

        let results = store.search(&[0.0, 1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document, docs[1]);
        assert_eq!(results[1].document.row, 2);
        assert!((results[0].score - 1.0).abs() < 0.001);

        let deleted = store.clear().await.unwrap();
        assert_eq!(deleted, 3);
        assert!(store.search(&[0.0, 1.0, 0.0], 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_meta_roundtrip_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index").join("index.db");

        let meta = IndexMeta {
            embedding_model: "text-embedding-3-small".to_string(),
            dimensions: 3,
            document_count: 1,
            source: "GPT_Input_DB.xlsx".to_string(),
            built_at: Utc::now(),
        };

        {
            let store = SqliteVectorStore::new(&path).unwrap();
            assert!(store.read_meta().unwrap().is_none());
            store
                .insert_batch(&[Document::new(0, "row".to_string(), vec![0.1, 0.2, 0.3])])
                .await
                .unwrap();
            store.set_meta(&meta).await.unwrap();
        }

        let reopened = SqliteVectorStore::new(&path).unwrap();
        assert_eq!(reopened.read_meta().unwrap(), Some(meta));
        assert_eq!(reopened.document_count().await.unwrap(), 1);

        let results = reopened.search(&[0.1, 0.2, 0.3], 3).await.unwrap();
        assert_eq!(results[0].document.embedding, vec![0.1, 0.2, 0.3]);
    }
}
