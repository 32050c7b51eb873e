//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as little-endian `f32` BLOBs next to the chunk
//! metadata they embed. Queries load an index's vectors and rank them by
//! cosine similarity in Rust, which is adequate at documentation scale.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

use repo_knowledge_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use repo_knowledge_core::models::DocumentChunk;
use repo_knowledge_core::store::{StoredVector, VectorMatch, VectorRecord, VectorStore};

use crate::{db, migrate};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open the store at `path`, creating the file and schema when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> DocumentChunk {
    DocumentChunk {
        id: row.get("chunk_id"),
        source: row.get("source"),
        title: row.get("title"),
        section: row.get("section"),
        content: row.get("content"),
        hash: row.get("hash"),
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await?;

        for record in records {
            let chunk = &record.chunk;
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (index_name, chunk_id, source, title, section,
                                           content, hash, dims, embedding, updated_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(index_name, chunk_id) DO UPDATE SET
                    source = excluded.source,
                    title = excluded.title,
                    section = excluded.section,
                    content = excluded.content,
                    hash = excluded.hash,
                    dims = excluded.dims,
                    embedding = excluded.embedding,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(index)
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(&chunk.title)
            .bind(&chunk.section)
            .bind(&chunk.content)
            .bind(&chunk.hash)
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        let rows = sqlx::query(
            r#"
            SELECT chunk_id, source, title, section, content, hash, embedding
            FROM chunk_vectors
            WHERE index_name = ?
            ORDER BY rowid
            "#,
        )
        .bind(index)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                VectorMatch {
                    chunk: row_to_chunk(row),
                    score: f64::from(cosine_similarity(vector, &blob_to_vec(&blob))),
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);

        Ok(matches)
    }

    async fn count(&self, index: &str) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE index_name = ?")
                .bind(index)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn stored_vectors(&self, index: &str) -> Result<HashMap<String, StoredVector>> {
        let rows =
            sqlx::query("SELECT chunk_id, hash, embedding FROM chunk_vectors WHERE index_name = ?")
                .bind(index)
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                (
                    row.get::<String, _>("chunk_id"),
                    StoredVector {
                        hash: row.get("hash"),
                        vector: blob_to_vec(&blob),
                    },
                )
            })
            .collect())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunk_vectors WHERE index_name = ?")
            .bind(index)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_cleared(&self, index: &str, cleared: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO index_state (index_name, cleared, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(index_name) DO UPDATE SET
                cleared = excluded.cleared,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(index)
        .bind(cleared)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_cleared(&self, index: &str) -> Result<bool> {
        let cleared: Option<bool> =
            sqlx::query_scalar("SELECT cleared FROM index_state WHERE index_name = ?")
                .bind(index)
                .fetch_optional(&self.pool)
                .await?;
        Ok(cleared.unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, content: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            chunk: DocumentChunk {
                id: id.to_string(),
                source: "docs/a.md".to_string(),
                title: "A".to_string(),
                section: "A".to_string(),
                content: content.to_string(),
                hash: format!("hash-{}", content),
            },
            vector,
        }
    }

    async fn open_temp() -> (TempDir, SqliteVectorStore) {
        let tmp = TempDir::new().unwrap();
        let store = SqliteVectorStore::open(&tmp.path().join("data/rkb.sqlite"))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn test_query_ranks_by_similarity() {
        let (_tmp, store) = open_temp().await;
        store
            .upsert(
                "docs",
                &[
                    record("a:0", "far", vec![0.0, 1.0]),
                    record("a:1", "near", vec![1.0, 0.1]),
                    record("a:2", "mid", vec![1.0, 1.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.query("docs", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["a:1", "a:2"]);
        assert_eq!(hits[0].chunk.content, "near");
    }

    #[tokio::test]
    async fn test_empty_index_and_isolation() {
        let (_tmp, store) = open_temp().await;
        assert!(store.query("docs", &[1.0], 5).await.unwrap().is_empty());

        store
            .upsert("docs", &[record("a:0", "one", vec![1.0])])
            .await
            .unwrap();
        store
            .upsert("other", &[record("a:0", "two", vec![1.0])])
            .await
            .unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 1);
        assert_eq!(store.count("other").await.unwrap(), 1);

        store.delete_index("docs").await.unwrap();
        assert_eq!(store.count("docs").await.unwrap(), 0);
        assert_eq!(store.count("other").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_reports_hashes() {
        let (_tmp, store) = open_temp().await;
        store
            .upsert("docs", &[record("a:0", "old", vec![1.0, 0.0])])
            .await
            .unwrap();
        store
            .upsert("docs", &[record("a:0", "new", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.count("docs").await.unwrap(), 1);
        let stored = store.stored_vectors("docs").await.unwrap();
        assert_eq!(stored["a:0"].hash, "hash-new");
        assert_eq!(stored["a:0"].vector, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rkb.sqlite");
        let store = SqliteVectorStore::open(&path).await.unwrap();
        store
            .upsert("docs", &[record("a:0", "kept", vec![1.0])])
            .await
            .unwrap();
        store.close().await;

        let reopened = SqliteVectorStore::open(&path).await.unwrap();
        assert_eq!(reopened.count("docs").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_cleared_marker_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rkb.sqlite");

        let store = SqliteVectorStore::open(&path).await.unwrap();
        store
            .upsert("docs", &[record("a:0", "one", vec![1.0])])
            .await
            .unwrap();
        assert!(!store.is_cleared("docs").await.unwrap());
        store.set_cleared("docs", true).await.unwrap();
        store.close().await;

        let store = SqliteVectorStore::open(&path).await.unwrap();
        assert!(store.is_cleared("docs").await.unwrap());
        assert!(!store.is_cleared("other").await.unwrap());
        assert_eq!(store.count("docs").await.unwrap(), 1);

        store.set_cleared("docs", false).await.unwrap();
        assert!(!store.is_cleared("docs").await.unwrap());
    }
}
