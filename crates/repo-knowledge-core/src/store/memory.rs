//! In-memory [`VectorStore`] for tests and ephemeral sessions.
//!
//! Records live in a `HashMap` of per-index `Vec`s behind a `RwLock`.
//! Queries are brute-force cosine similarity over the whole index.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::{StoredVector, VectorMatch, VectorRecord, VectorStore};
use crate::embedding::cosine_similarity;

/// In-memory vector store.
#[derive(Default)]
pub struct InMemoryVectorStore {
    indexes: RwLock<HashMap<String, Vec<VectorRecord>>>,
    cleared: RwLock<HashSet<String>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory vector store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let stored = indexes.entry(index.to_string()).or_default();
        for record in records {
            match stored.iter_mut().find(|r| r.chunk.id == record.chunk.id) {
                Some(existing) => *existing = record.clone(),
                None => stored.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, index: &str, vector: &[f32], limit: usize) -> Result<Vec<VectorMatch>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        let Some(records) = indexes.get(index) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<VectorMatch> = records
            .iter()
            .map(|r| VectorMatch {
                chunk: r.chunk.clone(),
                score: f64::from(cosine_similarity(vector, &r.vector)),
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
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes.get(index).map(Vec::len).unwrap_or(0))
    }

    async fn stored_vectors(&self, index: &str) -> Result<HashMap<String, StoredVector>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes
            .get(index)
            .map(|records| {
                records
                    .iter()
                    .map(|r| {
                        (
                            r.chunk.id.clone(),
                            StoredVector {
                                hash: r.chunk.hash.clone(),
                                vector: r.vector.clone(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        self.indexes.write().map_err(poisoned)?.remove(index);
        Ok(())
    }

    async fn set_cleared(&self, index: &str, cleared: bool) -> Result<()> {
        let mut set = self.cleared.write().map_err(poisoned)?;
        if cleared {
            set.insert(index.to_string());
        } else {
            set.remove(index);
        }
        Ok(())
    }

    async fn is_cleared(&self, index: &str) -> Result<bool> {
        Ok(self.cleared.read().map_err(poisoned)?.contains(index))
    }
}
