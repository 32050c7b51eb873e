//! Vector-backed [`ChunkIndex`].
//!
//! Chunks are embedded in batches of `embedding.batch_size` with a pause of
//! `embedding.batch_delay_ms` between batches, then written to a
//! [`VectorStore`] in batches of at most the same size. A replace writes a
//! complete new generation: the previous records of the index are deleted
//! once the new vectors are ready.
//!
//! Chunks whose id and content hash match a stored record reuse its vector
//! instead of being embedded again, so reloading an unchanged repository
//! makes no embedding calls.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use repo_knowledge_core::embedding::{embed_query, Embedder};
use repo_knowledge_core::index::ChunkIndex;
use repo_knowledge_core::models::{DocumentChunk, ScoredChunk};
use repo_knowledge_core::store::{VectorRecord, VectorStore};

use crate::config::{EmbeddingConfig, IndexConfig};

#[derive(Debug, Clone)]
pub struct VectorIndexSettings {
    /// Collection name inside the store.
    pub name: String,
    pub embed_batch_size: usize,
    pub store_batch_size: usize,
    pub batch_delay: Duration,
}

impl VectorIndexSettings {
    pub fn from_config(index: &IndexConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            name: index.name.clone(),
            embed_batch_size: embedding.batch_size,
            store_batch_size: embedding.effective_store_batch_size(),
            batch_delay: Duration::from_millis(embedding.batch_delay_ms),
        }
    }
}

/// Counters from the most recent replace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceStats {
    pub embedded: usize,
    pub reused: usize,
    pub failed: usize,
    pub stored: usize,
}

pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    settings: VectorIndexSettings,
    count: usize,
    initialized: bool,
    last_stats: ReplaceStats,
}

impl VectorIndex {
    /// Attach to `settings.name` in `store`. An index that already holds
    /// records starts out initialized unless it was cleared since its last
    /// load.
    pub async fn open(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        settings: VectorIndexSettings,
    ) -> Result<Self> {
        let count = store.count(&settings.name).await?;
        let cleared = store.is_cleared(&settings.name).await?;
        tracing::debug!(index = %settings.name, count, cleared, "opened vector index");
        Ok(Self {
            embedder,
            store,
            settings,
            count,
            initialized: count > 0 && !cleared,
            last_stats: ReplaceStats::default(),
        })
    }

    pub fn last_stats(&self) -> ReplaceStats {
        self.last_stats
    }

    /// Store writes never exceed one embedding batch.
    fn store_batch_size(&self) -> usize {
        self.settings
            .store_batch_size
            .min(self.settings.embed_batch_size)
            .max(1)
    }

    /// Embed every chunk without a reusable vector. Failed batches are
    /// logged and leave their slots empty.
    async fn embed_missing(
        &self,
        chunks: &[DocumentChunk],
        vectors: &mut [Option<Vec<f32>>],
        stats: &mut ReplaceStats,
    ) {
        let missing: Vec<usize> = (0..chunks.len()).filter(|&i| vectors[i].is_none()).collect();
        let batch_size = self.settings.embed_batch_size.max(1);
        let total_batches = missing.len().div_ceil(batch_size);

        for (batch_no, batch) in missing.chunks(batch_size).enumerate() {
            if batch_no > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            let texts: Vec<String> = batch.iter().map(|&i| chunks[i].content.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(embedded) if embedded.len() == batch.len() => {
                    for (&i, vector) in batch.iter().zip(embedded) {
                        vectors[i] = Some(vector);
                    }
                    stats.embedded += batch.len();
                    tracing::debug!(
                        batch = batch_no + 1,
                        of = total_batches,
                        "embedded batch"
                    );
                }
                Ok(embedded) => {
                    tracing::warn!(
                        expected = batch.len(),
                        got = embedded.len(),
                        "embedding batch returned the wrong number of vectors, skipping"
                    );
                    stats.failed += batch.len();
                }
                Err(e) => {
                    tracing::warn!(error = %e, size = batch.len(), "embedding batch failed, skipping");
                    stats.failed += batch.len();
                }
            }
        }
    }
}

#[async_trait]
impl ChunkIndex for VectorIndex {
    fn backend(&self) -> &'static str {
        "vector"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn len(&self) -> usize {
        self.count
    }

    async fn replace(&mut self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        let name = self.settings.name.clone();
        let mut stats = ReplaceStats::default();

        let stored = self.store.stored_vectors(&name).await?;
        let dims = self.embedder.dims();
        let mut vectors: Vec<Option<Vec<f32>>> = chunks
            .iter()
            .map(|chunk| {
                stored
                    .get(&chunk.id)
                    .filter(|s| s.hash == chunk.hash && s.vector.len() == dims)
                    .map(|s| s.vector.clone())
            })
            .collect();
        stats.reused = vectors.iter().filter(|v| v.is_some()).count();

        self.embed_missing(&chunks, &mut vectors, &mut stats).await;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .filter_map(|(chunk, vector)| vector.map(|vector| VectorRecord { chunk, vector }))
            .collect();

        if records.is_empty() && stats.failed > 0 {
            bail!(
                "no chunks could be embedded ({} failed); keeping the previous index",
                stats.failed
            );
        }

        self.store.delete_index(&name).await?;
        for batch in records.chunks(self.store_batch_size()) {
            match self.store.upsert(&name, batch).await {
                Ok(()) => stats.stored += batch.len(),
                Err(e) => {
                    tracing::warn!(error = %e, size = batch.len(), "vector store batch failed, skipping");
                }
            }
        }

        if stats.stored == 0 && !records.is_empty() {
            bail!("vector store rejected every batch for index '{}'", name);
        }

        tracing::info!(
            index = %name,
            stored = stats.stored,
            embedded = stats.embedded,
            reused = stats.reused,
            failed = stats.failed,
            "vector index replaced"
        );

        self.store.set_cleared(&name, false).await?;
        self.count = stats.stored;
        self.initialized = stats.stored > 0;
        self.last_stats = stats;
        Ok(stats.stored)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let matches = self.store.query(&self.settings.name, &vector, limit).await?;
        Ok(matches
            .into_iter()
            .map(|m| ScoredChunk {
                chunk: m.chunk,
                score: m.score,
            })
            .collect())
    }

    /// Logical reset only. Stored vectors stay until the next replace, which
    /// may reuse them; the cleared marker lives in the store so other
    /// processes see it too.
    async fn clear(&mut self) -> Result<()> {
        self.store.set_cleared(&self.settings.name, true).await?;
        self.initialized = false;
        Ok(())
    }
}
