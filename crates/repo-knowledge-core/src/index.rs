//! Chunk index abstraction and the in-memory lexical index.
//!
//! [`ChunkIndex`] is the storage-agnostic contract shared by the lexical
//! variant defined here and the vector-backed variant in the app crate.
//! `replace` and `clear` take `&mut self` while `search` takes `&self`, so
//! a search can never observe a collection in the middle of a replace.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{DocumentChunk, IndexStatus, ScoredChunk};
use crate::score;

/// A queryable collection of chunks, replaced wholesale on each load.
#[async_trait]
pub trait ChunkIndex: Send + Sync {
    /// Short backend name reported in [`IndexStatus`].
    fn backend(&self) -> &'static str;

    /// Whether the index holds a loaded, non-empty generation.
    fn is_initialized(&self) -> bool;

    /// Number of chunks in the current generation.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn status(&self) -> IndexStatus {
        IndexStatus {
            initialized: self.is_initialized(),
            chunks: self.len(),
            backend: self.backend().to_string(),
        }
    }

    /// Replace the held generation with `chunks`. Returns the number of
    /// chunks now held.
    async fn replace(&mut self, chunks: Vec<DocumentChunk>) -> Result<usize>;

    /// Return up to `limit` chunks ranked by descending score.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>>;

    /// Reset to the uninitialized state. The next search through a
    /// knowledge base reloads.
    async fn clear(&mut self) -> Result<()>;
}

/// Lets a backend chosen at runtime (`Box<dyn ChunkIndex>`) stand in for a
/// concrete index.
#[async_trait]
impl<T: ChunkIndex + ?Sized> ChunkIndex for Box<T> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn is_initialized(&self) -> bool {
        (**self).is_initialized()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    async fn replace(&mut self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        (**self).replace(chunks).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        (**self).search(query, limit).await
    }

    async fn clear(&mut self) -> Result<()> {
        (**self).clear().await
    }
}

/// In-memory index ranked by [`score::score`].
#[derive(Debug, Default)]
pub struct LexicalIndex {
    chunks: Vec<DocumentChunk>,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    /// Score and rank synchronously. Zero-score chunks are excluded and
    /// ties keep insertion order.
    pub fn rank(&self, query: &str, limit: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let s = score::score(chunk, query);
                (s > 0).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    score: f64::from(s),
                })
            })
            .collect();

        // `sort_by` is stable, which preserves insertion order for equal scores.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }
}

#[async_trait]
impl ChunkIndex for LexicalIndex {
    fn backend(&self) -> &'static str {
        "lexical"
    }

    fn is_initialized(&self) -> bool {
        !self.chunks.is_empty()
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }

    async fn replace(&mut self, chunks: Vec<DocumentChunk>) -> Result<usize> {
        self.chunks = chunks;
        Ok(self.chunks.len())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self.rank(query, limit))
    }

    async fn clear(&mut self) -> Result<()> {
        self.chunks.clear();
        Ok(())
    }
}
