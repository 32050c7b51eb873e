//! Vector store abstraction.
//!
//! A [`VectorStore`] persists chunk vectors with their metadata under a
//! named index and answers nearest-neighbour queries. Implementations must
//! be `Send + Sync` to work with async runtimes.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`upsert`](VectorStore::upsert) | Insert or replace records keyed by chunk id |
//! | [`query`](VectorStore::query) | Top-`limit` records by cosine similarity |
//! | [`count`](VectorStore::count) | Records held under an index |
//! | [`stored_vectors`](VectorStore::stored_vectors) | Existing vectors keyed by chunk id, with content hashes |
//! | [`delete_index`](VectorStore::delete_index) | Drop every record of an index |
//! | [`set_cleared`](VectorStore::set_cleared) / [`is_cleared`](VectorStore::is_cleared) | Logical-clear marker that outlives the process |

pub mod memory;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentChunk;

/// A chunk paired with its embedding, ready to upsert.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub chunk: DocumentChunk,
    pub vector: Vec<f32>,
}

/// A record returned from [`VectorStore::query`].
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub chunk: DocumentChunk,
    /// Cosine similarity to the query vector.
    pub score: f64,
}

/// A vector already held by the store, with the hash of the text it embeds.
#[derive(Debug, Clone)]
pub struct StoredVector {
    pub hash: String,
    pub vector: Vec<f32>,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace records, keyed by `(index, chunk.id)`.
    async fn upsert(&self, index: &str, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `limit` records ranked by similarity to `vector`.
    ///
    /// An empty or unknown index yields an empty result, not an error.
    async fn query(&self, index: &str, vector: &[f32], limit: usize) -> Result<Vec<VectorMatch>>;

    /// Number of records held under `index`.
    async fn count(&self, index: &str) -> Result<usize>;

    /// Every stored vector of `index`, keyed by chunk id.
    async fn stored_vectors(&self, index: &str) -> Result<HashMap<String, StoredVector>>;

    /// Remove every record of `index`.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Mark `index` as logically cleared, or live again. Records are kept
    /// either way.
    async fn set_cleared(&self, index: &str, cleared: bool) -> Result<()>;

    /// Whether `index` was cleared and not reloaded since. Unknown indexes
    /// are not cleared.
    async fn is_cleared(&self, index: &str) -> Result<bool>;
}
