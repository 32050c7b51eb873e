//! Data types flowing through chunking, indexing, and retrieval.

use serde::{Deserialize, Serialize};

/// A bounded, attributable unit of markdown text.
///
/// Produced by [`chunk_markdown`](crate::chunk::chunk_markdown). The
/// `content` is always trimmed and longer than the chunker's minimum
/// length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// `"<source>:<ordinal>"`, unique within a source file.
    pub id: String,
    /// Path of the originating file.
    pub source: String,
    /// Nearest enclosing level-1 heading, or the file's display name.
    pub title: String,
    /// Nearest enclosing level-1 or level-2 heading.
    pub section: String,
    /// Trimmed chunk body.
    pub content: String,
    /// SHA-256 of `content`, used to detect unchanged chunks on reload.
    pub hash: String,
}

/// Ephemeral scored view over a chunk. Never stored.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// A ranked search result enriched for display and context assembly.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub source: String,
    pub title: String,
    pub section: String,
    pub content: String,
    pub score: f64,
    /// Query-focused sentences from the chunk.
    pub excerpt: String,
    /// First paragraph of the chunk, truncated.
    pub summary: String,
}

/// Outcome of building or rebuilding the knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Number of source documents processed.
    pub documents: usize,
    /// Number of chunks now held by the index.
    pub chunks: usize,
    /// True when existing data was reused without reprocessing.
    pub cached: bool,
    /// Documents whose fetch or chunking failed and contributed nothing.
    pub failed_documents: usize,
}

impl LoadReport {
    pub fn cached(chunks: usize) -> Self {
        Self {
            documents: 0,
            chunks,
            cached: true,
            failed_documents: 0,
        }
    }
}

/// Snapshot of an index's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub initialized: bool,
    pub chunks: usize,
    /// `"lexical"` or `"vector"`.
    pub backend: String,
}
