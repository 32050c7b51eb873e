//! # Repo Knowledge Core
//!
//! Runtime-free logic for Repo Knowledge: data models, the heading-aware
//! markdown chunker, the lexical relevance scorer, excerpt extraction, and
//! the index, embedding, and vector store abstractions.
//!
//! This crate contains no tokio, sqlx, network, or filesystem I/O. The
//! `repo-knowledge` app crate supplies the concrete collaborators
//! (GitHub connector, embedding providers, SQLite vector store, LLM).

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod excerpt;
pub mod index;
pub mod models;
pub mod score;
pub mod store;

pub use error::KbError;
pub use models::{DocumentChunk, IndexStatus, LoadReport, ScoredChunk, SearchHit};
