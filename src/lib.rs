//! # Repo Knowledge
//!
//! Retrieval-augmented question answering over the markdown documentation
//! of a single repository.
//!
//! Documents are pulled from GitHub or a local checkout, split into
//! heading-aware chunks, and held in either an in-memory lexical index or a
//! SQLite-backed vector index. Questions are answered by retrieving the top
//! chunks and handing them to an LLM as attributed context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │  Connectors  │──▶│ KnowledgeBase│──▶│  ChunkIndex    │
//! │ GitHub/Local │   │ fetch+chunk  │   │ lexical/vector │
//! └──────────────┘   └──────┬───────┘   └────────────────┘
//!                           │
//!                    ┌──────▼───────┐   ┌──────────┐
//!                    │  Retrieval   │──▶│   LLM    │
//!                    │  Pipeline    │   │ generator│
//!                    └──────┬───────┘   └──────────┘
//!                           │
//!                  ┌────────┴────────┐
//!                  ▼                 ▼
//!             ┌─────────┐      ┌──────────┐
//!             │   CLI   │      │  Tools   │
//!             │  (rkb)  │      │  (JSON)  │
//!             └─────────┘      └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`connector`] | Repository connector trait and file filtering |
//! | [`connector_github`] | GitHub contents API connector |
//! | [`connector_fs`] | Local checkout connector |
//! | [`embedding`] | Embedding providers |
//! | [`llm`] | Answer generators |
//! | [`db`] | SQLite connection |
//! | [`migrate`] | Vector store schema |
//! | [`vector_store`] | SQLite vector store |
//! | [`vector_index`] | Embedding-backed chunk index |
//! | [`knowledge`] | Knowledge base lifecycle |
//! | [`pipeline`] | Retrieval pipeline and tagged outcomes |
//! | [`tools`] | JSON tool surface |
//! | [`commands`] | CLI command implementations |

pub mod commands;
pub mod config;
pub mod connector;
pub mod connector_fs;
pub mod connector_github;
pub mod db;
pub mod embedding;
pub mod knowledge;
pub mod llm;
pub mod migrate;
pub mod pipeline;
pub mod tools;
pub mod vector_index;
pub mod vector_store;
