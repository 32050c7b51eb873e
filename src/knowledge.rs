//! Knowledge base lifecycle.
//!
//! [`KnowledgeBase`] owns a [`ChunkIndex`] and a [`RepositoryConnector`]
//! and drives the empty → loaded → reloaded lifecycle:
//!
//! ```text
//!   uninitialized ──init / load_documents──▶ initialized
//!        ▲                                     │   ▲
//!        └──────────────── clear ──────────────┘   └─ init(force) / load_documents
//! ```
//!
//! Searching an uninitialized knowledge base loads it first.

use anyhow::{bail, Result};
use futures::future::join_all;
use serde::Deserialize;
use std::sync::Arc;

use repo_knowledge_core::chunk::{chunk_markdown, ChunkerOptions};
use repo_knowledge_core::excerpt::{extract_excerpt, extract_summary};
use repo_knowledge_core::index::{ChunkIndex, LexicalIndex};
use repo_knowledge_core::models::{DocumentChunk, IndexStatus, LoadReport, SearchHit};
use repo_knowledge_core::KbError;

use crate::config::Config;
use crate::connector::{file_name, RepoFile, RepositoryConnector};
use crate::embedding::create_embedder;
use crate::vector_index::{VectorIndex, VectorIndexSettings};
use crate::vector_store::SqliteVectorStore;

/// Where and how documents are pulled from the repository.
#[derive(Debug, Clone)]
pub struct LoadSettings {
    /// Directory to walk, relative to the repository root.
    pub path: String,
    pub recursive: bool,
    /// Files fetched concurrently per batch.
    pub fetch_concurrency: usize,
    pub chunker: ChunkerOptions,
}

impl Default for LoadSettings {
    fn default() -> Self {
        Self {
            path: String::new(),
            recursive: true,
            fetch_concurrency: 8,
            chunker: ChunkerOptions::default(),
        }
    }
}

impl LoadSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: config.repository.path.clone(),
            recursive: true,
            fetch_concurrency: config.repository.fetch_concurrency,
            chunker: config.chunking.options(),
        }
    }
}

/// A caller-supplied markdown document.
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub path: String,
    #[serde(default)]
    pub name: Option<String>,
    pub content: String,
}

impl Document {
    fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| file_name(&self.path))
    }
}

/// Open the index selected by `index.backend`.
pub async fn open_index(config: &Config) -> Result<Box<dyn ChunkIndex>> {
    match config.index.backend.as_str() {
        "lexical" => Ok(Box::new(LexicalIndex::new())),
        "vector" => {
            let embedder = create_embedder(&config.embedding)?;
            let store = Arc::new(SqliteVectorStore::open(&config.index.path).await?);
            let settings = VectorIndexSettings::from_config(&config.index, &config.embedding);
            Ok(Box::new(VectorIndex::open(embedder, store, settings).await?))
        }
        other => bail!("Unknown index backend: {}", other),
    }
}

pub struct KnowledgeBase<I: ChunkIndex> {
    index: I,
    connector: Arc<dyn RepositoryConnector>,
    settings: LoadSettings,
}

impl<I: ChunkIndex> KnowledgeBase<I> {
    pub fn new(index: I, connector: Arc<dyn RepositoryConnector>, settings: LoadSettings) -> Self {
        Self {
            index,
            connector,
            settings,
        }
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn status(&self) -> IndexStatus {
        self.index.status()
    }

    /// Build the knowledge base from the repository.
    ///
    /// Returns a cached report without touching the repository when the
    /// index is already initialized and `force_reload` is false.
    ///
    /// The index is only replaced when at least one document was fetched. An
    /// empty listing leaves it as it was and reports zero documents; a load
    /// where every fetch failed leaves it as it was and fails with
    /// [`KbError::Collaborator`].
    pub async fn init(&mut self, force_reload: bool) -> Result<LoadReport> {
        if self.index.is_initialized() && !force_reload {
            tracing::debug!(chunks = self.index.len(), "knowledge base already initialized");
            return Ok(LoadReport::cached(self.index.len()));
        }

        let files = self
            .connector
            .list_files(&self.settings.path, self.settings.recursive)
            .await
            .map_err(|e| KbError::collaborator("repository", format!("{:#}", e)))?;
        tracing::info!(
            origin = %self.connector.describe(),
            files = files.len(),
            "listed repository documents"
        );
        if files.is_empty() {
            tracing::warn!("no markdown documents found in repository; index left unchanged");
            let chunks = if self.index.is_initialized() {
                self.index.len()
            } else {
                0
            };
            return Ok(LoadReport {
                documents: 0,
                chunks,
                cached: false,
                failed_documents: 0,
            });
        }

        let (chunks, failed) = self.fetch_and_chunk(&files).await;
        if failed == files.len() {
            return Err(KbError::collaborator(
                "repository",
                format!("all {} documents failed to fetch; previous index kept", failed),
            )
            .into());
        }
        let stored = self.index.replace(chunks).await?;

        Ok(LoadReport {
            documents: files.len(),
            chunks: stored,
            cached: false,
            failed_documents: failed,
        })
    }

    /// Replace the knowledge base with caller-supplied documents.
    pub async fn load_documents(&mut self, documents: Vec<Document>) -> Result<LoadReport> {
        let mut chunks = Vec::new();
        for doc in &documents {
            chunks.extend(chunk_markdown(
                &doc.content,
                &doc.path,
                &doc.display_name(),
                &self.settings.chunker,
            ));
        }
        let stored = self.index.replace(chunks).await?;
        tracing::info!(documents = documents.len(), chunks = stored, "loaded documents");

        Ok(LoadReport {
            documents: documents.len(),
            chunks: stored,
            cached: false,
            failed_documents: 0,
        })
    }

    /// Ranked hits for `query`, loading the knowledge base first if needed.
    ///
    /// Fails with [`KbError::NotInitialized`] when loading yields no chunks.
    pub async fn search(&mut self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        if !self.index.is_initialized() {
            let report = self.init(false).await?;
            if report.chunks == 0 {
                return Err(KbError::NotInitialized(format!(
                    "no chunks were produced from {} documents",
                    report.documents
                ))
                .into());
            }
        }

        let scored = self.index.search(query, max_results).await?;
        Ok(scored
            .into_iter()
            .map(|s| SearchHit {
                excerpt: extract_excerpt(&s.chunk.content, query),
                summary: extract_summary(&s.chunk.content),
                score: s.score,
                id: s.chunk.id,
                source: s.chunk.source,
                title: s.chunk.title,
                section: s.chunk.section,
                content: s.chunk.content,
            })
            .collect())
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.index.clear().await?;
        tracing::info!(backend = self.index.backend(), "knowledge base cleared");
        Ok(())
    }

    /// Fetch files in batches of `fetch_concurrency` and chunk them. A file
    /// that cannot be fetched contributes no chunks.
    async fn fetch_and_chunk(&self, files: &[RepoFile]) -> (Vec<DocumentChunk>, usize) {
        let mut chunks = Vec::new();
        let mut failed = 0;
        let connector = self.connector.as_ref();

        for batch in files.chunks(self.settings.fetch_concurrency.max(1)) {
            let fetched = join_all(batch.iter().map(|file| async move {
                (file, connector.get_content(&file.path).await)
            }))
            .await;

            for (file, content) in fetched {
                match content {
                    Ok(content) => chunks.extend(chunk_markdown(
                        &content,
                        &file.path,
                        &file.name,
                        &self.settings.chunker,
                    )),
                    Err(e) => {
                        tracing::warn!(path = %file.path, error = %e, "failed to fetch document, skipping");
                        failed += 1;
                    }
                }
            }
        }

        (chunks, failed)
    }
}
