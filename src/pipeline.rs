//! Retrieval-augmented answering.
//!
//! [`RetrievalPipeline::answer`] runs one question end to end:
//!
//! 1. load the knowledge base if it is empty or a reload is forced,
//! 2. rank chunks for the question,
//! 3. assemble the top chunks into an attributed context,
//! 4. ask the [`Generator`] to answer from that context alone.
//!
//! Failures come back as [`Outcome::Failure`] with a [`FailureKind`]
//! rather than as errors, so callers such as the tool surface can report
//! them uniformly.

use anyhow::Result;
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::sync::Arc;

use repo_knowledge_core::index::ChunkIndex;
use repo_knowledge_core::models::{LoadReport, SearchHit};
use repo_knowledge_core::KbError;

use crate::config::Config;
use crate::connector::create_connector;
use crate::knowledge::{open_index, KnowledgeBase, LoadSettings};
use crate::llm::{create_generator, Generator};

/// Separator between context blocks handed to the generator.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const NO_DOCUMENTS_ANSWER: &str =
    "No documents found in the repository, so there is nothing to answer from.";

pub const NO_MATCHES_ANSWER: &str = "No relevant documentation was found for this question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    Collaborator,
    NotInitialized,
}

impl FailureKind {
    /// Kind of an error raised anywhere below the pipeline. Untyped errors
    /// come from collaborators.
    pub fn of(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<KbError>() {
            Some(KbError::InvalidInput(_)) => FailureKind::InvalidInput,
            Some(KbError::NotInitialized(_)) => FailureKind::NotInitialized,
            Some(KbError::Collaborator { .. }) | None => FailureKind::Collaborator,
        }
    }
}

/// Tagged result of a pipeline or tool call.
///
/// Serializes as `{"success": true, ...fields}` or
/// `{"success": false, "kind": "...", "error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure { kind: FailureKind, message: String },
}

impl<T> Outcome<T> {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(err) => Outcome::Failure {
                kind: FailureKind::of(&err),
                message: format!("{:#}", err),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure { kind, message } => Outcome::Failure { kind, message },
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::from_result(f(value)),
            Outcome::Failure { kind, message } => Outcome::Failure { kind, message },
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct SuccessBody<'a, T> {
            success: bool,
            #[serde(flatten)]
            data: &'a T,
        }

        #[derive(Serialize)]
        struct FailureBody<'a> {
            success: bool,
            kind: FailureKind,
            error: &'a str,
        }

        match self {
            Outcome::Success(data) => SuccessBody {
                success: true,
                data,
            }
            .serialize(serializer),
            Outcome::Failure { kind, message } => FailureBody {
                success: false,
                kind: *kind,
                error: message,
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Chunks to retrieve. The configured default when `None`.
    pub max_results: Option<usize>,
    pub force_reload: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Distinct source paths behind the context, sorted.
    pub sources: Vec<String>,
    pub context: String,
    pub chunks_used: usize,
    /// Present when this call (re)loaded the knowledge base.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadReport>,
}

pub struct RetrievalPipeline<I: ChunkIndex = Box<dyn ChunkIndex>> {
    kb: KnowledgeBase<I>,
    generator: Arc<dyn Generator>,
    default_max_results: usize,
}

impl RetrievalPipeline {
    /// Wire up connector, index, and generator from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let connector = create_connector(&config.repository)?;
        let index = open_index(config).await?;
        let generator = create_generator(&config.llm)?;
        let kb = KnowledgeBase::new(index, connector, LoadSettings::from_config(config));
        Ok(Self::new(kb, generator, config.retrieval.max_results))
    }
}

impl<I: ChunkIndex> RetrievalPipeline<I> {
    pub fn new(kb: KnowledgeBase<I>, generator: Arc<dyn Generator>, default_max_results: usize) -> Self {
        Self {
            kb,
            generator,
            default_max_results: default_max_results.max(1),
        }
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase<I> {
        &self.kb
    }

    pub fn knowledge_base_mut(&mut self) -> &mut KnowledgeBase<I> {
        &mut self.kb
    }

    pub fn default_max_results(&self) -> usize {
        self.default_max_results
    }

    /// Answer `query` from the repository documentation.
    pub async fn answer(&mut self, query: &str, options: AnswerOptions) -> Outcome<Answer> {
        if query.trim().is_empty() {
            return Outcome::failure(FailureKind::InvalidInput, "query must not be empty");
        }
        if options.max_results == Some(0) {
            return Outcome::failure(FailureKind::InvalidInput, "max_results must be >= 1");
        }
        Outcome::from_result(self.try_answer(query, options).await)
    }

    async fn try_answer(&mut self, query: &str, options: AnswerOptions) -> Result<Answer> {
        let max_results = options.max_results.unwrap_or(self.default_max_results);

        let mut load = None;
        if options.force_reload || !self.kb.status().initialized {
            let report = self.kb.init(options.force_reload).await?;
            // An empty listing keeps any earlier index; only answer from it if there is one.
            if report.documents == 0 && report.chunks == 0 {
                return Ok(Answer {
                    answer: NO_DOCUMENTS_ANSWER.to_string(),
                    sources: Vec::new(),
                    context: String::new(),
                    chunks_used: 0,
                    load: Some(report),
                });
            }
            if report.chunks == 0 {
                return Err(KbError::NotInitialized(format!(
                    "{} documents produced no chunks ({} failed to fetch)",
                    report.documents, report.failed_documents
                ))
                .into());
            }
            load = Some(report);
        }

        let hits = self.kb.search(query, max_results).await?;
        if hits.is_empty() {
            return Ok(Answer {
                answer: NO_MATCHES_ANSWER.to_string(),
                sources: Vec::new(),
                context: String::new(),
                chunks_used: 0,
                load,
            });
        }

        let context = build_context(&hits);
        let sources = collect_sources(&hits);
        let prompt = build_prompt(query, &context);

        let answer = match self.generator.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(model = self.generator.model_name(), error = %e, "answer generation failed");
                format!("Error generating answer: {:#}", e)
            }
        };

        Ok(Answer {
            answer,
            sources,
            context,
            chunks_used: hits.len(),
            load,
        })
    }
}

/// Format hits as attributed blocks joined by [`CONTEXT_SEPARATOR`].
pub fn build_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            format!(
                "[Source: {} | {} > {}]\n{}",
                hit.source, hit.title, hit.section, hit.content
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub fn collect_sources(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|hit| hit.source.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "Answer the question using only the documentation context below. \
         Cite the source path of every fact you use, for example [docs/setup.md]. \
         If the context does not contain the answer, say that it does not.\n\n\
         Context:\n{}\n\nQuestion: {}\n\nAnswer:",
        context, query
    )
}
