//! Error conditions callers are expected to match on.
//!
//! Most fallible code in Repo Knowledge returns [`anyhow::Result`]. The
//! variants here are the ones the retrieval pipeline and tool surface
//! translate into structured failures, so they are raised as typed errors
//! and recovered with `downcast_ref`.

/// Knowledge base errors with a stable kind.
#[derive(Debug, thiserror::Error)]
pub enum KbError {
    /// A required parameter was missing or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The knowledge base is empty and loading it produced no chunks.
    #[error("cannot initialize knowledge base: {0}")]
    NotInitialized(String),

    /// An external service (repository, embedder, store, LLM) failed.
    #[error("{service} error: {message}")]
    Collaborator {
        service: &'static str,
        message: String,
    },
}

impl KbError {
    pub fn collaborator(service: &'static str, err: impl std::fmt::Display) -> Self {
        KbError::Collaborator {
            service,
            message: err.to_string(),
        }
    }
}
