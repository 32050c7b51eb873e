//! TOML configuration.
//!
//! Every section except `[repository]` is optional and falls back to the
//! defaults below. [`load_config`] parses and validates in one step, so a
//! [`Config`] in hand is always internally consistent.
//!
//! ```toml
//! [repository]
//! kind = "github"
//! repo = "owner/name"
//!
//! [index]
//! backend = "lexical"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use repo_knowledge_core::chunk::{
    ChunkerOptions, DEFAULT_MAX_LINES, DEFAULT_MIN_LENGTH, DEFAULT_SPLIT_THRESHOLD,
};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoryConfig {
    /// `github` or `local`.
    #[serde(default = "default_repository_kind")]
    pub kind: String,
    /// `owner/name`, required for the github kind.
    #[serde(default)]
    pub repo: Option<String>,
    /// Branch, tag, or commit. The repository default branch when unset.
    #[serde(default)]
    pub branch: Option<String>,
    /// Directory to walk, relative to the repository root.
    #[serde(default)]
    pub path: String,
    /// Environment variable holding an optional GitHub token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    /// Checkout directory, required for the local kind.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Files fetched concurrently within one batch.
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

fn default_repository_kind() -> String {
    "github".to_string()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}
fn default_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string()]
}
fn default_fetch_concurrency() -> usize {
    8
}

impl RepositoryConfig {
    /// Split `repo` into `(owner, name)`.
    pub fn owner_and_name(&self) -> Result<(&str, &str)> {
        let repo = self
            .repo
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("repository.repo is required when kind = 'github'"))?;
        match repo.split_once('/') {
            Some((owner, name))
                if !owner.trim().is_empty() && !name.trim().is_empty() && !name.contains('/') =>
            {
                Ok((owner.trim(), name.trim()))
            }
            _ => bail!(
                "repository.repo must look like 'owner/name', got '{}'",
                repo
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `lexical` or `vector`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Name of the collection inside the vector store.
    #[serde(default = "default_index_name")]
    pub name: String,
    /// SQLite file backing the vector store.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            name: default_index_name(),
            path: default_index_path(),
        }
    }
}

fn default_backend() -> String {
    "lexical".to_string()
}
fn default_index_name() -> String {
    "repo-docs".to_string()
}
fn default_index_path() -> PathBuf {
    PathBuf::from("./data/rkb.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_split_threshold")]
    pub split_threshold: usize,
    #[serde(default = "default_min_length")]
    pub min_length: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_lines: DEFAULT_MAX_LINES,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            min_length: DEFAULT_MIN_LENGTH,
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkerOptions {
        ChunkerOptions {
            max_lines: self.max_lines,
            split_threshold: self.split_threshold,
            min_length: self.min_length,
        }
    }
}

fn default_max_lines() -> usize {
    DEFAULT_MAX_LINES
}
fn default_split_threshold() -> usize {
    DEFAULT_SPLIT_THRESHOLD
}
fn default_min_length() -> usize {
    DEFAULT_MIN_LENGTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Records per vector store upsert. Never larger than `batch_size`.
    #[serde(default = "default_store_batch_size")]
    pub store_batch_size: usize,
    /// Pause between consecutive embedding batches.
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Endpoint override. Defaults per provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            store_batch_size: default_store_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Upsert batch size, clamped to the embedding batch size.
    pub fn effective_store_batch_size(&self) -> usize {
        self.store_batch_size.min(self.batch_size).max(1)
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_store_batch_size() -> usize {
    32
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
        }
    }
}

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            url: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_llm_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate a configuration document.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Repository
    match config.repository.kind.as_str() {
        "github" => {
            config.repository.owner_and_name()?;
        }
        "local" => {
            if config.repository.root.is_none() {
                bail!("repository.root is required when kind = 'local'");
            }
        }
        other => bail!(
            "Unknown repository kind: '{}'. Must be github or local.",
            other
        ),
    }
    if config.repository.fetch_concurrency == 0 {
        bail!("repository.fetch_concurrency must be > 0");
    }

    // Chunking
    if config.chunking.max_lines == 0 {
        bail!("chunking.max_lines must be > 0");
    }

    // Retrieval
    if config.retrieval.max_results < 1 {
        bail!("retrieval.max_results must be >= 1");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Index
    match config.index.backend.as_str() {
        "lexical" => {}
        "vector" => {
            if !config.embedding.is_enabled() {
                bail!("index.backend = 'vector' requires an embedding provider");
            }
        }
        other => bail!(
            "Unknown index backend: '{}'. Must be lexical or vector.",
            other
        ),
    }
    if config.index.name.trim().is_empty() {
        bail!("index.name must not be empty");
    }

    // LLM
    match config.llm.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.llm.is_enabled() && config.llm.model.is_none() {
        bail!(
            "llm.model must be specified when provider is '{}'",
            config.llm.provider
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[repository]
repo = "acme/widgets"
"#;

    fn err_of(toml: &str) -> String {
        format!("{:#}", parse_config(toml).unwrap_err())
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.repository.kind, "github");
        assert_eq!(config.repository.include_globs, vec!["**/*.md"]);
        assert_eq!(config.repository.fetch_concurrency, 8);
        assert_eq!(config.index.backend, "lexical");
        assert_eq!(config.chunking.options(), ChunkerOptions::default());
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.embedding.batch_delay_ms, 1000);
        assert_eq!(config.retrieval.max_results, 5);
        assert!(!config.llm.is_enabled());
    }

    #[test]
    fn test_owner_and_name() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(
            config.repository.owner_and_name().unwrap(),
            ("acme", "widgets")
        );
    }

    #[test]
    fn test_malformed_repo_rejected() {
        for bad in ["widgets", "/widgets", "acme/", "a/b/c"] {
            let toml = format!("[repository]\nrepo = \"{}\"\n", bad);
            assert!(err_of(&toml).contains("owner/name"), "accepted {}", bad);
        }
    }

    #[test]
    fn test_missing_repo_rejected() {
        assert!(err_of("[repository]\nkind = \"github\"\n").contains("repository.repo"));
    }

    #[test]
    fn test_local_kind_requires_root() {
        assert!(err_of("[repository]\nkind = \"local\"\n").contains("repository.root"));
        let ok = parse_config("[repository]\nkind = \"local\"\nroot = \"./docs\"\n").unwrap();
        assert_eq!(ok.repository.root, Some(PathBuf::from("./docs")));
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = format!("{}\n[index]\nbackend = \"hnsw\"\n", MINIMAL);
        assert!(err_of(&toml).contains("Unknown index backend"));
    }

    #[test]
    fn test_vector_backend_requires_embeddings() {
        let toml = format!("{}\n[index]\nbackend = \"vector\"\n", MINIMAL);
        assert!(err_of(&toml).contains("requires an embedding provider"));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        let toml = format!("{}\n[embedding]\nprovider = \"cohere\"\n", MINIMAL);
        assert!(err_of(&toml).contains("Unknown embedding provider"));
        let toml = format!("{}\n[llm]\nprovider = \"bard\"\nmodel = \"x\"\n", MINIMAL);
        assert!(err_of(&toml).contains("Unknown llm provider"));
    }

    #[test]
    fn test_enabled_embedding_needs_model_and_dims() {
        let toml = format!("{}\n[embedding]\nprovider = \"openai\"\n", MINIMAL);
        assert!(err_of(&toml).contains("embedding.dims"));
        let toml = format!("{}\n[embedding]\nprovider = \"openai\"\ndims = 8\n", MINIMAL);
        assert!(err_of(&toml).contains("embedding.model"));
    }

    #[test]
    fn test_zero_limits_rejected() {
        let toml = format!("{}\n[chunking]\nmax_lines = 0\n", MINIMAL);
        assert!(err_of(&toml).contains("chunking.max_lines"));
        let toml = format!("{}\n[retrieval]\nmax_results = 0\n", MINIMAL);
        assert!(err_of(&toml).contains("retrieval.max_results"));
    }

    #[test]
    fn test_store_batch_clamped_to_embedding_batch() {
        let toml = format!(
            "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\nbatch_size = 10\nstore_batch_size = 50\n",
            MINIMAL
        );
        let config = parse_config(&toml).unwrap();
        assert_eq!(config.embedding.effective_store_batch_size(), 10);
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/rkb.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_example_config_parses() {
        let config = parse_config(include_str!("../config/rkb.example.toml")).unwrap();
        assert_eq!(
            config.repository.owner_and_name().unwrap(),
            ("rust-lang", "book")
        );
        assert_eq!(config.index.backend, "lexical");
        assert!(!config.llm.is_enabled());
    }
}
