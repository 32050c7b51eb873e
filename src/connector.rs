//! Repository connectors.
//!
//! A [`RepositoryConnector`] lists the documentation files of a repository
//! and fetches their decoded text. Two implementations exist:
//!
//! | Kind | Type | Source |
//! |------|------|--------|
//! | `github` | [`GitHubConnector`](crate::connector_github::GitHubConnector) | GitHub REST contents API |
//! | `local` | [`LocalConnector`](crate::connector_fs::LocalConnector) | A checkout on disk |
//!
//! Both apply the same include/exclude globs through [`FileFilter`], so a
//! listing only ever contains files worth chunking.

use anyhow::{bail, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::connector_fs::LocalConnector;
use crate::connector_github::GitHubConnector;

/// A file entry returned by [`RepositoryConnector::list_files`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoFile {
    /// File name without directories, used as the fallback chunk title.
    pub name: String,
    /// Path relative to the repository root, used as the chunk source.
    pub path: String,
    /// Blob sha when the backend reports one.
    pub sha: Option<String>,
}

#[async_trait]
pub trait RepositoryConnector: Send + Sync {
    /// Human-readable origin, e.g. `github:owner/name@main`.
    fn describe(&self) -> String;

    /// List matching files under `path`, descending into subdirectories
    /// when `recursive` is set. Results are sorted by path.
    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<RepoFile>>;

    /// Fetch the decoded text of one file.
    async fn get_content(&self, path: &str) -> Result<String>;
}

/// Include/exclude glob matcher over repository-relative paths.
#[derive(Debug, Clone)]
pub struct FileFilter {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let mut excludes = vec![
            "**/.git/**".to_string(),
            "**/node_modules/**".to_string(),
            "**/target/**".to_string(),
        ];
        excludes.extend(exclude.iter().cloned());
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(&excludes)?,
        })
    }

    /// Markdown files only, no extra excludes.
    pub fn markdown() -> Result<Self> {
        Self::new(&["**/*.md".to_string()], &[])
    }

    pub fn is_match(&self, path: &str) -> bool {
        !self.exclude.is_match(path) && self.include.is_match(path)
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

/// Last path component of a `/`-separated path.
pub(crate) fn file_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Build the connector selected by `repository.kind`.
pub fn create_connector(config: &RepositoryConfig) -> Result<Arc<dyn RepositoryConnector>> {
    match config.kind.as_str() {
        "github" => Ok(Arc::new(GitHubConnector::from_config(config)?)),
        "local" => Ok(Arc::new(LocalConnector::from_config(config)?)),
        other => bail!("Unknown repository kind: {}", other),
    }
}
