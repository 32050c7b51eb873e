//! Local checkout connector.
//!
//! Walks a directory on disk with `walkdir` and applies the same glob
//! filter as the GitHub connector. Paths are reported relative to the
//! configured root with `/` separators, so chunk sources look the same
//! whichever connector produced them.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::config::RepositoryConfig;
use crate::connector::{FileFilter, RepoFile, RepositoryConnector};

pub struct LocalConnector {
    root: PathBuf,
    follow_symlinks: bool,
    filter: FileFilter,
}

impl LocalConnector {
    pub fn new(root: PathBuf, filter: FileFilter) -> Self {
        Self {
            root,
            follow_symlinks: false,
            filter,
        }
    }

    pub fn from_config(config: &RepositoryConfig) -> Result<Self> {
        let root = config
            .root
            .clone()
            .ok_or_else(|| anyhow::anyhow!("repository.root is required when kind = 'local'"))?;
        let mut connector = Self::new(
            root,
            FileFilter::new(&config.include_globs, &config.exclude_globs)?,
        );
        connector.follow_symlinks = config.follow_symlinks;
        Ok(connector)
    }

    /// Resolve a repository-relative path, refusing anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            bail!("path escapes repository root: {}", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl RepositoryConnector for LocalConnector {
    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<RepoFile>> {
        if !self.root.exists() {
            bail!("Repository root does not exist: {}", self.root.display());
        }
        let start = self.resolve(path)?;
        if !start.is_dir() {
            bail!("Not a directory: {}", start.display());
        }

        let mut walker = WalkDir::new(&start).follow_links(self.follow_symlinks);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let rel_str = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if !self.filter.is_match(&rel_str) {
                continue;
            }

            files.push(RepoFile {
                name: entry.file_name().to_string_lossy().to_string(),
                path: rel_str,
                sha: None,
            });
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    async fn get_content(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .with_context(|| format!("Failed to read {}", full.display()))
    }
}
