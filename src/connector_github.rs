//! GitHub connector backed by the REST contents API.
//!
//! Directory listings come from `GET /repos/{owner}/{repo}/contents/{path}`
//! and are walked breadth-first with an explicit worklist, one request per
//! directory. File bodies come from the same endpoint, base64-decoded.
//! A token is optional; without one the unauthenticated rate limit applies.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::collections::VecDeque;
use std::future::Future;
use reqwest::Url;
use std::time::Duration;

use crate::config::RepositoryConfig;
use crate::connector::{FileFilter, RepoFile, RepositoryConnector};

const USER_AGENT: &str = concat!("repo-knowledge/", env!("CARGO_PKG_VERSION"));

/// One entry of a contents API directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub sha: Option<String>,
}

pub struct GitHubConnector {
    client: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: Option<String>,
    filter: FileFilter,
}

impl GitHubConnector {
    pub fn from_config(config: &RepositoryConfig) -> Result<Self> {
        let (owner, repo) = config.owner_and_name()?;
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        if token.is_none() {
            tracing::debug!(
                env = %config.token_env,
                "no GitHub token set, using unauthenticated requests"
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_url: Url::parse(config.api_url.trim_end_matches('/'))
                .with_context(|| format!("Invalid GitHub API URL '{}'", config.api_url))?,
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: config.branch.clone(),
            token,
            filter: FileFilter::new(&config.include_globs, &config.exclude_globs)?,
        })
    }

    /// Contents API URL for `path`. Each path segment is percent-encoded.
    fn contents_url(&self, path: &str) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("GitHub API URL '{}' cannot take a path", self.api_url))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value> {
        let mut request = self
            .client
            .get(self.contents_url(path)?)
            .header("Accept", "application/vnd.github+json");
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("GitHub request failed for '{}'", path))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("GitHub API error {} for '{}': {}", status, path, body);
        }
        Ok(response.json().await?)
    }

    async fn list_dir(&self, dir: String) -> Result<Vec<ContentEntry>> {
        let json = self.get_json(&dir).await?;
        if !json.is_array() {
            bail!("'{}' is not a directory", dir);
        }
        Ok(serde_json::from_value(json)?)
    }
}

#[async_trait]
impl RepositoryConnector for GitHubConnector {
    fn describe(&self) -> String {
        match &self.branch {
            Some(branch) => format!("github:{}/{}@{}", self.owner, self.repo, branch),
            None => format!("github:{}/{}", self.owner, self.repo),
        }
    }

    async fn list_files(&self, path: &str, recursive: bool) -> Result<Vec<RepoFile>> {
        walk_tree(path, recursive, &self.filter, |dir| self.list_dir(dir)).await
    }

    async fn get_content(&self, path: &str) -> Result<String> {
        let json = self.get_json(path).await?;
        decode_content(&json).with_context(|| format!("Failed to decode '{}'", path))
    }
}

/// Breadth-first walk from `root`, calling `list_dir` once per directory.
///
/// Files are kept when `filter` matches their path. Subdirectories are
/// queued only when `recursive` is set. The result is sorted by path.
pub async fn walk_tree<F, Fut>(
    root: &str,
    recursive: bool,
    filter: &FileFilter,
    mut list_dir: F,
) -> Result<Vec<RepoFile>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<ContentEntry>>>,
{
    let mut pending = VecDeque::from([root.trim_matches('/').to_string()]);
    let mut files = Vec::new();

    while let Some(dir) = pending.pop_front() {
        for entry in list_dir(dir).await? {
            match entry.kind.as_str() {
                "file" if filter.is_match(&entry.path) => files.push(RepoFile {
                    name: entry.name,
                    path: entry.path,
                    sha: entry.sha,
                }),
                "dir" if recursive => pending.push_back(entry.path),
                _ => {}
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Decode the `content` field of a contents API file response.
pub fn decode_content(json: &serde_json::Value) -> Result<String> {
    let encoding = json.get("encoding").and_then(|e| e.as_str()).unwrap_or("");
    let content = json
        .get("content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow::anyhow!("response has no content field"))?;

    if encoding != "base64" {
        bail!("unsupported content encoding '{}'", encoding);
    }

    // GitHub wraps base64 bodies at 60 columns.
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}
