use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use repo_knowledge::vector_store::SqliteVectorStore;
use repo_knowledge_core::models::DocumentChunk;
use repo_knowledge_core::store::{VectorRecord, VectorStore};

fn rkb_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rkb");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let repo = root.join("repo");
    fs::create_dir_all(repo.join("docs")).unwrap();
    fs::write(
        repo.join("README.md"),
        "# Widget Service\n\nThe widget service stores widgets and serves them over HTTP.\n\nRun it with cargo and point it at a database.",
    )
    .unwrap();
    fs::write(
        repo.join("docs/deploy.md"),
        "# Deployment\n\nDeploy the service with Docker.\n\nBuild the image, push it to the registry, then roll out with kubectl.",
    )
    .unwrap();
    fs::write(
        repo.join("notes.txt"),
        "Plain text notes about Docker that should never be indexed.",
    )
    .unwrap();

    let config_content = format!(
        r#"[repository]
kind = "local"
root = "{}/repo"

[index]
backend = "lexical"

[retrieval]
max_results = 3
"#,
        root.display()
    );

    let config_path = config_dir.join("rkb.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_rkb(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = rkb_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("-q")
        .args(args)
        .env_remove("RKB_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run rkb binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_loads_markdown_only() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.starts_with("init\n"));
    assert!(stdout.contains("documents: 2"));
    assert!(stdout.contains("chunks: 2"));
    assert!(stdout.contains("cached: false"));
    assert!(stdout.trim_end().ends_with("ok"));
}

#[test]
fn test_status_starts_uninitialized() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("backend: lexical"));
    assert!(stdout.contains("initialized: false"));

    let (stdout, _, success) = run_rkb(&config_path, &["status", "--json"]);
    assert!(success);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["initialized"], false);
    assert_eq!(status["chunks"], 0);
}

#[test]
fn test_search_ranks_matching_document() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["search", "docker"]);
    assert!(success, "search failed: {}", stderr);
    assert!(stdout.starts_with("1. ["));
    assert!(stdout.contains("docs/deploy.md / Deployment"));
    assert!(!stdout.contains("README.md"));
    assert!(!stdout.contains("notes.txt"));
}

#[test]
fn test_search_json() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["search", "widget", "--json"]);
    assert!(success, "search failed: {}", stderr);
    let hits: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["source"], "README.md");
    assert_eq!(hits[0]["title"], "Widget Service");
    assert!(hits[0]["score"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rkb(&config_path, &["search", "nonexistent_xyz_term"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_ask_with_llm_disabled_keeps_sources() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["ask", "How do I deploy with Docker?"]);
    assert!(success, "ask failed: {}", stderr);
    assert!(stdout.contains("Error generating answer"));
    assert!(stdout.contains("  - docs/deploy.md"));
}

#[test]
fn test_ask_json_reports_context() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["ask", "docker", "--json"]);
    assert!(success, "ask failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["chunks_used"], 1);
    assert_eq!(outcome["sources"][0], "docs/deploy.md");
    assert!(outcome["context"]
        .as_str()
        .unwrap()
        .starts_with("[Source: docs/deploy.md | Deployment > Deployment]"));
}

#[test]
fn test_ask_empty_query_fails() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rkb(&config_path, &["ask", "   ", "--json"]);
    assert!(!success);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["success"], false);
    assert_eq!(outcome["kind"], "invalid_input");
}

#[test]
fn test_tool_list() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["tool", "list"]);
    assert!(success, "tool list failed: {}", stderr);
    for name in [
        "search_docs",
        "init_knowledge_base",
        "knowledge_status",
        "load_documents",
        "ask_docs",
    ] {
        assert!(stdout.contains(name), "missing {} in:\n{}", name, stdout);
    }
}

#[test]
fn test_tool_call_search_docs() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(
        &config_path,
        &["tool", "call", "search_docs", r#"{"query": "registry", "max_results": 1}"#],
    );
    assert!(success, "tool call failed: {}", stderr);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["count"], 1);
    assert_eq!(outcome["results"][0]["source"], "docs/deploy.md");
}

#[test]
fn test_tool_call_unknown_tool() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_rkb(&config_path, &["tool", "call", "drop_tables", "{}"]);
    assert!(!success);
    let outcome: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(outcome["kind"], "invalid_input");
    assert!(outcome["error"].as_str().unwrap().contains("unknown tool"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("rkb.toml");
    fs::write(&config_path, "[repository]\nkind = \"local\"\n").unwrap();

    let (_, stderr, success) = run_rkb(&config_path, &["status"]);
    assert!(!success);
    assert!(stderr.contains("repository.root is required"));
}

#[test]
fn test_missing_config_file() {
    let (_, stderr, success) = run_rkb(Path::new("/nonexistent/rkb.toml"), &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_completions_without_config() {
    let (stdout, _, success) = run_rkb(Path::new("/nonexistent/rkb.toml"), &["completions", "bash"]);
    assert!(success);
    assert!(stdout.contains("rkb"));
}

#[test]
fn test_clear_lexical_reports_uninitialized() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_rkb(&config_path, &["clear"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.starts_with("clear\n"));
    assert!(stdout.contains("backend: lexical"));
    assert!(stdout.contains("initialized: false"));
    assert!(!stdout.contains("purged vectors"));
    assert!(stdout.trim_end().ends_with("ok"));
}

fn stored_chunk(id: &str, content: &str) -> DocumentChunk {
    DocumentChunk {
        id: id.to_string(),
        source: "README.md".to_string(),
        title: "Widget Service".to_string(),
        section: "Widget Service".to_string(),
        content: content.to_string(),
        hash: format!("hash-{}", id),
    }
}

#[tokio::test]
async fn test_clear_persists_for_vector_index() {
    let (tmp, config_path) = setup_test_env();
    let db_path = tmp.path().join("data/vectors.db");
    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace(
            "backend = \"lexical\"",
            &format!("backend = \"vector\"\npath = \"{}\"", db_path.display()),
        );
    let config = format!(
        "{}\n[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 3\n",
        config
    );
    fs::write(&config_path, config).unwrap();

    let store = SqliteVectorStore::open(&db_path).await.unwrap();
    store
        .upsert(
            "repo-docs",
            &[VectorRecord {
                chunk: stored_chunk("README.md:0", "The widget service stores widgets."),
                vector: vec![1.0, 0.0, 0.0],
            }],
        )
        .await
        .unwrap();
    store.close().await;

    let (stdout, stderr, success) = run_rkb(&config_path, &["status", "--json"]);
    assert!(success, "status failed: {}", stderr);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["initialized"], true);

    let (stdout, stderr, success) = run_rkb(&config_path, &["clear"]);
    assert!(success, "clear failed: {}", stderr);
    assert!(stdout.contains("backend: vector"));
    assert!(stdout.contains("initialized: false"));

    // A fresh process sees the clear; the vectors themselves are kept.
    let (stdout, _, success) = run_rkb(&config_path, &["status", "--json"]);
    assert!(success);
    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["initialized"], false);

    let (stdout, stderr, success) = run_rkb(&config_path, &["clear", "--purge"]);
    assert!(success, "clear --purge failed: {}", stderr);
    assert!(stdout.contains("purged vectors: 1"));

    let store = SqliteVectorStore::open(&db_path).await.unwrap();
    assert_eq!(store.count("repo-docs").await.unwrap(), 0);
    store.close().await;
}
