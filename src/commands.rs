//! Command implementations behind the `rkb` binary.
//!
//! Each `run_*` function builds what it needs from [`Config`], performs one
//! operation, and prints the result to stdout. Human-readable output follows
//! a `"<command>\n  key: value\nok"` layout; `--json` variants print the
//! serialized result instead.

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::Value;

use repo_knowledge_core::models::{IndexStatus, LoadReport, SearchHit};
use repo_knowledge_core::store::VectorStore;

use crate::config::Config;
use crate::pipeline::{Answer, AnswerOptions, Outcome, RetrievalPipeline};
use crate::tools::{ToolContext, ToolRegistry};
use crate::vector_store::SqliteVectorStore;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_report(command: &str, report: &LoadReport) {
    println!("{}", command);
    println!("  documents: {}", report.documents);
    println!("  chunks: {}", report.chunks);
    println!("  failed documents: {}", report.failed_documents);
    println!("  cached: {}", report.cached);
    println!("ok");
}

fn print_status(status: &IndexStatus) {
    println!("status");
    println!("  backend: {}", status.backend);
    println!("  initialized: {}", status.initialized);
    println!("  chunks: {}", status.chunks);
    println!("ok");
}

/// `rkb init`: build the knowledge base, or report the cached one.
pub async fn run_init(config: &Config, force: bool) -> Result<()> {
    let mut pipeline = RetrievalPipeline::from_config(config).await?;
    let report = pipeline.knowledge_base_mut().init(force).await?;
    print_report("init", &report);
    Ok(())
}

pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let pipeline = RetrievalPipeline::from_config(config).await?;
    let status = pipeline.knowledge_base().status();
    if json {
        return print_json(&status);
    }
    print_status(&status);
    Ok(())
}

/// `rkb search`: ranked hits with excerpts.
pub async fn run_search(config: &Config, query: &str, limit: Option<usize>, json: bool) -> Result<()> {
    if query.trim().is_empty() {
        bail!("query must not be empty");
    }
    let mut pipeline = RetrievalPipeline::from_config(config).await?;
    let limit = limit.unwrap_or_else(|| pipeline.default_max_results());
    let hits = pipeline.knowledge_base_mut().search(query, limit).await?;

    if json {
        return print_json(&hits);
    }
    print_hits(&hits);
    Ok(())
}

fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.source, hit.title);
        if !hit.section.is_empty() {
            println!("    section: {}", hit.section);
        }
        println!("    id: {}", hit.id);
        for line in hit.excerpt.lines() {
            println!("    > {}", line);
        }
        println!();
    }
}

/// `rkb ask`: run the full retrieval pipeline.
pub async fn run_ask(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    force_reload: bool,
    json: bool,
) -> Result<()> {
    let mut pipeline = RetrievalPipeline::from_config(config).await?;
    let outcome = pipeline
        .answer(
            query,
            AnswerOptions {
                max_results: limit,
                force_reload,
            },
        )
        .await;

    if json {
        print_json(&outcome)?;
        if let Outcome::Failure { message, .. } = outcome {
            bail!(message);
        }
        return Ok(());
    }

    match outcome {
        Outcome::Success(answer) => {
            print_answer(&answer);
            Ok(())
        }
        Outcome::Failure { kind, message } => bail!("{:?}: {}", kind, message),
    }
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.answer);
    println!();
    println!("chunks used: {}", answer.chunks_used);
    if !answer.sources.is_empty() {
        println!("sources:");
        for source in &answer.sources {
            println!("  - {}", source);
        }
    }
}

/// `rkb clear`: reset the knowledge base. A vector index is marked cleared
/// in its store, so later runs start uninitialized and reload on first use
/// while still reusing stored vectors. With `purge`, stored vectors for the
/// configured index are deleted too, so the next load embeds from scratch.
pub async fn run_clear(config: &Config, purge: bool) -> Result<()> {
    let mut pipeline = RetrievalPipeline::from_config(config).await?;
    pipeline.knowledge_base_mut().clear().await?;
    let initialized = pipeline.knowledge_base().status().initialized;

    let mut purged = 0;
    if purge && config.index.backend == "vector" {
        let store = SqliteVectorStore::open(&config.index.path).await?;
        purged = store.count(&config.index.name).await?;
        store.delete_index(&config.index.name).await?;
        store.close().await;
    }

    println!("clear");
    println!("  backend: {}", config.index.backend);
    println!("  index: {}", config.index.name);
    println!("  initialized: {}", initialized);
    if purge {
        println!("  purged vectors: {}", purged);
    }
    println!("ok");
    Ok(())
}

pub fn run_tool_list(json: bool) -> Result<()> {
    let registry = ToolRegistry::with_builtins();
    if json {
        let listing: Vec<Value> = registry
            .tools()
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.name(),
                    "description": t.description(),
                    "parameters": t.parameters_schema(),
                })
            })
            .collect();
        return print_json(&listing);
    }

    println!("tools ({})", registry.len());
    for tool in registry.tools() {
        println!("  {:<22} {}", tool.name(), tool.description());
    }
    println!("ok");
    Ok(())
}

/// `rkb tool call`: dispatch one tool and print its JSON outcome. A failed
/// outcome is printed and then reported as an error.
pub async fn run_tool_call(config: &Config, name: &str, params: Option<&str>) -> Result<()> {
    let params: Value = match params {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| anyhow::anyhow!("parameters are not valid JSON: {}", e))?,
        None => Value::Null,
    };

    let registry = ToolRegistry::with_builtins();
    let ctx = ToolContext::new(RetrievalPipeline::from_config(config).await?);
    let outcome = registry.call(name, params, &ctx).await;
    print_json(&outcome)?;

    if !outcome.is_success() {
        bail!("tool {} failed", name);
    }
    Ok(())
}
