//! Tool surface for agents and scripted callers.
//!
//! Each [`Tool`] takes a JSON object and returns an [`Outcome`] that
//! serializes to JSON. Bad parameters are reported as
//! [`FailureKind::InvalidInput`] failures, never as panics.
//!
//! | Tool | Parameters | Result |
//! |------|------------|--------|
//! | `search_docs` | `query`, `max_results?` | ranked hits with excerpts |
//! | `init_knowledge_base` | `force_reload?` | load report |
//! | `knowledge_status` | none | index status |
//! | `load_documents` | `documents: [{path, content, name?}]` | load report |
//! | `ask_docs` | `query`, `max_results?`, `force_reload?` | answer with sources |
//!
//! ```rust
//! use repo_knowledge::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::with_builtins();
//! assert!(registry.find("ask_docs").is_some());
//! ```

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use repo_knowledge_core::models::SearchHit;
use repo_knowledge_core::KbError;

use crate::knowledge::Document;
use crate::pipeline::{AnswerOptions, FailureKind, Outcome, RetrievalPipeline};

#[async_trait]
pub trait Tool: Send + Sync {
    /// Lowercase identifier with underscores, e.g. `"search_docs"`.
    fn name(&self) -> &str;

    /// One-line description for discovery.
    fn description(&self) -> &str;

    /// JSON Schema of the accepted parameters.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Outcome<Value>;
}

/// Shared state handed to every tool call.
///
/// The pipeline sits behind an async mutex, so a load and a search issued
/// through the tool surface never overlap.
pub struct ToolContext {
    pipeline: Mutex<RetrievalPipeline>,
}

impl ToolContext {
    pub fn new(pipeline: RetrievalPipeline) -> Self {
        Self {
            pipeline: Mutex::new(pipeline),
        }
    }

    pub fn into_inner(self) -> RetrievalPipeline {
        self.pipeline.into_inner()
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
    KbError::InvalidInput(message.into()).into()
}

/// Required non-blank string parameter.
fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    match params.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(invalid(format!("{} must not be empty", key))),
        Some(_) => Err(invalid(format!("{} must be a string", key))),
        None => Err(invalid(format!("missing required parameter: {}", key))),
    }
}

/// Optional positive integer parameter.
fn optional_count(params: &Value, key: &str) -> Result<Option<usize>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => Ok(Some(n as usize)),
            _ => Err(invalid(format!("{} must be an integer >= 1", key))),
        },
    }
}

fn optional_bool(params: &Value, key: &str) -> Result<bool> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(_) => Err(invalid(format!("{} must be a boolean", key))),
    }
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    count: usize,
    results: Vec<SearchHit>,
}

pub struct SearchDocsTool;

#[async_trait]
impl Tool for SearchDocsTool {
    fn name(&self) -> &str {
        "search_docs"
    }

    fn description(&self) -> &str {
        "Search the repository documentation and return ranked excerpts"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "max_results": { "type": "integer", "minimum": 1, "description": "Max results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let result = async {
            let query = required_str(&params, "query")?;
            let mut pipeline = ctx.pipeline.lock().await;
            let limit = optional_count(&params, "max_results")?
                .unwrap_or_else(|| pipeline.default_max_results());
            let results = pipeline.knowledge_base_mut().search(query, limit).await?;
            to_json(SearchResponse {
                query: query.to_string(),
                count: results.len(),
                results,
            })
        }
        .await;
        Outcome::from_result(result)
    }
}

pub struct InitKnowledgeBaseTool;

#[async_trait]
impl Tool for InitKnowledgeBaseTool {
    fn name(&self) -> &str {
        "init_knowledge_base"
    }

    fn description(&self) -> &str {
        "Build the knowledge base from the repository, or reuse it when already built"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "force_reload": { "type": "boolean", "default": false }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let result = async {
            let force = optional_bool(&params, "force_reload")?;
            let mut pipeline = ctx.pipeline.lock().await;
            to_json(pipeline.knowledge_base_mut().init(force).await?)
        }
        .await;
        Outcome::from_result(result)
    }
}

pub struct KnowledgeStatusTool;

#[async_trait]
impl Tool for KnowledgeStatusTool {
    fn name(&self) -> &str {
        "knowledge_status"
    }

    fn description(&self) -> &str {
        "Report whether the knowledge base is loaded and how many chunks it holds"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let pipeline = ctx.pipeline.lock().await;
        Outcome::from_result(to_json(pipeline.knowledge_base().status()))
    }
}

pub struct LoadDocumentsTool;

#[async_trait]
impl Tool for LoadDocumentsTool {
    fn name(&self) -> &str {
        "load_documents"
    }

    fn description(&self) -> &str {
        "Replace the knowledge base with the given markdown documents"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "documents": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string" },
                            "name": { "type": "string" },
                            "content": { "type": "string" }
                        },
                        "required": ["path", "content"]
                    }
                }
            },
            "required": ["documents"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let result = async {
            let raw = params
                .get("documents")
                .ok_or_else(|| invalid("missing required parameter: documents"))?;
            let documents: Vec<Document> = serde_json::from_value(raw.clone())
                .map_err(|e| invalid(format!("documents: {}", e)))?;
            let mut pipeline = ctx.pipeline.lock().await;
            to_json(pipeline.knowledge_base_mut().load_documents(documents).await?)
        }
        .await;
        Outcome::from_result(result)
    }
}

pub struct AskDocsTool;

#[async_trait]
impl Tool for AskDocsTool {
    fn name(&self) -> &str {
        "ask_docs"
    }

    fn description(&self) -> &str {
        "Answer a question from the repository documentation, citing sources"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Question to answer" },
                "max_results": { "type": "integer", "minimum": 1 },
                "force_reload": { "type": "boolean", "default": false }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let parsed = (|| -> Result<(String, AnswerOptions)> {
            let query = required_str(&params, "query")?.to_string();
            let options = AnswerOptions {
                max_results: optional_count(&params, "max_results")?,
                force_reload: optional_bool(&params, "force_reload")?,
            };
            Ok((query, options))
        })();
        let (query, options) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => return Outcome::from_result(Err(e)),
        };

        let mut pipeline = ctx.pipeline.lock().await;
        pipeline.answer(&query, options).await.and_then(to_json)
    }
}

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchDocsTool));
        registry.register(Box::new(InitKnowledgeBaseTool));
        registry.register(Box::new(KnowledgeStatusTool));
        registry.register(Box::new(LoadDocumentsTool));
        registry.register(Box::new(AskDocsTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Dispatch by name. Unknown names and non-object parameters are
    /// invalid input.
    pub async fn call(&self, name: &str, params: Value, ctx: &ToolContext) -> Outcome<Value> {
        let Some(tool) = self.find(name) else {
            return Outcome::failure(FailureKind::InvalidInput, format!("unknown tool: {}", name));
        };
        let params = match params {
            Value::Null => json!({}),
            Value::Object(_) => params,
            _ => {
                return Outcome::failure(
                    FailureKind::InvalidInput,
                    "parameters must be a JSON object",
                )
            }
        };
        tracing::debug!(tool = name, "calling tool");
        tool.execute(params, ctx).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_str() {
        let params = json!({ "query": "install", "blank": "  ", "num": 3 });
        assert_eq!(required_str(&params, "query").unwrap(), "install");
        for key in ["blank", "num", "missing"] {
            let err = required_str(&params, key).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<KbError>(),
                Some(KbError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_optional_count_and_bool() {
        let params = json!({ "n": 4, "zero": 0, "neg": -1, "flag": true, "text": "yes" });
        assert_eq!(optional_count(&params, "n").unwrap(), Some(4));
        assert_eq!(optional_count(&params, "absent").unwrap(), None);
        assert!(optional_count(&params, "zero").is_err());
        assert!(optional_count(&params, "neg").is_err());
        assert!(optional_bool(&params, "flag").unwrap());
        assert!(!optional_bool(&params, "absent").unwrap());
        assert!(optional_bool(&params, "text").is_err());
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 5);
        let names: Vec<&str> = registry.tools().iter().map(|t| t.name()).collect();
        assert_eq!(
            names,
            vec![
                "search_docs",
                "init_knowledge_base",
                "knowledge_status",
                "load_documents",
                "ask_docs"
            ]
        );
        for tool in registry.tools() {
            assert_eq!(tool.parameters_schema()["type"], "object");
        }
    }
}
