//! Tools the model may call, and their execution against the knowledge index.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use folio_core::traits::Retriever;
use folio_core::{Error, Result};

pub const SEARCH_KNOWLEDGE_BASE: &str = "search_knowledge_base";
pub const DEFAULT_TOP_K: usize = 3;
pub const NO_RESULTS_MESSAGE: &str = "No relevant information found in knowledge base";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    SearchKnowledgeBase(SearchArgs),
}

/// Static description of one tool: what is declared to the model and how
/// its arguments are decoded.
pub struct ToolSpec {
    pub name: &'static str,
    /// `{subject}` is replaced by the person the assistant speaks about.
    pub description: &'static str,
    pub parameters: fn() -> Value,
    pub parse: fn(&str) -> Result<ToolCall>,
}

pub static TOOL_TABLE: &[ToolSpec] = &[ToolSpec {
    name: SEARCH_KNOWLEDGE_BASE,
    description: "Search {subject}'s personal knowledge base for information about their experience, skills, projects, education, interests, and background",
    parameters: search_parameters,
    parse: parse_search,
}];

fn search_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query to find relevant information"
            }
        },
        "required": ["query"]
    })
}

fn parse_search(arguments: &str) -> Result<ToolCall> {
    let args: SearchArgs = serde_json::from_str(arguments).map_err(|e| Error::InvalidToolArguments {
        tool: SEARCH_KNOWLEDGE_BASE.to_string(),
        message: e.to_string(),
    })?;
    Ok(ToolCall::SearchKnowledgeBase(args))
}

pub fn find_tool(name: &str) -> Option<&'static ToolSpec> {
    TOOL_TABLE.iter().find(|t| t.name == name)
}

impl ToolCall {
    pub fn parse(name: &str, arguments: &str) -> Result<Self> {
        let spec = find_tool(name).ok_or_else(|| Error::UnknownTool(name.to_string()))?;
        (spec.parse)(arguments)
    }
}

/// Function declarations in chat-completions format.
pub fn tool_definitions(subject: &str) -> Vec<Value> {
    TOOL_TABLE
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description.replace("{subject}", subject),
                    "parameters": (t.parameters)(),
                }
            })
        })
        .collect()
}

/// Payload returned to the model as the tool message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolResult {
    Found { success: bool, context: String, sources: Vec<String>, num_results: usize },
    NotFound { success: bool, message: String },
    Error { error: String },
}

impl ToolResult {
    pub fn not_found() -> Self {
        Self::NotFound { success: false, message: NO_RESULTS_MESSAGE.to_string() }
    }

    pub fn error(e: &Error) -> Self {
        Self::Error { error: e.to_string() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string())
    }
}

pub struct ToolInvoker {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl ToolInvoker {
    pub fn new(retriever: Arc<dyn Retriever>) -> Self {
        Self { retriever, top_k: DEFAULT_TOP_K }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Runs the tool `name` with JSON `arguments`. Never fails: unknown
    /// tools and malformed arguments come back as an error payload.
    pub async fn invoke(&self, name: &str, arguments: &str) -> ToolResult {
        match ToolCall::parse(name, arguments) {
            Ok(call) => self.execute(call).await,
            Err(e) => {
                tracing::warn!(tool = name, error = %e, "rejected tool call");
                ToolResult::error(&e)
            }
        }
    }

    pub async fn execute(&self, call: ToolCall) -> ToolResult {
        match call {
            ToolCall::SearchKnowledgeBase(SearchArgs { query }) => {
                let results = self.retriever.search(&query, self.top_k).await;
                tracing::debug!(%query, hits = results.len(), "knowledge base search");
                if results.is_empty() {
                    return ToolResult::not_found();
                }
                let context = results
                    .iter()
                    .map(|r| format!("[From {}]\n{}", r.source, r.content))
                    .collect::<Vec<_>>()
                    .join("\n\n");
                ToolResult::Found {
                    success: true,
                    context,
                    sources: results.iter().map(|r| r.source.clone()).collect(),
                    num_results: results.len(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use folio_core::types::SearchResult;
    use std::sync::Mutex;

    struct Canned {
        results: Vec<SearchResult>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl Retriever for Canned {
        async fn search(&self, query: &str, top_k: usize) -> Vec<SearchResult> {
            self.seen.lock().unwrap().push((query.to_string(), top_k));
            self.results.clone()
        }
    }

    fn canned(results: Vec<SearchResult>) -> Arc<Canned> {
        Arc::new(Canned { results, seen: Mutex::new(vec![]) })
    }

    fn hit(source: &str, content: &str) -> SearchResult {
        SearchResult { content: content.into(), source: source.into(), relevance_score: 0.9 }
    }

    #[tokio::test]
    async fn search_formats_context_and_sources() {
        let retriever = canned(vec![hit("resume.txt", "Rust engineer"), hit("hobbies.md", "Hiking")]);
        let invoker = ToolInvoker::new(retriever.clone());
        let result = invoker.invoke(SEARCH_KNOWLEDGE_BASE, r#"{"query":"skills"}"#).await;

        assert_eq!(
            result,
            ToolResult::Found {
                success: true,
                context: "[From resume.txt]\nRust engineer\n\n[From hobbies.md]\nHiking".into(),
                sources: vec!["resume.txt".into(), "hobbies.md".into()],
                num_results: 2,
            }
        );
        assert_eq!(retriever.seen.lock().unwrap().as_slice(), &[("skills".to_string(), 3)]);
        let json: Value = serde_json::from_str(&result.to_json()).unwrap();
        assert_eq!(json["success"], json!(true));
        assert_eq!(json["num_results"], json!(2));
    }

    #[tokio::test]
    async fn empty_search_reports_not_found() {
        let invoker = ToolInvoker::new(canned(vec![]));
        let result = invoker.invoke(SEARCH_KNOWLEDGE_BASE, r#"{"query":"x"}"#).await;
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"success": false, "message": "No relevant information found in knowledge base"})
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_not_raised() {
        let invoker = ToolInvoker::new(canned(vec![]));
        let result = invoker.invoke("get_weather", "{}").await;
        assert_eq!(serde_json::to_value(&result).unwrap(), json!({"error": "Unknown function: get_weather"}));
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported() {
        let invoker = ToolInvoker::new(canned(vec![hit("a.txt", "b")]));
        for args in ["not json", "{}", r#"{"query": 5}"#] {
            match invoker.invoke(SEARCH_KNOWLEDGE_BASE, args).await {
                ToolResult::Error { error } => assert!(error.starts_with("Invalid arguments for search_knowledge_base"), "{error}"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn definitions_name_the_subject() {
        let defs = tool_definitions("Ada");
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["type"], "function");
        assert_eq!(defs[0]["function"]["name"], SEARCH_KNOWLEDGE_BASE);
        assert!(defs[0]["function"]["description"].as_str().unwrap().starts_with("Search Ada's"));
        assert_eq!(defs[0]["function"]["parameters"]["required"], json!(["query"]));
    }
}
