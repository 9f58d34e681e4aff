//! `search` — hybrid BM25 + vector retrieval (§6, §4.6).

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use kbase_core::{KnowledgeServer, SearchFilters};

pub fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "Natural-language or keyword query."
            },
            "limit": {
                "type": "integer",
                "default": 10,
                "minimum": 1,
                "maximum": 50
            },
            "project_ref": {"type": "string"},
            "entry_type": {
                "type": "string",
                "enum": ["factual_reference", "decision", "pattern_convention", "lesson_learned"]
            },
            "tag": {"type": "string"},
            "include_stale": {
                "type": "boolean",
                "default": false,
                "description": "Include entries whose effective confidence has decayed below the filter threshold."
            }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project_ref: Option<String>,
    #[serde(default)]
    entry_type: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    include_stale: bool,
}

pub async fn execute(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let args: SearchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    if args.query.trim().is_empty() {
        return Err("query cannot be empty".to_string());
    }

    let filters = SearchFilters {
        project_ref: args.project_ref,
        entry_type: args.entry_type,
        tag: args.tag,
    };

    let response = server
        .search(&args.query, filters, args.limit.unwrap_or(10).clamp(1, 50), args.include_stale)
        .await
        .map_err(|e| e.to_string())?;

    serde_json::to_value(response).map_err(|e| e.to_string())
}
