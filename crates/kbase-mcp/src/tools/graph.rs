//! `ask` and `summarize` — the query-planner surface (§6, §4.10).

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use kbase_core::KnowledgeServer;

pub fn ask_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The natural-language question to answer from the knowledge base."
            },
            "strategy": {
                "type": "string",
                "enum": ["auto", "decision_trace", "timeline", "related", "connection"],
                "default": "auto",
                "description": "auto consults the query planner; the rest dispatch directly."
            },
            "scope": {
                "type": "string",
                "description": "project:<name>, tag:<name>, person:<name>, tool:<name>, or an entry type."
            },
            "target": {
                "type": "string",
                "description": "An entry id, required by decision_trace and connection."
            }
        },
        "required": ["question"]
    })
}

pub fn summarize_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "question": {
                "type": "string",
                "description": "The question to answer in prose, grounded in the retrieved entries."
            }
        },
        "required": ["question"]
    })
}

#[derive(Debug, Deserialize)]
struct AskArgs {
    question: String,
    #[serde(default = "default_strategy")]
    strategy: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

fn default_strategy() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize)]
struct SummarizeArgs {
    question: String,
}

pub async fn execute_ask(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let args: AskArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    let entries = server
        .ask(&args.question, &args.strategy, args.scope, args.target)
        .await
        .map_err(|e| e.to_string())?;

    serde_json::to_value(serde_json::json!({ "matched": entries.len(), "entries": entries }))
        .map_err(|e| e.to_string())
}

pub async fn execute_summarize(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let args: SummarizeArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };

    let answer = server.summarize(&args.question).await.map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "answer": answer }))
}
