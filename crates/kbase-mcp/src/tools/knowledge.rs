//! `store`, `store_batch`, and `get` — the entry lifecycle tools (§6).

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use kbase_core::{KnowledgeServer, NewEntry, GET_BATCH_LIMIT, STORE_BATCH_LIMIT};

pub fn store_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "short_title": {
                "type": "string",
                "description": "Short label shown in listings."
            },
            "long_title": {
                "type": "string",
                "description": "Full human-readable title."
            },
            "details": {
                "type": "string",
                "description": "The entry body — what gets searched and decayed."
            },
            "entry_type": {
                "type": "string",
                "enum": ["factual_reference", "decision", "pattern_convention", "lesson_learned"],
                "description": "Governs the confidence half-life applied on retrieval."
            },
            "tags": {
                "type": "array",
                "items": {"type": "string"}
            },
            "project_ref": {
                "type": "string",
                "description": "Optional project scope."
            },
            "hints": {
                "type": "object",
                "description": "Recognised keys: supersedes, superseded_by, related_entities, person, tool."
            },
            "base_confidence": {
                "type": "number",
                "minimum": 0.0,
                "maximum": 1.0
            }
        },
        "required": ["short_title", "long_title", "details", "entry_type"]
    })
}

pub fn store_batch_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "entries": {
                "type": "array",
                "items": store_schema(),
                "minItems": 1,
                "maxItems": STORE_BATCH_LIMIT
            }
        },
        "required": ["entries"]
    })
}

pub fn get_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "ids": {
                "type": "array",
                "items": {"type": "string", "pattern": r"^kb-\d{5}$"},
                "minItems": 1,
                "maxItems": GET_BATCH_LIMIT,
                "description": "Entry ids, e.g. kb-00042. Touches last_accessed on every hit."
            }
        },
        "required": ["ids"]
    })
}

pub async fn execute_store(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let fields: NewEntry = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    let entry = server.store(fields).await.map_err(|e| e.to_string())?;
    serde_json::to_value(entry).map_err(|e| e.to_string())
}

#[derive(Debug, Deserialize)]
struct StoreBatchArgs {
    entries: Vec<NewEntry>,
}

pub async fn execute_store_batch(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let args: StoreBatchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    let entries = server.store_batch(args.entries).await.map_err(|e| e.to_string())?;
    serde_json::to_value(serde_json::json!({ "stored": entries.len(), "entries": entries })).map_err(|e| e.to_string())
}

#[derive(Debug, Deserialize)]
struct GetArgs {
    ids: Vec<String>,
}

pub async fn execute_get(server: &Arc<KnowledgeServer>, args: Option<Value>) -> Result<Value, String> {
    let args: GetArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| format!("Invalid arguments: {e}"))?,
        None => return Err("Missing arguments".to_string()),
    };
    let entries = server.get(&args.ids).map_err(|e| e.to_string())?;
    serde_json::to_value(entries).map_err(|e| e.to_string())
}
