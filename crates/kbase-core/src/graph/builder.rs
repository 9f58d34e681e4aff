//! Deterministic graph builder (§4.7): delete-and-rebuild over every
//! non-LLM outgoing edge from the entry node, then derive edges from
//! entry fields alone. Runs on every create/update, after the entry
//! commit and embedding steps (§5's ordering guarantee).

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value as Json;
use std::sync::OnceLock;

use crate::error::Result;
use crate::model::Entry;
use crate::store::Storage;

fn entry_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"kb-\d{5}").expect("static pattern"))
}

pub struct GraphBuilder;

impl GraphBuilder {
    /// Rebuild every deterministic edge for `entry`. LLM-marked edges
    /// (owned by [`crate::graph::GraphEnricher`]) are left untouched.
    pub fn rebuild(store: &Storage, entry: &Entry) -> Result<()> {
        store.clear_outgoing_edges(&entry.id, true)?;

        store.upsert_node(
            &entry.id,
            "entry",
            &serde_json::json!({
                "short_title": entry.short_title,
                "entry_type": entry.entry_type.as_str(),
            }),
        )?;

        for tag in &entry.tags {
            let node_id = format!("tag:{tag}");
            store.upsert_node(&node_id, "tag", &Json::Null)?;
            store.insert_edge(&entry.id, &node_id, "has_tag", &Json::Null)?;
        }

        if let Some(project) = &entry.project_ref {
            let node_id = format!("project:{project}");
            store.upsert_node(&node_id, "project", &Json::Null)?;
            store.insert_edge(&entry.id, &node_id, "in_project", &Json::Null)?;
        }

        if let Some(ids) = entry.hints.get("supersedes").and_then(Json::as_array) {
            for id in ids.iter().filter_map(Json::as_str) {
                store.upsert_node(id, "entry", &Json::Null)?;
                store.insert_edge(&entry.id, id, "supersedes", &Json::Null)?;
            }
        }

        if let Some(id) = entry.hints.get("superseded_by").and_then(Json::as_str) {
            store.upsert_node(id, "entry", &Json::Null)?;
            store.insert_edge(id, &entry.id, "superseded_by", &Json::Null)?;
        }

        let mut referenced: HashSet<String> = HashSet::new();
        for m in entry_ref_pattern().find_iter(&entry.details) {
            referenced.insert(m.as_str().to_string());
        }
        referenced.remove(&entry.id);
        for target in referenced {
            store.upsert_node(&target, "entry", &Json::Null)?;
            store.insert_edge(&entry.id, &target, "references", &Json::Null)?;
        }

        if let Some(related) = entry.hints.get("related_entities").and_then(Json::as_array) {
            for item in related {
                let (target, edge_type) = match item {
                    Json::String(id) => (id.clone(), "related_to".to_string()),
                    Json::Object(_) => {
                        let id = item.get("id").and_then(Json::as_str).map(str::to_string);
                        let edge_type = item
                            .get("type")
                            .and_then(Json::as_str)
                            .unwrap_or("related_to")
                            .to_string();
                        match id {
                            Some(id) => (id, edge_type),
                            None => continue,
                        }
                    }
                    _ => continue,
                };
                store.upsert_node(&target, "concept", &Json::Null)?;
                store.insert_edge(&entry.id, &target, &edge_type, &Json::Null)?;
            }
        }

        for person in hint_strings(&entry.hints, "person") {
            let node_id = format!("person:{person}");
            store.upsert_node(&node_id, "person", &Json::Null)?;
            store.insert_edge(&entry.id, &node_id, "mentions_person", &Json::Null)?;
        }

        for tool in hint_strings(&entry.hints, "tool") {
            let node_id = format!("tool:{tool}");
            store.upsert_node(&node_id, "tool", &Json::Null)?;
            store.insert_edge(&entry.id, &node_id, "uses_tool", &Json::Null)?;
        }

        Ok(())
    }
}

/// `hints.person`/`hints.tool` may be a single string or an array of
/// strings; normalise to a list either way.
fn hint_strings(hints: &Json, key: &str) -> Vec<String> {
    match hints.get(key) {
        Some(Json::String(s)) => vec![s.clone()],
        Some(Json::Array(items)) => items
            .iter()
            .filter_map(Json::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
