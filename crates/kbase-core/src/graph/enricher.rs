//! LLM graph enricher (§4.8): extracts entities and relationships from
//! an entry's text, resolves them against the existing graph vocabulary
//! by fuzzy name similarity, and layers `source=llm`-marked edges on top
//! of the deterministic ones. Every failure here is logged and
//! swallowed — the entry is already stored and searchable regardless.

use std::collections::HashMap;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as Json;
use std::sync::OnceLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::llm::LlmProvider;
use crate::model::Entry;
use crate::store::Storage;

const MAX_ENTITIES_PER_ENTRY: usize = 8;
const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

const VALID_ENTITY_TYPES: &[&str] = &["person", "tool", "concept", "technology"];

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: String,
    pub relationship: String,
}

fn fenced_code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("static pattern"))
}

fn array_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[[\s\S]*\]").expect("static pattern"))
}

/// Strip code fences, locate the outermost `[...]`, parse as JSON, and
/// keep only well-shaped items. Anything short of that yields an empty
/// list rather than an error — extraction failures are not fatal.
fn parse_entities(raw: &str) -> Vec<ExtractedEntity> {
    let unfenced = match fenced_code_pattern().captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_else(|| raw.to_string()),
        None => raw.to_string(),
    };
    let Some(array_match) = array_pattern().find(&unfenced) else {
        return Vec::new();
    };
    let Ok(values) = serde_json::from_str::<Vec<Json>>(array_match.as_str()) else {
        return Vec::new();
    };
    values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ExtractedEntity>(v).ok())
        .filter(|e| VALID_ENTITY_TYPES.contains(&e.entity_type.as_str()))
        .filter(|e| !e.name.trim().is_empty() && !e.relationship.trim().is_empty())
        .take(MAX_ENTITIES_PER_ENTRY)
        .collect()
}

fn normalise_name(name: &str) -> String {
    name.trim().to_lowercase().replace(char::is_whitespace, "-")
}

/// Longest-common-subsequence-based similarity ratio in `[0, 1]`:
/// `2 * lcs_len / (len(a) + len(b))`.
fn subsequence_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return if a.is_empty() && b.is_empty() { 1.0 } else { 0.0 };
    }
    let mut dp = vec![vec![0u32; b.len() + 1]; a.len() + 1];
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            dp[i][j] = if a[i - 1] == b[j - 1] {
                dp[i - 1][j - 1] + 1
            } else {
                dp[i - 1][j].max(dp[i][j - 1])
            };
        }
    }
    let lcs = dp[a.len()][b.len()] as f32;
    (2.0 * lcs) / (a.len() + b.len()) as f32
}

/// The in-memory name→node_id cache built once per enrichment call
/// (§4.8, §4.9's "graph vocabulary").
struct Vocabulary {
    /// normalised name -> node_id
    by_name: HashMap<String, String>,
}

impl Vocabulary {
    fn load(store: &Storage) -> Result<Self> {
        let mut by_name = HashMap::new();
        for node_type in store.all_non_entry_node_types()? {
            for node_id in store.nodes_by_type_ordered_by_degree(&node_type)? {
                if let Some((_, name)) = node_id.split_once(':') {
                    by_name.insert(normalise_name(name), node_id);
                }
            }
        }
        Ok(Self { by_name })
    }

    /// Resolve `name` against every known name across all types. Returns
    /// the existing node id on a similarity match ≥ `threshold`,
    /// otherwise registers and returns a freshly minted id.
    fn resolve_or_create(&mut self, name: &str, entity_type: &str, threshold: f32) -> String {
        let normalised = normalise_name(name);
        let best = self
            .by_name
            .iter()
            .map(|(existing, node_id)| (subsequence_similarity(&normalised, existing), node_id.clone()))
            .max_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if let Some((score, node_id)) = best {
            if score >= threshold {
                return node_id;
            }
        }
        let node_id = format!("{entity_type}:{normalised}");
        self.by_name.insert(normalised, node_id.clone());
        node_id
    }
}

pub struct GraphEnricher {
    pub similarity_threshold: f32,
}

impl Default for GraphEnricher {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl GraphEnricher {
    pub fn new(similarity_threshold: f32) -> Self {
        Self { similarity_threshold }
    }

    /// Enrich a single entry. Never returns an error to the caller — all
    /// failure modes are logged and treated as "nothing extracted".
    pub async fn enrich(&self, store: &Storage, llm: &dyn LlmProvider, entry: &Entry) {
        if let Err(e) = self.try_enrich(store, llm, entry).await {
            warn!(entry_id = %entry.id, error = %e, "graph enrichment failed");
        }
    }

    async fn try_enrich(&self, store: &Storage, llm: &dyn LlmProvider, entry: &Entry) -> Result<()> {
        if !llm.is_available().await {
            debug!(entry_id = %entry.id, "extraction llm unavailable, skipping enrichment");
            return Ok(());
        }
        let prompt = build_prompt(entry);
        let Some(response) = llm.generate(&prompt, Some(EXTRACTION_SYSTEM_PROMPT)).await else {
            return Ok(());
        };
        let entities = parse_entities(&response);
        if entities.is_empty() {
            return Ok(());
        }

        let mut vocabulary = Vocabulary::load(store)?;
        store.clear_outgoing_edges(&entry.id, false)?;

        for item in entities {
            let node_id = vocabulary.resolve_or_create(&item.name, &item.entity_type, self.similarity_threshold);
            store.upsert_node(&node_id, &item.entity_type, &Json::Null)?;
            store.insert_edge(
                &entry.id,
                &node_id,
                &item.relationship,
                &serde_json::json!({"source": "llm"}),
            )?;
        }
        Ok(())
    }

    /// Batch variant (§4.8): one prompt covering several entries, parsed
    /// as a JSON object keyed by entry id. Falls back to per-entry
    /// enrichment on any parse failure.
    pub async fn enrich_batch(&self, store: &Storage, llm: &dyn LlmProvider, entries: &[Entry]) {
        if entries.is_empty() {
            return;
        }
        if !llm.is_available().await {
            return;
        }
        let prompt = build_batch_prompt(entries);
        match llm.generate(&prompt, Some(EXTRACTION_SYSTEM_PROMPT)).await {
            Some(response) => {
                if let Some(by_id) = parse_batch_entities(&response) {
                    for entry in entries {
                        let Some(entities) = by_id.get(&entry.id) else { continue };
                        if let Err(e) = self.apply_entities(store, entry, entities.clone()).await {
                            warn!(entry_id = %entry.id, error = %e, "batch enrichment apply failed");
                        }
                    }
                    return;
                }
                debug!("batch enrichment response did not parse, falling back to per-entry");
            }
            None => debug!("batch enrichment llm call failed, falling back to per-entry"),
        }
        for entry in entries {
            self.enrich(store, llm, entry).await;
        }
    }

    async fn apply_entities(&self, store: &Storage, entry: &Entry, entities: Vec<ExtractedEntity>) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut vocabulary = Vocabulary::load(store)?;
        store.clear_outgoing_edges(&entry.id, false)?;
        for item in entities {
            let node_id = vocabulary.resolve_or_create(&item.name, &item.entity_type, self.similarity_threshold);
            store.upsert_node(&node_id, &item.entity_type, &Json::Null)?;
            store.insert_edge(
                &entry.id,
                &node_id,
                &item.relationship,
                &serde_json::json!({"source": "llm"}),
            )?;
        }
        Ok(())
    }
}

const EXTRACTION_SYSTEM_PROMPT: &str = "Extract entities and relationships from knowledge base \
entries. Respond with a JSON array only.";

fn build_prompt(entry: &Entry) -> String {
    format!(
        "Entry {}\nTitle: {}\nDetails: {}\n\nReturn a JSON array of at most 8 items, each \
         {{\"name\": ..., \"entity_type\": one of person|tool|concept|technology, \
         \"relationship\": \"<verb phrase>\"}}.",
        entry.id, entry.long_title, entry.details
    )
}

fn build_batch_prompt(entries: &[Entry]) -> String {
    let mut prompt = String::from(
        "For each of the following entries, extract entities and relationships. Return a JSON \
         object keyed by entry id, each value a JSON array of at most 8 items shaped \
         {\"name\":...,\"entity_type\":person|tool|concept|technology,\"relationship\":...}.\n\n",
    );
    for entry in entries {
        prompt.push_str(&format!("Entry {}\nTitle: {}\nDetails: {}\n\n", entry.id, entry.long_title, entry.details));
    }
    prompt
}

fn parse_batch_entities(raw: &str) -> Option<HashMap<String, Vec<ExtractedEntity>>> {
    let unfenced = match fenced_code_pattern().captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_else(|| raw.to_string()),
        None => raw.to_string(),
    };
    let object: HashMap<String, Vec<Json>> = serde_json::from_str(unfenced.trim()).ok()?;
    let mut result = HashMap::new();
    for (id, items) in object {
        let entities: Vec<ExtractedEntity> = items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<ExtractedEntity>(v).ok())
            .filter(|e| VALID_ENTITY_TYPES.contains(&e.entity_type.as_str()))
            .take(MAX_ENTITIES_PER_ENTRY)
            .collect();
        result.insert(id, entities);
    }
    Some(result)
}
