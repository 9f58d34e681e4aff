//! Core data types shared across the store, ranker, and graph components.
//!
//! Mirrors the shape of §3 of the design document: entries are the atomic
//! unit of stored knowledge, versions are their audit trail, and graph
//! nodes/edges connect them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// ENTRY TYPE
// ============================================================================

/// Closed set of entry types; governs confidence decay half-life (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    FactualReference,
    Decision,
    PatternConvention,
    LessonLearned,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::FactualReference => "factual_reference",
            EntryType::Decision => "decision",
            EntryType::PatternConvention => "pattern_convention",
            EntryType::LessonLearned => "lesson_learned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "factual_reference" => Some(EntryType::FactualReference),
            "decision" => Some(EntryType::Decision),
            "pattern_convention" => Some(EntryType::PatternConvention),
            "lesson_learned" => Some(EntryType::LessonLearned),
            _ => None,
        }
    }

    /// Half-life in days, per §4.5's table.
    pub fn half_life_days(&self) -> f64 {
        match self {
            EntryType::FactualReference => 90.0,
            EntryType::Decision => 365.0,
            EntryType::PatternConvention => 730.0,
            EntryType::LessonLearned => 1825.0,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// ENTRY
// ============================================================================

/// The atomic unit of stored knowledge.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// `kb-XXXXX`, allocated from the monotonic sequence.
    pub id: String,
    pub short_title: String,
    pub long_title: String,
    pub details: String,
    pub entry_type: EntryType,
    pub project_ref: Option<String>,
    /// Whitespace-free tokens, stored and indexed as one joined string.
    pub tags: Vec<String>,
    /// Free-form recognised keys: `supersedes`, `superseded_by`,
    /// `related_entities`, `person`, `tool` (§4.7).
    pub hints: serde_json::Value,
    pub base_confidence: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub is_active: bool,
    pub has_embedding: bool,
    pub version: i64,
}

impl Entry {
    /// Text fed to the embedder: `short_title + " " + long_title + " " + details`.
    pub fn embedding_text(&self) -> String {
        format!("{} {} {}", self.short_title, self.long_title, self.details)
    }

    /// Tags joined with spaces, padded, for boundary-safe substring matching.
    pub fn tags_joined(&self) -> String {
        self.tags.join(" ")
    }
}

/// Fields accepted by `create_entry`. Mirrors the `store` tool's inputs (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct NewEntry {
    pub short_title: String,
    pub long_title: String,
    pub details: String,
    pub entry_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_ref: Option<String>,
    #[serde(default)]
    pub hints: serde_json::Value,
    #[serde(default)]
    pub base_confidence: Option<f32>,
}

/// Patch accepted by `update_entry`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntryPatch {
    pub short_title: Option<String>,
    pub long_title: Option<String>,
    pub details: Option<String>,
    pub entry_type: Option<String>,
    pub tags: Option<Vec<String>>,
    pub project_ref: Option<String>,
    pub hints: Option<serde_json::Value>,
    pub base_confidence: Option<f32>,
}

impl EntryPatch {
    /// True if the patch changes the body text used for embedding/FTS.
    pub fn changes_body(&self) -> bool {
        self.short_title.is_some() || self.long_title.is_some() || self.details.is_some()
    }
}

// ============================================================================
// VERSION RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub entry_id: String,
    pub version_number: i64,
    pub snapshot_of_details: String,
    pub snapshot_of_confidence: f32,
    pub change_reason: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// GRAPH
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub node_id: String,
    pub node_type: String,
    pub properties: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
    pub properties: serde_json::Value,
}

impl GraphEdge {
    pub fn is_llm_sourced(&self) -> bool {
        self.properties.get("source").and_then(|v| v.as_str()) == Some("llm")
    }
}

/// Direction of a neighbour relative to the queried node (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbor {
    pub node: GraphNode,
    pub edge_type: String,
    pub direction: EdgeDirection,
}

// ============================================================================
// INGESTED FILE (schema-only, per §3: the pipeline itself is out of scope)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedFile {
    pub absolute_path: String,
    pub sha256: String,
    pub note_node_id: Option<String>,
    pub entry_ids: Vec<String>,
    pub summary: Option<String>,
    pub size: i64,
    pub extension: Option<String>,
    pub project_ref: Option<String>,
    pub redactions_json: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_active: bool,
}

// ============================================================================
// SEARCH RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Hybrid,
    Fts,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub entry: Entry,
    pub rrf_score: f32,
    pub effective_confidence: f32,
    pub match_source: MatchSource,
    pub staleness_warning: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    pub project_ref: Option<String>,
    pub entry_type: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub hints: Vec<String>,
}
