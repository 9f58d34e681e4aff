//! Query planner & strategies (§4.10). The planner is consulted only
//! when a query LLM is configured and the caller asked for `auto`; it
//! maps a natural-language question plus the current graph vocabulary
//! and stats to a strategy, then each strategy dispatches to a
//! traversal in [`crate::graph::queries`].

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::error::Result;
use crate::llm::LlmProvider;
use crate::model::Entry;
use crate::store::{GraphStats, Storage};

use super::queries;

/// Soft fan-out budget for the `auto` strategy's one-hop expansion
/// (§9, open question 4).
pub const AUTO_STRATEGY_FANOUT_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Auto,
    DecisionTrace,
    Timeline,
    Related,
    Connection,
}

impl Strategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Strategy::Auto),
            "decision_trace" => Some(Strategy::DecisionTrace),
            "timeline" => Some(Strategy::Timeline),
            "related" => Some(Strategy::Related),
            "connection" => Some(Strategy::Connection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawPlan {
    strategy: String,
    scope: Option<String>,
    target: Option<String>,
    search_query: Option<String>,
    #[allow(dead_code)]
    reasoning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PlannedQuery {
    pub strategy: Strategy,
    pub scope: Option<String>,
    pub target: Option<String>,
    pub search_query: Option<String>,
}

pub struct QueryPlanner;

impl QueryPlanner {
    /// Ask the query LLM to turn `question` into a plan. On LLM
    /// unavailability, rejection of an unknown strategy, or any parse
    /// failure, falls back to `auto` with the raw question as the
    /// search query.
    pub async fn plan(
        store: &Storage,
        llm: &dyn LlmProvider,
        question: &str,
    ) -> Result<PlannedQuery> {
        let fallback = PlannedQuery {
            strategy: Strategy::Auto,
            scope: None,
            target: None,
            search_query: Some(question.to_string()),
        };

        if !llm.is_available().await {
            return Ok(fallback);
        }

        let vocabulary = queries::get_graph_vocabulary(store)?;
        let stats = queries::graph_stats(store)?;
        let prompt = build_prompt(question, &vocabulary, &stats);

        let Some(response) = llm.generate(&prompt, Some(PLANNER_SYSTEM_PROMPT)).await else {
            return Ok(fallback);
        };

        match serde_json::from_str::<RawPlan>(response.trim()) {
            Ok(raw) => match Strategy::parse(&raw.strategy) {
                Some(strategy) => Ok(PlannedQuery {
                    strategy,
                    scope: raw.scope,
                    target: raw.target,
                    search_query: raw.search_query.or_else(|| Some(question.to_string())),
                }),
                None => {
                    debug!(strategy = %raw.strategy, "planner returned unknown strategy, falling back");
                    Ok(fallback)
                }
            },
            Err(e) => {
                debug!(error = %e, "planner response did not parse, falling back");
                Ok(fallback)
            }
        }
    }

    /// Dispatch a planned (or explicitly requested) strategy.
    ///
    /// `query_embedding` is threaded through to the `auto` strategy's
    /// hybrid search (§4.10: "hybrid search; then ... one-hop neighbour
    /// expansion") so it degrades to FTS-only only when the caller has
    /// no embedder available, the same as `search`.
    pub async fn execute(
        store: &Storage,
        ranker: &crate::search::HybridRanker<'_>,
        plan: &PlannedQuery,
        query_embedding: Option<&[f32]>,
    ) -> Result<Vec<Entry>> {
        match plan.strategy {
            Strategy::Auto => {
                let query = plan.search_query.as_deref().unwrap_or_default();
                let response = ranker.search(
                    query,
                    &Default::default(),
                    10,
                    false,
                    query_embedding,
                )?;
                let mut results: Vec<Entry> = response.results.into_iter().map(|h| h.entry).collect();
                let mut seen: std::collections::HashSet<String> =
                    results.iter().map(|e| e.id.clone()).collect();
                let originals: Vec<String> = results.iter().map(|e| e.id.clone()).collect();
                for id in originals {
                    for neighbour in queries::neighbors(store, &id, AUTO_STRATEGY_FANOUT_CAP)? {
                        if neighbour.node.node_id.starts_with("kb-") && seen.insert(neighbour.node.node_id.clone()) {
                            if let Some(entry) = store.get_entry(&neighbour.node.node_id)? {
                                if entry.is_active {
                                    results.push(entry);
                                }
                            }
                        }
                    }
                }
                Ok(results)
            }
            Strategy::DecisionTrace => {
                let query = plan.search_query.as_deref().unwrap_or_default();
                let candidates = store.fts_search(query, None, Some("decision"), None, 10)?;
                let ids: Vec<String> = candidates.into_iter().map(|(id, _)| id).collect();
                let mut results = Vec::new();
                let mut seen = std::collections::HashSet::new();
                for id in &ids {
                    for link in queries::supersedes_chain(store, id)? {
                        if seen.insert(link.entry_id.clone()) {
                            if let Some(entry) = store.get_entry(&link.entry_id)? {
                                results.push(entry);
                            }
                        }
                    }
                }
                Ok(results)
            }
            Strategy::Timeline => {
                let scope = plan.scope.as_deref().unwrap_or_default();
                let mut entries = queries::entries_for_scope(store, scope)?;
                entries.sort_by_key(|e| e.created_at);
                Ok(entries)
            }
            Strategy::Related => {
                let target = plan.target.as_deref().unwrap_or_default();
                let hits = queries::bfs_entries(store, target, 2)?;
                let mut results = Vec::new();
                for hit in hits {
                    if let Some(entry) = store.get_entry(&hit.entry_id)? {
                        if entry.is_active {
                            results.push(entry);
                        }
                    }
                }
                Ok(results)
            }
            Strategy::Connection => {
                let a = plan.scope.as_deref().unwrap_or_default();
                let b = plan.target.as_deref().unwrap_or_default();
                let Some(path) = queries::find_path(store, a, b, 4)? else {
                    return Ok(Vec::new());
                };
                let mut results = Vec::new();
                for step in path {
                    for id in [&step.source, &step.target] {
                        if id.starts_with("kb-") {
                            if let Some(entry) = store.get_entry(id)? {
                                if entry.is_active && !results.iter().any(|e: &Entry| &e.id == id) {
                                    results.push(entry);
                                }
                            }
                        }
                    }
                }
                Ok(results)
            }
        }
    }
}

const PLANNER_SYSTEM_PROMPT: &str = "You route knowledge-base questions to a retrieval \
strategy. Respond with a single JSON object only.";

fn build_prompt(question: &str, vocabulary: &HashMap<String, Vec<String>>, stats: &GraphStats) -> String {
    let vocabulary_json = Json::Object(
        vocabulary
            .iter()
            .map(|(k, v)| (k.clone(), Json::Array(v.iter().map(|id| Json::String(id.clone())).collect())))
            .collect(),
    );
    format!(
        "Question: {question}\n\nStrategies: auto, decision_trace, timeline, related, connection.\n\
         Graph vocabulary: {vocabulary_json}\nActive entries: {active}\n\n\
         Respond with {{\"strategy\":...,\"scope\":...,\"target\":...,\"search_query\":...,\"reasoning\":...}}.",
        active = stats.active_entry_count,
    )
}
