//! `KnowledgeServer`: wires [`Storage`], the embedding client, the two LLM
//! providers, the hybrid ranker, and the two-tier graph into the six
//! operations of SPEC_FULL.md §6. Every other module in this crate is a
//! pure function or a thin wrapper over `Storage`; this is the one place
//! that sequences them the way §5 specifies: entry commit → embed →
//! vector write → deterministic graph → LLM enrichment, with each step
//! after the first isolated so a degraded dependency never fails the
//! call.

use std::sync::Arc;

use tracing::warn;

use crate::embeddings::EmbeddingClient;
use crate::error::{Result, StoreError};
use crate::graph::{GraphBuilder, GraphEnricher, PlannedQuery, QueryPlanner, Strategy};
use crate::llm::LlmProvider;
use crate::model::{Entry, NewEntry, SearchFilters, SearchResponse};
use crate::search::HybridRanker;
use crate::store::Storage;

/// Hard cap on `store_batch` (§6: "Batch limits are hard caps, not defaults").
pub const STORE_BATCH_LIMIT: usize = 10;
/// Hard cap on `get`.
pub const GET_BATCH_LIMIT: usize = 20;

/// The server context named in §9's "Global mutable state" note: the
/// availability caches live inside the embedder/LLM implementations
/// themselves (not here), but every handler reaches them only through
/// this struct's fields rather than an ambient global.
pub struct KnowledgeServer {
    store: Arc<Storage>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    extraction_llm: Arc<dyn LlmProvider>,
    query_llm: Arc<dyn LlmProvider>,
    enricher: GraphEnricher,
}

impl KnowledgeServer {
    pub fn new(
        store: Arc<Storage>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        extraction_llm: Arc<dyn LlmProvider>,
        query_llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            extraction_llm,
            query_llm,
            enricher: GraphEnricher::default(),
        }
    }

    pub fn store_handle(&self) -> &Storage {
        &self.store
    }

    /// `store` tool (§6). The entry is durable and returned to the caller
    /// after the first step commits, regardless of what happens next.
    pub async fn store(&self, fields: NewEntry) -> Result<Entry> {
        let entry = self.store.create_entry(fields)?;
        self.run_post_write_pipeline(&entry).await;
        Ok(self.store.get_entry(&entry.id)?.unwrap_or(entry))
    }

    /// `store_batch` tool (§6). Up to [`STORE_BATCH_LIMIT`] entries; each
    /// goes through the same pipeline as a single `store` call, in order,
    /// yielding between entries (§5c).
    pub async fn store_batch(&self, items: Vec<NewEntry>) -> Result<Vec<Entry>> {
        if items.len() > STORE_BATCH_LIMIT {
            return Err(StoreError::Validation(format!(
                "store_batch accepts at most {STORE_BATCH_LIMIT} entries, got {}",
                items.len()
            )));
        }
        let mut created = Vec::with_capacity(items.len());
        for fields in items {
            created.push(self.store(fields).await?);
        }
        Ok(created)
    }

    /// Steps 2-4 of §5's ordering guarantee. Every failure here is logged
    /// and absorbed; the entry committed in step 1 is never rolled back.
    async fn run_post_write_pipeline(&self, entry: &Entry) {
        if let Some(embedder) = &self.embedder {
            match embedder.embed(&entry.embedding_text()).await {
                Some(vector) => {
                    if let Err(e) = self.store.upsert_embedding(&entry.id, &vector) {
                        warn!(entry_id = %entry.id, error = %e, "vector write failed");
                    }
                }
                None => {
                    warn!(entry_id = %entry.id, "embedder unavailable, entry stored without embedding");
                }
            }
        }

        if let Err(e) = GraphBuilder::rebuild(&self.store, entry) {
            warn!(entry_id = %entry.id, error = %e, "deterministic graph build failed");
        }

        self.enricher
            .enrich(&self.store, self.extraction_llm.as_ref(), entry)
            .await;
    }

    /// `search` tool (§6, §4.6). Embeds the query when the embedder is
    /// available; degrades to FTS-only otherwise.
    pub async fn search(
        &self,
        query: &str,
        filters: SearchFilters,
        limit: usize,
        include_stale: bool,
    ) -> Result<SearchResponse> {
        let query_embedding = match &self.embedder {
            Some(embedder) if embedder.is_available().await => embedder.embed(query).await,
            _ => None,
        };
        let ranker = HybridRanker::new(&self.store);
        ranker.search(query, &filters, limit, include_stale, query_embedding.as_deref())
    }

    /// `get` tool (§6, §4.1). The only path that touches `last_accessed`.
    pub fn get(&self, ids: &[String]) -> Result<Vec<Entry>> {
        if ids.len() > GET_BATCH_LIMIT {
            return Err(StoreError::Validation(format!(
                "get accepts at most {GET_BATCH_LIMIT} ids, got {}",
                ids.len()
            )));
        }
        let entries = self.store.get_entries(ids, false)?;
        let found: Vec<String> = entries.iter().map(|e| e.id.clone()).collect();
        self.store.touch_accessed(&found)?;
        Ok(entries)
    }

    /// `ask` tool (§6, §4.10). `strategy` defaults to `"auto"`, in which
    /// case the query planner is consulted (and falls back to `auto` on
    /// its own if no query LLM is configured); any other named strategy
    /// is dispatched directly with the caller-supplied scope/target.
    /// Embeds `question` when the embedder is available, mirroring
    /// `search`, so the `auto` strategy's hybrid search is never
    /// silently keyword-only.
    pub async fn ask(
        &self,
        question: &str,
        strategy: &str,
        scope: Option<String>,
        target: Option<String>,
    ) -> Result<Vec<Entry>> {
        let query_embedding = match &self.embedder {
            Some(embedder) if embedder.is_available().await => embedder.embed(question).await,
            _ => None,
        };
        let plan = if strategy == "auto" {
            QueryPlanner::plan(&self.store, self.query_llm.as_ref(), question).await?
        } else {
            let parsed = Strategy::parse(strategy)
                .ok_or_else(|| StoreError::Validation(format!("unknown strategy: {strategy}")))?;
            PlannedQuery {
                strategy: parsed,
                scope,
                target,
                search_query: Some(question.to_string()),
            }
        };
        let ranker = HybridRanker::new(&self.store);
        QueryPlanner::execute(&self.store, &ranker, &plan, query_embedding.as_deref()).await
    }

    /// `summarize` tool (§6). Answer-synthesis *prompting* is an external
    /// collaborator's concern per §1 — this is the minimal degrade-to-raw
    /// wrapper: run `ask` in auto mode, then ask the query LLM (if any)
    /// to turn the result set into prose, falling back to a raw listing.
    pub async fn summarize(&self, question: &str) -> Result<String> {
        let entries = self.ask(question, "auto", None, None).await?;
        if entries.is_empty() {
            return Ok("No matching knowledge base entries found.".to_string());
        }
        if self.query_llm.is_available().await {
            if let Some(text) = self
                .query_llm
                .generate(&build_summary_prompt(question, &entries), Some(SUMMARY_SYSTEM_PROMPT))
                .await
            {
                return Ok(text);
            }
        }
        Ok(raw_listing(&entries))
    }
}

const SUMMARY_SYSTEM_PROMPT: &str =
    "Answer the question using only the supplied knowledge base entries. Be concise.";

fn build_summary_prompt(question: &str, entries: &[Entry]) -> String {
    let mut prompt = format!("Question: {question}\n\nEntries:\n");
    for entry in entries {
        prompt.push_str(&format!(
            "- [{}] {}: {}\n",
            entry.id, entry.long_title, entry.details
        ));
    }
    prompt
}

fn raw_listing(entries: &[Entry]) -> String {
    entries
        .iter()
        .map(|e| format!("[{}] {}: {}", e.id, e.long_title, e.details))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::NullLlm;
    use crate::model::NewEntry;

    fn server() -> KnowledgeServer {
        let store = Arc::new(Storage::open_in_memory(8).unwrap());
        KnowledgeServer::new(store, None, Arc::new(NullLlm), Arc::new(NullLlm))
    }

    fn entry_fields(title: &str) -> NewEntry {
        NewEntry {
            short_title: title.to_string(),
            long_title: format!("{title} long"),
            details: format!("details about {title}"),
            entry_type: "factual_reference".to_string(),
            tags: vec![],
            project_ref: None,
            hints: serde_json::Value::Null,
            base_confidence: None,
        }
    }

    #[tokio::test]
    async fn store_then_get_round_trips_and_touches_accessed() {
        let server = server();
        let entry = server.store(entry_fields("widget")).await.unwrap();
        let fetched = server.get(&[entry.id.clone()]).unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].short_title, "widget");
    }

    #[tokio::test]
    async fn store_batch_rejects_over_limit() {
        let server = server();
        let items: Vec<NewEntry> = (0..11).map(|i| entry_fields(&format!("e{i}"))).collect();
        let err = server.store_batch(items).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn get_rejects_over_limit() {
        let server = server();
        let ids: Vec<String> = (0..21).map(|i| format!("kb-{i:05}")).collect();
        let err = server.get(&ids).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn search_without_embedder_falls_back_to_fts() {
        let server = server();
        server.store(entry_fields("searchable")).await.unwrap();
        let response = server
            .search("searchable", SearchFilters::default(), 10, false)
            .await
            .unwrap();
        assert_eq!(response.results.len(), 1);
    }

    #[tokio::test]
    async fn ask_with_explicit_unknown_strategy_is_rejected() {
        let server = server();
        let err = server.ask("question", "not_a_strategy", None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[tokio::test]
    async fn summarize_with_no_matches_says_so() {
        let server = server();
        let text = server.summarize("nothing will match this").await.unwrap();
        assert_eq!(text, "No matching knowledge base entries found.");
    }

    #[tokio::test]
    async fn summarize_falls_back_to_raw_listing_without_query_llm() {
        let server = server();
        server.store(entry_fields("rust")).await.unwrap();
        let text = server.summarize("rust").await.unwrap();
        assert!(text.contains("kb-00001"));
    }
}
