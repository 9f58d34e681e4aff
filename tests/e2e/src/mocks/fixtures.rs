//! Entry fixtures: single entries, batches, and scenarios exercising
//! decay, search, and graph traversal.

use std::collections::HashMap;

use kbase_core::model::NewEntry;
use kbase_core::KnowledgeServer;

use crate::harness::db_manager::make_entry;

pub struct TestEntryFactory;

/// Configuration for [`TestEntryFactory::create_batch`].
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub count: usize,
    pub entry_type: String,
    pub content_prefix: String,
    pub tags: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            entry_type: "factual_reference".to_string(),
            content_prefix: "test entry".to_string(),
            tags: vec![],
        }
    }
}

/// A named group of related entries created for a specific test, with
/// metadata keys so the test can look up individual entries by role
/// (e.g. `"original"`, `"superseding"`) rather than by index.
#[derive(Debug)]
pub struct TestScenario {
    pub entry_ids: Vec<String>,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

impl TestEntryFactory {
    pub async fn create_batch(server: &KnowledgeServer, config: BatchConfig) -> Vec<String> {
        let mut ids = Vec::with_capacity(config.count);
        for i in 0..config.count {
            let mut fields = make_entry(
                &format!("{} {i}", config.content_prefix),
                &format!("{} {i}", config.content_prefix),
                &format!("{} number {i} body text.", config.content_prefix),
                &config.entry_type,
            );
            fields.tags = config.tags.clone();
            if let Ok(entry) = server.store(fields).await {
                ids.push(entry.id);
            }
        }
        ids
    }

    /// One entry per entry type, to exercise every confidence half-life
    /// (90d / 365d / 730d / 1825d) in the same scenario.
    pub async fn create_decay_scenario(server: &KnowledgeServer) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = HashMap::new();
        for entry_type in ["factual_reference", "decision", "pattern_convention", "lesson_learned"] {
            let fields = make_entry(
                &format!("{entry_type} sample"),
                &format!("{entry_type} sample"),
                &format!("A {entry_type} entry used to exercise its confidence half-life."),
                entry_type,
            );
            if let Ok(entry) = server.store(fields).await {
                metadata.insert(entry_type.to_string(), entry.id.clone());
                ids.push(entry.id);
            }
        }
        TestScenario {
            entry_ids: ids,
            description: "one entry per type, for decay half-life tests".to_string(),
            metadata,
        }
    }

    /// Two topic clusters with no vocabulary overlap, for search
    /// precision tests.
    pub async fn create_search_scenario(server: &KnowledgeServer) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = HashMap::new();

        let programming = [
            "Rust uses ownership and borrowing to guarantee memory safety without a garbage collector.",
            "Python is widely used for data science and machine learning pipelines.",
            "JavaScript runs in web browsers and, via Node.js, on servers.",
        ];
        for (i, details) in programming.iter().enumerate() {
            let fields = make_entry(&format!("programming fact {i}"), &format!("Programming fact {i}"), details, "factual_reference");
            if let Ok(entry) = server.store(fields).await {
                ids.push(entry.id);
            }
        }
        metadata.insert("programming_count".to_string(), programming.len().to_string());

        let cooking = [
            "To make pasta, boil salted water and cook until al dente.",
            "A basic chocolate cake needs cocoa powder, eggs, flour, and sugar.",
        ];
        for (i, details) in cooking.iter().enumerate() {
            let fields = make_entry(&format!("recipe {i}"), &format!("Recipe {i}"), details, "factual_reference");
            if let Ok(entry) = server.store(fields).await {
                ids.push(entry.id);
            }
        }
        metadata.insert("recipe_count".to_string(), cooking.len().to_string());

        TestScenario {
            entry_ids: ids,
            description: "topic-clustered entries for search precision".to_string(),
            metadata,
        }
    }

    /// A decision superseded by a later one, plus a third entry
    /// referencing the superseding entry's id — exercises the
    /// deterministic graph builder's supersedes/superseded_by/references
    /// edges and the `decision_trace`/`connection` strategies.
    pub async fn create_graph_scenario(server: &KnowledgeServer) -> TestScenario {
        let mut metadata = HashMap::new();

        let original = server
            .store(make_entry(
                "original decision",
                "Use REST for the public API",
                "We chose REST over GraphQL for the public API because client tooling was more mature at the time.",
                "decision",
            ))
            .await
            .expect("store original decision");

        let mut superseding_fields = make_entry(
            "revised decision",
            "Use GraphQL for the public API",
            &format!(
                "We moved the public API to GraphQL once client tooling matured; see {} for the original rationale.",
                original.id
            ),
            "decision",
        );
        superseding_fields.hints = serde_json::json!({ "supersedes": [original.id] });
        let superseding = server
            .store(superseding_fields)
            .await
            .expect("store superseding decision");

        let reference = server
            .store(make_entry(
                "api migration note",
                "API migration note",
                &format!(
                    "Clients migrating from REST to GraphQL should read {} for the rationale.",
                    superseding.id
                ),
                "factual_reference",
            ))
            .await
            .expect("store reference entry");

        metadata.insert("original".to_string(), original.id.clone());
        metadata.insert("superseding".to_string(), superseding.id.clone());
        metadata.insert("reference".to_string(), reference.id.clone());

        TestScenario {
            entry_ids: vec![original.id, superseding.id, reference.id],
            description: "supersedes chain plus a referencing entry".to_string(),
            metadata,
        }
    }
}

#[allow(dead_code)]
fn _assert_new_entry_shape(_e: &NewEntry) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::db_manager::TestDatabaseManager;

    #[tokio::test]
    async fn create_batch_respects_count() {
        let db = TestDatabaseManager::new_temp();
        let ids = TestEntryFactory::create_batch(&db.server, BatchConfig { count: 7, ..Default::default() }).await;
        assert_eq!(ids.len(), 7);
        assert_eq!(db.entry_count(), 7);
    }

    #[tokio::test]
    async fn decay_scenario_covers_all_four_types() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestEntryFactory::create_decay_scenario(&db.server).await;
        assert_eq!(scenario.entry_ids.len(), 4);
        for t in ["factual_reference", "decision", "pattern_convention", "lesson_learned"] {
            assert!(scenario.metadata.contains_key(t));
        }
    }

    #[tokio::test]
    async fn search_scenario_splits_into_two_clusters() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestEntryFactory::create_search_scenario(&db.server).await;
        assert_eq!(scenario.metadata["programming_count"], "3");
        assert_eq!(scenario.metadata["recipe_count"], "2");
        assert_eq!(scenario.entry_ids.len(), 5);
    }

    #[tokio::test]
    async fn graph_scenario_wires_supersedes_chain() {
        let db = TestDatabaseManager::new_temp();
        let scenario = TestEntryFactory::create_graph_scenario(&db.server).await;
        assert_eq!(scenario.entry_ids.len(), 3);
        let original_id = &scenario.metadata["original"];
        let edges = db.server.store_handle().outgoing_edges(&scenario.metadata["superseding"]).unwrap();
        assert!(edges.iter().any(|e| e.edge_type == "supersedes" && &e.target_id == original_id));
    }
}
