//! Exercises the two-tier knowledge graph: deterministic edges wired by
//! the builder on every store, and traversal via the query planner's
//! strategies.

use kbase_e2e_tests::harness::db_manager::{make_entry, TestDatabaseManager};
use kbase_e2e_tests::mocks::fixtures::TestEntryFactory;

#[tokio::test]
async fn storing_a_supersedes_hint_wires_both_directions() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestEntryFactory::create_graph_scenario(&db.server).await;

    let original_id = scenario.metadata["original"].clone();
    let superseding_id = scenario.metadata["superseding"].clone();

    let outgoing = db.server.store_handle().outgoing_edges(&superseding_id).unwrap();
    assert!(outgoing.iter().any(|e| e.edge_type == "supersedes" && e.target_id == original_id));

    let incoming = db.server.store_handle().incoming_edges(&original_id).unwrap();
    assert!(incoming.iter().any(|e| e.edge_type == "supersedes" && e.source_id == superseding_id));
}

#[tokio::test]
async fn references_to_an_entry_id_in_the_body_are_picked_up() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestEntryFactory::create_graph_scenario(&db.server).await;

    let reference_id = scenario.metadata["reference"].clone();
    let superseding_id = scenario.metadata["superseding"].clone();

    let outgoing = db.server.store_handle().outgoing_edges(&reference_id).unwrap();
    assert!(outgoing.iter().any(|e| e.edge_type == "references" && e.target_id == superseding_id));
}

#[tokio::test]
async fn ask_decision_trace_follows_the_supersedes_chain() {
    let db = TestDatabaseManager::new_temp();
    let scenario = TestEntryFactory::create_graph_scenario(&db.server).await;
    let superseding_id = scenario.metadata["superseding"].clone();

    let entries = db
        .server
        .ask(
            "what is the history of this decision?",
            "decision_trace",
            None,
            Some(superseding_id.clone()),
        )
        .await
        .unwrap();

    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    assert!(ids.contains(&scenario.metadata["original"].as_str()));
    assert!(ids.contains(&superseding_id.as_str()));
}

#[tokio::test]
async fn ask_related_resolves_a_tag_scope() {
    let db = TestDatabaseManager::new_temp();
    let mut fields = make_entry("tagged", "Tagged entry", "An entry with a distinctive tag.", "factual_reference");
    fields.tags = vec!["onboarding".to_string()];
    let entry = db.server.store(fields).await.unwrap();

    let entries = db
        .server
        .ask("what do we know about onboarding?", "related", Some("tag:onboarding".to_string()), None)
        .await
        .unwrap();

    assert!(entries.iter().any(|e| e.id == entry.id));
}

#[tokio::test]
async fn hints_related_entities_wire_related_to_edges() {
    let db = TestDatabaseManager::new_temp();
    let target = db
        .server
        .store(make_entry("target", "Target entry", "Referenced by name elsewhere.", "factual_reference"))
        .await
        .unwrap();

    let mut fields = make_entry("source", "Source entry", "Mentions the target by id via a hint.", "factual_reference");
    fields.hints = serde_json::json!({ "related_entities": [target.id] });
    let source = db.server.store(fields).await.unwrap();

    let outgoing = db.server.store_handle().outgoing_edges(&source.id).unwrap();
    assert!(outgoing.iter().any(|e| e.edge_type == "related_to" && e.target_id == target.id));
}
