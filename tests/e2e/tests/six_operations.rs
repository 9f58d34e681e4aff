//! End-to-end coverage of the six operations a caller actually has:
//! `store`, `store_batch`, `search`, `get`, `ask`, `summarize`.

use kbase_core::model::SearchFilters;
use kbase_e2e_tests::harness::db_manager::{make_entry, TestDatabaseManager};
use kbase_e2e_tests::mocks::fixtures::{BatchConfig, TestEntryFactory};

#[tokio::test]
async fn store_persists_and_is_retrievable_by_get() {
    let db = TestDatabaseManager::new_temp();
    let entry = db
        .server
        .store(make_entry(
            "short",
            "A long title",
            "Some details worth remembering.",
            "factual_reference",
        ))
        .await
        .unwrap();

    assert!(entry.id.starts_with("kb-"));

    let fetched = db.server.get(&[entry.id.clone()]).unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].details, "Some details worth remembering.");
}

#[tokio::test]
async fn store_batch_rejects_over_ten_entries() {
    let db = TestDatabaseManager::new_temp();
    let items: Vec<_> = (0..11)
        .map(|i| make_entry(&format!("e{i}"), &format!("e{i}"), "x", "factual_reference"))
        .collect();
    assert!(db.server.store_batch(items).await.is_err());
}

#[tokio::test]
async fn store_batch_of_ten_all_succeed_and_are_gettable() {
    let db = TestDatabaseManager::new_temp();
    let items: Vec<_> = (0..10)
        .map(|i| make_entry(&format!("e{i}"), &format!("e{i}"), &format!("details {i}"), "factual_reference"))
        .collect();
    let created = db.server.store_batch(items).await.unwrap();
    assert_eq!(created.len(), 10);

    let ids: Vec<String> = created.iter().map(|e| e.id.clone()).collect();
    let fetched = db.server.get(&ids).unwrap();
    assert_eq!(fetched.len(), 10);
}

#[tokio::test]
async fn get_rejects_over_twenty_ids() {
    let db = TestDatabaseManager::new_temp();
    let ids: Vec<String> = (0..21).map(|i| format!("kb-{i:05}")).collect();
    assert!(db.server.get(&ids).is_err());
}

#[tokio::test]
async fn get_touches_last_accessed() {
    let db = TestDatabaseManager::new_temp();
    let entry = db
        .server
        .store(make_entry("t", "t", "body", "factual_reference"))
        .await
        .unwrap();
    let before = db.server.get(&[entry.id.clone()]).unwrap()[0].last_accessed;

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let after = db.server.get(&[entry.id.clone()]).unwrap()[0].last_accessed;

    assert!(after >= before);
}

#[tokio::test]
async fn search_finds_entries_by_keyword_without_an_embedder() {
    let db = TestDatabaseManager::new_temp();
    TestEntryFactory::create_search_scenario(&db.server).await;

    let response = db
        .server
        .search("pasta", SearchFilters::default(), 10, false)
        .await
        .unwrap();

    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].entry.details.contains("pasta"));
}

#[tokio::test]
async fn search_respects_entry_type_filter() {
    let db = TestDatabaseManager::new_temp();
    TestEntryFactory::create_batch(
        &db.server,
        BatchConfig {
            count: 3,
            entry_type: "decision".to_string(),
            content_prefix: "architecture choice".to_string(),
            tags: vec![],
        },
    )
    .await;
    TestEntryFactory::create_batch(
        &db.server,
        BatchConfig {
            count: 3,
            entry_type: "factual_reference".to_string(),
            content_prefix: "architecture choice".to_string(),
            tags: vec![],
        },
    )
    .await;

    let filters = SearchFilters {
        entry_type: Some("decision".to_string()),
        ..Default::default()
    };
    let response = db.server.search("architecture", filters, 10, false).await.unwrap();

    assert_eq!(response.results.len(), 3);
    assert!(response
        .results
        .iter()
        .all(|hit| hit.entry.entry_type.as_str() == "decision"));
}

#[tokio::test]
async fn ask_with_unknown_strategy_is_rejected() {
    let db = TestDatabaseManager::new_temp();
    let err = db.server.ask("what happened?", "not_a_real_strategy", None, None).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn ask_auto_falls_back_to_keyword_search_without_a_query_llm() {
    let db = TestDatabaseManager::new_temp();
    TestEntryFactory::create_search_scenario(&db.server).await;

    let entries = db.server.ask("pasta", "auto", None, None).await.unwrap();
    assert!(entries.iter().any(|e| e.details.contains("pasta")));
}

#[tokio::test]
async fn summarize_reports_no_matches_plainly() {
    let db = TestDatabaseManager::new_temp();
    let answer = db.server.summarize("anything at all, nothing is stored").await.unwrap();
    assert_eq!(answer, "No matching knowledge base entries found.");
}

#[tokio::test]
async fn summarize_degrades_to_a_raw_listing_without_a_query_llm() {
    let db = TestDatabaseManager::new_temp();
    let entry = db
        .server
        .store(make_entry("rust", "Rust ownership", "Rust ownership prevents data races.", "factual_reference"))
        .await
        .unwrap();

    let answer = db.server.summarize("rust ownership").await.unwrap();
    assert!(answer.contains(&entry.id));
}
