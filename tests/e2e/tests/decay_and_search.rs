//! Confidence decay as seen through the `search` operation: entries are
//! created with an explicit `base_confidence` so effects are visible
//! immediately, without waiting out a half-life.

use kbase_core::decay::{FILTER_THRESHOLD, WARN_THRESHOLD};
use kbase_core::model::{EntryType, NewEntry, SearchFilters};
use kbase_e2e_tests::harness::db_manager::{make_entry, TestDatabaseManager};

fn with_confidence(base: f32) -> NewEntry {
    let mut fields = make_entry("conf", "Confidence entry", "decayable content about gravel roads", "factual_reference");
    fields.base_confidence = Some(base);
    fields
}

#[tokio::test]
async fn search_excludes_entries_below_filter_threshold_by_default() {
    let db = TestDatabaseManager::new_temp();
    db.server.store(with_confidence(FILTER_THRESHOLD - 0.05)).await.unwrap();

    let response = db.server.search("gravel", SearchFilters::default(), 10, false).await.unwrap();
    assert!(response.results.is_empty());
}

#[tokio::test]
async fn search_includes_stale_entries_when_asked() {
    let db = TestDatabaseManager::new_temp();
    db.server.store(with_confidence(FILTER_THRESHOLD - 0.05)).await.unwrap();

    let response = db.server.search("gravel", SearchFilters::default(), 10, true).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].effective_confidence < FILTER_THRESHOLD);
}

#[tokio::test]
async fn search_flags_entries_between_filter_and_warn_thresholds() {
    let db = TestDatabaseManager::new_temp();
    let midpoint = (FILTER_THRESHOLD + WARN_THRESHOLD) / 2.0;
    db.server.store(with_confidence(midpoint)).await.unwrap();

    let response = db.server.search("gravel", SearchFilters::default(), 10, false).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(response.results[0].staleness_warning);
}

#[tokio::test]
async fn search_does_not_flag_high_confidence_entries() {
    let db = TestDatabaseManager::new_temp();
    db.server.store(with_confidence(0.95)).await.unwrap();

    let response = db.server.search("gravel", SearchFilters::default(), 10, false).await.unwrap();
    assert_eq!(response.results.len(), 1);
    assert!(!response.results[0].staleness_warning);
}

#[tokio::test]
async fn decision_entries_decay_slower_than_factual_references_at_equal_confidence() {
    let db = TestDatabaseManager::new_temp();

    let mut decision = make_entry("d", "Decision", "matching query text here", "decision");
    decision.base_confidence = Some(0.6);
    let mut factual = make_entry("f", "Fact", "matching query text here too", "factual_reference");
    factual.base_confidence = Some(0.6);

    db.server.store(decision).await.unwrap();
    db.server.store(factual).await.unwrap();

    // At creation time (age ~0) both are still at their base confidence;
    // the half-life only matters once time has passed. This asserts the
    // invariant that governs that future divergence: decision's half-life
    // must exceed factual_reference's.
    assert!(EntryType::Decision.half_life_days() > EntryType::FactualReference.half_life_days());
}
