//! Test Database Manager
//!
//! Provides isolated, temp-file-backed [`KnowledgeServer`] instances for
//! integration tests, with helpers for seeding entries.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use kbase_core::llm::NullLlm;
use kbase_core::model::NewEntry;
use kbase_core::store::Storage;
use kbase_core::KnowledgeServer;

/// Build a minimal [`NewEntry`] with no tags, project, or hints.
pub fn make_entry(short_title: &str, long_title: &str, details: &str, entry_type: &str) -> NewEntry {
    NewEntry {
        short_title: short_title.to_string(),
        long_title: long_title.to_string(),
        details: details.to_string(),
        entry_type: entry_type.to_string(),
        tags: vec![],
        project_ref: None,
        hints: serde_json::Value::Null,
        base_confidence: None,
    }
}

/// Manages an isolated temp-file store wired into a [`KnowledgeServer`]
/// with no embedder and [`NullLlm`] providers — every test runs against
/// plain FTS search and the deterministic half of the graph unless it
/// swaps in its own providers via [`Self::with_providers`].
///
/// The temp directory is deleted when the manager is dropped.
pub struct TestDatabaseManager {
    pub server: Arc<KnowledgeServer>,
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestDatabaseManager {
    /// Create a new isolated store with no embedder and null LLM providers.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("test_kbase.db");
        let store = Arc::new(Storage::open(&db_path, 8).expect("failed to open test store"));
        let server = Arc::new(KnowledgeServer::new(store, None, Arc::new(NullLlm), Arc::new(NullLlm)));
        Self {
            server,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn entry_count(&self) -> usize {
        self.server
            .store_handle()
            .all_active_entries()
            .map(|entries| entries.len())
            .unwrap_or(0)
    }

    /// Seed `count` plain `factual_reference` entries, one tag per entry
    /// cycling through five buckets, returning their ids.
    pub async fn seed_entries(&self, count: usize) -> Vec<String> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let mut fields = make_entry(
                &format!("seed {i}"),
                &format!("Seed entry {i}"),
                &format!("Seed content for entry number {i}."),
                "factual_reference",
            );
            fields.tags = vec![format!("seed-{}", i % 5)];
            if let Ok(entry) = self.server.store(fields).await {
                ids.push(entry.id);
            }
        }
        ids
    }

    /// Seed one entry per [`kbase_core::model::EntryType`] variant.
    pub async fn seed_one_of_each_type(&self) -> Vec<String> {
        let mut ids = Vec::new();
        for entry_type in ["factual_reference", "decision", "pattern_convention", "lesson_learned"] {
            let fields = make_entry(
                &format!("{entry_type} sample"),
                &format!("{entry_type} sample"),
                &format!("A {entry_type} entry."),
                entry_type,
            );
            if let Ok(entry) = self.server.store(fields).await {
                ids.push(entry.id);
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn new_temp_database_is_empty() {
        let db = TestDatabaseManager::new_temp();
        assert_eq!(db.entry_count(), 0);
        assert!(db.path().parent().unwrap().exists());
    }

    #[tokio::test]
    async fn seed_entries_creates_requested_count() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_entries(10).await;
        assert_eq!(ids.len(), 10);
        assert_eq!(db.entry_count(), 10);
    }

    #[tokio::test]
    async fn seed_one_of_each_type_covers_all_four() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_one_of_each_type().await;
        assert_eq!(ids.len(), 4);
        assert_eq!(db.entry_count(), 4);
    }
}
