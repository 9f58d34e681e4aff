//! `Storage`: the single-file store's typed data-access primitives (§4.1).
//!
//! One [`rusqlite::Connection`] behind a [`Mutex`] backs the whole store —
//! entries, their version history, the FTS index, the vector index, and
//! the graph tables all live in the one file. Non-goals per §1 exclude
//! multi-process writers, so a single connection guarded by a mutex is
//! sufficient; WAL mode is still enabled so external read-only tools
//! (backups, inspection) are never blocked by an in-flight write.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value as Json;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::model::{Entry, EntryPatch, EntryType, GraphEdge, GraphNode, NewEntry, VersionRecord};

use super::migrations::apply_migrations;

/// `kb-XXXXX`: five zero-padded digits.
fn format_entry_id(n: i64) -> String {
    format!("kb-{:05}", n)
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
    let entry_type_str: String = row.get("entry_type")?;
    let entry_type = EntryType::parse(&entry_type_str).unwrap_or(EntryType::FactualReference);
    let tags_str: String = row.get("tags")?;
    let hints_str: String = row.get("hints")?;
    Ok(Entry {
        id: row.get("id")?,
        short_title: row.get("short_title")?,
        long_title: row.get("long_title")?,
        details: row.get("details")?,
        entry_type,
        project_ref: row.get("project_ref")?,
        tags: tags_str
            .split_whitespace()
            .map(|s| s.to_string())
            .collect(),
        hints: serde_json::from_str(&hints_str).unwrap_or(Json::Object(Default::default())),
        base_confidence: row.get("base_confidence")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        last_accessed: row.get("last_accessed")?,
        is_active: row.get::<_, i64>("is_active")? != 0,
        has_embedding: row.get::<_, i64>("has_embedding")? != 0,
        version: row.get("version")?,
    })
}

const ENTRY_COLUMNS: &str = "id, short_title, long_title, details, entry_type, project_ref, \
    tags, hints, base_confidence, created_at, updated_at, last_accessed, is_active, \
    has_embedding, version";

pub struct Storage {
    conn: Mutex<Connection>,
    embedding_dim: usize,
}

impl Storage {
    /// Open (creating if absent) the single-file store at `path`, applying
    /// the WAL + foreign-key PRAGMAs and any pending migrations.
    pub fn open(path: &Path, embedding_dim: usize) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn)?;
        #[cfg(feature = "vector-search")]
        Self::load_vec_extension(&conn, embedding_dim)?;
        debug!(path = %path.display(), "store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    /// In-memory store, for tests.
    pub fn open_in_memory(embedding_dim: usize) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure_connection(&conn)?;
        apply_migrations(&conn)?;
        #[cfg(feature = "vector-search")]
        Self::load_vec_extension(&conn, embedding_dim)?;
        Ok(Self {
            conn: Mutex::new(conn),
            embedding_dim,
        })
    }

    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;
             PRAGMA page_size = 8192;",
        )?;
        Ok(())
    }

    #[cfg(feature = "vector-search")]
    fn load_vec_extension(conn: &Connection, dim: usize) -> Result<()> {
        unsafe {
            conn.load_extension_enable()?;
            let result = sqlite_vec::sqlite3_vec_init_from_connection(conn);
            conn.load_extension_disable()?;
            result.map_err(|e| StoreError::Corruption(format!("sqlite-vec init failed: {e}")))?;
        }
        conn.execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_vec USING vec0(
                entry_id TEXT PRIMARY KEY,
                embedding float[{dim}]
            );"
        ))?;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    // ------------------------------------------------------------------
    // Entries
    // ------------------------------------------------------------------

    /// Atomically read-and-increment `entry_id_seq`, returning `kb-XXXXX`.
    /// Must be called inside the same transaction as the subsequent insert.
    fn allocate_entry_id(conn: &Connection) -> Result<String> {
        conn.execute(
            "UPDATE entry_id_seq SET next_value = next_value + 1 WHERE id = 1",
            [],
        )?;
        let n: i64 = conn.query_row(
            "SELECT next_value - 1 FROM entry_id_seq WHERE id = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(format_entry_id(n))
    }

    /// Validate type/confidence, allocate an id, insert the entry row, and
    /// write version 1 ("Initial creation") — all inside one transaction.
    pub fn create_entry(&self, fields: NewEntry) -> Result<Entry> {
        let entry_type = EntryType::parse(&fields.entry_type)
            .ok_or_else(|| StoreError::Validation(format!("unknown entry_type: {}", fields.entry_type)))?;
        let confidence = fields.base_confidence.unwrap_or(0.9);
        if !(0.0..=1.0).contains(&confidence) {
            return Err(StoreError::Validation(format!(
                "base_confidence must be in [0,1], got {confidence}"
            )));
        }
        for tag in &fields.tags {
            if tag.chars().any(char::is_whitespace) {
                return Err(StoreError::Validation(format!(
                    "tag {tag:?} contains whitespace"
                )));
            }
        }

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let id = Self::allocate_entry_id(&tx)?;
        let now = Utc::now();
        let tags_joined = fields.tags.join(" ");
        let hints = if fields.hints.is_null() {
            Json::Object(Default::default())
        } else {
            fields.hints
        };

        tx.execute(
            "INSERT INTO knowledge_entries
                (id, short_title, long_title, details, entry_type, project_ref, tags, hints,
                 base_confidence, created_at, updated_at, last_accessed, is_active,
                 has_embedding, version)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10, 1, 0, 1)",
            params![
                id,
                fields.short_title,
                fields.long_title,
                fields.details,
                entry_type.as_str(),
                fields.project_ref,
                tags_joined,
                hints.to_string(),
                confidence,
                now,
            ],
        )?;

        tx.execute(
            "INSERT INTO entry_versions
                (entry_id, version_number, snapshot_of_details, snapshot_of_confidence,
                 change_reason, timestamp)
             VALUES (?1, 1, ?2, ?3, 'Initial creation', ?4)",
            params![id, fields.details, confidence, now],
        )?;

        tx.commit()?;
        drop(conn);
        debug!(id = %id, "entry created");
        self.get_entry(&id)?.ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Apply `patch`, bump `version`/`updated_at`, write the post-write
    /// version snapshot (open question #1 of SPEC_FULL.md §9: version N is
    /// the state *after* the Nth write), and clear `has_embedding` if the
    /// body changed.
    pub fn update_entry(&self, id: &str, patch: EntryPatch, reason: &str) -> Result<Entry> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM knowledge_entries WHERE id = ?1 AND is_active = 1"),
                params![id],
                row_to_entry,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if let Some(ref t) = patch.entry_type {
            if EntryType::parse(t).is_none() {
                return Err(StoreError::Validation(format!("unknown entry_type: {t}")));
            }
        }
        if let Some(c) = patch.base_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(StoreError::Validation(format!(
                    "base_confidence must be in [0,1], got {c}"
                )));
            }
        }

        let short_title = patch.short_title.unwrap_or(existing.short_title);
        let long_title = patch.long_title.unwrap_or(existing.long_title);
        let details = patch.details.unwrap_or(existing.details);
        let entry_type = patch
            .entry_type
            .as_deref()
            .and_then(EntryType::parse)
            .unwrap_or(existing.entry_type);
        let project_ref = patch.project_ref.or(existing.project_ref);
        let tags = patch.tags.unwrap_or(existing.tags);
        let hints = patch.hints.unwrap_or(existing.hints);
        let base_confidence = patch.base_confidence.unwrap_or(existing.base_confidence);
        let now = Utc::now();
        let new_version = existing.version + 1;
        let clears_embedding = patch.changes_body();

        tx.execute(
            "UPDATE knowledge_entries SET
                short_title = ?1, long_title = ?2, details = ?3, entry_type = ?4,
                project_ref = ?5, tags = ?6, hints = ?7, base_confidence = ?8,
                updated_at = ?9, version = ?10,
                has_embedding = CASE WHEN ?11 THEN 0 ELSE has_embedding END
             WHERE id = ?12",
            params![
                short_title,
                long_title,
                details,
                entry_type.as_str(),
                project_ref,
                tags.join(" "),
                hints.to_string(),
                base_confidence,
                now,
                new_version,
                clears_embedding,
                id,
            ],
        )?;

        if clears_embedding {
            tx.execute("DELETE FROM knowledge_vec WHERE entry_id = ?1", params![id])
                .or_else(|e| if Self::is_no_such_table(&e) { Ok(0) } else { Err(e) })?;
        }

        tx.execute(
            "INSERT INTO entry_versions
                (entry_id, version_number, snapshot_of_details, snapshot_of_confidence,
                 change_reason, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, new_version, details, base_confidence, reason, now],
        )?;

        tx.commit()?;
        drop(conn);
        self.get_entry(id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn is_no_such_table(e: &rusqlite::Error) -> bool {
        matches!(e, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("no such table"))
    }

    /// Soft delete: flips `is_active` to false. Invisible to search/`get`
    /// thereafter (§3 lifecycle).
    pub fn deactivate_entry(&self, id: &str) -> Result<()> {
        let conn = self.lock();
        let n = conn.execute(
            "UPDATE knowledge_entries SET is_active = 0 WHERE id = ?1",
            params![id],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Hard purge: removes the row (and its FTS shadow via trigger).
    pub fn purge_entry(&self, id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM knowledge_entries WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM knowledge_vec WHERE entry_id = ?1", params![id])
            .or_else(|e| if Self::is_no_such_table(&e) { Ok(0) } else { Err(e) })?;
        Ok(())
    }

    pub fn get_entry(&self, id: &str) -> Result<Option<Entry>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM knowledge_entries WHERE id = ?1"),
            params![id],
            row_to_entry,
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Skips inactive entries unless `include_inactive`. Order mirrors
    /// `ids` where possible.
    pub fn get_entries(&self, ids: &[String], include_inactive: bool) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let mut by_id = std::collections::HashMap::new();
        for id in ids {
            let row: Option<Entry> = conn
                .query_row(
                    &format!("SELECT {ENTRY_COLUMNS} FROM knowledge_entries WHERE id = ?1"),
                    params![id],
                    row_to_entry,
                )
                .optional()?;
            if let Some(entry) = row {
                if entry.is_active || include_inactive {
                    by_id.insert(entry.id.clone(), entry);
                }
            }
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Batch-sets `last_accessed = now`. Invoked only on explicit
    /// retrieval (`kb_get`), never on search (§4.1, §4.5).
    pub fn touch_accessed(&self, ids: &[String]) -> Result<()> {
        let conn = self.lock();
        let now = Utc::now();
        for id in ids {
            conn.execute(
                "UPDATE knowledge_entries SET last_accessed = ?1 WHERE id = ?2 AND is_active = 1",
                params![now, id],
            )?;
        }
        Ok(())
    }

    pub fn get_version_history(&self, entry_id: &str) -> Result<Vec<VersionRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entry_id, version_number, snapshot_of_details, snapshot_of_confidence,
                    change_reason, timestamp
             FROM entry_versions WHERE entry_id = ?1 ORDER BY version_number ASC",
        )?;
        let rows = stmt
            .query_map(params![entry_id], |row| {
                Ok(VersionRecord {
                    entry_id: row.get(0)?,
                    version_number: row.get(1)?,
                    snapshot_of_details: row.get(2)?,
                    snapshot_of_confidence: row.get(3)?,
                    change_reason: row.get(4)?,
                    timestamp: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // FTS search (§4.2)
    // ------------------------------------------------------------------

    /// Split on whitespace, quote each token (neutralises FTS5 operators
    /// like `:`/`-`/`(`), join with spaces for an implicit AND.
    pub fn sanitize_fts_query(raw: &str) -> String {
        raw.split_whitespace()
            .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// BM25-ranked candidates. Scores are negative; more negative is
    /// stronger, so callers sort ascending. `tag` filter is boundary-safe:
    /// both the stored `tags` column and the needle are padded with a
    /// leading/trailing space before a substring match.
    pub fn fts_search(
        &self,
        query: &str,
        project_ref: Option<&str>,
        entry_type: Option<&str>,
        tag: Option<&str>,
        limit: usize,
    ) -> Result<Vec<(String, f32)>> {
        let sanitized = Self::sanitize_fts_query(query);
        if sanitized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock();
        let mut sql = String::from(
            "SELECT e.id, bm25(knowledge_fts) AS score
             FROM knowledge_fts
             JOIN knowledge_entries e ON e.id = knowledge_fts.id
             WHERE knowledge_fts MATCH ?1 AND e.is_active = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(sanitized)];
        if let Some(p) = project_ref {
            sql.push_str(&format!(" AND e.project_ref = ?{}", args.len() + 1));
            args.push(Box::new(p.to_string()));
        }
        if let Some(t) = entry_type {
            sql.push_str(&format!(" AND e.entry_type = ?{}", args.len() + 1));
            args.push(Box::new(t.to_string()));
        }
        if let Some(tag) = tag {
            sql.push_str(&format!(
                " AND (' ' || e.tags || ' ') LIKE ?{}",
                args.len() + 1
            ));
            args.push(Box::new(format!("% {} %", tag)));
        }
        sql.push_str(&format!(
            " ORDER BY score ASC, e.id ASC LIMIT ?{}",
            args.len() + 1
        ));
        args.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f32>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Vector index (§4.3)
    // ------------------------------------------------------------------

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Delete-then-insert (the backing engine lacks conflict upsert).
    #[cfg(feature = "vector-search")]
    pub fn upsert_embedding(&self, entry_id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.embedding_dim {
            return Err(StoreError::Corruption(format!(
                "embedding dimension mismatch: expected {}, got {}",
                self.embedding_dim,
                vector.len()
            )));
        }
        let conn = self.lock();
        conn.execute(
            "DELETE FROM knowledge_vec WHERE entry_id = ?1",
            params![entry_id],
        )?;
        conn.execute(
            "INSERT INTO knowledge_vec (entry_id, embedding) VALUES (?1, ?2)",
            params![entry_id, pack_vector(vector)],
        )?;
        conn.execute(
            "UPDATE knowledge_entries SET has_embedding = 1 WHERE id = ?1",
            params![entry_id],
        )?;
        Ok(())
    }

    #[cfg(not(feature = "vector-search"))]
    pub fn upsert_embedding(&self, _entry_id: &str, _vector: &[f32]) -> Result<()> {
        Ok(())
    }

    /// KNN over the query vector, ascending by distance (backing engine's
    /// default metric — opaque to callers per §4.3, only rank order is
    /// consumed by the fusion step).
    #[cfg(feature = "vector-search")]
    pub fn vector_search(&self, query: &[f32], limit: usize) -> Result<Vec<(String, f32)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT entry_id, distance FROM knowledge_vec
             WHERE embedding MATCH ?1 AND k = ?2
             ORDER BY distance ASC, entry_id ASC",
        )?;
        let rows = stmt
            .query_map(params![pack_vector(query), limit as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f32>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    #[cfg(not(feature = "vector-search"))]
    pub fn vector_search(&self, _query: &[f32], _limit: usize) -> Result<Vec<(String, f32)>> {
        Ok(Vec::new())
    }

    // ------------------------------------------------------------------
    // Graph primitives (§4.1, §4.9)
    // ------------------------------------------------------------------

    /// Idempotent: inserting an existing `node_id` overwrites properties.
    pub fn upsert_node(&self, node_id: &str, node_type: &str, properties: &Json) -> Result<()> {
        let conn = self.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO graph_nodes (node_id, node_type, properties, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(node_id) DO UPDATE SET properties = excluded.properties",
            params![node_id, node_type, properties.to_string(), now],
        )?;
        Ok(())
    }

    pub fn get_node(&self, node_id: &str) -> Result<Option<GraphNode>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT node_id, node_type, properties, created_at FROM graph_nodes WHERE node_id = ?1",
            params![node_id],
            |row| {
                Ok(GraphNode {
                    node_id: row.get(0)?,
                    node_type: row.get(1)?,
                    properties: serde_json::from_str(&row.get::<_, String>(2)?)
                        .unwrap_or(Json::Null),
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(StoreError::from)
    }

    /// Duplicate `(source, target, edge_type)` inserts are no-ops.
    pub fn insert_edge(
        &self,
        source_id: &str,
        target_id: &str,
        edge_type: &str,
        properties: &Json,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO graph_edges (source_id, target_id, edge_type, properties)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_id, target_id, edge_type) DO NOTHING",
            params![source_id, target_id, edge_type, properties.to_string()],
        )?;
        Ok(())
    }

    /// Deletes outgoing edges from `source` whose properties do NOT carry
    /// `source=llm` when `keep_llm=true` (the deterministic builder's
    /// rebuild step, §4.7) — or, when `keep_llm=false`, only edges that DO
    /// carry it (the enricher's re-enrichment step, §4.8).
    pub fn clear_outgoing_edges(&self, source_id: &str, keep_llm: bool) -> Result<()> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT target_id, edge_type, properties FROM graph_edges WHERE source_id = ?1",
        )?;
        let rows: Vec<(String, String, String)> = stmt
            .query_map(params![source_id], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        for (target, edge_type, props) in rows {
            let is_llm = serde_json::from_str::<Json>(&props)
                .ok()
                .and_then(|v| v.get("source").and_then(|s| s.as_str().map(|s| s == "llm")))
                .unwrap_or(false);
            let should_delete = if keep_llm { !is_llm } else { is_llm };
            if should_delete {
                conn.execute(
                    "DELETE FROM graph_edges WHERE source_id = ?1 AND target_id = ?2 AND edge_type = ?3",
                    params![source_id, target, edge_type],
                )?;
            }
        }
        Ok(())
    }

    /// All edges from `entry_id` carrying `properties.source == "llm"`.
    pub fn outgoing_llm_edges(&self, entry_id: &str) -> Result<Vec<GraphEdge>> {
        let edges = self.outgoing_edges(entry_id)?;
        Ok(edges.into_iter().filter(GraphEdge::is_llm_sourced).collect())
    }

    pub fn outgoing_edges(&self, source_id: &str) -> Result<Vec<GraphEdge>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, edge_type, properties FROM graph_edges WHERE source_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![source_id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn incoming_edges(&self, target_id: &str) -> Result<Vec<GraphEdge>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT source_id, target_id, edge_type, properties FROM graph_edges WHERE target_id = ?1",
        )?;
        let rows = stmt
            .query_map(params![target_id], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// All non-entry node ids across a type, ordered by connection count
    /// (degree) descending — used by the planner and enricher (§4.8, §4.9).
    pub fn nodes_by_type_ordered_by_degree(&self, node_type: &str) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT n.node_id,
                    (SELECT COUNT(*) FROM graph_edges WHERE source_id = n.node_id) +
                    (SELECT COUNT(*) FROM graph_edges WHERE target_id = n.node_id) AS degree
             FROM graph_nodes n
             WHERE n.node_type = ?1
             ORDER BY degree DESC, n.node_id ASC",
        )?;
        let rows = stmt
            .query_map(params![node_type], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_non_entry_node_types(&self) -> Result<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT node_type FROM graph_nodes WHERE node_type != 'entry'",
        )?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn graph_stats(&self) -> Result<GraphStats> {
        let conn = self.lock();
        let mut node_counts_by_type = std::collections::HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT node_type, COUNT(*) FROM graph_nodes GROUP BY node_type")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (t, c) = row?;
                node_counts_by_type.insert(t, c);
            }
        }
        let mut edge_counts_by_type = std::collections::HashMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT edge_type, COUNT(*) FROM graph_edges GROUP BY edge_type")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (t, c) = row?;
                edge_counts_by_type.insert(t, c);
            }
        }
        let active_entry_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM knowledge_entries WHERE is_active = 1",
            [],
            |r| r.get(0),
        )?;
        Ok(GraphStats {
            node_counts_by_type,
            edge_counts_by_type,
            active_entry_count,
        })
    }

    /// Entries whose `project_ref` matches, ordered chronologically —
    /// backs the `project:` branch of scope resolution (§4.9); the
    /// `person:`/`tool:` branches walk the graph instead, in
    /// `graph::queries`.
    pub fn entries_by_project(&self, project_ref: &str) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM knowledge_entries
             WHERE is_active = 1 AND project_ref = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map(params![project_ref], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn entries_by_type(&self, entry_type: &str) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM knowledge_entries
             WHERE is_active = 1 AND entry_type = ?1 ORDER BY created_at ASC"
        ))?;
        let rows = stmt
            .query_map(params![entry_type], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn entries_by_tag(&self, tag: &str) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM knowledge_entries
             WHERE is_active = 1 AND (' ' || tags || ' ') LIKE ?1 ORDER BY created_at ASC"
        ))?;
        let needle = format!("% {} %", tag);
        let rows = stmt
            .query_map(params![needle], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn all_active_entries(&self) -> Result<Vec<Entry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM knowledge_entries WHERE is_active = 1"
        ))?;
        let rows = stmt
            .query_map([], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ------------------------------------------------------------------
    // Ingested-file registry (schema-level only; the ingestion pipeline
    // itself is out of scope per §1 — these are the typed primitives a
    // caller-supplied pipeline would drive).
    // ------------------------------------------------------------------

    pub fn upsert_ingested_file(&self, record: &crate::model::IngestedFile) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO ingested_files
                (absolute_path, sha256, note_node_id, entry_ids, summary, size, extension,
                 project_ref, redactions_json, created_at, updated_at, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(absolute_path) DO UPDATE SET
                sha256 = excluded.sha256, note_node_id = excluded.note_node_id,
                entry_ids = excluded.entry_ids, summary = excluded.summary,
                size = excluded.size, extension = excluded.extension,
                project_ref = excluded.project_ref, redactions_json = excluded.redactions_json,
                updated_at = excluded.updated_at, is_active = excluded.is_active",
            params![
                record.absolute_path,
                record.sha256,
                record.note_node_id,
                serde_json::to_string(&record.entry_ids).unwrap_or_default(),
                record.summary,
                record.size,
                record.extension,
                record.project_ref,
                record.redactions_json.to_string(),
                record.created_at,
                record.updated_at,
                record.is_active,
            ],
        )?;
        Ok(())
    }

    pub fn get_ingested_file(&self, absolute_path: &str) -> Result<Option<crate::model::IngestedFile>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT absolute_path, sha256, note_node_id, entry_ids, summary, size, extension,
                    project_ref, redactions_json, created_at, updated_at, is_active
             FROM ingested_files WHERE absolute_path = ?1",
            params![absolute_path],
            row_to_ingested_file,
        )
        .optional()
        .map_err(StoreError::from)
    }
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<GraphEdge> {
    let props: String = row.get(3)?;
    Ok(GraphEdge {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        edge_type: row.get(2)?,
        properties: serde_json::from_str(&props).unwrap_or(Json::Null),
    })
}

fn row_to_ingested_file(row: &rusqlite::Row) -> rusqlite::Result<crate::model::IngestedFile> {
    let entry_ids: String = row.get(3)?;
    let redactions: String = row.get(8)?;
    Ok(crate::model::IngestedFile {
        absolute_path: row.get(0)?,
        sha256: row.get(1)?,
        note_node_id: row.get(2)?,
        entry_ids: serde_json::from_str(&entry_ids).unwrap_or_default(),
        summary: row.get(4)?,
        size: row.get(5)?,
        extension: row.get(6)?,
        project_ref: row.get(7)?,
        redactions_json: serde_json::from_str(&redactions).unwrap_or(Json::Array(vec![])),
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        is_active: row.get::<_, i64>(11)? != 0,
    })
}

/// Serialise a float vector as packed little-endian 32-bit floats, the
/// wire format `vec0` (and the KNN query parameter) expects.
pub fn pack_vector(v: &[f32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(v.len() * 4);
    for x in v {
        buf.extend_from_slice(&x.to_le_bytes());
    }
    buf
}

pub fn unpack_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct GraphStats {
    pub node_counts_by_type: std::collections::HashMap<String, i64>,
    pub edge_counts_by_type: std::collections::HashMap<String, i64>,
    pub active_entry_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewEntry;

    fn new_entry(title: &str) -> NewEntry {
        NewEntry {
            short_title: title.to_string(),
            long_title: format!("{title} long"),
            details: format!("details for {title}"),
            entry_type: "factual_reference".to_string(),
            tags: vec!["alpha".to_string(), "beta".to_string()],
            project_ref: Some("proj-x".to_string()),
            hints: Json::Null,
            base_confidence: None,
        }
    }

    #[test]
    fn create_then_fetch_round_trips() {
        let store = Storage::open_in_memory(8).unwrap();
        let entry = store.create_entry(new_entry("hello")).unwrap();
        assert_eq!(entry.id, "kb-00001");
        assert_eq!(entry.version, 1);
        let fetched = store.get_entry(&entry.id).unwrap().unwrap();
        assert_eq!(fetched.short_title, "hello");
        assert_eq!(fetched.tags, vec!["alpha", "beta"]);
    }

    #[test]
    fn entry_ids_are_sequential_and_zero_padded() {
        let store = Storage::open_in_memory(8).unwrap();
        let a = store.create_entry(new_entry("a")).unwrap();
        let b = store.create_entry(new_entry("b")).unwrap();
        assert_eq!(a.id, "kb-00001");
        assert_eq!(b.id, "kb-00002");
    }

    #[test]
    fn rejects_unknown_entry_type() {
        let store = Storage::open_in_memory(8).unwrap();
        let mut fields = new_entry("x");
        fields.entry_type = "not_a_type".to_string();
        let err = store.create_entry(fields).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let store = Storage::open_in_memory(8).unwrap();
        let mut fields = new_entry("x");
        fields.base_confidence = Some(1.5);
        let err = store.create_entry(fields).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn update_n_times_yields_n_plus_one_versions() {
        let store = Storage::open_in_memory(8).unwrap();
        let entry = store.create_entry(new_entry("v")).unwrap();
        for i in 0..3 {
            store
                .update_entry(
                    &entry.id,
                    EntryPatch {
                        details: Some(format!("update {i}")),
                        ..Default::default()
                    },
                    "edit",
                )
                .unwrap();
        }
        let history = store.get_version_history(&entry.id).unwrap();
        assert_eq!(history.len(), 4);
        let numbers: Vec<i64> = history.iter().map(|v| v.version_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        // post-write convention: last version's snapshot matches the latest write
        assert_eq!(history.last().unwrap().snapshot_of_details, "update 2");
    }

    #[test]
    fn update_unknown_id_is_not_found() {
        let store = Storage::open_in_memory(8).unwrap();
        let err = store
            .update_entry("kb-99999", EntryPatch::default(), "edit")
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn body_change_clears_has_embedding() {
        let store = Storage::open_in_memory(8).unwrap();
        let entry = store.create_entry(new_entry("e")).unwrap();
        store
            .update_entry(
                &entry.id,
                EntryPatch {
                    details: Some("new body".to_string()),
                    ..Default::default()
                },
                "edit",
            )
            .unwrap();
        let fetched = store.get_entry(&entry.id).unwrap().unwrap();
        assert!(!fetched.has_embedding);
    }

    #[test]
    fn deactivated_entries_invisible_to_get() {
        let store = Storage::open_in_memory(8).unwrap();
        let entry = store.create_entry(new_entry("gone")).unwrap();
        store.deactivate_entry(&entry.id).unwrap();
        let entries = store.get_entries(&[entry.id.clone()], false).unwrap();
        assert!(entries.is_empty());
        let with_inactive = store.get_entries(&[entry.id.clone()], true).unwrap();
        assert_eq!(with_inactive.len(), 1);
    }

    #[test]
    fn tag_filter_is_boundary_safe() {
        let store = Storage::open_in_memory(8).unwrap();
        let mut a = new_entry("foo-tagged");
        a.tags = vec!["foo".to_string()];
        let mut b = new_entry("foobar-tagged");
        b.tags = vec!["foobar".to_string()];
        store.create_entry(a).unwrap();
        store.create_entry(b).unwrap();
        let matches = store.entries_by_tag("foo").unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].short_title, "foo-tagged");
    }

    #[test]
    fn fts_query_with_special_characters_does_not_error() {
        let store = Storage::open_in_memory(8).unwrap();
        store.create_entry(new_entry("colon")).unwrap();
        for q in ["foo:bar", "foo-bar", "foo(bar)"] {
            store.fts_search(q, None, None, None, 10).unwrap();
        }
    }

    #[test]
    fn edge_insert_is_idempotent() {
        let store = Storage::open_in_memory(8).unwrap();
        store.upsert_node("kb-00001", "entry", &Json::Null).unwrap();
        store.upsert_node("tag:x", "tag", &Json::Null).unwrap();
        store
            .insert_edge("kb-00001", "tag:x", "has_tag", &Json::Null)
            .unwrap();
        store
            .insert_edge("kb-00001", "tag:x", "has_tag", &Json::Null)
            .unwrap();
        let edges = store.outgoing_edges("kb-00001").unwrap();
        assert_eq!(edges.len(), 1);
    }

    #[test]
    fn clear_outgoing_edges_preserves_llm_marked() {
        let store = Storage::open_in_memory(8).unwrap();
        store.upsert_node("kb-00001", "entry", &Json::Null).unwrap();
        store.upsert_node("tag:x", "tag", &Json::Null).unwrap();
        store.upsert_node("concept:y", "concept", &Json::Null).unwrap();
        store
            .insert_edge("kb-00001", "tag:x", "has_tag", &Json::Null)
            .unwrap();
        store
            .insert_edge(
                "kb-00001",
                "concept:y",
                "related_to",
                &serde_json::json!({"source": "llm"}),
            )
            .unwrap();
        store.clear_outgoing_edges("kb-00001", true).unwrap();
        let edges = store.outgoing_edges("kb-00001").unwrap();
        assert_eq!(edges.len(), 1);
        assert!(edges[0].is_llm_sourced());
    }

    #[test]
    fn vector_pack_roundtrips() {
        let v = vec![0.1f32, -0.5, 3.25];
        let packed = pack_vector(&v);
        let back = unpack_vector(&packed);
        assert_eq!(v, back);
    }
}
