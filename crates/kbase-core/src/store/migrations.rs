//! Schema migrations for the single-file store (§3, §6).
//!
//! One physical file carries every table the core depends on: the entry id
//! sequence, entries, their version history, the FTS5 shadow index, the
//! `vec0` dense-vector index, the graph node/edge tables, and the
//! ingested-file registry. Migrations are applied in order inside
//! `Storage::new`; each is idempotent (`IF NOT EXISTS` throughout) so
//! re-opening an existing file is a no-op.

/// A single forward migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "entries, versions, graph nodes/edges, id sequence, ingested files",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "FTS5 index over short_title/long_title/details/tags with sync triggers",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS entry_id_seq (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    next_value INTEGER NOT NULL
);
INSERT OR IGNORE INTO entry_id_seq (id, next_value) VALUES (1, 1);

CREATE TABLE IF NOT EXISTS knowledge_entries (
    id TEXT PRIMARY KEY,
    short_title TEXT NOT NULL,
    long_title TEXT NOT NULL,
    details TEXT NOT NULL,
    entry_type TEXT NOT NULL,
    project_ref TEXT,
    tags TEXT NOT NULL DEFAULT '',
    hints TEXT NOT NULL DEFAULT '{}',
    base_confidence REAL NOT NULL DEFAULT 0.9,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_accessed TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    has_embedding INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_entries_active ON knowledge_entries(is_active);
CREATE INDEX IF NOT EXISTS idx_entries_project ON knowledge_entries(project_ref);
CREATE INDEX IF NOT EXISTS idx_entries_type ON knowledge_entries(entry_type);

CREATE TABLE IF NOT EXISTS entry_versions (
    entry_id TEXT NOT NULL REFERENCES knowledge_entries(id) ON DELETE CASCADE,
    version_number INTEGER NOT NULL,
    snapshot_of_details TEXT NOT NULL,
    snapshot_of_confidence REAL NOT NULL,
    change_reason TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    PRIMARY KEY (entry_id, version_number)
);

CREATE TABLE IF NOT EXISTS graph_nodes (
    node_id TEXT PRIMARY KEY,
    node_type TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_graph_nodes_type ON graph_nodes(node_type);

CREATE TABLE IF NOT EXISTS graph_edges (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (source_id, target_id, edge_type)
);

CREATE INDEX IF NOT EXISTS idx_graph_edges_source ON graph_edges(source_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_id);

CREATE TABLE IF NOT EXISTS ingested_files (
    absolute_path TEXT PRIMARY KEY,
    sha256 TEXT NOT NULL,
    note_node_id TEXT,
    entry_ids TEXT NOT NULL DEFAULT '[]',
    summary TEXT,
    size INTEGER NOT NULL,
    extension TEXT,
    project_ref TEXT,
    redactions_json TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);
"#;

/// FTS5 shadow index plus the insert/delete/update sync triggers (§4.2).
/// `tags` is the single whitespace-joined string; porter stemming and
/// unicode61 normalisation follow the teacher's tokenizer choice.
const MIGRATION_V2_UP: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS knowledge_fts USING fts5(
    id UNINDEXED,
    short_title,
    long_title,
    details,
    tags,
    tokenize = 'porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS knowledge_entries_ai AFTER INSERT ON knowledge_entries
WHEN NEW.is_active = 1
BEGIN
    INSERT INTO knowledge_fts(rowid, id, short_title, long_title, details, tags)
    VALUES (NEW.rowid, NEW.id, NEW.short_title, NEW.long_title, NEW.details, NEW.tags);
END;

CREATE TRIGGER IF NOT EXISTS knowledge_entries_ad AFTER DELETE ON knowledge_entries
BEGIN
    DELETE FROM knowledge_fts WHERE rowid = OLD.rowid;
END;

CREATE TRIGGER IF NOT EXISTS knowledge_entries_au AFTER UPDATE ON knowledge_entries
BEGIN
    DELETE FROM knowledge_fts WHERE rowid = OLD.rowid;
    INSERT INTO knowledge_fts(rowid, id, short_title, long_title, details, tags)
    SELECT NEW.rowid, NEW.id, NEW.short_title, NEW.long_title, NEW.details, NEW.tags
    WHERE NEW.is_active = 1;
END;
"#;

pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)")?;
    let applied: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
        .unwrap_or(0);
    for migration in MIGRATIONS {
        if i64::from(migration.version) > applied {
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
                [migration.version],
            )?;
        }
    }
    Ok(())
}
