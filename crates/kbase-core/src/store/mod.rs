//! Single-file transactional store (§4.1).
//!
//! Owns the physical schema — entries, version history, the FTS5 shadow
//! index, the `vec0` dense-vector index, graph nodes/edges, and the
//! ingested-file registry — behind one `rusqlite::Connection` opened on
//! one file. Every other component (ranker, graph builder/enricher/
//! queries, planner) depends on `Storage` for data access; none of them
//! open the file directly.

mod migrations;
mod sqlite;

pub use migrations::{apply_migrations, Migration, MIGRATIONS};
pub use sqlite::{GraphStats, Storage};
