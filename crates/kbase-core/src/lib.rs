//! # kbase-core
//!
//! The retrieval core of a persistent, single-user knowledge base: a
//! single-file transactional store, a hybrid BM25 + dense-vector ranker
//! fused by Reciprocal Rank Fusion, a two-tier deterministic/LLM
//! knowledge graph, and the query planner that routes natural-language
//! questions to a traversal strategy.
//!
//! ## Modules
//!
//! - [`model`] — the data types shared across every other module:
//!   entries, versions, graph nodes/edges, search results.
//! - [`store`] — the single-file store (`Storage`): entries, version
//!   history, the FTS5 index, the `vec0` dense-vector index, and the
//!   graph tables all live behind one connection.
//! - [`decay`] — confidence decay, a pure function of entry type and age.
//! - [`search`] — Reciprocal Rank Fusion and the hybrid ranker that
//!   fuses FTS and vector candidates, applies decay, and augments
//!   sparse result sets with graph-derived hints.
//! - [`graph`] — the deterministic edge builder, the LLM entity
//!   enricher, traversal primitives (BFS, shortest path, scope
//!   resolution), and the query planner/strategy dispatcher.
//! - [`embeddings`] — the external embedding client contract and its
//!   HTTP implementation.
//! - [`llm`] — the LLM provider contract (`is_available`/`generate`/
//!   `close`) plus a null and a generic HTTP implementation.
//! - [`server`] — `KnowledgeServer`, which sequences the above into the
//!   six public operations (`store`, `store_batch`, `search`, `get`,
//!   `ask`, `summarize`).
//! - [`config`] — the typed runtime configuration surface.
//! - [`error`] — the `StoreError` taxonomy.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kbase_core::{KnowledgeServer, NewEntry};
//! use kbase_core::llm::NullLlm;
//! use kbase_core::store::Storage;
//!
//! let store = Arc::new(Storage::open_in_memory(1024)?);
//! let server = KnowledgeServer::new(store, None, Arc::new(NullLlm), Arc::new(NullLlm));
//! let entry = server.store(NewEntry {
//!     short_title: "sample".into(),
//!     long_title: "A sample entry".into(),
//!     details: "Some details.".into(),
//!     entry_type: "factual_reference".into(),
//!     tags: vec![],
//!     project_ref: None,
//!     hints: serde_json::Value::Null,
//!     base_confidence: None,
//! }).await?;
//! # Ok::<(), kbase_core::error::StoreError>(())
//! ```

pub mod config;
pub mod decay;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod llm;
pub mod model;
pub mod search;
pub mod server;
pub mod store;

pub use config::Config;
pub use decay::{effective_confidence, effective_confidence_for, FILTER_THRESHOLD, WARN_THRESHOLD};
pub use error::{Result, StoreError};
pub use model::{
    EdgeDirection, Entry, EntryPatch, EntryType, GraphEdge, GraphNode, IngestedFile, MatchSource,
    NewEntry, Neighbor, SearchFilters, SearchHit, SearchResponse, VersionRecord,
};
pub use server::{KnowledgeServer, GET_BATCH_LIMIT, STORE_BATCH_LIMIT};
pub use store::Storage;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenience re-exports for the common case of wiring up a server.
pub mod prelude {
    pub use crate::embeddings::EmbeddingClient;
    pub use crate::error::{Result, StoreError};
    pub use crate::llm::LlmProvider;
    pub use crate::model::{Entry, EntryType, NewEntry, SearchFilters};
    pub use crate::server::KnowledgeServer;
    pub use crate::store::Storage;
}
