//! MCP tool modules.
//!
//! One file per group of closely related tools: entry lifecycle
//! (`knowledge`), retrieval (`search`), and the graph-backed question
//! answering surface (`graph`). `server.rs` owns the name-to-handler
//! dispatch table and the `tools/list` descriptions.

pub mod graph;
pub mod knowledge;
pub mod search;
