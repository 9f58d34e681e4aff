//! Two-tier knowledge graph: deterministic edges derived from entry
//! fields (§4.7), LLM-extracted entity edges layered on top with entity
//! resolution against the existing vocabulary (§4.8), traversal
//! primitives (§4.9), and the strategy planner (§4.10).

mod builder;
mod enricher;
mod planner;
mod queries;

pub use builder::GraphBuilder;
pub use enricher::{ExtractedEntity, GraphEnricher};
pub use planner::{PlannedQuery, QueryPlanner, Strategy, AUTO_STRATEGY_FANOUT_CAP};
pub use queries::{
    bfs_entries, entries_for_scope, find_path, get_graph_vocabulary, graph_stats, neighbors,
    supersedes_chain, BfsEntry, PathStep, SupersedesLink,
};
