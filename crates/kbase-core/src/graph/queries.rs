//! Graph traversal primitives (§4.9): neighbour lookup, BFS, the
//! supersedes chain, shortest path, scope resolution, and the
//! vocabulary/stats the enricher and planner consume.
//!
//! Traversals fetch node/edge rows lazily from [`Storage`] and cache
//! only within one call — the graph itself is never materialised
//! in-memory (§9's "arena/index" note).

use std::collections::{HashMap, HashSet, VecDeque};

use regex::Regex;
use std::sync::OnceLock;

use crate::error::Result;
use crate::model::{Entry, EdgeDirection, EntryType, Neighbor};
use crate::store::{GraphStats as StoreGraphStats, Storage};

fn entry_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^kb-\d{5}$").expect("static pattern"))
}

fn is_entry_id(id: &str) -> bool {
    entry_id_pattern().is_match(id)
}

/// All (neighbour_id, edge_type) pairs reachable from `node_id` in
/// either direction, used by every BFS-style traversal below.
fn adjacent(store: &Storage, node_id: &str) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for edge in store.outgoing_edges(node_id)? {
        out.push((edge.target_id, edge.edge_type));
    }
    for edge in store.incoming_edges(node_id)? {
        out.push((edge.source_id, edge.edge_type));
    }
    Ok(out)
}

/// `neighbors(node_id, limit)` — outgoing and incoming edges, bounded.
pub fn neighbors(store: &Storage, node_id: &str, limit: usize) -> Result<Vec<Neighbor>> {
    let mut result = Vec::new();
    for edge in store.outgoing_edges(node_id)? {
        if result.len() >= limit {
            break;
        }
        if let Some(node) = store.get_node(&edge.target_id)? {
            result.push(Neighbor {
                node,
                edge_type: edge.edge_type,
                direction: EdgeDirection::Outgoing,
            });
        }
    }
    for edge in store.incoming_edges(node_id)? {
        if result.len() >= limit {
            break;
        }
        if let Some(node) = store.get_node(&edge.source_id)? {
            result.push(Neighbor {
                node,
                edge_type: edge.edge_type,
                direction: EdgeDirection::Incoming,
            });
        }
    }
    Ok(result)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupersedesLink {
    pub entry_id: String,
    pub label: String,
}

/// Walk `supersedes`/`superseded_by` edges both ways from `entry_id`,
/// dedupe, sort chronologically, and label each link.
pub fn supersedes_chain(store: &Storage, entry_id: &str) -> Result<Vec<SupersedesLink>> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::from([entry_id.to_string()]);
    visited.insert(entry_id.to_string());
    // direct `supersedes` target recorded per source, so the middle
    // links can name what they directly supersede rather than just
    // their position in the sorted chain.
    let mut direct_supersedes: HashMap<String, String> = HashMap::new();

    while let Some(current) = queue.pop_front() {
        for edge in store.outgoing_edges(&current)? {
            if edge.edge_type == "supersedes" && is_entry_id(&edge.target_id) {
                direct_supersedes.insert(current.clone(), edge.target_id.clone());
            }
        }
        for (neighbour, edge_type) in adjacent(store, &current)? {
            if (edge_type == "supersedes" || edge_type == "superseded_by")
                && is_entry_id(&neighbour)
                && visited.insert(neighbour.clone())
            {
                queue.push_back(neighbour);
            }
        }
    }

    let ids: Vec<String> = visited.into_iter().collect();
    let mut entries = store.get_entries(&ids, false)?;
    entries.sort_by_key(|e| e.created_at);

    let len = entries.len();
    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let label = if len == 1 || i == len - 1 {
                "current".to_string()
            } else if i == 0 {
                "original".to_string()
            } else {
                match direct_supersedes.get(&entry.id) {
                    Some(target) => format!("supersedes {target}"),
                    None => format!("supersedes {}", entry.id),
                }
            };
            SupersedesLink { entry_id: entry.id, label }
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BfsEntry {
    pub entry_id: String,
    pub depth: usize,
    pub path: Vec<String>,
}

/// `bfs_entries(start, max_depth)` — collect entry-shaped nodes reached
/// within `max_depth` hops.
pub fn bfs_entries(store: &Storage, start: &str, max_depth: usize) -> Result<Vec<BfsEntry>> {
    let mut visited: HashSet<String> = HashSet::from([start.to_string()]);
    let mut queue = VecDeque::from([(start.to_string(), 0usize, vec![start.to_string()])]);
    let mut results = Vec::new();

    while let Some((current, depth, path)) = queue.pop_front() {
        if depth > 0 && is_entry_id(&current) {
            results.push(BfsEntry {
                entry_id: current.clone(),
                depth,
                path: path.clone(),
            });
        }
        if depth >= max_depth {
            continue;
        }
        for (neighbour, _) in adjacent(store, &current)? {
            if visited.insert(neighbour.clone()) {
                let mut next_path = path.clone();
                next_path.push(neighbour.clone());
                queue.push_back((neighbour, depth + 1, next_path));
            }
        }
    }
    Ok(results)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub source: String,
    pub edge_type: String,
    pub target: String,
}

/// `find_path(a, b, max_depth)` — BFS shortest path by first visit
/// (edge weight is not modelled).
pub fn find_path(store: &Storage, a: &str, b: &str, max_depth: usize) -> Result<Option<Vec<PathStep>>> {
    if a == b {
        return Ok(Some(Vec::new()));
    }
    let mut visited: HashSet<String> = HashSet::from([a.to_string()]);
    let mut queue = VecDeque::from([(a.to_string(), 0usize, Vec::<PathStep>::new())]);

    while let Some((current, depth, path)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for (neighbour, edge_type) in adjacent(store, &current)? {
            if !visited.insert(neighbour.clone()) {
                continue;
            }
            let mut next_path = path.clone();
            next_path.push(PathStep {
                source: current.clone(),
                edge_type,
                target: neighbour.clone(),
            });
            if neighbour == b {
                return Ok(Some(next_path));
            }
            queue.push_back((neighbour, depth + 1, next_path));
        }
    }
    Ok(None)
}

/// `entries_for_scope(scope)` — prefix dispatch per §4.9.
pub fn entries_for_scope(store: &Storage, scope: &str) -> Result<Vec<Entry>> {
    if let Some(project) = scope.strip_prefix("project:") {
        return store.entries_by_project(project);
    }
    if let Some(tag) = scope.strip_prefix("tag:") {
        return store.entries_by_tag(tag);
    }
    if scope.starts_with("person:") || scope.starts_with("tool:") {
        let mut entries = Vec::new();
        for (neighbour, _) in adjacent(store, scope)? {
            if is_entry_id(&neighbour) {
                if let Some(entry) = store.get_entry(&neighbour)? {
                    if entry.is_active {
                        entries.push(entry);
                    }
                }
            }
        }
        entries.sort_by_key(|e| e.created_at);
        return Ok(entries);
    }
    if EntryType::parse(scope).is_some() {
        return store.entries_by_type(scope);
    }
    Ok(Vec::new())
}

/// `get_graph_vocabulary()` — non-entry node ids grouped by type,
/// ordered by degree descending.
pub fn get_graph_vocabulary(store: &Storage) -> Result<HashMap<String, Vec<String>>> {
    let mut vocabulary = HashMap::new();
    for node_type in store.all_non_entry_node_types()? {
        let ids = store.nodes_by_type_ordered_by_degree(&node_type)?;
        vocabulary.insert(node_type, ids);
    }
    Ok(vocabulary)
}

pub fn graph_stats(store: &Storage) -> Result<StoreGraphStats> {
    store.graph_stats()
}
