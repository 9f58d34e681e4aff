//! Reciprocal Rank Fusion plus the full hybrid ranker (§4.6): over-fetch
//! from FTS and vector search, fuse, load entries, apply confidence
//! decay, filter/warn on staleness, tag match source, and augment sparse
//! result sets with graph-derived hints.

use std::collections::{HashMap, HashSet};

use chrono::Utc;

use crate::decay::{effective_confidence_for, needs_warning, FILTER_THRESHOLD};
use crate::error::Result;
use crate::model::{Entry, MatchSource, SearchFilters, SearchHit, SearchResponse};
use crate::store::Storage;

/// RRF fusion constant (§4.6): `score = Σ 1/(K + rank + 1)`, zero-based ranks.
pub const RRF_K: f32 = 60.0;

/// Sparse-hint augmentation activates below this result count.
const SPARSE_RESULT_THRESHOLD: usize = 3;
/// At most this many sparse hints are attached to a response.
const MAX_SPARSE_HINTS: usize = 3;
/// At most this many neighbours are considered per result when building hints.
const HINT_NEIGHBOUR_CAP: usize = 10;

/// Fuse two candidate lists (already in source rank order — best first)
/// via RRF. Permutation-invariant in the order the two lists are passed:
/// swapping `fts` and `vector` yields the same fused scores.
pub fn reciprocal_rank_fusion(
    fts: &[(String, f32)],
    vector: &[(String, f32)],
    k: f32,
) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for (rank, (id, _)) in fts.iter().enumerate() {
        *scores.entry(id.clone()).or_default() += 1.0 / (k + rank as f32 + 1.0);
    }
    for (rank, (id, _)) in vector.iter().enumerate() {
        *scores.entry(id.clone()).or_default() += 1.0 / (k + rank as f32 + 1.0);
    }
    let mut results: Vec<(String, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    results
}

/// Orchestrates §4.6's full ranking procedure over a [`Storage`].
pub struct HybridRanker<'a> {
    store: &'a Storage,
}

impl<'a> HybridRanker<'a> {
    pub fn new(store: &'a Storage) -> Self {
        Self { store }
    }

    /// `query_embedding` is `None` when the embedder is unavailable or
    /// embeddings are compiled out — the ranker degrades to FTS-only.
    pub fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        limit: usize,
        include_stale: bool,
        query_embedding: Option<&[f32]>,
    ) -> Result<SearchResponse> {
        let fetch_n = (limit * 3).max(limit);

        let fts_hits = self.store.fts_search(
            query,
            filters.project_ref.as_deref(),
            filters.entry_type.as_deref(),
            filters.tag.as_deref(),
            fetch_n,
        )?;
        let vector_hits = match query_embedding {
            Some(vec) => self.store.vector_search(vec, fetch_n)?,
            None => Vec::new(),
        };

        let fused = reciprocal_rank_fusion(&fts_hits, &vector_hits, RRF_K);
        let vector_ids: HashSet<&str> = vector_hits.iter().map(|(id, _)| id.as_str()).collect();

        let top_ids: Vec<String> = fused.iter().take(limit).map(|(id, _)| id.clone()).collect();
        let entries = self.store.get_entries(&top_ids, false)?;
        let entries_by_id: HashMap<&str, &Entry> =
            entries.iter().map(|e| (e.id.as_str(), e)).collect();

        let now = Utc::now();
        let mut results = Vec::with_capacity(top_ids.len());
        for (id, rrf_score) in fused.iter().take(limit) {
            let Some(entry) = entries_by_id.get(id.as_str()) else {
                continue;
            };
            let effective_confidence = effective_confidence_for(entry, now);
            if effective_confidence < FILTER_THRESHOLD && !include_stale {
                continue;
            }
            let match_source = if vector_ids.contains(id.as_str()) {
                MatchSource::Hybrid
            } else {
                MatchSource::Fts
            };
            results.push(SearchHit {
                entry: (*entry).clone(),
                rrf_score: *rrf_score,
                effective_confidence,
                match_source,
                staleness_warning: needs_warning(effective_confidence),
            });
        }

        let hints = if results.len() < SPARSE_RESULT_THRESHOLD {
            self.sparse_hints(&results)?
        } else {
            Vec::new()
        };

        Ok(SearchResponse { results, hints })
    }

    /// §4.6 step 6: one hop to each result's neighbours, a second hop
    /// through non-entry intermediates, deduped against results already
    /// returned and hints already collected, capped at 3.
    fn sparse_hints(&self, results: &[SearchHit]) -> Result<Vec<String>> {
        let mut seen: HashSet<String> = results.iter().map(|h| h.entry.id.clone()).collect();
        let mut hints = Vec::new();

        for hit in results {
            if hints.len() >= MAX_SPARSE_HINTS {
                break;
            }
            let outgoing = self.store.outgoing_edges(&hit.entry.id)?;
            let incoming = self.store.incoming_edges(&hit.entry.id)?;
            let mut neighbours: Vec<(String, String)> = outgoing
                .iter()
                .map(|e| (e.target_id.clone(), e.edge_type.clone()))
                .chain(incoming.iter().map(|e| (e.source_id.clone(), e.edge_type.clone())))
                .collect();
            neighbours.truncate(HINT_NEIGHBOUR_CAP);

            for (node_id, via) in neighbours {
                if hints.len() >= MAX_SPARSE_HINTS {
                    break;
                }
                if node_id.starts_with("kb-") {
                    self.try_hint(&node_id, &via, &mut seen, &mut hints)?;
                    continue;
                }
                // second hop through a non-entry intermediate (tag, concept, ...)
                let second_hop = self.store.outgoing_edges(&node_id)?;
                let second_hop_in = self.store.incoming_edges(&node_id)?;
                for edge in second_hop.iter().chain(second_hop_in.iter()) {
                    if hints.len() >= MAX_SPARSE_HINTS {
                        break;
                    }
                    let candidate = if edge.source_id == node_id {
                        &edge.target_id
                    } else {
                        &edge.source_id
                    };
                    if candidate.starts_with("kb-") {
                        self.try_hint(candidate, &node_id, &mut seen, &mut hints)?;
                    }
                }
            }
        }
        Ok(hints)
    }

    fn try_hint(
        &self,
        entry_id: &str,
        via: &str,
        seen: &mut HashSet<String>,
        hints: &mut Vec<String>,
    ) -> Result<()> {
        if seen.contains(entry_id) {
            return Ok(());
        }
        let Some(entry) = self.store.get_entry(entry_id)? else {
            return Ok(());
        };
        if !entry.is_active {
            return Ok(());
        }
        seen.insert(entry_id.to_string());
        hints.push(format!(
            "See also: [{}] {} (via {})",
            entry.id, entry.long_title, via
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_scenario_from_spec() {
        // FTS [A,B,C], vector [B,D,A] -> B, A, D, C (K=60)
        let fts = vec![
            ("A".to_string(), 0.0),
            ("B".to_string(), 0.0),
            ("C".to_string(), 0.0),
        ];
        let vector = vec![
            ("B".to_string(), 0.0),
            ("D".to_string(), 0.0),
            ("A".to_string(), 0.0),
        ];
        let fused = reciprocal_rank_fusion(&fts, &vector, 60.0);
        let order: Vec<&str> = fused.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "D", "C"]);
    }

    #[test]
    fn rrf_is_permutation_invariant_in_list_order() {
        let fts = vec![("A".to_string(), 0.0), ("B".to_string(), 0.0)];
        let vector = vec![("B".to_string(), 0.0), ("C".to_string(), 0.0)];
        let a = reciprocal_rank_fusion(&fts, &vector, 60.0);
        let b = reciprocal_rank_fusion(&vector, &fts, 60.0);
        let mut a_sorted = a.clone();
        let mut b_sorted = b.clone();
        a_sorted.sort_by(|x, y| x.0.cmp(&y.0));
        b_sorted.sort_by(|x, y| x.0.cmp(&y.0));
        for ((id_a, score_a), (id_b, score_b)) in a_sorted.iter().zip(b_sorted.iter()) {
            assert_eq!(id_a, id_b);
            assert!((score_a - score_b).abs() < 1e-9);
        }
    }

    #[test]
    fn rrf_with_empty_vector_list_falls_back_to_fts_order() {
        let fts = vec![("A".to_string(), 0.0), ("B".to_string(), 0.0)];
        let vector: Vec<(String, f32)> = vec![];
        let fused = reciprocal_rank_fusion(&fts, &vector, 60.0);
        assert_eq!(fused[0].0, "A");
        assert_eq!(fused[1].0, "B");
    }

}

