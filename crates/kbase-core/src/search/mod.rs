//! Hybrid retrieval (§4.2, §4.3, §4.6): BM25 lexical candidates and
//! vector-index candidates fused by Reciprocal Rank Fusion, then passed
//! through confidence decay and sparse-hint augmentation.
//!
//! The FTS and vector indexes themselves are physical concerns of
//! [`crate::store`] (they live in the same file as the entries table);
//! this module only consumes their candidate lists.

mod hybrid;

pub use hybrid::{reciprocal_rank_fusion, HybridRanker, RRF_K};
