//! Embedding client (§4.4): turns entry text into a fixed-dimension
//! vector via an external HTTP embedder. Optional — every call site
//! degrades to `None` when the embedder is unavailable.

mod http;

pub use http::HttpEmbeddingClient;

use async_trait::async_trait;

/// `embed` and `is_available` per §4.4/§6. Implementations own their own
/// availability caching (cache only success; a failure resets to
/// "unknown" so the next call re-probes).
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;
    async fn is_available(&self) -> bool;
}
