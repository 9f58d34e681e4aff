//! LLM provider abstraction (§6): `is_available`/`generate`/`close`.
//!
//! The graph enricher and query planner depend on this trait, never on a
//! concrete provider — swapping backends is a config change. This crate
//! ships the contract plus two implementations: [`NullLlm`] (always
//! unavailable, used when no provider is configured) and [`HttpLlm`] (a
//! generic POST-a-prompt skeleton). Building out a specific vendor's
//! request/response schema is out of scope per §1.

mod http;
mod null;

pub use http::HttpLlm;
pub use null::NullLlm;

use async_trait::async_trait;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn is_available(&self) -> bool;
    /// `None` on timeout, transport error, or when unavailable.
    async fn generate(&self, prompt: &str, system: Option<&str>) -> Option<String>;
    async fn close(&self);
}
