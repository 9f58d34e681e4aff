//! Always-unavailable provider, used when no LLM is configured. Callers
//! fall back to the no-LLM degradation path (§4.8, §4.10) automatically
//! since `generate` always returns `None`.

use async_trait::async_trait;

use super::LlmProvider;

#[derive(Debug, Default, Clone, Copy)]
pub struct NullLlm;

#[async_trait]
impl LlmProvider for NullLlm {
    async fn is_available(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str, _system: Option<&str>) -> Option<String> {
        None
    }

    async fn close(&self) {}
}
