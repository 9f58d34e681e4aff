//! HTTP embedder client (§4.4): POSTs entry text to an external embedder
//! and returns a fixed-dimension vector, or `None` on any failure.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EmbeddingClient;

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// Availability is probed lazily and cached — but only on success. A
/// failed call resets the cache to "unknown" so the next call re-probes
/// rather than being stuck reporting the embedder as dead forever.
pub struct HttpEmbeddingClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    expected_dim: usize,
    known_available: Mutex<Option<bool>>,
}

impl HttpEmbeddingClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, expected_dim: usize, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            expected_dim,
            known_available: Mutex::new(None),
        }
    }

    fn mark(&self, available: bool) {
        let mut guard = self.known_available.lock().unwrap_or_else(|p| p.into_inner());
        *guard = if available { Some(true) } else { None };
    }
}

#[async_trait]
impl EmbeddingClient for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = EmbedRequest {
            model: &self.model,
            input: text,
        };
        let response = match self.client.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "embedder request failed");
                self.mark(false);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "embedder returned non-success status");
            self.mark(false);
            return None;
        }
        match response.json::<EmbedResponse>().await {
            Ok(parsed) if parsed.embedding.len() == self.expected_dim => {
                self.mark(true);
                Some(parsed.embedding)
            }
            Ok(parsed) => {
                warn!(
                    got = parsed.embedding.len(),
                    expected = self.expected_dim,
                    "embedder returned wrong dimension"
                );
                self.mark(false);
                None
            }
            Err(e) => {
                warn!(error = %e, "embedder response did not parse");
                self.mark(false);
                None
            }
        }
    }

    async fn is_available(&self) -> bool {
        if let Some(known) = *self.known_available.lock().unwrap_or_else(|p| p.into_inner()) {
            return known;
        }
        let url = format!("{}/health", self.base_url.trim_end_matches('/'));
        let available = self
            .client
            .get(&url)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        debug!(available, "embedder availability probe");
        self.mark(available);
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_with_trailing_slash_base_url() {
        let client = HttpEmbeddingClient::new("http://localhost:8080/", "model", 1024, Duration::from_secs(10));
        assert_eq!(client.base_url, "http://localhost:8080/");
    }
}
