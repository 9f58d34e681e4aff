//! Generic HTTP LLM provider: POSTs `{prompt, system}` to a configured
//! endpoint and expects `{"text": "..."}` back. Exercises the
//! [`LlmProvider`] contract and its degradation paths without
//! committing to a specific vendor's request/response shape (§1, §6).

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::LlmProvider;

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
}

pub struct HttpLlm {
    client: reqwest::Client,
    endpoint: String,
    known_available: Mutex<Option<bool>>,
}

impl HttpLlm {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
            known_available: Mutex::new(None),
        }
    }

    fn mark(&self, available: bool) {
        let mut guard = self.known_available.lock().unwrap_or_else(|p| p.into_inner());
        *guard = if available { Some(true) } else { None };
    }
}

#[async_trait]
impl LlmProvider for HttpLlm {
    async fn is_available(&self) -> bool {
        if let Some(known) = *self.known_available.lock().unwrap_or_else(|p| p.into_inner()) {
            return known;
        }
        let available = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        self.mark(available);
        available
    }

    async fn generate(&self, prompt: &str, system: Option<&str>) -> Option<String> {
        let body = GenerateRequest { prompt, system };
        let response = match self.client.post(&self.endpoint).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "llm request failed");
                self.mark(false);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "llm returned non-success status");
            self.mark(false);
            return None;
        }
        match response.json::<GenerateResponse>().await {
            Ok(parsed) => {
                self.mark(true);
                Some(parsed.text)
            }
            Err(e) => {
                warn!(error = %e, "llm response did not parse");
                self.mark(false);
                None
            }
        }
    }

    async fn close(&self) {}
}
