//! Runtime configuration (§6).
//!
//! Config *loading* (file formats, CLI precedence) is an external
//! collaborator's job per §1; this module only defines the typed surface
//! every component reads from, with the documented environment variables
//! and defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Embedding dimension default, per §6's config table.
pub const DEFAULT_EMBEDDING_DIM: usize = 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub store_path: Option<PathBuf>,
    pub embedding_model: Option<String>,
    pub embedding_dim: usize,
    pub embedder_url: String,
    pub embedder_timeout: Duration,
    pub llm_extraction_provider: String,
    pub llm_query_provider: String,
    pub manager_mode: bool,
    pub ingest_max_file_size: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            embedding_model: None,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            embedder_url: "http://localhost:8080".to_string(),
            embedder_timeout: Duration::from_secs(10),
            llm_extraction_provider: "anthropic".to_string(),
            llm_query_provider: "anthropic".to_string(),
            manager_mode: false,
            ingest_max_file_size: 512_000,
            log_level: "warning".to_string(),
        }
    }
}

impl Config {
    /// Load from the `KB_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            store_path: std::env::var("KB_STORE_PATH").ok().map(PathBuf::from),
            embedding_model: std::env::var("KB_EMBEDDING_MODEL").ok(),
            embedding_dim: std::env::var("KB_EMBEDDING_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.embedding_dim),
            embedder_url: std::env::var("KB_EMBEDDER_URL").unwrap_or(defaults.embedder_url),
            embedder_timeout: std::env::var("KB_EMBEDDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.embedder_timeout),
            llm_extraction_provider: std::env::var("KB_LLM_EXTRACTION")
                .unwrap_or(defaults.llm_extraction_provider),
            llm_query_provider: std::env::var("KB_LLM_QUERY").unwrap_or(defaults.llm_query_provider),
            manager_mode: std::env::var("KB_MANAGER_MODE")
                .ok()
                .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.manager_mode),
            ingest_max_file_size: std::env::var("KB_INGEST_MAX_FILE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.ingest_max_file_size),
            log_level: std::env::var("KB_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }
}
