//! kbase MCP server
//!
//! Stdio JSON-RPC server exposing a persistent, single-user knowledge
//! base's six operations (`store`, `store_batch`, `search`, `get`,
//! `ask`, `summarize`) to an MCP client, backed by a hybrid BM25 +
//! dense-vector ranker and a two-tier deterministic/LLM knowledge graph.

mod protocol;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use kbase_core::config::Config;
use kbase_core::embeddings::EmbeddingClient;
#[cfg(feature = "embeddings")]
use kbase_core::embeddings::HttpEmbeddingClient;
use kbase_core::llm::{HttpLlm, LlmProvider, NullLlm};
use kbase_core::store::Storage;
use kbase_core::KnowledgeServer;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Parse command-line arguments, returning the optional data directory
/// override. Exits the process for `--help`/`--version`.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("kbase-mcp {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Stdio MCP server for a persistent, single-user knowledge base.");
                println!();
                println!("USAGE:");
                println!("    kbase-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Custom data directory (overrides KB_STORE_PATH)");
                println!();
                println!("ENVIRONMENT:");
                println!("    KB_STORE_PATH           Path to the SQLite store file");
                println!("    KB_EMBEDDING_DIM        Dense-vector dimension (default: 1024)");
                println!("    KB_EMBEDDER_URL         Embedding service base URL");
                println!("    KB_LLM_EXTRACTION_URL   HTTP endpoint for entity-extraction LLM calls");
                println!("    KB_LLM_QUERY_URL        HTTP endpoint for query-planning LLM calls");
                println!("    RUST_LOG                Log level filter (e.g., debug, info, warn, error)");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("kbase-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'kbase-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

fn default_store_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "kbase")
        .map(|dirs| dirs.data_dir().join("kbase.db"))
        .unwrap_or_else(|| PathBuf::from("kbase.db"))
}

/// The abstract LLM provider contract is part of this crate; concrete
/// provider wiring (Anthropic, OpenAI, ...) is explicitly out of scope
/// (spec §1). `KB_LLM_EXTRACTION_URL`/`KB_LLM_QUERY_URL` let an operator
/// point at any HTTP endpoint speaking the same prompt-in/text-out
/// contract as [`HttpLlm`]; absent either, the corresponding role is
/// served by [`NullLlm`] and the server degrades gracefully (raw FTS
/// search, `auto` strategy falls back to keyword scope resolution).
fn build_llm(env_var: &str, timeout: std::time::Duration) -> Arc<dyn LlmProvider> {
    match std::env::var(env_var) {
        Ok(endpoint) if !endpoint.trim().is_empty() => Arc::new(HttpLlm::new(endpoint, timeout)),
        _ => Arc::new(NullLlm),
    }
}

#[tokio::main]
async fn main() {
    let data_dir = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("kbase-mcp v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    let store_path = data_dir
        .or_else(|| config.store_path.clone())
        .unwrap_or_else(default_store_path);

    if let Some(parent) = store_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            error!("failed to create data directory {}: {}", parent.display(), e);
            std::process::exit(1);
        }
    }

    let store = match Storage::open(&store_path, config.embedding_dim) {
        Ok(s) => {
            info!(path = %store_path.display(), "store opened");
            Arc::new(s)
        }
        Err(e) => {
            error!("failed to open store at {}: {}", store_path.display(), e);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "embeddings")]
    let embedder: Option<Arc<dyn EmbeddingClient>> = Some(Arc::new(HttpEmbeddingClient::new(
        config.embedder_url.clone(),
        config.embedding_model.clone().unwrap_or_else(|| "default".to_string()),
        config.embedding_dim,
        config.embedder_timeout,
    )));
    #[cfg(not(feature = "embeddings"))]
    let embedder: Option<Arc<dyn EmbeddingClient>> = None;

    let extraction_llm = build_llm("KB_LLM_EXTRACTION_URL", config.embedder_timeout);
    let query_llm = build_llm("KB_LLM_QUERY_URL", config.embedder_timeout);

    let knowledge = Arc::new(KnowledgeServer::new(store, embedder, extraction_llm, query_llm));
    let mcp_server = McpServer::new(knowledge);
    let transport = StdioTransport::new();

    info!("starting MCP server on stdio...");
    if let Err(e) = transport.run(mcp_server).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    info!("kbase-mcp shutting down");
}
