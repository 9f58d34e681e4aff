//! MCP Server Core
//!
//! Routes JSON-RPC requests to the six knowledge-base operations exposed
//! by [`kbase_core::KnowledgeServer`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::tools;
use kbase_core::KnowledgeServer;

/// MCP server implementation. Wraps a [`KnowledgeServer`] and speaks
/// JSON-RPC 2.0 over whatever transport drives `handle_request`.
pub struct McpServer {
    knowledge: Arc<KnowledgeServer>,
    initialized: bool,
}

impl McpServer {
    pub fn new(knowledge: Arc<KnowledgeServer>) -> Self {
        Self {
            knowledge,
            initialized: false,
        }
    }

    /// Handle an incoming JSON-RPC request. Returns `None` for
    /// notifications, which have no response.
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params).await,
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    async fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => InitializeRequest::default(),
        };

        // Claude Desktop rejects servers advertising a newer protocol
        // version than the client asked for; echo the client's if older.
        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            info!("client requested older protocol version {}, using it", request.protocol_version);
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;
        info!("MCP session initialized with protocol version {}", negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            capabilities: ServerCapabilities {
                tools: serde_json::json!({ "listChanged": false }),
            },
            server_info: ServerInfo {
                name: "kbase".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let tools = vec![
            ToolDescription {
                name: "store".to_string(),
                description: "Store a single knowledge base entry and run it through embedding, \
                    the deterministic graph builder, and LLM entity enrichment."
                    .to_string(),
                input_schema: tools::knowledge::store_schema(),
            },
            ToolDescription {
                name: "store_batch".to_string(),
                description: "Store up to 10 entries in one call, each going through the same \
                    pipeline as store."
                    .to_string(),
                input_schema: tools::knowledge::store_batch_schema(),
            },
            ToolDescription {
                name: "search".to_string(),
                description: "Hybrid BM25 + dense-vector search over stored entries, fused by \
                    Reciprocal Rank Fusion and filtered by confidence decay."
                    .to_string(),
                input_schema: tools::search::schema(),
            },
            ToolDescription {
                name: "get".to_string(),
                description: "Fetch up to 20 entries by id. Touches last_accessed on every hit."
                    .to_string(),
                input_schema: tools::knowledge::get_schema(),
            },
            ToolDescription {
                name: "ask".to_string(),
                description: "Answer a natural-language question by routing it through the \
                    knowledge graph's query planner."
                    .to_string(),
                input_schema: tools::graph::ask_schema(),
            },
            ToolDescription {
                name: "summarize".to_string(),
                description: "Answer a question in prose, synthesized from the entries ask would \
                    return."
                    .to_string(),
                input_schema: tools::graph::summarize_schema(),
            },
        ];

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing tool call arguments")),
        };

        let args = Some(request.arguments);
        let outcome = match request.name.as_str() {
            "store" => tools::knowledge::execute_store(&self.knowledge, args).await,
            "store_batch" => tools::knowledge::execute_store_batch(&self.knowledge, args).await,
            "search" => tools::search::execute(&self.knowledge, args).await,
            "get" => tools::knowledge::execute_get(&self.knowledge, args).await,
            "ask" => tools::graph::execute_ask(&self.knowledge, args).await,
            "summarize" => tools::graph::execute_summarize(&self.knowledge, args).await,
            other => {
                return Err(JsonRpcError::method_not_found_with_message(&format!(
                    "unknown tool: {other}"
                )))
            }
        };

        let result = match outcome {
            Ok(value) => CallToolResult::text(&value),
            Err(message) => CallToolResult::error(message),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}
