//! MCP Server Implementation
//!
//! This module contains the transport-independent half of the server:
//! - JSON-RPC 2.0 request/response structures
//! - Tool registry holding the advertised tool descriptors
//! - [`McpServer`], the dispatcher both transports feed requests into

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::config::Config;
use crate::core::credential;
use crate::core::error::ToolError;
use crate::tools::{self, ToolCall};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 request structure for MCP protocol.
///
/// `id` is `None` for notifications, which never get a response. An explicit
/// `"id": null` is kept as `Some(Value::Null)` so it can be rejected.
#[derive(Deserialize, Debug)]
pub struct MCPRequest {
    /// JSON-RPC version identifier, must be "2.0"
    #[allow(dead_code)]
    pub jsonrpc: String,
    /// Request ID for correlating responses. Absent for notifications.
    #[serde(default, deserialize_with = "present_id")]
    pub id: Option<Value>,
    /// MCP method name (e.g., "initialize", "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters
    pub params: Option<Value>,
}

/// Any `id` that is present, `null` included, becomes `Some`.
fn present_id<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// JSON-RPC 2.0 response structure for MCP protocol.
///
/// Exactly one of `result` and `error` is present.
#[derive(Serialize, Debug)]
pub struct MCPResponse {
    /// JSON-RPC version identifier, always "2.0"
    jsonrpc: &'static str,
    /// Request ID from the original request; null when it could not be read
    id: Option<Value>,
    /// Response result, present when request succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error information, present when request failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MCPError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Debug)]
pub struct MCPError {
    /// JSON-RPC error code (e.g., -32601 for method not found)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Optional additional error data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl MCPResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(MCPError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Error response for a line that could not be read as a request.
    ///
    /// Valid JSON that is not a request keeps its `id` (if it has one) and is
    /// an invalid request; anything else is a parse error with a null id.
    pub fn unreadable(raw: &[u8], err: &serde_json::Error) -> Self {
        match serde_json::from_slice::<Value>(raw) {
            Ok(partial) => Self::error(
                partial.get("id").filter(|id| !id.is_null()).cloned(),
                INVALID_REQUEST,
                format!("Invalid request: {err}"),
            ),
            Err(_) => Self::error(None, PARSE_ERROR, format!("Parse error: {err}")),
        }
    }

    #[cfg(test)]
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }
}

/// MCP tool definition structure, as returned by `tools/list`.
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MCPTool {
    /// Unique tool identifier (e.g., "get_daily_todo")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// JSON Schema defining the tool's input parameters
    pub input_schema: Value,
}

/// Registry of advertised tools.
///
/// Only descriptors live here. Execution goes through [`ToolCall`], so a
/// registered name that [`ToolCall::parse`] does not know is never callable.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<MCPTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: MCPTool) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[MCPTool] {
        &self.tools
    }
}

/// Parameters of a `tools/call` request.
#[derive(Deserialize, Debug, Default)]
pub struct CallToolParams {
    /// Name of the tool to call
    #[serde(default)]
    pub name: String,
    /// Missing and `null` are both treated as "no arguments"
    #[serde(default)]
    pub arguments: Option<Value>,
    /// Request metadata (`_meta` on the wire)
    #[serde(default, rename = "_meta")]
    pub meta: Option<RequestMeta>,
}

/// Per-request metadata. `auth` carries client-supplied credentials.
#[derive(Deserialize, Debug, Default)]
pub struct RequestMeta {
    /// Credentials keyed by name, e.g. `PERPLEXITY_API_KEY`
    #[serde(default)]
    pub auth: Option<Map<String, Value>>,
}

/// Text content item in a tool result.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text, serialized as `{"type": "text", "text": ...}`
    Text { text: String },
}

/// Result envelope of `tools/call`. Tool failures are reported here with
/// `is_error` set, never as JSON-RPC errors.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    /// Result content, a single text item for every tool here
    pub content: Vec<Content>,
    /// Set when the call failed; `isError` on the wire
    pub is_error: bool,
}

impl CallToolResult {
    pub fn text(text: String) -> Self {
        Self {
            content: vec![Content::Text { text }],
            is_error: false,
        }
    }

    pub fn error(text: String) -> Self {
        Self {
            content: vec![Content::Text { text }],
            is_error: true,
        }
    }
}

/// Request dispatcher shared by both transports.
///
/// Immutable after construction; share it with an `Arc`.
pub struct McpServer {
    config: Arc<Config>,
    registry: ToolRegistry,
}

impl McpServer {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            registry: tools::registry(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.server_name
    }

    /// Handle one JSON-RPC message. Returns `None` for notifications.
    pub async fn handle(&self, req: MCPRequest) -> Option<MCPResponse> {
        let id = match req.id {
            None => {
                debug!(method = %req.method, "notification received");
                return None;
            }
            Some(Value::Null) => {
                warn!(method = %req.method, "request with null id rejected");
                return Some(MCPResponse::error(None, INVALID_REQUEST, "Invalid request: id must not be null"));
            }
            Some(id) => Some(id),
        };

        debug!(method = %req.method, "request received");
        let response = match req.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => MCPResponse::success(id, serde_json::json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, req.params).await,
            other => MCPResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {other}")),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.config.server_name,
                    "version": self.config.server_version
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Option<Value>) -> MCPResponse {
        MCPResponse::success(id, serde_json::json!({ "tools": self.registry.tools() }))
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> MCPResponse {
        let params = match params {
            Some(raw) => match serde_json::from_value::<CallToolParams>(raw) {
                Ok(p) => p,
                Err(e) => return MCPResponse::error(id, INVALID_PARAMS, format!("Invalid params: {e}")),
            },
            None => CallToolParams::default(),
        };

        let result = self.call_tool(params).await;
        match serde_json::to_value(&result) {
            Ok(value) => MCPResponse::success(id, value),
            Err(e) => MCPResponse::error(id, INTERNAL_ERROR, format!("Error serializing result: {e}")),
        }
    }

    /// Run a tool call and fold any failure into the error envelope.
    pub async fn call_tool(&self, params: CallToolParams) -> CallToolResult {
        let name = params.name.clone();
        match self.try_call_tool(params).await {
            Ok(text) => CallToolResult::text(text),
            Err(err) => {
                warn!(tool = %name, error = %err, "tool call failed");
                CallToolResult::error(err.envelope_text())
            }
        }
    }

    async fn try_call_tool(&self, params: CallToolParams) -> Result<String, ToolError> {
        let auth = params.meta.as_ref().and_then(|meta| meta.auth.as_ref());
        let credential = credential::resolve(self.config.api_key(), auth)?;
        debug!(source = ?credential.source, "credential present");

        let arguments = params.arguments.ok_or(ToolError::MissingArguments)?;
        let call = ToolCall::parse(&params.name, arguments)?;
        debug!(tool = call.name(), "dispatching tool call");
        call.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server_with_key(key: Option<&str>) -> McpServer {
        McpServer::new(Arc::new(Config {
            perplexity_api_key: key.map(str::to_string),
            ..Config::default()
        }))
    }

    fn request(value: Value) -> MCPRequest {
        serde_json::from_value(value).unwrap()
    }

    async fn call(server: &McpServer, params: Value) -> Value {
        let response = server
            .handle(request(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": params
            })))
            .await
            .unwrap();
        assert!(response.error.is_none());
        response.result.unwrap()
    }

    #[tokio::test]
    async fn tools_list_returns_single_tool() {
        let server = server_with_key(None);
        let response = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" })))
            .await
            .unwrap();
        assert_eq!(response.id(), Some(&json!(7)));
        let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "get_daily_todo");
        assert!(tools[0].get("inputSchema").is_some());
    }

    #[tokio::test]
    async fn call_with_empty_arguments_succeeds() {
        let server = server_with_key(Some("sk-test"));
        let result = call(&server, json!({ "name": "get_daily_todo", "arguments": {} })).await;
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("待办事项列表:"));
        assert_eq!(text.matches("标题: ").count(), 5);
    }

    #[tokio::test]
    async fn call_output_is_stable_across_calls() {
        let server = server_with_key(Some("sk-test"));
        let params = json!({ "name": "get_daily_todo", "arguments": { "erp": "X1" } });
        let first = call(&server, params.clone()).await;
        let second = call(&server, params).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_credential_is_content_error() {
        let server = server_with_key(None);
        let result = call(&server, json!({ "name": "get_daily_todo", "arguments": {} })).await;
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("PERPLEXITY_API_KEY not set"));
    }

    #[tokio::test]
    async fn request_auth_satisfies_credential_gate() {
        let server = server_with_key(None);
        let result = call(
            &server,
            json!({
                "name": "get_daily_todo",
                "arguments": {},
                "_meta": { "auth": { "PERPLEXITY_API_KEY": "sk-request" } }
            }),
        )
        .await;
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn credential_is_checked_before_tool_name() {
        let server = server_with_key(None);
        let result = call(&server, json!({ "name": "nonexistent", "arguments": {} })).await;
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("PERPLEXITY_API_KEY not set"));
    }

    #[tokio::test]
    async fn unknown_tool_is_content_error() {
        let server = server_with_key(Some("sk-test"));
        let result = call(&server, json!({ "name": "nonexistent", "arguments": {} })).await;
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Unknown tool: nonexistent");
    }

    #[tokio::test]
    async fn missing_arguments_is_content_error() {
        let server = server_with_key(Some("sk-test"));
        for params in [json!({ "name": "get_daily_todo" }), json!({ "name": "get_daily_todo", "arguments": null })] {
            let result = call(&server, params).await;
            assert_eq!(result["isError"], true);
            assert!(result["content"][0]["text"]
                .as_str()
                .unwrap()
                .contains("No arguments provided"));
        }
    }

    #[tokio::test]
    async fn mistyped_arguments_are_content_error() {
        let server = server_with_key(Some("sk-test"));
        let result = call(&server, json!({ "name": "get_daily_todo", "arguments": { "erp": 12 } })).await;
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .starts_with("Error: Invalid arguments for get_daily_todo"));
    }

    #[tokio::test]
    async fn malformed_params_are_protocol_error() {
        let server = server_with_key(Some("sk-test"));
        let response = server
            .handle(request(json!({
                "jsonrpc": "2.0",
                "id": 3,
                "method": "tools/call",
                "params": { "name": 5 }
            })))
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, INVALID_PARAMS);
    }

    #[tokio::test]
    async fn initialize_advertises_tools_only() {
        let server = server_with_key(None);
        let response = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": "init", "method": "initialize", "params": {} })))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["capabilities"], json!({ "tools": {} }));
        assert_eq!(result["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let server = server_with_key(None);
        let response = server
            .handle(request(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" })))
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn null_id_is_invalid_request() {
        let server = server_with_key(None);
        let req = request(json!({ "jsonrpc": "2.0", "id": null, "method": "tools/list" }));
        assert_eq!(req.id, Some(Value::Null));
        let response = server.handle(req).await.unwrap();
        assert_eq!(response.error.as_ref().unwrap().code, INVALID_REQUEST);
        assert!(response.id().is_none());
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn unknown_method_is_protocol_error() {
        let server = server_with_key(None);
        let response = server
            .handle(request(json!({ "jsonrpc": "2.0", "id": 2, "method": "resources/list" })))
            .await
            .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, METHOD_NOT_FOUND);
        assert_eq!(error.message, "Method not found: resources/list");
    }

    #[test]
    fn call_tool_result_serializes_with_camel_case_flag() {
        let value = serde_json::to_value(CallToolResult::error("boom".to_string())).unwrap();
        assert_eq!(value, json!({ "content": [{ "type": "text", "text": "boom" }], "isError": true }));
    }

    #[test]
    fn unreadable_line_maps_to_parse_or_invalid_request() {
        let err = serde_json::from_str::<MCPRequest>("{not json").unwrap_err();
        let response = MCPResponse::unreadable(b"{not json", &err);
        assert_eq!(response.error.as_ref().unwrap().code, PARSE_ERROR);
        assert!(response.id().is_none());

        let raw = r#"{"jsonrpc":"2.0","id":9}"#;
        let err = serde_json::from_str::<MCPRequest>(raw).unwrap_err();
        let response = MCPResponse::unreadable(raw.as_bytes(), &err);
        assert_eq!(response.error.as_ref().unwrap().code, INVALID_REQUEST);
        assert_eq!(response.id(), Some(&json!(9)));
    }
}
