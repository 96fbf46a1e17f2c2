//! MCP tool surface over stdio.
//!
//! Exposes the broker's fulfiller operations to an agent as two tools:
//! `get_pending_requests` and `submit_response`. Messages are
//! newline-delimited JSON-RPC 2.0; stdout carries nothing else.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use standin::broker::Broker;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::protocol::{JsonRpcId, JsonRpcRequest, JsonRpcResponse, error_codes};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "standin";

const GET_PENDING: &str = "get_pending_requests";
const SUBMIT_RESPONSE: &str = "submit_response";

/// Serves broker tools to one MCP client.
pub struct McpServer {
    broker: Arc<Broker>,
}

impl McpServer {
    pub fn new(broker: Arc<Broker>) -> Self {
        Self { broker }
    }

    /// Serve requests from `reader` until EOF, writing responses to `writer`.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        info!("mcp server ready");

        while let Some(line) = lines.next_line().await.context("read mcp request")? {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(request = trimmed, "mcp request");

            let Some(response) = self.handle_line(trimmed) else {
                continue;
            };
            let mut payload = serde_json::to_string(&response).context("serialize mcp response")?;
            payload.push('\n');
            writer
                .write_all(payload.as_bytes())
                .await
                .context("write mcp response")?;
            writer.flush().await.context("flush mcp response")?;
        }

        info!("mcp input closed");
        Ok(())
    }

    /// Handle one raw message. Notifications produce no response.
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "unparseable mcp message");
                return Some(JsonRpcResponse::error(
                    None,
                    error_codes::PARSE_ERROR,
                    format!("parse error: {err}"),
                ));
            }
        };
        let request: JsonRpcRequest = match serde_json::from_value(message.clone()) {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "invalid mcp request");
                let id = message
                    .get("id")
                    .and_then(|id| serde_json::from_value(id.clone()).ok());
                return Some(JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_REQUEST,
                    format!("invalid request: {err}"),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let id = request.id?;
        Some(self.dispatch(id, &request.method, request.params))
    }

    fn dispatch(&self, id: JsonRpcId, method: &str, params: Option<Value>) -> JsonRpcResponse {
        match method {
            "initialize" => JsonRpcResponse::success(
                Some(id),
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION")},
                }),
            ),
            "ping" => JsonRpcResponse::success(Some(id), json!({})),
            "tools/list" => JsonRpcResponse::success(Some(id), json!({"tools": tool_definitions()})),
            "tools/call" => self.call_tool(id, params),
            other => JsonRpcResponse::error(
                Some(id),
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            ),
        }
    }

    fn call_tool(&self, id: JsonRpcId, params: Option<Value>) -> JsonRpcResponse {
        let params = params.unwrap_or(Value::Null);
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return JsonRpcResponse::error(
                Some(id),
                error_codes::INVALID_PARAMS,
                "tools/call requires a tool name",
            );
        };
        let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

        let result = match name {
            GET_PENDING => self.get_pending_requests(),
            SUBMIT_RESPONSE => self.submit_response(&arguments),
            other => {
                return JsonRpcResponse::error(
                    Some(id),
                    error_codes::INVALID_PARAMS,
                    format!("unknown tool: {other}"),
                );
            }
        };
        JsonRpcResponse::success(Some(id), result)
    }

    fn get_pending_requests(&self) -> Value {
        match serde_json::to_string_pretty(&self.broker.list_pending()) {
            Ok(text) => tool_text(text),
            Err(err) => tool_error(format!("failed to marshal pending requests: {err}")),
        }
    }

    fn submit_response(&self, arguments: &Value) -> Value {
        let Some(request_id) = arguments.get("request_id").and_then(Value::as_str) else {
            return tool_error("request_id is required and must be a string");
        };
        let Some(response_json) = arguments.get("response_json").and_then(Value::as_str) else {
            return tool_error("response_json is required and must be a string");
        };

        match self
            .broker
            .fulfill(request_id, response_json.as_bytes().to_vec())
        {
            Ok(()) => {
                info!(id = request_id, "fulfilled via mcp");
                tool_text(
                    "Response submitted. The blocked HTTP request has been fulfilled.".to_string(),
                )
            }
            Err(err) => tool_error(format!("failed to submit response: {err}")),
        }
    }
}

fn tool_text(text: String) -> Value {
    json!({"content": [{"type": "text", "text": text}], "isError": false})
}

fn tool_error(message: impl Into<String>) -> Value {
    json!({"content": [{"type": "text", "text": message.into()}], "isError": true})
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": GET_PENDING,
            "description": "Retrieves all HTTP requests currently intercepted and blocked, waiting for an agent to supply a mocked response.",
            "inputSchema": {"type": "object", "properties": {}},
        },
        {
            "name": SUBMIT_RESPONSE,
            "description": "Submits a mocked JSON response to unblock a pending HTTP request.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "request_id": {
                        "type": "string",
                        "description": "The ID of the pending request to fulfill.",
                    },
                    "response_json": {
                        "type": "string",
                        "description": "The raw JSON string to return to the blocked HTTP client.",
                    },
                },
                "required": ["request_id", "response_json"],
            },
        },
    ])
}
