//! JSON-RPC transport to an MCP tool service over HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::core::types::Params;
use crate::io::config::SolverConfig;
use crate::io::tool_client::{ToolClient, ToolError};

/// Extra time granted on top of an explicit `timeout_ms` parameter.
pub const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Tool client speaking MCP `tools/call` over HTTP.
pub struct McpHttpClient {
    http: reqwest::Client,
    endpoint: String,
    default_timeout: Duration,
    next_id: AtomicU64,
}

impl McpHttpClient {
    pub fn new(endpoint: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            default_timeout,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn from_config(cfg: &SolverConfig) -> Self {
        Self::new(cfg.endpoint.clone(), cfg.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check reachability by listing tools. Returns the advertised tool names.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn ping(&self) -> Result<Vec<String>, ToolError> {
        let result = self
            .rpc("tools/list", json!({}), "tools/list", self.default_timeout)
            .await?;
        let names = result
            .get("tools")
            .and_then(Value::as_array)
            .map(|tools| {
                tools
                    .iter()
                    .filter_map(|tool| tool.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        debug!(tools = ?names, "tool service reachable");
        Ok(names)
    }

    async fn rpc(
        &self,
        method: &str,
        params: Value,
        tool: &str,
        timeout: Duration,
    ) -> Result<Value, ToolError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(&request)
            .send()
            .await
            .map_err(|err| map_transport_error(tool, timeout, &err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::invocation(tool, format!("http status {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| map_transport_error(tool, timeout, &err))?;

        if let Some(error) = body.error {
            return Err(ToolError::invocation(
                tool,
                format!("{} (code {})", error.message, error.code),
            ));
        }
        body.result
            .ok_or_else(|| ToolError::invocation(tool, "response carried no result"))
    }
}

#[async_trait]
impl ToolClient for McpHttpClient {
    #[instrument(skip_all, fields(tool = name))]
    async fn call_tool(&self, name: &str, params: &Params) -> Result<Value, ToolError> {
        let timeout = request_timeout(params, self.default_timeout);
        let result = self
            .rpc(
                "tools/call",
                json!({ "name": name, "arguments": params }),
                name,
                timeout,
            )
            .await?;
        decode_tool_result(name, result)
    }
}

/// Timeout for one call: an explicit `timeout_ms` plus grace, or the default.
pub fn request_timeout(params: &Params, default: Duration) -> Duration {
    params
        .get("timeout_ms")
        .and_then(Value::as_u64)
        .map(|ms| Duration::from_millis(ms) + TIMEOUT_GRACE)
        .map_or(default, |explicit| explicit.max(default))
}

fn map_transport_error(tool: &str, timeout: Duration, err: &reqwest::Error) -> ToolError {
    if err.is_timeout() {
        ToolError::Timeout {
            tool: tool.to_string(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if err.is_connect() {
        warn!(tool, error = %err, "tool service connection failed");
        ToolError::Connectivity(err.to_string())
    } else {
        ToolError::invocation(tool, err.to_string())
    }
}

/// Unwrap an MCP `tools/call` result into the value workflows consume.
///
/// - `isError: true` becomes an invocation error carrying the text content.
/// - Text content is joined; text that parses as JSON is returned decoded.
/// - Results without a `content` array are returned unchanged.
pub fn decode_tool_result(tool: &str, result: Value) -> Result<Value, ToolError> {
    let Some(content) = result.get("content").and_then(Value::as_array) else {
        return Ok(result);
    };

    let text = content
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|item| item.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n");

    if result.get("isError").and_then(Value::as_bool) == Some(true) {
        let message = if text.is_empty() {
            "tool reported an error".to_string()
        } else {
            text
        };
        return Err(ToolError::invocation(tool, message));
    }

    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}
