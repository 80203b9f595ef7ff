//! Tool-service abstraction.
//!
//! The [`ToolClient`] trait decouples workflow execution from the transport
//! used to reach the tool service. Tests use a scripted client that returns
//! predetermined results without any network traffic.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use crate::core::types::ConnectivityError;
use crate::core::types::Params;

/// Failure of a single tool call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    /// Unknown tool, bad parameters or an operation error reported by the service.
    #[error("tool {tool} failed: {message}")]
    Invocation { tool: String, message: String },

    #[error("tool {tool} timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },

    /// The service could not be reached at all.
    #[error("tool service unreachable: {0}")]
    Connectivity(String),
}

impl ToolError {
    pub fn invocation(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Invocation {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ToolError::Connectivity(_))
    }
}

/// Single-method capability for invoking named tools.
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn call_tool(&self, name: &str, params: &Params) -> Result<Value, ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connectivity_is_flagged_fatal() {
        assert!(ToolError::Connectivity("refused".to_string()).is_connectivity());
        assert!(!ToolError::invocation("tree", "unknown tool").is_connectivity());
        let timeout = ToolError::Timeout {
            tool: "execute_command".to_string(),
            timeout_ms: 30_000,
        };
        assert!(!timeout.is_connectivity());
        assert_eq!(
            timeout.to_string(),
            "tool execute_command timed out after 30000ms"
        );
    }
}
