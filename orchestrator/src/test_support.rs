//! Test-only helpers: instance builders and a scripted tool client.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::core::types::{Params, ProblemInstance};
use crate::io::tool_client::{ToolClient, ToolError};

/// Create a deterministic instance with no metadata.
pub fn instance(id: &str, statement: &str, tests: Vec<String>) -> ProblemInstance {
    ProblemInstance {
        instance_id: id.to_string(),
        repo: format!("org/{id}"),
        problem_statement: statement.to_string(),
        fail_to_pass: tests,
        version: None,
        test_file: None,
        file_hints: Vec::new(),
    }
}

/// Instance that scores 7 (long feature request with six failing tests).
pub fn complex_instance(id: &str) -> ProblemInstance {
    let statement = format!("Implement {}", "x".repeat(1490));
    let tests = (0..6)
        .map(|idx| format!("tests/test_core.py::test_case_{idx}"))
        .collect();
    instance(id, &statement, tests)
}

/// Scripted reply for one tool call.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Fail(String),
    Timeout,
    Unreachable,
}

impl Reply {
    fn into_result(self, tool: &str) -> Result<Value, ToolError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Fail(message) => Err(ToolError::invocation(tool, message)),
            Reply::Timeout => Err(ToolError::Timeout {
                tool: tool.to_string(),
                timeout_ms: 0,
            }),
            Reply::Unreachable => Err(ToolError::Connectivity("connection refused".to_string())),
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub tool: String,
    pub params: Params,
}

/// Tool client returning scripted replies and recording every call.
///
/// Queued replies for a tool are consumed first, then its sticky reply, then
/// the default `{"status": "ok"}`.
#[derive(Debug, Default)]
pub struct ScriptedToolClient {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedToolClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer `tool` with `value`.
    pub fn respond(mut self, tool: &str, value: Value) -> Self {
        self.sticky.insert(tool.to_string(), Reply::Ok(value));
        self
    }

    /// Always fail `tool` with an invocation error.
    pub fn fail(mut self, tool: &str, message: &str) -> Self {
        self.sticky
            .insert(tool.to_string(), Reply::Fail(message.to_string()));
        self
    }

    /// Always report the service as unreachable for `tool`.
    pub fn unreachable(mut self, tool: &str) -> Self {
        self.sticky.insert(tool.to_string(), Reply::Unreachable);
        self
    }

    /// Queue a one-shot reply for `tool`.
    pub fn then(self, tool: &str, reply: Reply) -> Self {
        self.queued
            .lock()
            .expect("queued lock")
            .entry(tool.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Delay every reply for `tool`.
    pub fn delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.tool).collect()
    }

    pub fn count(&self, tool: &str) -> usize {
        self.calls().iter().filter(|call| call.tool == tool).count()
    }

    fn next_reply(&self, tool: &str) -> Reply {
        let queued = self
            .queued
            .lock()
            .expect("queued lock")
            .get_mut(tool)
            .and_then(VecDeque::pop_front);
        queued
            .or_else(|| self.sticky.get(tool).cloned())
            .unwrap_or_else(|| Reply::Ok(json!({ "status": "ok" })))
    }
}

#[async_trait]
impl ToolClient for ScriptedToolClient {
    async fn call_tool(&self, name: &str, params: &Params) -> Result<Value, ToolError> {
        self.calls.lock().expect("calls lock").push(RecordedCall {
            tool: name.to_string(),
            params: params.clone(),
        });
        let reply = self.next_reply(name);
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        reply.into_result(name)
    }
}
