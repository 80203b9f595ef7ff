//! Shared deterministic types for the orchestration core.
//!
//! These types define stable contracts between core components. They hold no
//! per-run state and never perform I/O.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Parameter mapping passed to a tool call.
pub type Params = Map<String, Value>;

/// Problem category assigned by the classifier.
///
/// Declaration order doubles as classifier priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemCategory {
    BugFix,
    Feature,
    Refactor,
    TestFix,
    Documentation,
    Performance,
}

impl ProblemCategory {
    pub const ALL: [ProblemCategory; 6] = [
        ProblemCategory::BugFix,
        ProblemCategory::Feature,
        ProblemCategory::Refactor,
        ProblemCategory::TestFix,
        ProblemCategory::Documentation,
        ProblemCategory::Performance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProblemCategory::BugFix => "bug_fix",
            ProblemCategory::Feature => "feature",
            ProblemCategory::Refactor => "refactor",
            ProblemCategory::TestFix => "test_fix",
            ProblemCategory::Documentation => "documentation",
            ProblemCategory::Performance => "performance",
        }
    }
}

impl fmt::Display for ProblemCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One repair task as handed to the solver.
///
/// Field names follow SWE-bench exports so dataset rows deserialize directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemInstance {
    pub instance_id: String,
    /// Repository reference (slug or local path) used as the search root.
    pub repo: String,
    pub problem_statement: String,
    /// Tests expected to move from failing to passing.
    #[serde(
        default,
        alias = "FAIL_TO_PASS",
        deserialize_with = "list_or_encoded_list"
    )]
    pub fail_to_pass: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_file: Option<String>,
    /// Files the caller believes are relevant to the fix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_hints: Vec<String>,
}

impl ProblemInstance {
    /// Test target for single-command test runs: explicit test file, else first failing test.
    pub fn test_target(&self) -> &str {
        self.test_file
            .as_deref()
            .or_else(|| self.fail_to_pass.first().map(String::as_str))
            .unwrap_or("")
    }
}

/// SWE-bench stores `FAIL_TO_PASS` as a JSON-encoded string; accept either form.
fn list_or_encoded_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Encoded(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(list) => Ok(list),
        Raw::Encoded(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Raw::Encoded(raw) => serde_json::from_str(&raw).map_err(de::Error::custom),
    }
}

/// Fatal error: the tool service is unreachable and the run cannot continue.
///
/// Every other tool failure is captured into the step that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("tool service unreachable while running {tool}: {message}")]
pub struct ConnectivityError {
    pub tool: String,
    pub message: String,
}

impl ConnectivityError {
    pub fn new(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Tri-state status recorded for every attempted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    Skipped,
}

/// Named strategy selectable by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Basic,
    Advanced,
    Hybrid,
    Custom,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Basic => "basic",
            StrategyKind::Advanced => "advanced",
            StrategyKind::Hybrid => "hybrid",
            StrategyKind::Custom => "custom",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(StrategyKind::Basic),
            "advanced" => Ok(StrategyKind::Advanced),
            "hybrid" => Ok(StrategyKind::Hybrid),
            "custom" => Ok(StrategyKind::Custom),
            other => Err(format!(
                "unknown strategy '{other}' (expected basic, advanced, hybrid or custom)"
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow shape picked for an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Fixed search → read → test chain.
    Minimal,
    /// Category chain from the registry.
    ToolChain,
    /// Analysis → planning → implementation → validation.
    Phased,
    /// Caller-authored workflow.
    Custom,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Minimal => "minimal",
            Route::ToolChain => "tool_chain",
            Route::Phased => "phased",
            Route::Custom => "custom",
        }
    }
}
