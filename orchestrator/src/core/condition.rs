//! Conditions evaluated by conditional steps and custom post-conditions.

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::core::types::Params;

/// Outcome of a step as seen by a condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Raw result returned by the tool service (or `null` when nothing ran).
    Value(Value),
    /// Captured failure message.
    Failure(String),
}

impl Observation {
    /// Observation used when a condition has no prior result to look at.
    pub fn none() -> Self {
        Observation::Value(Value::Null)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Observation::Failure(_))
    }

    /// Text form used by `contains`: strings verbatim, everything else as JSON.
    pub fn stringify(&self) -> String {
        match self {
            Observation::Value(Value::String(text)) => text.clone(),
            Observation::Value(value) => value.to_string(),
            Observation::Failure(message) => message.clone(),
        }
    }
}

/// Synchronous check against one observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "RawCheck")]
pub enum Check {
    /// No failure was captured.
    Success,
    /// Stringified result contains `value`.
    Contains { value: String },
    /// Result is structurally equal to `value`.
    Equals { value: Value },
    /// Unrecognised kinds evaluate to true.
    #[serde(other)]
    Other,
}

/// Wire form of [`Check`]. `tool_result` is named so it cannot fall through
/// to [`Check::Other`].
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RawCheck {
    Success,
    Contains { value: String },
    Equals { value: Value },
    ToolResult {},
    #[serde(other)]
    Other,
}

impl TryFrom<RawCheck> for Check {
    type Error = &'static str;

    fn try_from(raw: RawCheck) -> Result<Self, Self::Error> {
        match raw {
            RawCheck::Success => Ok(Check::Success),
            RawCheck::Contains { value } => Ok(Check::Contains { value }),
            RawCheck::Equals { value } => Ok(Check::Equals { value }),
            RawCheck::ToolResult {} => Err("tool_result is only valid as a conditional step's condition"),
            RawCheck::Other => Ok(Check::Other),
        }
    }
}

impl Check {
    pub fn holds(&self, observation: &Observation) -> bool {
        match self {
            Check::Success => !observation.is_failure(),
            Check::Contains { value } => observation.stringify().contains(value.as_str()),
            Check::Equals { value } => match observation {
                Observation::Value(actual) => actual == value,
                Observation::Failure(_) => false,
            },
            Check::Other => true,
        }
    }
}

/// Condition guarding a conditional step.
///
/// `{"type": "tool_result", ...}` must parse as a full [`ToolProbe`]; any
/// other object is a [`Check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    /// Call a tool and check its fresh result.
    ToolResult(ToolProbe),
    /// Check the result of the preceding step.
    Check(Check),
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let parsed = if value.get("type").and_then(Value::as_str) == Some("tool_result") {
            ToolProbe::deserialize(value).map(Condition::ToolResult)
        } else {
            Check::deserialize(value).map(Condition::Check)
        };
        parsed.map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    ToolResult,
}

/// Fresh tool call whose result feeds `check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolProbe {
    #[serde(rename = "type")]
    pub kind: ProbeKind,
    pub tool: String,
    #[serde(default)]
    pub params: Params,
    pub check: Check,
}

impl ToolProbe {
    pub fn new(tool: impl Into<String>, params: Params, check: Check) -> Self {
        Self {
            kind: ProbeKind::ToolResult,
            tool: tool.into(),
            params,
            check,
        }
    }
}
