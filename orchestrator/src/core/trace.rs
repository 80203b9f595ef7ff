//! Execution trace records produced by workflow runs.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::condition::Observation;
use crate::core::types::{ConnectivityError, Params, StepStatus};

/// Record of one tool invocation (after retries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStepResult {
    pub tool: String,
    /// Parameters after completion from instance data.
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: StepStatus,
    /// Calls made to the tool service; 0 for skipped steps.
    pub attempts: u32,
}

impl ExecutionStepResult {
    pub fn success(tool: impl Into<String>, params: Params, result: Value, attempts: u32) -> Self {
        Self {
            tool: tool.into(),
            params,
            result: Some(result),
            error: None,
            status: StepStatus::Success,
            attempts,
        }
    }

    pub fn failed(tool: impl Into<String>, params: Params, error: impl Into<String>, attempts: u32) -> Self {
        Self {
            tool: tool.into(),
            params,
            result: None,
            error: Some(error.into()),
            status: StepStatus::Failed,
            attempts,
        }
    }

    pub fn skipped(tool: impl Into<String>, params: Params, reason: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params,
            result: None,
            error: Some(reason.into()),
            status: StepStatus::Skipped,
            attempts: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Success
    }

    pub fn observation(&self) -> Observation {
        match (self.status, &self.result) {
            (StepStatus::Success, Some(value)) => Observation::Value(value.clone()),
            (StepStatus::Success, None) | (StepStatus::Skipped, _) => Observation::none(),
            (StepStatus::Failed, _) => {
                Observation::Failure(self.error.clone().unwrap_or_default())
            }
        }
    }

    /// JSON value standing in for this result inside a parallel group.
    fn as_group_member(&self) -> Value {
        match (&self.result, &self.error) {
            (Some(value), _) => value.clone(),
            (None, Some(error)) => json!({ "error": error }),
            (None, None) => Value::Null,
        }
    }
}

/// One entry of an execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEntry {
    Tool(ExecutionStepResult),
    /// Member results in declaration order.
    Parallel { results: Vec<ExecutionStepResult> },
    Branch {
        condition_met: bool,
        /// Fresh tool call made to evaluate the condition, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        probe: Option<ExecutionStepResult>,
        taken: Box<TraceEntry>,
    },
}

impl TraceEntry {
    /// Whether the entry counts as a successful step.
    ///
    /// A parallel group succeeds only when every member succeeded.
    pub fn is_success(&self) -> bool {
        match self {
            TraceEntry::Tool(result) => result.is_success(),
            TraceEntry::Parallel { results } => results.iter().all(ExecutionStepResult::is_success),
            TraceEntry::Branch { taken, .. } => taken.is_success(),
        }
    }

    /// Whether any tool call in the entry finally failed. Skipped calls do not count.
    pub fn has_failure(&self) -> bool {
        match self {
            TraceEntry::Tool(result) => result.status == StepStatus::Failed,
            TraceEntry::Parallel { results } => {
                results.iter().any(|result| result.status == StepStatus::Failed)
            }
            TraceEntry::Branch { probe, taken, .. } => {
                probe
                    .as_ref()
                    .is_some_and(|probe| probe.status == StepStatus::Failed)
                    || taken.has_failure()
            }
        }
    }

    /// What a following condition sees for this entry.
    pub fn observation(&self) -> Observation {
        match self {
            TraceEntry::Tool(result) => result.observation(),
            TraceEntry::Parallel { results } => {
                let members: Vec<Value> = results.iter().map(ExecutionStepResult::as_group_member).collect();
                let value = json!({ "parallel_results": members });
                if self.is_success() {
                    Observation::Value(value)
                } else {
                    Observation::Failure(value.to_string())
                }
            }
            TraceEntry::Branch { taken, .. } => taken.observation(),
        }
    }

    /// Tool results in execution order, flattening groups and branches.
    pub fn tool_results(&self) -> Vec<&ExecutionStepResult> {
        let mut out = Vec::new();
        self.collect_tool_results(&mut out);
        out
    }

    fn collect_tool_results<'a>(&'a self, out: &mut Vec<&'a ExecutionStepResult>) {
        match self {
            TraceEntry::Tool(result) => out.push(result),
            TraceEntry::Parallel { results } => out.extend(results.iter()),
            TraceEntry::Branch { probe, taken, .. } => {
                if let Some(probe) = probe {
                    out.push(probe);
                }
                taken.collect_tool_results(out);
            }
        }
    }
}

/// Ordered record of a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    pub entries: Vec<TraceEntry>,
    /// A custom post-condition evaluated false and the run stopped.
    #[serde(default)]
    pub terminated_early: bool,
    /// The tool service became unreachable; remaining steps were not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aborted: Option<ConnectivityError>,
}

impl ExecutionTrace {
    pub fn push(&mut self, entry: TraceEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = TraceEntry>) {
        self.entries.extend(entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_observation(&self) -> Option<Observation> {
        self.entries.last().map(TraceEntry::observation)
    }

    /// Tool results across all entries, in execution order.
    pub fn tool_results(&self) -> Vec<&ExecutionStepResult> {
        self.entries.iter().flat_map(TraceEntry::tool_results).collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Entries containing a finally failed tool call.
    pub fn failed_steps(&self) -> usize {
        self.entries.iter().filter(|entry| entry.has_failure()).count()
    }
}

/// Phase of the high-complexity pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analysis,
    Planning,
    Implementation,
    Validation,
}

impl Phase {
    pub const ORDER: [Phase; 4] = [
        Phase::Analysis,
        Phase::Planning,
        Phase::Implementation,
        Phase::Validation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Analysis => "analysis",
            Phase::Planning => "planning",
            Phase::Implementation => "implementation",
            Phase::Validation => "validation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Complete,
    Failed,
}

/// Name, completion status and trace of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub phase: Phase,
    pub status: PhaseStatus,
    pub trace: ExecutionTrace,
}

impl PhaseReport {
    pub fn new(phase: Phase, status: PhaseStatus, trace: ExecutionTrace) -> Self {
        Self {
            phase,
            status,
            trace,
        }
    }
}

/// Output of the analysis phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    /// Files the later phases operate on.
    pub candidate_files: Vec<String>,
    /// Files matched directly by the derived search pattern.
    pub located_files: Vec<String>,
}

/// Output of the planning phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub files: Vec<String>,
}

/// Before/after contents of one edited file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEdit {
    pub path: String,
    pub original: String,
    pub updated: String,
}

/// Outcome of running the fail-to-pass tests.
///
/// `tests_pass` is false when no test ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub tests_pass: bool,
    /// Tests that were actually run, in order.
    pub tests_run: Vec<String>,
    /// First test that did not pass, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_failure: Option<String>,
    /// Concatenated test output.
    #[serde(default)]
    pub output: String,
}

/// Phase reports plus the artifacts threaded between phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasedRun {
    pub phases: Vec<PhaseReport>,
    pub analysis: Analysis,
    pub plan: Plan,
    pub edits: Vec<FileEdit>,
    pub validation: ValidationOutcome,
}

impl PhasedRun {
    pub fn phase_names(&self) -> Vec<&'static str> {
        self.phases.iter().map(|report| report.phase.as_str()).collect()
    }

    /// Connectivity error that stopped the pipeline, if any.
    pub fn aborted(&self) -> Option<&ConnectivityError> {
        self.phases
            .iter()
            .find_map(|report| report.trace.aborted.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(tool: &str, value: Value) -> ExecutionStepResult {
        ExecutionStepResult::success(tool, Params::new(), value, 1)
    }

    fn failed(tool: &str) -> ExecutionStepResult {
        ExecutionStepResult::failed(tool, Params::new(), "boom", 3)
    }

    #[test]
    fn parallel_group_succeeds_only_when_all_members_do() {
        let all_ok = TraceEntry::Parallel {
            results: vec![ok("a", json!(1)), ok("b", json!(2))],
        };
        assert!(all_ok.is_success());
        assert_eq!(
            all_ok.observation(),
            Observation::Value(json!({ "parallel_results": [1, 2] }))
        );

        let one_failed = TraceEntry::Parallel {
            results: vec![ok("a", json!(1)), failed("b")],
        };
        assert!(!one_failed.is_success());
        match one_failed.observation() {
            Observation::Failure(text) => assert!(text.contains("boom")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn branch_reports_taken_entry() {
        let entry = TraceEntry::Branch {
            condition_met: true,
            probe: Some(ok("read_file", json!("x"))),
            taken: Box::new(TraceEntry::Tool(failed("edit_block"))),
        };
        assert!(!entry.is_success());
        let results = entry.tool_results();
        let tools: Vec<&str> = results.iter().map(|r| r.tool.as_str()).collect();
        assert_eq!(tools, vec!["read_file", "edit_block"]);
    }

    #[test]
    fn skipped_steps_observe_null_and_are_not_failures() {
        let skipped = ExecutionStepResult::skipped("edit_block", Params::new(), "unchanged");
        assert_eq!(skipped.attempts, 0);
        assert_eq!(skipped.observation(), Observation::none());

        let mut trace = ExecutionTrace::default();
        trace.push(TraceEntry::Tool(skipped));
        trace.push(TraceEntry::Tool(failed("tree")));
        assert_eq!(trace.failed_steps(), 1);
    }

    #[test]
    fn trace_serializes_with_kind_tags() {
        let mut trace = ExecutionTrace::default();
        trace.push(TraceEntry::Tool(ok("tree", json!({ "files": [] }))));
        let value = serde_json::to_value(&trace).expect("serialize");
        assert_eq!(value["entries"][0]["kind"], "tool");
        assert_eq!(value["entries"][0]["status"], "success");
        assert_eq!(value["terminated_early"], false);
    }
}
