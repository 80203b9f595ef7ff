//! Solving one instance end to end: workspace setup, strategy, validation, patch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::trace::{ExecutionStepResult, ExecutionTrace, FileEdit, ValidationOutcome};
use crate::core::types::{ConnectivityError, Params, ProblemInstance, StrategyKind};
use crate::executor::{ExecutionOptions, StepExecutor};
use crate::fix::{FixGenerator, UnchangedFix};
use crate::io::config::SolverConfig;
use crate::io::patch::render_patch;
use crate::io::tool_client::ToolClient;
use crate::phases::PhaseSettings;
use crate::strategy::{RunOutput, Strategy, StrategyReport, select_and_run};
use crate::validation::validate_tests;

/// Everything produced for one instance.
///
/// A connectivity failure is reported in `fatal`, separately from step
/// failures recorded in the traces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub instance_id: String,
    pub strategy: StrategyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<ExecutionStepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<StrategyReport>,
    /// Fail-to-pass run for strategies without their own validation phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_trace: Option<ExecutionTrace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
    /// Unified diff of applied edits; empty when nothing changed.
    pub model_patch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal: Option<ConnectivityError>,
}

impl SolveOutcome {
    fn new(instance_id: &str, strategy: StrategyKind) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            strategy,
            setup: None,
            report: None,
            validation_trace: None,
            validation: None,
            model_patch: String::new(),
            fatal: None,
        }
    }

    pub fn tests_pass(&self) -> bool {
        self.validation.as_ref().is_some_and(|v| v.tests_pass)
    }
}

/// Solves instances against one tool client and config.
pub struct Solver<'a, C: ?Sized, F: ?Sized = UnchangedFix> {
    client: &'a C,
    config: &'a SolverConfig,
    fixer: &'a F,
}

impl<'a, C: ToolClient + ?Sized> Solver<'a, C, UnchangedFix> {
    pub fn new(client: &'a C, config: &'a SolverConfig) -> Self {
        Self {
            client,
            config,
            fixer: &UnchangedFix,
        }
    }
}

impl<'a, C, F> Solver<'a, C, F>
where
    C: ToolClient + ?Sized,
    F: FixGenerator + ?Sized,
{
    pub fn with_fixer(client: &'a C, config: &'a SolverConfig, fixer: &'a F) -> Self {
        Self {
            client,
            config,
            fixer,
        }
    }

    #[instrument(skip_all, fields(instance = %instance.instance_id, strategy = %strategy.kind()))]
    pub async fn solve(&self, instance: &ProblemInstance, strategy: &Strategy) -> SolveOutcome {
        let executor = StepExecutor::new(
            self.client,
            instance,
            ExecutionOptions::from_config(self.config),
        );
        let mut outcome = SolveOutcome::new(&instance.instance_id, strategy.kind());

        if let Some(workspace) = self.config.workspace_for(&instance.instance_id) {
            let mut params = Params::new();
            params.insert(
                "workspacePath".to_string(),
                Value::String(workspace.display().to_string()),
            );
            match executor.call("setWorkspace", &params, true).await {
                Ok(setup) => outcome.setup = Some(setup),
                Err(err) => {
                    warn!(error = %err, "workspace setup aborted");
                    outcome.fatal = Some(err);
                    return outcome;
                }
            }
        }

        let settings = PhaseSettings {
            tools: &self.config.tools,
            task_tracking: self.config.task_tracking,
        };
        let report = select_and_run(&executor, strategy, settings, self.fixer).await;

        let mut edits: &[FileEdit] = &[];
        if let Some(err) = report.output.aborted() {
            outcome.fatal = Some(err.clone());
        } else {
            match &report.output {
                RunOutput::Phased(run) => {
                    outcome.validation = Some(run.validation.clone());
                    edits = &run.edits;
                }
                RunOutput::Trace(_) => {
                    let (trace, validation) = validate_tests(&executor, &self.config.tools).await;
                    if let Some(err) = &trace.aborted {
                        outcome.fatal = Some(err.clone());
                    } else {
                        outcome.validation = Some(validation);
                    }
                    outcome.validation_trace = Some(trace);
                }
            }
        }
        outcome.model_patch = render_patch(edits);

        info!(
            tests_pass = outcome.tests_pass(),
            patch_bytes = outcome.model_patch.len(),
            fatal = outcome.fatal.is_some(),
            "instance solved"
        );
        outcome.report = Some(report);
        outcome
    }
}
