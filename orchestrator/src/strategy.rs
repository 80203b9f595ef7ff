//! Strategy selection: which workflow runs for an instance.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::core::chains::{ToolStepSpec, resolve};
use crate::core::classifier::classify;
use crate::core::complexity::{ScoredRoute, route_for_score, score};
use crate::core::results::match_paths;
use crate::core::trace::{ExecutionTrace, PhasedRun, TraceEntry};
use crate::core::types::{ConnectivityError, ProblemCategory, Route, StrategyKind};
use crate::core::workflow::CustomStep;
use crate::engine::{run_chain, run_custom};
use crate::executor::StepExecutor;
use crate::fix::FixGenerator;
use crate::io::config::ToolDefaults;
use crate::io::tool_client::ToolClient;
use crate::phases::{PhaseSettings, run_phased};

/// A runnable strategy. Only `Custom` carries caller data.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Minimal search, read and test chain.
    Basic,
    /// Classify, then run the category's registry chain.
    Advanced,
    /// Route on complexity score.
    Hybrid,
    Custom(Vec<CustomStep>),
}

impl Strategy {
    /// Build a strategy from its name. `custom` requires a non-empty workflow.
    pub fn from_kind(kind: StrategyKind, workflow: Option<Vec<CustomStep>>) -> Result<Self> {
        match kind {
            StrategyKind::Basic => Ok(Strategy::Basic),
            StrategyKind::Advanced => Ok(Strategy::Advanced),
            StrategyKind::Hybrid => Ok(Strategy::Hybrid),
            StrategyKind::Custom => match workflow {
                Some(steps) if !steps.is_empty() => Ok(Strategy::Custom(steps)),
                _ => Err(anyhow!("custom strategy requires a workflow with at least one step")),
            },
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Basic => StrategyKind::Basic,
            Strategy::Advanced => StrategyKind::Advanced,
            Strategy::Hybrid => StrategyKind::Hybrid,
            Strategy::Custom(_) => StrategyKind::Custom,
        }
    }
}

/// Trace or phase list produced by a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutput {
    Trace(ExecutionTrace),
    Phased(PhasedRun),
}

impl RunOutput {
    pub fn aborted(&self) -> Option<&ConnectivityError> {
        match self {
            RunOutput::Trace(trace) => trace.aborted.as_ref(),
            RunOutput::Phased(run) => run.aborted(),
        }
    }
}

/// What a strategy decided and what it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub strategy: StrategyKind,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ProblemCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    pub output: RunOutput,
}

/// Run `strategy` for the executor's instance.
#[instrument(skip_all, fields(instance = %executor.instance().instance_id, strategy = %strategy.kind()))]
pub async fn select_and_run<C, F>(
    executor: &StepExecutor<'_, C>,
    strategy: &Strategy,
    settings: PhaseSettings<'_>,
    fixer: &F,
) -> StrategyReport
where
    C: ToolClient + ?Sized,
    F: FixGenerator + ?Sized,
{
    let kind = strategy.kind();
    let report = match strategy {
        Strategy::Basic => minimal_report(executor, kind, settings.tools, None).await,
        Strategy::Advanced => chain_report(executor, kind, None).await,
        Strategy::Hybrid => {
            let complexity = score(executor.instance());
            let route = route_for_score(complexity);
            info!(complexity, ?route, "routed by complexity");
            match route {
                ScoredRoute::Minimal => {
                    minimal_report(executor, kind, settings.tools, Some(complexity)).await
                }
                ScoredRoute::ToolChain => chain_report(executor, kind, Some(complexity)).await,
                ScoredRoute::Phased => StrategyReport {
                    strategy: kind,
                    route: Route::Phased,
                    complexity: Some(complexity),
                    category: None,
                    chain: None,
                    output: RunOutput::Phased(run_phased(executor, settings, fixer).await),
                },
            }
        }
        Strategy::Custom(steps) => StrategyReport {
            strategy: kind,
            route: Route::Custom,
            complexity: None,
            category: None,
            chain: None,
            output: RunOutput::Trace(run_custom(executor, steps).await),
        },
    };
    info!(route = ?report.route, aborted = report.output.aborted().is_some(), "strategy finished");
    report
}

async fn minimal_report<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    kind: StrategyKind,
    tools: &ToolDefaults,
    complexity: Option<u8>,
) -> StrategyReport {
    StrategyReport {
        strategy: kind,
        route: Route::Minimal,
        complexity,
        category: None,
        chain: None,
        output: RunOutput::Trace(run_minimal(executor, tools).await),
    }
}

async fn chain_report<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    kind: StrategyKind,
    complexity: Option<u8>,
) -> StrategyReport {
    let category = classify(&executor.instance().problem_statement);
    let chain = resolve(category);
    info!(%category, chain = %chain.name, "chain selected");
    StrategyReport {
        strategy: kind,
        route: Route::ToolChain,
        complexity,
        category: Some(category),
        chain: Some(chain.name.clone()),
        output: RunOutput::Trace(run_chain(executor, chain).await),
    }
}

/// Search with the derived pattern, read the top matches, run the test target.
pub async fn run_minimal<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    tools: &ToolDefaults,
) -> ExecutionTrace {
    let mut trace = ExecutionTrace::default();

    let search = ToolStepSpec::new("search_code", json!({ "maxResults": tools.search_max_results }));
    let search = match executor.call_spec(&search, true).await {
        Ok(result) => result,
        Err(err) => {
            trace.aborted = Some(err);
            return trace;
        }
    };
    let paths: Vec<String> = search
        .result
        .as_ref()
        .map(match_paths)
        .unwrap_or_default()
        .into_iter()
        .take(tools.read_top_n)
        .collect();
    trace.push(TraceEntry::Tool(search));

    for path in &paths {
        let read = ToolStepSpec::new("read_file", json!({ "path": path }));
        match executor.call_spec(&read, true).await {
            Ok(result) => trace.push(TraceEntry::Tool(result)),
            Err(err) => {
                trace.aborted = Some(err);
                return trace;
            }
        }
    }

    let command = tools.test_command_for(executor.instance().test_target());
    let test = ToolStepSpec::new("execute_command", json!({ "command": command }));
    match executor.call_spec(&test, true).await {
        Ok(result) => trace.push(TraceEntry::Tool(result)),
        Err(err) => trace.aborted = Some(err),
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use crate::executor::ExecutionOptions;
    use crate::fix::UnchangedFix;
    use crate::test_support::{ScriptedToolClient, complex_instance, instance};

    fn options() -> ExecutionOptions {
        ExecutionOptions {
            retry: RetryPolicy {
                max_attempts: 1,
                initial_backoff_ms: 0,
                max_backoff_ms: 0,
            },
            command_timeout_ms: 5_000,
        }
    }

    fn settings(tools: &ToolDefaults) -> PhaseSettings<'_> {
        PhaseSettings {
            tools,
            task_tracking: true,
        }
    }

    #[test]
    fn custom_requires_workflow() {
        assert!(Strategy::from_kind(StrategyKind::Custom, None).is_err());
        assert!(Strategy::from_kind(StrategyKind::Custom, Some(Vec::new())).is_err());
        assert_eq!(
            Strategy::from_kind(StrategyKind::Hybrid, None).expect("hybrid"),
            Strategy::Hybrid
        );
    }

    #[tokio::test]
    async fn minimal_chain_reads_top_matches_then_tests() {
        let client = ScriptedToolClient::new().respond(
            "search_code",
            json!({ "matches": [
                { "path": "a.py" }, { "path": "b.py" }, { "path": "c.py" }
            ] }),
        );
        let mut inst = instance("m", "it crashes", vec!["t.py::test_m".to_string()]);
        inst.test_file = Some("t.py".to_string());
        let executor = StepExecutor::new(&client, &inst, options());
        let tools = ToolDefaults {
            read_top_n: 2,
            ..ToolDefaults::default()
        };

        let trace = run_minimal(&executor, &tools).await;
        assert_eq!(
            client.tools_called(),
            vec!["search_code", "read_file", "read_file", "execute_command"]
        );
        assert_eq!(trace.len(), 4);
        let calls = client.calls();
        assert_eq!(calls[0].params["pattern"], json!("test_m"));
        assert_eq!(calls[0].params["maxResults"], json!(20));
        assert_eq!(calls[2].params["path"], json!("b.py"));
        assert_eq!(calls[3].params["command"], json!("python -m pytest t.py -xvs"));
        assert_eq!(calls[3].params["timeout_ms"], json!(5_000));
    }

    #[tokio::test]
    async fn hybrid_routes_low_scores_to_minimal_chain() {
        let client = ScriptedToolClient::new();
        let inst = instance("low", "it crashes", Vec::new());
        let executor = StepExecutor::new(&client, &inst, options());
        let tools = ToolDefaults::default();

        let report = select_and_run(&executor, &Strategy::Hybrid, settings(&tools), &UnchangedFix).await;
        assert_eq!(report.route, Route::Minimal);
        assert_eq!(report.complexity, Some(0));
    }

    #[tokio::test]
    async fn hybrid_routes_mid_scores_to_category_chain() {
        let client = ScriptedToolClient::new();
        let statement = format!("Add a flag {}", "z".repeat(1100));
        let inst = instance("mid", &statement, Vec::new());
        let executor = StepExecutor::new(&client, &inst, options());
        let tools = ToolDefaults::default();

        let report = select_and_run(&executor, &Strategy::Hybrid, settings(&tools), &UnchangedFix).await;
        assert_eq!(report.complexity, Some(4));
        assert_eq!(report.route, Route::ToolChain);
        assert_eq!(report.category, Some(ProblemCategory::Feature));
        assert_eq!(report.chain.as_deref(), Some("feature_chain"));
    }

    #[tokio::test]
    async fn hybrid_routes_high_scores_to_phases() {
        let client = ScriptedToolClient::new();
        let inst = complex_instance("high");
        let executor = StepExecutor::new(&client, &inst, options());
        let tools = ToolDefaults::default();

        let report = select_and_run(&executor, &Strategy::Hybrid, settings(&tools), &UnchangedFix).await;
        assert_eq!(report.complexity, Some(7));
        assert_eq!(report.route, Route::Phased);
        let RunOutput::Phased(run) = report.output else {
            panic!("expected phased output");
        };
        assert_eq!(
            run.phase_names(),
            vec!["analysis", "planning", "implementation", "validation"]
        );
    }

    #[tokio::test]
    async fn advanced_uses_classified_chain() {
        let client = ScriptedToolClient::new();
        let inst = instance("adv", "update the readme", Vec::new());
        let executor = StepExecutor::new(&client, &inst, options());
        let tools = ToolDefaults::default();

        let report = select_and_run(&executor, &Strategy::Advanced, settings(&tools), &UnchangedFix).await;
        assert_eq!(report.category, Some(ProblemCategory::Documentation));
        assert_eq!(
            client.tools_called(),
            vec!["search_code", "read_file", "edit_block", "write_file"]
        );
    }
}
