//! Evaluation run orchestration.
//!
//! Loads the dataset, checks the tool service, solves instances with bounded
//! concurrency and captures predictions.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

use orchestrator::core::types::ProblemInstance;
use orchestrator::io::config::SolverConfig;
use orchestrator::io::http_client::McpHttpClient;
use orchestrator::io::instance::load_workflow;
use orchestrator::io::tool_client::ToolClient;
use orchestrator::solve::{SolveOutcome, Solver};
use orchestrator::strategy::Strategy;

use crate::config::EvalConfig;
use crate::dataset::load_dataset;
use crate::outcome::Prediction;
use crate::report::{ReportSummary, summarize};
use crate::results::{CaptureInput, capture_results};

/// Per-instance result before it is written out.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub prediction: Prediction,
    /// Absent when the instance never produced an outcome.
    pub solved: Option<SolveOutcome>,
    pub duration_secs: f64,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub eval_run_id: String,
    pub results_dir: PathBuf,
    pub summary: ReportSummary,
}

/// Shared inputs for solving a batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings<'a> {
    pub solver: &'a SolverConfig,
    pub strategy: &'a Strategy,
    pub num_workers: usize,
    pub instance_timeout: Duration,
}

/// Run the configured evaluation end to end.
#[instrument(skip_all, fields(dataset = %cfg.dataset.display(), strategy = %cfg.strategy))]
pub async fn run_eval(cfg: &EvalConfig) -> Result<RunOutcome> {
    let instances = load_dataset(&cfg.dataset, cfg.max_instances).context("load dataset")?;
    let workflow = cfg.workflow.as_deref().map(load_workflow).transpose()?;
    let strategy = Strategy::from_kind(cfg.strategy, workflow)?;

    let client = McpHttpClient::from_config(&cfg.solver);
    let tools = client
        .ping()
        .await
        .with_context(|| format!("tool service unreachable at {}", client.endpoint()))?;
    debug!(tools = tools.len(), "tool service reachable");

    let started_at = Utc::now();
    let eval_run_id = format!("eval-{}", started_at.format("%Y%m%d_%H%M%S"));
    info!(%eval_run_id, instances = instances.len(), workers = cfg.num_workers, "evaluation started");

    let settings = BatchSettings {
        solver: &cfg.solver,
        strategy: &strategy,
        num_workers: cfg.num_workers,
        instance_timeout: cfg.instance_timeout(),
    };
    let records = solve_all(&client, &instances, settings).await;
    let finished_at = Utc::now();

    let input = CaptureInput {
        eval_run_id: &eval_run_id,
        dataset: &cfg.dataset,
        strategy: cfg.strategy,
        endpoint: &cfg.solver.endpoint,
        started_at,
        finished_at,
        records: &records,
    };
    let results_dir = capture_results(&cfg.output_dir, &input).context("capture results")?;

    let predictions: Vec<Prediction> = records.into_iter().map(|r| r.prediction).collect();
    let summary = summarize(&predictions);
    info!(
        resolved = summary.tests_passing,
        errors = summary.errors,
        results_dir = %results_dir.display(),
        "evaluation complete"
    );
    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        summary,
    })
}

/// Solve `instances` with at most `num_workers` in flight. Output order
/// matches input order.
pub async fn solve_all<C: ToolClient + ?Sized>(
    client: &C,
    instances: &[ProblemInstance],
    settings: BatchSettings<'_>,
) -> Vec<InstanceRecord> {
    let solver = Solver::new(client, settings.solver);
    let solver = &solver;
    stream::iter(instances)
        .map(|instance| async move {
            let started = Instant::now();
            let solved =
                tokio::time::timeout(settings.instance_timeout, solver.solve(instance, settings.strategy))
                    .await;
            let duration_secs = started.elapsed().as_secs_f64();
            match solved {
                Ok(solved) => {
                    let prediction = Prediction::from_solve(&solved);
                    debug!(instance = %instance.instance_id, outcome = ?prediction.outcome, "instance done");
                    InstanceRecord {
                        prediction,
                        solved: Some(solved),
                        duration_secs,
                    }
                }
                Err(_) => {
                    let err = anyhow!(
                        "timed out after {}s",
                        settings.instance_timeout.as_secs_f64()
                    );
                    warn!(instance = %instance.instance_id, error = %err, "instance failed");
                    InstanceRecord {
                        prediction: Prediction::from_error(&instance.instance_id, &err),
                        solved: None,
                        duration_secs,
                    }
                }
            }
        })
        .buffered(settings.num_workers.max(1))
        .collect()
        .await
}
