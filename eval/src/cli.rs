//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing::debug;

use crate::config::EvalConfig;
use crate::report::{ReportSummary, aggregate, load_run_dirs};
use crate::run::run_eval;

/// Run an evaluation and print where results landed.
pub async fn run_command(cfg: &EvalConfig) -> Result<()> {
    debug!(?cfg, "eval config resolved");
    let outcome = run_eval(cfg).await.context("run evaluation")?;
    println!(
        "run: eval_run_id={} results={}",
        outcome.eval_run_id,
        outcome.results_dir.display()
    );
    print_summary(&outcome.summary);
    Ok(())
}

/// Report on `run_dir`, or on the newest run under `output_dir`.
pub fn report_command(output_dir: &Path, run_dir: Option<&Path>) -> Result<()> {
    let run_dir = resolve_run_dir(output_dir, run_dir)?;
    let (summary, warnings) = aggregate(&run_dir)?;
    println!("report: run={}", run_dir.display());
    print_summary(&summary);
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn resolve_run_dir(output_dir: &Path, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    load_run_dirs(output_dir)?
        .pop()
        .ok_or_else(|| anyhow!("no eval runs under {}", output_dir.display()))
}

fn print_summary(summary: &ReportSummary) {
    println!(
        "report: total={} processed={} tests_passing={} errors={}",
        summary.total, summary.processed, summary.tests_passing, summary.errors
    );
    if let Some(rate) = summary.success_rate() {
        println!("report: success_rate={:.1}%", rate);
    }
    for (route, count) in &summary.routes {
        println!("report: route {} {}", route, count);
    }
}
