//! Result capture and persistence.
//!
//! Each run directory holds `predictions.json` (one row per instance),
//! `traces/<instance_id>.json` (the full solve outcome) and `meta.json`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use orchestrator::core::types::StrategyKind;
use orchestrator::solve::SolveOutcome;

use crate::dataset::dataset_sha256;
use crate::outcome::{Outcome, Prediction};
use crate::run::InstanceRecord;

pub const PREDICTIONS_FILE: &str = "predictions.json";
pub const META_FILE: &str = "meta.json";
pub const TRACES_DIR: &str = "traces";

#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub eval_run_id: &'a str,
    pub dataset: &'a Path,
    pub strategy: StrategyKind,
    pub endpoint: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: &'a [InstanceRecord],
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EvalMeta {
    pub eval_run_id: String,
    pub dataset: String,
    /// SHA-256 of the dataset file; empty when it could not be read.
    pub dataset_hash: String,
    pub strategy: StrategyKind,
    pub endpoint: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub total: usize,
    pub resolved: usize,
    /// Non-fatal errors encountered during capture.
    pub errors: Vec<String>,
}

#[derive(Serialize)]
struct TraceFile<'a> {
    duration_secs: f64,
    outcome: &'a SolveOutcome,
}

/// Write predictions, per-instance traces and metadata for a finished run.
#[instrument(skip_all, fields(eval_run_id = %input.eval_run_id))]
pub fn capture_results(base_dir: &Path, input: &CaptureInput<'_>) -> Result<PathBuf> {
    let run_dir = results_dir(base_dir, input.eval_run_id);
    fs::create_dir_all(&run_dir)
        .with_context(|| format!("create results dir {}", run_dir.display()))?;

    let mut errors = Vec::new();

    let dataset_hash = match dataset_sha256(input.dataset) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("dataset hash: {err:#}"));
            String::new()
        }
    };

    let predictions: Vec<&Prediction> = input.records.iter().map(|r| &r.prediction).collect();
    write_json(&run_dir.join(PREDICTIONS_FILE), &predictions).context("write predictions")?;

    let traces_dir = run_dir.join(TRACES_DIR);
    for record in input.records {
        let Some(outcome) = &record.solved else {
            continue;
        };
        let path = traces_dir.join(format!("{}.json", outcome.instance_id));
        let trace = TraceFile {
            duration_secs: record.duration_secs,
            outcome,
        };
        if let Err(err) = fs::create_dir_all(&traces_dir)
            .with_context(|| format!("create {}", traces_dir.display()))
            .and_then(|()| write_json(&path, &trace))
        {
            errors.push(format!("trace {}: {err:#}", outcome.instance_id));
        }
    }

    if !errors.is_empty() {
        warn!(errors = ?errors, "result capture had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        eval_run_id: input.eval_run_id.to_string(),
        dataset: input.dataset.display().to_string(),
        dataset_hash,
        strategy: input.strategy,
        endpoint: input.endpoint.to_string(),
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        total: input.records.len(),
        resolved: predictions
            .iter()
            .filter(|p| p.outcome == Outcome::Resolved)
            .count(),
        errors,
    };
    write_json(&run_dir.join(META_FILE), &meta).context("write meta")?;

    debug!(results_dir = %run_dir.display(), "results captured");
    Ok(run_dir)
}

pub fn results_dir(base_dir: &Path, eval_run_id: &str) -> PathBuf {
    base_dir.join(eval_run_id)
}

pub fn read_predictions(run_dir: &Path) -> Result<Vec<Prediction>> {
    let path = run_dir.join(PREDICTIONS_FILE);
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

pub fn read_meta(run_dir: &Path) -> Result<EvalMeta> {
    let path = run_dir.join(META_FILE);
    let contents = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let contents = serde_json::to_string_pretty(value).context("serialize json")?;
    fs::write(path, format!("{contents}\n")).with_context(|| format!("write {}", path.display()))
}
