use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::outcome::{Outcome, Prediction};
use crate::results::{META_FILE, read_meta, read_predictions};

#[derive(Debug, Default, PartialEq)]
pub struct ReportSummary {
    pub total: usize,
    /// Instances that produced an outcome (not an error row).
    pub processed: usize,
    pub tests_passing: usize,
    pub errors: usize,
    /// Instance count per route taken.
    pub routes: BTreeMap<String, usize>,
}

impl ReportSummary {
    /// Percentage of all instances whose tests pass; `None` for an empty run.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.tests_passing as f64 / self.total as f64 * 100.0)
    }
}

pub fn summarize(predictions: &[Prediction]) -> ReportSummary {
    let mut summary = ReportSummary {
        total: predictions.len(),
        ..ReportSummary::default()
    };
    for prediction in predictions {
        match prediction.outcome {
            Outcome::Resolved => {
                summary.processed += 1;
                summary.tests_passing += 1;
            }
            Outcome::Unresolved => summary.processed += 1,
            Outcome::Error => summary.errors += 1,
        }
        if let Some(meta) = &prediction.metadata {
            *summary
                .routes
                .entry(meta.route.as_str().to_string())
                .or_insert(0) += 1;
        }
    }
    summary
}

/// Run directories under `output_dir`, oldest first.
pub fn load_run_dirs(output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !output_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in
        fs::read_dir(output_dir).with_context(|| format!("read {}", output_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().join(META_FILE).exists() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Summarize one run directory. Metadata problems become warnings.
pub fn aggregate(run_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let predictions = read_predictions(run_dir)?;
    let summary = summarize(&predictions);
    let mut warnings = Vec::new();

    match read_meta(run_dir) {
        Ok(meta) => {
            if meta.total != summary.total {
                warnings.push(format!(
                    "meta.json lists {} instances but predictions.json has {}",
                    meta.total, summary.total
                ));
            }
            warnings.extend(meta.errors.into_iter().map(|e| format!("capture: {e}")));
        }
        Err(err) => warnings.push(format!("meta.json invalid ({err:#})")),
    }

    Ok((summary, warnings))
}
