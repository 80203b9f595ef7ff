//! Evaluation configuration.
//!
//! An `eval.toml` file carries run settings plus a `[solver]` table in the
//! orchestrator's own format. Command-line flags override both.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use orchestrator::core::types::StrategyKind;
use orchestrator::io::config::SolverConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvalConfig {
    /// JSON array or JSONL export of problem instances.
    pub dataset: PathBuf,

    /// Instances solved concurrently.
    pub num_workers: usize,

    /// Only the first N instances are processed when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<usize>,

    pub strategy: StrategyKind,

    /// Custom workflow file, required for the `custom` strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<PathBuf>,

    /// Each run writes into `<output_dir>/<eval_run_id>/`.
    pub output_dir: PathBuf,

    /// Wall-clock limit per instance; an instance over the limit is an error row.
    pub instance_timeout_secs: u64,

    pub solver: SolverConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("swebench_lite.jsonl"),
            num_workers: 4,
            max_instances: None,
            strategy: StrategyKind::Advanced,
            workflow: None,
            output_dir: PathBuf::from("results"),
            instance_timeout_secs: 1800,
            solver: SolverConfig::default(),
        }
    }
}

impl EvalConfig {
    pub fn instance_timeout(&self) -> Duration {
        Duration::from_secs(self.instance_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset.as_os_str().is_empty() {
            bail!("dataset must be non-empty");
        }
        if self.num_workers == 0 {
            bail!("num_workers must be > 0");
        }
        if self.instance_timeout_secs == 0 {
            bail!("instance_timeout_secs must be > 0");
        }
        if self.max_instances == Some(0) {
            bail!("max_instances must be > 0");
        }
        if self.strategy == StrategyKind::Custom && self.workflow.is_none() {
            bail!("strategy custom requires a workflow file");
        }
        self.solver.validate().context("solver config")
    }
}

/// Flag values that take precedence over the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub dataset: Option<PathBuf>,
    pub num_workers: Option<usize>,
    pub max_instances: Option<usize>,
    pub strategy: Option<StrategyKind>,
    pub workflow: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub task_tracking: Option<bool>,
}

/// Load `path`, falling back to defaults when it does not exist.
pub fn load_eval_config(path: &Path) -> Result<EvalConfig> {
    if !path.exists() {
        return Ok(EvalConfig::default());
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

/// Apply flag overrides to the loaded config and validate the result.
pub fn apply_overrides(mut base: EvalConfig, overrides: &Overrides) -> Result<EvalConfig> {
    if let Some(dataset) = &overrides.dataset {
        base.dataset = dataset.clone();
    }
    if let Some(num_workers) = overrides.num_workers {
        base.num_workers = num_workers;
    }
    if let Some(max_instances) = overrides.max_instances {
        base.max_instances = Some(max_instances);
    }
    if let Some(strategy) = overrides.strategy {
        base.strategy = strategy;
    }
    if let Some(workflow) = &overrides.workflow {
        base.workflow = Some(workflow.clone());
    }
    if let Some(output_dir) = &overrides.output_dir {
        base.output_dir = output_dir.clone();
    }
    if let Some(endpoint) = &overrides.endpoint {
        base.solver.endpoint = endpoint.clone();
    }
    if let Some(task_tracking) = overrides.task_tracking {
        base.solver.task_tracking = task_tracking;
    }
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_eval_config(&temp.path().join("eval.toml")).expect("load");
        assert_eq!(cfg, EvalConfig::default());
    }

    #[test]
    fn parses_solver_table() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("eval.toml");
        fs::write(
            &path,
            "num_workers = 2\nstrategy = \"hybrid\"\n\n[solver]\nendpoint = \"http://svc:9000/mcp\"\n\n[solver.tools]\nread_top_n = 3\n",
        )
        .expect("write");

        let cfg = load_eval_config(&path).expect("load");
        assert_eq!(cfg.num_workers, 2);
        assert_eq!(cfg.strategy, StrategyKind::Hybrid);
        assert_eq!(cfg.solver.endpoint, "http://svc:9000/mcp");
        assert_eq!(cfg.solver.tools.read_top_n, 3);
        assert_eq!(cfg.solver.tools.search_max_results, 20);
    }

    #[test]
    fn preserves_base_without_overrides() {
        let base = EvalConfig::default();
        let merged = apply_overrides(base.clone(), &Overrides::default()).expect("merge");
        assert_eq!(merged, base);
    }

    #[test]
    fn flags_win_over_file_values() {
        let overrides = Overrides {
            num_workers: Some(8),
            max_instances: Some(10),
            strategy: Some(StrategyKind::Basic),
            task_tracking: Some(false),
            ..Overrides::default()
        };
        let merged = apply_overrides(EvalConfig::default(), &overrides).expect("merge");
        assert_eq!(merged.num_workers, 8);
        assert_eq!(merged.max_instances, Some(10));
        assert_eq!(merged.strategy, StrategyKind::Basic);
        assert!(!merged.solver.task_tracking);
    }

    #[test]
    fn rejects_custom_without_workflow() {
        let overrides = Overrides {
            strategy: Some(StrategyKind::Custom),
            ..Overrides::default()
        };
        let err = apply_overrides(EvalConfig::default(), &overrides).expect_err("invalid");
        assert!(err.to_string().contains("workflow"));
    }

    #[test]
    fn rejects_zero_workers() {
        let overrides = Overrides {
            num_workers: Some(0),
            ..Overrides::default()
        };
        assert!(apply_overrides(EvalConfig::default(), &overrides).is_err());
    }
}
