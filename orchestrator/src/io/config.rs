//! Solver configuration stored as TOML (default `orchestrator.toml`).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::retry::RetryPolicy;

/// Placeholder substituted with the test id in `tools.test_command`.
pub const TEST_PLACEHOLDER: &str = "{test}";

/// Solver configuration (TOML).
///
/// Missing fields default to values that work against a local tool service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SolverConfig {
    /// JSON-RPC endpoint of the tool service.
    pub endpoint: String,

    /// Per-request timeout for calls without an explicit `timeout_ms`.
    pub request_timeout_secs: u64,

    /// When set, each instance gets `<workspace_root>/<instance_id>` as workspace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Create tasks and subtasks in the tool service during planning.
    pub task_tracking: bool,

    pub retry: RetryPolicy,

    pub tools: ToolDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolDefaults {
    /// `maxResults` passed to `search_code` by the minimal chain and analysis.
    pub search_max_results: u32,

    /// Files read by the minimal chain.
    pub read_top_n: usize,

    /// `timeout_ms` given to `execute_command` unless the step declares one.
    pub command_timeout_ms: u64,

    /// Command run per failing test; `{test}` is replaced by the test id.
    pub test_command: String,

    /// Upper bound on files carried from analysis into planning.
    pub max_planned_files: usize,
}

impl Default for ToolDefaults {
    fn default() -> Self {
        Self {
            search_max_results: 20,
            read_top_n: 5,
            command_timeout_ms: 30_000,
            test_command: "python -m pytest {test} -xvs".to_string(),
            max_planned_files: 10,
        }
    }
}

impl ToolDefaults {
    pub fn test_command_for(&self, test: &str) -> String {
        self.test_command.replace(TEST_PLACEHOLDER, test)
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/mcp".to_string(),
            request_timeout_secs: 60,
            workspace_root: None,
            task_tracking: true,
            retry: RetryPolicy::default(),
            tools: ToolDefaults::default(),
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(anyhow!("endpoint must be non-empty"));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(anyhow!("endpoint must be an http(s) URL"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("request_timeout_secs must be > 0"));
        }
        self.retry.validate()?;
        if self.tools.read_top_n == 0 {
            return Err(anyhow!("tools.read_top_n must be > 0"));
        }
        if self.tools.command_timeout_ms == 0 {
            return Err(anyhow!("tools.command_timeout_ms must be > 0"));
        }
        if !self.tools.test_command.contains(TEST_PLACEHOLDER) {
            return Err(anyhow!("tools.test_command must contain {TEST_PLACEHOLDER}"));
        }
        if self.tools.max_planned_files == 0 {
            return Err(anyhow!("tools.max_planned_files must be > 0"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Workspace directory for `instance_id`, if a root is configured.
    pub fn workspace_for(&self, instance_id: &str) -> Option<PathBuf> {
        self.workspace_root.as_ref().map(|root| root.join(instance_id))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SolverConfig::default()`.
pub fn load_config(path: &Path) -> Result<SolverConfig> {
    if !path.exists() {
        let cfg = SolverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SolverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SolverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, SolverConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("orchestrator.toml");
        let cfg = SolverConfig {
            workspace_root: Some(PathBuf::from("/tmp/workspaces")),
            task_tracking: false,
            ..SolverConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("orchestrator.toml");
        fs::write(
            &path,
            "endpoint = \"http://127.0.0.1:9000/mcp\"\n[retry]\nmax_attempts = 5\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.endpoint, "http://127.0.0.1:9000/mcp");
        assert_eq!(cfg.retry.max_attempts, 5);
        assert_eq!(cfg.retry.initial_backoff_ms, 250);
        assert_eq!(cfg.tools, ToolDefaults::default());
    }

    #[test]
    fn validate_rejects_test_command_without_placeholder() {
        let mut cfg = SolverConfig::default();
        cfg.tools.test_command = "pytest".to_string();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("{test}"));
    }

    #[test]
    fn test_command_substitutes_test_id() {
        let tools = ToolDefaults::default();
        assert_eq!(
            tools.test_command_for("tests/test_a.py::test_b"),
            "python -m pytest tests/test_a.py::test_b -xvs"
        );
    }

    #[test]
    fn workspace_is_per_instance() {
        let cfg = SolverConfig {
            workspace_root: Some(PathBuf::from("/work")),
            ..SolverConfig::default()
        };
        assert_eq!(
            cfg.workspace_for("django__django-1"),
            Some(PathBuf::from("/work/django__django-1"))
        );
        assert_eq!(SolverConfig::default().workspace_for("x"), None);
    }
}
