//! Reading problem instances and custom workflows from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use crate::core::types::ProblemInstance;
use crate::core::workflow::CustomStep;

/// Load a single instance from a JSON object file.
pub fn load_instance(path: &Path) -> Result<ProblemInstance> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse instance {}", path.display()))
}

/// Load instances from a JSON array or a JSONL file (one object per line).
pub fn load_instances(path: &Path) -> Result<Vec<ProblemInstance>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_instances(&contents).with_context(|| format!("parse dataset {}", path.display()))
}

/// Parse dataset text. A leading `[` selects array form, anything else JSONL.
pub fn parse_instances(contents: &str) -> Result<Vec<ProblemInstance>> {
    if contents.trim_start().starts_with('[') {
        return serde_json::from_str(contents).context("parse json array");
    }

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).with_context(|| format!("parse line {}", idx + 1))
        })
        .collect()
}

/// Load a custom workflow: a JSON array of steps.
pub fn load_workflow(path: &Path) -> Result<Vec<CustomStep>> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let steps: Vec<CustomStep> = serde_json::from_str(&contents)
        .with_context(|| format!("parse workflow {}", path.display()))?;
    if steps.is_empty() {
        return Err(anyhow!("workflow {} has no steps", path.display()));
    }
    Ok(steps)
}
