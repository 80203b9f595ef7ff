//! Dataset loading and validation.
//!
//! Datasets are SWE-bench exports (JSON array or JSONL). Instance ids name
//! files under `traces/`, so they are checked before anything runs.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use sha2::{Digest, Sha256};

use orchestrator::core::types::ProblemInstance;
use orchestrator::io::instance::load_instances;

/// Load `path`, keep the first `max_instances` rows and validate ids.
pub fn load_dataset(path: &Path, max_instances: Option<usize>) -> Result<Vec<ProblemInstance>> {
    let mut instances = load_instances(path)?;
    if let Some(max) = max_instances {
        instances.truncate(max);
    }
    validate_instances(&instances).with_context(|| format!("validate {}", path.display()))?;
    Ok(instances)
}

fn validate_instances(instances: &[ProblemInstance]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for (index, instance) in instances.iter().enumerate() {
        validate_instance_id(&instance.instance_id)
            .with_context(|| format!("instance[{index}] invalid"))?;
        if !seen.insert(instance.instance_id.as_str()) {
            bail!("duplicate instance_id {}", instance.instance_id);
        }
    }
    Ok(())
}

fn validate_instance_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("instance_id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("instance_id must not contain path separators");
    }
    if id.contains("..") {
        bail!("instance_id must not contain '..'");
    }
    Ok(())
}

/// Hex SHA-256 of the dataset file, recorded for reproducibility.
pub fn dataset_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    Ok(hex::encode(hasher.finalize()))
}
