use serde::{Deserialize, Serialize};

use orchestrator::core::trace::ValidationOutcome;
use orchestrator::core::types::{ProblemCategory, Route, StrategyKind};
use orchestrator::solve::SolveOutcome;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every fail-to-pass test passed after the run.
    Resolved,
    Unresolved,
    /// The tool service was lost before the instance finished.
    Error,
}

pub fn classify_outcome(solved: &SolveOutcome) -> Outcome {
    if solved.fatal.is_some() {
        Outcome::Error
    } else if solved.tests_pass() {
        Outcome::Resolved
    } else {
        Outcome::Unresolved
    }
}

/// Routing decisions kept alongside a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionMeta {
    pub strategy: StrategyKind,
    pub route: Route,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ProblemCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
}

/// One row of `predictions.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub instance_id: String,
    pub model_patch: String,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PredictionMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Prediction {
    pub fn from_solve(solved: &SolveOutcome) -> Self {
        let metadata = solved.report.as_ref().map(|report| PredictionMeta {
            strategy: report.strategy,
            route: report.route,
            complexity: report.complexity,
            category: report.category,
            chain: report.chain.clone(),
        });
        Self {
            instance_id: solved.instance_id.clone(),
            model_patch: solved.model_patch.clone(),
            outcome: classify_outcome(solved),
            validation: solved.validation.clone(),
            metadata,
            error: solved.fatal.as_ref().map(ToString::to_string),
        }
    }

    /// Row for an instance that could not be solved at all.
    pub fn from_error(instance_id: &str, error: &anyhow::Error) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            model_patch: String::new(),
            outcome: Outcome::Error,
            validation: None,
            metadata: None,
            error: Some(format!("{error:#}")),
        }
    }
}
