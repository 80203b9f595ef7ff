//! Caller-authored workflow steps.

use serde::{Deserialize, Serialize};

use crate::core::chains::{ToolChain, ToolStepSpec};
use crate::core::condition::{Check, Condition};

/// One executable step. Conditional branches nest further steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowStep {
    Tool(ToolStepSpec),
    Parallel {
        tools: Vec<ToolStepSpec>,
    },
    Conditional {
        condition: Condition,
        if_true: Box<WorkflowStep>,
        if_false: Box<WorkflowStep>,
    },
}

impl WorkflowStep {
    pub fn tool(spec: ToolStepSpec) -> Self {
        WorkflowStep::Tool(spec)
    }

    pub fn conditional(condition: Condition, if_true: WorkflowStep, if_false: WorkflowStep) -> Self {
        WorkflowStep::Conditional {
            condition,
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> &str {
        match self {
            WorkflowStep::Tool(spec) => &spec.name,
            WorkflowStep::Parallel { .. } => "parallel",
            WorkflowStep::Conditional { .. } => "conditional",
        }
    }
}

/// Top-level step of a custom workflow.
///
/// `continue_if` is checked against the step's own result; a false
/// evaluation ends the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomStep {
    #[serde(flatten)]
    pub step: WorkflowStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_if: Option<Check>,
}

impl CustomStep {
    pub fn new(step: WorkflowStep) -> Self {
        Self {
            step,
            continue_if: None,
        }
    }

    pub fn continue_if(mut self, check: Check) -> Self {
        self.continue_if = Some(check);
        self
    }
}

/// Expand a chain into the steps the engine runs.
///
/// A parallel chain becomes a single parallel group.
pub fn chain_steps(chain: &ToolChain) -> Vec<WorkflowStep> {
    if chain.parallel {
        vec![WorkflowStep::Parallel {
            tools: chain.steps.clone(),
        }]
    } else {
        chain.steps.iter().cloned().map(WorkflowStep::Tool).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chains::resolve;
    use crate::core::types::ProblemCategory;
    use serde_json::json;

    #[test]
    fn custom_steps_parse_from_tagged_json() {
        let steps: Vec<CustomStep> = serde_json::from_value(json!([
            {
                "type": "tool",
                "name": "search_code",
                "params": { "pattern": "def parse" },
                "continue_if": { "type": "success" }
            },
            {
                "type": "parallel",
                "tools": [ { "name": "tree" }, { "name": "get_file_info", "params": { "path": "a.py" } } ]
            },
            {
                "type": "conditional",
                "condition": { "type": "contains", "value": "ok" },
                "if_true": { "type": "tool", "name": "execute_command", "params": { "command": "pytest" } },
                "if_false": { "type": "tool", "name": "tree" }
            }
        ]))
        .expect("workflow");

        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].continue_if, Some(Check::Success));
        assert_eq!(steps[0].step.label(), "search_code");
        match &steps[1].step {
            WorkflowStep::Parallel { tools } => {
                assert_eq!(tools.len(), 2);
                assert!(tools[0].params.is_empty());
            }
            other => panic!("expected parallel, got {other:?}"),
        }
        match &steps[2].step {
            WorkflowStep::Conditional { if_true, .. } => {
                assert_eq!(if_true.label(), "execute_command");
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn parallel_chain_expands_to_one_group() {
        let refactor = resolve(ProblemCategory::Refactor);
        let steps = chain_steps(refactor);
        assert_eq!(steps.len(), 1);
        assert!(matches!(&steps[0], WorkflowStep::Parallel { tools } if tools.len() == refactor.steps.len()));

        let bug_fix = resolve(ProblemCategory::BugFix);
        assert_eq!(chain_steps(bug_fix).len(), bug_fix.steps.len());
    }
}
