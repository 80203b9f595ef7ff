//! Static tool-chain templates keyed by problem category.
//!
//! The registry is built once on first use and is read-only afterwards.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::core::types::{Params, ProblemCategory};

/// One templated tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolStepSpec {
    /// Tool name known to the tool service.
    pub name: String,
    /// Default parameters; completed from instance data at execution time.
    #[serde(default)]
    pub params: Params,
}

impl ToolStepSpec {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        let params = match params {
            Value::Object(map) => map,
            _ => Params::new(),
        };
        Self {
            name: name.into(),
            params,
        }
    }
}

/// Named template of tool invocations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolChain {
    pub name: String,
    pub steps: Vec<ToolStepSpec>,
    /// Steps are independent and may run concurrently.
    pub parallel: bool,
    /// Failed steps are re-attempted under the configured retry policy.
    pub retry_on_failure: bool,
}

impl ToolChain {
    fn sequential(name: &str, steps: Vec<ToolStepSpec>) -> Self {
        Self {
            name: name.to_string(),
            steps,
            parallel: false,
            retry_on_failure: true,
        }
    }

    fn parallel(name: &str, steps: Vec<ToolStepSpec>) -> Self {
        Self {
            parallel: true,
            ..Self::sequential(name, steps)
        }
    }
}

struct Registry {
    chains: BTreeMap<ProblemCategory, ToolChain>,
    fallback: ToolChain,
}

static REGISTRY: LazyLock<Registry> = LazyLock::new(|| {
    let chains = build_chains();
    let fallback = chains
        .get(&ProblemCategory::BugFix)
        .cloned()
        .unwrap_or_else(bug_fix_chain);
    Registry { chains, fallback }
});

/// Resolve the chain for `category`, falling back to the bug-fix chain.
pub fn resolve(category: ProblemCategory) -> &'static ToolChain {
    REGISTRY
        .chains
        .get(&category)
        .unwrap_or(&REGISTRY.fallback)
}

/// Iterate all registered chains in category order.
pub fn registered() -> impl Iterator<Item = (ProblemCategory, &'static ToolChain)> {
    REGISTRY
        .chains
        .iter()
        .map(|(category, chain)| (*category, chain))
}

fn step(name: &str, params: Value) -> ToolStepSpec {
    ToolStepSpec::new(name, params)
}

fn bug_fix_chain() -> ToolChain {
    ToolChain::sequential(
        "bug_fix_chain",
        vec![
            step("initProject", json!({ "editor": "claude" })),
            step(
                "addTask",
                json!({ "title": "Locate bug", "priority": "critical" }),
            ),
            step("search_code", json!({ "maxResults": 50 })),
            step("tree", json!({ "depth": 3 })),
            step("read_multiple_files", json!({})),
            step(
                "addTask",
                json!({ "title": "Fix bug", "priority": "critical" }),
            ),
            step("edit_block", json!({ "validate": true })),
            step("execute_command", json!({ "command": "pytest" })),
            step("updateStatus", json!({ "newStatus": "done" })),
        ],
    )
}

fn build_chains() -> BTreeMap<ProblemCategory, ToolChain> {
    let mut chains = BTreeMap::new();

    chains.insert(ProblemCategory::BugFix, bug_fix_chain());

    chains.insert(
        ProblemCategory::Feature,
        ToolChain::sequential(
            "feature_chain",
            vec![
                step("initProject", json!({})),
                step("addTask", json!({ "title": "Design feature" })),
                step("tree", json!({ "depth": 4 })),
                step("search_code", json!({ "contextLines": 5 })),
                step("addTask", json!({ "title": "Implement feature" })),
                step("create_file", json!({})),
                step("edit_block", json!({})),
                step("addTask", json!({ "title": "Add tests" })),
                step("execute_command", json!({ "command": "pytest" })),
            ],
        ),
    );

    // Discovery steps only; nothing here consumes an earlier result.
    chains.insert(
        ProblemCategory::Refactor,
        ToolChain::parallel(
            "refactor_chain",
            vec![
                step("search_code", json!({ "includeHidden": false })),
                step("get_file_info", json!({})),
                step("read_multiple_files", json!({})),
                step("addTask", json!({ "title": "Plan refactoring" })),
                step("edit_block", json!({ "expected_replacements": 1 })),
                step("execute_command", json!({ "command": "pytest" })),
            ],
        ),
    );

    chains.insert(
        ProblemCategory::TestFix,
        ToolChain::sequential(
            "test_fix_chain",
            vec![
                step("search_code", json!({ "pattern": "def test_" })),
                step("read_file", json!({})),
                step("execute_command", json!({ "command": "pytest -v" })),
                step("edit_block", json!({})),
                step("execute_command", json!({ "command": "pytest" })),
            ],
        ),
    );

    chains.insert(
        ProblemCategory::Documentation,
        ToolChain::sequential(
            "doc_chain",
            vec![
                step("search_code", json!({ "pattern": "def |class " })),
                step("read_file", json!({})),
                step("edit_block", json!({})),
                step("write_file", json!({})),
            ],
        ),
    );

    chains.insert(
        ProblemCategory::Performance,
        ToolChain::sequential(
            "performance_chain",
            vec![
                step("search_code", json!({})),
                step("execute_command", json!({ "command": "python -m cProfile" })),
                step("addTask", json!({ "title": "Identify bottlenecks" })),
                step("edit_block", json!({})),
                step("execute_command", json!({ "command": "pytest --benchmark" })),
            ],
        ),
    );

    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_its_own_chain() {
        for category in ProblemCategory::ALL {
            let chain = resolve(category);
            assert!(!chain.steps.is_empty(), "{category}");
        }
        assert_eq!(resolve(ProblemCategory::BugFix).name, "bug_fix_chain");
        assert_eq!(resolve(ProblemCategory::Documentation).name, "doc_chain");
        assert_eq!(registered().count(), ProblemCategory::ALL.len());
    }

    #[test]
    fn only_refactor_chain_is_parallel() {
        for (category, chain) in registered() {
            assert_eq!(chain.parallel, category == ProblemCategory::Refactor);
            assert!(chain.retry_on_failure);
        }
    }

    #[test]
    fn resolve_returns_the_same_static_table() {
        let first = resolve(ProblemCategory::Feature) as *const ToolChain;
        let second = resolve(ProblemCategory::Feature) as *const ToolChain;
        assert_eq!(first, second);
    }

    #[test]
    fn templates_keep_declared_defaults() {
        let chain = resolve(ProblemCategory::TestFix);
        assert_eq!(chain.steps[0].name, "search_code");
        assert_eq!(chain.steps[0].params["pattern"], "def test_");
        assert_eq!(chain.steps.last().map(|s| s.name.as_str()), Some("execute_command"));
    }
}
