//! End-to-end `solve` scenarios against a scripted tool service.
//!
//! Each test drives `Solver::solve` from strategy selection through validation
//! and patch rendering, then checks the recorded call sequence and outcome.

use std::fs;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use orchestrator::core::retry::RetryPolicy;
use orchestrator::core::trace::{PhaseStatus, TraceEntry};
use orchestrator::core::types::{Route, StrategyKind};
use orchestrator::fix::{FixGenerator, FixRequest};
use orchestrator::io::config::SolverConfig;
use orchestrator::io::instance::load_workflow;
use orchestrator::solve::Solver;
use orchestrator::strategy::{RunOutput, Strategy};
use orchestrator::test_support::{Reply, ScriptedToolClient, complex_instance, instance};

/// Appends a marker line to every file it is shown.
struct MarkerFix;

#[async_trait]
impl FixGenerator for MarkerFix {
    async fn generate(&self, request: FixRequest<'_>) -> Result<String> {
        Ok(format!("{}# fixed\n", request.content))
    }
}

fn config() -> SolverConfig {
    SolverConfig {
        retry: RetryPolicy {
            max_attempts: 2,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        },
        ..SolverConfig::default()
    }
}

/// High-complexity instance: analysis locates a test file, the implementation
/// search finds the source file, the fix edits it and all tests pass.
#[tokio::test]
async fn complex_instance_runs_phases_and_produces_patch() {
    let client = ScriptedToolClient::new()
        .then(
            "search_code",
            Reply::Ok(json!({ "matches": [ { "path": "tests/test_core.py" } ] })),
        )
        .then(
            "search_code",
            Reply::Ok(json!({ "matches": [ { "path": "src/core.py" } ] })),
        )
        .respond("addTask", json!({ "id": "task-1" }))
        .respond("read_file", json!({ "content": "def core():\n    return 1\n" }))
        .respond("execute_command", json!({ "exitCode": 0, "output": "1 passed" }));
    let cfg = config();
    let inst = complex_instance("proj__proj-101");

    let outcome = Solver::with_fixer(&client, &cfg, &MarkerFix)
        .solve(&inst, &Strategy::Hybrid)
        .await;

    assert!(outcome.fatal.is_none());
    assert!(outcome.tests_pass());
    let report = outcome.report.as_ref().expect("report");
    assert_eq!(report.route, Route::Phased);
    assert_eq!(report.complexity, Some(7));
    let RunOutput::Phased(run) = &report.output else {
        panic!("expected phased output");
    };
    assert_eq!(
        run.phase_names(),
        vec!["analysis", "planning", "implementation", "validation"]
    );
    assert!(run.phases.iter().all(|p| p.status == PhaseStatus::Complete));
    assert_eq!(run.analysis.candidate_files, vec!["src/core.py"]);
    assert_eq!(run.plan.task_id.as_deref(), Some("task-1"));

    assert!(outcome.model_patch.starts_with("diff --git a/src/core.py b/src/core.py\n"));
    assert!(outcome.model_patch.contains("+# fixed"));

    // validation for phased runs happens inside the pipeline, once per test
    assert!(outcome.validation_trace.is_none());
    assert_eq!(client.count("execute_command"), inst.fail_to_pass.len());
    assert_eq!(client.count("edit_block"), 1);
}

#[tokio::test]
async fn failing_test_leaves_instance_unresolved() {
    let client = ScriptedToolClient::new()
        .respond("execute_command", json!({ "exitCode": 1, "output": "1 failed" }));
    let cfg = config();
    let inst = instance(
        "proj__proj-102",
        "TypeError when calling parse()",
        vec!["t.py::test_a".to_string(), "t.py::test_b".to_string()],
    );

    let outcome = Solver::new(&client, &cfg)
        .solve(&inst, &Strategy::Advanced)
        .await;

    assert!(outcome.fatal.is_none());
    assert!(!outcome.tests_pass());
    let validation = outcome.validation.as_ref().expect("validation");
    assert_eq!(validation.first_failure.as_deref(), Some("t.py::test_a"));
    assert_eq!(validation.tests_run, vec!["t.py::test_a"]);
    assert_eq!(outcome.model_patch, "");
}

#[tokio::test]
async fn custom_workflow_file_drives_branches() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("workflow.json");
    fs::write(
        &path,
        r#"[
  { "type": "tool", "name": "search_code", "params": { "pattern": "parse_header" },
    "continue_if": { "type": "success" } },
  { "type": "conditional",
    "condition": { "type": "contains", "value": "parser.py" },
    "if_true": { "type": "tool", "name": "read_file", "params": { "path": "src/parser.py" } },
    "if_false": { "type": "tool", "name": "tree", "params": {} } },
  { "type": "parallel", "tools": [
    { "name": "read_file", "params": { "path": "a.py" } },
    { "name": "read_file", "params": { "path": "b.py" } } ] }
]"#,
    )
    .expect("write workflow");
    let workflow = load_workflow(&path).expect("load workflow");
    let strategy = Strategy::from_kind(StrategyKind::Custom, Some(workflow)).expect("strategy");

    let client = ScriptedToolClient::new()
        .respond(
            "search_code",
            json!({ "matches": [ { "path": "src/parser.py" } ] }),
        )
        .respond("execute_command", json!({ "exitCode": 0 }));
    let cfg = config();
    let inst = instance("proj__proj-103", "header parsing breaks", vec!["t.py::test_h".to_string()]);

    let outcome = Solver::new(&client, &cfg).solve(&inst, &strategy).await;

    assert_eq!(
        client.tools_called(),
        vec!["search_code", "read_file", "read_file", "read_file", "execute_command"]
    );
    let report = outcome.report.expect("report");
    assert_eq!(report.route, Route::Custom);
    let RunOutput::Trace(trace) = report.output else {
        panic!("expected trace output");
    };
    assert_eq!(trace.len(), 3);
    assert!(!trace.terminated_early);
    match &trace.entries[1] {
        TraceEntry::Branch { condition_met, .. } => assert!(condition_met),
        other => panic!("expected branch, got {other:?}"),
    }
    assert!(outcome.validation.is_some_and(|v| v.tests_pass));
}

#[tokio::test]
async fn lost_service_mid_run_is_fatal_and_keeps_partial_trace() {
    let client = ScriptedToolClient::new()
        .respond(
            "search_code",
            json!({ "matches": [ { "path": "a.py" }, { "path": "b.py" } ] }),
        )
        .then("read_file", Reply::Ok(json!("print('a')")))
        .then("read_file", Reply::Unreachable);
    let cfg = config();
    let inst = instance("proj__proj-104", "it crashes", vec!["t.py::test_x".to_string()]);

    let outcome = Solver::new(&client, &cfg).solve(&inst, &Strategy::Basic).await;

    let fatal = outcome.fatal.as_ref().expect("fatal");
    assert_eq!(fatal.tool, "read_file");
    assert!(outcome.validation.is_none());
    assert_eq!(client.count("execute_command"), 0);
    let report = outcome.report.expect("report");
    let RunOutput::Trace(trace) = report.output else {
        panic!("expected trace output");
    };
    assert_eq!(trace.len(), 2);
    assert!(trace.is_aborted());
}
