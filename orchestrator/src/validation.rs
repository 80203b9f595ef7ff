//! Fail-to-pass validation: run each failing test through the tool service.

use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::core::results::{command_output, exit_code};
use crate::core::trace::{ExecutionTrace, TraceEntry, ValidationOutcome};
use crate::core::types::Params;
use crate::executor::StepExecutor;
use crate::io::config::ToolDefaults;
use crate::io::tool_client::ToolClient;

/// Run the instance's fail-to-pass tests in order, stopping at the first failure.
///
/// Test runs are not retried; a failing test is an answer, not a fault.
#[instrument(skip_all, fields(instance = %executor.instance().instance_id))]
pub async fn validate_tests<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    tools: &ToolDefaults,
) -> (ExecutionTrace, ValidationOutcome) {
    let tests = executor.instance().fail_to_pass.clone();
    let mut trace = ExecutionTrace::default();
    let mut outcome = ValidationOutcome::default();

    for test in &tests {
        let params = command_params(&tools.test_command_for(test), tools.command_timeout_ms);
        let result = match executor.call("execute_command", &params, false).await {
            Ok(result) => result,
            Err(err) => {
                trace.aborted = Some(err);
                outcome.first_failure = Some(test.clone());
                break;
            }
        };

        outcome.tests_run.push(test.clone());
        let passed = match &result.result {
            Some(value) if result.is_success() => {
                outcome.output.push_str(&command_output(value));
                exit_code(value) == 0
            }
            _ => {
                if let Some(error) = &result.error {
                    outcome.output.push_str(error);
                }
                false
            }
        };
        trace.push(TraceEntry::Tool(result));

        if !passed {
            outcome.first_failure = Some(test.clone());
            break;
        }
    }

    outcome.tests_pass = !outcome.tests_run.is_empty() && outcome.first_failure.is_none();
    info!(
        tests_run = outcome.tests_run.len(),
        tests_pass = outcome.tests_pass,
        "validation finished"
    );
    (trace, outcome)
}

fn command_params(command: &str, timeout_ms: u64) -> Params {
    let mut params = Params::new();
    params.insert("command".to_string(), Value::String(command.to_string()));
    params.insert("timeout_ms".to_string(), json!(timeout_ms));
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutionOptions;
    use crate::test_support::{Reply, ScriptedToolClient, instance};

    fn tests(count: usize) -> Vec<String> {
        (0..count).map(|idx| format!("t.py::test_{idx}")).collect()
    }

    #[tokio::test]
    async fn all_tests_passing_sets_flag() {
        let client = ScriptedToolClient::new()
            .respond("execute_command", json!({ "exitCode": 0, "output": "1 passed\n" }));
        let inst = instance("v", "text", tests(3));
        let executor = StepExecutor::new(&client, &inst, ExecutionOptions::default());

        let (trace, outcome) = validate_tests(&executor, &ToolDefaults::default()).await;
        assert!(outcome.tests_pass);
        assert_eq!(outcome.tests_run.len(), 3);
        assert_eq!(trace.len(), 3);
        assert_eq!(outcome.output.matches("1 passed").count(), 3);

        let calls = client.calls();
        assert_eq!(
            calls[0].params["command"],
            json!("python -m pytest t.py::test_0 -xvs")
        );
        assert_eq!(calls[0].params["timeout_ms"], json!(30_000));
    }

    #[tokio::test]
    async fn stops_at_first_failing_test() {
        let client = ScriptedToolClient::new()
            .then("execute_command", Reply::Ok(json!({ "exitCode": 0 })))
            .then("execute_command", Reply::Ok(json!({ "exitCode": 1 })))
            .respond("execute_command", json!({ "exitCode": 0 }));
        let inst = instance("v", "text", tests(4));
        let executor = StepExecutor::new(&client, &inst, ExecutionOptions::default());

        let (_, outcome) = validate_tests(&executor, &ToolDefaults::default()).await;
        assert!(!outcome.tests_pass);
        assert_eq!(outcome.first_failure.as_deref(), Some("t.py::test_1"));
        assert_eq!(client.count("execute_command"), 2);
    }

    #[tokio::test]
    async fn tool_failure_counts_as_failing_test_without_retry() {
        let client = ScriptedToolClient::new().fail("execute_command", "sandbox died");
        let inst = instance("v", "text", tests(2));
        let executor = StepExecutor::new(&client, &inst, ExecutionOptions::default());

        let (trace, outcome) = validate_tests(&executor, &ToolDefaults::default()).await;
        assert!(!outcome.tests_pass);
        assert!(outcome.output.contains("sandbox died"));
        assert_eq!(trace.len(), 1);
        assert_eq!(client.count("execute_command"), 1);
    }

    #[tokio::test]
    async fn no_tests_means_not_passing() {
        let client = ScriptedToolClient::new();
        let inst = instance("v", "text", Vec::new());
        let executor = StepExecutor::new(&client, &inst, ExecutionOptions::default());

        let (trace, outcome) = validate_tests(&executor, &ToolDefaults::default()).await;
        assert!(!outcome.tests_pass);
        assert!(trace.is_empty());
        assert!(client.calls().is_empty());
    }
}
