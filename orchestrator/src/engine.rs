//! Workflow engine: runs chains and custom workflows step by step.

use tracing::{debug, info, instrument, warn};

use crate::core::chains::ToolChain;
use crate::core::condition::Observation;
use crate::core::trace::ExecutionTrace;
use crate::core::workflow::{CustomStep, WorkflowStep, chain_steps};
use crate::executor::{Interrupted, StepExecutor};
use crate::io::tool_client::ToolClient;

/// Run a registry chain in declared order (or as one parallel group).
#[instrument(skip_all, fields(chain = %chain.name, parallel = chain.parallel))]
pub async fn run_chain<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    chain: &ToolChain,
) -> ExecutionTrace {
    let steps = chain_steps(chain);
    let trace = run_steps(executor, &steps, chain.retry_on_failure).await;
    info!(
        entries = trace.len(),
        failed = trace.failed_steps(),
        aborted = trace.is_aborted(),
        "chain finished"
    );
    trace
}

/// Run steps sequentially; each step sees the previous step's observation.
pub async fn run_steps<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    steps: &[WorkflowStep],
    retry: bool,
) -> ExecutionTrace {
    let mut trace = ExecutionTrace::default();
    let mut prior: Option<Observation> = None;

    for step in steps {
        match executor.execute(step, prior.as_ref(), retry).await {
            Ok(entry) => {
                prior = Some(entry.observation());
                trace.push(entry);
            }
            Err(Interrupted { partial, error }) => {
                warn!(step = step.label(), %error, "run aborted");
                trace.extend(partial);
                trace.aborted = Some(error);
                break;
            }
        }
    }
    trace
}

/// Run a custom workflow.
///
/// A step's `continue_if` is checked against that step's own result; a false
/// evaluation stops the run with the partial trace. Custom steps are not
/// retried.
#[instrument(skip_all, fields(steps = steps.len()))]
pub async fn run_custom<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    steps: &[CustomStep],
) -> ExecutionTrace {
    let mut trace = ExecutionTrace::default();
    let mut prior: Option<Observation> = None;

    for custom in steps {
        let entry = match executor.execute(&custom.step, prior.as_ref(), false).await {
            Ok(entry) => entry,
            Err(Interrupted { partial, error }) => {
                warn!(step = custom.step.label(), %error, "run aborted");
                trace.extend(partial);
                trace.aborted = Some(error);
                break;
            }
        };
        let observation = entry.observation();
        trace.push(entry);

        if let Some(check) = &custom.continue_if
            && !check.holds(&observation)
        {
            debug!(step = custom.step.label(), "post-condition false; stopping");
            trace.terminated_early = true;
            break;
        }
        prior = Some(observation);
    }

    info!(
        entries = trace.len(),
        terminated_early = trace.terminated_early,
        aborted = trace.is_aborted(),
        "custom workflow finished"
    );
    trace
}
