//! Execution of single workflow steps against a [`ToolClient`].
//!
//! Tool failures are captured into step results. Only a
//! [`ConnectivityError`] escapes, and callers treat it as fatal. A step cut
//! short that way still hands back what it recorded before the loss.

use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, instrument, warn};

use crate::core::chains::ToolStepSpec;
use crate::core::condition::{Condition, Observation};
use crate::core::params::{CompletionContext, complete_params};
use crate::core::retry::RetryPolicy;
use crate::core::trace::{ExecutionStepResult, TraceEntry};
use crate::core::types::{ConnectivityError, Params, ProblemInstance};
use crate::core::workflow::WorkflowStep;
use crate::io::config::SolverConfig;
use crate::io::tool_client::{ToolClient, ToolError};

/// Knobs shared by every step of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub retry: RetryPolicy,
    pub command_timeout_ms: u64,
}

impl ExecutionOptions {
    pub fn from_config(cfg: &SolverConfig) -> Self {
        Self {
            retry: cfg.retry,
            command_timeout_ms: cfg.tools.command_timeout_ms,
        }
    }
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

/// A step stopped by a lost tool service.
#[derive(Debug, Clone, PartialEq)]
pub struct Interrupted {
    /// Entry holding the calls made before the loss, if any were made.
    pub partial: Option<TraceEntry>,
    pub error: ConnectivityError,
}

impl Interrupted {
    fn bare(error: ConnectivityError) -> Self {
        Self {
            partial: None,
            error,
        }
    }
}

/// Executes steps for one instance.
pub struct StepExecutor<'a, C: ?Sized> {
    client: &'a C,
    instance: &'a ProblemInstance,
    options: ExecutionOptions,
}

impl<'a, C: ToolClient + ?Sized> StepExecutor<'a, C> {
    pub fn new(client: &'a C, instance: &'a ProblemInstance, options: ExecutionOptions) -> Self {
        Self {
            client,
            instance,
            options,
        }
    }

    pub fn instance(&self) -> &ProblemInstance {
        self.instance
    }

    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Complete `defaults` from the instance and call `tool`.
    ///
    /// With `retry`, failed calls are re-attempted under the retry policy.
    #[instrument(skip_all, fields(tool = %tool, retry = retry))]
    pub async fn call(
        &self,
        tool: &str,
        defaults: &Params,
        retry: bool,
    ) -> Result<ExecutionStepResult, ConnectivityError> {
        let params = self.completed_params(tool, defaults);
        let max_attempts = if retry {
            self.options.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.call_tool(tool, &params).await {
                Ok(value) => {
                    debug!(attempt, "tool call succeeded");
                    return Ok(ExecutionStepResult::success(tool, params, value, attempt));
                }
                Err(ToolError::Connectivity(message)) => {
                    warn!(%message, "tool service unreachable");
                    return Err(ConnectivityError::new(tool, message));
                }
                Err(err) if attempt < max_attempts => {
                    let delay = self.options.retry.delay(attempt);
                    debug!(attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying tool call");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(attempt, error = %err, "tool call failed");
                    return Ok(ExecutionStepResult::failed(tool, params, err.to_string(), attempt));
                }
            }
        }
    }

    fn completed_params(&self, tool: &str, defaults: &Params) -> Params {
        let ctx = CompletionContext {
            instance: self.instance,
            command_timeout_ms: self.options.command_timeout_ms,
        };
        complete_params(tool, defaults, ctx)
    }

    pub async fn call_spec(
        &self,
        spec: &ToolStepSpec,
        retry: bool,
    ) -> Result<ExecutionStepResult, ConnectivityError> {
        self.call(&spec.name, &spec.params, retry).await
    }

    /// Run every step concurrently and join all of them.
    ///
    /// Results keep declaration order and always cover every member. A member
    /// that lost the tool service is recorded as failed, and the first such
    /// error is returned alongside the results.
    pub async fn call_all(
        &self,
        specs: &[ToolStepSpec],
        retry: bool,
    ) -> (Vec<ExecutionStepResult>, Option<ConnectivityError>) {
        let outcomes = join_all(specs.iter().map(|spec| self.call_spec(spec, retry))).await;
        let mut lost = None;
        let results = specs
            .iter()
            .zip(outcomes)
            .map(|(spec, outcome)| match outcome {
                Ok(result) => result,
                Err(err) => {
                    let params = self.completed_params(&spec.name, &spec.params);
                    let result = ExecutionStepResult::failed(&spec.name, params, err.to_string(), 1);
                    lost.get_or_insert(err);
                    result
                }
            })
            .collect();
        (results, lost)
    }

    /// Execute one step, producing exactly one trace entry.
    ///
    /// `prior` is what the preceding step produced; conditions without a
    /// tool probe are checked against it (`null` when absent).
    pub fn execute<'s>(
        &'s self,
        step: &'s WorkflowStep,
        prior: Option<&'s Observation>,
        retry: bool,
    ) -> BoxFuture<'s, Result<TraceEntry, Interrupted>> {
        async move {
            match step {
                WorkflowStep::Tool(spec) => self
                    .call_spec(spec, retry)
                    .await
                    .map(TraceEntry::Tool)
                    .map_err(Interrupted::bare),
                WorkflowStep::Parallel { tools } => {
                    let (results, lost) = self.call_all(tools, retry).await;
                    let entry = TraceEntry::Parallel { results };
                    match lost {
                        None => Ok(entry),
                        Some(error) => Err(Interrupted {
                            partial: Some(entry),
                            error,
                        }),
                    }
                }
                WorkflowStep::Conditional {
                    condition,
                    if_true,
                    if_false,
                } => {
                    let (condition_met, probe) = match condition {
                        Condition::Check(check) => {
                            let met = match prior {
                                Some(observation) => check.holds(observation),
                                None => check.holds(&Observation::none()),
                            };
                            (met, None)
                        }
                        Condition::ToolResult(probe) => {
                            let result = self
                                .call(&probe.tool, &probe.params, retry)
                                .await
                                .map_err(Interrupted::bare)?;
                            (probe.check.holds(&result.observation()), Some(result))
                        }
                    };
                    debug!(condition_met, "conditional evaluated");
                    let branch = if condition_met { if_true } else { if_false };
                    match self.execute(branch, prior, retry).await {
                        Ok(taken) => Ok(TraceEntry::Branch {
                            condition_met,
                            probe,
                            taken: Box::new(taken),
                        }),
                        Err(Interrupted { partial: None, error }) if probe.is_none() => {
                            Err(Interrupted::bare(error))
                        }
                        Err(Interrupted { partial, error }) => {
                            let taken = partial.unwrap_or_else(|| {
                                TraceEntry::Tool(ExecutionStepResult::failed(
                                    &error.tool,
                                    Params::new(),
                                    error.to_string(),
                                    1,
                                ))
                            });
                            Err(Interrupted {
                                partial: Some(TraceEntry::Branch {
                                    condition_met,
                                    probe,
                                    taken: Box::new(taken),
                                }),
                                error,
                            })
                        }
                    }
                }
            }
        }
        .boxed()
    }
}
