//! Four-phase pipeline for high-complexity instances.
//!
//! Phases run in order (analysis, planning, implementation, validation). Each
//! phase receives the previous phase's output read-only and reports its own
//! completion status. Nothing is rolled back. Only a connectivity error stops
//! the pipeline early.

use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::chains::ToolStepSpec;
use crate::core::params::{PROJECT_DESCRIPTION_CHARS, truncate_chars};
use crate::core::results::{file_content, implementation_pattern, match_paths, task_id};
use crate::core::trace::{
    Analysis, ExecutionStepResult, ExecutionTrace, FileEdit, Phase, PhaseReport, PhaseStatus,
    PhasedRun, Plan, TraceEntry, ValidationOutcome,
};
use crate::core::types::Params;
use crate::executor::StepExecutor;
use crate::fix::{FixGenerator, FixRequest};
use crate::io::config::ToolDefaults;
use crate::io::tool_client::ToolClient;
use crate::validation::validate_tests;

/// `maxResults` for the per-test implementation-file searches.
const IMPLEMENTATION_SEARCH_RESULTS: u32 = 10;

/// Settings the phases read from the solver config.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSettings<'a> {
    pub tools: &'a ToolDefaults,
    pub task_tracking: bool,
}

/// Run all four phases.
#[instrument(skip_all, fields(instance = %executor.instance().instance_id))]
pub async fn run_phased<C, F>(
    executor: &StepExecutor<'_, C>,
    settings: PhaseSettings<'_>,
    fixer: &F,
) -> PhasedRun
where
    C: ToolClient + ?Sized,
    F: FixGenerator + ?Sized,
{
    let mut run = PhasedRun {
        phases: Vec::with_capacity(Phase::ORDER.len()),
        analysis: Analysis::default(),
        plan: Plan::default(),
        edits: Vec::new(),
        validation: ValidationOutcome::default(),
    };

    let (report, analysis) = analysis_phase(executor, settings).await;
    run.analysis = analysis;
    if push_report(&mut run, report) {
        return run;
    }

    let (report, plan) = planning_phase(executor, settings, &run.analysis).await;
    run.plan = plan;
    if push_report(&mut run, report) {
        return run;
    }

    let (report, edits) = implementation_phase(executor, fixer, &run.analysis, &run.plan).await;
    run.edits = edits;
    if push_report(&mut run, report) {
        return run;
    }

    let (trace, validation) = validate_tests(executor, settings.tools).await;
    let status = if validation.tests_pass && !trace.is_aborted() {
        PhaseStatus::Complete
    } else {
        PhaseStatus::Failed
    };
    run.validation = validation;
    push_report(&mut run, PhaseReport::new(Phase::Validation, status, trace));
    run
}

/// Record `report`; returns true when the pipeline must stop.
fn push_report(run: &mut PhasedRun, report: PhaseReport) -> bool {
    let aborted = report.trace.is_aborted();
    info!(
        phase = report.phase.as_str(),
        status = ?report.status,
        entries = report.trace.len(),
        "phase finished"
    );
    if aborted {
        warn!(phase = report.phase.as_str(), "pipeline aborted");
    }
    run.phases.push(report);
    aborted
}

fn status_of(trace: &ExecutionTrace) -> PhaseStatus {
    if trace.is_aborted() || trace.failed_steps() > 0 {
        PhaseStatus::Failed
    } else {
        PhaseStatus::Complete
    }
}

fn spec(name: &str, params: Value) -> ToolStepSpec {
    ToolStepSpec::new(name, params)
}

/// Locate test files and the implementation files they exercise.
async fn analysis_phase<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    settings: PhaseSettings<'_>,
) -> (PhaseReport, Analysis) {
    let mut trace = ExecutionTrace::default();
    let instance = executor.instance();

    let search = spec(
        "search_code",
        json!({ "maxResults": settings.tools.search_max_results }),
    );
    let mut first = vec![search];
    if settings.task_tracking {
        first.push(spec(
            "addTask",
            json!({ "title": "Understand the problem", "priority": "critical" }),
        ));
    }
    let (results, lost) = executor.call_all(&first, true).await;
    let located = results
        .first()
        .and_then(|result| result.result.as_ref())
        .map(match_paths)
        .unwrap_or_default();
    trace.push(TraceEntry::Parallel { results });
    if let Some(err) = lost {
        trace.aborted = Some(err);
        return (PhaseReport::new(Phase::Analysis, PhaseStatus::Failed, trace), Analysis::default());
    }

    let impl_searches: Vec<ToolStepSpec> = located
        .iter()
        .filter_map(|path| implementation_pattern(path))
        .map(|pattern| {
            spec(
                "search_code",
                json!({ "pattern": pattern, "maxResults": IMPLEMENTATION_SEARCH_RESULTS }),
            )
        })
        .collect();

    let mut implementation = Vec::new();
    if !impl_searches.is_empty() {
        let (results, lost) = executor.call_all(&impl_searches, true).await;
        for value in results.iter().filter_map(|r| r.result.as_ref()) {
            implementation.extend(match_paths(value));
        }
        trace.push(TraceEntry::Parallel { results });
        trace.aborted = lost;
    }

    let matched = if implementation.is_empty() {
        &located
    } else {
        &implementation
    };
    let mut candidates: Vec<String> = Vec::new();
    for path in instance.file_hints.iter().chain(matched.iter()) {
        if candidates.len() == settings.tools.max_planned_files {
            break;
        }
        if !candidates.contains(path) {
            candidates.push(path.clone());
        }
    }
    debug!(located = located.len(), candidates = candidates.len(), "analysis complete");

    let analysis = Analysis {
        candidate_files: candidates,
        located_files: located,
    };
    (PhaseReport::new(Phase::Analysis, status_of(&trace), trace), analysis)
}

/// Create the tracking task and one subtask per planned file.
async fn planning_phase<C: ToolClient + ?Sized>(
    executor: &StepExecutor<'_, C>,
    settings: PhaseSettings<'_>,
    analysis: &Analysis,
) -> (PhaseReport, Plan) {
    let mut trace = ExecutionTrace::default();
    let instance = executor.instance();
    let mut plan = Plan {
        task_id: None,
        files: analysis.candidate_files.clone(),
    };

    let task_params = json!({
        "title": format!("Fix: {}", instance.instance_id),
        "description": truncate_chars(&instance.problem_statement, PROJECT_DESCRIPTION_CHARS),
        "priority": "critical",
    });
    let skip_reason = if settings.task_tracking {
        let task = match executor.call("addTask", &to_params(task_params), true).await {
            Ok(task) => task,
            Err(err) => {
                trace.aborted = Some(err);
                return (PhaseReport::new(Phase::Planning, PhaseStatus::Failed, trace), plan);
            }
        };
        plan.task_id = task.result.as_ref().and_then(task_id);
        trace.push(TraceEntry::Tool(task));
        plan.task_id.is_none().then_some("no task id returned")
    } else {
        trace.push(TraceEntry::Tool(ExecutionStepResult::skipped(
            "addTask",
            to_params(task_params),
            "task tracking disabled",
        )));
        Some("task tracking disabled")
    };

    if !plan.files.is_empty() {
        let subtasks: Vec<ToolStepSpec> = plan
            .files
            .iter()
            .map(|path| {
                spec(
                    "addSubtask",
                    json!({
                        "parentId": plan.task_id.clone().unwrap_or_default(),
                        "title": format!("Modify {path}"),
                        "relatedFiles": path,
                    }),
                )
            })
            .collect();

        match skip_reason {
            Some(reason) => {
                let results = subtasks
                    .into_iter()
                    .map(|s| ExecutionStepResult::skipped(s.name, s.params, reason))
                    .collect();
                trace.push(TraceEntry::Parallel { results });
            }
            None => {
                let (results, lost) = executor.call_all(&subtasks, true).await;
                trace.push(TraceEntry::Parallel { results });
                trace.aborted = lost;
            }
        }
    }

    (PhaseReport::new(Phase::Planning, status_of(&trace), trace), plan)
}

/// Read each planned file, ask the fix generator, and apply changed content.
async fn implementation_phase<C, F>(
    executor: &StepExecutor<'_, C>,
    fixer: &F,
    analysis: &Analysis,
    plan: &Plan,
) -> (PhaseReport, Vec<FileEdit>)
where
    C: ToolClient + ?Sized,
    F: FixGenerator + ?Sized,
{
    let mut trace = ExecutionTrace::default();
    let mut edits = Vec::new();

    for path in &plan.files {
        let read = match executor.call("read_file", &to_params(json!({ "path": path })), true).await {
            Ok(read) => read,
            Err(err) => {
                trace.aborted = Some(err);
                break;
            }
        };
        let content = read.result.as_ref().and_then(file_content);
        trace.push(TraceEntry::Tool(read));

        let edit_params = |old: &str, new: &str| {
            to_params(json!({
                "file_path": path,
                "old_string": old,
                "new_string": new,
                "expected_replacements": 1,
            }))
        };

        let Some(content) = content else {
            trace.push(TraceEntry::Tool(ExecutionStepResult::skipped(
                "edit_block",
                to_params(json!({ "file_path": path })),
                "file content unavailable",
            )));
            continue;
        };

        let request = FixRequest {
            instance: executor.instance(),
            analysis,
            path,
            content: &content,
        };
        let updated = match fixer.generate(request).await {
            Ok(updated) => updated,
            Err(err) => {
                warn!(path = %path, error = %err, "fix generation failed");
                trace.push(TraceEntry::Tool(ExecutionStepResult::failed(
                    "edit_block",
                    to_params(json!({ "file_path": path })),
                    format!("fix generation failed: {err:#}"),
                    0,
                )));
                continue;
            }
        };

        if updated == content {
            trace.push(TraceEntry::Tool(ExecutionStepResult::skipped(
                "edit_block",
                to_params(json!({ "file_path": path })),
                "content unchanged",
            )));
            continue;
        }

        match executor.call("edit_block", &edit_params(&content, &updated), true).await {
            Ok(edit) => {
                if edit.is_success() {
                    edits.push(FileEdit {
                        path: path.clone(),
                        original: content,
                        updated,
                    });
                }
                trace.push(TraceEntry::Tool(edit));
            }
            Err(err) => {
                trace.aborted = Some(err);
                break;
            }
        }
    }

    (PhaseReport::new(Phase::Implementation, status_of(&trace), trace), edits)
}

fn to_params(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
