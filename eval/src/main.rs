mod cli;
mod config;
mod dataset;
mod outcome;
mod report;
mod results;
mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use orchestrator::core::types::StrategyKind;

use crate::config::{Overrides, apply_overrides, load_eval_config};

#[derive(Parser)]
#[command(name = "eval", version, about = "Batch evaluation driver for the orchestrator")]
struct Cli {
    /// Evaluation config (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "eval.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a dataset and write predictions.
    Run {
        #[arg(long)]
        dataset: Option<PathBuf>,
        #[arg(long)]
        num_workers: Option<usize>,
        #[arg(long)]
        max_instances: Option<usize>,
        #[arg(long)]
        strategy: Option<StrategyKind>,
        #[arg(long)]
        workflow: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Tool service endpoint.
        #[arg(long)]
        endpoint: Option<String>,
        /// Disable task and subtask creation during planning.
        #[arg(long)]
        no_task_tracking: bool,
    },
    /// Summarize a run directory (default: newest run under the output dir).
    Report { run_dir: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    orchestrator::logging::init("info");
    let cli = Cli::parse();
    let base = load_eval_config(&cli.config)?;
    match cli.command {
        Command::Run {
            dataset,
            num_workers,
            max_instances,
            strategy,
            workflow,
            output_dir,
            endpoint,
            no_task_tracking,
        } => {
            let overrides = Overrides {
                dataset,
                num_workers,
                max_instances,
                strategy,
                workflow,
                output_dir,
                endpoint,
                task_tracking: no_task_tracking.then_some(false),
            };
            let cfg = apply_overrides(base, &overrides)?;
            cli::run_command(&cfg).await
        }
        Command::Report { run_dir } => cli::report_command(&base.output_dir, run_dir.as_deref()),
    }
}
