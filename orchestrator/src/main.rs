//! Repair-task workflow orchestrator.
//!
//! Classifies problem instances, routes them to a strategy and drives the
//! resulting workflow against an MCP tool service.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};

use orchestrator::core::chains::registered;
use orchestrator::core::classifier::classify;
use orchestrator::core::complexity::{route_for_score, score};
use orchestrator::core::types::StrategyKind;
use orchestrator::exit_codes;
use orchestrator::io::config::{SolverConfig, load_config, write_config};
use orchestrator::io::http_client::McpHttpClient;
use orchestrator::io::instance::{load_instance, load_workflow};
use orchestrator::logging;
use orchestrator::solve::Solver;
use orchestrator::strategy::Strategy;

const DEFAULT_CONFIG: &str = "orchestrator.toml";

#[derive(Parser)]
#[command(
    name = "orchestrator",
    version,
    about = "Workflow orchestrator for software-repair tasks"
)]
struct Cli {
    /// Path to the solver config (TOML). Missing files fall back to defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the problem category of a statement or instance file.
    Classify {
        /// Problem statement text.
        #[arg(required_unless_present = "instance")]
        text: Option<String>,
        /// Read the statement from an instance JSON file instead.
        #[arg(long, conflicts_with = "text")]
        instance: Option<PathBuf>,
    },
    /// Print the complexity score and route for an instance file.
    Score {
        #[arg(long)]
        instance: PathBuf,
    },
    /// Print the registered tool chains as JSON.
    Chains,
    /// Solve one instance and print the outcome as JSON.
    Solve {
        #[arg(long)]
        instance: PathBuf,
        /// basic, advanced, hybrid or custom.
        #[arg(long, default_value = "hybrid")]
        strategy: StrategyKind,
        /// Custom workflow JSON (required for `custom`).
        #[arg(long)]
        workflow: Option<PathBuf>,
        /// Write the outcome here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    logging::init("warn");
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Classify { text, instance } => cmd_classify(text, instance.as_deref()),
        Command::Score { instance } => cmd_score(&instance),
        Command::Chains => cmd_chains(),
        Command::Solve {
            instance,
            strategy,
            workflow,
            output,
        } => {
            let cfg = load_config(&cli.config)?;
            cmd_solve(&cfg, &instance, strategy, workflow.as_deref(), output.as_deref()).await
        }
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &SolverConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_classify(text: Option<String>, instance: Option<&Path>) -> Result<i32> {
    let statement = match (text, instance) {
        (_, Some(path)) => load_instance(path)?.problem_statement,
        (Some(text), None) => text,
        (None, None) => bail!("provide a statement or --instance"),
    };
    println!("{}", classify(&statement));
    Ok(exit_codes::OK)
}

#[derive(Serialize)]
struct ScoreView {
    instance_id: String,
    category: String,
    complexity: u8,
    route: orchestrator::core::types::Route,
}

fn cmd_score(path: &Path) -> Result<i32> {
    let instance = load_instance(path)?;
    let complexity = score(&instance);
    let view = ScoreView {
        category: classify(&instance.problem_statement).to_string(),
        complexity,
        route: route_for_score(complexity).into(),
        instance_id: instance.instance_id,
    };
    print_json(&view)?;
    Ok(exit_codes::OK)
}

fn cmd_chains() -> Result<i32> {
    let chains: Vec<_> = registered().map(|(_, chain)| chain).collect();
    print_json(&chains)?;
    Ok(exit_codes::OK)
}

async fn cmd_solve(
    cfg: &SolverConfig,
    instance_path: &Path,
    kind: StrategyKind,
    workflow: Option<&Path>,
    output: Option<&Path>,
) -> Result<i32> {
    let instance = load_instance(instance_path)?;
    let workflow = workflow.map(load_workflow).transpose()?;
    let strategy = Strategy::from_kind(kind, workflow)?;

    let client = McpHttpClient::from_config(cfg);
    if let Err(err) = client.ping().await {
        error!(endpoint = client.endpoint(), error = %err, "tool service unreachable");
        eprintln!("tool service unreachable at {}: {err}", client.endpoint());
        return Ok(exit_codes::UNREACHABLE);
    }

    info!(instance = %instance.instance_id, strategy = %kind, "solving");
    let outcome = Solver::new(&client, cfg).solve(&instance, &strategy).await;

    match output {
        Some(path) => {
            let mut payload = serde_json::to_string_pretty(&outcome).context("serialize outcome")?;
            payload.push('\n');
            fs::write(path, payload).with_context(|| format!("write {}", path.display()))?;
        }
        None => print_json(&outcome)?,
    }

    Ok(if outcome.fatal.is_some() {
        exit_codes::UNREACHABLE
    } else if outcome.tests_pass() {
        exit_codes::OK
    } else {
        exit_codes::UNRESOLVED
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}
