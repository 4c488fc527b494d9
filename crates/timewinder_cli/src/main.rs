//! timewinder CLI
//!
//! Runs the bundled scenarios through the explorer and replays any
//! counterexample it finds.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Report, WrapErr};
use color_eyre::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use timewinder_check::{CheckError, EvaluatorConfig, EvaluatorStats};
use timewinder_replay::{ReplayEngine, ReplayReport};
use timewinder_sim::{Expected, Scenario};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timewinder")]
#[command(about = "timewinder - explicit-state model checking of interleaved processes", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled scenarios
    List,
    /// Check a scenario and replay any counterexample
    Check {
        /// Scenario name
        scenario: String,
        /// Step budget
        #[arg(short, long, conflicts_with = "unbounded")]
        steps: Option<usize>,
        /// Explore until no new states appear
        #[arg(long)]
        unbounded: bool,
        /// Evaluator config file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Skip the counterexample replay
        #[arg(long)]
        no_replay: bool,
    },
    /// Print the default evaluator config
    Config,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::List => {
            for scenario in timewinder_sim::scenarios() {
                let steps = scenario
                    .steps
                    .map_or_else(|| "fixpoint".to_string(), |n| n.to_string());
                println!(
                    "{:<20} {:<9} {:<19} {}",
                    scenario.name, steps, scenario.expected, scenario.summary
                );
            }
            Ok(())
        }
        Commands::Check {
            scenario,
            steps,
            unbounded,
            config,
            json,
            no_replay,
        } => {
            let scenario = timewinder_sim::find(&scenario)
                .ok_or_else(|| eyre!("unknown scenario `{}`, see `timewinder list`", scenario))?;
            let config = resolve_config(scenario, config.as_deref(), steps, unbounded)?;
            check(scenario, config, json, !no_replay)
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&EvaluatorConfig::default())?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Config file first, then command line overrides
fn resolve_config(
    scenario: &Scenario,
    path: Option<&Path>,
    steps: Option<usize>,
    unbounded: bool,
) -> Result<Option<EvaluatorConfig>> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("reading {}", path.display()))?;
            let config: EvaluatorConfig = serde_json::from_str(&text)
                .wrap_err_with(|| format!("parsing {}", path.display()))?;
            Some(config)
        }
        None => None,
    };

    if steps.is_some() || unbounded {
        let base = config.unwrap_or_else(|| EvaluatorConfig {
            max_steps: scenario.steps,
            ..EvaluatorConfig::default()
        });
        config = Some(match steps {
            Some(n) => base.with_max_steps(n),
            None => base.unbounded(),
        });
    }
    Ok(config)
}

fn check(
    scenario: &Scenario,
    config: Option<EvaluatorConfig>,
    json: bool,
    replay: bool,
) -> Result<()> {
    let mut ev = scenario.build(config)?;
    tracing::info!(scenario = scenario.name, specs = ev.specs().len(), "checking");
    let result = ev.evaluate();

    let outcome = Expected::of(&result);
    if outcome != Some(scenario.expected) {
        tracing::warn!(
            scenario = scenario.name,
            expected = %scenario.expected,
            "outcome differs from the scenario's known result"
        );
    }

    let err = match result {
        Ok(stats) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
                println!("All specifications hold");
            }
            return Ok(());
        }
        Err(err) => err,
    };

    let report = match (replay, err.thunk()) {
        (true, Some(thunk)) => Some(ReplayEngine::new().replay(ev.controller_mut(), thunk)?),
        _ => None,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&failure_json(&err, report.as_ref()))?);
    } else {
        print_stats(&ev.stats());
        println!("{}", err);
        if let Some(violation) = err.violation() {
            println!("\n{}", violation.state);
        }
        if let Some(report) = &report {
            println!("{}", report);
        }
    }

    Err(Report::new(err).wrap_err(format!("scenario `{}` failed", scenario.name)))
}

fn failure_json(err: &CheckError, report: Option<&ReplayReport>) -> serde_json::Value {
    let mut out = json!({
        "outcome": Expected::of_error(err),
        "error": err.to_string(),
        "thunk": err.thunk(),
        "replay": report,
    });
    if let Some(violation) = err.violation() {
        out["spec"] = json!(violation.spec);
        out["state"] = json!(violation.state);
    }
    out
}

fn print_stats(stats: &EvaluatorStats) {
    println!("Steps:             {}", stats.steps);
    println!("States:            {}", stats.states);
    println!("Final states:      {}", stats.final_states);
    println!("Thread executions: {}", stats.thread_executions);
    println!("Stored snapshots:  {}", stats.cas_objects);
}
