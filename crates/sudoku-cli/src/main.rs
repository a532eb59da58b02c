//! Sudoku CLI - solve puzzles through the orchestrator and a background worker.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use sudoku_core::{Measurement, Rules, Sudoku};
use sudoku_orchestrator::{
    ChannelInterface, Notification, Orchestrator, OrchestratorConfig, OrchestratorError,
    SolveTrigger,
};
use sudoku_proto::Event;
use sudoku_solver::BuiltinLoader;

mod json_output;

use json_output::{emit_event, enable_json_mode, is_json_mode};

/// Sudoku CLI - offloads solving to a worker and reports timing
#[derive(Parser)]
#[command(name = "sudoku")]
#[command(about = "Solve sudoku puzzles on a background worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve one puzzle
    Solve {
        /// 81 characters, row by row. Digits 1-9 are givens, anything else is empty
        puzzle: String,

        /// JSON rule set with killer cages
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Print events as JSON lines instead of the grid
        #[arg(long)]
        json: bool,

        /// Seconds to wait for the solver to load (0 waits forever)
        #[arg(long, default_value = "30")]
        ready_timeout_secs: u64,
    },

    /// Solve every puzzle of a file, one per line, on a single worker
    Bench {
        /// File with one 81-character puzzle per line
        file: PathBuf,

        /// Seconds to wait for the solver to load (0 waits forever)
        #[arg(long, default_value = "30")]
        ready_timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    match cli.command {
        Commands::Solve {
            puzzle,
            rules,
            json,
            ready_timeout_secs,
        } => {
            if json {
                enable_json_mode();
            }
            solve(&puzzle, rules.as_deref(), ready_timeout_secs).await?;
        }
        Commands::Bench {
            file,
            ready_timeout_secs,
        } => {
            bench(&file, ready_timeout_secs).await?;
        }
    }

    Ok(())
}

/// How a solve ended when it did not fail.
enum Outcome {
    Solved {
        solution: Sudoku,
        measurement: Measurement,
    },
    Aborted,
}

fn orchestrator_config(ready_timeout_secs: u64) -> OrchestratorConfig {
    OrchestratorConfig {
        ready_timeout: (ready_timeout_secs > 0).then(|| Duration::from_secs(ready_timeout_secs)),
        ..Default::default()
    }
}

async fn start(
    ready_timeout_secs: u64,
) -> Result<(Orchestrator, SolveTrigger, UnboundedReceiver<Notification>), Box<dyn Error>> {
    let (interface, rx) = ChannelInterface::new();
    let mut orchestrator = Orchestrator::new(Arc::new(BuiltinLoader::new()), Arc::new(interface))
        .with_config(orchestrator_config(ready_timeout_secs));
    orchestrator.start()?;

    let solver = orchestrator.ready().await?;
    emit_event(solver.worker_id().as_str(), &Event::Ready);
    Ok((orchestrator, solver, rx))
}

fn load_rules(path: &Path) -> Result<Rules, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    let rules: Rules = serde_json::from_str(&text)?;
    rules.validate()?;
    info!(path = %path.display(), cages = rules.cages.len(), "Loaded rules");
    Ok(rules)
}

async fn solve(
    puzzle: &str,
    rules_path: Option<&Path>,
    ready_timeout_secs: u64,
) -> Result<(), Box<dyn Error>> {
    let puzzle: Sudoku = puzzle.trim().parse()?;
    let rules = rules_path.map(load_rules).transpose()?;

    let (mut orchestrator, solver, mut rx) = start(ready_timeout_secs).await?;
    solver.solve(puzzle, rules)?;
    let outcome = await_outcome(&mut rx, &solver, true).await;
    orchestrator.shutdown().await?;

    match outcome? {
        Outcome::Solved {
            solution,
            measurement,
        } => {
            if !is_json_mode() {
                println!("{}", solution);
                println!("{}: {}", measurement.name, measurement);
            }
        }
        Outcome::Aborted => info!("Solve aborted"),
    }
    Ok(())
}

async fn bench(file: &Path, ready_timeout_secs: u64) -> Result<(), Box<dyn Error>> {
    let text = std::fs::read_to_string(file)?;
    let mut puzzles = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<Sudoku>() {
            Ok(puzzle) => puzzles.push((index + 1, puzzle)),
            Err(e) => warn!(line = index + 1, error = %e, "Skipping line"),
        }
    }
    if puzzles.is_empty() {
        return Err(format!("no puzzles in {}", file.display()).into());
    }
    info!(count = puzzles.len(), file = %file.display(), "Benchmarking");

    let (mut orchestrator, solver, mut rx) = start(ready_timeout_secs).await?;
    let mut durations = Vec::with_capacity(puzzles.len());
    let mut failed = 0usize;

    for (line, puzzle) in puzzles {
        solver.solve(puzzle, None)?;
        match await_outcome(&mut rx, &solver, false).await {
            Ok(Outcome::Solved { measurement, .. }) => {
                println!("{:>6}  {:>12.3} ms", line, measurement.duration);
                durations.push(measurement.duration);
            }
            Ok(Outcome::Aborted) => {
                println!("{:>6}  aborted", line);
                failed += 1;
            }
            Err(e) if !e.is_fatal() => {
                println!("{:>6}  {}", line, e);
                failed += 1;
            }
            Err(e) => {
                orchestrator.shutdown().await?;
                return Err(e.into());
            }
        }
    }
    orchestrator.shutdown().await?;

    let total: f64 = durations.iter().sum();
    let min = durations.iter().copied().fold(f64::INFINITY, f64::min);
    let max = durations.iter().copied().fold(0.0, f64::max);
    println!();
    println!("solved:  {}", durations.len());
    println!("failed:  {}", failed);
    if !durations.is_empty() {
        println!("total:   {:.3} ms", total);
        println!("mean:    {:.3} ms", total / durations.len() as f64);
        println!("min:     {:.3} ms", min);
        println!("max:     {:.3} ms", max);
    }
    Ok(())
}

/// Wait for the terminal notification of the solve just sent.
///
/// With `cancel_on_interrupt`, Ctrl-C cancels the solve instead of killing
/// the process.
async fn await_outcome(
    rx: &mut UnboundedReceiver<Notification>,
    solver: &SolveTrigger,
    cancel_on_interrupt: bool,
) -> Result<Outcome, OrchestratorError> {
    let worker_id = solver.worker_id().to_string();
    let mut solution = None;
    let mut interrupted = false;

    loop {
        let notification = tokio::select! {
            notification = rx.recv() => notification,
            _ = tokio::signal::ctrl_c(), if cancel_on_interrupt && !interrupted => {
                info!("Interrupted, cancelling solve");
                interrupted = true;
                solver.cancel()?;
                continue;
            }
        };

        match notification {
            None => {
                return Err(OrchestratorError::Channel(
                    "orchestrator stopped".to_string(),
                ))
            }
            Some(Notification::SolverReady(_)) => {}
            Some(Notification::Progress(value)) => {
                debug!(progress = value, "Progress");
                emit_event(&worker_id, &Event::Progress { value });
            }
            Some(Notification::Solved(grid)) => solution = Some(grid),
            Some(Notification::Measured(measurement)) => {
                let Some(solution) = solution.take() else {
                    warn!("Measurement without a solution");
                    continue;
                };
                emit_event(
                    &worker_id,
                    &Event::Solved {
                        solution,
                        measurement: measurement.clone(),
                    },
                );
                return Ok(Outcome::Solved {
                    solution,
                    measurement,
                });
            }
            Some(Notification::Aborted) => {
                emit_event(&worker_id, &Event::Aborted);
                return Ok(Outcome::Aborted);
            }
            Some(Notification::Error(e)) => {
                match &e {
                    OrchestratorError::Solve(error) => emit_event(
                        &worker_id,
                        &Event::SolveFailed {
                            error: error.clone(),
                        },
                    ),
                    OrchestratorError::Load(message) => emit_event(
                        &worker_id,
                        &Event::LoadFailed {
                            message: message.clone(),
                        },
                    ),
                    _ => {}
                }
                return Err(e);
            }
        }
    }
}
