//! Headless arena match runner.
//!
//! Plays scenarios without a front end, records and verifies replays.
//! Summaries go to stdout as JSON; logs go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Play the built-in skirmish
//! cargo run -p arena_headless -- run
//!
//! # Play a scenario file, overriding team B's strategy, and keep the replay
//! cargo run -p arena_headless -- run --scenario data/skirmish.ron --team-b rush --replay out.replay
//!
//! # Verify a recorded replay
//! cargo run -p arena_headless -- verify out.replay
//!
//! # Check that repeated runs agree
//! cargo run -p arena_headless -- determinism --runs 5 --max-rounds 300
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use arena_headless::runner::{determinism_check, run_scenario, verify_replay, RunOptions};
use arena_headless::{RunError, Scenario, Strategy};

#[derive(Parser)]
#[command(name = "arena_headless")]
#[command(about = "Headless arena match runner for CI and replay verification")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play one match and print its summary
    Run {
        /// Scenario file to load (defaults to the built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Override team A's strategy
        #[arg(long, value_enum)]
        team_a: Option<Strategy>,

        /// Override team B's strategy
        #[arg(long, value_enum)]
        team_b: Option<Strategy>,

        /// Stop after this many rounds
        #[arg(long)]
        max_rounds: Option<u32>,

        /// Record the match to this replay file
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Also write the JSON summary to this file
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Play back a replay and compare its hashes
    Verify {
        /// Replay file path
        file: PathBuf,
    },

    /// Run the same scenario several times and compare final hashes
    Determinism {
        /// Scenario file to load (defaults to the built-in skirmish)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of runs
        #[arg(short, long, default_value = "3")]
        runs: u32,

        /// Stop each run after this many rounds
        #[arg(long)]
        max_rounds: Option<u32>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs on stderr; stdout carries the JSON summary.
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            team_a,
            team_b,
            max_rounds,
            replay,
            summary,
        } => cmd_run(scenario, team_a, team_b, max_rounds, replay, summary),
        Commands::Verify { file } => cmd_verify(file),
        Commands::Determinism {
            scenario,
            runs,
            max_rounds,
        } => cmd_determinism(scenario, runs, max_rounds),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<PathBuf>) -> Result<Scenario, RunError> {
    match path {
        Some(path) => Ok(Scenario::load(path)?),
        None => Ok(Scenario::skirmish()),
    }
}

/// Play one match.
fn cmd_run(
    scenario: Option<PathBuf>,
    team_a: Option<Strategy>,
    team_b: Option<Strategy>,
    max_rounds: Option<u32>,
    replay: Option<PathBuf>,
    summary: Option<PathBuf>,
) -> Result<bool, RunError> {
    let mut scenario = load_scenario(scenario)?;
    if let Some(strategy) = team_a {
        scenario.lineup.a = strategy;
    }
    if let Some(strategy) = team_b {
        scenario.lineup.b = strategy;
    }

    let options = RunOptions {
        max_rounds,
        replay_path: replay,
        summary_path: summary,
        memory: None,
    };
    let outcome = run_scenario(&scenario, &options)?;
    println!("{}", outcome.summary.to_json()?);
    Ok(true)
}

/// Verify a replay file.
fn cmd_verify(file: PathBuf) -> Result<bool, RunError> {
    tracing::info!("Verifying replay: {}", file.display());
    let verification = verify_replay(&file)?;
    if verification.matches {
        eprintln!(
            "PASS: {} rounds replayed to round {}",
            verification.rounds, verification.final_round
        );
    } else {
        eprintln!("FAIL: Replay produced a different final hash");
    }
    Ok(verification.matches)
}

/// Compare repeated runs.
fn cmd_determinism(
    scenario: Option<PathBuf>,
    runs: u32,
    max_rounds: Option<u32>,
) -> Result<bool, RunError> {
    let scenario = load_scenario(scenario)?;
    tracing::info!("Verifying determinism: {} ({} runs)", scenario.name, runs);

    let hashes = determinism_check(&scenario, runs, max_rounds)?;
    let deterministic = hashes.windows(2).all(|w| w[0] == w[1]);
    if deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        for (run, hash) in hashes.iter().enumerate() {
            eprintln!("  run {run}: {hash:016x}");
        }
    }
    Ok(deterministic)
}
