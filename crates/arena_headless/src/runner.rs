//! Match runner.
//!
//! Plays a [`Scenario`] to completion with its strategies, optionally
//! recording a replay and writing a JSON summary, and verifies saved
//! replays.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use arena_core::prelude::*;

use crate::metrics::{MatchSummary, MetricsCollector};
use crate::scenario::{Scenario, ScenarioError};

/// Rounds between progress log lines.
const PROGRESS_INTERVAL: u32 = 100;

/// Error type for runner operations.
#[derive(Error, Debug)]
pub enum RunError {
    /// The scenario could not be loaded or built.
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The match aborted.
    #[error("Match aborted: {0}")]
    Game(#[from] GameError),
    /// Output could not be written.
    #[error("Failed to write {path}: {source}")]
    Output {
        /// File being written.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The summary could not be serialized.
    #[error("Failed to serialize summary: {0}")]
    Summary(#[from] serde_json::Error),
}

/// Options for a single run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many rounds even if undecided. `None` plays until the
    /// match is decided.
    pub max_rounds: Option<u32>,
    /// Write the replay here.
    pub replay_path: Option<PathBuf>,
    /// Write the JSON summary here.
    pub summary_path: Option<PathBuf>,
    /// Team memory handed in from a previous match.
    pub memory: Option<[TeamMemory; 2]>,
}

/// Result of a run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Collected metrics.
    pub summary: MatchSummary,
    /// Memory the teams wrote, for the next match.
    pub memory: [TeamMemory; 2],
    /// The recorded replay, when one was requested.
    pub replay: Option<Replay>,
}

/// Build a match for `scenario` with its lineup and the built-in horde.
///
/// # Errors
/// [`ScenarioError::Invalid`] if the scenario does not describe a valid
/// world.
pub fn build_match(
    scenario: &Scenario,
    memory: [TeamMemory; 2],
) -> std::result::Result<Match, ScenarioError> {
    let world = scenario.build_world(memory)?;
    let controller = AgentController::new()
        .with_team(Team::A, scenario.lineup.a.factory())
        .with_team(Team::B, scenario.lineup.b.factory());
    Ok(Match::new(world, Box::new(controller)))
}

/// Play `scenario` according to `options`.
///
/// # Errors
/// Returns an error if the scenario is invalid, the match aborts, or an
/// output file cannot be written.
pub fn run_scenario(
    scenario: &Scenario,
    options: &RunOptions,
) -> std::result::Result<RunOutcome, RunError> {
    let memory = options
        .memory
        .unwrap_or([[0; TEAM_MEMORY_LENGTH]; 2]);
    let mut game = build_match(scenario, memory)?;
    if options.replay_path.is_some() {
        game = game.with_recording()?;
    }

    info!(
        scenario = %scenario.name,
        a = scenario.lineup.a.name(),
        b = scenario.lineup.b.name(),
        round_limit = game.world().round_limit(),
        "Starting match"
    );

    let mut collector = MetricsCollector::new(&scenario.name, game.world());
    let mut played = 0;
    while !game.is_over() && options.max_rounds.map_or(true, |max| played < max) {
        let report = game.run_round()?;
        collector.observe(&report, game.world());
        played += 1;
        if report.round % PROGRESS_INTERVAL == 0 {
            debug!(
                round = report.round,
                units = game.world().store().len(),
                hash = report.state_hash,
                "Progress"
            );
        }
    }

    let summary = collector.finish(game.world());
    match (summary.winner, summary.factor) {
        (Some(winner), Some(factor)) => {
            info!(%winner, ?factor, rounds = summary.rounds, "Match decided");
        }
        _ => warn!(rounds = summary.rounds, "Match stopped undecided"),
    }

    let replay = game.take_replay();
    if let (Some(replay), Some(path)) = (&replay, &options.replay_path) {
        replay.save(path)?;
        info!(path = %path.display(), events = replay.events.len(), "Replay saved");
    }
    if let Some(path) = &options.summary_path {
        write_summary(&summary, path)?;
    }

    Ok(RunOutcome {
        summary,
        memory: game.world().memory_to_persist(),
        replay,
    })
}

fn write_summary(summary: &MatchSummary, path: &Path) -> std::result::Result<(), RunError> {
    let json = summary.to_json()?;
    std::fs::write(path, json).map_err(|source| RunError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "Summary written");
    Ok(())
}

/// Replay verification report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Rounds in the replay.
    pub rounds: usize,
    /// Final round reached by playback.
    pub final_round: u32,
    /// Whether the final hash matched.
    pub matches: bool,
}

/// Load a replay and play it back against its recorded hashes.
///
/// # Errors
/// Returns an error if the file cannot be loaded or playback desyncs
/// mid-match.
pub fn verify_replay<P: AsRef<Path>>(
    path: P,
) -> std::result::Result<Verification, RunError> {
    let replay = Replay::load(path.as_ref())?;
    let rounds = replay.round_count();
    let mut player = ReplayPlayer::new(replay)?;
    let matches = player.verify()?;
    let final_round = player.current_round();
    if matches {
        info!(rounds, final_round, "Replay verified");
    } else {
        warn!(rounds, final_round, "Replay final hash mismatch");
    }
    Ok(Verification {
        rounds,
        final_round,
        matches,
    })
}

/// Run `scenario` `runs` times and return each final hash.
///
/// # Errors
/// Returns the first run's error.
pub fn determinism_check(
    scenario: &Scenario,
    runs: u32,
    max_rounds: Option<u32>,
) -> std::result::Result<Vec<u64>, RunError> {
    let options = RunOptions {
        max_rounds,
        ..RunOptions::default()
    };
    (0..runs)
        .map(|_| run_scenario(scenario, &options).map(|outcome| outcome.summary.final_hash))
        .collect()
}
