//! Headless match runner for scenario playback and CI verification.
//!
//! This crate plays arena matches without any front end:
//!
//! - **Scenarios**: RON files bundling a map, kinds, config and a strategy
//!   per team
//! - **Demo strategies**: simple built-in agents so a scenario plays out on
//!   its own
//! - **Replays**: every run can be recorded, and saved replays can be
//!   verified against their recorded hashes
//! - **Metrics**: a JSON summary per match for dashboards
//!
//! # Example
//!
//! ```bash
//! # Play the built-in skirmish and keep the replay
//! cargo run -p arena_headless -- run --replay match.replay
//!
//! # Play a scenario file and write a summary
//! cargo run -p arena_headless -- run --scenario data/skirmish.ron --summary out.json
//!
//! # Verify a replay
//! cargo run -p arena_headless -- verify match.replay
//! ```

pub mod metrics;
pub mod runner;
pub mod scenario;
pub mod strategies;

pub use metrics::{MatchSummary, MetricsCollector, TeamMetrics};
pub use runner::{run_scenario, verify_replay, RunError, RunOptions, RunOutcome};
pub use scenario::{Lineup, Scenario, ScenarioError};
pub use strategies::Strategy;
