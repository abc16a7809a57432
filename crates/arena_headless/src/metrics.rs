//! Match metrics collection.
//!
//! [`MetricsCollector`] watches round reports as a match plays and folds
//! them into a [`MatchSummary`] that serializes to JSON for CI dashboards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use arena_core::prelude::*;

/// Per-team statistics at the end of a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMetrics {
    /// Units alive at the end.
    pub units: u32,
    /// Units created during the match.
    pub units_spawned: u32,
    /// Units removed during the match.
    pub units_lost: u32,
    /// Summed health at the end.
    pub total_health: f64,
    /// Resource pool at the end.
    pub resources: f64,
    /// Encampments owned at the end.
    pub encampments: u32,
    /// Agent turns that faulted.
    pub faults: u32,
    /// Steps consumed by the team's agents.
    pub steps_used: u64,
}

/// Complete record of one match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Scenario the match was started from.
    pub scenario: String,
    /// Map seed.
    pub seed: u32,
    /// Rounds played.
    pub rounds: u32,
    /// Winning team, if the match was decided.
    pub winner: Option<Team>,
    /// How it was won.
    pub factor: Option<DominationFactor>,
    /// World hash after the last round.
    pub final_hash: u64,
    /// Signals that took effect.
    pub signals_applied: u64,
    /// Signals rejected by the rules.
    pub signals_rejected: u64,
    /// Rejection counts keyed by signal name.
    pub rejections: BTreeMap<String, u64>,
    /// Statistics per team.
    pub teams: BTreeMap<Team, TeamMetrics>,
}

impl MatchSummary {
    /// Pretty JSON rendering.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Team entry, if the team took part.
    #[must_use]
    pub fn team(&self, team: Team) -> Option<&TeamMetrics> {
        self.teams.get(&team)
    }
}

/// Collects metrics while a match runs.
#[derive(Debug)]
pub struct MetricsCollector {
    summary: MatchSummary,
    /// Team of every unit seen alive, so removed units can be attributed.
    roster: BTreeMap<UnitId, Team>,
}

impl MetricsCollector {
    /// Start collecting for a match.
    #[must_use]
    pub fn new(scenario: &str, world: &World) -> Self {
        let mut teams = BTreeMap::new();
        for team in Team::ALL {
            teams.insert(team, TeamMetrics::default());
        }
        let mut collector = Self {
            summary: MatchSummary {
                scenario: scenario.to_string(),
                seed: world.map().seed,
                teams,
                ..MatchSummary::default()
            },
            roster: BTreeMap::new(),
        };
        collector.refresh_roster(world);
        collector
    }

    fn refresh_roster(&mut self, world: &World) {
        for unit in world.store().iter() {
            self.roster.insert(unit.id, unit.team);
        }
    }

    fn team_mut(&mut self, team: Team) -> &mut TeamMetrics {
        self.summary.teams.entry(team).or_default()
    }

    /// Fold in one round; `world` is the state right after it.
    pub fn observe(&mut self, report: &RoundReport, world: &World) {
        self.summary.rounds = report.round;
        self.summary.final_hash = report.state_hash;

        for turn in &report.turns {
            if let Some(&team) = self.roster.get(&turn.unit) {
                let metrics = self.team_mut(team);
                metrics.steps_used += u64::from(turn.outcome.steps_used);
                if turn.outcome.fault.is_some() {
                    metrics.faults += 1;
                }
            }
        }

        for record in &report.signals {
            match &record.outcome {
                Outcome::Rejected(_) => {
                    self.summary.signals_rejected += 1;
                    *self
                        .summary
                        .rejections
                        .entry(record.signal.name().to_string())
                        .or_insert(0) += 1;
                }
                Outcome::Spawned(_) => {
                    self.summary.signals_applied += 1;
                    if let Signal::Spawn { team, .. } = record.signal {
                        self.team_mut(team).units_spawned += 1;
                    }
                }
                Outcome::Applied => {
                    self.summary.signals_applied += 1;
                }
            }
        }

        for id in &report.deaths {
            if let Some(&team) = self.roster.get(id) {
                self.team_mut(team).units_lost += 1;
            }
        }
        self.refresh_roster(world);

        if let Some(victory) = report.victory {
            self.summary.winner = Some(victory.winner);
            self.summary.factor = Some(victory.factor);
        }
    }

    /// Snapshot end-of-match state and return the summary.
    #[must_use]
    pub fn finish(mut self, world: &World) -> MatchSummary {
        for team in Team::ALL {
            let units = world.store().team_units(team).count() as u32;
            let total_health = world.total_health(team).to_num::<f64>();
            let resources = world.resources(team).to_num::<f64>();
            let encampments = world.encampment_count(team) as u32;
            let metrics = self.team_mut(team);
            metrics.units = units;
            metrics.total_health = total_health;
            metrics.resources = resources;
            metrics.encampments = encampments;
        }
        self.summary.final_hash = world.state_hash();
        self.summary.rounds = world.round();
        if let Some(victory) = world.victory() {
            self.summary.winner = Some(victory.winner);
            self.summary.factor = Some(victory.factor);
        }
        self.summary
    }

    /// Summary collected so far.
    #[must_use]
    pub fn current(&self) -> &MatchSummary {
        &self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_test_utils::agents::skirmishers;
    use arena_test_utils::fixtures::{match_from, mirror_duel};

    #[test]
    fn test_duel_metrics() {
        let mut game = match_from(mirror_duel(10, 5), skirmishers());
        let mut collector = MetricsCollector::new("duel", game.world());
        for _ in 0..2 {
            let report = game.run_round().unwrap();
            collector.observe(&report, game.world());
        }
        let summary = collector.finish(game.world());

        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.team(Team::A).unwrap().units_lost, 1);
        assert_eq!(summary.team(Team::B).unwrap().units_lost, 1);
        assert_eq!(summary.team(Team::A).unwrap().units, 0);
        assert!(summary.team(Team::A).unwrap().steps_used > 0);
        assert!(summary.signals_applied >= 6);
    }

    #[test]
    fn test_summary_json() {
        let summary = MatchSummary {
            scenario: "skirmish".into(),
            winner: Some(Team::B),
            factor: Some(DominationFactor::Destroyed),
            ..MatchSummary::default()
        };
        let json = summary.to_json().unwrap();
        assert!(json.contains("\"winner\": \"B\""));
        let back: MatchSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
