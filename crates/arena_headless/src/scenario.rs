//! Scenario loading and configuration.
//!
//! A scenario bundles everything needed to start a match from the command
//! line: the map, the kind table, gameplay constants and which built-in
//! strategy drives each player team.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arena_core::prelude::*;

use crate::strategies::Strategy;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario parsed but describes an impossible match.
    #[error("Invalid scenario: {0}")]
    Invalid(#[from] GameError),
}

/// Which strategy plays each player team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineup {
    /// Team A's strategy.
    pub a: Strategy,
    /// Team B's strategy.
    pub b: Strategy,
}

impl Default for Lineup {
    fn default() -> Self {
        Self {
            a: Strategy::Rush,
            b: Strategy::Turtle,
        }
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Terrain, starting units and round limit.
    pub map: GameMap,
    /// Every kind the map and the agents refer to.
    pub kinds: Vec<UnitKind>,
    /// Gameplay constants.
    #[serde(default)]
    pub config: GameConfig,
    /// Strategies for the two player teams.
    #[serde(default)]
    pub lineup: Lineup,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> std::result::Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Built-in 24x24 skirmish: one HQ per team, four encampment sites and
    /// a zombie den in the middle.
    #[must_use]
    pub fn skirmish() -> Self {
        let map = GameMap {
            round_limit: Some(600),
            encampments: vec![
                Location::new(6, 17),
                Location::new(10, 10),
                Location::new(13, 13),
                Location::new(17, 6),
            ],
            ..GameMap::open(24, 24, 2024)
                .with_unit(Team::A, kinds::HQ, Location::new(2, 2))
                .with_unit(Team::B, kinds::HQ, Location::new(21, 21))
                .with_unit(Team::Zombie, kinds::DEN, Location::new(12, 11))
        };
        Self {
            name: "skirmish".to_string(),
            description: "Mirrored bases with a den in the middle".to_string(),
            map,
            kinds: kinds::standard(),
            config: GameConfig::default(),
            lineup: Lineup::default(),
        }
    }

    /// Validate and build the starting world.
    ///
    /// # Errors
    /// [`ScenarioError::Invalid`] if the kinds, map or config are rejected.
    pub fn build_world(
        &self,
        memory: [TeamMemory; 2],
    ) -> std::result::Result<World, ScenarioError> {
        let kinds = KindTable::new(self.kinds.iter().cloned())?;
        Ok(World::new(self.map.clone(), kinds, self.config.clone(), memory)?)
    }
}

/// Kinds used by the built-in scenario.
pub mod kinds {
    use arena_core::kind::{InfectionKind, InfectionRule, SpawnRule};
    use arena_core::prelude::*;

    /// Headquarters.
    pub const HQ: KindId = KindId(1);
    /// Buildable fighter.
    pub const SOLDIER: KindId = KindId(2);
    /// Hostile walker.
    pub const ZOMBIE: KindId = KindId(3);
    /// Hostile spawner.
    pub const DEN: KindId = KindId(4);

    fn whole(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    /// The four kinds of the skirmish.
    #[must_use]
    pub fn standard() -> Vec<UnitKind> {
        vec![
            UnitKind {
                is_leader: true,
                is_structure: true,
                can_research: true,
                sensor_radius_squared: 24,
                builds: vec![SOLDIER],
                ..UnitKind::new(HQ, "hq", whole(500)).with_budget(10_000)
            },
            UnitKind {
                is_buildable: true,
                build_turns: 10,
                can_capture: true,
                sensor_radius_squared: 24,
                zombie_form: Some(ZOMBIE),
                loading_delay: whole(1),
                ..UnitKind::new(SOLDIER, "soldier", whole(40))
                    .with_attack(whole(6), 2, whole(1))
                    .with_movement(whole(1))
                    .with_budget(10_000)
                    .with_cost(whole(10))
            },
            UnitKind {
                is_hostile: true,
                sensor_radius_squared: 24,
                infects: Some(InfectionRule {
                    kind: InfectionKind::Zombie,
                    turns: 10,
                }),
                ..UnitKind::new(ZOMBIE, "zombie", whole(30))
                    .with_attack(whole(3), 2, whole(1))
                    .with_movement(whole(2))
                    .with_budget(2_000)
            },
            UnitKind {
                is_hostile: true,
                is_structure: true,
                spawns: Some(SpawnRule {
                    kind: ZOMBIE,
                    every_rounds: 40,
                }),
                ..UnitKind::new(DEN, "den", whole(200))
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scenario_builds() {
        let scenario = Scenario::default();
        let world = scenario.build_world([[0; TEAM_MEMORY_LENGTH]; 2]).unwrap();
        assert_eq!(world.store().len(), 3);
        assert_eq!(world.round_limit(), 600);
    }

    #[test]
    fn test_parse_from_ron() {
        let ron = r#"
            Scenario(
                name: "tiny",
                map: GameMap(
                    width: 5,
                    height: 1,
                    units: [
                        InitialUnit(team: A, kind: KindId(1), location: Location(x: 0, y: 0)),
                        InitialUnit(team: B, kind: KindId(1), location: Location(x: 4, y: 0)),
                    ],
                ),
                kinds: [
                    UnitKind(id: KindId(1), name: "hq", max_health: 50.0, is_leader: true),
                ],
                config: GameConfig(base_income: 1.5),
                lineup: Lineup(a: Idle, b: Rush),
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.name, "tiny");
        assert_eq!(scenario.lineup.b, Strategy::Rush);
        assert_eq!(scenario.config.base_income, Fixed::from_num(1.5));
        assert_eq!(
            scenario.config.exception_step_penalty,
            GameConfig::default().exception_step_penalty
        );
        assert!(scenario.build_world([[0; TEAM_MEMORY_LENGTH]; 2]).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = Scenario::load("/nonexistent/arena.ron").unwrap_err();
        assert!(matches!(err, ScenarioError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_map_is_reported() {
        let mut scenario = Scenario::skirmish();
        scenario.map = scenario
            .map
            .with_unit(Team::A, KindId(99), Location::new(0, 0));
        let err = scenario.build_world([[0; TEAM_MEMORY_LENGTH]; 2]).unwrap_err();
        assert!(matches!(err, ScenarioError::Invalid(_)));
    }
}
