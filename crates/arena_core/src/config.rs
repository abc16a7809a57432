//! Gameplay constants.
//!
//! [`GameConfig`] gathers every tunable the simulation reads. Defaults
//! reproduce the reference rule set; hosts can override any subset from a
//! RON document, missing fields fall back to the defaults.
//!
//! # Example RON
//!
//! ```ron
//! GameConfig(
//!     base_income: 2.0,
//!     decay_rate: 0.8,
//!     time_limit_damage: 1.0,
//! )
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, Fixed};

/// Number of `i64` words each team may persist between matches.
pub const TEAM_MEMORY_LENGTH: usize = 32;

/// Researchable team upgrades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Upgrade {
    /// Slows the decay of the resource pool.
    Fusion,
    /// Extends sensor range.
    Vision,
    /// Shortens mine defusal.
    Defusion,
}

impl Upgrade {
    /// Every upgrade.
    pub const ALL: [Self; 3] = [Self::Fusion, Self::Vision, Self::Defusion];
}

/// Research requirements for one upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeSpec {
    /// Rounds of research needed.
    pub rounds: u32,
    /// Paid once when a unit begins researching it.
    #[serde(with = "fixed_decimal")]
    pub cost: Fixed,
}

/// Every gameplay constant the simulation reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Steps charged each time an agent's turn faults.
    pub exception_step_penalty: u32,
    /// Consecutive faulting turns after which a unit self-destructs.
    pub fault_strike_limit: u32,
    /// Radio entries kept per team before the oldest are evicted.
    pub signal_queue_max: usize,
    /// Channel writes allowed in one broadcast.
    pub messages_per_turn: usize,

    /// Starting pool for each player team.
    #[serde(with = "fixed_decimal")]
    pub initial_resources: Fixed,
    /// Income per round before the unit penalty.
    #[serde(with = "fixed_decimal")]
    pub base_income: Fixed,
    /// Income lost per unit a team controls.
    #[serde(with = "fixed_decimal")]
    pub unit_income_penalty: Fixed,
    /// Multiplicative pool decay without Fusion.
    #[serde(with = "fixed_decimal")]
    pub decay_rate: Fixed,
    /// Multiplicative pool decay with Fusion.
    #[serde(with = "fixed_decimal")]
    pub sustain_decay_rate: Fixed,
    /// Paid per executing player unit per round.
    #[serde(with = "fixed_decimal")]
    pub unit_upkeep: Fixed,

    /// Round limit used when the map does not set one.
    pub default_round_limit: u32,
    /// Damage applied to each leader every round once the limit is reached.
    #[serde(with = "fixed_decimal")]
    pub time_limit_damage: Fixed,

    /// Weight of the unused-budget term in delay decay.
    #[serde(with = "fixed_decimal")]
    pub delay_decay_k: Fixed,
    /// Multiplier applied to movement delay for diagonal steps.
    #[serde(with = "fixed_decimal")]
    pub diagonal_delay_multiplier: Fixed,
    /// Added to both delays when a unit transforms.
    #[serde(with = "fixed_decimal")]
    pub transform_delay: Fixed,

    /// Per-round damage while viper-infected.
    #[serde(with = "fixed_decimal")]
    pub viper_infection_damage: Fixed,
    /// Per-round damage while zombie-infected.
    #[serde(with = "fixed_decimal")]
    pub zombie_infection_damage: Fixed,

    /// Shield lost by every unit at the end of each round.
    #[serde(with = "fixed_decimal")]
    pub shield_decay: Fixed,
    /// Largest shield pool a unit may carry.
    #[serde(with = "fixed_decimal")]
    pub shield_cap: Fixed,

    /// Damage per round to a unit standing on a hostile mine.
    #[serde(with = "fixed_decimal")]
    pub mine_damage: Fixed,
    /// Fraction of mine damage shields can absorb.
    #[serde(with = "fixed_decimal")]
    pub mine_shield_absorption: Fixed,
    /// Rounds needed to lay a mine.
    pub mine_lay_rounds: u32,
    /// Rounds needed to defuse a mine.
    pub mine_defuse_rounds: u32,
    /// Rounds needed to defuse a mine with Defusion.
    pub mine_defuse_rounds_upgraded: u32,

    /// Paid when a capture begins.
    #[serde(with = "fixed_decimal")]
    pub capture_cost: Fixed,
    /// Rounds needed to capture an encampment.
    pub capture_rounds: u32,

    /// Sensor radius² added by Vision.
    pub vision_bonus: i32,

    /// Steps charged for every action call.
    pub action_step_cost: u32,
    /// Steps charged for every sensing call.
    pub sense_step_cost: u32,

    /// Research table.
    pub upgrades: BTreeMap<Upgrade, UpgradeSpec>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut upgrades = BTreeMap::new();
        upgrades.insert(
            Upgrade::Fusion,
            UpgradeSpec {
                rounds: 25,
                cost: Fixed::ZERO,
            },
        );
        upgrades.insert(
            Upgrade::Vision,
            UpgradeSpec {
                rounds: 25,
                cost: Fixed::ZERO,
            },
        );
        upgrades.insert(
            Upgrade::Defusion,
            UpgradeSpec {
                rounds: 25,
                cost: Fixed::ZERO,
            },
        );

        Self {
            exception_step_penalty: 500,
            fault_strike_limit: 3,
            signal_queue_max: 1000,
            messages_per_turn: 20,
            initial_resources: Fixed::from_num(300),
            base_income: Fixed::from_num(2),
            unit_income_penalty: Fixed::from_num(0.01),
            decay_rate: Fixed::from_num(0.8),
            sustain_decay_rate: Fixed::from_num(0.99),
            unit_upkeep: Fixed::ZERO,
            default_round_limit: 3000,
            time_limit_damage: Fixed::ONE,
            delay_decay_k: Fixed::ZERO,
            diagonal_delay_multiplier: Fixed::from_num(1.4),
            transform_delay: Fixed::from_num(10),
            viper_infection_damage: Fixed::from_num(2),
            zombie_infection_damage: Fixed::ZERO,
            shield_decay: Fixed::ONE,
            shield_cap: Fixed::from_num(100_000_000),
            mine_damage: Fixed::from_num(10),
            mine_shield_absorption: Fixed::from_num(0.9),
            mine_lay_rounds: 25,
            mine_defuse_rounds: 12,
            mine_defuse_rounds_upgraded: 5,
            capture_cost: Fixed::from_num(10),
            capture_rounds: 50,
            vision_bonus: 19,
            action_step_cost: 25,
            sense_step_cost: 100,
            upgrades,
        }
    }
}

impl GameConfig {
    /// Parse a config from RON, filling omitted fields with defaults.
    pub fn from_ron(source: &str) -> Result<Self> {
        let config: Self = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<config>".to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the simulation ill-defined.
    pub fn validate(&self) -> Result<()> {
        let unit_interval = |name: &str, value: Fixed| {
            if value < Fixed::ZERO || value > Fixed::ONE {
                Err(GameError::InvalidState(format!(
                    "{name} must lie in [0, 1], got {value}"
                )))
            } else {
                Ok(())
            }
        };
        unit_interval("decay_rate", self.decay_rate)?;
        unit_interval("sustain_decay_rate", self.sustain_decay_rate)?;
        unit_interval("mine_shield_absorption", self.mine_shield_absorption)?;

        if self.time_limit_damage <= Fixed::ZERO {
            return Err(GameError::InvalidState(
                "time_limit_damage must be positive or the match can never end".to_string(),
            ));
        }
        if self.fault_strike_limit == 0 {
            return Err(GameError::InvalidState(
                "fault_strike_limit must be at least 1".to_string(),
            ));
        }
        if self.signal_queue_max == 0 {
            return Err(GameError::InvalidState(
                "signal_queue_max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Research requirement for an upgrade (zero rounds if unlisted).
    #[must_use]
    pub fn upgrade(&self, upgrade: Upgrade) -> UpgradeSpec {
        self.upgrades.get(&upgrade).copied().unwrap_or(UpgradeSpec {
            rounds: 0,
            cost: Fixed::ZERO,
        })
    }
}
