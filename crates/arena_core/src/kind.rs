//! Static unit kind definitions.
//!
//! A [`UnitKind`] is a read-only balance record. The simulation looks kinds
//! up by [`KindId`] and never mutates them; a unit that transforms simply
//! points at a different record.
//!
//! # Example RON
//!
//! ```ron
//! KindTable(kinds: [
//!     UnitKind(
//!         id: KindId(1),
//!         name: "soldier",
//!         max_health: 40.0,
//!         attack_power: 4.0,
//!         step_budget: 10000,
//!         cost: 10.0,
//!         attack_radius_squared: 2,
//!         sensor_radius_squared: 14,
//!         movement_delay: 1.0,
//!         attack_delay: 1.0,
//!         is_buildable: true,
//!         build_turns: 10,
//!         damage_rule: DivideAmongAdjacent,
//!     ),
//! ])
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::math::{fixed_decimal, Fixed};

/// Identifier of a unit kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u16);

impl std::fmt::Display for KindId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

/// How an attack's damage is distributed around the target location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DamageRule {
    /// Full damage to the unit at the target location only.
    #[default]
    Single,
    /// Full damage at the target, `ratio` of it to each of the eight
    /// surrounding locations. Friendly units are not spared.
    Splash {
        /// Fraction applied to the surrounding ring.
        #[serde(with = "fixed_decimal")]
        ratio: Fixed,
    },
    /// Attack power split evenly among enemy units adjacent to the target.
    DivideAmongAdjacent,
}

/// The two independent infection clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InfectionKind {
    /// Periodic poison damage.
    Viper,
    /// Turns the victim into a zombie if it dies while infected.
    Zombie,
}

/// Infection applied to every unit an attack damages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfectionRule {
    /// Which clock is set.
    pub kind: InfectionKind,
    /// Rounds the infection lasts.
    pub turns: u32,
}

/// Passive end-of-round effect on friendly units in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportRule {
    /// Restore health (leaders excluded).
    Regen {
        /// Health restored per round.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
        /// Reach of the effect.
        radius_squared: i32,
    },
    /// Add to shield pools.
    Shield {
        /// Shield added per round.
        #[serde(with = "fixed_decimal")]
        amount: Fixed,
        /// Reach of the effect.
        radius_squared: i32,
    },
}

/// Spontaneous spawning for hostile structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRule {
    /// Kind produced.
    pub kind: KindId,
    /// Spawn once every this many rounds alive.
    pub every_rounds: u32,
}

/// Static description of a unit kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitKind {
    /// Identifier referenced by maps and signals.
    pub id: KindId,
    /// Human readable name.
    pub name: String,

    /// Health ceiling.
    #[serde(with = "fixed_decimal")]
    pub max_health: Fixed,
    /// Damage dealt per attack.
    #[serde(default, with = "fixed_decimal")]
    pub attack_power: Fixed,
    /// Steps the unit's program may use per round.
    #[serde(default)]
    pub step_budget: u32,
    /// Price paid by the building team.
    #[serde(default, with = "fixed_decimal")]
    pub cost: Fixed,

    /// Furthest attackable location.
    #[serde(default)]
    pub attack_radius_squared: i32,
    /// Closest attackable location (turret-style dead zone).
    #[serde(default)]
    pub min_attack_radius_squared: i32,
    /// Sensing reach.
    #[serde(default)]
    pub sensor_radius_squared: i32,

    /// Added to core delay per step.
    #[serde(default, with = "fixed_decimal")]
    pub movement_delay: Fixed,
    /// Added to weapon delay per attack.
    #[serde(default, with = "fixed_decimal")]
    pub attack_delay: Fixed,
    /// Core delay floor after attacking.
    #[serde(default, with = "fixed_decimal")]
    pub cooldown_delay: Fixed,
    /// Weapon delay floor after moving.
    #[serde(default, with = "fixed_decimal")]
    pub loading_delay: Fixed,

    /// Rounds a freshly built unit stays inactive.
    #[serde(default)]
    pub build_turns: u32,
    /// Damage distribution.
    #[serde(default)]
    pub damage_rule: DamageRule,

    /// Stationary structure.
    #[serde(default)]
    pub is_structure: bool,
    /// The unit whose death loses the match.
    #[serde(default)]
    pub is_leader: bool,
    /// Belongs to the hostile faction.
    #[serde(default)]
    pub is_hostile: bool,
    /// Produced by builders (subject to construction delay).
    #[serde(default)]
    pub is_buildable: bool,
    /// Counts as an owned encampment while standing.
    #[serde(default)]
    pub is_encampment: bool,
    /// May research upgrades.
    #[serde(default)]
    pub can_research: bool,
    /// May lay and defuse mines.
    #[serde(default)]
    pub can_mine: bool,
    /// May capture encampment sites.
    #[serde(default)]
    pub can_capture: bool,

    /// Kinds this unit may build.
    #[serde(default)]
    pub builds: Vec<KindId>,
    /// Kind reached by transforming.
    #[serde(default)]
    pub transforms_into: Option<KindId>,
    /// Infection inflicted by attacks.
    #[serde(default)]
    pub infects: Option<InfectionRule>,
    /// Zombie kind raised when this unit dies zombie-infected.
    #[serde(default)]
    pub zombie_form: Option<KindId>,
    /// Passive support effect.
    #[serde(default)]
    pub support: Option<SupportRule>,
    /// Spontaneous spawning.
    #[serde(default)]
    pub spawns: Option<SpawnRule>,
}

impl UnitKind {
    /// Minimal kind with the given id, name and health; every other field
    /// is zero or off.
    #[must_use]
    pub fn new(id: KindId, name: impl Into<String>, max_health: Fixed) -> Self {
        Self {
            id,
            name: name.into(),
            max_health,
            attack_power: Fixed::ZERO,
            step_budget: 0,
            cost: Fixed::ZERO,
            attack_radius_squared: 0,
            min_attack_radius_squared: 0,
            sensor_radius_squared: 0,
            movement_delay: Fixed::ZERO,
            attack_delay: Fixed::ZERO,
            cooldown_delay: Fixed::ZERO,
            loading_delay: Fixed::ZERO,
            build_turns: 0,
            damage_rule: DamageRule::Single,
            is_structure: false,
            is_leader: false,
            is_hostile: false,
            is_buildable: false,
            is_encampment: false,
            can_research: false,
            can_mine: false,
            can_capture: false,
            builds: Vec::new(),
            transforms_into: None,
            infects: None,
            zombie_form: None,
            support: None,
            spawns: None,
        }
    }

    /// Give the kind an attack.
    #[must_use]
    pub fn with_attack(mut self, power: Fixed, radius_squared: i32, delay: Fixed) -> Self {
        self.attack_power = power;
        self.attack_radius_squared = radius_squared;
        self.attack_delay = delay;
        self
    }

    /// Give the kind a program budget.
    #[must_use]
    pub fn with_budget(mut self, steps: u32) -> Self {
        self.step_budget = steps;
        self
    }

    /// Set the build cost.
    #[must_use]
    pub fn with_cost(mut self, cost: Fixed) -> Self {
        self.cost = cost;
        self
    }

    /// Set the movement delay.
    #[must_use]
    pub fn with_movement(mut self, delay: Fixed) -> Self {
        self.movement_delay = delay;
        self
    }

    /// True if the kind can attack at all.
    #[must_use]
    pub fn can_attack(&self) -> bool {
        self.attack_power > Fixed::ZERO && self.attack_radius_squared > 0
    }

    /// True if the kind can move.
    #[must_use]
    pub fn can_move(&self) -> bool {
        !self.is_structure
    }

    /// True if a target at `distance_squared` is inside the firing band.
    #[must_use]
    pub fn in_attack_range(&self, distance_squared: i32) -> bool {
        distance_squared <= self.attack_radius_squared
            && distance_squared >= self.min_attack_radius_squared
    }
}

#[derive(Deserialize)]
#[serde(rename = "KindTable")]
struct KindTableFile {
    kinds: Vec<UnitKind>,
}

/// All kinds available in a match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTable {
    kinds: BTreeMap<KindId, UnitKind>,
}

impl KindTable {
    /// Build a table from a list, checking every cross reference.
    pub fn new(kinds: impl IntoIterator<Item = UnitKind>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for kind in kinds {
            let id = kind.id;
            if map.insert(id, kind).is_some() {
                return Err(GameError::InvalidState(format!("duplicate unit kind {id}")));
            }
        }
        let table = Self { kinds: map };
        table.validate()?;
        Ok(table)
    }

    /// Parse a table from RON.
    pub fn from_ron(source: &str) -> Result<Self> {
        let file: KindTableFile = ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<kinds>".to_string(),
            message: e.to_string(),
        })?;
        Self::new(file.kinds)
    }

    fn validate(&self) -> Result<()> {
        for kind in self.kinds.values() {
            if kind.max_health <= Fixed::ZERO {
                return Err(GameError::InvalidState(format!(
                    "{} ({}) must have positive max health",
                    kind.name, kind.id
                )));
            }
            let references = kind
                .builds
                .iter()
                .copied()
                .chain(kind.transforms_into)
                .chain(kind.zombie_form)
                .chain(kind.spawns.map(|rule| rule.kind));
            for reference in references {
                if !self.kinds.contains_key(&reference) {
                    return Err(GameError::UnknownKind(reference));
                }
            }
            if let Some(rule) = kind.spawns {
                if rule.every_rounds == 0 {
                    return Err(GameError::InvalidState(format!(
                        "{} spawns every 0 rounds",
                        kind.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a kind.
    #[must_use]
    pub fn get(&self, id: KindId) -> Option<&UnitKind> {
        self.kinds.get(&id)
    }

    /// Look up a kind, failing with [`GameError::UnknownKind`].
    pub fn require(&self, id: KindId) -> Result<&UnitKind> {
        self.kinds.get(&id).ok_or(GameError::UnknownKind(id))
    }

    /// Iterate kinds in id order.
    pub fn iter(&self) -> impl Iterator<Item = &UnitKind> {
        self.kinds.values()
    }

    /// Number of kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// True if no kinds are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
