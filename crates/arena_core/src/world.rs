//! The single owned world state.
//!
//! A [`World`] bundles the entity store with everything that is not a unit:
//! round counter, radio tables, encampment ownership, mines, cross-match
//! memory, the seeded generator and the match result. It is built once from
//! a [`GameMap`] and then only mutated through signals and the round
//! lifecycle driven by the scheduler.
//!
//! # Determinism
//!
//! - Ordered maps only, iteration is by unit ID or location
//! - Fixed-point arithmetic
//! - A single seeded generator stored in the state itself

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::{GameConfig, Upgrade, TEAM_MEMORY_LENGTH};
use crate::error::{GameError, Result};
use crate::kind::{KindTable, UnitKind};
use crate::map::GameMap;
use crate::math::{Fixed, Location};
use crate::rng::MatchRng;
use crate::signal::{Outcome, Signal, SignalRecord};
use crate::store::EntityStore;
use crate::team::Team;
use crate::unit::{Unit, UnitId};

/// One team's cross-match memory.
pub type TeamMemory = [i64; TEAM_MEMORY_LENGTH];

/// How decisively a match was won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DominationFactor {
    /// The opposing leader was destroyed.
    Destroyed,
    /// Decided by a nonzero tie-break differential.
    BarelyBeat,
    /// Every differential was zero; decided by leader identity.
    WonByDubiousReasons,
}

/// Final result of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Victory {
    /// Winning team.
    pub winner: Team,
    /// How it was won.
    pub factor: DominationFactor,
    /// Round the result was decided.
    pub round: u32,
}

/// A team's radio table with insertion-order eviction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Radio {
    values: BTreeMap<u32, i64>,
    order: VecDeque<u32>,
}

impl Radio {
    /// Last value written to a channel.
    #[must_use]
    pub fn read(&self, channel: u32) -> Option<i64> {
        self.values.get(&channel).copied()
    }

    /// Write a channel. Rewriting refreshes its age. Once more than
    /// `capacity` channels are held the oldest is dropped.
    pub fn write(&mut self, channel: u32, value: i64, capacity: usize) {
        if self.values.insert(channel, value).is_some() {
            self.order.retain(|c| *c != channel);
        }
        self.order.push_back(channel);
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.values.remove(&oldest);
            }
        }
    }

    /// Channels currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if nothing has been broadcast.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The authoritative match state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub(crate) round: u32,
    pub(crate) round_limit: u32,
    pub(crate) config: GameConfig,
    pub(crate) kinds: KindTable,
    pub(crate) map: GameMap,
    pub(crate) store: EntityStore,
    pub(crate) radio: BTreeMap<Team, Radio>,
    /// Encampment site → owner. Unowned sites map to `Neutral`.
    pub(crate) encampments: BTreeMap<Location, Team>,
    pub(crate) mines: BTreeMap<Location, Team>,
    pub(crate) leaders: BTreeMap<Team, UnitId>,
    pub(crate) fallen_leaders: BTreeSet<Team>,
    pub(crate) team_memory: [TeamMemory; 2],
    pub(crate) old_team_memory: [TeamMemory; 2],
    pub(crate) rng: MatchRng,
    pub(crate) victory: Option<Victory>,
    #[serde(skip)]
    pub(crate) log: Vec<SignalRecord>,
}

impl World {
    /// Build a world from a map.
    ///
    /// Initial units are created through the same spawn path as every other
    /// unit, in map order.
    ///
    /// # Errors
    ///
    /// Fails if the config or map is invalid, or an initial spawn is
    /// rejected.
    pub fn new(
        map: GameMap,
        kinds: KindTable,
        config: GameConfig,
        old_team_memory: [TeamMemory; 2],
    ) -> Result<Self> {
        config.validate()?;
        map.validate(&kinds)?;

        let mut store = EntityStore::new();
        for team in Team::PLAYERS {
            store.credit(team, config.initial_resources);
        }

        let round_limit = map.round_limit.unwrap_or(config.default_round_limit);
        let encampments = map
            .encampments
            .iter()
            .map(|site| (*site, Team::Neutral))
            .collect();
        let rng = MatchRng::new(map.seed);
        let initial = map.units.clone();

        let mut world = Self {
            round: 0,
            round_limit,
            config,
            kinds,
            map,
            store,
            radio: Team::ALL.into_iter().map(|t| (t, Radio::default())).collect(),
            encampments,
            mines: BTreeMap::new(),
            leaders: BTreeMap::new(),
            fallen_leaders: BTreeSet::new(),
            team_memory: old_team_memory,
            old_team_memory,
            rng,
            victory: None,
            log: Vec::new(),
        };

        for unit in initial {
            let outcome = world.apply_signal(Signal::Spawn {
                team: unit.team,
                kind: unit.kind,
                location: unit.location,
                build_delay: 0,
                parent: None,
                cost: Fixed::ZERO,
            })?;
            if let Outcome::Rejected(reason) = outcome {
                return Err(GameError::InvalidMap(format!(
                    "initial unit at {} rejected: {reason}",
                    unit.location
                )));
            }
        }
        world.log.clear();

        tracing::debug!(
            units = world.store.len(),
            round_limit,
            seed = world.map.seed,
            "World created"
        );
        Ok(world)
    }

    /// Current round. Zero before the first round starts.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.round
    }

    /// Round limit for this match.
    #[must_use]
    pub const fn round_limit(&self) -> u32 {
        self.round_limit
    }

    /// Gameplay constants.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Kind table.
    #[must_use]
    pub const fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    /// Static map.
    #[must_use]
    pub const fn map(&self) -> &GameMap {
        &self.map
    }

    /// Entity store.
    #[must_use]
    pub const fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Look up a live unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.store.get(id)
    }

    /// Kind record of a unit.
    pub fn kind_of(&self, unit: &Unit) -> Result<&UnitKind> {
        self.kinds.require(unit.kind)
    }

    /// A team's radio table.
    #[must_use]
    pub fn radio(&self, team: Team) -> Option<&Radio> {
        self.radio.get(&team)
    }

    /// Owner of the encampment site at `location`.
    #[must_use]
    pub fn encampment_owner(&self, location: Location) -> Option<Team> {
        self.encampments.get(&location).copied()
    }

    /// Sites owned by `team`.
    #[must_use]
    pub fn encampment_count(&self, team: Team) -> usize {
        self.encampments.values().filter(|owner| **owner == team).count()
    }

    /// Owner of the mine at `location`.
    #[must_use]
    pub fn mine_at(&self, location: Location) -> Option<Team> {
        self.mines.get(&location).copied()
    }

    /// Mines owned by `team`.
    #[must_use]
    pub fn mine_count(&self, team: Team) -> usize {
        self.mines.values().filter(|owner| **owner == team).count()
    }

    /// ID of a team's leader, alive or not.
    #[must_use]
    pub fn leader(&self, team: Team) -> Option<UnitId> {
        self.leaders.get(&team).copied()
    }

    /// Current cross-match memory of a player team.
    #[must_use]
    pub fn team_memory(&self, team: Team) -> Option<&TeamMemory> {
        team.player_index().map(|i| &self.team_memory[i])
    }

    /// Memory as it was handed in at world construction.
    #[must_use]
    pub fn old_team_memory(&self, team: Team) -> Option<&TeamMemory> {
        team.player_index().map(|i| &self.old_team_memory[i])
    }

    /// Both teams' memory for the host to persist.
    #[must_use]
    pub const fn memory_to_persist(&self) -> [TeamMemory; 2] {
        self.team_memory
    }

    /// The decided result, if any.
    #[must_use]
    pub const fn victory(&self) -> Option<Victory> {
        self.victory
    }

    /// Signals applied since the current round began.
    #[must_use]
    pub fn log(&self) -> &[SignalRecord] {
        &self.log
    }

    /// Drain the applied-signal log.
    pub fn take_log(&mut self) -> Vec<SignalRecord> {
        std::mem::take(&mut self.log)
    }

    /// True if the team has researched the upgrade.
    #[must_use]
    pub fn has_upgrade(&self, team: Team, upgrade: Upgrade) -> bool {
        self.store.team(team).has_upgrade(upgrade)
    }

    /// A team's resource pool.
    #[must_use]
    pub fn resources(&self, team: Team) -> Fixed {
        self.store.team(team).resources
    }

    /// Sensor reach of a unit including the Vision bonus.
    #[must_use]
    pub fn sensor_radius_squared(&self, unit: &Unit) -> i32 {
        let base = self
            .kinds
            .get(unit.kind)
            .map_or(0, |kind| kind.sensor_radius_squared);
        if self.has_upgrade(unit.team, Upgrade::Vision) {
            base + self.config.vision_bonus
        } else {
            base
        }
    }

    /// True if `location` is passable and empty.
    #[must_use]
    pub fn is_free(&self, location: Location) -> bool {
        self.map.is_passable(location) && !self.store.is_occupied(location)
    }

    /// Verify every world invariant.
    ///
    /// # Errors
    ///
    /// [`GameError::InvariantViolation`] for the first broken rule.
    pub fn check_invariants(&self) -> Result<()> {
        self.store.check_invariants(&self.kinds)?;
        for unit in self.store.iter() {
            if !unit.is_alive() {
                return Err(GameError::InvariantViolation(format!(
                    "unit {} survived the round with no health",
                    unit.id
                )));
            }
        }
        for location in self.mines.keys() {
            if !self.map.is_passable(*location) {
                return Err(GameError::InvariantViolation(format!(
                    "mine on impassable {location}"
                )));
            }
        }
        Ok(())
    }

    /// Hash of the full simulation state.
    ///
    /// Two worlds that will behave identically from here on hash equal.
    /// The observation log is excluded.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.round.hash(&mut hasher);
        self.round_limit.hash(&mut hasher);

        self.store.len().hash(&mut hasher);
        self.store.next_id().hash(&mut hasher);
        for unit in self.store.iter() {
            unit.id.hash(&mut hasher);
            unit.team.hash(&mut hasher);
            unit.kind.hash(&mut hasher);
            unit.location.hash(&mut hasher);
            unit.health.to_bits().hash(&mut hasher);
            unit.shield.to_bits().hash(&mut hasher);
            unit.core_delay.to_bits().hash(&mut hasher);
            unit.weapon_delay.to_bits().hash(&mut hasher);
            unit.viper_infection.hash(&mut hasher);
            unit.zombie_infection.hash(&mut hasher);
            unit.build_delay.hash(&mut hasher);
            unit.rounds_alive.hash(&mut hasher);
            unit.research.hash(&mut hasher);
            unit.mining.hash(&mut hasher);
            unit.capture.hash(&mut hasher);
            unit.last_turn.hash(&mut hasher);
            unit.fault_strikes.hash(&mut hasher);
            unit.parent.hash(&mut hasher);
        }

        for team in Team::ALL {
            let state = self.store.team(team);
            state.resources.to_bits().hash(&mut hasher);
            state.research.hash(&mut hasher);
            state.upgrades.hash(&mut hasher);
        }

        self.radio.hash(&mut hasher);
        self.encampments.hash(&mut hasher);
        self.mines.hash(&mut hasher);
        self.leaders.hash(&mut hasher);
        self.fallen_leaders.hash(&mut hasher);
        self.team_memory.hash(&mut hasher);
        self.rng.hash(&mut hasher);
        self.victory.hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the world for snapshots or network sync.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize world: {e}")))
    }

    /// Restore a world from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let world: Self = bincode::deserialize(data)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize world: {e}")))?;
        if let Some(team) = world.store.missing_team() {
            return Err(GameError::InvalidState(format!(
                "Snapshot has no state for team {team}"
            )));
        }
        Ok(world)
    }
}
