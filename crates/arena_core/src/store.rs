//! Entity store: the only owner of live units.
//!
//! Two indices are kept in lockstep, ID → unit and location → ID. Both are
//! private; every mutation that could break the one-unit-per-location rule
//! goes through a method here. Iteration is always in ascending ID order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::Upgrade;
use crate::error::{GameError, RejectReason, Result};
use crate::kind::{KindId, KindTable, UnitKind};
use crate::math::{fixed_serde, Fixed, Location};
use crate::team::Team;
use crate::unit::{Unit, UnitId};

/// Stand-in for a team that has never held anything.
static EMPTY_TEAM: TeamState = TeamState {
    resources: Fixed::ZERO,
    research: BTreeMap::new(),
    upgrades: BTreeSet::new(),
    kind_counts: BTreeMap::new(),
};

/// Aggregate state of one team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamState {
    /// Resource pool. Never negative.
    #[serde(with = "fixed_serde")]
    pub resources: Fixed,
    /// Rounds of research accumulated per upgrade.
    pub research: BTreeMap<Upgrade, u32>,
    /// Completed upgrades.
    pub upgrades: BTreeSet<Upgrade>,
    /// Live units per kind.
    kind_counts: BTreeMap<KindId, u32>,
}

impl TeamState {
    /// Live units owned by the team.
    #[must_use]
    pub fn unit_count(&self) -> u32 {
        self.kind_counts.values().sum()
    }

    /// Live units of `kind` owned by the team.
    #[must_use]
    pub fn kind_count(&self, kind: KindId) -> u32 {
        self.kind_counts.get(&kind).copied().unwrap_or(0)
    }

    /// True if the upgrade is researched.
    #[must_use]
    pub fn has_upgrade(&self, upgrade: Upgrade) -> bool {
        self.upgrades.contains(&upgrade)
    }

    fn count(&mut self, kind: KindId) {
        *self.kind_counts.entry(kind).or_insert(0) += 1;
    }

    fn uncount(&mut self, kind: KindId) {
        if let Some(count) = self.kind_counts.get_mut(&kind) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.kind_counts.remove(&kind);
            }
        }
    }
}

/// Storage for every live unit plus per-team aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStore {
    units: BTreeMap<UnitId, Unit>,
    locations: BTreeMap<Location, UnitId>,
    next_id: UnitId,
    teams: BTreeMap<Team, TeamState>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    /// Empty store. The first unit gets ID 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: BTreeMap::new(),
            locations: BTreeMap::new(),
            next_id: 1,
            teams: Team::ALL
                .into_iter()
                .map(|team| (team, TeamState::default()))
                .collect(),
        }
    }

    /// The ID the next inserted unit will receive.
    #[must_use]
    pub const fn next_id(&self) -> UnitId {
        self.next_id
    }

    /// Create a unit at full health.
    ///
    /// # Errors
    ///
    /// [`GameError::InvariantViolation`] if the location is taken. Callers
    /// are expected to have rejected such requests already.
    pub fn insert(&mut self, team: Team, kind: &UnitKind, location: Location) -> Result<UnitId> {
        if let Some(existing) = self.locations.get(&location) {
            return Err(GameError::InvariantViolation(format!(
                "spawn at {location} already held by unit {existing}"
            )));
        }
        let id = self.next_id;
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| GameError::InvariantViolation("unit id space exhausted".to_string()))?;

        self.units.insert(id, Unit::new(id, team, kind, location));
        self.locations.insert(location, id);
        self.team_mut(team).count(kind.id);
        Ok(id)
    }

    /// Remove a unit from both indices.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let unit = self.units.remove(&id)?;
        if self.locations.get(&unit.location) == Some(&id) {
            self.locations.remove(&unit.location);
        }
        self.team_mut(unit.team).uncount(unit.kind);
        Some(unit)
    }

    /// Look up a unit.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// Mutable access to a unit.
    ///
    /// Location, team and kind must not be changed through this reference;
    /// use [`relocate`](Self::relocate) and [`change_kind`](Self::change_kind)
    /// so the indices stay in sync.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// True if the unit is live.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Unit standing at `location`.
    #[must_use]
    pub fn unit_at(&self, location: Location) -> Option<&Unit> {
        self.locations.get(&location).and_then(|id| self.units.get(id))
    }

    /// True if a unit stands at `location`.
    #[must_use]
    pub fn is_occupied(&self, location: Location) -> bool {
        self.locations.contains_key(&location)
    }

    /// Number of live units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if no units are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Snapshot of live IDs, ascending.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Iterate live units in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// Units of one team, ascending ID.
    pub fn team_units(&self, team: Team) -> impl Iterator<Item = &Unit> {
        self.units.values().filter(move |unit| unit.team == team)
    }

    /// Units within `radius_squared` of `center`, ascending ID.
    pub fn units_within(&self, center: Location, radius_squared: i32) -> impl Iterator<Item = &Unit> {
        self.units
            .values()
            .filter(move |unit| unit.location.distance_squared(center) <= radius_squared)
    }

    /// Move a unit to a free location.
    ///
    /// # Errors
    ///
    /// [`GameError::InvariantViolation`] if the unit is missing or the
    /// destination is taken.
    pub fn relocate(&mut self, id: UnitId, to: Location) -> Result<()> {
        if let Some(holder) = self.locations.get(&to) {
            return Err(GameError::InvariantViolation(format!(
                "unit {id} moving onto {to} held by unit {holder}"
            )));
        }
        let unit = self.units.get_mut(&id).ok_or(GameError::UnitNotFound(id))?;
        let from = unit.location;
        unit.location = to;
        self.locations.remove(&from);
        self.locations.insert(to, id);
        Ok(())
    }

    /// Swap a unit's kind, keeping per-kind counts in sync.
    pub fn change_kind(&mut self, id: UnitId, kind: KindId) -> Result<()> {
        let unit = self.units.get_mut(&id).ok_or(GameError::UnitNotFound(id))?;
        let (team, old) = (unit.team, unit.kind);
        unit.kind = kind;
        let state = self.team_mut(team);
        state.uncount(old);
        state.count(kind);
        Ok(())
    }

    /// Aggregate state of a team.
    #[must_use]
    pub fn team(&self, team: Team) -> &TeamState {
        self.teams.get(&team).unwrap_or(&EMPTY_TEAM)
    }

    /// First team without an aggregate entry, if any.
    #[must_use]
    pub fn missing_team(&self) -> Option<Team> {
        Team::ALL.into_iter().find(|team| !self.teams.contains_key(team))
    }

    /// Mutable aggregate state of a team.
    pub fn team_mut(&mut self, team: Team) -> &mut TeamState {
        self.teams.entry(team).or_default()
    }

    /// Deduct `amount` from a team's pool, all or nothing.
    pub fn spend(&mut self, team: Team, amount: Fixed) -> std::result::Result<(), RejectReason> {
        let state = self.team_mut(team);
        if amount > state.resources {
            return Err(RejectReason::InsufficientResources {
                team,
                required: amount,
                available: state.resources,
            });
        }
        state.resources -= amount;
        Ok(())
    }

    /// Add to a team's pool.
    pub fn credit(&mut self, team: Team, amount: Fixed) {
        let state = self.team_mut(team);
        state.resources = state.resources.saturating_add(amount).max(Fixed::ZERO);
    }

    /// Verify every store invariant.
    ///
    /// # Errors
    ///
    /// [`GameError::InvariantViolation`] describing the first broken rule.
    pub fn check_invariants(&self, kinds: &KindTable) -> Result<()> {
        if let Some(team) = self.missing_team() {
            return Err(GameError::InvariantViolation(format!(
                "team {team} has no aggregate state"
            )));
        }
        if self.locations.len() != self.units.len() {
            return Err(GameError::InvariantViolation(format!(
                "{} units but {} indexed locations",
                self.units.len(),
                self.locations.len()
            )));
        }
        let mut counts: BTreeMap<(Team, KindId), u32> = BTreeMap::new();
        for (id, unit) in &self.units {
            if unit.id != *id || *id >= self.next_id {
                return Err(GameError::InvariantViolation(format!(
                    "unit stored under {id} claims id {} (next id {})",
                    unit.id, self.next_id
                )));
            }
            if self.locations.get(&unit.location) != Some(id) {
                return Err(GameError::InvariantViolation(format!(
                    "unit {id} at {} is not indexed there",
                    unit.location
                )));
            }
            let kind = kinds.require(unit.kind)?;
            if unit.health < Fixed::ZERO || unit.health > kind.max_health {
                return Err(GameError::InvariantViolation(format!(
                    "unit {id} health {} outside [0, {}]",
                    unit.health, kind.max_health
                )));
            }
            *counts.entry((unit.team, unit.kind)).or_insert(0) += 1;
        }
        for (team, state) in &self.teams {
            if state.resources < Fixed::ZERO {
                return Err(GameError::InvariantViolation(format!(
                    "team {team} pool is negative: {}",
                    state.resources
                )));
            }
            for (kind, count) in &state.kind_counts {
                if counts.get(&(*team, *kind)).copied().unwrap_or(0) != *count {
                    return Err(GameError::InvariantViolation(format!(
                        "team {team} count for {kind} out of sync"
                    )));
                }
            }
        }
        let counted: u32 = self.teams.values().map(TeamState::unit_count).sum();
        if counted as usize != self.units.len() {
            return Err(GameError::InvariantViolation(format!(
                "team counts total {counted}, store holds {}",
                self.units.len()
            )));
        }
        Ok(())
    }
}
