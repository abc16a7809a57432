//! Win-condition evaluation.
//!
//! Checked once per round after the death sweep, in priority order:
//!
//! 1. A fallen leader hands the match to the opponent.
//! 2. At the round limit both leaders take fixed damage every round. If that
//!    kills exactly one, rule 1 decides; if it kills both, the tie-break
//!    cascade does.
//!
//! The cascade compares encampments, aggregate health, mines and resources
//! in that order. The first nonzero differential wins; if every one is zero
//! the team whose leader has the lower ID loses. Nothing here is random.

use std::cmp::Ordering;

use crate::error::Result;
use crate::math::Fixed;
use crate::team::Team;
use crate::world::{DominationFactor, Victory, World};

impl World {
    /// True once the time-limit rule is in force.
    #[must_use]
    pub fn time_limit_reached(&self) -> bool {
        self.round >= self.round_limit.saturating_sub(1)
    }

    /// Decide the match if a win condition holds.
    ///
    /// Idempotent once a result exists.
    pub(crate) fn evaluate_victory(&mut self) -> Result<Option<Victory>> {
        if self.victory.is_some() {
            return Ok(self.victory);
        }

        if self.fallen_leaders.is_empty() && self.time_limit_reached() {
            self.apply_time_limit_damage()?;
        }

        self.victory = self.decide_from_fallen_leaders();
        if let Some(victory) = self.victory {
            tracing::info!(
                round = self.round,
                winner = %victory.winner,
                factor = ?victory.factor,
                "Match decided"
            );
        }
        Ok(self.victory)
    }

    /// Sweep the dead and settle a leader loss, without the time-limit rule.
    ///
    /// Used after host injections between rounds.
    pub(crate) fn evaluate_leader_loss(&mut self) -> Result<Option<Victory>> {
        self.death_sweep()?;
        if self.victory.is_none() {
            self.victory = self.decide_from_fallen_leaders();
        }
        Ok(self.victory)
    }

    fn apply_time_limit_damage(&mut self) -> Result<()> {
        let damage = self.config.time_limit_damage;
        for team in Team::PLAYERS {
            let living = self.leader(team).and_then(|id| self.store.get_mut(id));
            match living {
                Some(leader) => {
                    leader.health = (leader.health - damage).max(Fixed::ZERO);
                }
                // A team without a standing leader cannot outlast the limit.
                None => {
                    self.fallen_leaders.insert(team);
                }
            }
        }
        self.death_sweep()?;
        Ok(())
    }

    fn decide_from_fallen_leaders(&self) -> Option<Victory> {
        let a_fell = self.fallen_leaders.contains(&Team::A);
        let b_fell = self.fallen_leaders.contains(&Team::B);
        let (winner, factor) = match (a_fell, b_fell) {
            (false, false) => return None,
            (true, false) => (Team::B, DominationFactor::Destroyed),
            (false, true) => (Team::A, DominationFactor::Destroyed),
            (true, true) => self.tie_break(),
        };
        Some(Victory {
            winner,
            factor,
            round: self.round,
        })
    }

    /// Resolve a simultaneous elimination.
    #[must_use]
    pub fn tie_break(&self) -> (Team, DominationFactor) {
        let ordering = self
            .encampment_count(Team::A)
            .cmp(&self.encampment_count(Team::B))
            .then_with(|| self.total_health(Team::A).cmp(&self.total_health(Team::B)))
            .then_with(|| self.mine_count(Team::A).cmp(&self.mine_count(Team::B)))
            .then_with(|| self.resources(Team::A).cmp(&self.resources(Team::B)));

        match ordering {
            Ordering::Greater => (Team::A, DominationFactor::BarelyBeat),
            Ordering::Less => (Team::B, DominationFactor::BarelyBeat),
            Ordering::Equal => {
                let a = self.leader(Team::A).unwrap_or(0);
                let b = self.leader(Team::B).unwrap_or(0);
                let winner = if a < b { Team::B } else { Team::A };
                (winner, DominationFactor::WonByDubiousReasons)
            }
        }
    }

    /// Sum of health over a team's live units.
    #[must_use]
    pub fn total_health(&self, team: Team) -> Fixed {
        self.store
            .team_units(team)
            .fold(Fixed::ZERO, |sum, unit| sum.saturating_add(unit.health))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable, UnitKind};
    use crate::map::GameMap;
    use crate::math::Location;
    use crate::signal::Signal;

    const HQ: KindId = KindId(1);
    const SOLDIER: KindId = KindId(2);

    fn world(round_limit: u32) -> World {
        let kinds = KindTable::new([
            UnitKind {
                is_leader: true,
                is_structure: true,
                ..UnitKind::new(HQ, "hq", Fixed::from_num(5))
            },
            UnitKind::new(SOLDIER, "soldier", Fixed::from_num(10)),
        ])
        .unwrap();
        let map = GameMap {
            round_limit: Some(round_limit),
            ..GameMap::open(10, 10, 0)
                .with_unit(Team::A, HQ, Location::new(0, 0))
                .with_unit(Team::B, HQ, Location::new(9, 9))
        };
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    #[test]
    fn test_no_result_mid_match() {
        let mut world = world(100);
        world.round = 10;
        assert_eq!(world.evaluate_victory().unwrap(), None);
    }

    #[test]
    fn test_single_leader_death_is_destroyed() {
        let mut world = world(100);
        world.apply_signal(Signal::Death { id: 1 }).unwrap();
        let victory = world.evaluate_victory().unwrap().unwrap();
        assert_eq!(victory.winner, Team::B);
        assert_eq!(victory.factor, DominationFactor::Destroyed);
    }

    #[test]
    fn test_time_limit_damages_leaders() {
        let mut world = world(10);
        world.round = 9;
        assert_eq!(world.evaluate_victory().unwrap(), None);
        assert_eq!(world.unit(1).unwrap().health, Fixed::from_num(4));
        assert_eq!(world.unit(2).unwrap().health, Fixed::from_num(4));
    }

    #[test]
    fn test_one_leader_dies_to_time_limit() {
        let mut world = world(10);
        world.round = 9;
        world.store.get_mut(2).unwrap().health = Fixed::ONE;
        let victory = world.evaluate_victory().unwrap().unwrap();
        assert_eq!(victory.winner, Team::A);
        assert_eq!(victory.factor, DominationFactor::Destroyed);
        assert!(world.unit(2).is_none());
    }

    #[test]
    fn test_cascade_uses_health_after_encampments() {
        let mut world = world(10);
        world
            .apply_signal(Signal::Spawn {
                team: Team::B,
                kind: SOLDIER,
                location: Location::new(5, 5),
                build_delay: 0,
                parent: None,
                cost: Fixed::ZERO,
            })
            .unwrap();
        world.round = 9;
        world.store.get_mut(1).unwrap().health = Fixed::ONE;
        world.store.get_mut(2).unwrap().health = Fixed::ONE;
        let victory = world.evaluate_victory().unwrap().unwrap();
        assert_eq!(victory.winner, Team::B);
        assert_eq!(victory.factor, DominationFactor::BarelyBeat);
    }

    #[test]
    fn test_full_tie_lower_leader_id_loses() {
        let mut world = world(10);
        world.round = 9;
        world.store.get_mut(1).unwrap().health = Fixed::ONE;
        world.store.get_mut(2).unwrap().health = Fixed::ONE;
        let victory = world.evaluate_victory().unwrap().unwrap();
        assert_eq!(victory.winner, Team::B);
        assert_eq!(victory.factor, DominationFactor::WonByDubiousReasons);
    }

    #[test]
    fn test_result_is_sticky() {
        let mut world = world(100);
        world.apply_signal(Signal::Death { id: 2 }).unwrap();
        let first = world.evaluate_victory().unwrap();
        world.apply_signal(Signal::Death { id: 1 }).unwrap();
        assert_eq!(world.evaluate_victory().unwrap(), first);
    }
}
