//! Resource income, decay and unit upkeep.
//!
//! Each player team has one pool. Income shrinks as the team fields more
//! units and never goes negative; the pool then decays multiplicatively at a
//! rate that Fusion slows down. All arithmetic is fixed-point.

use crate::config::Upgrade;
use crate::math::Fixed;
use crate::team::Team;
use crate::world::World;

impl World {
    /// Income a team would receive this round.
    ///
    /// `max(0, base_income − unit_income_penalty × unit_count)`.
    #[must_use]
    pub fn income_for(&self, team: Team) -> Fixed {
        if !team.is_player() {
            return Fixed::ZERO;
        }
        let units = Fixed::saturating_from_num(self.store.team(team).unit_count());
        let penalty = self.config.unit_income_penalty.saturating_mul(units);
        (self.config.base_income - penalty).max(Fixed::ZERO)
    }

    /// Multiplicative decay applied to a team's pool.
    #[must_use]
    pub fn decay_rate_for(&self, team: Team) -> Fixed {
        if self.has_upgrade(team, Upgrade::Fusion) {
            self.config.sustain_decay_rate
        } else {
            self.config.decay_rate
        }
    }

    /// Credit income to both player teams.
    pub(crate) fn accrue_income(&mut self) {
        for team in Team::PLAYERS {
            let income = self.income_for(team);
            self.store.credit(team, income);
        }
    }

    /// Decay both player pools.
    pub(crate) fn decay_resources(&mut self) {
        for team in Team::PLAYERS {
            let rate = self.decay_rate_for(team);
            let state = self.store.team_mut(team);
            state.resources = state.resources.saturating_mul(rate).max(Fixed::ZERO);
        }
    }

    /// Charge one unit's upkeep before its turn.
    ///
    /// Returns the fraction of upkeep that could be paid, in `[0, 1]`. A short
    /// pool is drained to zero and the unit runs on a proportionally reduced
    /// budget.
    pub(crate) fn charge_upkeep(&mut self, team: Team) -> Fixed {
        let upkeep = self.config.unit_upkeep;
        if !team.is_player() || upkeep <= Fixed::ZERO {
            return Fixed::ONE;
        }
        let state = self.store.team_mut(team);
        if state.resources >= upkeep {
            state.resources -= upkeep;
            Fixed::ONE
        } else {
            let fraction = state.resources / upkeep;
            state.resources = Fixed::ZERO;
            fraction
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable, UnitKind};
    use crate::map::GameMap;
    use crate::math::{Fixed, Location};
    use crate::team::Team;
    use crate::world::World;

    fn world_with_units(count: i32) -> World {
        let kinds =
            KindTable::new([UnitKind::new(KindId(1), "soldier", Fixed::from_num(10))]).unwrap();
        let mut map = GameMap::open(100, 2, 0);
        for x in 0..count {
            map = map.with_unit(Team::A, KindId(1), Location::new(x, 0));
        }
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    #[test]
    fn test_income_shrinks_with_units() {
        let world = world_with_units(50);
        let expected = Fixed::from_num(2) - Fixed::from_num(0.01).saturating_mul(Fixed::from_num(50));
        assert_eq!(world.income_for(Team::A), expected);
        assert_eq!(world.income_for(Team::B), Fixed::from_num(2));
        assert_eq!(world.income_for(Team::Zombie), Fixed::ZERO);
    }

    #[test]
    fn test_income_floors_at_zero() {
        let mut world = world_with_units(5);
        world.config.unit_income_penalty = Fixed::ONE;
        assert_eq!(world.income_for(Team::A), Fixed::ZERO);
    }

    #[test]
    fn test_fusion_slows_decay() {
        let mut world = world_with_units(0);
        world.store.team_mut(Team::B).upgrades.insert(crate::config::Upgrade::Fusion);
        world.decay_resources();
        assert_eq!(
            world.resources(Team::A),
            Fixed::from_num(300).saturating_mul(Fixed::from_num(0.8))
        );
        assert_eq!(
            world.resources(Team::B),
            Fixed::from_num(300).saturating_mul(Fixed::from_num(0.99))
        );
    }

    #[test]
    fn test_upkeep_shortfall_drains_pool() {
        let mut world = world_with_units(0);
        world.config.unit_upkeep = Fixed::from_num(4);
        world.store.team_mut(Team::A).resources = Fixed::from_num(1);
        let fraction = world.charge_upkeep(Team::A);
        assert_eq!(fraction, Fixed::from_num(0.25));
        assert_eq!(world.resources(Team::A), Fixed::ZERO);
        assert_eq!(world.charge_upkeep(Team::Zombie), Fixed::ONE);
    }
}
