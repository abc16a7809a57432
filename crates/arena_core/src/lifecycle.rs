//! Per-round unit upkeep.
//!
//! Begin-round work (delay decay, infection, mine hazards, task clocks) and
//! end-round passive effects (support structures, shield decay, hostile
//! spawns) plus the death sweep that removes every unit left without health.
//! Everything iterates in ascending unit ID.

use crate::config::Upgrade;
use crate::error::Result;
use crate::kind::SupportRule;
use crate::math::{fixed_pow_three_halves, Fixed};
use crate::signal::{MineAction, Signal};
use crate::team::Team;
use crate::unit::{MineWork, TurnUsage, UnitId};
use crate::world::World;

impl World {
    /// Delay decrement earned by a unit's previous turn.
    ///
    /// `max(0, 1 − k·(unused / budget)^1.5)`. Units that have not had a turn
    /// yet decay by one.
    #[must_use]
    pub fn delay_decay(&self, usage: Option<TurnUsage>) -> Fixed {
        let Some(usage) = usage else {
            return Fixed::ONE;
        };
        if usage.budget == 0 {
            return Fixed::ONE;
        }
        let unused = Fixed::saturating_from_num(usage.budget.saturating_sub(usage.used))
            / Fixed::saturating_from_num(usage.budget);
        let penalty = self
            .config
            .delay_decay_k
            .saturating_mul(fixed_pow_three_halves(unused));
        (Fixed::ONE - penalty).max(Fixed::ZERO)
    }

    /// Start a new round and run begin-of-round upkeep.
    ///
    /// Returns the units removed by upkeep damage.
    pub(crate) fn begin_round(&mut self) -> Result<Vec<UnitId>> {
        self.round += 1;
        self.log.clear();

        let ids = self.store.sorted_ids();
        let viper_damage = self.config.viper_infection_damage;
        let zombie_damage = self.config.zombie_infection_damage;
        let mine_damage = self.config.mine_damage;
        let absorption = self.config.mine_shield_absorption;

        for &id in &ids {
            let Some(unit) = self.store.get(id) else {
                continue;
            };
            let decay = self.delay_decay(unit.last_turn);
            let hazard = self
                .mines
                .get(&unit.location)
                .is_some_and(|owner| *owner != unit.team);

            let Some(unit) = self.store.get_mut(id) else {
                continue;
            };
            unit.attacked = false;
            unit.decay_delays(decay);
            if unit.viper_infection > 0 {
                unit.take_damage(viper_damage);
                unit.viper_infection -= 1;
            }
            if unit.zombie_infection > 0 {
                unit.take_damage(zombie_damage);
                unit.zombie_infection -= 1;
            }
            if hazard {
                unit.take_partially_shielded_damage(mine_damage, absorption);
            }
        }

        self.advance_tasks(&ids)?;
        self.death_sweep()
    }

    fn advance_tasks(&mut self, ids: &[UnitId]) -> Result<()> {
        for &id in ids {
            let Some(unit) = self.store.get(id) else {
                continue;
            };
            if !unit.is_alive() {
                continue;
            }
            let team = unit.team;

            if let Some(upgrade) = unit.research.target() {
                if self.has_upgrade(team, upgrade) {
                    if let Some(unit) = self.store.get_mut(id) {
                        unit.research.interrupt();
                    }
                } else {
                    self.apply_signal(Signal::Research { id, upgrade })?;
                }
            }

            if let Some(location) = self.store.get(id).and_then(|u| u.capture.target()) {
                self.apply_signal(Signal::Capture { id, location })?;
            }

            let finished = self.store.get_mut(id).and_then(|u| u.mining.advance());
            if let Some(work) = finished {
                let action = match work {
                    MineWork::Lay(_) => MineAction::Lay,
                    MineWork::Defuse(_) => MineAction::Remove,
                };
                self.apply_signal(Signal::Mine {
                    team,
                    location: work.location(),
                    action,
                })?;
            }
        }
        Ok(())
    }

    /// End-of-round passive effects.
    pub(crate) fn apply_passive_effects(&mut self) -> Result<()> {
        let ids = self.store.sorted_ids();

        for &id in &ids {
            let Some(source) = self.store.get(id) else {
                continue;
            };
            if !source.is_active() || !source.is_alive() {
                continue;
            }
            let Some(support) = self.kinds.get(source.kind).and_then(|k| k.support) else {
                continue;
            };
            let (amount, radius_squared, shield) = match support {
                SupportRule::Regen {
                    amount,
                    radius_squared,
                } => (amount, radius_squared, false),
                SupportRule::Shield {
                    amount,
                    radius_squared,
                } => (amount, radius_squared, true),
            };
            let targets: Vec<UnitId> = self
                .store
                .units_within(source.location, radius_squared)
                .filter(|u| u.team == source.team && u.is_alive())
                .filter(|u| shield || !self.kinds.get(u.kind).is_some_and(|k| k.is_leader))
                .map(|u| u.id)
                .collect();
            for target in targets {
                let signal = if shield {
                    Signal::Shield {
                        source: id,
                        target,
                        amount,
                    }
                } else {
                    Signal::Regen {
                        source: id,
                        target,
                        amount,
                    }
                };
                self.apply_signal(signal)?;
            }
        }

        let shield_decay = self.config.shield_decay;
        for &id in &ids {
            if let Some(unit) = self.store.get_mut(id) {
                unit.shield = (unit.shield - shield_decay).max(Fixed::ZERO);
            }
        }

        self.spawn_from_dens(&ids)
    }

    fn spawn_from_dens(&mut self, ids: &[UnitId]) -> Result<()> {
        for &id in ids {
            let Some(den) = self.store.get(id) else {
                continue;
            };
            let Some(rule) = self.kinds.get(den.kind).and_then(|k| k.spawns) else {
                continue;
            };
            if !den.is_alive() || den.rounds_alive == 0 || den.rounds_alive % rule.every_rounds != 0 {
                continue;
            }
            let team = den.team;
            let free: Vec<_> = den
                .location
                .neighbours()
                .into_iter()
                .filter(|location| self.is_free(*location))
                .collect();
            if free.is_empty() {
                continue;
            }
            let location = free[self.rng.below(free.len())];
            self.apply_signal(Signal::Spawn {
                team,
                kind: rule.kind,
                location,
                build_delay: 0,
                parent: Some(id),
                cost: Fixed::ZERO,
            })?;
        }
        Ok(())
    }

    /// Remove every unit without health, ascending ID.
    pub(crate) fn death_sweep(&mut self) -> Result<Vec<UnitId>> {
        let dead: Vec<UnitId> = self
            .store
            .iter()
            .filter(|unit| !unit.is_alive())
            .map(|unit| unit.id)
            .collect();
        for &id in &dead {
            self.apply_signal(Signal::Death { id })?;
        }
        Ok(dead)
    }

    /// Rounds needed to defuse for a team.
    #[must_use]
    pub fn defuse_rounds(&self, team: Team) -> u32 {
        if self.has_upgrade(team, Upgrade::Defusion) {
            self.config.mine_defuse_rounds_upgraded
        } else {
            self.config.mine_defuse_rounds
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable, SpawnRule, UnitKind};
    use crate::map::GameMap;
    use crate::math::Location;
    use crate::signal::Outcome;
    use crate::unit::TaskState;

    const SOLDIER: KindId = KindId(1);
    const SHIELDS: KindId = KindId(2);
    const DEN: KindId = KindId(3);
    const ZOMBIE: KindId = KindId(4);

    fn world() -> World {
        let kinds = KindTable::new([
            UnitKind::new(SOLDIER, "soldier", Fixed::from_num(40)),
            UnitKind {
                is_structure: true,
                support: Some(SupportRule::Shield {
                    amount: Fixed::from_num(3),
                    radius_squared: 2,
                }),
                ..UnitKind::new(SHIELDS, "shields", Fixed::from_num(100))
            },
            UnitKind {
                is_structure: true,
                is_hostile: true,
                spawns: Some(SpawnRule {
                    kind: ZOMBIE,
                    every_rounds: 2,
                }),
                ..UnitKind::new(DEN, "den", Fixed::from_num(100))
            },
            UnitKind {
                is_hostile: true,
                ..UnitKind::new(ZOMBIE, "zombie", Fixed::from_num(20))
            },
        ])
        .unwrap();
        World::new(
            GameMap::open(8, 8, 11),
            kinds,
            GameConfig::default(),
            [[0; TEAM_MEMORY_LENGTH]; 2],
        )
        .unwrap()
    }

    fn spawn(world: &mut World, team: Team, kind: KindId, location: Location) -> UnitId {
        match world
            .apply_signal(Signal::Spawn {
                team,
                kind,
                location,
                build_delay: 0,
                parent: None,
                cost: Fixed::ZERO,
            })
            .unwrap()
        {
            Outcome::Spawned(id) => id,
            other => panic!("spawn failed: {other:?}"),
        }
    }

    #[test]
    fn test_decay_without_history_is_one() {
        let world = world();
        assert_eq!(world.delay_decay(None), Fixed::ONE);
    }

    #[test]
    fn test_decay_with_positive_k_slows_idle_units() {
        let mut world = world();
        world.config.delay_decay_k = Fixed::ONE;
        let idle = world.delay_decay(Some(TurnUsage { budget: 100, used: 0 }));
        assert!(idle.abs() < Fixed::from_num(0.0001));
        let busy = world.delay_decay(Some(TurnUsage {
            budget: 100,
            used: 100,
        }));
        assert_eq!(busy, Fixed::ONE);
    }

    #[test]
    fn test_decay_floors_at_zero() {
        let mut world = world();
        world.config.delay_decay_k = Fixed::from_num(4);
        let decay = world.delay_decay(Some(TurnUsage { budget: 10, used: 0 }));
        assert_eq!(decay, Fixed::ZERO);
    }

    #[test]
    fn test_viper_infection_ticks_down() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(1, 1));
        world.store.get_mut(id).unwrap().viper_infection = 2;
        world.begin_round().unwrap();
        world.begin_round().unwrap();
        world.begin_round().unwrap();
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.viper_infection, 0);
        assert_eq!(unit.health, Fixed::from_num(36));
    }

    #[test]
    fn test_enemy_mine_damages_with_partial_shield() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(1, 1));
        world.mines.insert(Location::new(1, 1), Team::B);
        world.store.get_mut(id).unwrap().shield = Fixed::from_num(100);
        world.begin_round().unwrap();
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.shield, Fixed::from_num(100) - Fixed::from_num(10).saturating_mul(Fixed::from_num(0.9)));
        assert!(unit.health < Fixed::from_num(40));
    }

    #[test]
    fn test_own_mine_is_harmless() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(1, 1));
        world.mines.insert(Location::new(1, 1), Team::A);
        world.begin_round().unwrap();
        assert_eq!(world.unit(id).unwrap().health, Fixed::from_num(40));
    }

    #[test]
    fn test_mining_task_lays_mine_on_completion() {
        let mut world = world();
        let id = spawn(&mut world, Team::B, SOLDIER, Location::new(2, 2));
        world.store.get_mut(id).unwrap().mining =
            TaskState::start(2, MineWork::Lay(Location::new(2, 2)));
        world.begin_round().unwrap();
        assert_eq!(world.mine_at(Location::new(2, 2)), None);
        world.begin_round().unwrap();
        assert_eq!(world.mine_at(Location::new(2, 2)), Some(Team::B));
    }

    #[test]
    fn test_upkeep_kills_are_swept() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(1, 1));
        {
            let unit = world.store.get_mut(id).unwrap();
            unit.health = Fixed::ONE;
            unit.viper_infection = 1;
        }
        let dead = world.begin_round().unwrap();
        assert_eq!(dead, vec![id]);
        assert!(world.unit(id).is_none());
    }

    #[test]
    fn test_shield_support_then_decay() {
        let mut world = world();
        spawn(&mut world, Team::A, SHIELDS, Location::new(3, 3));
        let soldier = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 4));
        let enemy = spawn(&mut world, Team::B, SOLDIER, Location::new(4, 4));
        world.apply_passive_effects().unwrap();
        assert_eq!(world.unit(soldier).unwrap().shield, Fixed::from_num(2));
        assert_eq!(world.unit(enemy).unwrap().shield, Fixed::ZERO);
    }

    #[test]
    fn test_den_spawns_on_schedule() {
        let mut world = world();
        let den = spawn(&mut world, Team::Zombie, DEN, Location::new(4, 4));
        world.store.get_mut(den).unwrap().rounds_alive = 1;
        world.apply_passive_effects().unwrap();
        assert_eq!(world.store().len(), 1);

        world.store.get_mut(den).unwrap().rounds_alive = 2;
        world.apply_passive_effects().unwrap();
        assert_eq!(world.store().len(), 2);
        let spawned = world.store().iter().find(|u| u.id != den).unwrap();
        assert_eq!(spawned.team, Team::Zombie);
        assert!(spawned.location.is_adjacent_to(Location::new(4, 4)));
        assert_eq!(spawned.parent, Some(den));
    }
}
