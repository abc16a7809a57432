//! Built-in agent for the hostile zombie team.
//!
//! Each turn a horde unit picks the nearest player unit it can sense (ties
//! to the lowest ID), attacks it when in range and otherwise steps toward
//! it. With nothing in sight it walks toward the closest player leader.

use crate::agent::{Agent, AgentFactory, TurnContext, TurnError};
use crate::kind::UnitKind;
use crate::math::{Direction, Location};
use crate::team::Team;
use crate::unit::Unit;

/// Agent that hunts the nearest player unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct HordeAgent;

impl HordeAgent {
    fn target(ctx: &mut TurnContext<'_>) -> Result<Option<Location>, TurnError> {
        let here = ctx.me().location;
        let nearest = ctx
            .sense_nearby()?
            .into_iter()
            .filter(|unit| unit.team.is_player())
            .min_by_key(|unit| (here.distance_squared(unit.location), unit.id));
        if let Some(unit) = nearest {
            return Ok(Some(unit.location));
        }

        let mut leaders = Vec::new();
        for team in Team::PLAYERS {
            if let Some(location) = ctx.sense_leader(team)? {
                leaders.push(location);
            }
        }
        Ok(leaders
            .into_iter()
            .min_by_key(|location| here.distance_squared(*location)))
    }

    fn step_toward(ctx: &mut TurnContext<'_>, target: Location) -> Result<(), TurnError> {
        let Some(direct) = ctx.me().location.direction_to(target) else {
            return Ok(());
        };
        let candidates: [Direction; 3] = [direct, direct.rotate_left(), direct.rotate_right()];
        for direction in candidates {
            if ctx.can_move(direction)? {
                return ctx.move_to(direction);
            }
        }
        Ok(())
    }
}

impl Agent for HordeAgent {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
        let Some(target) = Self::target(ctx)? else {
            return Ok(());
        };
        if ctx.can_attack(target)? {
            return ctx.attack(target);
        }
        Self::step_toward(ctx, target)
    }
}

/// Creates a [`HordeAgent`] for every unit.
#[derive(Debug, Default, Clone, Copy)]
pub struct HordeFactory;

impl AgentFactory for HordeFactory {
    fn create(&mut self, _unit: &Unit, _kind: &UnitKind) -> Box<dyn Agent> {
        Box::new(HordeAgent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable};
    use crate::map::GameMap;
    use crate::math::Fixed;
    use crate::signal::Signal;
    use crate::world::World;

    fn world(units: &[(Team, Location)]) -> World {
        let kinds = KindTable::new([UnitKind {
            sensor_radius_squared: 25,
            ..UnitKind::new(KindId(1), "walker", Fixed::from_num(10))
                .with_attack(Fixed::ONE, 2, Fixed::ONE)
                .with_movement(Fixed::ONE)
                .with_budget(10_000)
        }])
        .unwrap();
        let mut map = GameMap::open(10, 10, 0);
        for (team, location) in units {
            map = map.with_unit(*team, KindId(1), *location);
        }
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    fn turn(world: &World, id: u32) -> Vec<Signal> {
        let unit = world.unit(id).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(world, unit, kind, 10_000);
        HordeAgent.run_turn(&mut ctx).unwrap();
        ctx.finish().signals
    }

    #[test]
    fn test_attacks_adjacent_player() {
        let world = world(&[
            (Team::Zombie, Location::new(5, 5)),
            (Team::A, Location::new(6, 6)),
        ]);
        assert_eq!(
            turn(&world, 1),
            vec![Signal::Attack {
                attacker: 1,
                target: Location::new(6, 6)
            }]
        );
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let world = world(&[
            (Team::Zombie, Location::new(5, 5)),
            (Team::B, Location::new(5, 8)),
            (Team::A, Location::new(5, 2)),
        ]);
        assert_eq!(
            turn(&world, 1),
            vec![Signal::Movement {
                id: 1,
                direction: Direction::South
            }]
        );
    }

    #[test]
    fn test_ignores_other_zombies() {
        let world = world(&[
            (Team::Zombie, Location::new(5, 5)),
            (Team::Zombie, Location::new(5, 6)),
        ]);
        assert!(turn(&world, 1).is_empty());
    }
}
