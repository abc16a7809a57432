//! Running one agent turn in isolation.
//!
//! A turn can end three ways: the agent returns, the meter runs dry, or the
//! agent faults. A returned error is a recoverable fault and costs
//! `exception_step_penalty` extra steps. A panic is fatal and the unit is
//! destroyed. Nothing an agent does here can leave the world half-changed;
//! it only ever holds a shared borrow.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::agent::{Agent, TurnContext, TurnError};
use crate::control::{Fault, TurnOutcome};
use crate::kind::UnitKind;
use crate::unit::Unit;
use crate::world::World;

/// Run `agent` for one turn of `unit` with `budget` steps.
pub fn execute_turn(
    agent: &mut dyn Agent,
    world: &World,
    unit: &Unit,
    kind: &UnitKind,
    budget: u32,
) -> TurnOutcome {
    let mut ctx = TurnContext::new(world, unit, kind, budget);
    let result = catch_unwind(AssertUnwindSafe(|| agent.run_turn(&mut ctx)));
    let intents = ctx.finish();

    let fault = match result {
        Ok(Ok(()) | Err(TurnError::OutOfSteps)) => None,
        Ok(Err(error)) => Some(Fault::Recoverable(error.to_string())),
        Err(payload) => Some(Fault::Fatal(panic_message(payload.as_ref()))),
    };

    let steps_used = match fault {
        Some(Fault::Recoverable(_)) => intents
            .steps_used
            .saturating_add(world.config().exception_step_penalty)
            .min(budget),
        _ => intents.steps_used,
    };

    if let Some(fault) = &fault {
        tracing::warn!(unit = unit.id, team = %unit.team, ?fault, "Agent fault");
    }

    TurnOutcome {
        steps_used,
        intents: intents.signals,
        fault,
        self_destruct: intents.self_destruct,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "agent panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable};
    use crate::map::GameMap;
    use crate::math::{Direction, Fixed, Location};
    use crate::signal::Signal;
    use crate::team::Team;

    fn world() -> World {
        let kinds = KindTable::new([UnitKind::new(KindId(1), "soldier", Fixed::from_num(40))
            .with_movement(Fixed::ONE)
            .with_budget(1000)])
        .unwrap();
        let map = GameMap::open(5, 5, 0).with_unit(Team::A, KindId(1), Location::new(2, 2));
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    struct Spinner;

    impl Agent for Spinner {
        fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
            ctx.move_to(Direction::North)?;
            loop {
                ctx.tick()?;
            }
        }
    }

    struct Failing;

    impl Agent for Failing {
        fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
            ctx.move_to(Direction::North)?;
            Err(TurnError::Fault("gave up".into()))
        }
    }

    struct Panicking;

    impl Agent for Panicking {
        fn run_turn(&mut self, _ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
            panic!("boom");
        }
    }

    fn run(agent: &mut dyn Agent, budget: u32) -> TurnOutcome {
        let world = world();
        let unit = world.unit(1).unwrap().clone();
        let kind = world.kind_of(&unit).unwrap().clone();
        execute_turn(agent, &world, &unit, &kind, budget)
    }

    #[test]
    fn test_exhaustion_is_not_a_fault() {
        let outcome = run(&mut Spinner, 100);
        assert_eq!(outcome.fault, None);
        assert_eq!(outcome.steps_used, 100);
        assert_eq!(
            outcome.intents,
            vec![Signal::Movement {
                id: 1,
                direction: Direction::North
            }]
        );
    }

    #[test]
    fn test_returned_error_is_penalized() {
        let outcome = run(&mut Failing, 1000);
        assert!(matches!(outcome.fault, Some(Fault::Recoverable(_))));
        assert_eq!(outcome.steps_used, 525);
        assert_eq!(outcome.intents.len(), 1);
    }

    #[test]
    fn test_penalty_capped_at_budget() {
        let outcome = run(&mut Failing, 100);
        assert_eq!(outcome.steps_used, 100);
    }

    #[test]
    fn test_panic_is_fatal() {
        let outcome = run(&mut Panicking, 1000);
        assert_eq!(outcome.fault, Some(Fault::Fatal("boom".into())));
    }
}
