//! Agent fault containment and step accounting through the scheduler.

use arena_core::prelude::*;
use arena_test_utils::agents::{controller, every_unit, Idle, Script};
use arena_test_utils::fixtures::{duel_map, fixed, match_from, standard_kinds, world_with_config};

fn scripted<F>(turn: F) -> impl AgentFactory
where
    F: FnMut(&mut TurnContext<'_>) -> std::result::Result<(), TurnError> + Send + Clone + 'static,
{
    move |_: &Unit, _: &UnitKind| -> Box<dyn Agent> { Box::new(Script::new(turn.clone())) }
}

fn game(a: impl AgentFactory + 'static) -> Match {
    match_from(
        world_with_config(duel_map(), standard_kinds(), GameConfig::default()),
        controller(a, every_unit(Idle)),
    )
}

#[test]
fn panicking_agent_is_destroyed_and_others_keep_playing() {
    let mut game = game(scripted(|_ctx: &mut TurnContext<'_>| panic!("agent bug")));

    let report = game.run_round().unwrap();
    assert_eq!(report.deaths, vec![1]);
    assert!(matches!(report.turns[0].outcome.fault, Some(Fault::Fatal(_))));
    assert_eq!(report.turns.len(), 2);
    // The panicking unit was team A's leader.
    assert_eq!(report.victory.unwrap().winner, Team::B);
}

#[test]
fn returned_errors_cost_steps_and_accumulate_strikes() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        ctx.tick()?;
        Err(TurnError::Fault("confused".into()))
    }));

    let report = game.run_round().unwrap();
    assert_eq!(report.turns[0].outcome.steps_used, 501);
    let hq = game.world().unit(1).unwrap();
    assert_eq!(hq.fault_strikes, 1);
    assert_eq!(hq.last_turn.unwrap().used, 501);

    game.run_round().unwrap();
    let report = game.run_round().unwrap();
    assert_eq!(report.deaths, vec![1]);
}

#[test]
fn unhandled_action_error_is_a_fault() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        ctx.set_team_memory(99, 1)
    }));
    let report = game.run_round().unwrap();
    assert!(matches!(
        report.turns[0].outcome.fault,
        Some(Fault::Recoverable(_))
    ));
}

#[test]
fn exhausting_the_budget_keeps_earlier_intents() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        ctx.set_team_memory(0, 7)?;
        loop {
            ctx.tick()?;
        }
    }));

    let report = game.run_round().unwrap();
    let turn = &report.turns[0];
    assert_eq!(turn.outcome.fault, None);
    assert_eq!(turn.outcome.steps_used, turn.budget);
    assert_eq!(game.world().team_memory(Team::A).unwrap()[0], 7);
    assert_eq!(game.world().unit(1).unwrap().fault_strikes, 0);
}

#[test]
fn repeated_world_views_run_out_of_steps() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        let mut seen = 0;
        for _ in 0..100_000 {
            seen += ctx.view()?.nearby_units().len();
        }
        ctx.set_team_memory(0, i64::try_from(seen).unwrap_or(i64::MAX))
    }));

    let report = game.run_round().unwrap();
    let turn = &report.turns[0];
    assert_eq!(turn.outcome.fault, None);
    assert_eq!(turn.outcome.steps_used, turn.budget);
    // The loop never finished, so the memory write was never queued.
    assert_eq!(game.world().team_memory(Team::A).unwrap()[0], 0);
}

#[test]
fn self_destruct_discards_queued_intents() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        ctx.set_team_memory(0, 7)?;
        ctx.self_destruct();
        Ok(())
    }));

    let report = game.run_round().unwrap();
    assert_eq!(report.deaths, vec![1]);
    assert_eq!(game.world().team_memory(Team::A).unwrap()[0], 0);
}

#[test]
fn upkeep_shortfall_shrinks_budgets() {
    let config = GameConfig {
        initial_resources: fixed(2),
        unit_upkeep: fixed(4),
        ..GameConfig::default()
    };
    let mut game = match_from(
        world_with_config(duel_map(), standard_kinds(), config),
        controller(every_unit(Idle), every_unit(Idle)),
    );

    let report = game.run_round().unwrap();
    let budgets: Vec<u32> = report.turns.iter().map(|t| t.budget).collect();
    assert_eq!(budgets, vec![5_000, 5_000]);
}

#[test]
fn masked_memory_write_only_touches_mask_bits() {
    let mut game = game(scripted(|ctx: &mut TurnContext<'_>| {
        ctx.set_team_memory(3, 0b1111)?;
        ctx.set_team_memory_masked(3, 0b0000, 0b0101)
    }));
    game.run_round().unwrap();
    assert_eq!(game.world().team_memory(Team::A).unwrap()[3], 0b1010);
    assert_eq!(game.world().memory_to_persist()[0][3], 0b1010);
}
