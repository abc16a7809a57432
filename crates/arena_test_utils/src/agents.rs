//! Scripted agents for tests.
//!
//! Small, predictable programs: one that does nothing, one that runs a
//! closure, one that fights whatever is in reach. Plus helpers for wiring
//! them into an [`AgentController`].

use arena_core::agent::{Agent, AgentFactory, TurnContext, TurnError};
use arena_core::control::AgentController;
use arena_core::kind::UnitKind;
use arena_core::math::Location;
use arena_core::team::Team;
use arena_core::unit::Unit;

/// Ends every turn immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl Agent for Idle {
    fn run_turn(&mut self, _ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
        Ok(())
    }
}

/// Runs a closure as its turn.
pub struct Script<F> {
    turn: F,
}

impl<F> Script<F>
where
    F: FnMut(&mut TurnContext<'_>) -> Result<(), TurnError> + Send,
{
    /// Wrap a closure.
    pub fn new(turn: F) -> Self {
        Self { turn }
    }
}

impl<F> Agent for Script<F>
where
    F: FnMut(&mut TurnContext<'_>) -> Result<(), TurnError> + Send,
{
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
        (self.turn)(ctx)
    }
}

/// Attacks the nearest enemy in range, ties to the lowest ID. Never moves.
#[derive(Debug, Default, Clone, Copy)]
pub struct Skirmisher;

impl Skirmisher {
    fn target(ctx: &mut TurnContext<'_>) -> Result<Option<Location>, TurnError> {
        let me = ctx.me();
        let kind = ctx.kind();
        Ok(ctx
            .sense_nearby()?
            .into_iter()
            .filter(|unit| unit.team != me.team && unit.team != Team::Neutral)
            .filter(|unit| kind.in_attack_range(me.location.distance_squared(unit.location)))
            .min_by_key(|unit| (me.location.distance_squared(unit.location), unit.id))
            .map(|unit| unit.location))
    }
}

impl Agent for Skirmisher {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
        if let Some(target) = Self::target(ctx)? {
            ctx.attack(target)?;
        }
        Ok(())
    }
}

/// Attacks a fixed location every turn.
#[derive(Debug, Clone, Copy)]
pub struct Gunner {
    /// Location fired at.
    pub target: Location,
}

impl Agent for Gunner {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
        ctx.attack(self.target)
    }
}

/// Factory that hands every unit a clone of `agent`.
pub fn every_unit<A>(agent: A) -> impl AgentFactory
where
    A: Agent + Clone + 'static,
{
    move |_: &Unit, _: &UnitKind| -> Box<dyn Agent> { Box::new(agent.clone()) }
}

/// Controller with the given factories for team A and team B.
pub fn controller(
    a: impl AgentFactory + 'static,
    b: impl AgentFactory + 'static,
) -> AgentController {
    AgentController::new().with_team(Team::A, a).with_team(Team::B, b)
}

/// Controller where both teams run [`Skirmisher`].
#[must_use]
pub fn skirmishers() -> AgentController {
    controller(every_unit(Skirmisher), every_unit(Skirmisher))
}
