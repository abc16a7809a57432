//! Who decides what each unit does.
//!
//! The scheduler asks a [`ControlProvider`] for one [`TurnOutcome`] per
//! active unit per round. Live matches use [`AgentController`], which keeps
//! one [`Agent`] per unit. Replays use [`RecordedController`], which hands
//! back outcomes captured from an earlier run, so a replay re-applies the
//! exact same intents without any agent code.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentFactory};
use crate::error::{GameError, Result};
use crate::execution::execute_turn;
use crate::horde::HordeFactory;
use crate::signal::Signal;
use crate::team::Team;
use crate::unit::UnitId;
use crate::world::World;

/// A turn that did not end cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fault {
    /// The agent returned an error. Counts toward the strike limit.
    Recoverable(String),
    /// The agent panicked. The unit is destroyed.
    Fatal(String),
}

/// Everything one unit's turn produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnOutcome {
    /// Steps charged, never above the budget.
    pub steps_used: u32,
    /// Queued intents in settlement order.
    pub intents: Vec<Signal>,
    /// Set if the turn faulted.
    pub fault: Option<Fault>,
    /// The agent asked to be destroyed.
    pub self_destruct: bool,
}

impl TurnOutcome {
    /// A turn in which nothing happened.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

/// Source of unit decisions.
pub trait ControlProvider {
    /// Produce the outcome of `unit`'s turn this round.
    ///
    /// # Errors
    ///
    /// Only for failures of the provider itself. Agent faults are reported
    /// inside the outcome.
    fn run_unit(&mut self, world: &World, unit: UnitId, budget: u32) -> Result<TurnOutcome>;

    /// A unit left the world.
    fn unit_removed(&mut self, _unit: UnitId) {}
}

/// Runs live agents, one per unit, created on first turn.
pub struct AgentController {
    factories: BTreeMap<Team, Box<dyn AgentFactory>>,
    agents: BTreeMap<UnitId, Box<dyn Agent>>,
}

impl Default for AgentController {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentController {
    /// A controller where only the zombie horde is driven.
    ///
    /// Teams without a factory stay idle.
    #[must_use]
    pub fn new() -> Self {
        let mut factories: BTreeMap<Team, Box<dyn AgentFactory>> = BTreeMap::new();
        factories.insert(Team::Zombie, Box::new(HordeFactory));
        Self {
            factories,
            agents: BTreeMap::new(),
        }
    }

    /// Set the factory for a team.
    #[must_use]
    pub fn with_team(mut self, team: Team, factory: impl AgentFactory + 'static) -> Self {
        self.factories.insert(team, Box::new(factory));
        self
    }

    /// Number of live agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

impl ControlProvider for AgentController {
    fn run_unit(&mut self, world: &World, id: UnitId, budget: u32) -> Result<TurnOutcome> {
        let unit = world.unit(id).ok_or(GameError::UnitNotFound(id))?;
        let kind = world.kind_of(unit)?;

        if !self.agents.contains_key(&id) {
            let Some(factory) = self.factories.get_mut(&unit.team) else {
                return Ok(TurnOutcome::idle());
            };
            self.agents.insert(id, factory.create(unit, kind));
        }

        let Some(agent) = self.agents.get_mut(&id) else {
            return Ok(TurnOutcome::idle());
        };
        Ok(execute_turn(agent.as_mut(), world, unit, kind, budget))
    }

    fn unit_removed(&mut self, unit: UnitId) {
        self.agents.remove(&unit);
    }
}

/// Replays previously captured turn outcomes.
#[derive(Debug, Clone, Default)]
pub struct RecordedController {
    outcomes: BTreeMap<(u32, UnitId), TurnOutcome>,
}

impl RecordedController {
    /// Empty recording.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the outcome `unit` produced in `round`.
    pub fn record(&mut self, round: u32, unit: UnitId, outcome: TurnOutcome) {
        self.outcomes.insert((round, unit), outcome);
    }

    /// Number of recorded turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

impl ControlProvider for RecordedController {
    fn run_unit(&mut self, world: &World, unit: UnitId, _budget: u32) -> Result<TurnOutcome> {
        self.outcomes
            .get(&(world.round(), unit))
            .cloned()
            .ok_or_else(|| {
                GameError::InvalidState(format!(
                    "No recorded turn for unit {unit} in round {}",
                    world.round()
                ))
            })
    }
}
