//! The surface agent programs see.
//!
//! An [`Agent`] controls one unit. Once per round it gets a [`TurnContext`]
//! that meters every call against the unit's step budget, exposes a
//! read-only [`WorldView`] of the world as it stood when the turn began, and
//! queues intents. Nothing an agent does touches the world directly; the
//! scheduler applies the queued intents after every unit has had its turn.
//!
//! Each action slot holds at most one intent per turn. Asking for a second
//! move, attack, broadcast or special action is silently ignored.
//!
//! ```
//! use arena_core::agent::{Agent, TurnContext, TurnError};
//! use arena_core::math::Direction;
//!
//! struct Wanderer;
//!
//! impl Agent for Wanderer {
//!     fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError> {
//!         if ctx.can_move(Direction::East)? {
//!             ctx.move_to(Direction::East)?;
//!         }
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

use crate::config::{GameConfig, Upgrade, TEAM_MEMORY_LENGTH};
use crate::kind::{KindId, UnitKind};
use crate::map::GameMap;
use crate::math::{Direction, Fixed, Location};
use crate::signal::{Signal, TaskRequest};
use crate::team::Team;
use crate::unit::{ActionSlot, ActionSlots, Unit, UnitId};
use crate::world::{TeamMemory, World};

/// A unit's controlling program.
pub trait Agent: Send {
    /// Play one turn.
    ///
    /// Returning [`TurnError::OutOfSteps`] ends the turn normally. Any other
    /// error, or a panic, counts as a fault.
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> Result<(), TurnError>;
}

/// Creates agents for newly observed units of one team.
pub trait AgentFactory: Send {
    /// Build the program for `unit`.
    fn create(&mut self, unit: &Unit, kind: &UnitKind) -> Box<dyn Agent>;
}

impl<F> AgentFactory for F
where
    F: FnMut(&Unit, &UnitKind) -> Box<dyn Agent> + Send,
{
    fn create(&mut self, unit: &Unit, kind: &UnitKind) -> Box<dyn Agent> {
        self(unit, kind)
    }
}

/// An action the agent asked for was malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Broadcast carried more pairs than allowed.
    #[error("broadcast of {count} messages exceeds the limit of {limit}")]
    TooManyMessages {
        /// Pairs supplied.
        count: usize,
        /// Pairs allowed.
        limit: usize,
    },
    /// Memory index outside the team array.
    #[error("memory index {0} out of range")]
    MemoryIndex(usize),
    /// The unit's kind cannot do this at all.
    #[error("{kind} cannot {action}")]
    Incapable {
        /// Kind of the acting unit.
        kind: KindId,
        /// Attempted action.
        action: &'static str,
    },
}

/// Why a turn ended early.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    /// The step budget is used up. Not a fault.
    #[error("step budget exhausted")]
    OutOfSteps,
    /// An action was malformed and the agent did not handle it.
    #[error("unhandled action error: {0}")]
    Action(#[from] ActionError),
    /// The agent gave up with an error of its own.
    #[error("agent fault: {0}")]
    Fault(String),
}

/// Step accounting for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMeter {
    budget: u32,
    used: u32,
}

impl StepMeter {
    /// A fresh meter.
    #[must_use]
    pub const fn new(budget: u32) -> Self {
        Self { budget, used: 0 }
    }

    /// Charge `steps`. Running past the budget pins usage at the budget.
    pub fn charge(&mut self, steps: u32) -> Result<(), TurnError> {
        let next = self.used.saturating_add(steps);
        if next > self.budget {
            self.used = self.budget;
            return Err(TurnError::OutOfSteps);
        }
        self.used = next;
        Ok(())
    }

    /// Steps granted.
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.budget
    }

    /// Steps consumed.
    #[must_use]
    pub const fn used(&self) -> u32 {
        self.used
    }

    /// Steps left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.budget - self.used
    }
}

/// Read-only window onto the world from one unit's point of view.
///
/// Queries about other units are limited to the viewer's sensor range.
#[derive(Clone, Copy)]
pub struct WorldView<'w> {
    world: &'w World,
    viewer: &'w Unit,
}

impl<'w> WorldView<'w> {
    /// View of `world` as seen by `viewer`.
    #[must_use]
    pub const fn new(world: &'w World, viewer: &'w Unit) -> Self {
        Self { world, viewer }
    }

    /// The viewing unit.
    #[must_use]
    pub const fn me(&self) -> &'w Unit {
        self.viewer
    }

    /// Current round.
    #[must_use]
    pub const fn round(&self) -> u32 {
        self.world.round()
    }

    /// Round limit of the match.
    #[must_use]
    pub const fn round_limit(&self) -> u32 {
        self.world.round_limit()
    }

    /// Static map.
    #[must_use]
    pub const fn map(&self) -> &'w GameMap {
        self.world.map()
    }

    /// Gameplay constants of the match.
    #[must_use]
    pub const fn config(&self) -> &'w GameConfig {
        self.world.config()
    }

    /// Kind record by id.
    #[must_use]
    pub fn kind(&self, id: KindId) -> Option<&'w UnitKind> {
        self.world.kinds().get(id)
    }

    /// Sensor reach of the viewer.
    #[must_use]
    pub fn sensor_radius_squared(&self) -> i32 {
        self.world.sensor_radius_squared(self.viewer)
    }

    /// True if the viewer can sense `location`.
    #[must_use]
    pub fn can_sense(&self, location: Location) -> bool {
        self.viewer.location.distance_squared(location) <= self.sensor_radius_squared()
    }

    /// Units in sensor range, ascending ID, viewer excluded.
    #[must_use]
    pub fn nearby_units(&self) -> Vec<&'w Unit> {
        let viewer = self.viewer;
        self.world
            .store()
            .units_within(viewer.location, self.sensor_radius_squared())
            .filter(|unit| unit.id != viewer.id)
            .collect()
    }

    /// Unit at a sensed location.
    #[must_use]
    pub fn unit_at(&self, location: Location) -> Option<&'w Unit> {
        if self.can_sense(location) {
            self.world.store().unit_at(location)
        } else {
            None
        }
    }

    /// Mine owner at a sensed location.
    #[must_use]
    pub fn mine_at(&self, location: Location) -> Option<Team> {
        if self.can_sense(location) {
            self.world.mine_at(location)
        } else {
            None
        }
    }

    /// Location of a team's living leader. Leaders are always visible.
    #[must_use]
    pub fn leader_location(&self, team: Team) -> Option<Location> {
        self.world
            .leader(team)
            .and_then(|id| self.world.unit(id))
            .map(|unit| unit.location)
    }

    /// Encampment sites and their owners, by location.
    #[must_use]
    pub fn encampments(&self) -> Vec<(Location, Team)> {
        self.world
            .encampments
            .iter()
            .map(|(location, owner)| (*location, *owner))
            .collect()
    }

    /// The viewer's team pool.
    #[must_use]
    pub fn resources(&self) -> Fixed {
        self.world.resources(self.viewer.team)
    }

    /// True if the viewer's team has the upgrade.
    #[must_use]
    pub fn has_upgrade(&self, upgrade: Upgrade) -> bool {
        self.world.has_upgrade(self.viewer.team, upgrade)
    }

    /// Read the viewer's team radio.
    #[must_use]
    pub fn read_radio(&self, channel: u32) -> Option<i64> {
        self.world
            .radio(self.viewer.team)
            .and_then(|radio| radio.read(channel))
    }

    /// Memory carried over from the previous match.
    #[must_use]
    pub fn old_team_memory(&self) -> Option<&'w TeamMemory> {
        self.world.old_team_memory(self.viewer.team)
    }

    /// True if `location` is passable and empty.
    #[must_use]
    pub fn is_free(&self, location: Location) -> bool {
        self.world.is_free(location)
    }
}

/// What a finished turn produced, before any fault handling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnIntents {
    /// Queued signals in settlement order.
    pub signals: Vec<Signal>,
    /// The agent asked to self-destruct.
    pub self_destruct: bool,
    /// Steps consumed.
    pub steps_used: u32,
}

/// Metered per-turn handle given to an [`Agent`].
pub struct TurnContext<'w> {
    view: WorldView<'w>,
    kind: &'w UnitKind,
    meter: StepMeter,
    slots: ActionSlots,
    action_cost: u32,
    sense_cost: u32,
    message_limit: usize,
    broadcast: Option<Signal>,
    attack: Option<Signal>,
    special: Option<Signal>,
    movement: Option<Signal>,
    extras: Vec<Signal>,
    self_destruct: bool,
}

impl<'w> TurnContext<'w> {
    /// Open a turn for `unit` with `budget` steps.
    #[must_use]
    pub fn new(world: &'w World, unit: &'w Unit, kind: &'w UnitKind, budget: u32) -> Self {
        let config = world.config();
        Self {
            view: WorldView::new(world, unit),
            kind,
            meter: StepMeter::new(budget),
            slots: ActionSlots::default(),
            action_cost: config.action_step_cost,
            sense_cost: config.sense_step_cost,
            message_limit: config.messages_per_turn,
            broadcast: None,
            attack: None,
            special: None,
            movement: None,
            extras: Vec::new(),
            self_destruct: false,
        }
    }

    /// Close the turn.
    #[must_use]
    pub fn finish(self) -> TurnIntents {
        let mut signals: Vec<Signal> = [self.broadcast, self.attack, self.special, self.movement]
            .into_iter()
            .flatten()
            .collect();
        signals.extend(self.extras);
        TurnIntents {
            signals,
            self_destruct: self.self_destruct,
            steps_used: self.meter.used(),
        }
    }

    /// Read-only view of the world, charged like any other sensing call.
    pub fn view(&mut self) -> Result<WorldView<'w>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view)
    }

    /// The controlled unit.
    #[must_use]
    pub const fn me(&self) -> &'w Unit {
        self.view.me()
    }

    /// The controlled unit's kind.
    #[must_use]
    pub const fn kind(&self) -> &'w UnitKind {
        self.kind
    }

    /// Step accounting so far.
    #[must_use]
    pub const fn meter(&self) -> StepMeter {
        self.meter
    }

    /// Charge one step of agent-side computation.
    pub fn tick(&mut self) -> Result<(), TurnError> {
        self.meter.charge(1)
    }

    /// Charge arbitrary agent-side computation.
    pub fn spend(&mut self, steps: u32) -> Result<(), TurnError> {
        self.meter.charge(steps)
    }

    /// True if the slot has been used this turn.
    #[must_use]
    pub fn slot_used(&self, slot: ActionSlot) -> bool {
        self.slots.is_used(slot)
    }

    // --- sensing ---

    /// Units within sensor range.
    pub fn sense_nearby(&mut self) -> Result<Vec<&'w Unit>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view.nearby_units())
    }

    /// Unit at a sensed location.
    pub fn sense_unit_at(&mut self, location: Location) -> Result<Option<&'w Unit>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view.unit_at(location))
    }

    /// Mine at a sensed location.
    pub fn sense_mine(&mut self, location: Location) -> Result<Option<Team>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view.mine_at(location))
    }

    /// Location of a team's living leader.
    pub fn sense_leader(&mut self, team: Team) -> Result<Option<Location>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view.leader_location(team))
    }

    /// Read a radio channel of the own team.
    pub fn read_radio(&mut self, channel: u32) -> Result<Option<i64>, TurnError> {
        self.meter.charge(self.sense_cost)?;
        Ok(self.view.read_radio(channel))
    }

    /// True if a step in `direction` looks possible right now.
    pub fn can_move(&mut self, direction: Direction) -> Result<bool, TurnError> {
        self.meter.charge(self.sense_cost)?;
        let me = self.me();
        Ok(self.kind.can_move()
            && me.core_ready()
            && !self.slots.is_used(ActionSlot::Movement)
            && self.view.is_free(me.location.add(direction)))
    }

    /// True if `target` is inside the attack band and the weapon is ready.
    pub fn can_attack(&mut self, target: Location) -> Result<bool, TurnError> {
        self.meter.charge(self.sense_cost)?;
        let me = self.me();
        Ok(self.kind.can_attack()
            && me.weapon_ready()
            && !self.slots.is_used(ActionSlot::Attack)
            && self.kind.in_attack_range(me.location.distance_squared(target)))
    }

    // --- actions ---

    fn queue(&mut self, slot: ActionSlot, signal: Signal) -> Result<(), TurnError> {
        self.meter.charge(self.action_cost)?;
        if !self.slots.claim(slot) {
            tracing::trace!(unit = self.me().id, ?slot, "Second intent in slot ignored");
            return Ok(());
        }
        let target = match slot {
            ActionSlot::Movement => &mut self.movement,
            ActionSlot::Attack => &mut self.attack,
            ActionSlot::Broadcast => &mut self.broadcast,
            ActionSlot::Special => &mut self.special,
        };
        *target = Some(signal);
        Ok(())
    }

    fn id(&self) -> UnitId {
        self.me().id
    }

    /// Step one cell.
    pub fn move_to(&mut self, direction: Direction) -> Result<(), TurnError> {
        let id = self.id();
        self.queue(ActionSlot::Movement, Signal::Movement { id, direction })
    }

    /// Build a unit next to this one.
    pub fn build(&mut self, kind: KindId, direction: Direction) -> Result<(), TurnError> {
        let builder = self.id();
        self.queue(
            ActionSlot::Movement,
            Signal::Build {
                builder,
                kind,
                direction,
            },
        )
    }

    /// Attack a location.
    pub fn attack(&mut self, target: Location) -> Result<(), TurnError> {
        let attacker = self.id();
        self.queue(ActionSlot::Attack, Signal::Attack { attacker, target })
    }

    /// Write `(channel, value)` pairs to the team radio.
    pub fn broadcast(&mut self, messages: Vec<(u32, i64)>) -> Result<(), TurnError> {
        if messages.len() > self.message_limit {
            return Err(ActionError::TooManyMessages {
                count: messages.len(),
                limit: self.message_limit,
            }
            .into());
        }
        let team = self.me().team;
        self.queue(ActionSlot::Broadcast, Signal::Broadcast { team, messages })
    }

    fn begin(&mut self, task: TaskRequest) -> Result<(), TurnError> {
        let id = self.id();
        self.queue(ActionSlot::Special, Signal::BeginTask { id, task })
    }

    /// Start researching an upgrade.
    pub fn research(&mut self, upgrade: Upgrade) -> Result<(), TurnError> {
        self.begin(TaskRequest::Research(upgrade))
    }

    /// Start laying a mine underfoot.
    pub fn lay_mine(&mut self) -> Result<(), TurnError> {
        self.begin(TaskRequest::LayMine)
    }

    /// Start defusing a nearby mine.
    pub fn defuse_mine(&mut self, location: Location) -> Result<(), TurnError> {
        self.begin(TaskRequest::DefuseMine(location))
    }

    /// Start capturing the encampment underfoot.
    pub fn capture(&mut self) -> Result<(), TurnError> {
        self.begin(TaskRequest::Capture)
    }

    /// Transform into the kind's transform target.
    pub fn transform(&mut self) -> Result<(), TurnError> {
        let Some(kind) = self.kind.transforms_into else {
            return Err(ActionError::Incapable {
                kind: self.kind.id,
                action: "transform",
            }
            .into());
        };
        let id = self.id();
        self.queue(ActionSlot::Special, Signal::TypeChange { id, kind })
    }

    /// Write a whole word of team memory.
    pub fn set_team_memory(&mut self, index: usize, value: i64) -> Result<(), TurnError> {
        self.write_memory(index, value, None)
    }

    /// Replace only the bits set in `mask`.
    pub fn set_team_memory_masked(
        &mut self,
        index: usize,
        value: i64,
        mask: i64,
    ) -> Result<(), TurnError> {
        self.write_memory(index, value, Some(mask))
    }

    fn write_memory(&mut self, index: usize, value: i64, mask: Option<i64>) -> Result<(), TurnError> {
        if index >= TEAM_MEMORY_LENGTH {
            return Err(ActionError::MemoryIndex(index).into());
        }
        self.meter.charge(self.action_cost)?;
        let team = self.me().team;
        self.extras.push(Signal::TeamMemory {
            team,
            index,
            value,
            mask,
        });
        Ok(())
    }

    /// Attach an observation-only note to the unit.
    pub fn indicate(&mut self, text: impl Into<String>) -> Result<(), TurnError> {
        self.meter.charge(1)?;
        let id = self.id();
        self.extras.push(Signal::Indicator {
            id,
            text: text.into(),
        });
        Ok(())
    }

    /// Destroy the unit at the end of this turn.
    pub fn self_destruct(&mut self) {
        self.self_destruct = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::kind::KindTable;

    fn world() -> World {
        let kinds = KindTable::new([UnitKind::new(KindId(1), "soldier", Fixed::from_num(40))
            .with_attack(Fixed::from_num(5), 2, Fixed::ONE)
            .with_movement(Fixed::ONE)
            .with_budget(1000)])
        .unwrap();
        let map = GameMap::open(5, 5, 0)
            .with_unit(Team::A, KindId(1), Location::new(2, 2))
            .with_unit(Team::B, KindId(1), Location::new(3, 3));
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    #[test]
    fn test_meter_pins_at_budget() {
        let mut meter = StepMeter::new(10);
        assert!(meter.charge(6).is_ok());
        assert_eq!(meter.charge(6), Err(TurnError::OutOfSteps));
        assert_eq!(meter.used(), 10);
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn test_second_intent_in_slot_dropped() {
        let world = world();
        let unit = world.unit(1).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(&world, unit, kind, 1000);
        ctx.move_to(Direction::North).unwrap();
        ctx.move_to(Direction::South).unwrap();
        ctx.attack(Location::new(3, 3)).unwrap();
        let intents = ctx.finish();
        assert_eq!(
            intents.signals,
            vec![
                Signal::Attack {
                    attacker: 1,
                    target: Location::new(3, 3)
                },
                Signal::Movement {
                    id: 1,
                    direction: Direction::North
                },
            ]
        );
        assert_eq!(intents.steps_used, 75);
    }

    #[test]
    fn test_world_view_is_charged() {
        let world = world();
        let unit = world.unit(1).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let cost = world.config().sense_step_cost;
        let mut ctx = TurnContext::new(&world, unit, kind, cost * 2);
        assert_eq!(ctx.view().unwrap().me().id, 1);
        assert_eq!(ctx.meter().used(), cost);
        ctx.view().unwrap();
        assert_eq!(ctx.view().err(), Some(TurnError::OutOfSteps));
    }

    #[test]
    fn test_actions_fail_when_budget_gone() {
        let world = world();
        let unit = world.unit(1).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(&world, unit, kind, 30);
        ctx.move_to(Direction::North).unwrap();
        assert_eq!(ctx.attack(Location::new(3, 3)), Err(TurnError::OutOfSteps));
        let intents = ctx.finish();
        assert_eq!(intents.signals.len(), 1);
        assert_eq!(intents.steps_used, 30);
    }

    #[test]
    fn test_broadcast_limit() {
        let world = world();
        let unit = world.unit(1).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(&world, unit, kind, 1000);
        let messages = (0..21).map(|c| (c, 0)).collect();
        assert!(matches!(
            ctx.broadcast(messages),
            Err(TurnError::Action(ActionError::TooManyMessages { .. }))
        ));
    }

    #[test]
    fn test_sensing_is_range_limited() {
        let world = world();
        let unit = world.unit(1).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(&world, unit, kind, 1000);
        // Sensor radius is zero for this kind.
        assert!(ctx.sense_nearby().unwrap().is_empty());
        assert_eq!(ctx.sense_leader(Team::B).unwrap(), None);
        assert!(ctx.can_attack(Location::new(3, 3)).unwrap());
        assert_eq!(ctx.meter().used(), 300);
    }
}
