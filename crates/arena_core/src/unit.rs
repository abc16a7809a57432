//! The mutable unit entity and its per-unit sub-state machines.

use serde::{Deserialize, Serialize};

use crate::config::Upgrade;
use crate::kind::{KindId, UnitKind};
use crate::math::{clamp_fixed, fixed_serde, Fixed, Location};
use crate::team::Team;

/// Unique unit identifier. Assigned in strictly increasing order.
pub type UnitId = u32;

/// A long-running unit task.
///
/// Started by an agent, advanced once per round by upkeep, and reset to
/// [`TaskState::Idle`] when the unit moves, transforms or dies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskState<T> {
    /// Nothing running.
    #[default]
    Idle,
    /// Running with `remaining` rounds left.
    InProgress {
        /// Rounds until completion.
        remaining: u32,
        /// What the task acts on.
        target: T,
    },
}

impl<T: Copy> TaskState<T> {
    /// Start a task. A zero-round task completes on its first advance.
    #[must_use]
    pub const fn start(rounds: u32, target: T) -> Self {
        Self::InProgress {
            remaining: rounds,
            target,
        }
    }

    /// True if nothing is running.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Target of the running task.
    #[must_use]
    pub const fn target(&self) -> Option<T> {
        match self {
            Self::Idle => None,
            Self::InProgress { target, .. } => Some(*target),
        }
    }

    /// Rounds left, zero when idle.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        match self {
            Self::Idle => 0,
            Self::InProgress { remaining, .. } => *remaining,
        }
    }

    /// Advance one round. Returns the target when the task completes, after
    /// which the state is `Idle` again.
    pub fn advance(&mut self) -> Option<T> {
        match self {
            Self::Idle => None,
            Self::InProgress { remaining, target } => {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    let done = *target;
                    *self = Self::Idle;
                    Some(done)
                } else {
                    None
                }
            }
        }
    }

    /// Drop whatever is running.
    pub fn interrupt(&mut self) {
        *self = Self::Idle;
    }
}

/// What a mining task does when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MineWork {
    /// Place a mine.
    Lay(Location),
    /// Remove a mine.
    Defuse(Location),
}

impl MineWork {
    /// Location the work targets.
    #[must_use]
    pub const fn location(self) -> Location {
        match self {
            Self::Lay(location) | Self::Defuse(location) => location,
        }
    }
}

/// The single-use per-turn action slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActionSlot {
    /// Move, build.
    Movement,
    /// Attack.
    Attack,
    /// Radio writes.
    Broadcast,
    /// Research, mining, capture, transform.
    Special,
}

/// Which slots have been used this turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSlots {
    movement: bool,
    attack: bool,
    broadcast: bool,
    special: bool,
}

impl ActionSlots {
    fn flag(&mut self, slot: ActionSlot) -> &mut bool {
        match slot {
            ActionSlot::Movement => &mut self.movement,
            ActionSlot::Attack => &mut self.attack,
            ActionSlot::Broadcast => &mut self.broadcast,
            ActionSlot::Special => &mut self.special,
        }
    }

    /// Claim a slot. Returns `false` if it was already used.
    pub fn claim(&mut self, slot: ActionSlot) -> bool {
        let flag = self.flag(slot);
        if *flag {
            false
        } else {
            *flag = true;
            true
        }
    }

    /// True if the slot has been used.
    #[must_use]
    pub fn is_used(&self, slot: ActionSlot) -> bool {
        match slot {
            ActionSlot::Movement => self.movement,
            ActionSlot::Attack => self.attack,
            ActionSlot::Broadcast => self.broadcast,
            ActionSlot::Special => self.special,
        }
    }
}

/// Budget accounting of the unit's previous turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnUsage {
    /// Steps granted.
    pub budget: u32,
    /// Steps consumed.
    pub used: u32,
}

/// A live unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Identity.
    pub id: UnitId,
    /// Owning team.
    pub team: Team,
    /// Current kind.
    pub kind: KindId,
    /// Grid position. Mirrored by the store's spatial index.
    pub location: Location,

    /// Remaining health in `[0, max_health]`.
    #[serde(with = "fixed_serde")]
    pub health: Fixed,
    /// Shield pool absorbing damage before health.
    #[serde(with = "fixed_serde")]
    pub shield: Fixed,

    /// Movement-class delay. Moving and building require it below one.
    #[serde(with = "fixed_serde")]
    pub core_delay: Fixed,
    /// Attack-class delay. Attacking requires it below one.
    #[serde(with = "fixed_serde")]
    pub weapon_delay: Fixed,

    /// Rounds of viper infection left.
    pub viper_infection: u32,
    /// Rounds of zombie infection left.
    pub zombie_infection: u32,

    /// Rounds the unit stays under construction.
    pub build_delay: u32,
    /// Completed turns.
    pub rounds_alive: u32,

    /// Upgrade research.
    pub research: TaskState<Upgrade>,
    /// Mine laying or defusing.
    pub mining: TaskState<MineWork>,
    /// Encampment capture.
    pub capture: TaskState<Location>,

    /// Budget accounting of the previous turn, if the unit has had one.
    pub last_turn: Option<TurnUsage>,
    /// Consecutive faulting turns.
    pub fault_strikes: u32,
    /// Took damage during the current round.
    pub attacked: bool,
    /// Builder, if the unit was built.
    pub parent: Option<UnitId>,
}

impl Unit {
    /// A fresh unit at full health.
    #[must_use]
    pub fn new(id: UnitId, team: Team, kind: &UnitKind, location: Location) -> Self {
        Self {
            id,
            team,
            kind: kind.id,
            location,
            health: kind.max_health,
            shield: Fixed::ZERO,
            core_delay: Fixed::ZERO,
            weapon_delay: Fixed::ZERO,
            viper_infection: 0,
            zombie_infection: 0,
            build_delay: 0,
            rounds_alive: 0,
            research: TaskState::Idle,
            mining: TaskState::Idle,
            capture: TaskState::Idle,
            last_turn: None,
            fault_strikes: 0,
            attacked: false,
            parent: None,
        }
    }

    /// Finished construction.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.rounds_alive >= self.build_delay
    }

    /// Health above zero.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > Fixed::ZERO
    }

    /// Core delay has cooled down.
    #[must_use]
    pub fn core_ready(&self) -> bool {
        self.core_delay < Fixed::ONE
    }

    /// Weapon delay has cooled down.
    #[must_use]
    pub fn weapon_ready(&self) -> bool {
        self.weapon_delay < Fixed::ONE
    }

    /// Apply damage, shields first. Health floors at zero.
    /// Returns the damage that reached health.
    pub fn take_damage(&mut self, amount: Fixed) -> Fixed {
        if amount <= Fixed::ZERO {
            return Fixed::ZERO;
        }
        let absorbed = amount.min(self.shield);
        self.shield -= absorbed;
        let dealt = (amount - absorbed).min(self.health);
        self.health -= dealt;
        self.attacked = true;
        dealt
    }

    /// Apply damage of which only `absorbable` may be taken by the shield.
    pub fn take_partially_shielded_damage(&mut self, amount: Fixed, absorbable: Fixed) {
        let absorbed = amount.saturating_mul(absorbable).min(self.shield);
        self.shield -= absorbed;
        self.health = (self.health - (amount - absorbed)).max(Fixed::ZERO);
        self.attacked = true;
    }

    /// Restore health up to `max`. Does not count as being attacked.
    pub fn heal(&mut self, amount: Fixed, max: Fixed) {
        self.health = clamp_fixed(self.health.saturating_add(amount), Fixed::ZERO, max);
    }

    /// Grow the shield pool up to `cap`.
    pub fn add_shield(&mut self, amount: Fixed, cap: Fixed) {
        self.shield = clamp_fixed(self.shield.saturating_add(amount), Fixed::ZERO, cap);
    }

    /// Reduce both delays by `decay`, flooring at zero.
    pub fn decay_delays(&mut self, decay: Fixed) {
        self.core_delay = (self.core_delay - decay).max(Fixed::ZERO);
        self.weapon_delay = (self.weapon_delay - decay).max(Fixed::ZERO);
    }

    /// Reset every long-running task.
    pub fn interrupt_tasks(&mut self) {
        self.research.interrupt();
        self.mining.interrupt();
        self.capture.interrupt();
    }

    /// True if any long-running task is in progress.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        !(self.research.is_idle() && self.mining.is_idle() && self.capture.is_idle())
    }
}
