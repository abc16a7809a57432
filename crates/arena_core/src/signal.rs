//! The closed set of world mutations.
//!
//! A [`Signal`] is an immutable record of one state change, or of an intent
//! to request one. Agents, upkeep and external tooling all produce signals;
//! only [`World::apply_signal`](crate::world::World::apply_signal) consumes
//! them. Each signal is applied at most once, in the order it was created.

use serde::{Deserialize, Serialize};

use crate::config::Upgrade;
use crate::error::RejectReason;
use crate::kind::KindId;
use crate::math::{fixed_serde, Direction, Fixed, Location};
use crate::team::Team;
use crate::unit::UnitId;

/// Long-running task an agent can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskRequest {
    /// Research an upgrade for the team.
    Research(Upgrade),
    /// Lay a mine under the unit.
    LayMine,
    /// Defuse a mine at an adjacent or own location.
    DefuseMine(Location),
    /// Capture the encampment site the unit stands on.
    Capture,
}

/// Whether a mine signal adds or removes a hazard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MineAction {
    /// Place a mine owned by the team.
    Lay,
    /// Remove whatever mine is there.
    Remove,
}

/// One authorized state change or intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Create a unit. Charges `cost` to `team`.
    Spawn {
        /// Owner of the new unit.
        team: Team,
        /// Kind to create.
        kind: KindId,
        /// Placement.
        location: Location,
        /// Rounds the unit stays inactive.
        build_delay: u32,
        /// Builder or spawning structure.
        parent: Option<UnitId>,
        /// Price paid by `team`.
        #[serde(with = "fixed_serde")]
        cost: Fixed,
    },
    /// Builder asks to construct a unit next to itself.
    Build {
        /// Building unit.
        builder: UnitId,
        /// Kind requested.
        kind: KindId,
        /// Side of the builder to place it on.
        direction: Direction,
    },
    /// Remove a unit.
    Death {
        /// Unit to remove.
        id: UnitId,
    },
    /// Step one cell.
    Movement {
        /// Moving unit.
        id: UnitId,
        /// Step direction.
        direction: Direction,
    },
    /// Attack a location.
    Attack {
        /// Attacking unit.
        attacker: UnitId,
        /// Targeted cell.
        target: Location,
    },
    /// Write radio channels.
    Broadcast {
        /// Team whose radio is written.
        team: Team,
        /// `(channel, value)` pairs, applied in order.
        messages: Vec<(u32, i64)>,
    },
    /// Start a long-running task.
    BeginTask {
        /// Working unit.
        id: UnitId,
        /// What to start.
        task: TaskRequest,
    },
    /// One round of research progress.
    Research {
        /// Researching unit.
        id: UnitId,
        /// Upgrade advanced.
        upgrade: Upgrade,
    },
    /// Add or remove a hazard.
    Mine {
        /// Owner of a laid mine.
        team: Team,
        /// Hazard cell.
        location: Location,
        /// Add or remove.
        action: MineAction,
    },
    /// One round of capture progress.
    Capture {
        /// Capturing unit.
        id: UnitId,
        /// Encampment site.
        location: Location,
    },
    /// Restore health from a support unit.
    Regen {
        /// Support unit.
        source: UnitId,
        /// Healed unit.
        target: UnitId,
        /// Health restored.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// Add shield from a support unit.
    Shield {
        /// Support unit.
        source: UnitId,
        /// Shielded unit.
        target: UnitId,
        /// Shield added.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// Transform into another kind.
    TypeChange {
        /// Transforming unit.
        id: UnitId,
        /// Kind to become.
        kind: KindId,
    },
    /// Write the team's cross-match memory.
    TeamMemory {
        /// Writing team.
        team: Team,
        /// Word index.
        index: usize,
        /// New bits.
        value: i64,
        /// Only bits set in the mask are replaced; `None` writes the word.
        mask: Option<i64>,
    },
    /// Observation-only annotation.
    Indicator {
        /// Annotated unit.
        id: UnitId,
        /// Free text.
        text: String,
    },
}

impl Signal {
    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Build { .. } => "build",
            Self::Death { .. } => "death",
            Self::Movement { .. } => "movement",
            Self::Attack { .. } => "attack",
            Self::Broadcast { .. } => "broadcast",
            Self::BeginTask { .. } => "begin_task",
            Self::Research { .. } => "research",
            Self::Mine { .. } => "mine",
            Self::Capture { .. } => "capture",
            Self::Regen { .. } => "regen",
            Self::Shield { .. } => "shield",
            Self::TypeChange { .. } => "type_change",
            Self::TeamMemory { .. } => "team_memory",
            Self::Indicator { .. } => "indicator",
        }
    }

    /// The unit the signal is about, if any.
    #[must_use]
    pub const fn subject(&self) -> Option<UnitId> {
        match self {
            Self::Build { builder: id, .. }
            | Self::Death { id }
            | Self::Movement { id, .. }
            | Self::Attack { attacker: id, .. }
            | Self::BeginTask { id, .. }
            | Self::Research { id, .. }
            | Self::Capture { id, .. }
            | Self::Regen { target: id, .. }
            | Self::Shield { target: id, .. }
            | Self::TypeChange { id, .. }
            | Self::Indicator { id, .. } => Some(*id),
            Self::Spawn { .. }
            | Self::Broadcast { .. }
            | Self::Mine { .. }
            | Self::TeamMemory { .. } => None,
        }
    }
}

/// Result of applying one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The effect took place.
    Applied,
    /// A unit was created with this ID.
    Spawned(UnitId),
    /// The signal was dropped without mutation.
    Rejected(RejectReason),
}

impl Outcome {
    /// True unless rejected.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// A signal together with what happened when it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalRecord {
    /// Round of application.
    pub round: u32,
    /// The signal.
    pub signal: Signal,
    /// What happened.
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_of_unit_signals() {
        let death = Signal::Death { id: 7 };
        assert_eq!(death.subject(), Some(7));
        assert_eq!(death.name(), "death");

        let memory = Signal::TeamMemory {
            team: Team::A,
            index: 0,
            value: 1,
            mask: None,
        };
        assert_eq!(memory.subject(), None);
    }

    #[test]
    fn test_rejected_is_not_applied() {
        assert!(Outcome::Spawned(3).is_applied());
        assert!(!Outcome::Rejected(RejectReason::NoTask).is_applied());
    }
}
