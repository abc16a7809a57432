//! Error types for the game simulation.
//!
//! Two layers are kept apart here. [`GameError`] is an engine-level failure
//! that aborts the match (an invariant break, malformed configuration).
//! [`RejectReason`] describes an intent that was well-formed but could not be
//! applied right now; rejections never mutate state and never abort anything.

use thiserror::Error;

use crate::kind::KindId;
use crate::math::{Fixed, Location};
use crate::team::Team;
use crate::unit::UnitId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Internal consistency failure. Fatal to the match.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// A kind referenced by a map, signal or table is missing.
    #[error("Unknown unit kind: {0}")]
    UnknownKind(KindId),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// The map cannot seed a world.
    #[error("Invalid map: {0}")]
    InvalidMap(String),

    /// Invalid game state.
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// The match has already been decided.
    #[error("Match is over")]
    MatchOver,

    /// Replay produced a different world than the recording.
    #[error("Desync detected at round {round}: expected hash {expected}, got {actual}")]
    DesyncDetected {
        /// Round where the divergence was detected.
        round: u32,
        /// Hash stored in the recording.
        expected: u64,
        /// Hash produced by playback.
        actual: u64,
    },
}

/// Why an intent was dropped without effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The referenced unit does not exist (never existed, or already dead).
    #[error("unit {0} does not exist")]
    UnknownUnit(UnitId),

    /// The unit is still under construction.
    #[error("unit {0} is not active")]
    Inactive(UnitId),

    /// The unit has no health left and awaits the death sweep.
    #[error("unit {0} has no health left")]
    Dead(UnitId),

    /// The team cannot pay.
    #[error("team {team} needs {required} but has {available}")]
    InsufficientResources {
        /// Paying team.
        team: Team,
        /// Cost of the request.
        required: Fixed,
        /// Pool at the time of the request.
        available: Fixed,
    },

    /// Destination holds another unit.
    #[error("location {0} is occupied")]
    Occupied(Location),

    /// Destination is outside the map.
    #[error("location {0} is off the map")]
    OffMap(Location),

    /// Destination terrain cannot be entered.
    #[error("location {0} is impassable")]
    Impassable(Location),

    /// Target is not one step away.
    #[error("location {0} is not adjacent")]
    NotAdjacent(Location),

    /// Target is outside the unit's reach.
    #[error("location {0} is out of range")]
    OutOfRange(Location),

    /// The relevant delay has not cooled down.
    #[error("unit {0} is still delayed")]
    Delayed(UnitId),

    /// The unit's kind lacks the capability.
    #[error("kind {kind} cannot {action}")]
    Incapable {
        /// Kind of the requesting unit.
        kind: KindId,
        /// What was attempted.
        action: &'static str,
    },

    /// The requested kind is unknown to the table.
    #[error("kind {0} is not defined")]
    UnknownKind(KindId),

    /// No encampment site at the location.
    #[error("no encampment at {0}")]
    NoEncampment(Location),

    /// The team already owns the target.
    #[error("already owned by {0}")]
    AlreadyOwned(Team),

    /// No mine to remove at the location.
    #[error("no mine at {0}")]
    NoMine(Location),

    /// A mine is already present.
    #[error("mine already present at {0}")]
    MinePresent(Location),

    /// The upgrade is already researched.
    #[error("upgrade already researched")]
    AlreadyResearched,

    /// The referenced task is not running.
    #[error("no task in progress")]
    NoTask,

    /// Team memory index outside the fixed array.
    #[error("memory index {0} out of range")]
    MemoryIndex(usize),

    /// Only player teams may perform this action.
    #[error("team {0} cannot act here")]
    WrongTeam(Team),
}
