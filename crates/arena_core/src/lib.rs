//! # Arena Core
//!
//! Deterministic round-based battle simulation core.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO outside replay files
//! - No system randomness
//! - No floating-point math in the simulation (uses fixed-point)
//!
//! This separation enables:
//! - Headless match runners
//! - Replay and verification
//! - Determinism testing
//!
//! ## Crate Structure
//!
//! - [`world`] - The single owned match state
//! - [`dispatch`] - The signal bus every mutation goes through
//! - [`scheduler`] - Round phases and the [`scheduler::Match`] driver
//! - [`agent`] - The metered surface agent programs see
//! - [`control`] - Live and recorded turn providers
//! - [`replay`] - Recording and verifying matches
//! - [`math`] - Fixed-point math and grid geometry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod agent;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod economy;
pub mod error;
pub mod execution;
pub mod horde;
pub mod kind;
pub mod lifecycle;
pub mod map;
pub mod math;
pub mod replay;
pub mod rng;
pub mod scheduler;
pub mod signal;
pub mod store;
pub mod team;
pub mod unit;
pub mod victory;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::agent::{
        ActionError, Agent, AgentFactory, StepMeter, TurnContext, TurnError, WorldView,
    };
    pub use crate::config::{GameConfig, Upgrade, UpgradeSpec, TEAM_MEMORY_LENGTH};
    pub use crate::control::{AgentController, ControlProvider, Fault, RecordedController, TurnOutcome};
    pub use crate::error::{GameError, RejectReason, Result};
    pub use crate::horde::{HordeAgent, HordeFactory};
    pub use crate::kind::{DamageRule, KindId, KindTable, UnitKind};
    pub use crate::map::GameMap;
    pub use crate::math::{Direction, Fixed, Location};
    pub use crate::replay::{Replay, ReplayPlayer};
    pub use crate::scheduler::{Match, MatchPhase, RoundReport, SharedMatch, TurnRecord};
    pub use crate::signal::{Outcome, Signal, SignalRecord, TaskRequest};
    pub use crate::team::Team;
    pub use crate::unit::{Unit, UnitId};
    pub use crate::world::{DominationFactor, TeamMemory, Victory, World};
}
