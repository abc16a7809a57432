//! Replay system for recording and playing back matches.
//!
//! A replay stores the initial world snapshot together with every turn
//! outcome and every injected signal, in the order they happened. Playing
//! it back feeds the recorded outcomes through the same scheduler instead of
//! running agents, so the final world matches the original bit for bit.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::control::RecordedController;
use crate::error::{GameError, Result};
use crate::scheduler::{Match, TurnRecord};
use crate::signal::Signal;
use crate::world::World;

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// One recorded step of a match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplayEvent {
    /// A signal injected by the host between rounds.
    Inject(Signal),
    /// A completed round.
    Round {
        /// Round number.
        round: u32,
        /// Every turn taken, in execution order.
        turns: Vec<TurnRecord>,
        /// World hash after the round.
        state_hash: u64,
    },
}

/// Complete replay data structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Replay {
    /// Replay format version.
    pub version: u32,
    /// Serialized initial world.
    pub initial_state: Vec<u8>,
    /// Events in the order they happened.
    pub events: Vec<ReplayEvent>,
    /// Last round played.
    pub final_round: u32,
    /// Final state hash for verification.
    pub final_hash: u64,
}

impl Replay {
    /// Start a replay from a world that has not played any round yet.
    ///
    /// # Errors
    /// Returns an error if the world cannot be serialized.
    pub fn new(initial_state: &World) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            initial_state: initial_state.serialize()?,
            events: Vec::new(),
            final_round: initial_state.round(),
            final_hash: initial_state.state_hash(),
        })
    }

    /// Record an injected signal.
    pub fn record_inject(&mut self, signal: Signal) {
        self.events.push(ReplayEvent::Inject(signal));
    }

    /// Record a completed round.
    pub fn record_round(&mut self, round: u32, turns: Vec<TurnRecord>, state_hash: u64) {
        self.events.push(ReplayEvent::Round {
            round,
            turns,
            state_hash,
        });
    }

    /// Finalize the replay with end-of-match state.
    pub fn finalize(&mut self, final_round: u32, final_hash: u64) {
        self.final_round = final_round;
        self.final_hash = final_hash;
    }

    /// Save the replay to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| GameError::InvalidState(format!("Failed to serialize replay: {e}")))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to write replay file: {e}")))?;
        Ok(())
    }

    /// Load a replay from a file.
    ///
    /// # Errors
    /// Returns an error if file reading or deserialization fails, or the
    /// version does not match.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| GameError::InvalidState(format!("Failed to read replay file: {e}")))?;
        let replay: Self = bincode::deserialize(&bytes)
            .map_err(|e| GameError::InvalidState(format!("Failed to deserialize replay: {e}")))?;

        if replay.version != REPLAY_VERSION {
            return Err(GameError::InvalidState(format!(
                "Replay version mismatch: expected {REPLAY_VERSION}, got {}",
                replay.version
            )));
        }

        Ok(replay)
    }

    /// Restore the world the replay starts from.
    ///
    /// # Errors
    /// Returns an error if state deserialization fails.
    pub fn restore_initial_state(&self) -> Result<World> {
        World::deserialize(&self.initial_state)
    }

    /// Number of recorded rounds.
    #[must_use]
    pub fn round_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ReplayEvent::Round { .. }))
            .count()
    }

    /// A controller that hands back every recorded turn.
    #[must_use]
    pub fn controller(&self) -> RecordedController {
        let mut controller = RecordedController::new();
        for event in &self.events {
            if let ReplayEvent::Round { round, turns, .. } = event {
                for turn in turns {
                    controller.record(*round, turn.unit, turn.outcome.clone());
                }
            }
        }
        controller
    }
}

/// Replay playback controller.
pub struct ReplayPlayer {
    replay: Replay,
    game: Match,
    cursor: usize,
}

impl ReplayPlayer {
    /// Create a player positioned before the first event.
    ///
    /// # Errors
    /// Returns an error if the initial state cannot be restored.
    pub fn new(replay: Replay) -> Result<Self> {
        let game = Self::fresh_match(&replay)?;
        Ok(Self {
            replay,
            game,
            cursor: 0,
        })
    }

    fn fresh_match(replay: &Replay) -> Result<Match> {
        let world = replay.restore_initial_state()?;
        Ok(Match::new(world, Box::new(replay.controller())))
    }

    /// Apply the next event.
    ///
    /// Returns `false` once every event has been played.
    ///
    /// # Errors
    /// [`GameError::DesyncDetected`] if a round ends in a different state
    /// than recorded.
    pub fn step(&mut self) -> Result<bool> {
        let Some(event) = self.replay.events.get(self.cursor) else {
            return Ok(false);
        };
        match event {
            ReplayEvent::Inject(signal) => {
                self.game.inject(signal.clone())?;
            }
            ReplayEvent::Round {
                round, state_hash, ..
            } => {
                let report = self.game.run_round()?;
                if report.state_hash != *state_hash {
                    return Err(GameError::DesyncDetected {
                        round: *round,
                        expected: *state_hash,
                        actual: report.state_hash,
                    });
                }
            }
        }
        self.cursor += 1;
        Ok(self.cursor < self.replay.events.len())
    }

    /// Jump to the end of `round`, restarting from the snapshot if it lies
    /// behind the current position.
    ///
    /// # Errors
    /// Any error [`ReplayPlayer::step`] can return.
    pub fn seek(&mut self, round: u32) -> Result<()> {
        if round < self.current_round() {
            self.game = Self::fresh_match(&self.replay)?;
            self.cursor = 0;
        }
        while self.current_round() < round && self.step()? {}
        Ok(())
    }

    /// Play every remaining event and compare the final hash.
    ///
    /// # Errors
    /// [`GameError::DesyncDetected`] on a mid-match divergence.
    pub fn verify(&mut self) -> Result<bool> {
        while self.step()? {}
        let actual = self.game.world().state_hash();
        if actual != self.replay.final_hash {
            tracing::warn!(
                expected = self.replay.final_hash,
                actual,
                "Replay final hash mismatch"
            );
        }
        Ok(actual == self.replay.final_hash)
    }

    /// Round reached by playback.
    #[must_use]
    pub fn current_round(&self) -> u32 {
        self.game.world().round()
    }

    /// True once every event has been played.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.replay.events.len()
    }

    /// Playback progress in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        if self.replay.events.is_empty() {
            return 1.0;
        }
        self.cursor as f64 / self.replay.events.len() as f64
    }

    /// The world as replayed so far.
    #[must_use]
    pub fn world(&self) -> &World {
        self.game.world()
    }

    /// The replay being played.
    #[must_use]
    pub const fn replay(&self) -> &Replay {
        &self.replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GameConfig, TEAM_MEMORY_LENGTH};
    use crate::kind::{KindId, KindTable, UnitKind};
    use crate::map::GameMap;
    use crate::math::{Fixed, Location};
    use crate::team::Team;

    fn world() -> World {
        let kinds = KindTable::new([UnitKind::new(KindId(1), "soldier", Fixed::from_num(10))
            .with_budget(100)])
        .unwrap();
        let map = GameMap {
            round_limit: Some(5),
            ..GameMap::open(4, 4, 3).with_unit(Team::A, KindId(1), Location::new(0, 0))
        };
        World::new(map, kinds, GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let replay = Replay::new(&world()).unwrap();
        let dir = std::env::temp_dir().join("arena_core_replay_test.bin");
        replay.save(&dir).unwrap();
        let loaded = Replay::load(&dir).unwrap();
        assert_eq!(loaded.initial_state, replay.initial_state);
        let _ = std::fs::remove_file(&dir);
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let mut replay = Replay::new(&world()).unwrap();
        replay.version = REPLAY_VERSION + 1;
        let path = std::env::temp_dir().join("arena_core_replay_version.bin");
        replay.save(&path).unwrap();
        assert!(Replay::load(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_recorded_match_verifies() {
        let mut game = Match::new(world(), Box::new(crate::control::AgentController::new()))
            .with_recording()
            .unwrap();
        game.run_to_completion(10).unwrap();
        let replay = game.take_replay().unwrap();
        assert_eq!(replay.round_count(), 4);

        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(player.verify().unwrap());
        assert!(player.is_finished());

        player.seek(2).unwrap();
        assert_eq!(player.current_round(), 2);
    }

    #[test]
    fn test_tampered_hash_is_desync() {
        let mut game = Match::new(world(), Box::new(crate::control::AgentController::new()))
            .with_recording()
            .unwrap();
        game.run_round().unwrap();
        let mut replay = game.take_replay().unwrap();
        if let Some(ReplayEvent::Round { state_hash, .. }) = replay.events.last_mut() {
            *state_hash ^= 1;
        }
        let mut player = ReplayPlayer::new(replay).unwrap();
        assert!(matches!(
            player.step(),
            Err(GameError::DesyncDetected { round: 1, .. })
        ));
    }
}
