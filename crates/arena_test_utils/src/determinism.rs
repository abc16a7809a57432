//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a match produces identical results
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! Replays and verification only work if a match is 100% deterministic.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`arena_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted unit ID order.
//!
//! - **System randomness**: The only generator lives in the world state and
//!   is seeded from the map.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual rules (damage, delays, economy)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full matches are reproducible and replayable
//! 4. **Parallel tests**: Running N matches in parallel all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use arena_core::replay::ReplayPlayer;
use arena_core::scheduler::Match;
use arena_core::world::World;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of rounds played.
    pub rounds: u32,
}

impl DeterminismResult {
    fn from_hashes(hashes: Vec<u64>, rounds: u32) -> Self {
        Self {
            is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
            hashes,
            rounds,
        }
    }

    /// Get all unique hashes (should be 1 for a deterministic match).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the match was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Rounds: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.rounds,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Play up to `rounds` rounds, stopping early once the match is over.
///
/// # Panics
///
/// Panics if a round aborts the match with an error.
pub fn play(game: &mut Match, rounds: u32) {
    for _ in 0..rounds {
        if game.is_over() {
            break;
        }
        if let Err(e) = game.run_round() {
            panic!("round {} failed: {e}", game.world().round());
        }
    }
}

/// Run a match setup multiple times and verify the final hashes agree.
///
/// # Example
///
/// ```ignore
/// use arena_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(5, 100, || setup_skirmish());
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<F>(runs: usize, rounds: u32, setup: F) -> DeterminismResult
where
    F: Fn() -> Match,
{
    let hashes = (0..runs)
        .map(|_| {
            let mut game = setup();
            play(&mut game, rounds);
            game.world().state_hash()
        })
        .collect();
    DeterminismResult::from_hashes(hashes, rounds)
}

/// Run N matches in parallel using scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling
/// variations or different memory layouts.
///
/// # Panics
///
/// Panics if a worker thread panics.
pub fn run_parallel_matches<F>(setup: F, num_matches: usize, rounds: u32) -> DeterminismResult
where
    F: Fn() -> Match + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_matches)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup();
                    play(&mut game, rounds);
                    game.world().state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(hash) => hash,
                Err(_) => panic!("parallel match panicked"),
            })
            .collect()
    });
    DeterminismResult::from_hashes(hashes, rounds)
}

/// Compare two runs round by round, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree throughout, `Some(round)` for the first round
/// whose hashes differ (0 means the initial worlds already differ).
pub fn find_first_divergence<F>(setup: F, rounds: u32) -> Option<u32>
where
    F: Fn() -> Match,
{
    let mut first = setup();
    let mut second = setup();

    if first.world().state_hash() != second.world().state_hash() {
        return Some(0);
    }

    for _ in 0..rounds {
        if first.is_over() || second.is_over() {
            break;
        }
        let a = first.run_round().map(|r| r.state_hash);
        let b = second.run_round().map(|r| r.state_hash);
        match (a, b) {
            (Ok(a), Ok(b)) if a == b => {}
            _ => {
                let round = first.world().round();
                tracing::warn!(round, "Runs diverged");
                return Some(round);
            }
        }
    }

    None
}

/// Verify that a snapshot round trip preserves the world exactly.
pub fn verify_serialization_determinism<F>(setup: F, rounds: u32) -> bool
where
    F: Fn() -> Match,
{
    let mut game = setup();
    play(&mut game, rounds);
    let before = game.world().state_hash();

    let Ok(bytes) = game.world().serialize() else {
        return false;
    };
    let Ok(restored) = World::deserialize(&bytes) else {
        return false;
    };

    before == restored.state_hash()
}

/// Record a match, replay it and report whether the final hashes agree.
pub fn verify_replay<F>(setup: F, rounds: u32) -> bool
where
    F: Fn() -> Match,
{
    let Ok(mut game) = setup().with_recording() else {
        return false;
    };
    play(&mut game, rounds);
    let Some(replay) = game.take_replay() else {
        return false;
    };
    let Ok(mut player) = ReplayPlayer::new(replay) else {
        return false;
    };
    matches!(player.verify(), Ok(true)) && player.world().state_hash() == game.world().state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of the signal bus and the scheduler.
pub mod strategies {
    use arena_core::math::{Direction, Fixed, Location};
    use arena_core::signal::Signal;
    use arena_core::team::Team;
    use arena_core::unit::UnitId;
    use proptest::prelude::*;

    /// Any of the eight directions.
    pub fn arb_direction() -> impl Strategy<Value = Direction> {
        (0usize..8).prop_map(|i| Direction::ALL[i])
    }

    /// A location within (and one cell around) a `width × height` map.
    pub fn arb_location(width: i32, height: i32) -> impl Strategy<Value = Location> {
        (-1..=width, -1..=height).prop_map(|(x, y)| Location::new(x, y))
    }

    /// A player team.
    pub fn arb_player() -> impl Strategy<Value = Team> {
        prop_oneof![Just(Team::A), Just(Team::B)]
    }

    /// Health in a playable range.
    pub fn arb_health() -> impl Strategy<Value = Fixed> {
        (1i32..200).prop_map(Fixed::from_num)
    }

    /// A signal touching units `1..=max_id` on a `size × size` map.
    ///
    /// IDs past the live range exercise the unknown-unit path.
    pub fn arb_signal(max_id: UnitId, size: i32) -> impl Strategy<Value = Signal> {
        let id = 1..=max_id + 2;
        prop_oneof![
            (id.clone(), arb_direction()).prop_map(|(id, direction)| Signal::Movement { id, direction }),
            (id.clone(), arb_location(size, size))
                .prop_map(|(attacker, target)| Signal::Attack { attacker, target }),
            id.clone().prop_map(|id| Signal::Death { id }),
            (arb_player(), 0usize..40, any::<i64>()).prop_map(|(team, index, value)| {
                Signal::TeamMemory {
                    team,
                    index,
                    value,
                    mask: None,
                }
            }),
            (arb_player(), proptest::collection::vec((0u32..64, any::<i64>()), 0..5))
                .prop_map(|(team, messages)| Signal::Broadcast { team, messages }),
        ]
    }

    /// A sequence of up to `max_len` signals.
    pub fn arb_signal_sequence(
        max_id: UnitId,
        size: i32,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<Signal>> {
        proptest::collection::vec(arb_signal(max_id, size), 0..max_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::skirmishers;
    use crate::fixtures::{match_from, mirror_duel, standard_world};
    use arena_core::control::AgentController;

    fn duel() -> Match {
        match_from(mirror_duel(40, 3), skirmishers())
    }

    #[test]
    fn test_verify_determinism_duel() {
        verify_determinism(3, 20, duel).assert_deterministic();
    }

    #[test]
    fn test_idle_standard_world_is_deterministic() {
        let result = verify_determinism(2, 50, || {
            match_from(standard_world(), AgentController::new())
        });
        assert_eq!(result.unique_hashes().len(), 1);
    }

    #[test]
    fn test_parallel_duels_agree() {
        run_parallel_matches(duel, 4, 30).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(duel, 30), None);
    }

    #[test]
    fn test_snapshot_round_trip() {
        assert!(verify_serialization_determinism(duel, 5));
    }

    #[test]
    fn test_replay_matches_live_run() {
        assert!(verify_replay(duel, 30));
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&42u32), compute_hash(&42u32));
    }
}
