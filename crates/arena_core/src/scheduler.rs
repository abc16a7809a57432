//! The round scheduler.
//!
//! A [`Match`] owns the world and is the only thing that mutates it. Each
//! call to [`Match::run_round`] walks one round through its phases:
//!
//! 1. **Begin**: round counter, delay decay, infections, mine hazards,
//!    long-running tasks, removal of units killed by upkeep damage.
//! 2. **Execute**: every active unit, ascending ID, runs one metered turn
//!    against the world as it stood when the round began. Intents are
//!    queued, not applied. A unit that faults fatally, reaches the strike
//!    limit or self-destructs dies before the next ID runs.
//! 3. **Settle**: queued intents in creation order, passive effects, death
//!    sweep, income, win evaluation, decay.
//!
//! Any [`GameError`] raised along the way aborts the match.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::control::{ControlProvider, Fault, TurnOutcome};
use crate::error::{GameError, Result};
use crate::math::Fixed;
use crate::replay::Replay;
use crate::signal::{Outcome, Signal, SignalRecord};
use crate::unit::{TurnUsage, UnitId};
use crate::world::{Victory, World};

/// Where a match is in its round cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Between rounds, waiting for the host.
    Idle,
    /// Begin-round upkeep and unit turns.
    RoundActive,
    /// Applying queued intents and end-of-round rules.
    Settling,
    /// Decided or aborted. Nothing else will run.
    MatchOver,
}

/// One unit's turn within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// The unit.
    pub unit: UnitId,
    /// Steps it was granted.
    pub budget: u32,
    /// What it produced.
    pub outcome: TurnOutcome,
}

/// Everything observable about a finished round.
#[derive(Debug, Clone)]
pub struct RoundReport {
    /// Round number.
    pub round: u32,
    /// Turns taken, ascending unit ID.
    pub turns: Vec<TurnRecord>,
    /// Units removed this round, in removal order.
    pub deaths: Vec<UnitId>,
    /// Every signal applied or rejected this round, in order.
    pub signals: Vec<SignalRecord>,
    /// Set once the match is decided.
    pub victory: Option<Victory>,
    /// World hash after the round.
    pub state_hash: u64,
}

/// A match in progress.
pub struct Match {
    world: World,
    controller: Box<dyn ControlProvider + Send>,
    phase: MatchPhase,
    replay: Option<Replay>,
}

impl Match {
    /// Wrap a freshly built world.
    #[must_use]
    pub fn new(world: World, controller: Box<dyn ControlProvider + Send>) -> Self {
        let phase = if world.victory().is_some() {
            MatchPhase::MatchOver
        } else {
            MatchPhase::Idle
        };
        Self {
            world,
            controller,
            phase,
            replay: None,
        }
    }

    /// Record every round and injection from here on.
    ///
    /// # Errors
    /// Fails if the world cannot be snapshotted.
    pub fn with_recording(mut self) -> Result<Self> {
        self.replay = Some(Replay::new(&self.world)?);
        Ok(self)
    }

    /// Current world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// True once nothing else will run.
    #[must_use]
    pub fn is_over(&self) -> bool {
        self.phase == MatchPhase::MatchOver
    }

    /// Stop recording and return the finalized replay.
    pub fn take_replay(&mut self) -> Option<Replay> {
        let mut replay = self.replay.take()?;
        replay.finalize(self.world.round(), self.world.state_hash());
        Some(replay)
    }

    /// Play one round.
    ///
    /// # Errors
    /// [`GameError::MatchOver`] once the match has ended. Any other error
    /// aborts the match.
    pub fn run_round(&mut self) -> Result<RoundReport> {
        if self.is_over() {
            return Err(GameError::MatchOver);
        }
        match self.play_round() {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!(round = self.world.round(), error = %e, "Match aborted");
                self.phase = MatchPhase::MatchOver;
                Err(e)
            }
        }
    }

    /// Play until decided or `max_rounds` more rounds have run.
    ///
    /// # Errors
    /// Any error from [`Match::run_round`] other than the match ending.
    pub fn run_to_completion(&mut self, max_rounds: u32) -> Result<Option<Victory>> {
        for _ in 0..max_rounds {
            if self.is_over() {
                break;
            }
            self.run_round()?;
        }
        Ok(self.world.victory())
    }

    /// Apply a host signal between rounds through the normal dispatcher.
    ///
    /// A leader killed this way decides the match immediately.
    ///
    /// # Errors
    /// [`GameError::MatchOver`] once the match has ended, or any invariant
    /// failure.
    pub fn inject(&mut self, signal: Signal) -> Result<Outcome> {
        if self.is_over() {
            return Err(GameError::MatchOver);
        }
        let mark = self.world.log().len();
        let result = self
            .world
            .apply_signal(signal.clone())
            .and_then(|outcome| self.world.evaluate_leader_loss().map(|_| outcome));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(round = self.world.round(), error = %e, "Injection aborted match");
                self.phase = MatchPhase::MatchOver;
                return Err(e);
            }
        };

        let removed: Vec<UnitId> = deaths(&self.world.log()[mark..]);
        for id in removed {
            self.controller.unit_removed(id);
        }
        if let Some(replay) = &mut self.replay {
            replay.record_inject(signal);
        }
        if self.world.victory().is_some() {
            self.phase = MatchPhase::MatchOver;
        }
        Ok(outcome)
    }

    fn play_round(&mut self) -> Result<RoundReport> {
        self.phase = MatchPhase::RoundActive;
        self.world.begin_round()?;
        let round = self.world.round();

        let (turns, intents) = self.execute_units()?;

        self.phase = MatchPhase::Settling;
        for intent in intents {
            self.world.apply_signal(intent)?;
        }
        self.world.apply_passive_effects()?;
        self.world.death_sweep()?;
        self.world.accrue_income();
        let victory = self.world.evaluate_victory()?;
        self.world.decay_resources();
        self.world.check_invariants()?;

        let signals = self.world.take_log();
        let deaths = deaths(&signals);
        for &id in &deaths {
            self.controller.unit_removed(id);
        }

        let state_hash = self.world.state_hash();
        if let Some(replay) = &mut self.replay {
            replay.record_round(round, turns.clone(), state_hash);
        }

        self.phase = if victory.is_some() {
            MatchPhase::MatchOver
        } else {
            MatchPhase::Idle
        };
        tracing::debug!(round, state_hash, units = self.world.store().len(), "Round complete");

        Ok(RoundReport {
            round,
            turns,
            deaths,
            signals,
            victory,
            state_hash,
        })
    }

    fn execute_units(&mut self) -> Result<(Vec<TurnRecord>, Vec<Signal>)> {
        let mut turns = Vec::new();
        let mut intents = Vec::new();
        let strike_limit = self.world.config().fault_strike_limit;

        for id in self.world.store().sorted_ids() {
            let Some(unit) = self.world.unit(id) else {
                continue;
            };
            let kind = self.world.kind_of(unit)?;
            let runnable = unit.is_active() && unit.is_alive() && kind.step_budget > 0;
            let (team, step_budget) = (unit.team, kind.step_budget);

            if runnable {
                let fraction = self.world.charge_upkeep(team);
                let budget = scaled_budget(step_budget, fraction);
                let outcome = self.controller.run_unit(&self.world, id, budget)?;
                let terminate = self.settle_turn(id, budget, &outcome, strike_limit);

                if terminate {
                    tracing::debug!(unit = id, %team, fault = ?outcome.fault, "Unit terminated");
                    self.world.apply_signal(Signal::Death { id })?;
                } else {
                    intents.extend(outcome.intents.iter().cloned());
                }
                turns.push(TurnRecord {
                    unit: id,
                    budget,
                    outcome,
                });
            }

            if let Some(unit) = self.world.store.get_mut(id) {
                unit.rounds_alive += 1;
            }
        }

        Ok((turns, intents))
    }

    /// Book a finished turn on the unit. Returns true if it must die.
    fn settle_turn(
        &mut self,
        id: UnitId,
        budget: u32,
        outcome: &TurnOutcome,
        strike_limit: u32,
    ) -> bool {
        let Some(unit) = self.world.store.get_mut(id) else {
            return false;
        };
        unit.last_turn = Some(TurnUsage {
            budget,
            used: outcome.steps_used.min(budget),
        });
        let fatal = match &outcome.fault {
            None => {
                unit.fault_strikes = 0;
                false
            }
            Some(Fault::Recoverable(_)) => {
                unit.fault_strikes += 1;
                unit.fault_strikes >= strike_limit
            }
            Some(Fault::Fatal(_)) => true,
        };
        fatal || outcome.self_destruct
    }
}

fn scaled_budget(budget: u32, fraction: Fixed) -> u32 {
    if fraction >= Fixed::ONE {
        return budget;
    }
    Fixed::saturating_from_num(budget)
        .saturating_mul(fraction.max(Fixed::ZERO))
        .to_num::<u32>()
}

fn deaths(records: &[SignalRecord]) -> Vec<UnitId> {
    records
        .iter()
        .filter_map(|record| match (&record.signal, &record.outcome) {
            (Signal::Death { id }, Outcome::Applied) => Some(*id),
            _ => None,
        })
        .collect()
}

/// Thread-safe handle that serializes rounds and injections.
#[derive(Clone)]
pub struct SharedMatch {
    inner: Arc<Mutex<Match>>,
}

impl SharedMatch {
    /// Share a match.
    #[must_use]
    pub fn new(game: Match) -> Self {
        Self {
            inner: Arc::new(Mutex::new(game)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Match>> {
        self.inner
            .lock()
            .map_err(|_| GameError::InvalidState("Match lock poisoned".to_string()))
    }

    /// See [`Match::run_round`].
    ///
    /// # Errors
    /// As [`Match::run_round`], or if the lock is poisoned.
    pub fn run_round(&self) -> Result<RoundReport> {
        self.lock()?.run_round()
    }

    /// See [`Match::inject`].
    ///
    /// # Errors
    /// As [`Match::inject`], or if the lock is poisoned.
    pub fn inject(&self, signal: Signal) -> Result<Outcome> {
        self.lock()?.inject(signal)
    }

    /// Read the match under the lock.
    ///
    /// # Errors
    /// Fails if the lock is poisoned.
    pub fn with<R>(&self, f: impl FnOnce(&Match) -> R) -> Result<R> {
        Ok(f(&*self.lock()?))
    }
}
