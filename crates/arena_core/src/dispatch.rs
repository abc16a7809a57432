//! Signal dispatcher.
//!
//! Every signal kind is handled in two phases. A `check_*` method reads the
//! world through `&self` and either admits the signal (returning whatever
//! the commit needs) or rejects it with a [`RejectReason`]. Only admitted
//! signals reach the matching `commit_*` method, which is the single place
//! that kind of effect mutates the world. Rejection therefore cannot leave a
//! partial mutation behind.
//!
//! Signals produced while applying another (a build yields a spawn, a
//! zombie-infected death yields a zombie) are applied right after their
//! parent, keeping the log in creation order.

use std::collections::VecDeque;

use crate::config::{Upgrade, TEAM_MEMORY_LENGTH};
use crate::error::{GameError, RejectReason, Result};
use crate::kind::{DamageRule, InfectionKind, InfectionRule, KindId, SupportRule, UnitKind};
use crate::math::{Direction, Fixed, Location};
use crate::signal::{MineAction, Outcome, Signal, SignalRecord, TaskRequest};
use crate::team::Team;
use crate::unit::{MineWork, TaskState, Unit, UnitId};
use crate::world::World;

type Admit<T> = std::result::Result<T, RejectReason>;

fn admit<T>(check: Admit<T>, commit: impl FnOnce(T) -> Result<Outcome>) -> Result<Outcome> {
    match check {
        Ok(plan) => commit(plan),
        Err(reason) => Ok(Outcome::Rejected(reason)),
    }
}

struct AttackPlan {
    attacker: UnitId,
    team: Team,
    power: Fixed,
    attack_delay: Fixed,
    cooldown_delay: Fixed,
    rule: DamageRule,
    infects: Option<InfectionRule>,
}

struct MovePlan {
    destination: Location,
    delay: Fixed,
    loading_delay: Fixed,
}

enum TaskPlan {
    Research(Upgrade, u32, Fixed),
    Mine(MineWork, u32),
    Capture(Location, u32, Fixed),
}

impl World {
    /// Apply one signal and everything it produces.
    ///
    /// Returns the outcome of `signal` itself. Every applied or rejected
    /// signal is appended to the round log.
    ///
    /// # Errors
    ///
    /// [`GameError::InvariantViolation`] if the world is found corrupt.
    /// Rejections are not errors.
    pub fn apply_signal(&mut self, signal: Signal) -> Result<Outcome> {
        let mut queue = VecDeque::from([signal]);
        let mut first = None;

        while let Some(next) = queue.pop_front() {
            let mut derived = Vec::new();
            let outcome = match self.dispatch(&next, &mut derived) {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(round = self.round, signal = next.name(), error = %e, "Signal broke an invariant");
                    return Err(e);
                }
            };
            tracing::trace!(round = self.round, signal = next.name(), ?outcome, "Signal applied");
            if first.is_none() {
                first = Some(outcome.clone());
            }
            self.log.push(SignalRecord {
                round: self.round,
                signal: next,
                outcome,
            });
            queue.extend(derived);
        }

        Ok(first.unwrap_or(Outcome::Applied))
    }

    fn dispatch(&mut self, signal: &Signal, derived: &mut Vec<Signal>) -> Result<Outcome> {
        match signal {
            Signal::Spawn {
                team,
                kind,
                location,
                build_delay,
                parent,
                cost,
            } => admit(self.check_spawn(*team, *kind, *location, *cost), |kind| {
                self.commit_spawn(*team, &kind, *location, *build_delay, *parent, *cost)
            }),
            Signal::Build {
                builder,
                kind,
                direction,
            } => admit(self.check_build(*builder, *kind, *direction), |spawn| {
                self.commit_build(*builder, spawn, derived)
            }),
            Signal::Death { id } => admit(self.check_death(*id), |unit| {
                self.commit_death(&unit, derived)
            }),
            Signal::Movement { id, direction } => {
                admit(self.check_movement(*id, *direction), |plan| {
                    self.commit_movement(*id, &plan)
                })
            }
            Signal::Attack { attacker, target } => {
                admit(self.check_attack(*attacker, *target), |plan| {
                    self.commit_attack(&plan, *target)
                })
            }
            Signal::Broadcast { team, messages } => {
                self.commit_broadcast(*team, messages);
                Ok(Outcome::Applied)
            }
            Signal::BeginTask { id, task } => admit(self.check_begin_task(*id, *task), |plan| {
                self.commit_begin_task(*id, plan)
            }),
            Signal::Research { id, upgrade } => {
                admit(self.check_research(*id, *upgrade), |team| {
                    self.commit_research(*id, team, *upgrade)
                })
            }
            Signal::Mine {
                team,
                location,
                action,
            } => admit(self.check_mine(*location, *action), |()| {
                self.commit_mine(*team, *location, *action);
                Ok(Outcome::Applied)
            }),
            Signal::Capture { id, location } => {
                admit(self.check_capture(*id, *location), |team| {
                    self.commit_capture(*id, team, *location)
                })
            }
            Signal::Regen {
                source,
                target,
                amount,
            } => admit(self.check_support(*source, *target, false), |max| {
                if let Some(unit) = self.store.get_mut(*target) {
                    unit.heal(*amount, max);
                }
                Ok(Outcome::Applied)
            }),
            Signal::Shield {
                source,
                target,
                amount,
            } => admit(self.check_support(*source, *target, true), |_| {
                let cap = self.config.shield_cap;
                if let Some(unit) = self.store.get_mut(*target) {
                    unit.add_shield(*amount, cap);
                }
                Ok(Outcome::Applied)
            }),
            Signal::TypeChange { id, kind } => admit(self.check_type_change(*id, *kind), |max| {
                self.commit_type_change(*id, *kind, max)
            }),
            Signal::TeamMemory {
                team,
                index,
                value,
                mask,
            } => admit(check_team_memory(*team, *index), |slot| {
                let word = &mut self.team_memory[slot][*index];
                *word = match mask {
                    Some(mask) => (*word & !mask) | (value & mask),
                    None => *value,
                };
                Ok(Outcome::Applied)
            }),
            Signal::Indicator { .. } => Ok(Outcome::Applied),
        }
    }

    // --- shared checks ---

    fn require_unit(&self, id: UnitId) -> Admit<&Unit> {
        self.store.get(id).ok_or(RejectReason::UnknownUnit(id))
    }

    fn require_active(&self, id: UnitId) -> Admit<(&Unit, &UnitKind)> {
        let unit = self.require_unit(id)?;
        if !unit.is_active() {
            return Err(RejectReason::Inactive(id));
        }
        let kind = self
            .kinds
            .get(unit.kind)
            .ok_or(RejectReason::UnknownKind(unit.kind))?;
        Ok((unit, kind))
    }

    fn require_free(&self, location: Location) -> Admit<()> {
        if !self.map.on_map(location) {
            return Err(RejectReason::OffMap(location));
        }
        if !self.map.is_passable(location) {
            return Err(RejectReason::Impassable(location));
        }
        if self.store.is_occupied(location) {
            return Err(RejectReason::Occupied(location));
        }
        Ok(())
    }

    fn require_funds(&self, team: Team, cost: Fixed) -> Admit<()> {
        let available = self.store.team(team).resources;
        if team.is_player() && cost > available {
            return Err(RejectReason::InsufficientResources {
                team,
                required: cost,
                available,
            });
        }
        Ok(())
    }

    // --- spawn / build / death ---

    fn check_spawn(&self, team: Team, kind: KindId, location: Location, cost: Fixed) -> Admit<UnitKind> {
        let kind = self.kinds.get(kind).ok_or(RejectReason::UnknownKind(kind))?;
        self.require_free(location)?;
        self.require_funds(team, cost)?;
        Ok(kind.clone())
    }

    fn commit_spawn(
        &mut self,
        team: Team,
        kind: &UnitKind,
        location: Location,
        build_delay: u32,
        parent: Option<UnitId>,
        cost: Fixed,
    ) -> Result<Outcome> {
        if team.is_player() && cost > Fixed::ZERO {
            self.store.spend(team, cost).map_err(|reason| {
                GameError::InvariantViolation(format!("admitted spawn could not be paid: {reason}"))
            })?;
        }
        let id = self.store.insert(team, kind, location)?;
        if let Some(unit) = self.store.get_mut(id) {
            unit.build_delay = build_delay;
            unit.parent = parent;
        }
        if kind.is_leader && team.is_player() {
            self.leaders.insert(team, id);
        }
        if kind.is_encampment && self.encampments.contains_key(&location) {
            self.encampments.insert(location, team);
        }
        tracing::debug!(round = self.round, id, %team, kind = %kind.name, %location, "Unit spawned");
        Ok(Outcome::Spawned(id))
    }

    fn check_build(&self, builder: UnitId, kind: KindId, direction: Direction) -> Admit<Signal> {
        let (unit, builder_kind) = self.require_active(builder)?;
        if !builder_kind.builds.contains(&kind) {
            return Err(RejectReason::Incapable {
                kind: builder_kind.id,
                action: "build",
            });
        }
        if !unit.core_ready() {
            return Err(RejectReason::Delayed(builder));
        }
        let target = self.kinds.get(kind).ok_or(RejectReason::UnknownKind(kind))?;
        let location = unit.location.add(direction);
        self.require_free(location)?;
        self.require_funds(unit.team, target.cost)?;
        Ok(Signal::Spawn {
            team: unit.team,
            kind,
            location,
            build_delay: target.build_turns,
            parent: Some(builder),
            cost: target.cost,
        })
    }

    fn commit_build(&mut self, builder: UnitId, spawn: Signal, derived: &mut Vec<Signal>) -> Result<Outcome> {
        let build_turns = match &spawn {
            Signal::Spawn { build_delay, .. } => *build_delay,
            _ => 0,
        };
        if let Some(unit) = self.store.get_mut(builder) {
            unit.core_delay = unit.core_delay.saturating_add(Fixed::from_num(build_turns));
        }
        derived.push(spawn);
        Ok(Outcome::Applied)
    }

    fn check_death(&self, id: UnitId) -> Admit<Unit> {
        self.require_unit(id).cloned()
    }

    fn commit_death(&mut self, unit: &Unit, derived: &mut Vec<Signal>) -> Result<Outcome> {
        if self.store.unit_at(unit.location).map(|u| u.id) != Some(unit.id) {
            return Err(GameError::InvariantViolation(format!(
                "death of unit {} at {} which the spatial index does not hold",
                unit.id, unit.location
            )));
        }
        self.store.remove(unit.id);
        let kind = self.kinds.require(unit.kind)?;

        if kind.is_leader && self.leaders.get(&unit.team) == Some(&unit.id) {
            self.fallen_leaders.insert(unit.team);
            tracing::info!(round = self.round, team = %unit.team, id = unit.id, "Leader destroyed");
        }
        if kind.is_encampment && self.encampments.get(&unit.location) == Some(&unit.team) {
            self.encampments.insert(unit.location, Team::Neutral);
        }
        if unit.zombie_infection > 0 {
            if let Some(zombie) = kind.zombie_form {
                derived.push(Signal::Spawn {
                    team: Team::Zombie,
                    kind: zombie,
                    location: unit.location,
                    build_delay: 0,
                    parent: None,
                    cost: Fixed::ZERO,
                });
            }
        }
        tracing::debug!(round = self.round, id = unit.id, team = %unit.team, "Unit died");
        Ok(Outcome::Applied)
    }

    // --- movement / attack ---

    fn check_movement(&self, id: UnitId, direction: Direction) -> Admit<MovePlan> {
        let (unit, kind) = self.require_active(id)?;
        if !kind.can_move() {
            return Err(RejectReason::Incapable {
                kind: kind.id,
                action: "move",
            });
        }
        if !unit.core_ready() {
            return Err(RejectReason::Delayed(id));
        }
        let destination = unit.location.add(direction);
        self.require_free(destination)?;
        let delay = if direction.is_diagonal() {
            kind.movement_delay
                .saturating_mul(self.config.diagonal_delay_multiplier)
        } else {
            kind.movement_delay
        };
        Ok(MovePlan {
            destination,
            delay,
            loading_delay: kind.loading_delay,
        })
    }

    fn commit_movement(&mut self, id: UnitId, plan: &MovePlan) -> Result<Outcome> {
        self.store.relocate(id, plan.destination)?;
        if let Some(unit) = self.store.get_mut(id) {
            unit.core_delay = unit.core_delay.saturating_add(plan.delay);
            unit.weapon_delay = unit.weapon_delay.max(plan.loading_delay);
            unit.interrupt_tasks();
        }
        Ok(Outcome::Applied)
    }

    fn check_attack(&self, attacker: UnitId, target: Location) -> Admit<AttackPlan> {
        let (unit, kind) = self.require_active(attacker)?;
        if !kind.can_attack() {
            return Err(RejectReason::Incapable {
                kind: kind.id,
                action: "attack",
            });
        }
        if !unit.weapon_ready() {
            return Err(RejectReason::Delayed(attacker));
        }
        if !kind.in_attack_range(unit.location.distance_squared(target)) {
            return Err(RejectReason::OutOfRange(target));
        }
        Ok(AttackPlan {
            attacker,
            team: unit.team,
            power: kind.attack_power,
            attack_delay: kind.attack_delay,
            cooldown_delay: kind.cooldown_delay,
            rule: kind.damage_rule,
            infects: kind.infects,
        })
    }

    fn commit_attack(&mut self, plan: &AttackPlan, target: Location) -> Result<Outcome> {
        if let Some(unit) = self.store.get_mut(plan.attacker) {
            unit.weapon_delay = unit.weapon_delay.saturating_add(plan.attack_delay);
            unit.core_delay = unit.core_delay.max(plan.cooldown_delay);
        }

        let mut hits: Vec<(UnitId, Fixed)> = Vec::new();
        match plan.rule {
            DamageRule::Single => {
                if let Some(victim) = self.store.unit_at(target) {
                    hits.push((victim.id, plan.power));
                }
            }
            DamageRule::Splash { ratio } => {
                if let Some(victim) = self.store.unit_at(target) {
                    hits.push((victim.id, plan.power));
                }
                let splash = plan.power.saturating_mul(ratio);
                for location in target.neighbours() {
                    if let Some(victim) = self.store.unit_at(location) {
                        hits.push((victim.id, splash));
                    }
                }
            }
            DamageRule::DivideAmongAdjacent => {
                let victims: Vec<UnitId> = self
                    .store
                    .units_within(target, 2)
                    .filter(|u| u.team != plan.team && u.team != Team::Neutral)
                    .map(|u| u.id)
                    .collect();
                if !victims.is_empty() {
                    let share = plan.power / Fixed::from_num(victims.len());
                    hits.extend(victims.into_iter().map(|id| (id, share)));
                }
            }
        }

        hits.sort_unstable_by_key(|(id, _)| *id);
        for (victim, amount) in hits {
            self.damage_unit(victim, amount, plan.infects);
        }
        Ok(Outcome::Applied)
    }

    /// Damage a unit, shields first. Neutral units are immune.
    pub(crate) fn damage_unit(&mut self, id: UnitId, amount: Fixed, infects: Option<InfectionRule>) {
        let Some(unit) = self.store.get_mut(id) else {
            return;
        };
        if unit.team == Team::Neutral {
            return;
        }
        unit.take_damage(amount);
        if let Some(rule) = infects {
            match rule.kind {
                InfectionKind::Viper => unit.viper_infection = unit.viper_infection.max(rule.turns),
                InfectionKind::Zombie => {
                    unit.zombie_infection = unit.zombie_infection.max(rule.turns);
                }
            }
        }
    }

    // --- radio ---

    fn commit_broadcast(&mut self, team: Team, messages: &[(u32, i64)]) {
        let capacity = self.config.signal_queue_max;
        let radio = self.radio.entry(team).or_default();
        for (channel, value) in messages {
            radio.write(*channel, *value, capacity);
        }
    }

    // --- long-running tasks ---

    fn check_begin_task(&self, id: UnitId, task: TaskRequest) -> Admit<TaskPlan> {
        let (unit, kind) = self.require_active(id)?;
        if !unit.team.is_player() {
            return Err(RejectReason::WrongTeam(unit.team));
        }
        match task {
            TaskRequest::Research(upgrade) => {
                if !kind.can_research {
                    return Err(RejectReason::Incapable {
                        kind: kind.id,
                        action: "research",
                    });
                }
                let state = self.store.team(unit.team);
                if state.has_upgrade(upgrade) {
                    return Err(RejectReason::AlreadyResearched);
                }
                let spec = self.config.upgrade(upgrade);
                self.require_funds(unit.team, spec.cost)?;
                let done = state.research.get(&upgrade).copied().unwrap_or(0);
                let remaining = spec.rounds.saturating_sub(done).max(1);
                Ok(TaskPlan::Research(upgrade, remaining, spec.cost))
            }
            TaskRequest::LayMine => {
                if !kind.can_mine {
                    return Err(RejectReason::Incapable {
                        kind: kind.id,
                        action: "lay mines",
                    });
                }
                if self.mines.contains_key(&unit.location) {
                    return Err(RejectReason::MinePresent(unit.location));
                }
                Ok(TaskPlan::Mine(
                    MineWork::Lay(unit.location),
                    self.config.mine_lay_rounds,
                ))
            }
            TaskRequest::DefuseMine(location) => {
                if !kind.can_mine {
                    return Err(RejectReason::Incapable {
                        kind: kind.id,
                        action: "defuse mines",
                    });
                }
                if unit.location.distance_squared(location) > 2 {
                    return Err(RejectReason::NotAdjacent(location));
                }
                if !self.mines.contains_key(&location) {
                    return Err(RejectReason::NoMine(location));
                }
                Ok(TaskPlan::Mine(
                    MineWork::Defuse(location),
                    self.defuse_rounds(unit.team),
                ))
            }
            TaskRequest::Capture => {
                if !kind.can_capture {
                    return Err(RejectReason::Incapable {
                        kind: kind.id,
                        action: "capture",
                    });
                }
                let owner = self
                    .encampment_owner(unit.location)
                    .ok_or(RejectReason::NoEncampment(unit.location))?;
                if owner == unit.team {
                    return Err(RejectReason::AlreadyOwned(owner));
                }
                self.require_funds(unit.team, self.config.capture_cost)?;
                Ok(TaskPlan::Capture(
                    unit.location,
                    self.config.capture_rounds,
                    self.config.capture_cost,
                ))
            }
        }
    }

    fn commit_begin_task(&mut self, id: UnitId, plan: TaskPlan) -> Result<Outcome> {
        let team = self.store.get(id).ok_or(GameError::UnitNotFound(id))?.team;
        let cost = match plan {
            TaskPlan::Research(_, _, cost) | TaskPlan::Capture(_, _, cost) => cost,
            TaskPlan::Mine(..) => Fixed::ZERO,
        };
        if cost > Fixed::ZERO {
            self.store.spend(team, cost).map_err(|reason| {
                GameError::InvariantViolation(format!("admitted task could not be paid: {reason}"))
            })?;
        }
        let unit = self.store.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        unit.interrupt_tasks();
        match plan {
            TaskPlan::Research(upgrade, rounds, _) => {
                unit.research = TaskState::start(rounds, upgrade);
            }
            TaskPlan::Mine(work, rounds) => unit.mining = TaskState::start(rounds, work),
            TaskPlan::Capture(location, rounds, _) => {
                unit.capture = TaskState::start(rounds, location);
            }
        }
        Ok(Outcome::Applied)
    }

    fn check_research(&self, id: UnitId, upgrade: Upgrade) -> Admit<Team> {
        let unit = self.require_unit(id)?;
        if unit.research.target() != Some(upgrade) {
            return Err(RejectReason::NoTask);
        }
        if self.has_upgrade(unit.team, upgrade) {
            return Err(RejectReason::AlreadyResearched);
        }
        Ok(unit.team)
    }

    fn commit_research(&mut self, id: UnitId, team: Team, upgrade: Upgrade) -> Result<Outcome> {
        let required = self.config.upgrade(upgrade).rounds;
        let state = self.store.team_mut(team);
        let progress = state.research.entry(upgrade).or_insert(0);
        *progress += 1;
        let complete = *progress >= required;
        if complete {
            state.upgrades.insert(upgrade);
        }
        if let Some(unit) = self.store.get_mut(id) {
            unit.research.advance();
            if complete {
                unit.research.interrupt();
            }
        }
        if complete {
            tracing::info!(round = self.round, %team, ?upgrade, "Upgrade researched");
        }
        Ok(Outcome::Applied)
    }

    fn check_mine(&self, location: Location, action: MineAction) -> Admit<()> {
        match action {
            MineAction::Lay => {
                if !self.map.on_map(location) {
                    return Err(RejectReason::OffMap(location));
                }
                if !self.map.is_passable(location) {
                    return Err(RejectReason::Impassable(location));
                }
                if self.mines.contains_key(&location) {
                    return Err(RejectReason::MinePresent(location));
                }
                Ok(())
            }
            MineAction::Remove => {
                if self.mines.contains_key(&location) {
                    Ok(())
                } else {
                    Err(RejectReason::NoMine(location))
                }
            }
        }
    }

    fn commit_mine(&mut self, team: Team, location: Location, action: MineAction) {
        match action {
            MineAction::Lay => {
                self.mines.insert(location, team);
            }
            MineAction::Remove => {
                self.mines.remove(&location);
            }
        }
    }

    fn check_capture(&self, id: UnitId, location: Location) -> Admit<Team> {
        let unit = self.require_unit(id)?;
        if unit.capture.target() != Some(location) {
            return Err(RejectReason::NoTask);
        }
        if unit.location != location {
            return Err(RejectReason::OutOfRange(location));
        }
        if !self.encampments.contains_key(&location) {
            return Err(RejectReason::NoEncampment(location));
        }
        Ok(unit.team)
    }

    fn commit_capture(&mut self, id: UnitId, team: Team, location: Location) -> Result<Outcome> {
        let unit = self.store.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        if unit.capture.advance().is_some() {
            self.encampments.insert(location, team);
            tracing::info!(round = self.round, %team, %location, "Encampment captured");
        }
        Ok(Outcome::Applied)
    }

    // --- support ---

    /// Returns the target's max health.
    fn check_support(&self, source: UnitId, target: UnitId, shield: bool) -> Admit<Fixed> {
        let (giver, giver_kind) = self.require_active(source)?;
        if !giver.is_alive() {
            return Err(RejectReason::Dead(source));
        }
        let radius_squared = match (giver_kind.support, shield) {
            (Some(SupportRule::Regen { radius_squared, .. }), false)
            | (Some(SupportRule::Shield { radius_squared, .. }), true) => radius_squared,
            _ => {
                return Err(RejectReason::Incapable {
                    kind: giver_kind.id,
                    action: if shield { "shield" } else { "regenerate" },
                })
            }
        };
        let receiver = self.require_unit(target)?;
        if !receiver.is_alive() {
            return Err(RejectReason::Dead(target));
        }
        if receiver.team != giver.team {
            return Err(RejectReason::WrongTeam(receiver.team));
        }
        if giver.location.distance_squared(receiver.location) > radius_squared {
            return Err(RejectReason::OutOfRange(receiver.location));
        }
        let receiver_kind = self
            .kinds
            .get(receiver.kind)
            .ok_or(RejectReason::UnknownKind(receiver.kind))?;
        if !shield && receiver_kind.is_leader {
            return Err(RejectReason::Incapable {
                kind: receiver_kind.id,
                action: "be regenerated",
            });
        }
        Ok(receiver_kind.max_health)
    }

    // --- transform ---

    fn check_type_change(&self, id: UnitId, kind: KindId) -> Admit<Fixed> {
        let (unit, current) = self.require_active(id)?;
        if current.transforms_into != Some(kind) {
            return Err(RejectReason::Incapable {
                kind: current.id,
                action: "transform",
            });
        }
        if !unit.core_ready() {
            return Err(RejectReason::Delayed(id));
        }
        let next = self.kinds.get(kind).ok_or(RejectReason::UnknownKind(kind))?;
        Ok(next.max_health)
    }

    fn commit_type_change(&mut self, id: UnitId, kind: KindId, max_health: Fixed) -> Result<Outcome> {
        self.store.change_kind(id, kind)?;
        let penalty = self.config.transform_delay;
        let unit = self.store.get_mut(id).ok_or(GameError::UnitNotFound(id))?;
        unit.core_delay = unit.core_delay.saturating_add(penalty);
        unit.weapon_delay = unit.weapon_delay.saturating_add(penalty);
        unit.health = unit.health.min(max_health);
        unit.interrupt_tasks();
        Ok(Outcome::Applied)
    }
}

fn check_team_memory(team: Team, index: usize) -> Admit<usize> {
    let slot = team.player_index().ok_or(RejectReason::WrongTeam(team))?;
    if index >= TEAM_MEMORY_LENGTH {
        return Err(RejectReason::MemoryIndex(index));
    }
    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::kind::{KindTable, SpawnRule};
    use crate::map::GameMap;

    const HQ: KindId = KindId(1);
    const SOLDIER: KindId = KindId(2);
    const ARTILLERY: KindId = KindId(3);
    const CAMP: KindId = KindId(4);
    const MEDBAY: KindId = KindId(5);
    const TTM: KindId = KindId(6);
    const ZOMBIE: KindId = KindId(7);

    fn kinds() -> KindTable {
        KindTable::new([
            UnitKind {
                is_leader: true,
                is_structure: true,
                builds: vec![SOLDIER],
                ..UnitKind::new(HQ, "hq", Fixed::from_num(500))
            },
            UnitKind {
                can_research: true,
                can_mine: true,
                can_capture: true,
                zombie_form: Some(ZOMBIE),
                transforms_into: Some(TTM),
                damage_rule: DamageRule::DivideAmongAdjacent,
                ..UnitKind::new(SOLDIER, "soldier", Fixed::from_num(40))
                    .with_attack(Fixed::from_num(6), 2, Fixed::ONE)
                    .with_movement(Fixed::ONE)
                    .with_cost(Fixed::from_num(10))
            },
            UnitKind {
                is_structure: true,
                damage_rule: DamageRule::Splash {
                    ratio: Fixed::from_num(0.5),
                },
                ..UnitKind::new(ARTILLERY, "artillery", Fixed::from_num(100)).with_attack(
                    Fixed::from_num(20),
                    25,
                    Fixed::ONE,
                )
            },
            UnitKind {
                is_structure: true,
                is_encampment: true,
                ..UnitKind::new(CAMP, "camp", Fixed::from_num(100))
            },
            UnitKind {
                is_structure: true,
                support: Some(SupportRule::Regen {
                    amount: Fixed::from_num(5),
                    radius_squared: 4,
                }),
                ..UnitKind::new(MEDBAY, "medbay", Fixed::from_num(100))
            },
            UnitKind::new(TTM, "ttm", Fixed::from_num(30)),
            UnitKind {
                is_hostile: true,
                spawns: Some(SpawnRule {
                    kind: ZOMBIE,
                    every_rounds: 10,
                }),
                ..UnitKind::new(ZOMBIE, "zombie", Fixed::from_num(20))
            },
        ])
        .unwrap()
    }

    fn world() -> World {
        let map = GameMap {
            encampments: vec![Location::new(5, 5)],
            void: [Location::new(9, 0)].into_iter().collect(),
            ..GameMap::open(10, 10, 1)
                .with_unit(Team::A, HQ, Location::new(0, 0))
                .with_unit(Team::B, HQ, Location::new(9, 9))
        };
        World::new(map, kinds(), GameConfig::default(), [[0; TEAM_MEMORY_LENGTH]; 2]).unwrap()
    }

    fn spawn(world: &mut World, team: Team, kind: KindId, location: Location) -> UnitId {
        match world
            .apply_signal(Signal::Spawn {
                team,
                kind,
                location,
                build_delay: 0,
                parent: None,
                cost: Fixed::ZERO,
            })
            .unwrap()
        {
            Outcome::Spawned(id) => id,
            other => panic!("spawn failed: {other:?}"),
        }
    }

    #[test]
    fn test_build_yields_spawn_and_charges() {
        let mut world = world();
        let outcome = world
            .apply_signal(Signal::Build {
                builder: 1,
                kind: SOLDIER,
                direction: Direction::East,
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert_eq!(world.resources(Team::A), Fixed::from_num(290));
        let built = world.store().unit_at(Location::new(1, 0)).unwrap();
        assert_eq!(built.parent, Some(1));
        assert_eq!(world.log().len(), 2);
        assert!(matches!(world.log()[1].outcome, Outcome::Spawned(_)));
    }

    #[test]
    fn test_unaffordable_build_changes_nothing() {
        let mut world = world();
        world.store.team_mut(Team::A).resources = Fixed::from_num(5);
        let before = world.state_hash();
        let outcome = world
            .apply_signal(Signal::Build {
                builder: 1,
                kind: SOLDIER,
                direction: Direction::East,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Rejected(RejectReason::InsufficientResources { .. })
        ));
        assert_eq!(world.state_hash(), before);
    }

    #[test]
    fn test_spawn_on_void_rejected() {
        let mut world = world();
        let outcome = world
            .apply_signal(Signal::Spawn {
                team: Team::A,
                kind: SOLDIER,
                location: Location::new(9, 0),
                build_delay: 0,
                parent: None,
                cost: Fixed::ZERO,
            })
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Rejected(RejectReason::Impassable(Location::new(9, 0)))
        );
    }

    #[test]
    fn test_death_of_missing_unit_matches_never_existing() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        assert_eq!(world.apply_signal(Signal::Death { id }).unwrap(), Outcome::Applied);
        let again = world.apply_signal(Signal::Death { id }).unwrap();
        let never = world.apply_signal(Signal::Death { id: 999 }).unwrap();
        assert_eq!(again, Outcome::Rejected(RejectReason::UnknownUnit(id)));
        assert_eq!(never, Outcome::Rejected(RejectReason::UnknownUnit(999)));
    }

    #[test]
    fn test_movement_relocates_and_interrupts() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        world.store.get_mut(id).unwrap().mining =
            TaskState::start(5, MineWork::Lay(Location::new(3, 3)));
        let outcome = world
            .apply_signal(Signal::Movement {
                id,
                direction: Direction::SouthEast,
            })
            .unwrap();
        assert_eq!(outcome, Outcome::Applied);
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.location, Location::new(4, 4));
        assert_eq!(unit.core_delay, Fixed::from_num(1.4));
        assert!(unit.mining.is_idle());

        let blocked = world
            .apply_signal(Signal::Movement {
                id,
                direction: Direction::North,
            })
            .unwrap();
        assert_eq!(blocked, Outcome::Rejected(RejectReason::Delayed(id)));
    }

    #[test]
    fn test_structures_cannot_move() {
        let mut world = world();
        let outcome = world
            .apply_signal(Signal::Movement {
                id: 1,
                direction: Direction::East,
            })
            .unwrap();
        assert!(matches!(
            outcome,
            Outcome::Rejected(RejectReason::Incapable { action: "move", .. })
        ));
    }

    #[test]
    fn test_divide_among_adjacent_enemies() {
        let mut world = world();
        let attacker = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        let a = spawn(&mut world, Team::B, SOLDIER, Location::new(4, 4));
        let b = spawn(&mut world, Team::B, SOLDIER, Location::new(4, 5));
        let friend = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 4));
        world
            .apply_signal(Signal::Attack {
                attacker,
                target: Location::new(4, 4),
            })
            .unwrap();
        assert_eq!(world.unit(a).unwrap().health, Fixed::from_num(37));
        assert_eq!(world.unit(b).unwrap().health, Fixed::from_num(37));
        assert_eq!(world.unit(friend).unwrap().health, Fixed::from_num(40));
        assert_eq!(world.unit(attacker).unwrap().weapon_delay, Fixed::ONE);
    }

    #[test]
    fn test_splash_hits_friendly_units() {
        let mut world = world();
        let gun = spawn(&mut world, Team::A, ARTILLERY, Location::new(1, 1));
        let enemy = spawn(&mut world, Team::B, SOLDIER, Location::new(4, 4));
        let friend = spawn(&mut world, Team::A, SOLDIER, Location::new(4, 5));
        world
            .apply_signal(Signal::Attack {
                attacker: gun,
                target: Location::new(4, 4),
            })
            .unwrap();
        assert_eq!(world.unit(enemy).unwrap().health, Fixed::from_num(20));
        assert_eq!(world.unit(friend).unwrap().health, Fixed::from_num(30));
    }

    #[test]
    fn test_attack_out_of_range_rejected() {
        let mut world = world();
        let attacker = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        let outcome = world
            .apply_signal(Signal::Attack {
                attacker,
                target: Location::new(6, 6),
            })
            .unwrap();
        assert_eq!(
            outcome,
            Outcome::Rejected(RejectReason::OutOfRange(Location::new(6, 6)))
        );
    }

    #[test]
    fn test_neutral_units_are_immune() {
        let mut world = world();
        let attacker = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        let camp = spawn(&mut world, Team::Neutral, CAMP, Location::new(3, 4));
        world.damage_unit(camp, Fixed::from_num(50), None);
        assert_eq!(world.unit(camp).unwrap().health, Fixed::from_num(100));
        world.damage_unit(attacker, Fixed::from_num(5), None);
        assert_eq!(world.unit(attacker).unwrap().health, Fixed::from_num(35));
    }

    #[test]
    fn test_zombie_infected_death_rises() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        world.store.get_mut(id).unwrap().zombie_infection = 3;
        world.apply_signal(Signal::Death { id }).unwrap();
        let risen = world.store().unit_at(Location::new(3, 3)).unwrap();
        assert_eq!(risen.team, Team::Zombie);
        assert_eq!(risen.kind, ZOMBIE);
        assert!(risen.id > id);
    }

    #[test]
    fn test_leader_death_is_recorded() {
        let mut world = world();
        world.apply_signal(Signal::Death { id: 2 }).unwrap();
        assert!(world.fallen_leaders.contains(&Team::B));
    }

    #[test]
    fn test_encampment_reverts_on_death() {
        let mut world = world();
        let camp = spawn(&mut world, Team::A, CAMP, Location::new(5, 5));
        assert_eq!(world.encampment_owner(Location::new(5, 5)), Some(Team::A));
        world.apply_signal(Signal::Death { id: camp }).unwrap();
        assert_eq!(world.encampment_owner(Location::new(5, 5)), Some(Team::Neutral));
    }

    #[test]
    fn test_capture_completes_after_progress() {
        let mut world = world();
        world.config.capture_rounds = 2;
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(5, 5));
        let begin = world
            .apply_signal(Signal::BeginTask {
                id,
                task: TaskRequest::Capture,
            })
            .unwrap();
        assert_eq!(begin, Outcome::Applied);
        assert_eq!(world.resources(Team::A), Fixed::from_num(290));

        let location = Location::new(5, 5);
        world.apply_signal(Signal::Capture { id, location }).unwrap();
        assert_eq!(world.encampment_owner(location), Some(Team::Neutral));
        world.apply_signal(Signal::Capture { id, location }).unwrap();
        assert_eq!(world.encampment_owner(location), Some(Team::A));
        assert!(world.unit(id).unwrap().capture.is_idle());
    }

    #[test]
    fn test_research_grants_upgrade() {
        let mut world = world();
        world.config.upgrades.insert(
            Upgrade::Fusion,
            crate::config::UpgradeSpec {
                rounds: 2,
                cost: Fixed::ZERO,
            },
        );
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        world
            .apply_signal(Signal::BeginTask {
                id,
                task: TaskRequest::Research(Upgrade::Fusion),
            })
            .unwrap();
        for _ in 0..2 {
            world
                .apply_signal(Signal::Research {
                    id,
                    upgrade: Upgrade::Fusion,
                })
                .unwrap();
        }
        assert!(world.has_upgrade(Team::A, Upgrade::Fusion));
        let again = world
            .apply_signal(Signal::Research {
                id,
                upgrade: Upgrade::Fusion,
            })
            .unwrap();
        assert_eq!(again, Outcome::Rejected(RejectReason::NoTask));
    }

    #[test]
    fn test_mines_lay_and_remove() {
        let mut world = world();
        let here = Location::new(2, 2);
        let lay = Signal::Mine {
            team: Team::A,
            location: here,
            action: MineAction::Lay,
        };
        assert_eq!(world.apply_signal(lay.clone()).unwrap(), Outcome::Applied);
        assert_eq!(world.mine_at(here), Some(Team::A));
        assert_eq!(
            world.apply_signal(lay).unwrap(),
            Outcome::Rejected(RejectReason::MinePresent(here))
        );
        let remove = Signal::Mine {
            team: Team::B,
            location: here,
            action: MineAction::Remove,
        };
        assert_eq!(world.apply_signal(remove).unwrap(), Outcome::Applied);
        assert_eq!(world.mine_count(Team::A), 0);
    }

    #[test]
    fn test_regen_excludes_leaders_and_clamps() {
        let mut world = world();
        let medbay = spawn(&mut world, Team::A, MEDBAY, Location::new(1, 1));
        let soldier = spawn(&mut world, Team::A, SOLDIER, Location::new(2, 2));
        world.store.get_mut(soldier).unwrap().health = Fixed::from_num(38);
        world
            .apply_signal(Signal::Regen {
                source: medbay,
                target: soldier,
                amount: Fixed::from_num(5),
            })
            .unwrap();
        assert_eq!(world.unit(soldier).unwrap().health, Fixed::from_num(40));
        assert!(!world.unit(soldier).unwrap().attacked);

        let on_leader = world
            .apply_signal(Signal::Regen {
                source: medbay,
                target: 1,
                amount: Fixed::from_num(5),
            })
            .unwrap();
        assert!(!on_leader.is_applied());
    }

    #[test]
    fn test_support_needs_living_source_and_target() {
        let mut world = world();
        let medbay = spawn(&mut world, Team::A, MEDBAY, Location::new(1, 1));
        let soldier = spawn(&mut world, Team::A, SOLDIER, Location::new(2, 2));
        let regen = |source, target| Signal::Regen {
            source,
            target,
            amount: Fixed::from_num(5),
        };

        world.store.get_mut(soldier).unwrap().health = Fixed::ZERO;
        assert_eq!(
            world.apply_signal(regen(medbay, soldier)).unwrap(),
            Outcome::Rejected(RejectReason::Dead(soldier))
        );
        assert_eq!(world.unit(soldier).unwrap().health, Fixed::ZERO);

        world.store.get_mut(soldier).unwrap().health = Fixed::from_num(20);
        world.store.get_mut(medbay).unwrap().health = Fixed::ZERO;
        assert_eq!(
            world.apply_signal(regen(medbay, soldier)).unwrap(),
            Outcome::Rejected(RejectReason::Dead(medbay))
        );
        assert_eq!(world.unit(soldier).unwrap().health, Fixed::from_num(20));
    }

    #[test]
    fn test_transform_swaps_kind_and_delays() {
        let mut world = world();
        let id = spawn(&mut world, Team::A, SOLDIER, Location::new(3, 3));
        world
            .apply_signal(Signal::TypeChange { id, kind: TTM })
            .unwrap();
        let unit = world.unit(id).unwrap();
        assert_eq!(unit.kind, TTM);
        assert_eq!(unit.health, Fixed::from_num(30));
        assert_eq!(unit.core_delay, Fixed::from_num(10));
        assert_eq!(unit.weapon_delay, Fixed::from_num(10));

        let illegal = world
            .apply_signal(Signal::TypeChange { id, kind: SOLDIER })
            .unwrap();
        assert!(!illegal.is_applied());
    }

    #[test]
    fn test_team_memory_masked_write() {
        let mut world = world();
        world
            .apply_signal(Signal::TeamMemory {
                team: Team::A,
                index: 4,
                value: 0b1111,
                mask: None,
            })
            .unwrap();
        world
            .apply_signal(Signal::TeamMemory {
                team: Team::A,
                index: 4,
                value: 0,
                mask: Some(0b0101),
            })
            .unwrap();
        assert_eq!(world.team_memory(Team::A).map(|m| m[4]), Some(0b1010));
        let bad = world
            .apply_signal(Signal::TeamMemory {
                team: Team::A,
                index: TEAM_MEMORY_LENGTH,
                value: 1,
                mask: None,
            })
            .unwrap();
        assert_eq!(
            bad,
            Outcome::Rejected(RejectReason::MemoryIndex(TEAM_MEMORY_LENGTH))
        );
    }

    #[test]
    fn test_broadcast_writes_radio() {
        let mut world = world();
        world
            .apply_signal(Signal::Broadcast {
                team: Team::B,
                messages: vec![(3, 30), (4, 40)],
            })
            .unwrap();
        assert_eq!(world.radio(Team::B).and_then(|r| r.read(4)), Some(40));
        assert_eq!(world.radio(Team::A).and_then(|r| r.read(4)), None);
    }
}
