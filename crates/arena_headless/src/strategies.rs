//! Built-in demo strategies for the headless runner.
//!
//! Each strategy is a pair of simple agents: one for the team's leader
//! structure and one for everything it builds. They are intentionally
//! predictable so scenario runs make good regression fixtures.

use serde::{Deserialize, Serialize};

use arena_core::prelude::*;

/// Strategy preset for one player team.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum Strategy {
    /// Never acts.
    #[default]
    Idle,
    /// Builds constantly and marches every unit at the enemy leader.
    Rush,
    /// Researches first, then holds encampments and defends the base.
    Turtle,
}

impl Strategy {
    /// Every preset.
    pub const ALL: [Self; 3] = [Self::Idle, Self::Rush, Self::Turtle];

    /// Preset name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rush => "rush",
            Self::Turtle => "turtle",
        }
    }

    /// Look a preset up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name().eq_ignore_ascii_case(name))
    }

    /// Agent factory playing this preset.
    #[must_use]
    pub const fn factory(self) -> StrategyFactory {
        StrategyFactory { strategy: self }
    }
}

/// Creates the agents of one [`Strategy`].
#[derive(Debug, Clone, Copy)]
pub struct StrategyFactory {
    strategy: Strategy,
}

impl AgentFactory for StrategyFactory {
    fn create(&mut self, _unit: &Unit, kind: &UnitKind) -> Box<dyn Agent> {
        match (self.strategy, kind.is_leader) {
            (Strategy::Idle, _) => Box::new(IdleAgent),
            (Strategy::Rush, true) => Box::new(Base { research_first: None }),
            (Strategy::Turtle, true) => Box::new(Base {
                research_first: Some(Upgrade::Fusion),
            }),
            (Strategy::Rush, false) => Box::new(Raider),
            (Strategy::Turtle, false) => Box::new(Guard),
        }
    }
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleAgent;

impl Agent for IdleAgent {
    fn run_turn(&mut self, _ctx: &mut TurnContext<'_>) -> std::result::Result<(), TurnError> {
        Ok(())
    }
}

/// Leader behaviour: optionally research one upgrade, then build the first
/// affordable kind toward the enemy.
#[derive(Debug, Clone, Copy)]
struct Base {
    research_first: Option<Upgrade>,
}

impl Agent for Base {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> std::result::Result<(), TurnError> {
        let view = ctx.view()?;
        let me = ctx.me();

        if let Some(upgrade) = self.research_first {
            if !view.has_upgrade(upgrade) {
                if me.research.is_idle() && ctx.kind().can_research {
                    ctx.research(upgrade)?;
                }
                return Ok(());
            }
        }

        if !me.core_ready() {
            return Ok(());
        }
        let Some(kind) = ctx
            .kind()
            .builds
            .iter()
            .filter_map(|id| view.kind(*id))
            .find(|kind| kind.cost <= view.resources())
        else {
            return Ok(());
        };

        let enemy = me.team.opponent().and_then(|team| view.leader_location(team));
        let facing = enemy
            .and_then(|target| me.location.direction_to(target))
            .unwrap_or(Direction::North);
        let mut direction = facing;
        for _ in 0..8 {
            if view.is_free(me.location.add(direction)) {
                return ctx.build(kind.id, direction);
            }
            direction = direction.rotate_right();
        }
        Ok(())
    }
}

/// Nearest sensed enemy within attack range, ties to the lowest ID.
fn target_in_range(
    ctx: &mut TurnContext<'_>,
) -> std::result::Result<Option<Location>, TurnError> {
    let me = ctx.me();
    let kind = ctx.kind();
    let here = me.location;
    Ok(ctx
        .sense_nearby()?
        .into_iter()
        .filter(|unit| unit.team != me.team && unit.team != Team::Neutral)
        .filter(|unit| kind.in_attack_range(here.distance_squared(unit.location)))
        .min_by_key(|unit| (here.distance_squared(unit.location), unit.id))
        .map(|unit| unit.location))
}

/// Step toward `target`, sidestepping one turn either way if blocked.
fn advance(
    ctx: &mut TurnContext<'_>,
    target: Location,
) -> std::result::Result<(), TurnError> {
    let Some(direct) = ctx.me().location.direction_to(target) else {
        return Ok(());
    };
    for direction in [direct, direct.rotate_left(), direct.rotate_right()] {
        if ctx.can_move(direction)? {
            return ctx.move_to(direction);
        }
    }
    Ok(())
}

/// Attacks whatever is in range, otherwise walks at the enemy leader.
#[derive(Debug, Clone, Copy)]
struct Raider;

impl Agent for Raider {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> std::result::Result<(), TurnError> {
        if let Some(target) = target_in_range(ctx)? {
            if ctx.can_attack(target)? {
                return ctx.attack(target);
            }
            return Ok(());
        }
        let Some(opponent) = ctx.me().team.opponent() else {
            return Ok(());
        };
        match ctx.sense_leader(opponent)? {
            Some(leader) => advance(ctx, leader),
            None => Ok(()),
        }
    }
}

/// Captures the closest unowned encampment site, otherwise stays near the
/// home leader and shoots anything that comes close.
#[derive(Debug, Clone, Copy)]
struct Guard;

impl Guard {
    fn open_site(view: WorldView<'_>, here: Location) -> Option<Location> {
        let team = view.me().team;
        view.encampments()
            .into_iter()
            .filter(|(site, owner)| *owner != team && (view.is_free(*site) || *site == here))
            .map(|(site, _)| site)
            .min_by_key(|site| (here.distance_squared(*site), *site))
    }
}

impl Agent for Guard {
    fn run_turn(&mut self, ctx: &mut TurnContext<'_>) -> std::result::Result<(), TurnError> {
        if let Some(target) = target_in_range(ctx)? {
            if ctx.can_attack(target)? {
                ctx.attack(target)?;
            }
        }

        let me = ctx.me();
        if !me.capture.is_idle() {
            return Ok(());
        }
        let view = ctx.view()?;
        if let Some(site) = Self::open_site(view, me.location) {
            if site == me.location {
                if ctx.kind().can_capture && view.resources() >= view.config().capture_cost {
                    return ctx.capture();
                }
                return Ok(());
            }
            return advance(ctx, site);
        }

        match ctx.sense_leader(me.team)? {
            Some(home) if me.location.distance_squared(home) > 8 => advance(ctx, home),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::kinds::{HQ, SOLDIER};
    use crate::scenario::Scenario;

    fn world() -> World {
        Scenario::skirmish()
            .build_world([[0; TEAM_MEMORY_LENGTH]; 2])
            .unwrap()
    }

    fn turn(agent: &mut dyn Agent, world: &World, id: UnitId) -> Vec<Signal> {
        let unit = world.unit(id).unwrap();
        let kind = world.kind_of(unit).unwrap();
        let mut ctx = TurnContext::new(world, unit, kind, 10_000);
        agent.run_turn(&mut ctx).unwrap();
        ctx.finish().signals
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Strategy::from_name("RUSH"), Some(Strategy::Rush));
        assert_eq!(Strategy::from_name("turtle"), Some(Strategy::Turtle));
        assert_eq!(Strategy::from_name("zerg"), None);
    }

    #[test]
    fn test_rush_base_builds_toward_enemy() {
        let world = world();
        let mut base = Base { research_first: None };
        let signals = turn(&mut base, &world, 1);
        assert_eq!(
            signals,
            vec![Signal::Build {
                builder: 1,
                kind: SOLDIER,
                direction: Direction::SouthEast,
            }]
        );
    }

    #[test]
    fn test_turtle_base_researches_first() {
        let world = world();
        let mut base = Base {
            research_first: Some(Upgrade::Fusion),
        };
        let signals = turn(&mut base, &world, 1);
        assert!(matches!(
            signals.as_slice(),
            [Signal::BeginTask {
                id: 1,
                task: TaskRequest::Research(Upgrade::Fusion)
            }]
        ));
    }

    #[test]
    fn test_idle_strategy_creates_idle_agents() {
        let world = world();
        let hq = world.unit(1).unwrap();
        let mut factory = Strategy::Idle.factory();
        let mut agent = factory.create(hq, world.kind_of(hq).unwrap());
        assert!(turn(agent.as_mut(), &world, 1).is_empty());
        assert_eq!(world.kind_of(hq).unwrap().id, HQ);
    }
}
