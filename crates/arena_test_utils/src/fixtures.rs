//! Test fixtures and helpers.
//!
//! A standard kind table, a few ready-made maps and helpers for building
//! worlds and matches from them, for consistent testing.

use arena_core::config::{GameConfig, TEAM_MEMORY_LENGTH};
use arena_core::control::ControlProvider;
use arena_core::kind::{
    DamageRule, InfectionKind, InfectionRule, KindId, KindTable, SpawnRule, SupportRule, UnitKind,
};
use arena_core::map::GameMap;
use arena_core::math::Location;
use arena_core::scheduler::Match;
use arena_core::team::Team;
use arena_core::world::{TeamMemory, World};
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Headquarters: each team's leader.
pub const HQ: KindId = KindId(1);
/// Basic mobile fighter.
pub const SOLDIER: KindId = KindId(2);
/// Long-range splash encampment.
pub const ARTILLERY: KindId = KindId(3);
/// Healing encampment.
pub const MEDBAY: KindId = KindId(4);
/// Shield-granting encampment.
pub const SHIELDS: KindId = KindId(5);
/// Hostile walker.
pub const ZOMBIE: KindId = KindId(6);
/// Hostile spawner.
pub const DEN: KindId = KindId(7);
/// Hostile poisoner.
pub const VIPER: KindId = KindId(8);

/// Blank memory for both teams.
pub const NO_MEMORY: [TeamMemory; 2] = [[0; TEAM_MEMORY_LENGTH]; 2];

/// The kind table most tests play with.
#[must_use]
pub fn standard_kinds() -> KindTable {
    let hq = UnitKind {
        is_leader: true,
        is_structure: true,
        can_research: true,
        sensor_radius_squared: 14,
        builds: vec![SOLDIER],
        ..UnitKind::new(HQ, "hq", fixed(500)).with_budget(10_000)
    };
    let soldier = UnitKind {
        is_buildable: true,
        build_turns: 10,
        can_mine: true,
        can_capture: true,
        sensor_radius_squared: 14,
        zombie_form: Some(ZOMBIE),
        loading_delay: fixed(1),
        ..UnitKind::new(SOLDIER, "soldier", fixed(40))
            .with_attack(fixed(6), 2, fixed(1))
            .with_movement(fixed(1))
            .with_budget(10_000)
            .with_cost(fixed(10))
    };
    let artillery = UnitKind {
        is_structure: true,
        is_encampment: true,
        sensor_radius_squared: 63,
        damage_rule: DamageRule::Splash {
            ratio: fixed_f(0.3),
        },
        ..UnitKind::new(ARTILLERY, "artillery", fixed(100))
            .with_attack(fixed(40), 63, fixed(20))
            .with_budget(10_000)
    };
    let medbay = UnitKind {
        is_structure: true,
        is_encampment: true,
        support: Some(SupportRule::Regen {
            amount: fixed(2),
            radius_squared: 9,
        }),
        ..UnitKind::new(MEDBAY, "medbay", fixed(100))
    };
    let shields = UnitKind {
        is_structure: true,
        is_encampment: true,
        support: Some(SupportRule::Shield {
            amount: fixed(5),
            radius_squared: 9,
        }),
        ..UnitKind::new(SHIELDS, "shields", fixed(100))
    };
    let zombie = UnitKind {
        is_hostile: true,
        sensor_radius_squared: 24,
        infects: Some(InfectionRule {
            kind: InfectionKind::Zombie,
            turns: 10,
        }),
        ..UnitKind::new(ZOMBIE, "zombie", fixed(30))
            .with_attack(fixed(3), 2, fixed(1))
            .with_movement(fixed(2))
            .with_budget(2_000)
    };
    let den = UnitKind {
        is_hostile: true,
        is_structure: true,
        spawns: Some(SpawnRule {
            kind: ZOMBIE,
            every_rounds: 20,
        }),
        ..UnitKind::new(DEN, "den", fixed(200))
    };
    let viper = UnitKind {
        is_hostile: true,
        sensor_radius_squared: 24,
        infects: Some(InfectionRule {
            kind: InfectionKind::Viper,
            turns: 5,
        }),
        ..UnitKind::new(VIPER, "viper", fixed(20))
            .with_attack(fixed(2), 2, fixed(1))
            .with_movement(fixed(1))
            .with_budget(2_000)
    };

    match KindTable::new([hq, soldier, artillery, medbay, shields, zombie, den, viper]) {
        Ok(table) => table,
        Err(e) => panic!("standard kind table is invalid: {e}"),
    }
}

/// A 20x20 open map with one HQ per team in opposite corners and three
/// encampment sites down the diagonal.
#[must_use]
pub fn duel_map() -> GameMap {
    GameMap {
        round_limit: Some(200),
        encampments: vec![
            Location::new(6, 6),
            Location::new(10, 10),
            Location::new(13, 13),
        ],
        ..GameMap::open(20, 20, 7)
            .with_unit(Team::A, HQ, Location::new(2, 2))
            .with_unit(Team::B, HQ, Location::new(17, 17))
    }
}

/// Build a world, panicking on invalid input.
#[must_use]
pub fn world_from(map: GameMap, kinds: KindTable) -> World {
    world_with_config(map, kinds, GameConfig::default())
}

/// Build a world with a custom config, panicking on invalid input.
#[must_use]
pub fn world_with_config(map: GameMap, kinds: KindTable, config: GameConfig) -> World {
    match World::new(map, kinds, config, NO_MEMORY) {
        Ok(world) => world,
        Err(e) => panic!("fixture world is invalid: {e}"),
    }
}

/// The duel map with the standard kinds.
#[must_use]
pub fn standard_world() -> World {
    world_from(duel_map(), standard_kinds())
}

/// Two identical fighters facing each other, no leaders.
///
/// IDs are 1 (team A) and 2 (team B).
#[must_use]
pub fn mirror_duel(health: i32, power: i32) -> World {
    let fighter = UnitKind {
        sensor_radius_squared: 4,
        ..UnitKind::new(KindId(1), "fighter", fixed(health))
            .with_attack(fixed(power), 2, fixed(1))
            .with_budget(10_000)
    };
    let kinds = match KindTable::new([fighter]) {
        Ok(table) => table,
        Err(e) => panic!("duel kinds are invalid: {e}"),
    };
    let map = GameMap {
        round_limit: Some(100),
        ..GameMap::open(4, 1, 1)
            .with_unit(Team::A, KindId(1), Location::new(1, 0))
            .with_unit(Team::B, KindId(1), Location::new(2, 0))
    };
    world_from(map, kinds)
}

/// Wrap a world in a match.
#[must_use]
pub fn match_from(world: World, controller: impl ControlProvider + Send + 'static) -> Match {
    Match::new(world, Box::new(controller))
}
