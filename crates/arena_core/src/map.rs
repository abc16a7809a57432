//! Static map description.
//!
//! A [`GameMap`] is read once when the world is built and never mutated.
//!
//! ```ron
//! GameMap(
//!     width: 20,
//!     height: 20,
//!     seed: 7,
//!     round_limit: Some(500),
//!     void: [(x: 10, y: 10)],
//!     encampments: [(x: 5, y: 5)],
//!     units: [
//!         (team: A, kind: KindId(1), location: (x: 1, y: 1)),
//!         (team: B, kind: KindId(1), location: (x: 18, y: 18)),
//!     ],
//! )
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};
use crate::kind::{KindId, KindTable};
use crate::math::Location;
use crate::team::Team;

/// Terrain of a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Walkable ground.
    Land,
    /// Impassable.
    Void,
}

/// A unit placed on the map before round one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialUnit {
    /// Owner.
    pub team: Team,
    /// Kind.
    pub kind: KindId,
    /// Placement.
    pub location: Location,
}

/// Terrain, initial placement and match parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameMap {
    /// Columns.
    pub width: i32,
    /// Rows.
    pub height: i32,
    /// Seed for the match generator.
    #[serde(default)]
    pub seed: u32,
    /// Overrides the configured round limit.
    #[serde(default)]
    pub round_limit: Option<u32>,
    /// Impassable cells. Everything else is land.
    #[serde(default)]
    pub void: BTreeSet<Location>,
    /// Capturable encampment sites.
    #[serde(default)]
    pub encampments: Vec<Location>,
    /// Units present at round zero, spawned in list order.
    #[serde(default)]
    pub units: Vec<InitialUnit>,
}

impl GameMap {
    /// An open map with no units.
    #[must_use]
    pub fn open(width: i32, height: i32, seed: u32) -> Self {
        Self {
            width,
            height,
            seed,
            round_limit: None,
            void: BTreeSet::new(),
            encampments: Vec::new(),
            units: Vec::new(),
        }
    }

    /// Add an initial unit.
    #[must_use]
    pub fn with_unit(mut self, team: Team, kind: KindId, location: Location) -> Self {
        self.units.push(InitialUnit {
            team,
            kind,
            location,
        });
        self
    }

    /// Parse a map from RON.
    pub fn from_ron(source: &str) -> Result<Self> {
        ron::from_str(source).map_err(|e| GameError::DataParseError {
            path: "<map>".to_string(),
            message: e.to_string(),
        })
    }

    /// True if `location` lies inside the map bounds.
    #[must_use]
    pub const fn on_map(&self, location: Location) -> bool {
        location.x >= 0 && location.y >= 0 && location.x < self.width && location.y < self.height
    }

    /// Terrain at `location`. Off-map cells read as void.
    #[must_use]
    pub fn terrain(&self, location: Location) -> Terrain {
        if !self.on_map(location) || self.void.contains(&location) {
            Terrain::Void
        } else {
            Terrain::Land
        }
    }

    /// True if `location` is on the map and land.
    #[must_use]
    pub fn is_passable(&self, location: Location) -> bool {
        self.terrain(location) == Terrain::Land
    }

    /// Check the map against a kind table.
    pub fn validate(&self, kinds: &KindTable) -> Result<()> {
        if self.width <= 0 || self.height <= 0 {
            return Err(GameError::InvalidMap(format!(
                "dimensions {}x{} must be positive",
                self.width, self.height
            )));
        }
        let mut occupied = BTreeSet::new();
        for unit in &self.units {
            if !self.is_passable(unit.location) {
                return Err(GameError::InvalidMap(format!(
                    "unit placed on impassable {}",
                    unit.location
                )));
            }
            if !occupied.insert(unit.location) {
                return Err(GameError::InvalidMap(format!(
                    "two units placed at {}",
                    unit.location
                )));
            }
            kinds.require(unit.kind)?;
        }
        for site in &self.encampments {
            if !self.is_passable(*site) {
                return Err(GameError::InvalidMap(format!(
                    "encampment on impassable {site}"
                )));
            }
        }
        for team in Team::PLAYERS {
            let leaders = self
                .units
                .iter()
                .filter(|u| u.team == team)
                .filter(|u| kinds.get(u.kind).is_some_and(|k| k.is_leader))
                .count();
            if leaders > 1 {
                return Err(GameError::InvalidMap(format!(
                    "team {team} has {leaders} leaders"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::UnitKind;
    use crate::math::Fixed;

    fn kinds() -> KindTable {
        KindTable::new([UnitKind::new(KindId(1), "hq", Fixed::from_num(500))]).unwrap()
    }

    #[test]
    fn test_parse_map() {
        let map = GameMap::from_ron(
            "GameMap(width: 4, height: 3, void: [(x: 1, y: 1)], \
             units: [(team: A, kind: KindId(1), location: (x: 0, y: 0))])",
        )
        .unwrap();
        assert_eq!(map.width, 4);
        assert_eq!(map.terrain(Location::new(1, 1)), Terrain::Void);
        assert!(map.is_passable(Location::new(0, 1)));
        assert!(!map.is_passable(Location::new(4, 0)));
        assert!(map.validate(&kinds()).is_ok());
    }

    #[test]
    fn test_duplicate_placement_rejected() {
        let map = GameMap::open(5, 5, 0)
            .with_unit(Team::A, KindId(1), Location::new(2, 2))
            .with_unit(Team::B, KindId(1), Location::new(2, 2));
        assert!(matches!(map.validate(&kinds()), Err(GameError::InvalidMap(_))));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let map = GameMap::open(5, 5, 0).with_unit(Team::A, KindId(9), Location::new(0, 0));
        assert!(matches!(map.validate(&kinds()), Err(GameError::UnknownKind(_))));
    }
}
