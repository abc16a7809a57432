//! Team identifiers.

use serde::{Deserialize, Serialize};

/// The fixed set of sides in a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Team {
    /// First competing player.
    A,
    /// Second competing player.
    B,
    /// Unowned map features and inert units.
    Neutral,
    /// Non-player hostile faction.
    Zombie,
}

impl Team {
    /// The two competing teams, in tie-break order.
    pub const PLAYERS: [Self; 2] = [Self::A, Self::B];

    /// Every team.
    pub const ALL: [Self; 4] = [Self::A, Self::B, Self::Neutral, Self::Zombie];

    /// The competing opponent, if this is a player team.
    #[must_use]
    pub const fn opponent(self) -> Option<Self> {
        match self {
            Self::A => Some(Self::B),
            Self::B => Some(Self::A),
            Self::Neutral | Self::Zombie => None,
        }
    }

    /// True for the two competing teams.
    #[must_use]
    pub const fn is_player(self) -> bool {
        matches!(self, Self::A | Self::B)
    }

    /// Dense index for per-player arrays (`A` = 0, `B` = 1).
    #[must_use]
    pub const fn player_index(self) -> Option<usize> {
        match self {
            Self::A => Some(0),
            Self::B => Some(1),
            Self::Neutral | Self::Zombie => None,
        }
    }
}

impl std::fmt::Display for Team {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::A => "A",
            Self::B => "B",
            Self::Neutral => "NEUTRAL",
            Self::Zombie => "ZOMBIE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponents() {
        assert_eq!(Team::A.opponent(), Some(Team::B));
        assert_eq!(Team::B.opponent(), Some(Team::A));
        assert_eq!(Team::Zombie.opponent(), None);
        assert!(!Team::Neutral.is_player());
    }
}
