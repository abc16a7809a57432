//! Fixed-point math and grid geometry for deterministic simulation.
//!
//! Every fractional quantity in the simulation (health, delays, resources)
//! is a [`Fixed`] value. Floating-point results can differ between CPUs,
//! which would break replays, so the core never touches `f32`/`f64`.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Serde support for fixed-point numbers written as decimal literals.
///
/// Used by hand-authored RON data (kind tables, configs) where
/// `attack_power: 2.5` reads better than raw bits.
pub mod fixed_decimal {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as a decimal number.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize from a decimal number, rounding to the nearest fixed value.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed range")))
    }
}

/// Computes the square root of a non-negative fixed-point number using
/// binary search. Negative inputs yield zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = low + (high - low) / 2;
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// `value^1.5`, computed as `value * sqrt(value)`.
#[must_use]
pub fn fixed_pow_three_halves(value: Fixed) -> Fixed {
    value.saturating_mul(fixed_sqrt(value))
}

/// Clamp a fixed value into `[min, max]`.
#[must_use]
pub fn clamp_fixed(value: Fixed, min: Fixed, max: Fixed) -> Fixed {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Integer grid coordinate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Location {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Location {
    /// Create a new location.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance, used for every range check.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Location one step away in `direction`.
    #[must_use]
    pub const fn add(self, direction: Direction) -> Self {
        let (dx, dy) = direction.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Location shifted by an arbitrary offset.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// True if `other` is one of the eight neighbours.
    #[must_use]
    pub const fn is_adjacent_to(self, other: Self) -> bool {
        let d = self.distance_squared(other);
        d == 1 || d == 2
    }

    /// Direction of the single step from `self` toward `target`, or `None`
    /// when they coincide.
    #[must_use]
    pub fn direction_to(self, target: Self) -> Option<Direction> {
        let dx = (target.x - self.x).signum();
        let dy = (target.y - self.y).signum();
        Direction::ALL
            .into_iter()
            .find(|direction| direction.offset() == (dx, dy))
    }

    /// All eight neighbours, starting north and rotating clockwise.
    #[must_use]
    pub fn neighbours(self) -> [Self; 8] {
        Direction::ALL.map(|direction| self.add(direction))
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Compass direction on the grid. `y` grows southward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// (0, -1)
    North,
    /// (1, -1)
    NorthEast,
    /// (1, 0)
    East,
    /// (1, 1)
    SouthEast,
    /// (0, 1)
    South,
    /// (-1, 1)
    SouthWest,
    /// (-1, 0)
    West,
    /// (-1, -1)
    NorthWest,
}

impl Direction {
    /// Every direction in clockwise order starting from north.
    pub const ALL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// Unit offset `(dx, dy)`.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// True for the four diagonal directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }

    /// Rotate 45 degrees counter-clockwise.
    #[must_use]
    pub const fn rotate_left(self) -> Self {
        Self::ALL[(self as usize + 7) % 8]
    }

    /// Rotate 45 degrees clockwise.
    #[must_use]
    pub const fn rotate_right(self) -> Self {
        Self::ALL[(self as usize + 1) % 8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_of_perfect_squares() {
        assert_eq!(fixed_sqrt(Fixed::from_num(16)).round(), Fixed::from_num(4));
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_pow_three_halves_bounds() {
        assert_eq!(fixed_pow_three_halves(Fixed::ZERO), Fixed::ZERO);
        let one = fixed_pow_three_halves(Fixed::ONE);
        assert!((one - Fixed::ONE).abs() < Fixed::from_num(0.0001));
        // 0.25^1.5 = 0.125
        let quarter = fixed_pow_three_halves(Fixed::from_num(0.25));
        assert!((quarter - Fixed::from_num(0.125)).abs() < Fixed::from_num(0.0001));
    }

    #[test]
    fn test_distance_squared() {
        let a = Location::new(1, 2);
        let b = Location::new(4, 6);
        assert_eq!(a.distance_squared(b), 25);
        assert_eq!(b.distance_squared(a), 25);
    }

    #[test]
    fn test_adjacency() {
        let origin = Location::new(5, 5);
        for neighbour in origin.neighbours() {
            assert!(origin.is_adjacent_to(neighbour));
        }
        assert!(!origin.is_adjacent_to(origin));
        assert!(!origin.is_adjacent_to(Location::new(7, 5)));
    }

    #[test]
    fn test_direction_rotation_cycles() {
        let mut dir = Direction::North;
        for _ in 0..8 {
            dir = dir.rotate_left();
        }
        assert_eq!(dir, Direction::North);
        assert_eq!(Direction::North.rotate_right(), Direction::NorthEast);
        assert_eq!(Direction::North.rotate_left(), Direction::NorthWest);
    }

    #[test]
    fn test_direction_to() {
        let a = Location::new(0, 0);
        assert_eq!(a.direction_to(Location::new(5, 5)), Some(Direction::SouthEast));
        assert_eq!(a.direction_to(Location::new(0, -3)), Some(Direction::North));
        assert_eq!(a.direction_to(a), None);
    }
}
