// src/models/level.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Inclusive lattice bounds. Levels run 1..=7, sublevels 1..=3.
pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 7;
pub const MIN_SUBLEVEL: u8 = 1;
pub const MAX_SUBLEVEL: u8 = 3;

/// Two-axis difficulty coordinate for one section.
///
/// Ordered level-major, sublevel-minor (2.1 < 2.2 < 2.3 < 3.1).
/// Serialized as a dotted string ("2.1") for storage and transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelState {
    pub level: u8,
    pub sublevel: u8,
}

/// Direction of a single lattice step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Error for a level string or pair that falls outside the lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLevelState(pub String);

impl fmt::Display for InvalidLevelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid level state: {}", self.0)
    }
}

impl std::error::Error for InvalidLevelState {}

impl LevelState {
    /// Lowest lattice point, 1.1.
    pub const MIN: LevelState = LevelState { level: MIN_LEVEL, sublevel: MIN_SUBLEVEL };
    /// Highest lattice point, 7.3.
    pub const MAX: LevelState = LevelState { level: MAX_LEVEL, sublevel: MAX_SUBLEVEL };

    /// Validating constructor. Rejects coordinates outside `[1.1, 7.3]`.
    pub fn new(level: u8, sublevel: u8) -> Result<Self, InvalidLevelState> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level)
            || !(MIN_SUBLEVEL..=MAX_SUBLEVEL).contains(&sublevel)
        {
            return Err(InvalidLevelState(format!("{}.{}", level, sublevel)));
        }
        Ok(Self { level, sublevel })
    }

    /// Flattens the coordinate for comparisons and clamping.
    pub fn to_ordinal(self) -> i32 {
        self.level as i32 * 3 + (self.sublevel as i32 - 1)
    }

    /// Inverse of `to_ordinal`, clamped to the lattice bounds.
    pub fn from_ordinal(n: i32) -> Self {
        let n = n.clamp(Self::MIN.to_ordinal(), Self::MAX.to_ordinal());
        Self {
            level: (n / 3) as u8,
            sublevel: (n % 3 + 1) as u8,
        }
    }

    /// Moves one sublevel step, rolling into the adjacent level at the
    /// sublevel boundary. Saturates at the lattice edges.
    pub fn step(self, direction: Direction) -> Self {
        match direction {
            Direction::Up => self.shift_by(1),
            Direction::Down => self.shift_by(-1),
        }
    }

    /// Applies `delta` single-step moves (positive = up), saturating.
    pub fn shift_by(self, delta: i32) -> Self {
        Self::from_ordinal(self.to_ordinal() + delta)
    }

    /// Numeric value used by the finalizer's weighted average, e.g. 2.1.
    pub fn as_value(self) -> f64 {
        self.level as f64 + self.sublevel as f64 / 10.0
    }
}

impl fmt::Display for LevelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.level, self.sublevel)
    }
}

impl FromStr for LevelState {
    type Err = InvalidLevelState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (level, sublevel) = s
            .split_once('.')
            .ok_or_else(|| InvalidLevelState(s.to_string()))?;
        let level: u8 = level.parse().map_err(|_| InvalidLevelState(s.to_string()))?;
        let sublevel: u8 = sublevel
            .parse()
            .map_err(|_| InvalidLevelState(s.to_string()))?;
        Self::new(level, sublevel)
    }
}

impl Serialize for LevelState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LevelState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinal_round_trips_across_the_lattice() {
        for level in MIN_LEVEL..=MAX_LEVEL {
            for sublevel in MIN_SUBLEVEL..=MAX_SUBLEVEL {
                let state = LevelState::new(level, sublevel).unwrap();
                assert_eq!(LevelState::from_ordinal(state.to_ordinal()), state);
            }
        }
    }

    #[test]
    fn ordering_is_level_major() {
        let a: LevelState = "2.3".parse().unwrap();
        let b: LevelState = "3.1".parse().unwrap();
        assert!(a < b);
        assert!("2.1".parse::<LevelState>().unwrap() < "2.2".parse().unwrap());
    }

    #[test]
    fn step_up_then_down_round_trips_except_at_edges() {
        for level in MIN_LEVEL..=MAX_LEVEL {
            for sublevel in MIN_SUBLEVEL..=MAX_SUBLEVEL {
                let state = LevelState::new(level, sublevel).unwrap();
                let round_trip = state.step(Direction::Up).step(Direction::Down);
                if state == LevelState::MAX {
                    // Saturated at the top: the up-step was a no-op.
                    assert_eq!(round_trip, state.step(Direction::Down));
                } else {
                    assert_eq!(round_trip, state);
                }
            }
        }
    }

    #[test]
    fn step_rolls_over_sublevel_boundaries() {
        let state: LevelState = "2.3".parse().unwrap();
        assert_eq!(state.step(Direction::Up).to_string(), "3.1");
        let state: LevelState = "3.1".parse().unwrap();
        assert_eq!(state.step(Direction::Down).to_string(), "2.3");
    }

    #[test]
    fn shift_saturates_at_lattice_edges() {
        assert_eq!(LevelState::MIN.shift_by(-5), LevelState::MIN);
        assert_eq!(LevelState::MAX.shift_by(10), LevelState::MAX);
        assert_eq!(LevelState::MIN.shift_by(2).to_string(), "1.3");
    }

    #[test]
    fn parse_round_trips_all_well_formed_seeds() {
        for level in 1..=7 {
            for sublevel in 1..=3 {
                let seed = format!("{}.{}", level, sublevel);
                let parsed: LevelState = seed.parse().unwrap();
                assert_eq!(parsed.to_string(), seed);
            }
        }
    }

    #[test]
    fn parse_rejects_malformed_and_out_of_range() {
        assert!("".parse::<LevelState>().is_err());
        assert!("2".parse::<LevelState>().is_err());
        assert!("0.1".parse::<LevelState>().is_err());
        assert!("8.1".parse::<LevelState>().is_err());
        assert!("2.4".parse::<LevelState>().is_err());
        assert!("a.b".parse::<LevelState>().is_err());
    }

    #[test]
    fn serde_uses_dotted_strings() {
        let state: LevelState = "4.2".parse().unwrap();
        assert_eq!(serde_json::to_string(&state).unwrap(), "\"4.2\"");
        let back: LevelState = serde_json::from_str("\"4.2\"").unwrap();
        assert_eq!(back, state);
    }
}
