//! Grid coordinates on a battle map

use serde::{Deserialize, Serialize};

/// A cell on the combat grid. Equality is structural.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 8-directional grid distance: max(|dx|, |dy|)
    pub fn chebyshev_distance(&self, other: &GridPosition) -> u32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        u32::try_from(dx.max(dy)).unwrap_or(u32::MAX)
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for GridPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chebyshev_distance_counts_diagonals_as_one() {
        let origin = GridPosition::new(0, 0);
        assert_eq!(origin.chebyshev_distance(&GridPosition::new(3, 3)), 3);
        assert_eq!(origin.chebyshev_distance(&GridPosition::new(6, 0)), 6);
        assert_eq!(origin.chebyshev_distance(&GridPosition::new(-2, 5)), 5);
        assert_eq!(origin.chebyshev_distance(&origin), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(GridPosition::new(4, -1).to_string(), "(4, -1)");
    }
}
