//! CombatMap - The grid a combat is fought on
//!
//! Obstacles and difficult terrain are disjoint sets of cells. Difficult
//! terrain never blocks movement; obstacles always do.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::error::CombatError;
use crate::domain::value_objects::GridPosition;

/// A rectangular battle map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatMap {
    pub name: String,
    pub width: u32,
    pub height: u32,
    obstacles: BTreeSet<GridPosition>,
    difficult_terrain: BTreeSet<GridPosition>,
}

impl CombatMap {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            obstacles: BTreeSet::new(),
            difficult_terrain: BTreeSet::new(),
        }
    }

    pub fn in_bounds(&self, pos: &GridPosition) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && i64::from(pos.x) < i64::from(self.width)
            && i64::from(pos.y) < i64::from(self.height)
    }

    pub fn is_obstacle(&self, pos: &GridPosition) -> bool {
        self.obstacles.contains(pos)
    }

    pub fn is_difficult_terrain(&self, pos: &GridPosition) -> bool {
        self.difficult_terrain.contains(pos)
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &GridPosition> {
        self.obstacles.iter()
    }

    pub fn difficult_terrain(&self) -> impl Iterator<Item = &GridPosition> {
        self.difficult_terrain.iter()
    }

    /// Mark a cell as an obstacle
    ///
    /// Occupancy is checked by the owning combat; this only guards the map's
    /// own invariants.
    pub fn add_obstacle(&mut self, pos: GridPosition) -> Result<bool, CombatError> {
        self.check_cell(&pos)?;
        if self.difficult_terrain.contains(&pos) {
            return Err(CombatError::Validation(format!(
                "{} is already difficult terrain",
                pos
            )));
        }
        Ok(self.obstacles.insert(pos))
    }

    pub fn add_difficult_terrain(&mut self, pos: GridPosition) -> Result<bool, CombatError> {
        self.check_cell(&pos)?;
        if self.obstacles.contains(&pos) {
            return Err(CombatError::Validation(format!("{} is already an obstacle", pos)));
        }
        Ok(self.difficult_terrain.insert(pos))
    }

    pub fn remove_obstacle(&mut self, pos: &GridPosition) -> bool {
        self.obstacles.remove(pos)
    }

    pub fn remove_difficult_terrain(&mut self, pos: &GridPosition) -> bool {
        self.difficult_terrain.remove(pos)
    }

    fn check_cell(&self, pos: &GridPosition) -> Result<(), CombatError> {
        if self.in_bounds(pos) {
            Ok(())
        } else {
            Err(CombatError::Validation(format!(
                "{} is outside the {}x{} map",
                pos, self.width, self.height
            )))
        }
    }
}

impl Default for CombatMap {
    fn default() -> Self {
        Self::new("Battlefield", 20, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        let map = CombatMap::new("Arena", 10, 8);
        assert!(map.in_bounds(&GridPosition::new(0, 0)));
        assert!(map.in_bounds(&GridPosition::new(9, 7)));
        assert!(!map.in_bounds(&GridPosition::new(10, 0)));
        assert!(!map.in_bounds(&GridPosition::new(0, 8)));
        assert!(!map.in_bounds(&GridPosition::new(-1, 3)));
    }

    #[test]
    fn test_obstacle_and_difficult_terrain_stay_disjoint() {
        let mut map = CombatMap::new("Swamp", 10, 10);
        let cell = GridPosition::new(3, 3);

        assert_eq!(map.add_obstacle(cell), Ok(true));
        assert_eq!(map.add_obstacle(cell), Ok(false));
        assert!(map.add_difficult_terrain(cell).is_err());

        assert!(map.remove_obstacle(&cell));
        assert_eq!(map.add_difficult_terrain(cell), Ok(true));
        assert!(map.add_obstacle(cell).is_err());
        assert!(map.is_difficult_terrain(&cell));
        assert!(!map.is_obstacle(&cell));
    }

    #[test]
    fn test_out_of_bounds_features_are_rejected() {
        let mut map = CombatMap::new("Tiny", 2, 2);
        assert!(map.add_obstacle(GridPosition::new(5, 5)).is_err());
        assert!(map.add_difficult_terrain(GridPosition::new(-1, 0)).is_err());
    }
}
