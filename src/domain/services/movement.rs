//! Movement rules - Straight-line reachability on the combat grid
//!
//! No pathfinding: a destination is reachable when it is in bounds, is not an
//! obstacle, is not held by another living combatant, and lies within the
//! mover's allowance measured in Chebyshev distance.

use crate::domain::entities::{CombatEntity, CombatMap};
use crate::domain::error::{CombatError, MoveRejection};
use crate::domain::value_objects::{CombatSettings, GridPosition};

/// Grid movement tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementRules {
    pub feet_per_cell: u32,
    pub default_speed_feet: u32,
    /// Count a difficult-terrain destination as double distance
    pub difficult_terrain_doubles_cost: bool,
}

impl Default for MovementRules {
    fn default() -> Self {
        Self {
            feet_per_cell: 5,
            default_speed_feet: 30,
            difficult_terrain_doubles_cost: false,
        }
    }
}

impl From<&CombatSettings> for MovementRules {
    fn from(settings: &CombatSettings) -> Self {
        Self {
            feet_per_cell: settings.feet_per_cell,
            default_speed_feet: settings.default_speed_feet,
            difficult_terrain_doubles_cost: settings.difficult_terrain_doubles_cost,
        }
    }
}

impl MovementRules {
    /// Movement allowance in grid cells
    pub fn allowance(&self, entity: &CombatEntity) -> u32 {
        let speed = entity.speed_feet.unwrap_or(self.default_speed_feet);
        speed / self.feet_per_cell.max(1)
    }

    /// Distance charged for moving to `destination`
    fn cost(&self, map: &CombatMap, from: &GridPosition, destination: &GridPosition) -> u32 {
        let distance = from.chebyshev_distance(destination);
        if self.difficult_terrain_doubles_cost && map.is_difficult_terrain(destination) {
            distance.saturating_mul(2)
        } else {
            distance
        }
    }
}

/// Check a single move without touching any state
pub fn validate_move(
    map: &CombatMap,
    entities: &[CombatEntity],
    mover: &CombatEntity,
    destination: GridPosition,
    rules: &MovementRules,
) -> Result<(), CombatError> {
    let reject = |reason| CombatError::InvalidMove {
        destination,
        reason,
    };

    if !map.in_bounds(&destination) {
        return Err(reject(MoveRejection::OutOfBounds));
    }
    if map.is_obstacle(&destination) {
        return Err(reject(MoveRejection::Obstacle));
    }
    if let Some(occupant) = entities
        .iter()
        .find(|e| e.id != mover.id && e.is_alive() && e.position == destination)
    {
        return Err(reject(MoveRejection::Occupied { by: occupant.id }));
    }

    let distance = rules.cost(map, &mover.position, &destination);
    let allowance = rules.allowance(mover);
    if distance > allowance {
        return Err(reject(MoveRejection::OutOfRange {
            distance,
            allowance,
        }));
    }

    Ok(())
}

/// Every cell the mover could legally move to, row by row; excludes its own cell
pub fn valid_moves(
    map: &CombatMap,
    entities: &[CombatEntity],
    mover: &CombatEntity,
    rules: &MovementRules,
) -> Vec<GridPosition> {
    let reach = i64::from(rules.allowance(mover));
    let origin = mover.position;

    let clamp = |value: i64, limit: u32| value.clamp(0, i64::from(limit) - 1);
    if map.width == 0 || map.height == 0 {
        return Vec::new();
    }
    let min_x = clamp(i64::from(origin.x) - reach, map.width);
    let max_x = clamp(i64::from(origin.x) + reach, map.width);
    let min_y = clamp(i64::from(origin.y) - reach, map.height);
    let max_y = clamp(i64::from(origin.y) + reach, map.height);

    let mut moves = Vec::new();
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            // Bounded by the map dimensions, which fit in u32
            let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
                continue;
            };
            let cell = GridPosition::new(x, y);
            if cell == origin {
                continue;
            }
            if validate_move(map, entities, mover, cell, rules).is_ok() {
                moves.push(cell);
            }
        }
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CombatantType;

    fn arena() -> CombatMap {
        let mut map = CombatMap::new("Arena", 10, 10);
        map.add_obstacle(GridPosition::new(3, 3)).unwrap();
        map.add_difficult_terrain(GridPosition::new(2, 0)).unwrap();
        map
    }

    fn fighter_at(x: i32, y: i32) -> CombatEntity {
        CombatEntity::new("Fighter", CombatantType::Player, 20).with_position(GridPosition::new(x, y))
    }

    #[test]
    fn test_reference_scenario() {
        let map = arena();
        let a = fighter_at(0, 0);
        let entities = vec![a.clone()];
        let rules = MovementRules::default();

        assert_eq!(rules.allowance(&a), 6);
        assert!(matches!(
            validate_move(&map, &entities, &a, GridPosition::new(3, 3), &rules),
            Err(CombatError::InvalidMove { reason: MoveRejection::Obstacle, .. })
        ));
        assert!(validate_move(&map, &entities, &a, GridPosition::new(6, 0), &rules).is_ok());
        assert!(matches!(
            validate_move(&map, &entities, &a, GridPosition::new(7, 0), &rules),
            Err(CombatError::InvalidMove {
                reason: MoveRejection::OutOfRange { distance: 7, allowance: 6 },
                ..
            })
        ));
    }

    #[test]
    fn test_occupancy_only_counts_living_entities() {
        let map = arena();
        let mover = fighter_at(0, 0);
        let living = fighter_at(1, 1);
        let downed = fighter_at(2, 2).with_current_hp(0);
        let entities = vec![mover.clone(), living.clone(), downed];
        let rules = MovementRules::default();

        assert_eq!(
            validate_move(&map, &entities, &mover, GridPosition::new(1, 1), &rules),
            Err(CombatError::InvalidMove {
                destination: GridPosition::new(1, 1),
                reason: MoveRejection::Occupied { by: living.id },
            })
        );
        assert!(validate_move(&map, &entities, &mover, GridPosition::new(2, 2), &rules).is_ok());
    }

    #[test]
    fn test_out_of_bounds() {
        let map = arena();
        let mover = fighter_at(0, 0);
        let rules = MovementRules::default();
        assert!(matches!(
            validate_move(&map, &[mover.clone()], &mover, GridPosition::new(-1, 0), &rules),
            Err(CombatError::InvalidMove { reason: MoveRejection::OutOfBounds, .. })
        ));
    }

    #[test]
    fn test_difficult_terrain_is_advisory_by_default() {
        let map = arena();
        let mover = fighter_at(0, 0).with_speed(10);
        let entities = vec![mover.clone()];

        let advisory = MovementRules::default();
        assert!(validate_move(&map, &entities, &mover, GridPosition::new(2, 0), &advisory).is_ok());

        let costly = MovementRules {
            difficult_terrain_doubles_cost: true,
            ..MovementRules::default()
        };
        assert!(validate_move(&map, &entities, &mover, GridPosition::new(2, 0), &costly).is_err());
        assert!(validate_move(&map, &entities, &mover, GridPosition::new(2, 1), &costly).is_ok());
    }

    #[test]
    fn test_valid_moves_matches_validate_move() {
        let map = arena();
        let mover = fighter_at(1, 1).with_speed(10);
        let blocker = fighter_at(2, 2);
        let entities = vec![mover.clone(), blocker];
        let rules = MovementRules::default();

        let moves = valid_moves(&map, &entities, &mover, &rules);

        // 5x5 box clipped to the map at x/y = 0: 4x4 = 16 cells, minus self,
        // the obstacle at (3,3) and the blocker at (2,2)
        assert_eq!(moves.len(), 13);
        assert!(!moves.contains(&GridPosition::new(1, 1)));
        assert!(!moves.contains(&GridPosition::new(3, 3)));
        assert!(!moves.contains(&GridPosition::new(2, 2)));
        assert_eq!(moves.first(), Some(&GridPosition::new(0, 0)));
        assert_eq!(moves.last(), Some(&GridPosition::new(2, 3)));
        for cell in &moves {
            assert!(validate_move(&map, &entities, &mover, *cell, &rules).is_ok());
        }
    }

    #[test]
    fn test_zero_speed_has_no_moves() {
        let map = arena();
        let mover = fighter_at(5, 5).with_speed(0);
        assert!(valid_moves(&map, &[mover.clone()], &mover, &MovementRules::default()).is_empty());
    }
}
