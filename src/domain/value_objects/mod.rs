//! Value objects - Immutable objects defined by their attributes

mod condition;
mod grid_position;
mod ids;
mod settings;

pub use condition::Condition;
pub use grid_position::GridPosition;
pub use ids::*;
pub use settings::CombatSettings;
