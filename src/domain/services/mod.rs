//! Domain services - Pure rules that span several domain objects

pub mod movement;
pub mod recap;

pub use movement::MovementRules;
pub use recap::{MvpPolicy, RecapGenerator, WeightedScore};
