//! Persistence adapters for the combat repository port

mod in_memory_combat_repository;
mod sqlite_combat_repository;

pub use in_memory_combat_repository::InMemoryCombatRepository;
pub use sqlite_combat_repository::SqliteCombatRepository;
