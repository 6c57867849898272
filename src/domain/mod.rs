//! Domain layer - Core combat rules with no I/O
//!
//! This layer contains:
//! - Entities: combatants, the battle map, log entries and recaps
//! - Value Objects: ids, grid positions, conditions, tunable settings
//! - Aggregates: the Combat root and its log
//! - Domain Events: state changes produced by combat commands
//! - Domain Services: movement rules and recap generation

pub mod aggregates;
pub mod entities;
pub mod error;
pub mod events;
pub mod services;
pub mod value_objects;
