//! Aggregates - Cluster of domain objects treated as a single unit

pub mod combat_aggregate;
pub mod combat_log;

pub use combat_aggregate::{Combat, CombatCommand, CombatStatus};
pub use combat_log::{
    export_line, render_message, CombatLog, LogFilter, NameLookup, UNKNOWN_ENTITY_NAME,
};
