//! Domain entities - Core combat records with identity

mod combat_entity;
mod combat_log_entry;
mod combat_map;
mod combat_recap;

pub use combat_entity::{CombatEntity, CombatantType, HitPointChange};
pub use combat_log_entry::{
    entity_token, CombatLogEntry, LogEntryType, NewLogEntry, ENTITY_TOKEN_PREFIX,
};
pub use combat_map::CombatMap;
pub use combat_recap::{
    CombatRecap, EntityRecapStats, MomentKind, MvpSummary, NotableMoment,
};
