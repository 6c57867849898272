//! Application services - Use case implementations
//!
//! Services accept repository ports and return domain aggregates; the HTTP
//! layer maps them to DTOs.

pub mod combat_service;

pub use combat_service::{
    AddLogEntryRequest, CombatService, CombatServiceError, CombatServiceImpl, CommandOutcome,
    CreateCombatRequest, RenderedLogEntry, ServiceResult,
};
