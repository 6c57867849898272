//! Combat repository port - Load/save hooks for combat persistence
//!
//! The application layer owns the in-memory state of each combat; this port
//! only records snapshots of it. Implementations must apply
//! `save_with_log` atomically so a combat and the log entries its command
//! produced are never stored apart.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::aggregates::Combat;
use crate::domain::entities::{CombatLogEntry, CombatRecap};
use crate::domain::value_objects::CombatId;

// =============================================================================
// Combat Repository Port
// =============================================================================

/// Repository port for the Combat aggregate, its log and its recap
#[async_trait]
pub trait CombatRepositoryPort: Send + Sync {
    /// Insert or replace a combat snapshot
    async fn save(&self, combat: &Combat) -> Result<()>;

    /// Store a combat snapshot and append log entries in one unit of work
    async fn save_with_log(&self, combat: &Combat, entries: &[CombatLogEntry]) -> Result<()>;

    /// Get a combat by ID
    async fn get(&self, id: CombatId) -> Result<Option<Combat>>;

    /// List all combats, oldest first
    async fn list(&self) -> Result<Vec<Combat>>;

    /// Delete a combat together with its log and recap
    async fn delete(&self, id: CombatId) -> Result<()>;

    /// Log entries of a combat ordered by sequence
    async fn get_log(&self, combat_id: CombatId) -> Result<Vec<CombatLogEntry>>;

    /// Remove every log entry of a combat, returning how many were removed
    async fn clear_log(&self, combat_id: CombatId) -> Result<u64>;

    /// Insert or replace the stored recap of a combat
    async fn save_recap(&self, recap: &CombatRecap) -> Result<()>;

    /// Get the stored recap of a combat
    async fn get_recap(&self, combat_id: CombatId) -> Result<Option<CombatRecap>>;
}
