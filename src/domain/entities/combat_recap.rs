//! CombatRecap - Post-encounter summary
//!
//! Everything except `narrative` is computed from the combat and its log.
//! The narrative may be edited by the DM afterwards; editing it never
//! triggers recomputation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::CombatantType;
use crate::domain::value_objects::{CombatEntityId, CombatId, RecapId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRecap {
    pub id: RecapId,
    pub combat_id: CombatId,
    pub combat_name: String,
    pub total_rounds: u32,
    pub duration_seconds: i64,
    /// Per-combatant totals, in registration order
    pub entity_stats: Vec<EntityRecapStats>,
    pub mvp: Option<MvpSummary>,
    pub notable_moments: Vec<NotableMoment>,
    /// Generated text, editable afterwards
    pub narrative: String,
    pub generated_at: DateTime<Utc>,
}

impl CombatRecap {
    pub fn stats_for(&self, entity_id: CombatEntityId) -> Option<&EntityRecapStats> {
        self.entity_stats.iter().find(|s| s.entity_id == entity_id)
    }

    /// Damage taken across the encounter, sourced or not
    pub fn total_damage(&self) -> u64 {
        self.entity_stats.iter().map(|s| s.damage_taken).sum()
    }

    /// Hit points restored across the encounter, sourced or not
    pub fn total_healing(&self) -> u64 {
        self.entity_stats.iter().map(|s| s.healing_received).sum()
    }

    /// Replace the narrative text; computed fields are left alone
    pub fn edit_narrative(&mut self, narrative: impl Into<String>) {
        self.narrative = narrative.into();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecapStats {
    pub entity_id: CombatEntityId,
    pub name: String,
    /// `None` when the entity has since been removed from the combat
    pub entity_type: Option<CombatantType>,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub healing_given: u64,
    pub healing_received: u64,
    pub kills: u32,
    pub is_down: bool,
}

impl EntityRecapStats {
    pub fn new(entity_id: CombatEntityId, name: impl Into<String>) -> Self {
        Self {
            entity_id,
            name: name.into(),
            entity_type: None,
            damage_dealt: 0,
            damage_taken: 0,
            healing_given: 0,
            healing_received: 0,
            kills: 0,
            is_down: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MvpSummary {
    pub entity_id: CombatEntityId,
    pub name: String,
    pub score: i64,
    /// Name of the scoring policy that picked this combatant
    pub policy: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentKind {
    Death,
    BiggestHit,
    BiggestHeal,
    DmNote,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotableMoment {
    pub kind: MomentKind,
    pub round: u32,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}
