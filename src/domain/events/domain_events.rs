//! Combat events - Notifications of state changes produced by commands
//!
//! Commands on the `Combat` aggregate return the events they caused. The
//! application layer turns these into log entries and hands them to
//! presentation collaborators.

use serde::Serialize;

use crate::domain::entities::HitPointChange;
use crate::domain::value_objects::{CombatEntityId, Condition, GridPosition};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CombatEvent {
    // ========================================================================
    // Lifecycle
    // ========================================================================
    /// Combat moved from not-started to active
    CombatStarted {
        first_actor: Option<CombatEntityId>,
    },

    /// Combat moved to completed
    CombatCompleted { rounds: u32 },

    // ========================================================================
    // Turn order
    // ========================================================================
    /// The cursor moved forward
    TurnAdvanced {
        round: u32,
        turn_index: usize,
        actor: CombatEntityId,
        new_round: bool,
        skipped: Vec<CombatEntityId>,
    },

    /// The cursor moved backward
    TurnReverted {
        round: u32,
        turn_index: usize,
        actor: CombatEntityId,
    },

    /// The initiative order was rebuilt from current scores
    InitiativeResorted { order: Vec<CombatEntityId> },

    /// Initiative was rolled for entities without a score
    InitiativeRolled { rolls: Vec<(CombatEntityId, i32)> },

    InitiativeSet {
        entity_id: CombatEntityId,
        initiative: i32,
    },

    // ========================================================================
    // Registry
    // ========================================================================
    EntityAdded { entity_id: CombatEntityId },

    EntityRemoved {
        entity_id: CombatEntityId,
        name: String,
    },

    EntityRenamed {
        entity_id: CombatEntityId,
        old_name: String,
    },

    EntityMoved {
        entity_id: CombatEntityId,
        from: GridPosition,
        to: GridPosition,
    },

    // ========================================================================
    // Hit points and conditions
    // ========================================================================
    DamageApplied {
        entity_id: CombatEntityId,
        source_id: Option<CombatEntityId>,
        amount: u32,
        change: HitPointChange,
    },

    HealingApplied {
        entity_id: CombatEntityId,
        source_id: Option<CombatEntityId>,
        amount: u32,
        change: HitPointChange,
    },

    /// An entity crossed from above zero HP to zero or below
    EntityDowned {
        entity_id: CombatEntityId,
        source_id: Option<CombatEntityId>,
    },

    ConditionSet {
        entity_id: CombatEntityId,
        condition: Condition,
    },

    ConditionCleared {
        entity_id: CombatEntityId,
        condition: Condition,
    },

    // ========================================================================
    // Map
    // ========================================================================
    ObstacleAdded { position: GridPosition },

    DifficultTerrainAdded { position: GridPosition },
}

impl CombatEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            CombatEvent::CombatStarted { .. } => "CombatStarted",
            CombatEvent::CombatCompleted { .. } => "CombatCompleted",
            CombatEvent::TurnAdvanced { .. } => "TurnAdvanced",
            CombatEvent::TurnReverted { .. } => "TurnReverted",
            CombatEvent::InitiativeResorted { .. } => "InitiativeResorted",
            CombatEvent::InitiativeRolled { .. } => "InitiativeRolled",
            CombatEvent::InitiativeSet { .. } => "InitiativeSet",
            CombatEvent::EntityAdded { .. } => "EntityAdded",
            CombatEvent::EntityRemoved { .. } => "EntityRemoved",
            CombatEvent::EntityRenamed { .. } => "EntityRenamed",
            CombatEvent::EntityMoved { .. } => "EntityMoved",
            CombatEvent::DamageApplied { .. } => "DamageApplied",
            CombatEvent::HealingApplied { .. } => "HealingApplied",
            CombatEvent::EntityDowned { .. } => "EntityDowned",
            CombatEvent::ConditionSet { .. } => "ConditionSet",
            CombatEvent::ConditionCleared { .. } => "ConditionCleared",
            CombatEvent::ObstacleAdded { .. } => "ObstacleAdded",
            CombatEvent::DifficultTerrainAdded { .. } => "DifficultTerrainAdded",
        }
    }
}
