//! Combat Aggregate - The root aggregate for one encounter
//!
//! A Combat owns its combatants, the battle map and the turn cursor. All
//! mutations go through this aggregate root so that each command either
//! fully applies or leaves the combat untouched.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::aggregates::NameLookup;
use crate::domain::entities::{CombatEntity, CombatMap};
use crate::domain::error::{CombatError, MoveRejection};
use crate::domain::events::CombatEvent;
use crate::domain::services::movement::{self, MovementRules};
use crate::domain::value_objects::{CombatEntityId, CombatId, Condition, GridPosition};

/// Lifecycle of a combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatStatus {
    NotStarted,
    Active,
    Completed,
}

impl CombatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombatStatus::NotStarted => "not_started",
            CombatStatus::Active => "active",
            CombatStatus::Completed => "completed",
        }
    }
}

/// The closed set of commands a combat accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CombatCommand {
    Start,
    Complete,
    AdvanceTurn,
    PreviousTurn,
    ResortInitiative,
    RollInitiative {
        #[serde(default)]
        reroll_all: bool,
    },
    SetInitiative {
        entity_id: CombatEntityId,
        initiative: i32,
    },
    AddEntity {
        entity: CombatEntity,
    },
    RemoveEntity {
        entity_id: CombatEntityId,
    },
    RenameEntity {
        entity_id: CombatEntityId,
        name: String,
    },
    MoveEntity {
        entity_id: CombatEntityId,
        destination: GridPosition,
    },
    ApplyDamage {
        entity_id: CombatEntityId,
        amount: u32,
        #[serde(default)]
        source_id: Option<CombatEntityId>,
    },
    ApplyHealing {
        entity_id: CombatEntityId,
        amount: u32,
        #[serde(default)]
        source_id: Option<CombatEntityId>,
    },
    SetCondition {
        entity_id: CombatEntityId,
        condition: Condition,
    },
    ClearCondition {
        entity_id: CombatEntityId,
        condition: Condition,
    },
    AddObstacle {
        position: GridPosition,
    },
    AddDifficultTerrain {
        position: GridPosition,
    },
}

impl CombatCommand {
    pub fn name(&self) -> &'static str {
        match self {
            CombatCommand::Start => "start",
            CombatCommand::Complete => "complete",
            CombatCommand::AdvanceTurn => "advance_turn",
            CombatCommand::PreviousTurn => "previous_turn",
            CombatCommand::ResortInitiative => "resort_initiative",
            CombatCommand::RollInitiative { .. } => "roll_initiative",
            CombatCommand::SetInitiative { .. } => "set_initiative",
            CombatCommand::AddEntity { .. } => "add_entity",
            CombatCommand::RemoveEntity { .. } => "remove_entity",
            CombatCommand::RenameEntity { .. } => "rename_entity",
            CombatCommand::MoveEntity { .. } => "move_entity",
            CombatCommand::ApplyDamage { .. } => "apply_damage",
            CombatCommand::ApplyHealing { .. } => "apply_healing",
            CombatCommand::SetCondition { .. } => "set_condition",
            CombatCommand::ClearCondition { .. } => "clear_condition",
            CombatCommand::AddObstacle { .. } => "add_obstacle",
            CombatCommand::AddDifficultTerrain { .. } => "add_difficult_terrain",
        }
    }
}

/// The Combat Aggregate Root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    pub id: CombatId,
    pub name: String,
    /// Combatants in registration order
    entities: Vec<CombatEntity>,
    /// Fixed turn sequence, rebuilt only on a new round or explicit request
    initiative_order: Vec<CombatEntityId>,
    turn_index: usize,
    /// 0 until the combat starts
    round: u32,
    map: CombatMap,
    status: CombatStatus,
    #[serde(default = "default_resort")]
    resort_each_round: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_resort() -> bool {
    true
}

impl Combat {
    pub fn new(name: impl Into<String>, map: CombatMap) -> Self {
        Self {
            id: CombatId::new(),
            name: name.into(),
            entities: Vec::new(),
            initiative_order: Vec::new(),
            turn_index: 0,
            round: 0,
            map,
            status: CombatStatus::NotStarted,
            resort_each_round: true,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_resort_each_round(mut self, resort: bool) -> Self {
        self.resort_each_round = resort;
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn entities(&self) -> &[CombatEntity] {
        &self.entities
    }

    pub fn entity(&self, id: CombatEntityId) -> Option<&CombatEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn living_entities(&self) -> impl Iterator<Item = &CombatEntity> {
        self.entities.iter().filter(|e| e.is_alive())
    }

    pub fn initiative_order(&self) -> &[CombatEntityId] {
        &self.initiative_order
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn map(&self) -> &CombatMap {
        &self.map
    }

    pub fn status(&self) -> CombatStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == CombatStatus::Active
    }

    /// Round number to stamp on log entries: 0 outside an active round
    pub fn log_round(&self) -> u32 {
        if self.is_active() {
            self.round
        } else {
            0
        }
    }

    /// The entity at the cursor; `None` when the order is empty or everyone is down
    ///
    /// An actor downed during its own turn stays current until the turn is
    /// advanced; downed entities are only skipped when the cursor moves.
    pub fn current_actor(&self) -> Option<&CombatEntity> {
        if !self.order_has_living() {
            return None;
        }
        self.initiative_order
            .get(self.turn_index)
            .and_then(|id| self.entity(*id))
    }

    /// Active with nobody left standing: the caller should complete the combat
    pub fn awaiting_completion(&self) -> bool {
        self.is_active() && !self.order_has_living()
    }

    // ========================================================================
    // Command dispatch
    // ========================================================================

    /// Apply a command, returning the events it produced
    pub fn execute<R: Rng + ?Sized>(
        &mut self,
        command: CombatCommand,
        rules: &MovementRules,
        rng: &mut R,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        match command {
            CombatCommand::Start => self.start(),
            CombatCommand::Complete => self.complete().map(|e| vec![e]),
            CombatCommand::AdvanceTurn => self.advance_turn(),
            CombatCommand::PreviousTurn => self.previous_turn().map(|e| vec![e]),
            CombatCommand::ResortInitiative => self.resort_initiative().map(|e| vec![e]),
            CombatCommand::RollInitiative { reroll_all } => {
                self.roll_initiative(rng, reroll_all).map(|e| vec![e])
            }
            CombatCommand::SetInitiative {
                entity_id,
                initiative,
            } => self.set_initiative(entity_id, initiative).map(|e| vec![e]),
            CombatCommand::AddEntity { entity } => self.add_entity(entity).map(|e| vec![e]),
            CombatCommand::RemoveEntity { entity_id } => {
                self.remove_entity(entity_id).map(|e| vec![e])
            }
            CombatCommand::RenameEntity { entity_id, name } => {
                self.rename_entity(entity_id, name).map(|e| vec![e])
            }
            CombatCommand::MoveEntity {
                entity_id,
                destination,
            } => self
                .move_entity(entity_id, destination, rules)
                .map(|e| vec![e]),
            CombatCommand::ApplyDamage {
                entity_id,
                amount,
                source_id,
            } => self.apply_damage(entity_id, amount, source_id),
            CombatCommand::ApplyHealing {
                entity_id,
                amount,
                source_id,
            } => self.apply_healing(entity_id, amount, source_id),
            CombatCommand::SetCondition {
                entity_id,
                condition,
            } => self
                .set_condition(entity_id, condition)
                .map(|e| e.into_iter().collect()),
            CombatCommand::ClearCondition {
                entity_id,
                condition,
            } => self
                .clear_condition(entity_id, &condition)
                .map(|e| e.into_iter().collect()),
            CombatCommand::AddObstacle { position } => {
                self.add_obstacle(position).map(|e| e.into_iter().collect())
            }
            CombatCommand::AddDifficultTerrain { position } => self
                .add_difficult_terrain(position)
                .map(|e| e.into_iter().collect()),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// not-started -> active: build the initiative order and put the cursor
    /// on the first living combatant of round 1
    pub fn start(&mut self) -> Result<Vec<CombatEvent>, CombatError> {
        match self.status {
            CombatStatus::NotStarted => {}
            CombatStatus::Active => {
                return Err(CombatError::InvalidTransition {
                    action: "start",
                    status: self.status.as_str(),
                })
            }
            CombatStatus::Completed => return Err(CombatError::CombatCompleted),
        }

        let order = self.build_order();
        let first = order
            .iter()
            .position(|id| self.is_alive(*id))
            .ok_or(CombatError::EmptyInitiative)?;

        self.initiative_order = order;
        self.turn_index = first;
        self.round = 1;
        self.status = CombatStatus::Active;
        self.started_at = Some(Utc::now());

        Ok(vec![CombatEvent::CombatStarted {
            first_actor: self.initiative_order.get(first).copied(),
        }])
    }

    /// active -> completed
    pub fn complete(&mut self) -> Result<CombatEvent, CombatError> {
        match self.status {
            CombatStatus::Active => {
                self.status = CombatStatus::Completed;
                self.completed_at = Some(Utc::now());
                Ok(CombatEvent::CombatCompleted { rounds: self.round })
            }
            CombatStatus::NotStarted => Err(CombatError::InvalidTransition {
                action: "complete",
                status: self.status.as_str(),
            }),
            CombatStatus::Completed => Err(CombatError::CombatCompleted),
        }
    }

    // ========================================================================
    // Turn scheduler
    // ========================================================================

    /// Move the cursor to the next living combatant, wrapping into a new round
    pub fn advance_turn(&mut self) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_active("advance the turn")?;
        if !self.order_has_living() {
            return Err(CombatError::EmptyInitiative);
        }

        let mut order = self.initiative_order.clone();
        let mut index = self.turn_index;
        let mut round = self.round;
        let mut new_round = false;
        let mut resorted = false;
        let mut skipped = Vec::new();

        // A wrap can resort the order, so allow one full pass on each side of it
        for _ in 0..order.len() * 2 {
            index += 1;
            if index >= order.len() {
                index = 0;
                round += 1;
                new_round = true;
                if self.resort_each_round {
                    let rebuilt = self.build_order();
                    if rebuilt != order {
                        order = rebuilt;
                        resorted = true;
                    }
                }
            }

            let id = order[index];
            if !self.is_alive(id) {
                skipped.push(id);
                continue;
            }

            let mut events = Vec::new();
            if resorted {
                events.push(CombatEvent::InitiativeResorted {
                    order: order.clone(),
                });
            }
            events.push(CombatEvent::TurnAdvanced {
                round,
                turn_index: index,
                actor: id,
                new_round,
                skipped,
            });

            self.initiative_order = order;
            self.turn_index = index;
            self.round = round;
            return Ok(events);
        }

        Err(CombatError::EmptyInitiative)
    }

    /// Move the cursor back to the previous living combatant
    pub fn previous_turn(&mut self) -> Result<CombatEvent, CombatError> {
        self.ensure_active("go back a turn")?;
        if !self.order_has_living() {
            return Err(CombatError::EmptyInitiative);
        }

        let len = self.initiative_order.len();
        let mut index = self.turn_index;
        let mut round = self.round;

        for _ in 0..len * 2 {
            if index == 0 {
                if round <= 1 {
                    return Err(CombatError::NoPreviousTurn);
                }
                round -= 1;
                index = len - 1;
            } else {
                index -= 1;
            }

            let id = self.initiative_order[index];
            if self.is_alive(id) {
                self.turn_index = index;
                self.round = round;
                return Ok(CombatEvent::TurnReverted {
                    round,
                    turn_index: index,
                    actor: id,
                });
            }
        }

        Err(CombatError::NoPreviousTurn)
    }

    /// Rebuild the order from current scores; the current actor stays current
    pub fn resort_initiative(&mut self) -> Result<CombatEvent, CombatError> {
        self.ensure_active("resort initiative")?;

        let current = self.initiative_order.get(self.turn_index).copied();
        let order = self.build_order();
        self.turn_index = current
            .and_then(|id| order.iter().position(|o| *o == id))
            .unwrap_or(0);
        self.initiative_order = order;

        Ok(CombatEvent::InitiativeResorted {
            order: self.initiative_order.clone(),
        })
    }

    /// Roll d20 + modifier for entities without a score (or for everyone)
    pub fn roll_initiative<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        reroll_all: bool,
    ) -> Result<CombatEvent, CombatError> {
        if self.status != CombatStatus::NotStarted {
            return Err(CombatError::InvalidTransition {
                action: "roll initiative",
                status: self.status.as_str(),
            });
        }

        let mut rolls = Vec::new();
        for entity in self
            .entities
            .iter_mut()
            .filter(|e| reroll_all || e.initiative.is_none())
        {
            let roll = rng.gen_range(1..=20) + entity.initiative_modifier;
            entity.initiative = Some(roll);
            rolls.push((entity.id, roll));
        }

        Ok(CombatEvent::InitiativeRolled { rolls })
    }

    /// Change a score without touching the current order
    pub fn set_initiative(
        &mut self,
        entity_id: CombatEntityId,
        initiative: i32,
    ) -> Result<CombatEvent, CombatError> {
        self.ensure_not_completed()?;
        self.entity_mut(entity_id)?.initiative = Some(initiative);
        Ok(CombatEvent::InitiativeSet {
            entity_id,
            initiative,
        })
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Register a combatant; during an active combat it joins the end of the order
    pub fn add_entity(&mut self, mut entity: CombatEntity) -> Result<CombatEvent, CombatError> {
        self.ensure_not_completed()?;

        if entity.name.trim().is_empty() {
            return Err(CombatError::Validation(
                "Combatant name cannot be empty".to_string(),
            ));
        }
        if entity.max_hp <= 0 {
            return Err(CombatError::Validation(
                "Maximum hit points must be positive".to_string(),
            ));
        }
        if entity.current_hp > entity.max_hp {
            return Err(CombatError::Validation(
                "Current hit points cannot exceed the maximum".to_string(),
            ));
        }
        if self.entity(entity.id).is_some() {
            return Err(CombatError::Validation(format!(
                "Combatant {} is already registered",
                entity.id
            )));
        }

        let position = entity.position;
        if !self.map.in_bounds(&position) {
            return Err(CombatError::InvalidMove {
                destination: position,
                reason: MoveRejection::OutOfBounds,
            });
        }
        if self.map.is_obstacle(&position) {
            return Err(CombatError::InvalidMove {
                destination: position,
                reason: MoveRejection::Obstacle,
            });
        }
        if entity.is_alive() {
            if let Some(occupant) = self.living_at(&position) {
                return Err(CombatError::InvalidMove {
                    destination: position,
                    reason: MoveRejection::Occupied { by: occupant.id },
                });
            }
        }

        entity.combat_id = Some(self.id);
        let entity_id = entity.id;
        self.entities.push(entity);
        if self.is_active() {
            self.initiative_order.push(entity_id);
        }

        Ok(CombatEvent::EntityAdded { entity_id })
    }

    /// Drop a combatant entirely; the cursor keeps pointing at the same actor
    pub fn remove_entity(&mut self, entity_id: CombatEntityId) -> Result<CombatEvent, CombatError> {
        self.ensure_not_completed()?;
        let pos = self
            .entities
            .iter()
            .position(|e| e.id == entity_id)
            .ok_or(CombatError::UnknownEntity(entity_id))?;

        let removed = self.entities.remove(pos);

        if let Some(order_pos) = self.initiative_order.iter().position(|id| *id == entity_id) {
            self.initiative_order.remove(order_pos);
            if order_pos < self.turn_index {
                self.turn_index -= 1;
            } else if self.turn_index >= self.initiative_order.len() {
                // Removed the last actor of the round: the next one opens a new round
                self.turn_index = 0;
                if self.is_active() && !self.initiative_order.is_empty() {
                    self.round += 1;
                }
            }
        }

        Ok(CombatEvent::EntityRemoved {
            entity_id,
            name: removed.name,
        })
    }

    pub fn rename_entity(
        &mut self,
        entity_id: CombatEntityId,
        name: impl Into<String>,
    ) -> Result<CombatEvent, CombatError> {
        self.ensure_not_completed()?;
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CombatError::Validation(
                "Combatant name cannot be empty".to_string(),
            ));
        }
        let entity = self.entity_mut(entity_id)?;
        let old_name = std::mem::replace(&mut entity.name, name);
        Ok(CombatEvent::EntityRenamed {
            entity_id,
            old_name,
        })
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Move a combatant; only its position changes
    pub fn move_entity(
        &mut self,
        entity_id: CombatEntityId,
        destination: GridPosition,
        rules: &MovementRules,
    ) -> Result<CombatEvent, CombatError> {
        self.ensure_not_completed()?;
        let mover = self
            .entity(entity_id)
            .ok_or(CombatError::UnknownEntity(entity_id))?;
        movement::validate_move(&self.map, &self.entities, mover, destination, rules)?;

        let entity = self.entity_mut(entity_id)?;
        let from = std::mem::replace(&mut entity.position, destination);
        Ok(CombatEvent::EntityMoved {
            entity_id,
            from,
            to: destination,
        })
    }

    /// Cells the combatant could move to under the current rules
    pub fn valid_moves(
        &self,
        entity_id: CombatEntityId,
        rules: &MovementRules,
    ) -> Result<Vec<GridPosition>, CombatError> {
        let mover = self
            .entity(entity_id)
            .ok_or(CombatError::UnknownEntity(entity_id))?;
        Ok(movement::valid_moves(&self.map, &self.entities, mover, rules))
    }

    // ========================================================================
    // Hit points
    // ========================================================================

    pub fn apply_damage(
        &mut self,
        entity_id: CombatEntityId,
        amount: u32,
        source_id: Option<CombatEntityId>,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        self.ensure_known_source(source_id)?;

        let change = self.entity_mut(entity_id)?.apply_damage(amount);
        let mut events = vec![CombatEvent::DamageApplied {
            entity_id,
            source_id,
            amount,
            change,
        }];
        if change.went_down() {
            events.push(CombatEvent::EntityDowned {
                entity_id,
                source_id,
            });
        }
        Ok(events)
    }

    pub fn apply_healing(
        &mut self,
        entity_id: CombatEntityId,
        amount: u32,
        source_id: Option<CombatEntityId>,
    ) -> Result<Vec<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        self.ensure_known_source(source_id)?;

        let change = self.entity_mut(entity_id)?.apply_healing(amount);
        Ok(vec![CombatEvent::HealingApplied {
            entity_id,
            source_id,
            amount,
            change,
        }])
    }

    // ========================================================================
    // Conditions
    // ========================================================================

    /// Idempotent: returns no event when the condition was already present
    pub fn set_condition(
        &mut self,
        entity_id: CombatEntityId,
        condition: Condition,
    ) -> Result<Option<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        if condition.label().is_empty() {
            return Err(CombatError::Validation(
                "Condition name cannot be empty".to_string(),
            ));
        }
        let entity = self.entity_mut(entity_id)?;
        Ok(entity
            .add_condition(condition.clone())
            .then_some(CombatEvent::ConditionSet {
                entity_id,
                condition,
            }))
    }

    /// No-op (no event) when the condition is absent
    pub fn clear_condition(
        &mut self,
        entity_id: CombatEntityId,
        condition: &Condition,
    ) -> Result<Option<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        let entity = self.entity_mut(entity_id)?;
        Ok(entity
            .remove_condition(condition)
            .then(|| CombatEvent::ConditionCleared {
                entity_id,
                condition: condition.clone(),
            }))
    }

    // ========================================================================
    // Map edits
    // ========================================================================

    /// An obstacle can never be placed under a combatant, living or not
    pub fn add_obstacle(&mut self, position: GridPosition) -> Result<Option<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        if let Some(occupant) = self.entities.iter().find(|e| e.position == position) {
            return Err(CombatError::Validation(format!(
                "{} is occupied by {}",
                position, occupant.name
            )));
        }
        Ok(self
            .map
            .add_obstacle(position)?
            .then_some(CombatEvent::ObstacleAdded { position }))
    }

    pub fn add_difficult_terrain(
        &mut self,
        position: GridPosition,
    ) -> Result<Option<CombatEvent>, CombatError> {
        self.ensure_not_completed()?;
        Ok(self
            .map
            .add_difficult_terrain(position)?
            .then_some(CombatEvent::DifficultTerrainAdded { position }))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Initiative descending; ties keep registration order
    fn build_order(&self) -> Vec<CombatEntityId> {
        let mut ranked: Vec<&CombatEntity> = self.entities.iter().collect();
        ranked.sort_by_key(|e| std::cmp::Reverse(e.initiative.unwrap_or(i32::MIN)));
        ranked.into_iter().map(|e| e.id).collect()
    }

    fn is_alive(&self, id: CombatEntityId) -> bool {
        self.entity(id).is_some_and(|e| e.is_alive())
    }

    fn order_has_living(&self) -> bool {
        self.initiative_order.iter().any(|id| self.is_alive(*id))
    }

    fn living_at(&self, position: &GridPosition) -> Option<&CombatEntity> {
        self.entities
            .iter()
            .find(|e| e.is_alive() && e.position == *position)
    }

    fn entity_mut(&mut self, id: CombatEntityId) -> Result<&mut CombatEntity, CombatError> {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(CombatError::UnknownEntity(id))
    }

    fn ensure_known_source(&self, source_id: Option<CombatEntityId>) -> Result<(), CombatError> {
        match source_id {
            Some(id) if self.entity(id).is_none() => Err(CombatError::UnknownEntity(id)),
            _ => Ok(()),
        }
    }

    fn ensure_not_completed(&self) -> Result<(), CombatError> {
        if self.status == CombatStatus::Completed {
            Err(CombatError::CombatCompleted)
        } else {
            Ok(())
        }
    }

    fn ensure_active(&self, action: &'static str) -> Result<(), CombatError> {
        match self.status {
            CombatStatus::Active => Ok(()),
            CombatStatus::Completed => Err(CombatError::CombatCompleted),
            CombatStatus::NotStarted => Err(CombatError::InvalidTransition {
                action,
                status: self.status.as_str(),
            }),
        }
    }
}

impl NameLookup for Combat {
    fn display_name(&self, id: CombatEntityId) -> Option<&str> {
        self.entity(id).map(|e| e.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::CombatantType;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entity(name: &str, initiative: i32, x: i32) -> CombatEntity {
        CombatEntity::new(name, CombatantType::Monster, 10)
            .with_initiative(initiative)
            .with_position(GridPosition::new(x, 0))
    }

    /// Three combatants with initiatives 20, 15, 15 (registered 15a before 15b)
    fn three_way() -> (Combat, [CombatEntityId; 3]) {
        let mut combat = Combat::new("Ambush", CombatMap::new("Road", 10, 10));
        let a = entity("Fifteen A", 15, 0);
        let b = entity("Fifteen B", 15, 1);
        let top = entity("Twenty", 20, 2);
        let ids = [top.id, a.id, b.id];
        combat.add_entity(a).unwrap();
        combat.add_entity(b).unwrap();
        combat.add_entity(top).unwrap();
        (combat, ids)
    }

    fn started() -> (Combat, [CombatEntityId; 3]) {
        let (mut combat, ids) = three_way();
        combat.start().unwrap();
        (combat, ids)
    }

    #[test]
    fn test_start_orders_by_initiative_with_stable_ties() {
        let (combat, [top, a, b]) = started();

        assert_eq!(combat.status(), CombatStatus::Active);
        assert_eq!(combat.initiative_order(), &[top, a, b]);
        assert_eq!(combat.round(), 1);
        assert_eq!(combat.turn_index(), 0);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(top));
        assert!(combat.started_at.is_some());
    }

    #[test]
    fn test_advance_wraps_into_next_round() {
        let (mut combat, [top, a, _]) = started();

        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        assert_eq!((combat.round(), combat.turn_index()), (1, 2));

        let events = combat.advance_turn().unwrap();
        assert_eq!((combat.round(), combat.turn_index()), (2, 0));
        assert_eq!(combat.current_actor().map(|e| e.id), Some(top));
        assert!(matches!(
            events.last(),
            Some(CombatEvent::TurnAdvanced { new_round: true, round: 2, .. })
        ));

        combat.advance_turn().unwrap();
        assert_eq!((combat.round(), combat.turn_index()), (2, 1));
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));
    }

    #[test]
    fn test_every_living_entity_acts_once_per_round() {
        let (mut combat, [top, a, b]) = started();
        combat.apply_damage(a, 50, None).unwrap();

        let mut seen = vec![combat.current_actor().unwrap().id];
        while combat.round() == 1 {
            combat.advance_turn().unwrap();
            if combat.round() == 1 {
                seen.push(combat.current_actor().unwrap().id);
            }
        }

        assert_eq!(seen, vec![top, b]);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(top));
    }

    #[test]
    fn test_advance_skips_downed_and_reports_them() {
        let (mut combat, [_, a, b]) = started();
        combat.apply_damage(a, 10, None).unwrap();

        let events = combat.advance_turn().unwrap();

        assert_eq!(combat.current_actor().map(|e| e.id), Some(b));
        assert!(matches!(
            events.last(),
            Some(CombatEvent::TurnAdvanced { skipped, .. }) if skipped == &vec![a]
        ));
    }

    #[test]
    fn test_all_down_reports_empty_initiative_without_moving() {
        let (mut combat, ids) = started();
        combat.advance_turn().unwrap();
        for id in ids {
            combat.apply_damage(id, 100, None).unwrap();
        }

        assert_eq!(combat.advance_turn(), Err(CombatError::EmptyInitiative));
        assert_eq!((combat.round(), combat.turn_index()), (1, 1));
        assert!(combat.current_actor().is_none());
        assert!(combat.awaiting_completion());
        assert!(combat.complete().is_ok());
    }

    #[test]
    fn test_previous_turn_crosses_round_boundary() {
        let (mut combat, [_, _, b]) = started();
        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        assert_eq!((combat.round(), combat.turn_index()), (2, 0));

        let event = combat.previous_turn().unwrap();

        assert_eq!((combat.round(), combat.turn_index()), (1, 2));
        assert_eq!(
            event,
            CombatEvent::TurnReverted {
                round: 1,
                turn_index: 2,
                actor: b
            }
        );
    }

    #[test]
    fn test_previous_turn_stops_at_first_turn() {
        let (mut combat, _) = started();
        assert_eq!(combat.previous_turn(), Err(CombatError::NoPreviousTurn));
        assert_eq!((combat.round(), combat.turn_index()), (1, 0));
    }

    #[test]
    fn test_initiative_change_waits_for_new_round() {
        let (mut combat, [top, a, b]) = started();
        combat.set_initiative(b, 25).unwrap();

        assert_eq!(combat.initiative_order(), &[top, a, b]);

        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        let events = combat.advance_turn().unwrap();

        assert_eq!(combat.initiative_order(), &[b, top, a]);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(b));
        assert!(matches!(events.first(), Some(CombatEvent::InitiativeResorted { .. })));
    }

    #[test]
    fn test_order_is_kept_when_round_resort_is_disabled() {
        let (combat, [top, a, b]) = three_way();
        let mut combat = combat.with_resort_each_round(false);
        combat.start().unwrap();
        combat.set_initiative(b, 25).unwrap();

        for _ in 0..3 {
            combat.advance_turn().unwrap();
        }

        assert_eq!(combat.initiative_order(), &[top, a, b]);
    }

    #[test]
    fn test_explicit_resort_keeps_current_actor() {
        let (mut combat, [top, a, b]) = started();
        combat.advance_turn().unwrap();
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));

        combat.set_initiative(b, 30).unwrap();
        combat.resort_initiative().unwrap();

        assert_eq!(combat.initiative_order(), &[b, top, a]);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));
    }

    #[test]
    fn test_start_requires_a_living_combatant() {
        let mut combat = Combat::new("Empty", CombatMap::default());
        assert_eq!(combat.start(), Err(CombatError::EmptyInitiative));
        assert_eq!(combat.status(), CombatStatus::NotStarted);
    }

    #[test]
    fn test_start_skips_downed_leader() {
        let (mut combat, [top, a, _]) = three_way();
        combat.apply_damage(top, 10, None).unwrap();
        combat.start().unwrap();
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));
        assert_eq!(combat.turn_index(), 1);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (mut combat, [top, ..]) = three_way();

        assert!(matches!(
            combat.advance_turn(),
            Err(CombatError::InvalidTransition { .. })
        ));
        assert!(matches!(combat.complete(), Err(CombatError::InvalidTransition { .. })));

        combat.start().unwrap();
        assert!(matches!(combat.start(), Err(CombatError::InvalidTransition { .. })));

        combat.complete().unwrap();
        assert_eq!(combat.status(), CombatStatus::Completed);
        assert!(combat.completed_at.is_some());
        assert_eq!(combat.complete(), Err(CombatError::CombatCompleted));
        assert_eq!(
            combat.apply_damage(top, 1, None),
            Err(CombatError::CombatCompleted)
        );
    }

    #[test]
    fn test_move_entity_reference_scenario() {
        let mut map = CombatMap::new("Grid", 10, 10);
        map.add_obstacle(GridPosition::new(3, 3)).unwrap();
        let mut combat = Combat::new("Skirmish", map);
        let a = CombatEntity::new("A", CombatantType::Player, 10);
        let a_id = a.id;
        combat.add_entity(a).unwrap();
        let rules = MovementRules::default();

        assert!(combat.move_entity(a_id, GridPosition::new(3, 3), &rules).is_err());
        assert_eq!(combat.entity(a_id).unwrap().position, GridPosition::new(0, 0));

        let event = combat.move_entity(a_id, GridPosition::new(6, 0), &rules).unwrap();
        assert_eq!(
            event,
            CombatEvent::EntityMoved {
                entity_id: a_id,
                from: GridPosition::new(0, 0),
                to: GridPosition::new(6, 0)
            }
        );

        combat.move_entity(a_id, GridPosition::new(0, 0), &rules).unwrap();
        assert!(combat.move_entity(a_id, GridPosition::new(7, 0), &rules).is_err());
        assert_eq!(combat.entity(a_id).unwrap().position, GridPosition::new(0, 0));
    }

    #[test]
    fn test_move_leaves_health_and_conditions_alone() {
        let (mut combat, [top, ..]) = three_way();
        combat.set_condition(top, Condition::Prone).unwrap();
        combat.apply_damage(top, 3, None).unwrap();
        let before = combat.entity(top).unwrap().clone();

        combat
            .move_entity(top, GridPosition::new(2, 4), &MovementRules::default())
            .unwrap();

        let after = combat.entity(top).unwrap();
        assert_eq!(after.current_hp, before.current_hp);
        assert_eq!(after.conditions, before.conditions);
    }

    #[test]
    fn test_unknown_entity_is_reported() {
        let (mut combat, _) = three_way();
        let ghost = CombatEntityId::new();
        let snapshot = combat.clone();

        assert_eq!(
            combat.apply_damage(ghost, 5, None),
            Err(CombatError::UnknownEntity(ghost))
        );
        assert_eq!(
            combat.move_entity(ghost, GridPosition::new(1, 1), &MovementRules::default()),
            Err(CombatError::UnknownEntity(ghost))
        );
        assert_eq!(
            combat.set_condition(ghost, Condition::Stunned),
            Err(CombatError::UnknownEntity(ghost))
        );
        assert_eq!(combat, snapshot);
    }

    #[test]
    fn test_damage_crossing_zero_emits_downed() {
        let (mut combat, [top, a, _]) = three_way();
        combat.apply_damage(top, 5, None).unwrap();

        let events = combat.apply_damage(top, 7, Some(a)).unwrap();

        assert_eq!(combat.entity(top).unwrap().current_hp, 0);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            CombatEvent::EntityDowned {
                entity_id: top,
                source_id: Some(a)
            }
        );

        let again = combat.apply_damage(top, 1, Some(a)).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn test_unknown_damage_source_is_rejected() {
        let (mut combat, [top, ..]) = three_way();
        let ghost = CombatEntityId::new();
        assert_eq!(
            combat.apply_damage(top, 5, Some(ghost)),
            Err(CombatError::UnknownEntity(ghost))
        );
        assert_eq!(combat.entity(top).unwrap().current_hp, 10);
    }

    #[test]
    fn test_set_condition_is_idempotent() {
        let (mut combat, [top, ..]) = three_way();

        assert!(combat.set_condition(top, Condition::Stunned).unwrap().is_some());
        assert!(combat.set_condition(top, Condition::Stunned).unwrap().is_none());
        assert_eq!(combat.entity(top).unwrap().conditions, vec![Condition::Stunned]);

        assert!(combat.clear_condition(top, &Condition::Stunned).unwrap().is_some());
        assert!(combat.clear_condition(top, &Condition::Stunned).unwrap().is_none());
        assert!(combat.entity(top).unwrap().conditions.is_empty());
    }

    #[test]
    fn test_add_entity_validation() {
        let (mut combat, _) = three_way();

        let nameless = CombatEntity::new("  ", CombatantType::Npc, 5);
        assert!(matches!(combat.add_entity(nameless), Err(CombatError::Validation(_))));

        let stacked = CombatEntity::new("Stacked", CombatantType::Npc, 5);
        assert!(matches!(
            combat.add_entity(stacked),
            Err(CombatError::InvalidMove {
                reason: MoveRejection::Occupied { .. },
                ..
            })
        ));

        let outside = CombatEntity::new("Outside", CombatantType::Npc, 5)
            .with_position(GridPosition::new(10, 10));
        assert!(matches!(
            combat.add_entity(outside),
            Err(CombatError::InvalidMove {
                reason: MoveRejection::OutOfBounds,
                ..
            })
        ));
        assert_eq!(combat.entities().len(), 3);
    }

    #[test]
    fn test_entity_added_mid_combat_joins_end_of_order() {
        let (mut combat, [top, a, b]) = started();
        let late = entity("Latecomer", 30, 5);
        let late_id = late.id;

        combat.add_entity(late).unwrap();

        assert_eq!(combat.initiative_order(), &[top, a, b, late_id]);
        assert_eq!(combat.entity(late_id).unwrap().combat_id, Some(combat.id));
    }

    #[test]
    fn test_remove_entity_keeps_cursor_on_actor() {
        let (mut combat, [top, a, b]) = started();
        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        assert_eq!(combat.current_actor().map(|e| e.id), Some(b));

        combat.remove_entity(top).unwrap();

        assert_eq!(combat.initiative_order(), &[a, b]);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(b));
    }

    #[test]
    fn test_removing_last_actor_of_round_wraps() {
        let (mut combat, [top, a, b]) = started();
        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();

        combat.remove_entity(b).unwrap();

        assert_eq!(combat.initiative_order(), &[top, a]);
        assert_eq!((combat.round(), combat.turn_index()), (2, 0));
    }

    #[test]
    fn test_roll_initiative_respects_explicit_scores() {
        let mut combat = Combat::new("Rolls", CombatMap::default());
        let fixed = CombatEntity::new("Fixed", CombatantType::Npc, 5).with_initiative(12);
        let rolled = CombatEntity::new("Rolled", CombatantType::Monster, 5)
            .with_initiative_modifier(3)
            .with_position(GridPosition::new(1, 0));
        let (fixed_id, rolled_id) = (fixed.id, rolled.id);
        combat.add_entity(fixed).unwrap();
        combat.add_entity(rolled).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        combat.roll_initiative(&mut rng, false).unwrap();

        assert_eq!(combat.entity(fixed_id).unwrap().initiative, Some(12));
        let roll = combat.entity(rolled_id).unwrap().initiative.unwrap();
        assert!((4..=23).contains(&roll));

        combat.start().unwrap();
        assert!(matches!(
            combat.roll_initiative(&mut rng, true),
            Err(CombatError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_obstacle_cannot_be_placed_under_a_combatant() {
        let (mut combat, [top, ..]) = three_way();
        combat.apply_damage(top, 100, None).unwrap();

        assert!(combat.add_obstacle(GridPosition::new(2, 0)).is_err());
        assert!(combat.add_obstacle(GridPosition::new(5, 5)).unwrap().is_some());
        assert!(combat.add_difficult_terrain(GridPosition::new(2, 0)).unwrap().is_some());
    }

    #[test]
    fn test_execute_dispatches_commands() {
        let (mut combat, [top, ..]) = three_way();
        let rules = MovementRules::default();
        let mut rng = StdRng::seed_from_u64(1);

        let events = combat
            .execute(CombatCommand::Start, &rules, &mut rng)
            .unwrap();
        assert_eq!(events[0].event_type(), "CombatStarted");

        let events = combat
            .execute(
                CombatCommand::SetCondition {
                    entity_id: top,
                    condition: Condition::Blinded,
                },
                &rules,
                &mut rng,
            )
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_command_json_shape() {
        let id = CombatEntityId::new();
        let json = format!(
            r#"{{"command":"move_entity","entity_id":"{}","destination":{{"x":2,"y":3}}}}"#,
            id
        );
        let command: CombatCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(
            command,
            CombatCommand::MoveEntity {
                entity_id: id,
                destination: GridPosition::new(2, 3)
            }
        );

        let advance: CombatCommand = serde_json::from_str(r#"{"command":"advance_turn"}"#).unwrap();
        assert_eq!(advance, CombatCommand::AdvanceTurn);
    }

    #[test]
    fn test_persisted_shape_restores_dates() {
        let (combat, _) = started();
        let json = serde_json::to_value(&combat).unwrap();

        assert_eq!(json["status"], "active");
        assert!(json["started_at"].as_str().is_some());

        let restored: Combat = serde_json::from_value(json).unwrap();
        assert_eq!(restored, combat);
    }

    #[test]
    fn test_actor_downed_mid_turn_stays_current_until_advance() {
        let (mut combat, [top, a, _]) = started();

        combat.apply_damage(top, 50, Some(a)).unwrap();
        assert_eq!(combat.current_actor().map(|e| e.id), Some(top));
        assert!(combat.current_actor().is_some_and(|e| e.is_down()));

        combat.advance_turn().unwrap();
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));

        // The downed actor is skipped when the order wraps
        combat.advance_turn().unwrap();
        combat.advance_turn().unwrap();
        assert_eq!(combat.round(), 2);
        assert_eq!(combat.current_actor().map(|e| e.id), Some(a));
    }
}
