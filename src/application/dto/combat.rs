use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::services::{AddLogEntryRequest, CommandOutcome, RenderedLogEntry};
use crate::domain::aggregates::{render_message, Combat, LogFilter};
use crate::domain::entities::{
    CombatEntity, CombatLogEntry, CombatMap, CombatantType, LogEntryType,
};
use crate::domain::error::CombatError;
use crate::domain::events::CombatEvent;
use crate::domain::value_objects::{CombatEntityId, CombatId, Condition, GridPosition};

// ============================================================================
// Parsing helpers
// ============================================================================

pub fn parse_entity_type(value: &str) -> Result<CombatantType, CombatError> {
    CombatantType::parse(value)
        .ok_or_else(|| CombatError::Validation(format!("Unknown combatant type: {}", value)))
}

/// `None` and "all" both mean every type
pub fn parse_log_type(value: Option<&str>) -> Result<Option<LogEntryType>, CombatError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => LogEntryType::parse(v)
            .map(Some)
            .ok_or_else(|| CombatError::Validation(format!("Unknown log entry type: {}", v))),
    }
}

fn parse_entity_id(value: &str) -> Result<CombatEntityId, CombatError> {
    CombatEntityId::parse(value)
        .ok_or_else(|| CombatError::Validation(format!("Invalid entity ID: {}", value)))
}

// ============================================================================
// Request DTOs
// ============================================================================

/// Map dimensions and terrain for a new combat
#[derive(Debug, Clone, Deserialize)]
pub struct MapRequestDto {
    #[serde(default = "default_map_name")]
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub obstacles: Vec<GridPosition>,
    #[serde(default)]
    pub difficult_terrain: Vec<GridPosition>,
}

fn default_map_name() -> String {
    "Battlefield".to_string()
}

impl MapRequestDto {
    pub fn into_map(self) -> Result<CombatMap, CombatError> {
        let mut map = CombatMap::new(self.name, self.width, self.height);
        for cell in self.obstacles {
            map.add_obstacle(cell)?;
        }
        for cell in self.difficult_terrain {
            map.add_difficult_terrain(cell)?;
        }
        Ok(map)
    }
}

/// Request to register a combatant
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntityRequestDto {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub position: GridPosition,
    pub max_hp: i32,
    #[serde(default)]
    pub current_hp: Option<i32>,
    #[serde(default)]
    pub armor_class: Option<i32>,
    #[serde(default)]
    pub initiative: Option<i32>,
    #[serde(default)]
    pub initiative_modifier: i32,
    #[serde(default)]
    pub speed_feet: Option<u32>,
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl CreateEntityRequestDto {
    pub fn into_entity(self) -> Result<CombatEntity, CombatError> {
        let entity_type = parse_entity_type(&self.entity_type)?;
        let mut entity = CombatEntity::new(self.name, entity_type, self.max_hp)
            .with_position(self.position)
            .with_initiative_modifier(self.initiative_modifier);

        if let Some(hp) = self.current_hp {
            entity = entity.with_current_hp(hp);
        }
        if let Some(ac) = self.armor_class {
            entity = entity.with_armor_class(ac);
        }
        if let Some(initiative) = self.initiative {
            entity = entity.with_initiative(initiative);
        }
        if let Some(speed) = self.speed_feet {
            entity = entity.with_speed(speed);
        }
        for condition in self.conditions {
            entity.add_condition(Condition::parse(&condition));
        }
        Ok(entity)
    }
}

/// Request to create a combat
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCombatRequestDto {
    pub name: String,
    #[serde(default)]
    pub map: Option<MapRequestDto>,
    #[serde(default)]
    pub resort_each_round: Option<bool>,
    #[serde(default)]
    pub entities: Vec<CreateEntityRequestDto>,
}

/// Request to append a log entry
#[derive(Debug, Clone, Deserialize)]
pub struct AddLogEntryRequestDto {
    pub message: String,
    #[serde(default = "default_log_type")]
    pub entry_type: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub amount: Option<u32>,
}

fn default_log_type() -> String {
    LogEntryType::DmNote.as_str().to_string()
}

impl AddLogEntryRequestDto {
    pub fn into_request(self) -> Result<AddLogEntryRequest, CombatError> {
        let entry_type = parse_log_type(Some(&self.entry_type))?.ok_or_else(|| {
            CombatError::Validation("A log entry needs a concrete type".to_string())
        })?;
        Ok(AddLogEntryRequest {
            entry_type,
            message: self.message,
            source_id: self.source_id.as_deref().map(parse_entity_id).transpose()?,
            target_id: self.target_id.as_deref().map(parse_entity_id).transpose()?,
            amount: self.amount,
        })
    }
}

/// Query string for reading the log
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQueryDto {
    #[serde(default, rename = "type")]
    pub entry_type: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

impl LogQueryDto {
    pub fn into_filter(self) -> Result<LogFilter, CombatError> {
        let filter = LogFilter {
            entry_type: parse_log_type(self.entry_type.as_deref())?,
            search: None,
        };
        Ok(match self.search {
            Some(search) => filter.with_search(search),
            None => filter,
        })
    }
}

/// Request to replace a recap narrative
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateNarrativeRequestDto {
    pub narrative: String,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CombatEntityResponseDto {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub position: GridPosition,
    pub current_hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    pub initiative: Option<i32>,
    pub initiative_modifier: i32,
    pub speed_feet: Option<u32>,
    pub conditions: Vec<String>,
    pub is_down: bool,
}

impl From<&CombatEntity> for CombatEntityResponseDto {
    fn from(entity: &CombatEntity) -> Self {
        Self {
            id: entity.id.to_string(),
            name: entity.name.clone(),
            entity_type: entity.entity_type.as_str().to_string(),
            position: entity.position,
            current_hp: entity.current_hp,
            max_hp: entity.max_hp,
            armor_class: entity.armor_class,
            initiative: entity.initiative,
            initiative_modifier: entity.initiative_modifier,
            speed_feet: entity.speed_feet,
            conditions: entity.conditions.iter().map(|c| c.label().to_string()).collect(),
            is_down: entity.is_down(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MapResponseDto {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub obstacles: Vec<GridPosition>,
    pub difficult_terrain: Vec<GridPosition>,
}

impl From<&CombatMap> for MapResponseDto {
    fn from(map: &CombatMap) -> Self {
        Self {
            name: map.name.clone(),
            width: map.width,
            height: map.height,
            obstacles: map.obstacles().copied().collect(),
            difficult_terrain: map.difficult_terrain().copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CombatResponseDto {
    pub id: String,
    pub name: String,
    pub status: String,
    pub round: u32,
    pub turn_index: usize,
    pub current_actor_id: Option<String>,
    pub awaiting_completion: bool,
    pub initiative_order: Vec<String>,
    pub entities: Vec<CombatEntityResponseDto>,
    pub map: MapResponseDto,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Combat> for CombatResponseDto {
    fn from(combat: &Combat) -> Self {
        Self {
            id: combat.id.to_string(),
            name: combat.name.clone(),
            status: combat.status().as_str().to_string(),
            round: combat.round(),
            turn_index: combat.turn_index(),
            current_actor_id: combat.current_actor().map(|e| e.id.to_string()),
            awaiting_completion: combat.awaiting_completion(),
            initiative_order: combat
                .initiative_order()
                .iter()
                .map(ToString::to_string)
                .collect(),
            entities: combat
                .entities()
                .iter()
                .map(CombatEntityResponseDto::from)
                .collect(),
            map: MapResponseDto::from(combat.map()),
            created_at: combat.created_at,
            started_at: combat.started_at,
            completed_at: combat.completed_at,
        }
    }
}

/// Compact listing entry
#[derive(Debug, Clone, Serialize)]
pub struct CombatSummaryDto {
    pub id: String,
    pub name: String,
    pub status: String,
    pub round: u32,
    pub entity_count: usize,
}

impl From<&Combat> for CombatSummaryDto {
    fn from(combat: &Combat) -> Self {
        Self {
            id: combat.id.to_string(),
            name: combat.name.clone(),
            status: combat.status().as_str().to_string(),
            round: combat.round(),
            entity_count: combat.entities().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntryResponseDto {
    pub id: String,
    pub sequence: u64,
    pub entry_type: LogEntryType,
    /// Message with entity tokens left in place
    pub message: String,
    /// Message with entity tokens replaced by current names
    pub rendered: String,
    pub source_id: Option<String>,
    pub target_id: Option<String>,
    pub amount: Option<u32>,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

impl LogEntryResponseDto {
    pub fn new(entry: &CombatLogEntry, rendered: String) -> Self {
        Self {
            id: entry.id.to_string(),
            sequence: entry.sequence,
            entry_type: entry.entry_type,
            message: entry.message.clone(),
            rendered,
            source_id: entry.source_id.map(|id| id.to_string()),
            target_id: entry.target_id.map(|id| id.to_string()),
            amount: entry.amount,
            round: entry.round,
            timestamp: entry.timestamp,
        }
    }
}

impl From<RenderedLogEntry> for LogEntryResponseDto {
    fn from(value: RenderedLogEntry) -> Self {
        Self::new(&value.entry, value.rendered)
    }
}

/// Result of a command: the new state plus what happened
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponseDto {
    pub combat: CombatResponseDto,
    pub events: Vec<CombatEvent>,
    pub log_entries: Vec<LogEntryResponseDto>,
}

impl From<CommandOutcome> for CommandResponseDto {
    fn from(outcome: CommandOutcome) -> Self {
        let log_entries = outcome
            .log_entries
            .iter()
            .map(|e| {
                let rendered = render_message(&e.message, &outcome.combat);
                LogEntryResponseDto::new(e, rendered)
            })
            .collect();
        Self {
            combat: CombatResponseDto::from(&outcome.combat),
            events: outcome.events,
            log_entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidMovesResponseDto {
    pub combat_id: String,
    pub entity_id: String,
    pub moves: Vec<GridPosition>,
}

impl ValidMovesResponseDto {
    pub fn new(combat_id: CombatId, entity_id: CombatEntityId, moves: Vec<GridPosition>) -> Self {
        Self {
            combat_id: combat_id.to_string(),
            entity_id: entity_id.to_string(),
            moves,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearLogResponseDto {
    pub removed: usize,
}
