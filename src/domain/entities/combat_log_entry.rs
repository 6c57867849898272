//! CombatLogEntry - Immutable record of something that happened in a combat
//!
//! Messages may embed `{entity:<uuid>}` tokens. They are resolved to the
//! entity's current name when the entry is rendered, never when it is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CombatEntityId, CombatId, LogEntryId};

/// Prefix of an embedded entity reference inside a log message
pub const ENTITY_TOKEN_PREFIX: &str = "{entity:";

/// Build the placeholder token for an entity
pub fn entity_token(id: CombatEntityId) -> String {
    format!("{}{}}}", ENTITY_TOKEN_PREFIX, id)
}

/// Categories of combat log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEntryType {
    Action,
    Damage,
    Healing,
    Condition,
    Death,
    System,
    DmNote,
}

impl LogEntryType {
    pub const ALL: [LogEntryType; 7] = [
        LogEntryType::Action,
        LogEntryType::Damage,
        LogEntryType::Healing,
        LogEntryType::Condition,
        LogEntryType::Death,
        LogEntryType::System,
        LogEntryType::DmNote,
    ];

    /// Label used in exports
    pub fn label(&self) -> &'static str {
        match self {
            LogEntryType::Action => "Action",
            LogEntryType::Damage => "Damage",
            LogEntryType::Healing => "Healing",
            LogEntryType::Condition => "Condition",
            LogEntryType::Death => "Death",
            LogEntryType::System => "System",
            LogEntryType::DmNote => "DM Note",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogEntryType::Action => "action",
            LogEntryType::Damage => "damage",
            LogEntryType::Healing => "healing",
            LogEntryType::Condition => "condition",
            LogEntryType::Death => "death",
            LogEntryType::System => "system",
            LogEntryType::DmNote => "dm_note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

/// A log entry as requested by a caller, before it is sequenced and stamped
#[derive(Debug, Clone, PartialEq)]
pub struct NewLogEntry {
    pub entry_type: LogEntryType,
    pub message: String,
    pub source_id: Option<CombatEntityId>,
    pub target_id: Option<CombatEntityId>,
    pub amount: Option<u32>,
    pub round: u32,
}

impl NewLogEntry {
    pub fn new(entry_type: LogEntryType, message: impl Into<String>) -> Self {
        Self {
            entry_type,
            message: message.into(),
            source_id: None,
            target_id: None,
            amount: None,
            round: 0,
        }
    }

    pub fn with_source(mut self, source_id: Option<CombatEntityId>) -> Self {
        self.source_id = source_id;
        self
    }

    pub fn with_target(mut self, target_id: Option<CombatEntityId>) -> Self {
        self.target_id = target_id;
        self
    }

    pub fn with_amount(mut self, amount: u32) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn in_round(mut self, round: u32) -> Self {
        self.round = round;
        self
    }
}

/// A stored log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatLogEntry {
    pub id: LogEntryId,
    pub combat_id: CombatId,
    /// Insertion order within the combat; breaks timestamp ties
    pub sequence: u64,
    pub entry_type: LogEntryType,
    pub message: String,
    pub source_id: Option<CombatEntityId>,
    pub target_id: Option<CombatEntityId>,
    /// Damage or healing magnitude, when applicable
    #[serde(default)]
    pub amount: Option<u32>,
    /// 0 when logged outside a round
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_token_format() {
        let id = CombatEntityId::new();
        assert_eq!(entity_token(id), format!("{{entity:{}}}", id));
    }

    #[test]
    fn test_type_parse_accepts_labels_and_keys() {
        assert_eq!(LogEntryType::parse("damage"), Some(LogEntryType::Damage));
        assert_eq!(LogEntryType::parse("DM Note"), Some(LogEntryType::DmNote));
        assert_eq!(LogEntryType::parse("dm-note"), Some(LogEntryType::DmNote));
        assert_eq!(LogEntryType::parse("all"), None);
    }

    #[test]
    fn test_type_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&LogEntryType::DmNote).unwrap(), "\"dm_note\"");
    }
}
