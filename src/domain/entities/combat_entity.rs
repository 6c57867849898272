//! CombatEntity - A combatant taking part in one encounter
//!
//! Downed combatants (current HP <= 0) stay registered so the log and recap
//! remain accurate; the turn scheduler simply skips them.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{CombatEntityId, CombatId, Condition, GridPosition};

/// Which side of the table controls a combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatantType {
    Player,
    Npc,
    Monster,
}

impl CombatantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CombatantType::Player => "player",
            CombatantType::Npc => "npc",
            CombatantType::Monster => "monster",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "player" | "pc" => Some(CombatantType::Player),
            "npc" => Some(CombatantType::Npc),
            "monster" | "enemy" => Some(CombatantType::Monster),
            _ => None,
        }
    }
}

/// A combatant on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEntity {
    pub id: CombatEntityId,
    /// Set when the entity is registered with a combat
    pub combat_id: Option<CombatId>,
    pub name: String,
    pub entity_type: CombatantType,
    pub position: GridPosition,
    pub current_hp: i32,
    pub max_hp: i32,
    pub armor_class: i32,
    /// Initiative score; `None` until set or rolled
    pub initiative: Option<i32>,
    /// Added to the d20 when initiative is rolled
    #[serde(default)]
    pub initiative_modifier: i32,
    /// Walking speed in feet; the combat's default applies when absent
    #[serde(default)]
    pub speed_feet: Option<u32>,
    /// Active conditions in the order they were applied
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl CombatEntity {
    pub fn new(name: impl Into<String>, entity_type: CombatantType, max_hp: i32) -> Self {
        Self {
            id: CombatEntityId::new(),
            combat_id: None,
            name: name.into(),
            entity_type,
            position: GridPosition::new(0, 0),
            current_hp: max_hp,
            max_hp,
            armor_class: 10,
            initiative: None,
            initiative_modifier: 0,
            speed_feet: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_position(mut self, position: GridPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_current_hp(mut self, current_hp: i32) -> Self {
        self.current_hp = current_hp;
        self
    }

    pub fn with_armor_class(mut self, armor_class: i32) -> Self {
        self.armor_class = armor_class;
        self
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = Some(initiative);
        self
    }

    pub fn with_initiative_modifier(mut self, modifier: i32) -> Self {
        self.initiative_modifier = modifier;
        self
    }

    pub fn with_speed(mut self, speed_feet: u32) -> Self {
        self.speed_feet = Some(speed_feet);
        self
    }

    /// Current HP at or below zero
    pub fn is_down(&self) -> bool {
        self.current_hp <= 0
    }

    pub fn is_alive(&self) -> bool {
        !self.is_down()
    }

    /// Reduce HP, clamping at zero
    pub fn apply_damage(&mut self, amount: u32) -> HitPointChange {
        let previous = self.current_hp;
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.current_hp = previous.saturating_sub(amount).max(0);
        HitPointChange {
            previous,
            current: self.current_hp,
        }
    }

    /// Restore HP, clamping at the maximum
    pub fn apply_healing(&mut self, amount: u32) -> HitPointChange {
        let previous = self.current_hp;
        let amount = i32::try_from(amount).unwrap_or(i32::MAX);
        self.current_hp = previous.max(0).saturating_add(amount).min(self.max_hp);
        HitPointChange {
            previous,
            current: self.current_hp,
        }
    }

    pub fn has_condition(&self, condition: &Condition) -> bool {
        self.conditions.contains(condition)
    }

    /// Returns `false` when the condition was already present
    pub fn add_condition(&mut self, condition: Condition) -> bool {
        if self.has_condition(&condition) {
            return false;
        }
        self.conditions.push(condition);
        true
    }

    /// Returns `false` when the condition was not present
    pub fn remove_condition(&mut self, condition: &Condition) -> bool {
        match self.conditions.iter().position(|c| c == condition) {
            Some(pos) => {
                self.conditions.remove(pos);
                true
            }
            None => false,
        }
    }
}

/// Before/after hit points for a damage or healing command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPointChange {
    pub previous: i32,
    pub current: i32,
}

impl HitPointChange {
    /// Crossed from above zero to zero or below
    pub fn went_down(&self) -> bool {
        self.previous > 0 && self.current <= 0
    }

    /// Crossed from zero or below back above zero
    pub fn revived(&self) -> bool {
        self.previous <= 0 && self.current > 0
    }

    /// HP actually lost or gained (always non-negative)
    pub fn magnitude(&self) -> u32 {
        (i64::from(self.current) - i64::from(self.previous)).unsigned_abs() as u32
    }
}
