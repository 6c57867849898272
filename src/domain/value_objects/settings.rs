//! Combat engine settings value object
//!
//! Tunables for movement and recap scoring. Loaded from `WRLDBLDR_COMBAT_*`
//! environment variables with defaults for anything missing or unparsable.

use serde::{Deserialize, Serialize};

/// All configurable combat settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatSettings {
    // Movement
    pub feet_per_cell: u32,
    pub default_speed_feet: u32,
    pub difficult_terrain_doubles_cost: bool,

    // Turn order
    pub resort_initiative_each_round: bool,

    // Recap scoring
    pub mvp_damage_weight: i64,
    pub mvp_healing_weight: i64,
    pub mvp_kill_weight: i64,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            feet_per_cell: 5,
            default_speed_feet: 30,
            difficult_terrain_doubles_cost: false,
            resort_initiative_each_round: true,
            mvp_damage_weight: 1,
            mvp_healing_weight: 2,
            mvp_kill_weight: 5,
        }
    }
}

impl CombatSettings {
    /// Load from environment variables, using defaults for missing values
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            feet_per_cell: env_or("WRLDBLDR_COMBAT_FEET_PER_CELL", defaults.feet_per_cell),
            default_speed_feet: env_or("WRLDBLDR_COMBAT_DEFAULT_SPEED", defaults.default_speed_feet),
            difficult_terrain_doubles_cost: env_or("WRLDBLDR_COMBAT_DIFFICULT_TERRAIN_COST", defaults.difficult_terrain_doubles_cost),
            resort_initiative_each_round: env_or("WRLDBLDR_COMBAT_RESORT_EACH_ROUND", defaults.resort_initiative_each_round),
            mvp_damage_weight: env_or("WRLDBLDR_MVP_DAMAGE_WEIGHT", defaults.mvp_damage_weight),
            mvp_healing_weight: env_or("WRLDBLDR_MVP_HEALING_WEIGHT", defaults.mvp_healing_weight),
            mvp_kill_weight: env_or("WRLDBLDR_MVP_KILL_WEIGHT", defaults.mvp_kill_weight),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
