//! Recap generation - Post-encounter summary reduced from the combat log
//!
//! The generator only looks at the final registry state and the log. It
//! never mutates either, so regenerating against the same log yields the
//! same numbers.

use std::collections::HashMap;

use chrono::Utc;

use crate::domain::aggregates::{render_message, Combat, UNKNOWN_ENTITY_NAME};
use crate::domain::entities::{
    CombatLogEntry, CombatRecap, EntityRecapStats, LogEntryType, MomentKind, MvpSummary,
    NotableMoment,
};
use crate::domain::value_objects::{CombatEntityId, CombatSettings, RecapId};

/// Scores a combatant for the "most valuable combatant" pick
pub trait MvpPolicy: Send + Sync {
    fn score(&self, stats: &EntityRecapStats) -> i64;

    fn name(&self) -> &str;
}

/// `damage × d + healing × h + kills × k`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightedScore {
    pub damage_weight: i64,
    pub healing_weight: i64,
    pub kill_weight: i64,
}

impl Default for WeightedScore {
    fn default() -> Self {
        Self {
            damage_weight: 1,
            healing_weight: 2,
            kill_weight: 5,
        }
    }
}

impl From<&CombatSettings> for WeightedScore {
    fn from(settings: &CombatSettings) -> Self {
        Self {
            damage_weight: settings.mvp_damage_weight,
            healing_weight: settings.mvp_healing_weight,
            kill_weight: settings.mvp_kill_weight,
        }
    }
}

impl MvpPolicy for WeightedScore {
    fn score(&self, stats: &EntityRecapStats) -> i64 {
        let weigh = |value: u64, weight: i64| {
            i64::try_from(value)
                .unwrap_or(i64::MAX)
                .saturating_mul(weight)
        };
        weigh(stats.damage_dealt, self.damage_weight)
            .saturating_add(weigh(stats.healing_given, self.healing_weight))
            .saturating_add(weigh(u64::from(stats.kills), self.kill_weight))
    }

    fn name(&self) -> &str {
        "weighted_score"
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecapGenerator<P = WeightedScore> {
    policy: P,
}

impl<P: MvpPolicy> RecapGenerator<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Reduce a combat and its log into a fresh recap
    pub fn generate(&self, combat: &Combat, entries: &[CombatLogEntry]) -> CombatRecap {
        let mut ordered: Vec<&CombatLogEntry> = entries.iter().collect();
        ordered.sort_by_key(|e| e.sequence);

        let entity_stats = self.collect_stats(combat, &ordered);
        let mvp = self.pick_mvp(combat, &entity_stats);
        let notable_moments = notable_moments(combat, &ordered);

        let started = combat
            .started_at
            .or_else(|| ordered.first().map(|e| e.timestamp));
        let ended = combat
            .completed_at
            .or_else(|| ordered.last().map(|e| e.timestamp));
        let duration_seconds = match (started, ended) {
            (Some(start), Some(end)) => (end - start).num_seconds().max(0),
            _ => 0,
        };

        let mut recap = CombatRecap {
            id: RecapId::new(),
            combat_id: combat.id,
            combat_name: combat.name.clone(),
            total_rounds: combat.round(),
            duration_seconds,
            entity_stats,
            mvp,
            notable_moments,
            narrative: String::new(),
            generated_at: Utc::now(),
        };
        recap.narrative = narrative(&recap);
        recap
    }

    fn collect_stats(&self, combat: &Combat, entries: &[&CombatLogEntry]) -> Vec<EntityRecapStats> {
        let mut stats: Vec<EntityRecapStats> = combat
            .entities()
            .iter()
            .map(|e| EntityRecapStats {
                entity_type: Some(e.entity_type),
                is_down: e.is_down(),
                ..EntityRecapStats::new(e.id, e.name.clone())
            })
            .collect();
        let mut index: HashMap<CombatEntityId, usize> =
            stats.iter().enumerate().map(|(i, s)| (s.entity_id, i)).collect();

        // Entities removed since they were logged still get a row
        let mut slot = |id: CombatEntityId, stats: &mut Vec<EntityRecapStats>| -> usize {
            *index.entry(id).or_insert_with(|| {
                stats.push(EntityRecapStats::new(id, UNKNOWN_ENTITY_NAME));
                stats.len() - 1
            })
        };

        for entry in entries {
            let amount = u64::from(entry.amount.unwrap_or(0));
            match entry.entry_type {
                LogEntryType::Damage => {
                    if let Some(source) = entry.source_id {
                        let i = slot(source, &mut stats);
                        stats[i].damage_dealt += amount;
                    }
                    if let Some(target) = entry.target_id {
                        let i = slot(target, &mut stats);
                        stats[i].damage_taken += amount;
                    }
                }
                LogEntryType::Healing => {
                    if let Some(source) = entry.source_id {
                        let i = slot(source, &mut stats);
                        stats[i].healing_given += amount;
                    }
                    if let Some(target) = entry.target_id {
                        let i = slot(target, &mut stats);
                        stats[i].healing_received += amount;
                    }
                }
                LogEntryType::Death => {
                    if let Some(source) = entry.source_id {
                        if Some(source) != entry.target_id {
                            let i = slot(source, &mut stats);
                            stats[i].kills += 1;
                        }
                    }
                }
                _ => {}
            }
        }

        stats
    }

    /// Highest score among registered combatants; earlier registration wins ties
    fn pick_mvp(&self, combat: &Combat, stats: &[EntityRecapStats]) -> Option<MvpSummary> {
        let mut best: Option<(&EntityRecapStats, i64)> = None;
        for entry in stats.iter().filter(|s| combat.entity(s.entity_id).is_some()) {
            let score = self.policy.score(entry);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((entry, score));
            }
        }

        best.filter(|(_, score)| *score > 0)
            .map(|(entry, score)| MvpSummary {
                entity_id: entry.entity_id,
                name: entry.name.clone(),
                score,
                policy: self.policy.name().to_string(),
            })
    }
}

fn notable_moments(combat: &Combat, entries: &[&CombatLogEntry]) -> Vec<NotableMoment> {
    let biggest = |entry_type: LogEntryType| {
        entries
            .iter()
            .copied()
            .filter(|e| e.entry_type == entry_type && e.amount.unwrap_or(0) > 0)
            .fold(None::<&CombatLogEntry>, |best, e| match best {
                Some(b) if b.amount >= e.amount => Some(b),
                _ => Some(e),
            })
            .map(|e| e.sequence)
    };
    let biggest_hit = biggest(LogEntryType::Damage);
    let biggest_heal = biggest(LogEntryType::Healing);

    entries
        .iter()
        .filter_map(|e| {
            let kind = match e.entry_type {
                LogEntryType::Death => MomentKind::Death,
                LogEntryType::DmNote => MomentKind::DmNote,
                LogEntryType::Damage if Some(e.sequence) == biggest_hit => MomentKind::BiggestHit,
                LogEntryType::Healing if Some(e.sequence) == biggest_heal => {
                    MomentKind::BiggestHeal
                }
                _ => return None,
            };
            Some(NotableMoment {
                kind,
                round: e.round,
                description: render_message(&e.message, combat),
                timestamp: e.timestamp,
            })
        })
        .collect()
}

fn narrative(recap: &CombatRecap) -> String {
    let rounds = match recap.total_rounds {
        1 => "1 round".to_string(),
        n => format!("{} rounds", n),
    };
    let mut text = format!(
        "{} lasted {}. {} damage was dealt and {} hit points were restored.",
        recap.combat_name,
        rounds,
        recap.total_damage(),
        recap.total_healing()
    );

    let fallen: Vec<&str> = recap
        .entity_stats
        .iter()
        .filter(|s| s.is_down)
        .map(|s| s.name.as_str())
        .collect();
    if !fallen.is_empty() {
        text.push_str(&format!(" Fallen: {}.", fallen.join(", ")));
    }

    if let Some(mvp) = &recap.mvp {
        text.push_str(&format!(
            " {} was the most valuable combatant with a score of {}.",
            mvp.name, mvp.score
        ));
    }

    text
}
