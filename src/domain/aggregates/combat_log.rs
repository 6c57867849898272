//! Combat Log Aggregate - Ordered, append-only record of one combat
//!
//! Entries are kept in insertion order. Entity references inside messages
//! are resolved against a `NameLookup` at render time, so renaming a
//! combatant changes how old entries read without rewriting them.

use chrono::{DateTime, Utc};

use crate::domain::entities::{CombatLogEntry, LogEntryType, NewLogEntry, ENTITY_TOKEN_PREFIX};
use crate::domain::value_objects::{CombatEntityId, CombatId, LogEntryId};

/// Placeholder for references to combatants that no longer exist
pub const UNKNOWN_ENTITY_NAME: &str = "Unknown";

/// Resolves entity ids to their current display name
pub trait NameLookup {
    fn display_name(&self, id: CombatEntityId) -> Option<&str>;
}

/// Narrowing applied when reading the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// `None` means every type
    pub entry_type: Option<LogEntryType>,
    /// Case-insensitive substring of the rendered message
    pub search: Option<String>,
}

impl LogFilter {
    pub fn of_type(entry_type: LogEntryType) -> Self {
        Self {
            entry_type: Some(entry_type),
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        let search = search.into();
        self.search = (!search.trim().is_empty()).then_some(search);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CombatLog {
    combat_id: CombatId,
    entries: Vec<CombatLogEntry>,
    next_sequence: u64,
}

impl CombatLog {
    pub fn new(combat_id: CombatId) -> Self {
        Self {
            combat_id,
            entries: Vec::new(),
            next_sequence: 1,
        }
    }

    /// Rebuild a log from stored entries
    pub fn from_entries(combat_id: CombatId, mut entries: Vec<CombatLogEntry>) -> Self {
        entries.sort_by_key(|e| e.sequence);
        let next_sequence = entries.last().map_or(1, |e| e.sequence + 1);
        Self {
            combat_id,
            entries,
            next_sequence,
        }
    }

    pub fn combat_id(&self) -> CombatId {
        self.combat_id
    }

    pub fn entries(&self) -> &[CombatLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence and timestamp entries without committing them
    ///
    /// Timestamps never go backwards, even if the wall clock does.
    pub fn stage(&self, pending: Vec<NewLogEntry>) -> Vec<CombatLogEntry> {
        let mut sequence = self.next_sequence;
        let mut floor = self.entries.last().map(|e| e.timestamp);

        pending
            .into_iter()
            .map(|new| {
                let timestamp = monotonic(Utc::now(), floor);
                floor = Some(timestamp);
                let entry = CombatLogEntry {
                    id: LogEntryId::new(),
                    combat_id: self.combat_id,
                    sequence,
                    entry_type: new.entry_type,
                    message: new.message,
                    source_id: new.source_id,
                    target_id: new.target_id,
                    amount: new.amount,
                    round: new.round,
                    timestamp,
                };
                sequence += 1;
                entry
            })
            .collect()
    }

    /// Commit entries produced by `stage`
    pub fn extend(&mut self, staged: Vec<CombatLogEntry>) {
        for entry in staged {
            self.next_sequence = self.next_sequence.max(entry.sequence + 1);
            self.entries.push(entry);
        }
    }

    pub fn append(&mut self, new: NewLogEntry) -> &CombatLogEntry {
        let staged = self.stage(vec![new]);
        self.extend(staged);
        // Non-empty: one entry was just pushed
        &self.entries[self.entries.len() - 1]
    }

    /// Entries matching the filter, in log order
    pub fn filter<N: NameLookup + ?Sized>(
        &self,
        filter: &LogFilter,
        names: &N,
    ) -> Vec<&CombatLogEntry> {
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());
        self.entries
            .iter()
            .filter(|e| filter.entry_type.map_or(true, |t| e.entry_type == t))
            .filter(|e| match &needle {
                Some(needle) => render_message(&e.message, names)
                    .to_lowercase()
                    .contains(needle.as_str()),
                None => true,
            })
            .collect()
    }

    /// Plain-text transcript, one line per entry
    pub fn export<N: NameLookup + ?Sized>(&self, names: &N) -> String {
        self.entries
            .iter()
            .map(|e| export_line(e, names))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Remove every entry; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }
}

fn monotonic(now: DateTime<Utc>, floor: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    }
}

/// `HH:MM:SS [Rn] [Label] message`; the round tag is omitted outside a round
pub fn export_line<N: NameLookup + ?Sized>(entry: &CombatLogEntry, names: &N) -> String {
    let time = entry.timestamp.format("%H:%M:%S");
    let message = render_message(&entry.message, names);
    if entry.round > 0 {
        format!(
            "{} [R{}] [{}] {}",
            time,
            entry.round,
            entry.entry_type.label(),
            message
        )
    } else {
        format!("{} [{}] {}", time, entry.entry_type.label(), message)
    }
}

/// Replace `{entity:<uuid>}` tokens with current names
///
/// Tokens whose id cannot be parsed are left as written.
pub fn render_message<N: NameLookup + ?Sized>(message: &str, names: &N) -> String {
    let mut rendered = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(start) = rest.find(ENTITY_TOKEN_PREFIX) {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + ENTITY_TOKEN_PREFIX.len()..];

        let resolved = after.find('}').and_then(|end| {
            CombatEntityId::parse(after[..end].trim()).map(|id| (id, end))
        });

        match resolved {
            Some((id, end)) => {
                rendered.push_str(names.display_name(id).unwrap_or(UNKNOWN_ENTITY_NAME));
                rest = &after[end + 1..];
            }
            None => {
                rendered.push_str(ENTITY_TOKEN_PREFIX);
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

impl NameLookup for std::collections::HashMap<CombatEntityId, String> {
    fn display_name(&self, id: CombatEntityId) -> Option<&str> {
        self.get(&id).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::entity_token;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn names(pairs: &[(CombatEntityId, &str)]) -> HashMap<CombatEntityId, String> {
        pairs.iter().map(|(id, n)| (*id, n.to_string())).collect()
    }

    #[test]
    fn test_render_resolves_current_names() {
        let goblin = CombatEntityId::new();
        let message = format!("{} attacks", entity_token(goblin));

        assert_eq!(
            render_message(&message, &names(&[(goblin, "Goblin")])),
            "Goblin attacks"
        );
        assert_eq!(
            render_message(&message, &names(&[(goblin, "Goblin Boss")])),
            "Goblin Boss attacks"
        );
    }

    #[test]
    fn test_render_unknown_and_malformed_tokens() {
        let missing = CombatEntityId::new();
        let message = format!("{} hits {{entity:nope}} twice", entity_token(missing));

        assert_eq!(
            render_message(&message, &names(&[])),
            "Unknown hits {entity:nope} twice"
        );
        assert_eq!(render_message("dangling {entity:", &names(&[])), "dangling {entity:");
    }

    #[test]
    fn test_append_assigns_increasing_sequence() {
        let mut log = CombatLog::new(CombatId::new());
        log.append(NewLogEntry::new(LogEntryType::System, "Combat started"));
        log.append(NewLogEntry::new(LogEntryType::Action, "Swing").in_round(1));

        let sequences: Vec<u64> = log.entries().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
        assert!(log.entries()[0].timestamp <= log.entries()[1].timestamp);
    }

    #[test]
    fn test_stage_does_not_commit() {
        let log = CombatLog::new(CombatId::new());
        let staged = log.stage(vec![
            NewLogEntry::new(LogEntryType::System, "a"),
            NewLogEntry::new(LogEntryType::System, "b"),
        ]);

        assert_eq!(staged.len(), 2);
        assert_eq!(staged[1].sequence, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_from_entries_continues_sequence() {
        let mut original = CombatLog::new(CombatId::new());
        original.append(NewLogEntry::new(LogEntryType::System, "one"));
        original.append(NewLogEntry::new(LogEntryType::System, "two"));
        let mut stored = original.entries().to_vec();
        stored.reverse();

        let mut restored = CombatLog::from_entries(original.combat_id(), stored);
        let next = restored.append(NewLogEntry::new(LogEntryType::System, "three"));

        assert_eq!(next.sequence, 3);
        assert_eq!(restored.entries()[0].message, "one");
    }

    #[test]
    fn test_filter_by_type_and_rendered_text() {
        let goblin = CombatEntityId::new();
        let lookup = names(&[(goblin, "Goblin")]);
        let mut log = CombatLog::new(CombatId::new());
        log.append(NewLogEntry::new(LogEntryType::System, "Combat started"));
        log.append(
            NewLogEntry::new(
                LogEntryType::Damage,
                format!("{} takes 5 damage", entity_token(goblin)),
            )
            .with_amount(5),
        );
        log.append(NewLogEntry::new(LogEntryType::DmNote, "The bridge creaks"));

        let damage = log.filter(&LogFilter::of_type(LogEntryType::Damage), &lookup);
        assert_eq!(damage.len(), 1);

        let found = log.filter(&LogFilter::default().with_search("GOBLIN"), &lookup);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entry_type, LogEntryType::Damage);

        let everything = log.filter(&LogFilter::default().with_search("  "), &lookup);
        assert_eq!(everything.len(), 3);

        let none = log.filter(
            &LogFilter::of_type(LogEntryType::Healing).with_search("goblin"),
            &lookup,
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_export_format() {
        let goblin = CombatEntityId::new();
        let lookup = names(&[(goblin, "Goblin")]);
        let combat_id = CombatId::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap();
        let entry = |sequence, entry_type, message: String, round| CombatLogEntry {
            id: LogEntryId::new(),
            combat_id,
            sequence,
            entry_type,
            message,
            source_id: None,
            target_id: None,
            amount: None,
            round,
            timestamp: at,
        };
        let log = CombatLog::from_entries(
            combat_id,
            vec![
                entry(1, LogEntryType::System, "Combat started".to_string(), 0),
                entry(
                    2,
                    LogEntryType::DmNote,
                    format!("{} looks nervous", entity_token(goblin)),
                    3,
                ),
            ],
        );

        assert_eq!(
            log.export(&lookup),
            "09:05:07 [System] Combat started\n09:05:07 [R3] [DM Note] Goblin looks nervous"
        );
    }

    #[test]
    fn test_export_empty_log() {
        let log = CombatLog::new(CombatId::new());
        assert_eq!(log.export(&names(&[])), "");
    }

    #[test]
    fn test_clear_reports_removed_count() {
        let mut log = CombatLog::new(CombatId::new());
        log.append(NewLogEntry::new(LogEntryType::System, "a"));
        log.append(NewLogEntry::new(LogEntryType::System, "b"));

        assert_eq!(log.clear(), 2);
        assert!(log.filter(&LogFilter::default(), &names(&[])).is_empty());
        assert_eq!(log.clear(), 0);
    }
}
