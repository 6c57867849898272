//! Status conditions that can be attached to a combatant
//!
//! The engine only tracks presence. Expiry ("until the end of your next turn")
//! is driven by whoever advances the turn and clears the condition.

use serde::{Deserialize, Serialize};

/// A named status effect
///
/// Serialized as its lowercase label so persisted combats stay readable and
/// unknown labels survive a round trip as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Condition {
    Blinded,
    Charmed,
    Deafened,
    Exhausted,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Concentrating,
    /// Table-specific condition outside the standard vocabulary
    Custom(String),
}

impl Condition {
    /// The standard vocabulary, in display order
    pub const STANDARD: [Condition; 16] = [
        Condition::Blinded,
        Condition::Charmed,
        Condition::Deafened,
        Condition::Exhausted,
        Condition::Frightened,
        Condition::Grappled,
        Condition::Incapacitated,
        Condition::Invisible,
        Condition::Paralyzed,
        Condition::Petrified,
        Condition::Poisoned,
        Condition::Prone,
        Condition::Restrained,
        Condition::Stunned,
        Condition::Unconscious,
        Condition::Concentrating,
    ];

    /// Parse a label case-insensitively, falling back to `Custom`
    pub fn parse(label: &str) -> Self {
        let normalized = label.trim().to_lowercase();
        Self::STANDARD
            .iter()
            .find(|c| c.label() == normalized)
            .cloned()
            .unwrap_or(Condition::Custom(normalized))
    }

    pub fn label(&self) -> &str {
        match self {
            Condition::Blinded => "blinded",
            Condition::Charmed => "charmed",
            Condition::Deafened => "deafened",
            Condition::Exhausted => "exhausted",
            Condition::Frightened => "frightened",
            Condition::Grappled => "grappled",
            Condition::Incapacitated => "incapacitated",
            Condition::Invisible => "invisible",
            Condition::Paralyzed => "paralyzed",
            Condition::Petrified => "petrified",
            Condition::Poisoned => "poisoned",
            Condition::Prone => "prone",
            Condition::Restrained => "restrained",
            Condition::Stunned => "stunned",
            Condition::Unconscious => "unconscious",
            Condition::Concentrating => "concentrating",
            Condition::Custom(label) => label,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Condition::Custom(_))
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl From<String> for Condition {
    fn from(label: String) -> Self {
        Condition::parse(&label)
    }
}

impl From<&str> for Condition {
    fn from(label: &str) -> Self {
        Condition::parse(label)
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> String {
        condition.label().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Condition::parse("Stunned"), Condition::Stunned);
        assert_eq!(Condition::parse("  POISONED "), Condition::Poisoned);
    }

    #[test]
    fn test_unknown_label_becomes_custom() {
        let condition = Condition::parse("Hexed");
        assert_eq!(condition, Condition::Custom("hexed".to_string()));
        assert!(condition.is_custom());
        assert_eq!(condition.label(), "hexed");
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&vec![Condition::Prone, Condition::parse("marked")]).unwrap();
        assert_eq!(json, r#"["prone","marked"]"#);

        let back: Vec<Condition> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Condition::Prone, Condition::Custom("marked".to_string())]);
    }
}
