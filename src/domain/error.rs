//! Domain errors for combat commands
//!
//! Every command either fully applies or returns one of these with the
//! aggregate left untouched.

use crate::domain::value_objects::{CombatEntityId, GridPosition};

/// Why a move destination was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveRejection {
    OutOfBounds,
    Obstacle,
    Occupied { by: CombatEntityId },
    OutOfRange { distance: u32, allowance: u32 },
}

impl std::fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveRejection::OutOfBounds => write!(f, "destination is outside the map"),
            MoveRejection::Obstacle => write!(f, "destination is an obstacle"),
            MoveRejection::Occupied { by } => write!(f, "destination is occupied by {}", by),
            MoveRejection::OutOfRange { distance, allowance } => write!(
                f,
                "destination is {} cells away but movement allows {}",
                distance, allowance
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    #[error("Invalid move to {destination}: {reason}")]
    InvalidMove {
        destination: GridPosition,
        reason: MoveRejection,
    },

    #[error("Unknown entity: {0}")]
    UnknownEntity(CombatEntityId),

    #[error("No living combatants in the initiative order")]
    EmptyInitiative,

    #[error("Cannot {action} while combat is {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },

    #[error("Combat has already been completed")]
    CombatCompleted,

    #[error("Already at the first turn of the combat")]
    NoPreviousTurn,

    #[error("Validation error: {0}")]
    Validation(String),
}
