//! Engine-wide error type.
//!
//! Every fallible public operation surfaces one of these kinds; errors never
//! mutate the caller's encounter handle, and no log entry is written for a
//! failed action.

use thiserror::Error;

use crate::dice::DiceError;

/// The total set of combat engine errors.
#[derive(Debug, Clone, Error)]
pub enum CombatError {
    /// A referenced combatant id is absent from the encounter.
    #[error("combatant not found: {0}")]
    NotFound(String),

    /// The acting combatant is not the current combatant.
    #[error("it is not {actor}'s turn (current turn: {current})")]
    NotYourTurn { actor: String, current: String },

    /// Action economy or movement or spell slots are exhausted.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Targeting a defeated combatant, or self where forbidden.
    #[error("invalid target: {0}")]
    InvalidTarget(String),

    /// A dice string failed to parse.
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),

    /// The actor cannot act at all.
    #[error("{0} is incapacitated and cannot act")]
    Incapacitated(String),

    /// A registry lookup failed (e.g. an unknown spell).
    #[error("unknown: {0}")]
    Unknown(String),
}

impl From<DiceError> for CombatError {
    fn from(err: DiceError) -> Self {
        CombatError::InvalidNotation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dice_error_maps_to_invalid_notation() {
        let err: CombatError = DiceError::InvalidNotation("2x6".to_string()).into();
        assert!(matches!(err, CombatError::InvalidNotation(_)));
        assert!(err.to_string().contains("2x6"));
    }
}
