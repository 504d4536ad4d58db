//! Append-only action log.
//!
//! Every resolved action emits one [`LogEntry`]. Timestamps are logical
//! sequence numbers assigned at append time, so a replay with the same seed
//! and action stream produces byte-identical log output. A persistence
//! adapter can translate entries into rows; the core never opens a
//! connection.

use serde::{Deserialize, Serialize};

use crate::combatant::CombatantId;
use crate::damage::{DamageOutcome, HealingOutcome};
use crate::dice::DiceRoll;

/// One record in the encounter's action log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Logical sequence number; equals the entry's position in the log.
    pub timestamp: u64,
    pub round: u32,
    pub turn_order: u32,
    pub actor_id: CombatantId,
    pub actor_name: String,
    pub action_type: String,
    pub action_description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ids: Vec<CombatantId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dice_rolls: Vec<DiceRoll>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub damage: Vec<DamageOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healing: Option<HealingOutcome>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions_applied: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions_removed: Vec<String>,
    pub outcome: String,
}

impl LogEntry {
    /// Start an entry for an actor; the encounter stamps timestamp, round
    /// and turn order on append.
    pub fn new(
        actor_id: CombatantId,
        actor_name: impl Into<String>,
        action_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        LogEntry {
            timestamp: 0,
            round: 0,
            turn_order: 0,
            actor_id,
            actor_name: actor_name.into(),
            action_type: action_type.into(),
            action_description: description.into(),
            target_ids: Vec::new(),
            dice_rolls: Vec::new(),
            damage: Vec::new(),
            healing: None,
            conditions_applied: Vec::new(),
            conditions_removed: Vec::new(),
            outcome: String::new(),
        }
    }

    pub fn with_target(mut self, target: CombatantId) -> Self {
        self.target_ids.push(target);
        self
    }

    pub fn with_targets(mut self, targets: impl IntoIterator<Item = CombatantId>) -> Self {
        self.target_ids.extend(targets);
        self
    }

    pub fn with_roll(mut self, roll: DiceRoll) -> Self {
        self.dice_rolls.push(roll);
        self
    }

    pub fn with_damage(mut self, damage: DamageOutcome) -> Self {
        self.damage.push(damage);
        self
    }

    pub fn with_healing(mut self, healing: HealingOutcome) -> Self {
        self.healing = Some(healing);
        self
    }

    pub fn with_condition_applied(mut self, name: impl Into<String>) -> Self {
        self.conditions_applied.push(name.into());
        self
    }

    pub fn with_condition_removed(mut self, name: impl Into<String>) -> Self {
        self.conditions_removed.push(name.into());
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = outcome.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_collects_payloads() {
        let actor = CombatantId::new();
        let target = CombatantId::new();
        let entry = LogEntry::new(actor, "Roland", "attack", "Roland attacks the goblin")
            .with_target(target)
            .with_condition_applied("prone")
            .with_outcome("hit");

        assert_eq!(entry.actor_id, actor);
        assert_eq!(entry.target_ids, vec![target]);
        assert_eq!(entry.conditions_applied, vec!["prone".to_string()]);
        assert_eq!(entry.outcome, "hit");
    }

    #[test]
    fn test_serialization_skips_empty_payloads() {
        let entry = LogEntry::new(CombatantId::new(), "Roland", "dash", "Roland dashes")
            .with_outcome("success");
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("dice_rolls").is_none());
        assert!(json.get("damage").is_none());
        assert!(json.get("healing").is_none());
        assert_eq!(json["outcome"], "success");
    }
}
