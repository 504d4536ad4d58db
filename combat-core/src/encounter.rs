//! The encounter aggregate.
//!
//! Single-writer state for one combat: initiative order, round/turn
//! counters, defeated and fled participants, environment metadata, the
//! action log and the encounter's own dice stream. Mutating operations on
//! the manager produce a new encounter value; callers replace their handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::combatant::{Combatant, CombatantId};
use crate::events::LogEntry;
use crate::rng::DiceRoller;

/// Unique identifier for encounters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncounterStatus {
    Preparing,
    Active,
    Paused,
    Ended,
}

/// Ambient light level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Lighting {
    #[default]
    Bright,
    Dim,
    Dark,
}

/// Caller-supplied settings for a new encounter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncounterOptions {
    /// Seed for the encounter's dice stream; replays with the same seed and
    /// action stream are byte-identical.
    pub seed: u64,
    pub lighting: Lighting,
    pub environmental_effects: Vec<String>,
}

impl Default for EncounterOptions {
    fn default() -> Self {
        EncounterOptions {
            seed: 0,
            lighting: Lighting::Bright,
            environmental_effects: Vec::new(),
        }
    }
}

impl EncounterOptions {
    pub fn with_seed(seed: u64) -> Self {
        EncounterOptions {
            seed,
            ..Default::default()
        }
    }
}

/// The central combat aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: EncounterId,
    pub campaign_id: String,
    pub session_id: String,
    pub status: EncounterStatus,
    pub round: u32,
    pub current_turn_index: usize,
    /// Live participants only, sorted by (initiative desc, DEX mod desc).
    pub initiative_order: Vec<Combatant>,
    pub defeated: Vec<Combatant>,
    pub fled: Vec<Combatant>,
    pub environmental_effects: Vec<String>,
    pub lighting: Lighting,
    pub lair_action_used_this_round: bool,
    pub legendary_actions_remaining: BTreeMap<CombatantId, u32>,
    /// Per-round legendary budget, restored at round rollover.
    pub legendary_action_budget: BTreeMap<CombatantId, u32>,
    pub action_log: Vec<LogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub roller: DiceRoller,
}

impl Encounter {
    pub fn new(
        campaign_id: impl Into<String>,
        session_id: impl Into<String>,
        options: EncounterOptions,
    ) -> Self {
        Encounter {
            id: EncounterId::new(),
            campaign_id: campaign_id.into(),
            session_id: session_id.into(),
            status: EncounterStatus::Preparing,
            round: 0,
            current_turn_index: 0,
            initiative_order: Vec::new(),
            defeated: Vec::new(),
            fled: Vec::new(),
            environmental_effects: options.environmental_effects,
            lighting: options.lighting,
            lair_action_used_this_round: false,
            legendary_actions_remaining: BTreeMap::new(),
            legendary_action_budget: BTreeMap::new(),
            action_log: Vec::new(),
            started_at: None,
            ended_at: None,
            roller: DiceRoller::new(options.seed),
        }
    }

    pub fn combatant(&self, id: CombatantId) -> Option<&Combatant> {
        self.initiative_order.iter().find(|c| c.id == id)
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Option<&mut Combatant> {
        self.initiative_order.iter_mut().find(|c| c.id == id)
    }

    pub fn combatant_index(&self, id: CombatantId) -> Option<usize> {
        self.initiative_order.iter().position(|c| c.id == id)
    }

    /// The combatant whose turn it is.
    pub fn current(&self) -> Option<&Combatant> {
        self.initiative_order.get(self.current_turn_index)
    }

    /// Live members of the party side.
    pub fn live_party(&self) -> impl Iterator<Item = &Combatant> {
        self.initiative_order
            .iter()
            .filter(|c| c.is_party() && !c.is_dead())
    }

    /// Live members of the enemy side.
    pub fn live_enemies(&self) -> impl Iterator<Item = &Combatant> {
        self.initiative_order
            .iter()
            .filter(|c| !c.is_party() && !c.is_dead())
    }

    /// Live opponents of one combatant.
    pub fn live_opponents_of(&self, id: CombatantId) -> Vec<&Combatant> {
        let Some(actor) = self.combatant(id) else {
            return Vec::new();
        };
        let party_side = actor.is_party();
        self.initiative_order
            .iter()
            .filter(|c| c.id != id && c.is_party() != party_side && !c.is_dead())
            .collect()
    }

    /// Distance in feet between two combatants, when both have positions.
    /// Grid cells are 5 ft; diagonals count as one cell.
    pub fn distance_between(&self, a: CombatantId, b: CombatantId) -> Option<u32> {
        let pa = self.combatant(a)?.position?;
        let pb = self.combatant(b)?.position?;
        let dx = (pa.0 - pb.0).unsigned_abs();
        let dy = (pa.1 - pb.1).unsigned_abs();
        Some(dx.max(dy) * 5)
    }

    /// Iterate the action log lazily. A persistence adapter consumes these
    /// one at a time; the core never opens a connection itself.
    pub fn log_entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.action_log.iter()
    }

    /// Append a log entry, stamping timestamp, round and turn order.
    pub fn push_log(&mut self, mut entry: LogEntry) -> LogEntry {
        entry.timestamp = self.action_log.len() as u64;
        entry.round = self.round;
        entry.turn_order = self.current_turn_index as u32;
        self.action_log.push(entry.clone());
        entry
    }

    /// Move dead combatants out of the initiative order, keeping the turn
    /// index pointed at the same live combatant. Returns the names moved.
    pub fn migrate_dead(&mut self) -> Vec<String> {
        let mut moved = Vec::new();
        let mut index = 0;
        while index < self.initiative_order.len() {
            if self.initiative_order[index].is_dead() {
                let combatant = self.initiative_order.remove(index);
                if index < self.current_turn_index {
                    self.current_turn_index -= 1;
                }
                moved.push(combatant.name.clone());
                self.defeated.push(combatant);
            } else {
                index += 1;
            }
        }
        if self.current_turn_index >= self.initiative_order.len() {
            self.current_turn_index = 0;
        }
        moved
    }

    /// End a caster's concentration, stripping every condition the broken
    /// spell applied (on any combatant) and reverting its AC deltas.
    /// Returns the names of the removed conditions.
    pub fn break_concentration(&mut self, caster_id: CombatantId) -> Vec<String> {
        let Some(spell) = self
            .combatant_mut(caster_id)
            .and_then(|c| c.concentrating_on.take())
        else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for combatant in self.initiative_order.iter_mut() {
            let outcome =
                crate::conditions::remove(&mut combatant.conditions, None, Some(&spell));
            if outcome.ac_adjustment != 0 {
                combatant.ac = (combatant.ac as i32 + outcome.ac_adjustment).max(0) as u32;
            }
            removed.extend(outcome.expired.iter().map(|c| c.kind.name().to_string()));
        }
        removed
    }

    /// Verify the aggregate invariants. Returns the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.status == EncounterStatus::Active && !self.initiative_order.is_empty() {
            if self.current_turn_index >= self.initiative_order.len() {
                return Err(format!(
                    "turn index {} out of range ({} combatants)",
                    self.current_turn_index,
                    self.initiative_order.len()
                ));
            }
            if self.round < 1 {
                return Err("active encounter with round 0".to_string());
            }
        }
        if self.status == EncounterStatus::Preparing && self.round != 0 {
            return Err("preparing encounter with nonzero round".to_string());
        }

        for pair in self.initiative_order.windows(2) {
            let key_a = (pair[0].initiative, pair[0].dex_mod);
            let key_b = (pair[1].initiative, pair[1].dex_mod);
            if key_a < key_b {
                return Err(format!(
                    "initiative order unsorted: {:?} before {:?}",
                    key_a, key_b
                ));
            }
        }

        for c in self.initiative_order.iter().chain(self.defeated.iter()) {
            if c.hp.current > c.hp.max {
                return Err(format!("{} has HP above max", c.name));
            }
        }

        for c in &self.initiative_order {
            if self.defeated.iter().any(|d| d.id == c.id) {
                return Err(format!("{} is both live and defeated", c.name));
            }
            if c.is_dead() {
                return Err(format!("{} is dead but still in initiative order", c.name));
            }
        }

        Ok(())
    }
}
