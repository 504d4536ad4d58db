//! Encounter manager.
//!
//! The top-level API: build encounters from sheets and stat blocks, start
//! combat, route declared actions through the resolver, write combatants
//! through, and decide when combat is over. Every mutating operation
//! returns a fresh encounter value; the caller replaces its handle.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::actions::{self, ActionResult, DeclaredAction};
use crate::combatant::{
    combatant_from_character, combatant_from_monster, Combatant, CombatantId,
    MonsterTemplate, TurnResources,
};
use crate::encounter::{Encounter, EncounterOptions, EncounterStatus};
use crate::error::CombatError;
use crate::initiative::{self, InitiativeRoll};
use crate::events::LogEntry;
use crate::stats::CharacterSheet;

/// Which side of the encounter won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Party,
    Enemies,
}

/// Verdict of [`EncounterManager::should_combat_end`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEndCheck {
    pub should_end: bool,
    pub reason: Option<String>,
    pub winners: Option<Side>,
}

/// Post-combat recap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatSummary {
    pub rounds: u32,
    /// In-world minutes elapsed (one round is six seconds).
    pub minutes: f64,
    pub casualties: Vec<String>,
    /// Total damage dealt per combatant name, from the action log.
    pub damage_dealt: BTreeMap<String, u32>,
    pub mvp: Option<String>,
}

/// Stateless façade over the combat core.
pub struct EncounterManager;

impl EncounterManager {
    pub fn new() -> Self {
        Self
    }

    /// Create an empty encounter in the `Preparing` state.
    pub fn create_encounter(
        &self,
        campaign_id: impl Into<String>,
        session_id: impl Into<String>,
        options: EncounterOptions,
    ) -> Encounter {
        Encounter::new(campaign_id, session_id, options)
    }

    /// Add player characters, rolling initiative for each.
    pub fn add_party(
        &self,
        enc: &Encounter,
        sheets: &[CharacterSheet],
    ) -> Result<(Encounter, Vec<InitiativeRoll>), CombatError> {
        let mut next = enc.clone();
        let mut rolls = Vec::new();
        for sheet in sheets {
            let mut combatant = combatant_from_character(sheet, 0);
            combatant.id = CombatantId::from_rng(&mut next.roller);
            let roll = initiative::roll_initiative(&mut next.roller, &combatant, false);
            combatant.initiative = roll.total;
            rolls.push(roll);
            initiative::insert(&mut next.initiative_order, combatant);
        }
        Ok((next, rolls))
    }

    /// Add monsters, rolling initiative for each.
    ///
    /// With `group_identical`, copies of the same template share a
    /// numbering sequence ("Goblin 1", "Goblin 2"); otherwise names are
    /// taken from the stat block as-is.
    pub fn add_monsters(
        &self,
        enc: &Encounter,
        templates: &[MonsterTemplate],
        group_identical: bool,
    ) -> Result<(Encounter, Vec<InitiativeRoll>), CombatError> {
        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for template in templates {
            *counts.entry(template.id.as_str()).or_default() += 1;
        }

        let mut next = enc.clone();
        let mut rolls = Vec::new();
        let mut seen: BTreeMap<&str, u32> = BTreeMap::new();
        for template in templates {
            let copy_index = if group_identical && counts[template.id.as_str()] > 1 {
                let index = seen.entry(template.id.as_str()).or_default();
                let current = *index;
                *index += 1;
                Some(current)
            } else {
                None
            };

            let mut combatant = combatant_from_monster(template, 0, copy_index);
            combatant.id = CombatantId::from_rng(&mut next.roller);
            let roll = initiative::roll_initiative(&mut next.roller, &combatant, false);
            combatant.initiative = roll.total;
            rolls.push(roll);

            if let Some(budget) = template.legendary_actions {
                next.legendary_action_budget.insert(combatant.id, budget);
                next.legendary_actions_remaining
                    .insert(combatant.id, budget);
            }
            initiative::insert(&mut next.initiative_order, combatant);
        }
        Ok((next, rolls))
    }

    /// Sort the order and open round one.
    pub fn start_combat(&self, enc: &Encounter) -> Result<Encounter, CombatError> {
        if enc.status != EncounterStatus::Preparing {
            return Err(CombatError::ResourceUnavailable(
                "combat has already started".to_string(),
            ));
        }
        if enc.initiative_order.is_empty() {
            return Err(CombatError::ResourceUnavailable(
                "no combatants in the encounter".to_string(),
            ));
        }

        let mut next = enc.clone();
        initiative::sort(&mut next.initiative_order);
        next.status = EncounterStatus::Active;
        next.round = 1;
        next.current_turn_index = 0;
        next.started_at = Some(Utc::now());
        next.lair_action_used_this_round = false;
        next.legendary_actions_remaining = next.legendary_action_budget.clone();

        let first = &mut next.initiative_order[0];
        first.turn_resources = TurnResources::fresh(first.speed);
        let (first_id, first_name) = (first.id, first.name.clone());
        info!("combat started: {} opens round 1", first_name);

        next.push_log(
            LogEntry::new(
                first_id,
                &first_name,
                "combat_start",
                format!("Combat begins. {} acts first", first_name),
            )
            .with_outcome("combat started"),
        );
        Ok(next)
    }

    /// Route a declared action through the resolver.
    ///
    /// The returned encounter reflects the full action or, on error, the
    /// caller's handle is unchanged.
    pub fn submit_action(
        &self,
        enc: &Encounter,
        action: DeclaredAction,
    ) -> Result<(Encounter, ActionResult), CombatError> {
        if enc.status != EncounterStatus::Active {
            return Err(CombatError::ResourceUnavailable(
                "encounter is not active".to_string(),
            ));
        }
        actions::resolve(enc, action)
    }

    /// End the current combatant's turn.
    pub fn end_turn(&self, enc: &Encounter) -> Result<Encounter, CombatError> {
        let actor = enc
            .current()
            .ok_or_else(|| CombatError::NotFound("no current combatant".to_string()))?
            .id;
        let (next, _) = self.submit_action(enc, DeclaredAction::EndTurn { actor })?;
        Ok(next)
    }

    /// Write a combatant back into the encounter.
    ///
    /// Dead monsters and PCs with three failed saves migrate to the
    /// defeated list; a defeated PC healed above zero returns to the
    /// initiative order at its old initiative count.
    pub fn update_combatant(
        &self,
        enc: &Encounter,
        combatant: Combatant,
    ) -> Result<Encounter, CombatError> {
        let id = combatant.id;
        let mut next = enc.clone();
        let current_id = next.current().map(|c| c.id);

        if let Some(slot) = next.initiative_order.iter_mut().find(|c| c.id == id) {
            *slot = combatant;
        } else if let Some(position) = next.defeated.iter().position(|c| c.id == id) {
            next.defeated[position] = combatant;
        } else {
            return Err(CombatError::NotFound(id.to_string()));
        }

        let moved = next.migrate_dead();
        for name in moved {
            debug!("{} migrated to defeated", name);
        }

        // Healing a defeated-but-not-dead PC brings them back into the fight.
        if let Some(position) = next
            .defeated
            .iter()
            .position(|c| c.id == id && c.is_pc() && c.hp.current > 0 && !c.is_dead())
        {
            let revived = next.defeated.remove(position);
            debug!("{} returns to the initiative order", revived.name);
            initiative::insert(&mut next.initiative_order, revived);
        }

        if let Some(current_id) = current_id {
            if let Some(index) = next.combatant_index(current_id) {
                next.current_turn_index = index;
            }
        }
        if next.current_turn_index >= next.initiative_order.len() {
            next.current_turn_index = 0;
        }
        Ok(next)
    }

    /// Remove a combatant from the fight as having fled.
    ///
    /// The runner keeps its state and lands on the `fled` roster; the turn
    /// pointer stays on the same live combatant.
    pub fn flee_combatant(
        &self,
        enc: &Encounter,
        id: CombatantId,
    ) -> Result<Encounter, CombatError> {
        let mut next = enc.clone();
        let Some(index) = next.combatant_index(id) else {
            return Err(CombatError::NotFound(id.to_string()));
        };
        let runner = next.initiative_order.remove(index);
        if index < next.current_turn_index {
            next.current_turn_index -= 1;
        }
        if next.current_turn_index >= next.initiative_order.len() {
            next.current_turn_index = 0;
        }
        let (runner_id, runner_name) = (runner.id, runner.name.clone());
        info!("{} flees the encounter", runner_name);
        next.fled.push(runner);
        next.push_log(
            LogEntry::new(
                runner_id,
                &runner_name,
                "flee",
                format!("{runner_name} flees the battlefield"),
            )
            .with_outcome("fled"),
        );
        Ok(next)
    }

    /// Spend the encounter's single lair action for this round.
    pub fn use_lair_action(&self, enc: &Encounter) -> Result<Encounter, CombatError> {
        if enc.status != EncounterStatus::Active {
            return Err(CombatError::ResourceUnavailable(
                "encounter is not active".to_string(),
            ));
        }
        if enc.lair_action_used_this_round {
            return Err(CombatError::ResourceUnavailable(
                "the lair has already acted this round".to_string(),
            ));
        }
        let mut next = enc.clone();
        next.lair_action_used_this_round = true;
        if let Some(current) = next.current() {
            let (actor_id, actor_name) = (current.id, current.name.clone());
            next.push_log(
                LogEntry::new(actor_id, &actor_name, "lair_action", "The lair itself stirs")
                    .with_outcome("lair action"),
            );
        }
        Ok(next)
    }

    /// Spend legendary actions from a creature's per-round budget.
    pub fn spend_legendary_action(
        &self,
        enc: &Encounter,
        id: CombatantId,
        cost: u32,
    ) -> Result<Encounter, CombatError> {
        let name = enc
            .combatant(id)
            .map(|c| c.name.clone())
            .ok_or_else(|| CombatError::NotFound(id.to_string()))?;
        let Some(remaining) = enc.legendary_actions_remaining.get(&id).copied() else {
            return Err(CombatError::ResourceUnavailable(format!(
                "{name} has no legendary actions"
            )));
        };
        if remaining < cost {
            return Err(CombatError::ResourceUnavailable(format!(
                "{name} has {remaining} legendary action(s) left, {cost} needed"
            )));
        }
        let mut next = enc.clone();
        next.legendary_actions_remaining.insert(id, remaining - cost);
        next.push_log(
            LogEntry::new(
                id,
                &name,
                "legendary_action",
                format!(
                    "{} spends {} legendary action(s) ({} remaining)",
                    name,
                    cost,
                    remaining - cost
                ),
            )
            .with_outcome("legendary action"),
        );
        Ok(next)
    }

    /// Is the fight over, and who won?
    pub fn should_combat_end(&self, enc: &Encounter) -> CombatEndCheck {
        if enc.status != EncounterStatus::Active {
            return CombatEndCheck {
                should_end: false,
                reason: None,
                winners: None,
            };
        }
        let live_party = enc.live_party().count();
        let live_enemies = enc.live_enemies().count();

        if live_enemies == 0 {
            CombatEndCheck {
                should_end: true,
                reason: Some("all enemies defeated".to_string()),
                winners: Some(Side::Party),
            }
        } else if live_party == 0 {
            CombatEndCheck {
                should_end: true,
                reason: Some("the party has fallen".to_string()),
                winners: Some(Side::Enemies),
            }
        } else {
            CombatEndCheck {
                should_end: false,
                reason: None,
                winners: None,
            }
        }
    }

    /// Close out the encounter.
    pub fn end_combat(&self, enc: &Encounter, reason: impl Into<String>) -> Encounter {
        let reason = reason.into();
        let mut next = enc.clone();
        next.status = EncounterStatus::Ended;
        next.ended_at = Some(Utc::now());
        info!("combat ended: {}", reason);

        if let Some(actor) = next.current().or_else(|| next.defeated.first()) {
            let (actor_id, actor_name) = (actor.id, actor.name.clone());
            next.push_log(
                LogEntry::new(
                    actor_id,
                    &actor_name,
                    "combat_end",
                    format!("Combat ends: {reason}"),
                )
                .with_outcome("combat ended"),
            );
        }
        next
    }

    /// Aggregate the action log into a recap.
    pub fn combat_summary(&self, enc: &Encounter) -> CombatSummary {
        let mut damage_dealt: BTreeMap<String, u32> = BTreeMap::new();
        for entry in &enc.action_log {
            let total: u32 = entry.damage.iter().map(|d| d.final_amount).sum();
            if total > 0 {
                *damage_dealt.entry(entry.actor_name.clone()).or_default() += total;
            }
        }
        let mvp = damage_dealt
            .iter()
            .max_by_key(|(_, total)| **total)
            .map(|(name, _)| name.clone());

        CombatSummary {
            rounds: enc.round,
            minutes: enc.round as f64 * 6.0 / 60.0,
            casualties: enc.defeated.iter().map(|c| c.name.clone()).collect(),
            damage_dealt,
            mvp,
        }
    }
}

impl Default for EncounterManager {
    fn default() -> Self {
        Self::new()
    }
}
