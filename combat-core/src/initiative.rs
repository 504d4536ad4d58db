//! Initiative tracking and turn advancement.
//!
//! Order is sorted by initiative descending with DEX modifier as the tie
//! breaker. Advancing a turn runs the condition engine at both turn
//! boundaries, skips the dead and the stabilized, rolls the round counter
//! and triggers the automatic death save for a dying player character.

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::actions;
use crate::combatant::{Combatant, CombatantId};
use crate::conditions::{self, TickPhase};
use crate::dice::{roll_d20_adv, AdvantageMode};
use crate::encounter::Encounter;

/// Result of one initiative roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitiativeRoll {
    pub combatant_id: CombatantId,
    pub name: String,
    pub roll: u32,
    pub modifier: i32,
    pub total: i32,
}

/// Roll initiative for a combatant: d20 + DEX modifier.
pub fn roll_initiative<R: Rng>(
    rng: &mut R,
    combatant: &Combatant,
    advantage: bool,
) -> InitiativeRoll {
    let mode = if advantage {
        AdvantageMode::Advantage
    } else {
        AdvantageMode::Normal
    };
    let (kept, _) = roll_d20_adv(rng, mode);
    InitiativeRoll {
        combatant_id: combatant.id,
        name: combatant.name.clone(),
        roll: kept,
        modifier: combatant.dex_mod,
        total: kept as i32 + combatant.dex_mod,
    }
}

fn sort_key(combatant: &Combatant) -> (i32, i32) {
    (combatant.initiative, combatant.dex_mod)
}

/// Stable sort by (initiative desc, DEX mod desc).
pub fn sort(order: &mut [Combatant]) {
    order.sort_by(|a, b| sort_key(b).cmp(&sort_key(a)));
}

/// Insert before the first entry with a strictly lower sort key.
pub fn insert(order: &mut Vec<Combatant>, combatant: Combatant) {
    let key = sort_key(&combatant);
    let position = order.iter().position(|c| sort_key(c) < key);
    match position {
        Some(index) => order.insert(index, combatant),
        None => order.push(combatant),
    }
}

/// Remove a combatant by id.
pub fn remove(order: &mut Vec<Combatant>, id: CombatantId) -> Option<Combatant> {
    let index = order.iter().position(|c| c.id == id)?;
    Some(order.remove(index))
}

/// What a turn advance did, for the caller's log entry.
#[derive(Debug, Clone, Default)]
pub struct AdvanceReport {
    /// Conditions that expired at either turn boundary or the rollover.
    pub conditions_expired: Vec<String>,
    pub new_round: bool,
    /// An automatic death save was rolled for the arriving combatant.
    pub auto_death_save: bool,
}

fn apply_ac_adjustment(combatant: &mut Combatant, adjustment: i32) {
    if adjustment != 0 {
        combatant.ac = (combatant.ac as i32 + adjustment).max(0) as u32;
    }
}

fn tick_round_rollover(enc: &mut Encounter, report: &mut AdvanceReport) {
    enc.round += 1;
    report.new_round = true;
    enc.lair_action_used_this_round = false;
    enc.legendary_actions_remaining = enc.legendary_action_budget.clone();
    debug!("round {} begins", enc.round);

    // Round-scoped durations count down once per rollover.
    for combatant in enc.initiative_order.iter_mut() {
        let outcome = conditions::tick_round_rollover(&mut combatant.conditions);
        apply_ac_adjustment(combatant, outcome.ac_adjustment);
        report
            .conditions_expired
            .extend(outcome.expired.iter().map(|c| c.kind.name().to_string()));
    }
}

/// Advance to the next turn.
///
/// Runs `EndOfTurn` ticks on the departing combatant, skips dead and
/// stabilized entries, increments the round on wraparound (decrementing
/// round-scoped conditions and restoring legendary budgets), runs
/// `StartOfTurn` ticks on the arriving combatant, refreshes its turn
/// resources, and rolls the automatic death save when it arrives dying.
/// An arrival killed by that save is skipped over in the same advance, so
/// the resulting current combatant always has a properly started turn.
pub fn advance(enc: &mut Encounter) -> AdvanceReport {
    let mut report = AdvanceReport::default();
    let len = enc.initiative_order.len();
    if len == 0 {
        return report;
    }

    // Departing combatant's end-of-turn tick.
    if let Some(departing) = enc.initiative_order.get_mut(enc.current_turn_index) {
        let outcome = conditions::tick(&mut departing.conditions, TickPhase::EndOfTurn);
        apply_ac_adjustment(departing, outcome.ac_adjustment);
        report
            .conditions_expired
            .extend(outcome.expired.iter().map(|c| c.kind.name().to_string()));
    }

    // The dead stay in place until the end of the advance so indices keep
    // their meaning while we scan.
    for _attempt in 0..len {
        let start = enc.current_turn_index;
        let mut next = (start + 1) % len;
        let mut wrapped = start + 1 >= len;
        for step in 1..=len {
            let candidate = (start + step) % len;
            let c = &enc.initiative_order[candidate];
            if !c.is_dead() && !c.is_stable() {
                next = candidate;
                wrapped = start + step >= len;
                break;
            }
        }
        enc.current_turn_index = next;

        if wrapped {
            tick_round_rollover(enc, &mut report);
        }

        // Arriving combatant: start-of-turn tick and fresh resources.
        let arriving_id = {
            let arriving = &mut enc.initiative_order[enc.current_turn_index];
            let outcome = conditions::tick(&mut arriving.conditions, TickPhase::StartOfTurn);
            apply_ac_adjustment(arriving, outcome.ac_adjustment);
            report
                .conditions_expired
                .extend(outcome.expired.iter().map(|c| c.kind.name().to_string()));

            let speed = conditions::effective_speed(&arriving.conditions, arriving.speed);
            arriving.turn_resources = crate::combatant::TurnResources::fresh(speed);
            arriving.id
        };

        // A dying PC opens their turn with an automatic death save; if it
        // kills them, the turn passes on.
        let arriving = &enc.initiative_order[enc.current_turn_index];
        if arriving.is_dying() {
            report.auto_death_save = true;
            let _ = actions::roll_death_save(enc, arriving_id);
            if enc.initiative_order[enc.current_turn_index].is_dead() {
                continue;
            }
        }
        break;
    }

    enc.migrate_dead();
    report
}

/// Move a combatant to a new initiative count, keeping the current turn
/// pointed at the same combatant.
pub fn delay(enc: &mut Encounter, id: CombatantId, new_initiative: i32) -> bool {
    let current_id = enc.current().map(|c| c.id);
    let Some(mut combatant) = remove(&mut enc.initiative_order, id) else {
        return false;
    };
    combatant.initiative = new_initiative;
    insert(&mut enc.initiative_order, combatant);

    if let Some(current_id) = current_id {
        if let Some(index) = enc.combatant_index(current_id) {
            enc.current_turn_index = index;
        }
    }
    true
}
