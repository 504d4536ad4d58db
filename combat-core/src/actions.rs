//! Action resolver.
//!
//! Every declared action takes the encounter and produces a new encounter
//! plus an [`ActionResult`]; resolution happens on a private clone, so an
//! error leaves the caller's handle untouched. This module is the
//! enforcement boundary for turn order, action economy and conditions.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::combatant::{CombatantId, DeathSaves};
use crate::conditions::{self, ActiveCondition, ConditionDuration, ConditionKind};
use crate::damage::{self, DamageInstance, DamageType};
use crate::dice::{execute, roll_damage, AdvantageMode, DiceExpression, DieType};
use crate::encounter::{Encounter, Lighting};
use crate::error::CombatError;
use crate::initiative;
use crate::events::LogEntry;
use crate::spells::{self, CastingResource};
use crate::stats::{Ability, SpellAttackKind};

// ============================================================================
// Declared actions
// ============================================================================

/// Flags modifying an attack roll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOptions {
    #[serde(default)]
    pub advantage: bool,
    #[serde(default)]
    pub disadvantage: bool,
    #[serde(default)]
    pub is_magical: bool,
    #[serde(default)]
    pub is_ranged: bool,
    #[serde(default)]
    pub long_range: bool,
}

/// Damage an attack deals on a hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDamage {
    pub dice: String,
    pub damage_type: DamageType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpKind {
    Attack,
    AbilityCheck,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShoveMode {
    Prone,
    Push,
}

/// The tagged union of everything a caller can declare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeclaredAction {
    Attack {
        attacker: CombatantId,
        target: CombatantId,
        attack_bonus: i32,
        damage: AttackDamage,
        #[serde(default)]
        options: AttackOptions,
    },
    CastSpell {
        caster: CombatantId,
        spell_name: String,
        #[serde(default)]
        targets: Vec<CombatantId>,
        slot_level: Option<u8>,
    },
    Dash {
        actor: CombatantId,
    },
    Disengage {
        actor: CombatantId,
    },
    Dodge {
        actor: CombatantId,
    },
    Help {
        helper: CombatantId,
        target: CombatantId,
        kind: HelpKind,
    },
    Hide {
        actor: CombatantId,
        stealth_roll: u32,
        stealth_mod: i32,
    },
    Ready {
        actor: CombatantId,
        trigger: String,
        readied_action_description: String,
    },
    Grapple {
        attacker: CombatantId,
        target: CombatantId,
    },
    Shove {
        attacker: CombatantId,
        target: CombatantId,
        mode: ShoveMode,
    },
    Move {
        actor: CombatantId,
        distance: u32,
        new_position: Option<(i32, i32)>,
    },
    StandUp {
        actor: CombatantId,
    },
    DeathSave {
        actor: CombatantId,
    },
    EndTurn {
        actor: CombatantId,
    },
}

impl DeclaredAction {
    /// The combatant performing the action.
    pub fn actor(&self) -> CombatantId {
        match self {
            DeclaredAction::Attack { attacker, .. } => *attacker,
            DeclaredAction::CastSpell { caster, .. } => *caster,
            DeclaredAction::Dash { actor }
            | DeclaredAction::Disengage { actor }
            | DeclaredAction::Dodge { actor }
            | DeclaredAction::Hide { actor, .. }
            | DeclaredAction::Ready { actor, .. }
            | DeclaredAction::Move { actor, .. }
            | DeclaredAction::StandUp { actor }
            | DeclaredAction::DeathSave { actor }
            | DeclaredAction::EndTurn { actor } => *actor,
            DeclaredAction::Help { helper, .. } => *helper,
            DeclaredAction::Grapple { attacker, .. }
            | DeclaredAction::Shove { attacker, .. } => *attacker,
        }
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub description: String,
    pub log_entry: Option<LogEntry>,
}

// ============================================================================
// Entry point
// ============================================================================

/// Resolve a declared action against an encounter.
///
/// Returns the updated encounter and the result; on error the input
/// encounter is untouched. Turn order is enforced for everything except
/// `DeathSave`, which the tracker may also auto-invoke.
pub fn resolve(
    enc: &Encounter,
    action: DeclaredAction,
) -> Result<(Encounter, ActionResult), CombatError> {
    let actor_id = action.actor();
    let actor = lookup(enc, actor_id)?;

    if !matches!(action, DeclaredAction::DeathSave { .. }) {
        let current = enc
            .current()
            .ok_or_else(|| CombatError::NotFound("no current combatant".to_string()))?;
        if current.id != actor_id {
            return Err(CombatError::NotYourTurn {
                actor: actor.name.clone(),
                current: current.name.clone(),
            });
        }
    }

    // Attacks auto-fail while incapacitated instead of erroring; death saves
    // and ending the turn are always allowed.
    if conditions::is_incapacitated(&actor.conditions)
        && !matches!(
            action,
            DeclaredAction::Attack { .. }
                | DeclaredAction::DeathSave { .. }
                | DeclaredAction::EndTurn { .. }
        )
    {
        return Err(CombatError::Incapacitated(actor.name.clone()));
    }

    let mut next = enc.clone();
    let result = match action {
        DeclaredAction::Attack {
            attacker,
            target,
            attack_bonus,
            damage,
            options,
        } => resolve_attack(&mut next, attacker, target, attack_bonus, &damage, &options)?,
        DeclaredAction::CastSpell {
            caster,
            spell_name,
            targets,
            slot_level,
        } => resolve_cast_spell(&mut next, caster, &spell_name, &targets, slot_level)?,
        DeclaredAction::Dash { actor } => resolve_dash(&mut next, actor)?,
        DeclaredAction::Disengage { actor } => resolve_simple_condition(
            &mut next,
            actor,
            "disengage",
            ConditionKind::Disengaged,
            "Disengage action",
        )?,
        DeclaredAction::Dodge { actor } => resolve_simple_condition(
            &mut next,
            actor,
            "dodge",
            ConditionKind::Dodging,
            "Dodge action",
        )?,
        DeclaredAction::Help {
            helper,
            target,
            kind,
        } => resolve_help(&mut next, helper, target, kind)?,
        DeclaredAction::Hide {
            actor,
            stealth_roll,
            stealth_mod,
        } => resolve_hide(&mut next, actor, stealth_roll, stealth_mod)?,
        DeclaredAction::Ready {
            actor,
            trigger,
            readied_action_description,
        } => resolve_ready(&mut next, actor, &trigger, &readied_action_description)?,
        DeclaredAction::Grapple { attacker, target } => {
            resolve_grapple(&mut next, attacker, target)?
        }
        DeclaredAction::Shove {
            attacker,
            target,
            mode,
        } => resolve_shove(&mut next, attacker, target, mode)?,
        DeclaredAction::Move {
            actor,
            distance,
            new_position,
        } => resolve_move(&mut next, actor, distance, new_position)?,
        DeclaredAction::StandUp { actor } => resolve_stand_up(&mut next, actor)?,
        DeclaredAction::DeathSave { actor } => resolve_death_save_action(&mut next, actor)?,
        DeclaredAction::EndTurn { actor } => resolve_end_turn(&mut next, actor)?,
    };

    Ok((next, result))
}

// ============================================================================
// Shared helpers
// ============================================================================

fn lookup(enc: &Encounter, id: CombatantId) -> Result<&crate::combatant::Combatant, CombatError> {
    enc.combatant(id)
        .ok_or_else(|| CombatError::NotFound(id.to_string()))
}

fn require_live_target(
    enc: &Encounter,
    target: CombatantId,
) -> Result<&crate::combatant::Combatant, CombatError> {
    if let Some(defeated) = enc.defeated.iter().find(|c| c.id == target) {
        return Err(CombatError::InvalidTarget(format!(
            "{} is already defeated",
            defeated.name
        )));
    }
    lookup(enc, target)
}

fn require_action(enc: &Encounter, actor: CombatantId) -> Result<(), CombatError> {
    if lookup(enc, actor)?.turn_resources.action_used {
        return Err(CombatError::ResourceUnavailable(
            "action already used this turn".to_string(),
        ));
    }
    Ok(())
}

fn spend_action(enc: &mut Encounter, actor: CombatantId) {
    if let Some(c) = enc.combatant_mut(actor) {
        c.turn_resources.action_used = true;
    }
}

fn ability_save_modifier(combatant: &crate::combatant::Combatant, ability: Ability) -> i32 {
    match ability {
        Ability::Dexterity => combatant.dex_mod,
        Ability::Constitution => combatant.con_mod,
        Ability::Wisdom => combatant.wis_mod,
        _ => 0,
    }
}

/// Roll a saving throw for a combatant, honoring condition modifiers.
/// Returns the roll (absent on an automatic failure) and success.
fn saving_throw(
    enc: &mut Encounter,
    target: CombatantId,
    ability: Ability,
    dc: u32,
) -> (Option<crate::dice::DiceRoll>, bool) {
    let Some(combatant) = enc.combatant(target) else {
        return (None, false);
    };
    let mods = conditions::save_modifiers(&combatant.conditions, ability);
    if mods.auto_fail {
        return (None, false);
    }
    let modifier = ability_save_modifier(combatant, ability);
    let mode = AdvantageMode::from_flags(mods.advantage, mods.disadvantage);
    let roll = execute(&mut enc.roller, 1, DieType::D20, modifier, mode);
    let success = roll.total >= dc as i32;
    (Some(roll), success)
}

/// After damage lands, see whether the target's concentration holds.
fn concentration_after_damage(
    enc: &mut Encounter,
    target_id: CombatantId,
    damage_final: u32,
    entry: &mut LogEntry,
) {
    let Some(target) = enc.combatant(target_id) else {
        return;
    };
    let Some(check) = damage::check_concentration(target, damage_final) else {
        return;
    };
    let name = target.name.clone();

    // Dropping to zero ends concentration outright; otherwise CON save.
    let held = if target.hp.current == 0 {
        false
    } else {
        let (roll, success) = saving_throw(enc, target_id, Ability::Constitution, check.dc);
        if let Some(roll) = roll {
            entry.dice_rolls.push(roll);
        }
        success
    };

    if held {
        entry
            .action_description
            .push_str(&format!(" {} maintains concentration on {}.", name, check.spell_name));
    } else {
        debug!("{} loses concentration on {}", name, check.spell_name);
        let removed = enc.break_concentration(target_id);
        entry.conditions_removed.extend(removed);
        entry
            .action_description
            .push_str(&format!(" {} loses concentration on {}.", name, check.spell_name));
    }
}

fn finish(
    enc: &mut Encounter,
    entry: LogEntry,
    success: bool,
) -> Result<ActionResult, CombatError> {
    let description = entry.action_description.clone();
    let stamped = enc.push_log(entry);
    Ok(ActionResult {
        success,
        description,
        log_entry: Some(stamped),
    })
}

// ============================================================================
// Attack
// ============================================================================

fn resolve_attack(
    enc: &mut Encounter,
    attacker_id: CombatantId,
    target_id: CombatantId,
    attack_bonus: i32,
    damage: &AttackDamage,
    options: &AttackOptions,
) -> Result<ActionResult, CombatError> {
    if attacker_id == target_id {
        return Err(CombatError::InvalidTarget(
            "a combatant cannot attack itself".to_string(),
        ));
    }
    let attacker = lookup(enc, attacker_id)?;
    let attacker_name = attacker.name.clone();

    // An incapacitated attacker auto-fails without spending anything.
    if conditions::is_incapacitated(&attacker.conditions) {
        let entry = LogEntry::new(
            attacker_id,
            &attacker_name,
            "attack",
            format!("{} is incapacitated and cannot attack", attacker_name),
        )
        .with_target(target_id)
        .with_outcome("auto-fail");
        return finish(enc, entry, false);
    }

    let target = require_live_target(enc, target_id)?;
    let target_name = target.name.clone();
    let target_ac = target.ac;
    let target_dying = target.is_dying();

    require_action(enc, attacker_id)?;
    let damage_expr = DiceExpression::parse(&damage.dice)?;

    let attacker = lookup(enc, attacker_id)?;
    let target = lookup(enc, target_id)?;
    let distance = enc
        .distance_between(attacker_id, target_id)
        .unwrap_or(if options.is_ranged { 30 } else { 5 });

    let attacker_mods = conditions::attacker_modifiers(&attacker.conditions);
    let helped = conditions::has(&attacker.conditions, &ConditionKind::HelpedAttack);
    let hidden = conditions::has(&attacker.conditions, &ConditionKind::Hidden);
    let advantage = options.advantage
        || attacker_mods.advantage
        || helped
        || hidden
        || conditions::attacks_against_have_advantage(&target.conditions, distance);
    let disadvantage = options.disadvantage
        || attacker_mods.disadvantage
        || options.long_range
        || conditions::attacks_against_have_disadvantage(&target.conditions, distance);
    let mode = AdvantageMode::from_flags(advantage, disadvantage);

    let attack_roll = execute(&mut enc.roller, 1, DieType::D20, attack_bonus, mode);
    let is_critical = attack_roll.crit_hit;
    let is_hit = is_critical || (!attack_roll.crit_miss && attack_roll.total >= target_ac as i32);

    let mut entry = LogEntry::new(
        attacker_id,
        &attacker_name,
        "attack",
        format!(
            "{} attacks {} ({} vs AC {})",
            attacker_name, target_name, attack_roll.total, target_ac
        ),
    )
    .with_target(target_id)
    .with_roll(attack_roll);

    // The attack consumes the action and any one-shot setup conditions,
    // hit or miss.
    {
        let attacker = enc.combatant_mut(attacker_id).expect("attacker exists");
        attacker.turn_resources.action_used = true;
        for kind in [ConditionKind::HelpedAttack, ConditionKind::Hidden] {
            let consumed = conditions::remove(&mut attacker.conditions, Some(&kind), None);
            entry
                .conditions_removed
                .extend(consumed.expired.iter().map(|c| c.kind.name().to_string()));
        }
    }

    if !is_hit {
        entry.outcome = "miss".to_string();
        entry.action_description.push_str(" Miss!");
        return finish(enc, entry, false);
    }

    let damage_roll = roll_damage(&mut enc.roller, &damage_expr, is_critical);
    let amount = damage_roll.total.max(0) as u32;
    entry.dice_rolls.push(damage_roll);

    let instance = DamageInstance {
        amount,
        damage_type: damage.damage_type,
        source: attacker_name.clone(),
        is_critical,
        is_magical: options.is_magical,
    };

    if target_dying {
        let target = enc.combatant_mut(target_id).expect("target exists");
        if let Some(dying) = damage::apply_damage_while_dying(target, &instance) {
            entry.action_description.push_str(&format!(
                " {} suffers a death save failure ({}/3).",
                target_name, dying.total_failures
            ));
            if dying.is_dead {
                entry.action_description.push_str(&format!(" {} dies.", target_name));
            }
        }
    } else {
        let target = enc.combatant_mut(target_id).expect("target exists");
        let outcome = damage::apply_damage(target, &instance);
        let final_amount = outcome.final_amount;
        entry.action_description.push_str(&format!(" {}.", outcome.description));
        entry.damage.push(outcome);
        if final_amount > 0 {
            concentration_after_damage(enc, target_id, final_amount, &mut entry);
        }
    }

    let slain = enc.migrate_dead();
    for name in &slain {
        entry.action_description.push_str(&format!(" {} is defeated.", name));
    }

    entry.outcome = if is_critical {
        "critical hit".to_string()
    } else {
        "hit".to_string()
    };
    finish(enc, entry, true)
}

// ============================================================================
// Spellcasting
// ============================================================================

fn require_casting_resource(
    enc: &Encounter,
    caster: CombatantId,
    resource: CastingResource,
) -> Result<(), CombatError> {
    let c = lookup(enc, caster)?;
    let (used, label) = match resource {
        CastingResource::Action => (c.turn_resources.action_used, "action"),
        CastingResource::BonusAction => (c.turn_resources.bonus_action_used, "bonus action"),
        CastingResource::Reaction => (c.turn_resources.reaction_used, "reaction"),
    };
    if used {
        return Err(CombatError::ResourceUnavailable(format!(
            "{label} already used this turn"
        )));
    }
    Ok(())
}

fn spend_casting_resource(enc: &mut Encounter, caster: CombatantId, resource: CastingResource) {
    if let Some(c) = enc.combatant_mut(caster) {
        match resource {
            CastingResource::Action => c.turn_resources.action_used = true,
            CastingResource::BonusAction => c.turn_resources.bonus_action_used = true,
            CastingResource::Reaction => c.turn_resources.reaction_used = true,
        }
    }
}

fn require_and_spend_slot(
    enc: &mut Encounter,
    caster: CombatantId,
    spell_level: u8,
    slot_level: Option<u8>,
) -> Result<Option<u8>, CombatError> {
    if spell_level == 0 {
        return Ok(None);
    }
    let level = slot_level.unwrap_or(spell_level);
    if level < spell_level {
        return Err(CombatError::ResourceUnavailable(format!(
            "a level {level} slot cannot cast a level {spell_level} spell"
        )));
    }
    let c = enc
        .combatant_mut(caster)
        .ok_or_else(|| CombatError::NotFound(caster.to_string()))?;
    if !c.spend_spell_slot(level) {
        return Err(CombatError::ResourceUnavailable(format!(
            "no level {level} spell slot remaining"
        )));
    }
    Ok(Some(level))
}

fn resolve_cast_spell(
    enc: &mut Encounter,
    caster_id: CombatantId,
    spell_name: &str,
    targets: &[CombatantId],
    slot_level: Option<u8>,
) -> Result<ActionResult, CombatError> {
    let caster = lookup(enc, caster_id)?;
    let caster_name = caster.name.clone();
    for target in targets {
        require_live_target(enc, *target)?;
    }

    // Registry spells first.
    if let Some(effect) = spells::get_effect(spell_name) {
        let resource = effect.casting_resource();
        require_casting_resource(enc, caster_id, resource)?;
        require_and_spend_slot(enc, caster_id, effect.level(), slot_level)?;

        let outcome = effect.apply(enc, caster_id, targets)?;
        spend_casting_resource(enc, caster_id, resource);

        let mut entry = LogEntry::new(
            caster_id,
            &caster_name,
            "cast_spell",
            format!("{} casts {}. {}", caster_name, effect.name(), outcome.description),
        )
        .with_targets(outcome.targets.clone())
        .with_outcome(if outcome.success { "cast" } else { "no effect" });
        entry.dice_rolls = outcome.dice_rolls.clone();
        entry.conditions_applied = outcome.conditions_applied.clone();
        return finish(enc, entry, outcome.success);
    }

    // Fall back to the caster's sheet-resolved spell list.
    let spell = caster
        .spells
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(spell_name))
        .cloned()
        .ok_or_else(|| CombatError::Unknown(format!("spell '{spell_name}'")))?;

    require_casting_resource(enc, caster_id, CastingResource::Action)?;
    require_and_spend_slot(enc, caster_id, spell.level, slot_level)?;

    let mut entry = LogEntry::new(
        caster_id,
        &caster_name,
        "cast_spell",
        format!("{} casts {}.", caster_name, spell.name),
    )
    .with_targets(targets.iter().copied());
    let mut success = true;

    if let Some(attack_kind) = spell.attack {
        // Spell attack against a single target.
        let target_id = *targets.first().ok_or_else(|| {
            CombatError::InvalidTarget(format!("{} needs a target", spell.name))
        })?;
        if target_id == caster_id {
            return Err(CombatError::InvalidTarget(
                "a spell attack cannot target its caster".to_string(),
            ));
        }

        let caster = lookup(enc, caster_id)?;
        let target = lookup(enc, target_id)?;
        let distance = enc.distance_between(caster_id, target_id).unwrap_or(
            match attack_kind {
                SpellAttackKind::Melee => 5,
                SpellAttackKind::Ranged => 30,
            },
        );
        let caster_mods = conditions::attacker_modifiers(&caster.conditions);
        let advantage = caster_mods.advantage
            || conditions::attacks_against_have_advantage(&target.conditions, distance);
        let disadvantage = caster_mods.disadvantage
            || conditions::attacks_against_have_disadvantage(&target.conditions, distance);
        let mode = AdvantageMode::from_flags(advantage, disadvantage);
        let bonus = caster.spell_attack_bonus;
        let target_ac = target.ac;
        let target_name = target.name.clone();

        let attack_roll = execute(&mut enc.roller, 1, DieType::D20, bonus, mode);
        let is_critical = attack_roll.crit_hit;
        let is_hit =
            is_critical || (!attack_roll.crit_miss && attack_roll.total >= target_ac as i32);
        entry.action_description.push_str(&format!(
            " Spell attack vs {} ({} vs AC {}).",
            target_name, attack_roll.total, target_ac
        ));
        entry.dice_rolls.push(attack_roll);

        if is_hit {
            if let Some(dice) = &spell.damage {
                let expr = DiceExpression::parse(dice)?;
                let damage_roll = roll_damage(&mut enc.roller, &expr, is_critical);
                let amount = damage_roll.total.max(0) as u32;
                entry.dice_rolls.push(damage_roll);
                let instance = DamageInstance {
                    amount,
                    damage_type: spell.damage_type.unwrap_or(DamageType::Force),
                    source: spell.name.clone(),
                    is_critical,
                    is_magical: true,
                };
                let target = enc.combatant_mut(target_id).expect("target exists");
                let outcome = damage::apply_damage(target, &instance);
                let final_amount = outcome.final_amount;
                entry.action_description.push_str(&format!(" {}.", outcome.description));
                entry.damage.push(outcome);
                if final_amount > 0 {
                    concentration_after_damage(enc, target_id, final_amount, &mut entry);
                }
            }
            entry.outcome = if is_critical {
                "critical hit".to_string()
            } else {
                "hit".to_string()
            };
        } else {
            entry.outcome = "miss".to_string();
            entry.action_description.push_str(" Miss!");
            success = false;
        }
    } else if let Some(save_ability) = spell.saving_throw {
        // Save-or-suffer against each target.
        if targets.is_empty() {
            return Err(CombatError::InvalidTarget(format!(
                "{} needs at least one target",
                spell.name
            )));
        }
        let dc = lookup(enc, caster_id)?.spell_save_dc;
        entry.action_description.push_str(&format!(
            " Targets make a DC {} {} saving throw.",
            dc,
            save_ability.abbreviation()
        ));
        for &target_id in targets {
            let target_name = lookup(enc, target_id)?.name.clone();
            let (roll, saved) = saving_throw(enc, target_id, save_ability, dc);
            if let Some(roll) = roll {
                entry.dice_rolls.push(roll);
            }
            if saved {
                entry
                    .action_description
                    .push_str(&format!(" {} saves.", target_name));
                continue;
            }
            if let Some(dice) = &spell.damage {
                let expr = DiceExpression::parse(dice)?;
                let damage_roll = roll_damage(&mut enc.roller, &expr, false);
                let amount = damage_roll.total.max(0) as u32;
                entry.dice_rolls.push(damage_roll);
                let instance = DamageInstance {
                    amount,
                    damage_type: spell.damage_type.unwrap_or(DamageType::Force),
                    source: spell.name.clone(),
                    is_critical: false,
                    is_magical: true,
                };
                let target = enc.combatant_mut(target_id).expect("target exists");
                let outcome = damage::apply_damage(target, &instance);
                let final_amount = outcome.final_amount;
                entry.action_description.push_str(&format!(" {}.", outcome.description));
                entry.damage.push(outcome);
                if final_amount > 0 {
                    concentration_after_damage(enc, target_id, final_amount, &mut entry);
                }
            } else {
                entry
                    .action_description
                    .push_str(&format!(" {} fails the save.", target_name));
            }
        }
        entry.outcome = "resolved".to_string();
    } else if let Some(healing) = &spell.healing {
        let target_id = targets.first().copied().unwrap_or(caster_id);
        let expr = DiceExpression::parse(healing)?;
        let healing_roll = expr.roll(&mut enc.roller);
        let amount = healing_roll.total.max(0) as u32;
        entry.dice_rolls.push(healing_roll);
        let target = enc
            .combatant_mut(target_id)
            .ok_or_else(|| CombatError::NotFound(target_id.to_string()))?;
        let outcome = damage::apply_healing(target, amount, &spell.name);
        entry.action_description.push_str(&format!(" {}.", outcome.description));
        entry.healing = Some(outcome);
        entry.outcome = "healed".to_string();
    } else {
        entry.action_description.push_str(" Nothing obvious happens.");
        entry.outcome = "cast".to_string();
    }

    spend_casting_resource(enc, caster_id, CastingResource::Action);
    let slain = enc.migrate_dead();
    for name in &slain {
        entry.action_description.push_str(&format!(" {} is defeated.", name));
    }
    finish(enc, entry, success)
}

// ============================================================================
// Simple actions
// ============================================================================

fn resolve_dash(enc: &mut Encounter, actor_id: CombatantId) -> Result<ActionResult, CombatError> {
    require_action(enc, actor_id)?;
    let actor = enc.combatant_mut(actor_id).expect("actor exists");
    let gained = conditions::effective_speed(&actor.conditions, actor.speed);
    actor.turn_resources.action_used = true;
    actor.turn_resources.movement_remaining += gained;
    let name = actor.name.clone();
    let remaining = actor.turn_resources.movement_remaining;
    let entry = LogEntry::new(
        actor_id,
        &name,
        "dash",
        format!("{name} dashes ({remaining} ft of movement remaining)"),
    )
    .with_outcome("success");
    finish(enc, entry, true)
}

fn resolve_simple_condition(
    enc: &mut Encounter,
    actor_id: CombatantId,
    action_type: &str,
    kind: ConditionKind,
    source: &str,
) -> Result<ActionResult, CombatError> {
    require_action(enc, actor_id)?;
    let actor = enc.combatant_mut(actor_id).expect("actor exists");
    actor.turn_resources.action_used = true;
    conditions::add(
        &mut actor.conditions,
        ActiveCondition::new(kind, source)
            .with_duration(ConditionDuration::until_next_turn_start()),
    );
    let name = actor.name.clone();
    let entry = LogEntry::new(
        actor_id,
        &name,
        action_type,
        format!("{} takes the {} action", name, action_type),
    )
    .with_condition_applied(kind.name())
    .with_outcome("success");
    finish(enc, entry, true)
}

fn resolve_help(
    enc: &mut Encounter,
    helper_id: CombatantId,
    target_id: CombatantId,
    kind: HelpKind,
) -> Result<ActionResult, CombatError> {
    if helper_id == target_id {
        return Err(CombatError::InvalidTarget(
            "a combatant cannot help itself".to_string(),
        ));
    }
    require_live_target(enc, target_id)?;
    require_action(enc, helper_id)?;

    let helper_name = lookup(enc, helper_id)?.name.clone();
    let condition_kind = match kind {
        HelpKind::Attack => ConditionKind::HelpedAttack,
        HelpKind::AbilityCheck => ConditionKind::HelpedCheck,
    };
    let target = enc.combatant_mut(target_id).expect("target exists");
    let target_name = target.name.clone();
    // The window is anchored to the helper's next turn, so it must survive
    // the target's own turn start.
    conditions::add(
        &mut target.conditions,
        ActiveCondition::new(condition_kind, helper_name.clone())
            .with_duration(ConditionDuration::until_next_turn_start())
            .with_delayed_tick(),
    );
    spend_action(enc, helper_id);

    let entry = LogEntry::new(
        helper_id,
        &helper_name,
        "help",
        format!("{helper_name} helps {target_name}"),
    )
    .with_target(target_id)
    .with_condition_applied(condition_kind.name())
    .with_outcome("success");
    finish(enc, entry, true)
}

fn resolve_hide(
    enc: &mut Encounter,
    actor_id: CombatantId,
    stealth_roll: u32,
    stealth_mod: i32,
) -> Result<ActionResult, CombatError> {
    require_action(enc, actor_id)?;
    let name = lookup(enc, actor_id)?.name.clone();

    // Darkness favors the hider.
    let lighting_bonus = match enc.lighting {
        Lighting::Dark => 2,
        _ => 0,
    };
    let total = stealth_roll as i32 + stealth_mod + lighting_bonus;

    let dc = enc
        .live_opponents_of(actor_id)
        .iter()
        .map(|enemy| 10 + enemy.wis_mod)
        .max()
        .unwrap_or(12);

    let success = total >= dc;
    let mut entry = LogEntry::new(
        actor_id,
        &name,
        "hide",
        format!("{name} tries to hide (stealth {total} vs DC {dc})"),
    );
    spend_action(enc, actor_id);

    if success {
        let actor = enc.combatant_mut(actor_id).expect("actor exists");
        conditions::add(
            &mut actor.conditions,
            ActiveCondition::new(ConditionKind::Hidden, "Hide action")
                .with_duration(ConditionDuration::Special("until detected".to_string())),
        );
        entry = entry
            .with_condition_applied("hidden")
            .with_outcome("hidden");
    } else {
        entry = entry.with_outcome("spotted");
    }
    finish(enc, entry, success)
}

fn resolve_ready(
    enc: &mut Encounter,
    actor_id: CombatantId,
    trigger: &str,
    description: &str,
) -> Result<ActionResult, CombatError> {
    require_action(enc, actor_id)?;
    let actor = enc.combatant_mut(actor_id).expect("actor exists");
    actor.turn_resources.action_used = true;
    let name = actor.name.clone();
    // The stored trigger is the whole contract; firing it is out of scope.
    conditions::add(
        &mut actor.conditions,
        ActiveCondition::new(
            ConditionKind::Readied,
            format!("{trigger}: {description}"),
        )
        .with_duration(ConditionDuration::until_next_turn_start()),
    );
    let entry = LogEntry::new(
        actor_id,
        &name,
        "ready",
        format!("{name} readies an action ({trigger}: {description})"),
    )
    .with_condition_applied("readied")
    .with_outcome("success");
    finish(enc, entry, true)
}

// ============================================================================
// Contested checks
// ============================================================================

fn contested_check(
    enc: &mut Encounter,
    attacker_mod: i32,
    defender_mod: i32,
) -> (crate::dice::DiceRoll, crate::dice::DiceRoll, bool) {
    let attacker_roll = execute(
        &mut enc.roller,
        1,
        DieType::D20,
        attacker_mod,
        AdvantageMode::Normal,
    );
    let defender_roll = execute(
        &mut enc.roller,
        1,
        DieType::D20,
        defender_mod,
        AdvantageMode::Normal,
    );
    // Attacker wins ties.
    let attacker_wins = attacker_roll.total >= defender_roll.total;
    (attacker_roll, defender_roll, attacker_wins)
}

fn resolve_grapple(
    enc: &mut Encounter,
    attacker_id: CombatantId,
    target_id: CombatantId,
) -> Result<ActionResult, CombatError> {
    if attacker_id == target_id {
        return Err(CombatError::InvalidTarget(
            "a combatant cannot grapple itself".to_string(),
        ));
    }
    require_live_target(enc, target_id)?;
    require_action(enc, attacker_id)?;

    let attacker = lookup(enc, attacker_id)?;
    let target = lookup(enc, target_id)?;
    let attacker_name = attacker.name.clone();
    let target_name = target.name.clone();
    let attacker_mod = attacker.athletics_mod;
    let defender_mod = target.athletics_mod.max(target.acrobatics_mod);

    let (attacker_roll, defender_roll, attacker_wins) =
        contested_check(enc, attacker_mod, defender_mod);
    spend_action(enc, attacker_id);

    let mut entry = LogEntry::new(
        attacker_id,
        &attacker_name,
        "grapple",
        format!(
            "{} tries to grapple {} ({} vs {})",
            attacker_name, target_name, attacker_roll.total, defender_roll.total
        ),
    )
    .with_target(target_id)
    .with_roll(attacker_roll)
    .with_roll(defender_roll);

    if attacker_wins {
        let target = enc.combatant_mut(target_id).expect("target exists");
        conditions::add(
            &mut target.conditions,
            ActiveCondition::new(ConditionKind::Grappled, attacker_name.clone()),
        );
        entry = entry
            .with_condition_applied("grappled")
            .with_outcome("grappled");
    } else {
        entry = entry.with_outcome("escaped");
    }
    finish(enc, entry, attacker_wins)
}

fn resolve_shove(
    enc: &mut Encounter,
    attacker_id: CombatantId,
    target_id: CombatantId,
    mode: ShoveMode,
) -> Result<ActionResult, CombatError> {
    if attacker_id == target_id {
        return Err(CombatError::InvalidTarget(
            "a combatant cannot shove itself".to_string(),
        ));
    }
    require_live_target(enc, target_id)?;
    require_action(enc, attacker_id)?;

    let attacker = lookup(enc, attacker_id)?;
    let target = lookup(enc, target_id)?;
    let attacker_name = attacker.name.clone();
    let target_name = target.name.clone();
    let attacker_mod = attacker.athletics_mod;
    let defender_mod = target.athletics_mod.max(target.acrobatics_mod);

    let (attacker_roll, defender_roll, attacker_wins) =
        contested_check(enc, attacker_mod, defender_mod);
    spend_action(enc, attacker_id);

    let mut entry = LogEntry::new(
        attacker_id,
        &attacker_name,
        "shove",
        format!(
            "{} tries to shove {} ({} vs {})",
            attacker_name, target_name, attacker_roll.total, defender_roll.total
        ),
    )
    .with_target(target_id)
    .with_roll(attacker_roll)
    .with_roll(defender_roll);

    if attacker_wins {
        match mode {
            ShoveMode::Prone => {
                let target = enc.combatant_mut(target_id).expect("target exists");
                conditions::add(
                    &mut target.conditions,
                    ActiveCondition::new(ConditionKind::Prone, attacker_name.clone()),
                );
                entry = entry
                    .with_condition_applied("prone")
                    .with_outcome("knocked prone");
            }
            ShoveMode::Push => {
                // New position is the caller's concern; the engine records
                // only the result of the contest.
                entry = entry.with_outcome("pushed");
            }
        }
    } else {
        entry = entry.with_outcome("resisted");
    }
    finish(enc, entry, attacker_wins)
}

// ============================================================================
// Movement
// ============================================================================

fn resolve_move(
    enc: &mut Encounter,
    actor_id: CombatantId,
    distance: u32,
    new_position: Option<(i32, i32)>,
) -> Result<ActionResult, CombatError> {
    let actor = lookup(enc, actor_id)?;
    if conditions::effective_speed(&actor.conditions, actor.speed) == 0 {
        return Err(CombatError::ResourceUnavailable(
            "cannot move right now".to_string(),
        ));
    }
    if distance > actor.turn_resources.movement_remaining {
        return Err(CombatError::ResourceUnavailable(format!(
            "not enough movement ({} ft needed, {} ft remaining)",
            distance, actor.turn_resources.movement_remaining
        )));
    }
    let actor = enc.combatant_mut(actor_id).expect("actor exists");
    actor.turn_resources.movement_remaining -= distance;
    if let Some(position) = new_position {
        actor.position = Some(position);
    }
    let name = actor.name.clone();
    let remaining = actor.turn_resources.movement_remaining;
    let entry = LogEntry::new(
        actor_id,
        &name,
        "move",
        format!("{name} moves {distance} ft ({remaining} ft remaining)"),
    )
    .with_outcome("success");
    finish(enc, entry, true)
}

fn resolve_stand_up(
    enc: &mut Encounter,
    actor_id: CombatantId,
) -> Result<ActionResult, CombatError> {
    let actor = lookup(enc, actor_id)?;
    if !conditions::has(&actor.conditions, &ConditionKind::Prone) {
        return Err(CombatError::InvalidTarget(format!(
            "{} is not prone",
            actor.name
        )));
    }
    let cost = actor.speed / 2;
    if actor.turn_resources.movement_remaining < cost {
        return Err(CombatError::ResourceUnavailable(format!(
            "standing up costs {} ft of movement ({} ft remaining)",
            cost, actor.turn_resources.movement_remaining
        )));
    }
    let actor = enc.combatant_mut(actor_id).expect("actor exists");
    actor.turn_resources.movement_remaining -= cost;
    conditions::remove(&mut actor.conditions, Some(&ConditionKind::Prone), None);
    let name = actor.name.clone();
    let entry = LogEntry::new(
        actor_id,
        &name,
        "stand_up",
        format!("{name} stands up"),
    )
    .with_condition_removed("prone")
    .with_outcome("success");
    finish(enc, entry, true)
}

// ============================================================================
// Death saves
// ============================================================================

/// Roll a death save for a dying PC and log it. Shared with the initiative
/// tracker's automatic start-of-turn save. Returns `None` when the
/// combatant is absent or not dying. A third failure leaves the corpse in
/// the order; callers migrate it when their own index bookkeeping allows.
pub(crate) fn roll_death_save(enc: &mut Encounter, actor_id: CombatantId) -> Option<LogEntry> {
    let actor = enc.combatant(actor_id)?;
    if !actor.is_dying() {
        return None;
    }
    let name = actor.name.clone();

    let roll = execute(&mut enc.roller, 1, DieType::D20, 0, AdvantageMode::Normal);
    let mut entry = LogEntry::new(
        actor_id,
        &name,
        "death_save",
        format!("{} makes a death saving throw ({})", name, roll.total),
    )
    .with_roll(roll.clone());

    let actor = enc.combatant_mut(actor_id)?;
    let mut saves = actor.death_saves.unwrap_or_default();

    if roll.crit_hit {
        actor.hp.current = 1;
        actor.death_saves = Some(DeathSaves::default());
        conditions::remove(
            &mut actor.conditions,
            Some(&ConditionKind::Unconscious),
            None,
        );
        entry = entry
            .with_condition_removed("unconscious")
            .with_outcome("revived");
        entry
            .action_description
            .push_str(" Natural 20! They regain 1 HP.");
    } else if roll.crit_miss {
        saves.failures = saves.failures.saturating_add(2).min(3);
        actor.death_saves = Some(saves);
        entry = entry.with_outcome(if saves.failures >= 3 { "dead" } else { "two failures" });
        entry.action_description.push_str(&format!(
            " Natural 1: two failures ({}/3).",
            saves.failures
        ));
    } else if roll.total >= 10 {
        saves.successes = saves.successes.saturating_add(1).min(3);
        actor.death_saves = Some(saves);
        if saves.successes >= 3 {
            entry = entry.with_outcome("stabilized");
            entry.action_description.push_str(" Third success: stabilized.");
        } else {
            entry = entry.with_outcome("success");
            entry
                .action_description
                .push_str(&format!(" Success ({}/3).", saves.successes));
        }
    } else {
        saves.failures = saves.failures.saturating_add(1).min(3);
        actor.death_saves = Some(saves);
        if saves.failures >= 3 {
            entry = entry.with_outcome("dead");
            entry.action_description.push_str(" Third failure: they die.");
        } else {
            entry = entry.with_outcome("failure");
            entry
                .action_description
                .push_str(&format!(" Failure ({}/3).", saves.failures));
        }
    }

    Some(enc.push_log(entry))
}

fn resolve_death_save_action(
    enc: &mut Encounter,
    actor_id: CombatantId,
) -> Result<ActionResult, CombatError> {
    let actor = lookup(enc, actor_id)?;
    if !actor.is_pc() || actor.hp.current > 0 {
        return Err(CombatError::InvalidTarget(format!(
            "{} is not dying and has no death save to roll",
            actor.name
        )));
    }
    if actor.is_stable() {
        return Err(CombatError::InvalidTarget(format!(
            "{} is stable and rolls no further death saves",
            actor.name
        )));
    }
    if actor.is_dead() {
        return Err(CombatError::InvalidTarget(format!(
            "{} is dead",
            actor.name
        )));
    }

    let entry = roll_death_save(enc, actor_id)
        .ok_or_else(|| CombatError::NotFound(actor_id.to_string()))?;
    enc.migrate_dead();
    Ok(ActionResult {
        success: true,
        description: entry.action_description.clone(),
        log_entry: Some(entry),
    })
}

// ============================================================================
// End turn
// ============================================================================

fn resolve_end_turn(
    enc: &mut Encounter,
    actor_id: CombatantId,
) -> Result<ActionResult, CombatError> {
    let name = lookup(enc, actor_id)?.name.clone();
    let entry = LogEntry::new(
        actor_id,
        &name,
        "end_turn",
        format!("{name} ends their turn"),
    )
    .with_outcome("turn ended");
    let stamped = enc.push_log(entry);

    let report = initiative::advance(enc);
    let next_name = enc.current().map(|c| c.name.clone()).unwrap_or_default();
    let mut description = format!("Turn ended. {} is up", next_name);
    if report.new_round {
        description.push_str(&format!(" (round {})", enc.round));
    }

    Ok(ActionResult {
        success: true,
        description,
        log_entry: Some(stamped),
    })
}
