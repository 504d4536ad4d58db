//! Damage model and damage/healing pipeline.
//!
//! Damage flows through resistance/immunity/vulnerability arithmetic, then
//! temporary hit points, then current hit points. Dropping to zero sets up
//! death saves for player characters; massive damage kills outright.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::combatant::{Combatant, CombatantKind, DeathSaves};
use crate::conditions::{self, ConditionKind};

/// The SRD damage type taxonomy.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DamageType {
    Bludgeoning,
    Piercing,
    Slashing,
    Acid,
    Cold,
    Fire,
    Force,
    Lightning,
    Necrotic,
    Poison,
    Psychic,
    Radiant,
    Thunder,
}

impl DamageType {
    pub fn name(&self) -> &'static str {
        match self {
            DamageType::Bludgeoning => "bludgeoning",
            DamageType::Piercing => "piercing",
            DamageType::Slashing => "slashing",
            DamageType::Acid => "acid",
            DamageType::Cold => "cold",
            DamageType::Fire => "fire",
            DamageType::Force => "force",
            DamageType::Lightning => "lightning",
            DamageType::Necrotic => "necrotic",
            DamageType::Poison => "poison",
            DamageType::Psychic => "psychic",
            DamageType::Radiant => "radiant",
            DamageType::Thunder => "thunder",
        }
    }

    /// Parse a damage type name, case-insensitively.
    pub fn from_name(name: &str) -> Option<DamageType> {
        match name.trim().to_lowercase().as_str() {
            "bludgeoning" => Some(DamageType::Bludgeoning),
            "piercing" => Some(DamageType::Piercing),
            "slashing" => Some(DamageType::Slashing),
            "acid" => Some(DamageType::Acid),
            "cold" => Some(DamageType::Cold),
            "fire" => Some(DamageType::Fire),
            "force" => Some(DamageType::Force),
            "lightning" => Some(DamageType::Lightning),
            "necrotic" => Some(DamageType::Necrotic),
            "poison" => Some(DamageType::Poison),
            "psychic" => Some(DamageType::Psychic),
            "radiant" => Some(DamageType::Radiant),
            "thunder" => Some(DamageType::Thunder),
            _ => None,
        }
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One packet of damage headed for a combatant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInstance {
    pub amount: u32,
    pub damage_type: DamageType,
    pub source: String,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default)]
    pub is_magical: bool,
}

impl DamageInstance {
    pub fn new(amount: u32, damage_type: DamageType, source: impl Into<String>) -> Self {
        DamageInstance {
            amount,
            damage_type,
            source: source.into(),
            is_critical: false,
            is_magical: false,
        }
    }

    pub fn critical(mut self) -> Self {
        self.is_critical = true;
        self
    }

    pub fn magical(mut self) -> Self {
        self.is_magical = true;
        self
    }
}

/// What a damage application did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageOutcome {
    pub original: u32,
    pub final_amount: u32,
    pub damage_type: DamageType,
    pub was_immune: bool,
    pub was_resisted: bool,
    pub was_vulnerable: bool,
    pub new_hp: u32,
    pub is_down: bool,
    pub instant_kill: bool,
    pub description: String,
}

/// What a healing application did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealingOutcome {
    pub amount_applied: u32,
    pub new_hp: u32,
    pub overhealing: u32,
    pub was_unconscious: bool,
    pub description: String,
}

/// Outcome of damage dealt to an already-dying player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DyingDamageOutcome {
    pub failures_added: u8,
    pub total_failures: u8,
    pub is_dead: bool,
}

/// A pending concentration check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationCheck {
    pub spell_name: String,
    pub dc: u32,
}

/// Apply one damage instance to a combatant.
///
/// Resistance halves (rounded down), immunity zeroes, vulnerability doubles.
/// Temporary hit points absorb before current. A player character whose
/// incoming final damage is at least `current + max` dies outright; anyone
/// else crossing to zero goes down (PCs pick up fresh death saves and the
/// unconscious condition, idempotently).
pub fn apply_damage(combatant: &mut Combatant, instance: &DamageInstance) -> DamageOutcome {
    let original = instance.amount;
    let was_immune = combatant.immunities.contains(&instance.damage_type);
    let was_resisted = !was_immune && combatant.resistances.contains(&instance.damage_type);
    let was_vulnerable =
        !was_immune && !was_resisted && combatant.vulnerabilities.contains(&instance.damage_type);

    let final_amount = if was_immune {
        0
    } else if was_resisted {
        original / 2
    } else if was_vulnerable {
        original.saturating_mul(2)
    } else {
        original
    };

    let was_up = combatant.hp.current > 0;
    let instant_kill = combatant.kind == CombatantKind::Pc
        && final_amount >= combatant.hp.current + combatant.hp.max;

    // Temp HP absorbs first, remainder hits current HP.
    let absorbed = final_amount.min(combatant.hp.temp);
    combatant.hp.temp -= absorbed;
    let carried = final_amount - absorbed;
    combatant.hp.current = combatant.hp.current.saturating_sub(carried);

    let is_down = combatant.hp.current == 0 && final_amount > 0;

    if instant_kill {
        warn!(
            "{} suffers massive damage ({} {}) and dies outright",
            combatant.name, final_amount, instance.damage_type
        );
        combatant.death_saves = Some(DeathSaves {
            successes: 0,
            failures: 3,
        });
    } else if was_up && is_down {
        debug!("{} drops to 0 HP from {}", combatant.name, instance.source);
        if combatant.kind == CombatantKind::Pc {
            combatant.death_saves = Some(DeathSaves::default());
            conditions::add(
                &mut combatant.conditions,
                crate::conditions::ActiveCondition::new(ConditionKind::Unconscious, "damage"),
            );
        }
    }

    let mitigation = if was_immune {
        " (immune)"
    } else if was_resisted {
        " (resisted)"
    } else if was_vulnerable {
        " (vulnerable)"
    } else {
        ""
    };
    let status = if instant_kill {
        " and dies instantly".to_string()
    } else if was_up && is_down {
        format!(" and falls (HP 0/{})", combatant.hp.max)
    } else {
        format!(" (HP {}/{})", combatant.hp.current, combatant.hp.max)
    };
    let description = format!(
        "{} takes {} {} damage from {}{}{}",
        combatant.name, final_amount, instance.damage_type, instance.source, mitigation, status
    );

    DamageOutcome {
        original,
        final_amount,
        damage_type: instance.damage_type,
        was_immune,
        was_resisted,
        was_vulnerable,
        new_hp: combatant.hp.current,
        is_down,
        instant_kill,
        description,
    }
}

/// Apply a sequence of damage instances, stopping after an instant kill.
pub fn apply_multiple_damage(
    combatant: &mut Combatant,
    instances: &[DamageInstance],
) -> Vec<DamageOutcome> {
    let mut outcomes = Vec::new();
    for instance in instances {
        let outcome = apply_damage(combatant, instance);
        let stop = outcome.instant_kill;
        outcomes.push(outcome);
        if stop {
            break;
        }
    }
    outcomes
}

/// Heal a combatant, clamped at max HP.
///
/// Crossing from zero to positive clears the unconscious condition and
/// resets death saves.
pub fn apply_healing(
    combatant: &mut Combatant,
    amount: u32,
    source: &str,
) -> HealingOutcome {
    let was_unconscious = combatant.hp.current == 0;
    let headroom = combatant.hp.max - combatant.hp.current;
    let applied = amount.min(headroom);
    combatant.hp.current += applied;

    if was_unconscious && combatant.hp.current > 0 {
        conditions::remove(
            &mut combatant.conditions,
            Some(&ConditionKind::Unconscious),
            None,
        );
        if combatant.kind == CombatantKind::Pc {
            combatant.death_saves = Some(DeathSaves::default());
        }
        debug!("{} regains consciousness", combatant.name);
    }

    let revived = if was_unconscious && combatant.hp.current > 0 {
        " and regains consciousness"
    } else {
        ""
    };
    let description = format!(
        "{} heals {} HP from {}{} (HP {}/{})",
        combatant.name, applied, source, revived, combatant.hp.current, combatant.hp.max
    );

    HealingOutcome {
        amount_applied: applied,
        new_hp: combatant.hp.current,
        overhealing: amount - applied,
        was_unconscious,
        description,
    }
}

/// Grant temporary hit points. Temp HP never stacks; the larger pool wins.
pub fn apply_temp_hp(combatant: &mut Combatant, amount: u32) {
    combatant.hp.temp = combatant.hp.temp.max(amount);
}

/// Whether a damaged combatant must check concentration, and at what DC.
pub fn check_concentration(combatant: &Combatant, damage_taken: u32) -> Option<ConcentrationCheck> {
    combatant
        .concentrating_on
        .as_ref()
        .map(|spell| ConcentrationCheck {
            spell_name: spell.clone(),
            dc: (damage_taken / 2).max(10),
        })
}

/// Damage dealt to a PC already at 0 HP: death save failures instead of HP.
///
/// One failure, two on a critical hit, clamped at three. No-op for
/// combatants still standing or without death saves.
pub fn apply_damage_while_dying(
    combatant: &mut Combatant,
    instance: &DamageInstance,
) -> Option<DyingDamageOutcome> {
    if combatant.hp.current > 0 {
        return None;
    }
    let saves = combatant.death_saves.as_mut()?;
    let added = if instance.is_critical { 2 } else { 1 };
    saves.failures = saves.failures.saturating_add(added).min(3);
    Some(DyingDamageOutcome {
        failures_added: added,
        total_failures: saves.failures,
        is_dead: saves.failures >= 3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_pc;

    fn slashing(amount: u32) -> DamageInstance {
        DamageInstance::new(amount, DamageType::Slashing, "Longsword")
    }

    #[test]
    fn test_plain_damage() {
        let mut pc = sample_pc("Roland", 30, 16);
        let outcome = apply_damage(&mut pc, &slashing(7));
        assert_eq!(outcome.final_amount, 7);
        assert_eq!(pc.hp.current, 23);
        assert!(!outcome.is_down);
    }

    #[test]
    fn test_resistance_halves_rounding_down() {
        let mut pc = sample_pc("Roland", 30, 16);
        pc.resistances.insert(DamageType::Slashing);
        let outcome = apply_damage(&mut pc, &slashing(7));
        assert_eq!(outcome.final_amount, 3);
        assert!(outcome.was_resisted);
        assert!(outcome.final_amount <= outcome.original);
    }

    #[test]
    fn test_immunity_zeroes() {
        let mut pc = sample_pc("Roland", 30, 16);
        pc.immunities.insert(DamageType::Slashing);
        let outcome = apply_damage(&mut pc, &slashing(7));
        assert_eq!(outcome.final_amount, 0);
        assert!(outcome.was_immune);
        assert_eq!(pc.hp.current, 30);
        assert!(!outcome.is_down);
    }

    #[test]
    fn test_vulnerability_doubles() {
        let mut pc = sample_pc("Roland", 30, 16);
        pc.vulnerabilities.insert(DamageType::Slashing);
        let outcome = apply_damage(&mut pc, &slashing(7));
        assert_eq!(outcome.final_amount, 14);
        assert!(outcome.was_vulnerable);
        assert!(outcome.final_amount >= outcome.original);
    }

    #[test]
    fn test_temp_hp_absorbs_first() {
        let mut pc = sample_pc("Roland", 30, 16);
        apply_temp_hp(&mut pc, 5);
        let outcome = apply_damage(&mut pc, &slashing(7));
        assert_eq!(pc.hp.temp, 0);
        assert_eq!(pc.hp.current, 28);
        assert_eq!(outcome.new_hp, 28);
    }

    #[test]
    fn test_temp_hp_never_stacks() {
        let mut pc = sample_pc("Roland", 30, 16);
        apply_temp_hp(&mut pc, 8);
        apply_temp_hp(&mut pc, 5);
        assert_eq!(pc.hp.temp, 8);
        apply_temp_hp(&mut pc, 8);
        assert_eq!(pc.hp.temp, 8);
        apply_temp_hp(&mut pc, 12);
        assert_eq!(pc.hp.temp, 12);
    }

    #[test]
    fn test_drop_to_zero_sets_up_death_saves() {
        let mut pc = sample_pc("Roland", 30, 16);
        pc.hp.current = 5;
        let outcome = apply_damage(&mut pc, &slashing(9));
        assert!(outcome.is_down);
        assert!(!outcome.instant_kill);
        assert_eq!(pc.hp.current, 0);
        assert_eq!(
            pc.death_saves,
            Some(DeathSaves {
                successes: 0,
                failures: 0
            })
        );
        assert!(conditions::has(&pc.conditions, &ConditionKind::Unconscious));

        // A second application never duplicates the condition.
        apply_damage(&mut pc, &slashing(0));
        let count = pc
            .conditions
            .iter()
            .filter(|c| c.kind.same_kind(&ConditionKind::Unconscious))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_instant_kill_threshold() {
        // current 10, max 40: 49 does not instant-kill, 50 does.
        let mut pc = sample_pc("Mira", 40, 12);
        pc.hp.current = 10;
        let outcome = apply_damage(&mut pc, &slashing(49));
        assert!(!outcome.instant_kill);
        assert!(outcome.is_down);

        let mut pc = sample_pc("Mira", 40, 12);
        pc.hp.current = 10;
        let outcome = apply_damage(&mut pc, &slashing(50));
        assert!(outcome.instant_kill);
        assert_eq!(pc.death_saves.as_ref().unwrap().failures, 3);
    }

    #[test]
    fn test_multiple_damage_stops_on_instant_kill() {
        let mut pc = sample_pc("Mira", 10, 12);
        pc.hp.current = 2;
        let outcomes = apply_multiple_damage(
            &mut pc,
            &[slashing(30), slashing(5), slashing(5)],
        );
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].instant_kill);
    }

    #[test]
    fn test_healing_clamps_and_revives() {
        let mut pc = sample_pc("Roland", 30, 16);
        pc.hp.current = 0;
        pc.death_saves = Some(DeathSaves {
            successes: 1,
            failures: 2,
        });
        conditions::add(
            &mut pc.conditions,
            crate::conditions::ActiveCondition::new(ConditionKind::Unconscious, "damage"),
        );

        let outcome = apply_healing(&mut pc, 50, "Cure Wounds");
        assert_eq!(outcome.amount_applied, 30);
        assert_eq!(outcome.overhealing, 20);
        assert!(outcome.was_unconscious);
        assert_eq!(pc.hp.current, 30);
        assert!(!conditions::has(&pc.conditions, &ConditionKind::Unconscious));
        assert_eq!(pc.death_saves, Some(DeathSaves::default()));
    }

    #[test]
    fn test_concentration_check_dc() {
        let mut pc = sample_pc("Elora", 20, 12);
        assert!(check_concentration(&pc, 30).is_none());

        pc.concentrating_on = Some("Bless".to_string());
        let check = check_concentration(&pc, 8).unwrap();
        assert_eq!(check.dc, 10);
        let check = check_concentration(&pc, 30).unwrap();
        assert_eq!(check.dc, 15);
        assert_eq!(check.spell_name, "Bless");
    }

    #[test]
    fn test_damage_while_dying() {
        let mut pc = sample_pc("Roland", 30, 16);
        assert!(apply_damage_while_dying(&mut pc, &slashing(5)).is_none());

        pc.hp.current = 0;
        pc.death_saves = Some(DeathSaves::default());
        let outcome = apply_damage_while_dying(&mut pc, &slashing(5)).unwrap();
        assert_eq!(outcome.total_failures, 1);
        assert!(!outcome.is_dead);

        let outcome =
            apply_damage_while_dying(&mut pc, &slashing(10).critical()).unwrap();
        assert_eq!(outcome.failures_added, 2);
        assert_eq!(outcome.total_failures, 3);
        assert!(outcome.is_dead);

        // Clamped at three.
        let outcome = apply_damage_while_dying(&mut pc, &slashing(5)).unwrap();
        assert_eq!(outcome.total_failures, 3);
    }
}
