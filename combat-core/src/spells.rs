//! Spell effect registry.
//!
//! A closed set of non-attack, non-heal spells behind a common trait. The
//! registry is populated once at startup and looked up by lowercase name;
//! anything outside it falls back to the caster's sheet-resolved spell list
//! in the action resolver. AC-granting entries route every armor-class
//! mutation through the condition engine's reversible-metadata mechanism so
//! expiry restores the original value.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::combatant::{CombatantId, DeathSaves};
use crate::conditions::{self, ActiveCondition, ConditionDuration, ConditionKind};
use crate::dice::{execute, AdvantageMode, DiceRoll, DieType};
use crate::encounter::Encounter;
use crate::error::CombatError;

/// Which action-economy slot a cast consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastingResource {
    Action,
    BonusAction,
    Reaction,
}

/// What a registry cast did, for the action log.
#[derive(Debug, Clone, Default)]
pub struct SpellOutcome {
    pub success: bool,
    pub description: String,
    pub dice_rolls: Vec<DiceRoll>,
    pub conditions_applied: Vec<String>,
    pub targets: Vec<CombatantId>,
}

/// A spell the registry knows how to apply.
pub trait SpellEffect: Send + Sync {
    fn name(&self) -> &'static str;
    /// Minimum slot level; zero for cantrips and features.
    fn level(&self) -> u8;
    fn casting_resource(&self) -> CastingResource;
    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError>;
}

/// The closed set of shipped spell effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownSpell {
    Shield,
    ShieldOfFaith,
    Bless,
    Guidance,
    Sleep,
    SpareTheDying,
}

impl KnownSpell {
    pub fn from_name(name: &str) -> Option<KnownSpell> {
        match name.trim().to_lowercase().as_str() {
            "shield" => Some(KnownSpell::Shield),
            "shield of faith" => Some(KnownSpell::ShieldOfFaith),
            "bless" => Some(KnownSpell::Bless),
            "guidance" => Some(KnownSpell::Guidance),
            "sleep" => Some(KnownSpell::Sleep),
            "spare the dying" => Some(KnownSpell::SpareTheDying),
            _ => None,
        }
    }

    pub fn effect(&self) -> &'static dyn SpellEffect {
        match self {
            KnownSpell::Shield => &Shield,
            KnownSpell::ShieldOfFaith => &ShieldOfFaith,
            KnownSpell::Bless => &Bless,
            KnownSpell::Guidance => &Guidance,
            KnownSpell::Sleep => &Sleep,
            KnownSpell::SpareTheDying => &SpareTheDying,
        }
    }
}

static REGISTRY: LazyLock<HashMap<&'static str, &'static dyn SpellEffect>> =
    LazyLock::new(|| {
        let mut registry: HashMap<&'static str, &'static dyn SpellEffect> = HashMap::new();
        registry.insert("shield", &Shield);
        registry.insert("shield of faith", &ShieldOfFaith);
        registry.insert("bless", &Bless);
        registry.insert("guidance", &Guidance);
        registry.insert("sleep", &Sleep);
        registry.insert("spare the dying", &SpareTheDying);
        registry
    });

/// Look up a registry spell by name, case-insensitively.
pub fn get_effect(name: &str) -> Option<&'static dyn SpellEffect> {
    REGISTRY.get(name.trim().to_lowercase().as_str()).copied()
}

fn caster_mut<'a>(
    enc: &'a mut Encounter,
    id: CombatantId,
) -> Result<&'a mut crate::combatant::Combatant, CombatError> {
    enc.combatant_mut(id)
        .ok_or_else(|| CombatError::NotFound(id.to_string()))
}

/// Starting a new concentration spell drops the previous one first.
fn begin_concentration(enc: &mut Encounter, caster: CombatantId, spell: &str) {
    enc.break_concentration(caster);
    if let Some(c) = enc.combatant_mut(caster) {
        c.concentrating_on = Some(spell.to_string());
    }
}

// ============================================================================
// Shipped effects
// ============================================================================

/// Shield: +5 AC until the start of the caster's next turn.
pub struct Shield;

impl SpellEffect for Shield {
    fn name(&self) -> &'static str {
        "Shield"
    }

    fn level(&self) -> u8 {
        1
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::Reaction
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        _targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        let c = caster_mut(enc, caster)?;
        let original = c.ac;
        let condition = ActiveCondition::new(ConditionKind::Shielded, "Shield")
            .with_duration(ConditionDuration::until_next_turn_start())
            .with_ac_bonus(5, original);
        if conditions::add(&mut c.conditions, condition) {
            c.ac += 5;
        }
        Ok(SpellOutcome {
            success: true,
            description: format!(
                "{} throws up a shimmering barrier (AC {} until the start of their next turn)",
                c.name, c.ac
            ),
            conditions_applied: vec!["shielded".to_string()],
            targets: vec![caster],
            ..Default::default()
        })
    }
}

/// Shield of Faith: +2 AC on one target for ten minutes, concentration.
pub struct ShieldOfFaith;

impl SpellEffect for ShieldOfFaith {
    fn name(&self) -> &'static str {
        "Shield of Faith"
    }

    fn level(&self) -> u8 {
        1
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::BonusAction
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        let target_id = targets.first().copied().unwrap_or(caster);
        begin_concentration(enc, caster, "Shield of Faith");

        let target = enc
            .combatant_mut(target_id)
            .ok_or_else(|| CombatError::NotFound(target_id.to_string()))?;
        let original = target.ac;
        let condition = ActiveCondition::new(ConditionKind::ShieldOfFaith, "Shield of Faith")
            .with_duration(ConditionDuration::Minutes(10))
            .with_ac_bonus(2, original);
        if conditions::add(&mut target.conditions, condition) {
            target.ac += 2;
        }
        Ok(SpellOutcome {
            success: true,
            description: format!(
                "A faint aura surrounds {} (AC {} for 10 minutes)",
                target.name, target.ac
            ),
            conditions_applied: vec!["shield_of_faith".to_string()],
            targets: vec![target_id],
            ..Default::default()
        })
    }
}

/// Bless: up to three targets blessed for one minute, concentration.
pub struct Bless;

impl SpellEffect for Bless {
    fn name(&self) -> &'static str {
        "Bless"
    }

    fn level(&self) -> u8 {
        1
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::Action
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        begin_concentration(enc, caster, "Bless");

        let mut blessed = Vec::new();
        for target_id in targets.iter().take(3) {
            if let Some(target) = enc.combatant_mut(*target_id) {
                conditions::add(
                    &mut target.conditions,
                    ActiveCondition::new(ConditionKind::Blessed, "Bless")
                        .with_duration(ConditionDuration::Minutes(1)),
                );
                blessed.push(target.name.clone());
            }
        }
        if blessed.is_empty() {
            return Err(CombatError::InvalidTarget(
                "bless needs at least one target".to_string(),
            ));
        }
        Ok(SpellOutcome {
            success: true,
            description: format!("{} are blessed", blessed.join(", ")),
            conditions_applied: vec!["blessed".to_string(); blessed.len()],
            targets: targets.iter().take(3).copied().collect(),
            ..Default::default()
        })
    }
}

/// Guidance: one target guided until the end of its next turn.
pub struct Guidance;

impl SpellEffect for Guidance {
    fn name(&self) -> &'static str {
        "Guidance"
    }

    fn level(&self) -> u8 {
        0
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::Action
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        let target_id = targets.first().copied().unwrap_or(caster);
        let target = enc
            .combatant_mut(target_id)
            .ok_or_else(|| CombatError::NotFound(target_id.to_string()))?;
        conditions::add(
            &mut target.conditions,
            ActiveCondition::new(ConditionKind::Guided, "Guidance")
                .with_duration(ConditionDuration::until_turn_end()),
        );
        Ok(SpellOutcome {
            success: true,
            description: format!("{} is guided", target.name),
            conditions_applied: vec!["guided".to_string()],
            targets: vec![target_id],
            ..Default::default()
        })
    }
}

/// Sleep: a 5d8 hit-point budget knocks out the weakest enemies first.
pub struct Sleep;

impl SpellEffect for Sleep {
    fn name(&self) -> &'static str {
        "Sleep"
    }

    fn level(&self) -> u8 {
        1
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::Action
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        _targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        let roll = execute(&mut enc.roller, 5, DieType::D8, 0, AdvantageMode::Normal);
        let mut budget = roll.total.max(0) as u32;

        // Weakest enemies first; skip anyone already unconscious.
        let mut candidates: Vec<(CombatantId, u32)> = enc
            .live_opponents_of(caster)
            .iter()
            .filter(|c| !conditions::has(&c.conditions, &ConditionKind::Unconscious))
            .map(|c| (c.id, c.hp.current))
            .collect();
        candidates.sort_by_key(|(_, hp)| *hp);

        let mut affected = Vec::new();
        let mut affected_names = Vec::new();
        for (id, hp) in candidates {
            if hp > budget {
                break;
            }
            budget -= hp;
            if let Some(target) = enc.combatant_mut(id) {
                conditions::add(
                    &mut target.conditions,
                    ActiveCondition::new(ConditionKind::Unconscious, "Sleep")
                        .with_duration(ConditionDuration::Minutes(1)),
                );
                affected.push(id);
                affected_names.push(target.name.clone());
            }
        }

        let description = if affected_names.is_empty() {
            format!("The sleep spell ({} HP) affects no one", roll.total)
        } else {
            format!(
                "The sleep spell ({} HP) puts {} to sleep",
                roll.total,
                affected_names.join(", ")
            )
        };
        Ok(SpellOutcome {
            success: !affected.is_empty(),
            description,
            dice_rolls: vec![roll],
            conditions_applied: vec!["unconscious".to_string(); affected.len()],
            targets: affected,
        })
    }
}

/// Spare the Dying: stabilize a creature at 0 HP.
pub struct SpareTheDying;

impl SpellEffect for SpareTheDying {
    fn name(&self) -> &'static str {
        "Spare the Dying"
    }

    fn level(&self) -> u8 {
        0
    }

    fn casting_resource(&self) -> CastingResource {
        CastingResource::Action
    }

    fn apply(
        &self,
        enc: &mut Encounter,
        caster: CombatantId,
        targets: &[CombatantId],
    ) -> Result<SpellOutcome, CombatError> {
        let target_id = targets.first().copied().unwrap_or(caster);
        let target = enc
            .combatant_mut(target_id)
            .ok_or_else(|| CombatError::NotFound(target_id.to_string()))?;

        if target.hp.current > 0 || target.death_saves.is_none() {
            return Ok(SpellOutcome {
                success: false,
                description: format!("{} is not dying; the spell has no effect", target.name),
                targets: vec![target_id],
                ..Default::default()
            });
        }

        target.death_saves = Some(DeathSaves {
            successes: 3,
            failures: target.death_saves.map_or(0, |s| s.failures),
        });
        Ok(SpellOutcome {
            success: true,
            description: format!("{} is stabilized", target.name),
            targets: vec![target_id],
            ..Default::default()
        })
    }
}
