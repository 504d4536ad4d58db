//! Combat participants.
//!
//! A [`Combatant`] is the in-encounter projection of a character sheet or a
//! monster stat block: immutable identity plus the mutable combat state the
//! resolver works on. Factories here do the sheet/template conversion.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use crate::conditions::ActiveCondition;
use crate::damage::DamageType;
use crate::items;
use crate::stats::{
    self, Ability, CharacterSheet, EquipmentField, ResolvedSpell, SheetHp, SlotState,
};

// ============================================================================
// Identity
// ============================================================================

/// Unique identifier for combatants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Draw an id from the encounter's dice stream so replays agree on ids.
    pub fn from_rng<R: RngCore>(rng: &mut R) -> Self {
        let high = rng.next_u64() as u128;
        let low = rng.next_u64() as u128;
        Self(Uuid::from_u128((high << 64) | low))
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CombatantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of participant this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatantKind {
    Pc,
    Npc,
    Monster,
}

// ============================================================================
// Vitals
// ============================================================================

/// Hit point tracking. `temp` is an absorptive buffer that decays first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: u32,
    pub max: u32,
    #[serde(default)]
    pub temp: u32,
}

impl HitPoints {
    pub fn new(max: u32) -> Self {
        HitPoints {
            current: max,
            max,
            temp: 0,
        }
    }
}

/// Death saving throw tally for a player character at 0 HP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathSaves {
    pub successes: u8,
    pub failures: u8,
}

/// Per-turn action economy, reset when the combatant's turn starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnResources {
    pub action_used: bool,
    pub bonus_action_used: bool,
    pub reaction_used: bool,
    pub movement_remaining: u32,
    pub free_object_interaction: bool,
}

impl TurnResources {
    pub fn fresh(speed: u32) -> Self {
        TurnResources {
            action_used: false,
            bonus_action_used: false,
            reaction_used: false,
            movement_remaining: speed,
            free_object_interaction: true,
        }
    }
}

// ============================================================================
// Combatant
// ============================================================================

/// One participant in an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub kind: CombatantKind,
    /// Links back to the character sheet or monster stat block.
    pub source_id: String,

    pub initiative: i32,
    pub dex_mod: i32,
    pub wis_mod: i32,
    pub con_mod: i32,

    pub hp: HitPoints,
    pub ac: u32,
    pub speed: u32,
    pub position: Option<(i32, i32)>,

    pub conditions: Vec<ActiveCondition>,
    pub concentrating_on: Option<String>,
    /// Present only for player characters.
    pub death_saves: Option<DeathSaves>,
    pub turn_resources: TurnResources,

    pub resistances: BTreeSet<DamageType>,
    pub immunities: BTreeSet<DamageType>,
    pub vulnerabilities: BTreeSet<DamageType>,

    pub xp: Option<u32>,

    // Resolved skill and spell numbers the action resolver consults.
    pub stealth_mod: i32,
    pub perception_mod: i32,
    pub athletics_mod: i32,
    pub acrobatics_mod: i32,
    pub spell_attack_bonus: i32,
    pub spell_save_dc: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spells: Vec<ResolvedSpell>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub spell_slots: BTreeMap<u8, SlotState>,
}

impl Combatant {
    pub fn is_pc(&self) -> bool {
        self.kind == CombatantKind::Pc
    }

    /// On the party side of the encounter?
    pub fn is_party(&self) -> bool {
        matches!(self.kind, CombatantKind::Pc | CombatantKind::Npc)
    }

    /// Down but not necessarily dead.
    pub fn is_down(&self) -> bool {
        self.hp.current == 0
    }

    /// Dead: monsters at 0 HP, player characters at three failed saves.
    pub fn is_dead(&self) -> bool {
        match self.kind {
            CombatantKind::Pc => self
                .death_saves
                .map_or(false, |saves| saves.failures >= 3),
            _ => self.hp.current == 0,
        }
    }

    /// A stabilized PC: at 0 HP with three save successes banked.
    pub fn is_stable(&self) -> bool {
        self.is_pc()
            && self.hp.current == 0
            && self
                .death_saves
                .map_or(false, |saves| saves.successes >= 3 && saves.failures < 3)
    }

    /// Still dying: a PC at 0 HP who is neither stable nor dead.
    pub fn is_dying(&self) -> bool {
        self.is_pc() && self.hp.current == 0 && !self.is_stable() && !self.is_dead()
    }

    pub fn has_spell_slot(&self, level: u8) -> bool {
        self.spell_slots
            .get(&level)
            .map_or(false, |slot| slot.current > 0)
    }

    pub fn spend_spell_slot(&mut self, level: u8) -> bool {
        if let Some(slot) = self.spell_slots.get_mut(&level) {
            if slot.current > 0 {
                slot.current -= 1;
                return true;
            }
        }
        false
    }
}

// ============================================================================
// Monster input
// ============================================================================

/// Movement speeds from a stat block; anything beyond walking is carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterSpeed {
    pub walk: u32,
    #[serde(flatten, default)]
    pub other: BTreeMap<String, u32>,
}

/// One action from a monster stat block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterAction {
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    pub attack_bonus: Option<i32>,
    pub damage: Option<String>,
    pub damage_type: Option<String>,
    pub reach: Option<u32>,
    pub range: Option<(u32, u32)>,
}

/// A monster stat block as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub creature_type: String,
    pub size: String,
    pub alignment: String,
    pub challenge_rating: f64,
    pub hp: SheetHp,
    pub ac: u32,
    pub speed: MonsterSpeed,
    pub abilities: crate::stats::AbilityBlock,
    pub actions: Vec<MonsterAction>,
    #[serde(default)]
    pub saving_throws: BTreeMap<String, i32>,
    #[serde(default)]
    pub skills: BTreeMap<String, i32>,
    #[serde(default)]
    pub resistances: Vec<String>,
    #[serde(default)]
    pub immunities: Vec<String>,
    #[serde(default)]
    pub vulnerabilities: Vec<String>,
    #[serde(default)]
    pub senses: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub xp: Option<u32>,
    /// Legendary action budget per round, when the creature has one.
    pub legendary_actions: Option<u32>,
}

// ============================================================================
// Factories
// ============================================================================

fn armor_class_from_sheet(sheet: &CharacterSheet) -> u32 {
    if let Some(ac) = sheet.ac {
        return ac;
    }
    let dex_mod = sheet.abilities.modifier(Ability::Dexterity);
    if let Some(EquipmentField::Loadout { armor, shield, .. }) = &sheet.equipment {
        let base = armor
            .as_ref()
            .and_then(|item| items::get_armor(item.name()))
            .map(|profile| {
                let dex = profile
                    .max_dex_bonus
                    .map_or(dex_mod, |cap| dex_mod.min(cap));
                profile.base_ac as i32 + dex
            })
            .unwrap_or(10 + dex_mod);
        let shield_bonus = if shield.is_some() { 2 } else { 0 };
        return (base + shield_bonus).max(1) as u32;
    }
    (10 + dex_mod).max(1) as u32
}

/// Build a combatant from a character sheet at the given initiative.
pub fn combatant_from_character(sheet: &CharacterSheet, initiative: i32) -> Combatant {
    let resolved = stats::resolve(sheet);
    let hp = sheet
        .hp
        .as_ref()
        .map(|hp| HitPoints {
            current: hp.current.min(hp.max),
            max: hp.max,
            temp: hp.temp,
        })
        .unwrap_or_else(|| HitPoints::new(10));
    let speed = sheet.speed.unwrap_or(30);

    Combatant {
        id: CombatantId::new(),
        name: sheet.name.clone(),
        kind: CombatantKind::Pc,
        source_id: sheet.name.clone(),
        initiative,
        dex_mod: sheet.abilities.modifier(Ability::Dexterity),
        wis_mod: sheet.abilities.modifier(Ability::Wisdom),
        con_mod: sheet.abilities.modifier(Ability::Constitution),
        hp,
        ac: armor_class_from_sheet(sheet),
        speed,
        position: None,
        conditions: sheet.conditions.clone(),
        concentrating_on: None,
        death_saves: Some(DeathSaves::default()),
        turn_resources: TurnResources::fresh(speed),
        resistances: BTreeSet::new(),
        immunities: BTreeSet::new(),
        vulnerabilities: BTreeSet::new(),
        xp: None,
        stealth_mod: resolved.stealth_mod,
        perception_mod: resolved.perception_mod,
        athletics_mod: resolved.athletics_mod,
        acrobatics_mod: resolved.acrobatics_mod,
        spell_attack_bonus: resolved.spell_attack_bonus,
        spell_save_dc: resolved.spell_save_dc,
        spells: resolved.spells,
        spell_slots: resolved.spell_slots,
    }
}

fn damage_type_set(names: &[String]) -> BTreeSet<DamageType> {
    names
        .iter()
        .filter_map(|name| DamageType::from_name(name))
        .collect()
}

fn monster_skill(template: &MonsterTemplate, skill: &str, governing: Ability) -> i32 {
    template
        .skills
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(skill))
        .map(|(_, value)| *value)
        .unwrap_or_else(|| template.abilities.modifier(governing))
}

/// Build a combatant from a monster template.
///
/// `copy_index` disambiguates grouped monsters: index 0 becomes
/// `"Goblin 1"`, and so on.
pub fn combatant_from_monster(
    template: &MonsterTemplate,
    initiative: i32,
    copy_index: Option<u32>,
) -> Combatant {
    let name = match copy_index {
        Some(index) => format!("{} {}", template.name, index + 1),
        None => template.name.clone(),
    };
    let speed = template.speed.walk;

    Combatant {
        id: CombatantId::new(),
        name,
        kind: CombatantKind::Monster,
        source_id: template.id.clone(),
        initiative,
        dex_mod: template.abilities.modifier(Ability::Dexterity),
        wis_mod: template.abilities.modifier(Ability::Wisdom),
        con_mod: template.abilities.modifier(Ability::Constitution),
        hp: HitPoints {
            current: template.hp.current.min(template.hp.max),
            max: template.hp.max,
            temp: template.hp.temp,
        },
        ac: template.ac,
        speed,
        position: None,
        conditions: Vec::new(),
        concentrating_on: None,
        death_saves: None,
        turn_resources: TurnResources::fresh(speed),
        resistances: damage_type_set(&template.resistances),
        immunities: damage_type_set(&template.immunities),
        vulnerabilities: damage_type_set(&template.vulnerabilities),
        xp: template.xp,
        stealth_mod: monster_skill(template, "stealth", Ability::Dexterity),
        perception_mod: monster_skill(template, "perception", Ability::Wisdom),
        athletics_mod: monster_skill(template, "athletics", Ability::Strength),
        acrobatics_mod: monster_skill(template, "acrobatics", Ability::Dexterity),
        spell_attack_bonus: 2,
        spell_save_dc: 10,
        spells: Vec::new(),
        spell_slots: BTreeMap::new(),
    }
}
