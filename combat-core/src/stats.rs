//! Stat resolver.
//!
//! Character sheets arrive in several historical shapes: ability scores may
//! be bare integers or `{score, modifier}` records, equipment may be a flat
//! item array or a structured loadout. The resolver canonicalizes any of
//! them into a [`CombatStats`] record the combat engine can act on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::conditions::ActiveCondition;
use crate::damage::DamageType;
use crate::dice::DamageFormula;
use crate::items;

// ============================================================================
// Abilities
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn from_name(name: &str) -> Option<Ability> {
        match name.trim().to_lowercase().as_str() {
            "str" | "strength" => Some(Ability::Strength),
            "dex" | "dexterity" => Some(Ability::Dexterity),
            "con" | "constitution" => Some(Ability::Constitution),
            "int" | "intelligence" => Some(Ability::Intelligence),
            "wis" | "wisdom" => Some(Ability::Wisdom),
            "cha" | "charisma" => Some(Ability::Charisma),
            _ => None,
        }
    }

    /// The SRD score-to-modifier table; floor division handles odd scores
    /// below ten.
    pub fn modifier_for_score(score: i32) -> i32 {
        (score - 10).div_euclid(2)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// An ability score field: a bare integer or a `{score, modifier}` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AbilityValue {
    Score(i32),
    Detailed { score: i32, modifier: Option<i32> },
}

impl AbilityValue {
    pub fn score(&self) -> i32 {
        match self {
            AbilityValue::Score(score) => *score,
            AbilityValue::Detailed { score, .. } => *score,
        }
    }

    /// The stated modifier, or the one derived from the score.
    pub fn modifier(&self) -> i32 {
        match self {
            AbilityValue::Score(score) => Ability::modifier_for_score(*score),
            AbilityValue::Detailed { score, modifier } => {
                modifier.unwrap_or_else(|| Ability::modifier_for_score(*score))
            }
        }
    }
}

impl Default for AbilityValue {
    fn default() -> Self {
        AbilityValue::Score(10)
    }
}

/// The six ability fields of a sheet; upper- and lower-case keys accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AbilityBlock {
    #[serde(rename = "STR", alias = "str", alias = "strength", default)]
    pub strength: AbilityValue,
    #[serde(rename = "DEX", alias = "dex", alias = "dexterity", default)]
    pub dexterity: AbilityValue,
    #[serde(rename = "CON", alias = "con", alias = "constitution", default)]
    pub constitution: AbilityValue,
    #[serde(rename = "INT", alias = "int", alias = "intelligence", default)]
    pub intelligence: AbilityValue,
    #[serde(rename = "WIS", alias = "wis", alias = "wisdom", default)]
    pub wisdom: AbilityValue,
    #[serde(rename = "CHA", alias = "cha", alias = "charisma", default)]
    pub charisma: AbilityValue,
}

impl AbilityBlock {
    pub fn get(&self, ability: Ability) -> &AbilityValue {
        match ability {
            Ability::Strength => &self.strength,
            Ability::Dexterity => &self.dexterity,
            Ability::Constitution => &self.constitution,
            Ability::Intelligence => &self.intelligence,
            Ability::Wisdom => &self.wisdom,
            Ability::Charisma => &self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.get(ability).modifier()
    }
}

// ============================================================================
// Sheet input
// ============================================================================

/// Hit point block on a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetHp {
    pub current: u32,
    pub max: u32,
    #[serde(default)]
    pub temp: u32,
}

/// One spell slot level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub current: u32,
    pub max: u32,
}

/// A spell as listed on a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSpell {
    pub name: String,
    #[serde(default)]
    pub level: u8,
    pub school: Option<String>,
    pub casting_time: Option<String>,
    pub range: Option<String>,
    pub damage: Option<String>,
    pub damage_type: Option<String>,
    pub healing: Option<String>,
    pub attack: Option<String>,
    pub saving_throw: Option<String>,
}

/// An equipment entry: a bare name or a full record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetItem {
    Name(String),
    Detailed(ItemRecord),
}

impl SheetItem {
    pub fn name(&self) -> &str {
        match self {
            SheetItem::Name(name) => name,
            SheetItem::Detailed(record) => &record.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub name: String,
    #[serde(alias = "damage_dice")]
    pub damage: Option<String>,
    pub damage_type: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
    pub range: Option<(u32, u32)>,
}

/// Equipment: a flat array or a structured loadout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EquipmentField {
    Items(Vec<SheetItem>),
    Loadout {
        #[serde(default)]
        weapons: Vec<SheetItem>,
        armor: Option<SheetItem>,
        shield: Option<SheetItem>,
        #[serde(default)]
        inventory: Vec<SheetItem>,
        currency: Option<serde_json::Value>,
    },
}

/// The semi-structured character sheet the resolver consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    pub name: String,
    pub race: String,
    pub class: String,
    pub level: u32,
    pub abilities: AbilityBlock,
    pub proficiency_bonus: Option<u32>,
    pub hp: Option<SheetHp>,
    #[serde(alias = "armor_class")]
    pub ac: Option<u32>,
    pub speed: Option<u32>,
    pub skills: Option<BTreeMap<String, i32>>,
    pub expertise: Option<Vec<String>>,
    pub spell_slots: Option<BTreeMap<String, SlotState>>,
    pub spells_known: Option<Vec<SheetSpell>>,
    pub equipment: Option<EquipmentField>,
    /// Explicit override; otherwise the class table decides.
    pub spellcasting_ability: Option<String>,
    #[serde(default)]
    pub conditions: Vec<ActiveCondition>,
}

// ============================================================================
// Resolved output
// ============================================================================

/// A weapon ready to swing: bonuses baked, damage formula assembled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedWeapon {
    pub name: String,
    pub attack_bonus: i32,
    pub damage: DamageFormula,
    pub damage_type: DamageType,
    pub is_ranged: bool,
    pub is_finesse: bool,
    pub range: Option<(u32, u32)>,
}

/// How a spell lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellAttackKind {
    Melee,
    Ranged,
}

/// A spell ready to cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSpell {
    pub name: String,
    pub level: u8,
    pub damage: Option<String>,
    pub damage_type: Option<DamageType>,
    pub healing: Option<String>,
    pub attack: Option<SpellAttackKind>,
    pub saving_throw: Option<Ability>,
}

/// Canonical combat statistics derived from a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub proficiency_bonus: u32,
    pub weapons: Vec<ResolvedWeapon>,
    pub primary_weapon: ResolvedWeapon,
    pub stealth_mod: i32,
    pub perception_mod: i32,
    pub athletics_mod: i32,
    pub acrobatics_mod: i32,
    pub spell_attack_bonus: i32,
    pub spell_save_dc: u32,
    pub spells: Vec<ResolvedSpell>,
    pub spell_slots: BTreeMap<u8, SlotState>,
}

// ============================================================================
// Resolution
// ============================================================================

/// Spellcasting ability by class, used when the sheet does not say.
fn class_spellcasting_ability(class: &str) -> Option<Ability> {
    let class = class.to_lowercase();
    if class.contains("wizard") {
        Some(Ability::Intelligence)
    } else if class.contains("cleric") || class.contains("druid") || class.contains("ranger") {
        Some(Ability::Wisdom)
    } else if class.contains("bard")
        || class.contains("sorcerer")
        || class.contains("warlock")
        || class.contains("paladin")
    {
        Some(Ability::Charisma)
    } else {
        None
    }
}

fn weapon_items(equipment: &EquipmentField) -> Vec<&SheetItem> {
    match equipment {
        EquipmentField::Items(items) => items
            .iter()
            .filter(|item| looks_like_weapon(item))
            .collect(),
        EquipmentField::Loadout { weapons, .. } => weapons.iter().collect(),
    }
}

fn looks_like_weapon(item: &SheetItem) -> bool {
    match item {
        SheetItem::Name(name) => items::get_weapon(name).is_some(),
        SheetItem::Detailed(record) => {
            record.damage.is_some() || items::get_weapon(&record.name).is_some()
        }
    }
}

fn resolve_weapon(item: &SheetItem, abilities: &AbilityBlock, prof: i32) -> Option<ResolvedWeapon> {
    // A known SRD name wins; a detailed record fills in the rest.
    let profile = items::get_weapon(item.name());
    let record = match item {
        SheetItem::Detailed(record) => Some(record),
        SheetItem::Name(_) => None,
    };

    let damage_dice = record
        .and_then(|r| r.damage.clone())
        .or_else(|| profile.as_ref().map(|p| p.damage_dice.to_string()))?;
    let damage_type = record
        .and_then(|r| r.damage_type.as_deref())
        .and_then(DamageType::from_name)
        .or_else(|| profile.as_ref().map(|p| p.damage_type))
        .unwrap_or(DamageType::Bludgeoning);

    let properties: Vec<String> = match record {
        Some(record) if !record.properties.is_empty() => record
            .properties
            .iter()
            .map(|p| p.to_lowercase())
            .collect(),
        _ => profile
            .as_ref()
            .map(|p| p.properties.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default(),
    };
    let range = record
        .and_then(|r| r.range)
        .or_else(|| profile.as_ref().and_then(|p| p.range));

    let is_finesse = properties.iter().any(|p| p == "finesse");
    let is_ranged = range.is_some()
        || properties
            .iter()
            .any(|p| p == "ammunition" || p == "thrown");

    let str_mod = abilities.modifier(Ability::Strength);
    let dex_mod = abilities.modifier(Ability::Dexterity);
    let ability_mod = if is_ranged {
        dex_mod
    } else if is_finesse {
        str_mod.max(dex_mod)
    } else {
        str_mod
    };

    let damage = if ability_mod != 0 {
        let sign = if ability_mod > 0 { "+" } else { "" };
        DamageFormula::Dice(format!("{damage_dice}{sign}{ability_mod}"))
    } else {
        DamageFormula::Dice(damage_dice)
    };

    Some(ResolvedWeapon {
        name: item.name().to_string(),
        attack_bonus: ability_mod + prof,
        damage,
        damage_type,
        is_ranged,
        is_finesse,
        range,
    })
}

fn unarmed_strike(abilities: &AbilityBlock, prof: i32) -> ResolvedWeapon {
    let str_mod = abilities.modifier(Ability::Strength);
    ResolvedWeapon {
        name: "Unarmed Strike".to_string(),
        attack_bonus: str_mod + prof,
        damage: DamageFormula::Flat((1 + str_mod).max(1)),
        damage_type: DamageType::Bludgeoning,
        is_ranged: false,
        is_finesse: false,
        range: None,
    }
}

fn skill_modifier(
    sheet: &CharacterSheet,
    skill: &str,
    governing: Ability,
    prof: i32,
) -> i32 {
    if let Some(skills) = &sheet.skills {
        if let Some((_, value)) = skills
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(skill))
        {
            return *value;
        }
    }
    let base = sheet.abilities.modifier(governing);
    let expert = sheet
        .expertise
        .as_ref()
        .is_some_and(|list| list.iter().any(|name| name.eq_ignore_ascii_case(skill)));
    if expert {
        base + 2 * prof
    } else {
        base
    }
}

fn parse_slot_level(key: &str) -> Option<u8> {
    let digits: String = key.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse::<u8>().ok().filter(|l| (1..=9).contains(l))
}

/// Resolve a character sheet into canonical combat statistics.
pub fn resolve(sheet: &CharacterSheet) -> CombatStats {
    let prof = sheet.proficiency_bonus.unwrap_or(2);
    let prof_i = prof as i32;

    let mut weapons: Vec<ResolvedWeapon> = sheet
        .equipment
        .as_ref()
        .map(|equipment| {
            weapon_items(equipment)
                .into_iter()
                .filter_map(|item| resolve_weapon(item, &sheet.abilities, prof_i))
                .collect()
        })
        .unwrap_or_default();

    let primary_weapon = weapons
        .iter()
        .find(|w| !w.is_ranged)
        .or_else(|| weapons.first())
        .cloned()
        .unwrap_or_else(|| unarmed_strike(&sheet.abilities, prof_i));
    if weapons.is_empty() {
        weapons.push(primary_weapon.clone());
    }

    let spell_ability = sheet
        .spellcasting_ability
        .as_deref()
        .and_then(Ability::from_name)
        .or_else(|| class_spellcasting_ability(&sheet.class));
    let spell_mod = spell_ability
        .map(|a| sheet.abilities.modifier(a))
        .unwrap_or(0);
    let spell_save_dc = (8 + spell_mod + prof_i).max(0) as u32;

    let spells = sheet
        .spells_known
        .as_ref()
        .map(|spells| {
            spells
                .iter()
                .map(|s| ResolvedSpell {
                    name: s.name.clone(),
                    level: s.level,
                    damage: s.damage.clone(),
                    damage_type: s.damage_type.as_deref().and_then(DamageType::from_name),
                    healing: s.healing.clone(),
                    attack: s.attack.as_deref().map(|a| {
                        if a.eq_ignore_ascii_case("melee") {
                            SpellAttackKind::Melee
                        } else {
                            SpellAttackKind::Ranged
                        }
                    }),
                    saving_throw: s.saving_throw.as_deref().and_then(Ability::from_name),
                })
                .collect()
        })
        .unwrap_or_default();

    let spell_slots = sheet
        .spell_slots
        .as_ref()
        .map(|slots| {
            slots
                .iter()
                .filter_map(|(key, state)| parse_slot_level(key).map(|level| (level, *state)))
                .collect()
        })
        .unwrap_or_default();

    CombatStats {
        proficiency_bonus: prof,
        weapons,
        primary_weapon,
        stealth_mod: skill_modifier(sheet, "stealth", Ability::Dexterity, prof_i),
        perception_mod: skill_modifier(sheet, "perception", Ability::Wisdom, prof_i),
        athletics_mod: skill_modifier(sheet, "athletics", Ability::Strength, prof_i),
        acrobatics_mod: skill_modifier(sheet, "acrobatics", Ability::Dexterity, prof_i),
        spell_attack_bonus: spell_mod + prof_i,
        spell_save_dc,
        spells,
        spell_slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fighter_sheet, wizard_sheet};

    #[test]
    fn test_ability_modifier_table() {
        assert_eq!(Ability::modifier_for_score(16), 3);
        assert_eq!(Ability::modifier_for_score(10), 0);
        assert_eq!(Ability::modifier_for_score(9), -1);
        assert_eq!(Ability::modifier_for_score(7), -2);
        assert_eq!(Ability::modifier_for_score(20), 5);
    }

    #[test]
    fn test_ability_value_shapes() {
        let scalar: AbilityValue = serde_json::from_str("16").unwrap();
        assert_eq!(scalar.modifier(), 3);

        let detailed: AbilityValue =
            serde_json::from_str(r#"{"score": 16, "modifier": 3}"#).unwrap();
        assert_eq!(detailed.modifier(), 3);

        let derived: AbilityValue = serde_json::from_str(r#"{"score": 14}"#).unwrap();
        assert_eq!(derived.modifier(), 2);
    }

    #[test]
    fn test_fighter_resolves_melee_primary() {
        let stats = resolve(&fighter_sheet("Roland"));
        assert_eq!(stats.proficiency_bonus, 2);
        assert_eq!(stats.primary_weapon.name, "Longsword");
        assert!(!stats.primary_weapon.is_ranged);
        // STR 16 melee weapon: +3 ability, +2 proficiency.
        assert_eq!(stats.primary_weapon.attack_bonus, 5);
        assert_eq!(
            stats.primary_weapon.damage,
            DamageFormula::Dice("1d8+3".to_string())
        );
        assert_eq!(stats.primary_weapon.damage_type, DamageType::Slashing);
    }

    #[test]
    fn test_ranged_weapon_uses_dex() {
        let mut sheet = fighter_sheet("Roland");
        sheet.equipment = Some(EquipmentField::Items(vec![SheetItem::Name(
            "Shortbow".to_string(),
        )]));
        let stats = resolve(&sheet);
        let bow = &stats.weapons[0];
        assert!(bow.is_ranged);
        // DEX 14: +2 ability, +2 proficiency.
        assert_eq!(bow.attack_bonus, 4);
        // No melee weapon at all: first entry is primary.
        assert_eq!(stats.primary_weapon.name, "Shortbow");
    }

    #[test]
    fn test_finesse_takes_better_of_str_dex() {
        let mut sheet = fighter_sheet("Roland");
        sheet.abilities.dexterity = AbilityValue::Score(18);
        sheet.equipment = Some(EquipmentField::Items(vec![SheetItem::Name(
            "Rapier".to_string(),
        )]));
        let stats = resolve(&sheet);
        // DEX +4 beats STR +3.
        assert_eq!(stats.primary_weapon.attack_bonus, 6);
    }

    #[test]
    fn test_no_equipment_falls_back_to_unarmed() {
        let mut sheet = fighter_sheet("Roland");
        sheet.equipment = None;
        let stats = resolve(&sheet);
        assert_eq!(stats.primary_weapon.name, "Unarmed Strike");
        assert_eq!(stats.primary_weapon.damage, DamageFormula::Flat(4));
        assert_eq!(stats.primary_weapon.damage_type, DamageType::Bludgeoning);
    }

    #[test]
    fn test_equipment_loadout_shape() {
        let mut sheet = fighter_sheet("Roland");
        sheet.equipment = Some(
            serde_json::from_str(
                r#"{
                    "weapons": [{"name": "Warhammer", "damage": "1d8", "damage_type": "bludgeoning"}],
                    "armor": "Chain Mail",
                    "shield": "Shield",
                    "inventory": ["Rope"],
                    "currency": {"gp": 15}
                }"#,
            )
            .unwrap(),
        );
        let stats = resolve(&sheet);
        assert_eq!(stats.primary_weapon.name, "Warhammer");
        assert_eq!(stats.primary_weapon.damage_type, DamageType::Bludgeoning);
    }

    #[test]
    fn test_skill_modifiers_fall_back_to_ability() {
        let sheet = fighter_sheet("Roland");
        let stats = resolve(&sheet);
        // Sheet lists athletics +5 explicitly; stealth falls back to DEX.
        assert_eq!(stats.athletics_mod, 5);
        assert_eq!(stats.stealth_mod, 2);
    }

    #[test]
    fn test_expertise_doubles_proficiency() {
        let mut sheet = fighter_sheet("Roland");
        sheet.skills = None;
        sheet.expertise = Some(vec!["Stealth".to_string()]);
        let stats = resolve(&sheet);
        // DEX +2 plus twice proficiency.
        assert_eq!(stats.stealth_mod, 6);
    }

    #[test]
    fn test_wizard_spellcasting() {
        let stats = resolve(&wizard_sheet("Elora"));
        // INT 16: DC 8 + 3 + 2, attack +5.
        assert_eq!(stats.spell_save_dc, 13);
        assert_eq!(stats.spell_attack_bonus, 5);
        assert!(stats.spells.iter().any(|s| s.name == "Fire Bolt"));
        assert_eq!(
            stats.spell_slots.get(&1),
            Some(&SlotState { current: 2, max: 2 })
        );
    }

    #[test]
    fn test_non_caster_reduces_to_prof_only() {
        let stats = resolve(&fighter_sheet("Roland"));
        assert_eq!(stats.spell_attack_bonus, 2);
        assert_eq!(stats.spell_save_dc, 10);
    }

    #[test]
    fn test_class_table() {
        assert_eq!(
            class_spellcasting_ability("Wizard"),
            Some(Ability::Intelligence)
        );
        assert_eq!(class_spellcasting_ability("cleric"), Some(Ability::Wisdom));
        assert_eq!(
            class_spellcasting_ability("Warlock"),
            Some(Ability::Charisma)
        );
        assert_eq!(class_spellcasting_ability("Fighter"), None);
    }

    #[test]
    fn test_explicit_spellcasting_ability_wins() {
        let mut sheet = fighter_sheet("Roland");
        sheet.spellcasting_ability = Some("WIS".to_string());
        let stats = resolve(&sheet);
        // WIS 12: 8 + 1 + 2.
        assert_eq!(stats.spell_save_dc, 11);
    }

    #[test]
    fn test_slot_level_key_shapes() {
        assert_eq!(parse_slot_level("1"), Some(1));
        assert_eq!(parse_slot_level("3rd"), Some(3));
        assert_eq!(parse_slot_level("level 2"), Some(2));
        assert_eq!(parse_slot_level("cantrip"), None);
        assert_eq!(parse_slot_level("10"), None);
    }
}
