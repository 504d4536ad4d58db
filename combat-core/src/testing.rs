//! Canonical sample sheets and stat blocks.
//!
//! Shared by unit, integration and property tests, and handy for callers
//! wiring up a quick demo encounter.

use std::collections::BTreeMap;

use crate::combatant::{
    Combatant, CombatantId, CombatantKind, DeathSaves, HitPoints, MonsterAction, MonsterSpeed,
    MonsterTemplate, TurnResources,
};
use crate::stats::{
    AbilityBlock, AbilityValue, CharacterSheet, EquipmentField, SheetHp, SheetItem, SheetSpell,
    SlotState,
};

fn abilities(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> AbilityBlock {
    AbilityBlock {
        strength: AbilityValue::Score(str),
        dexterity: AbilityValue::Score(dex),
        constitution: AbilityValue::Score(con),
        intelligence: AbilityValue::Score(int),
        wisdom: AbilityValue::Score(wis),
        charisma: AbilityValue::Score(cha),
    }
}

/// A third-level champion fighter with a longsword.
pub fn fighter_sheet(name: &str) -> CharacterSheet {
    CharacterSheet {
        name: name.to_string(),
        race: "Human".to_string(),
        class: "Fighter".to_string(),
        level: 3,
        abilities: abilities(16, 14, 14, 10, 12, 8),
        proficiency_bonus: Some(2),
        hp: Some(SheetHp {
            current: 28,
            max: 28,
            temp: 0,
        }),
        ac: Some(18),
        speed: Some(30),
        skills: Some(BTreeMap::from([
            ("athletics".to_string(), 5),
            ("perception".to_string(), 3),
        ])),
        expertise: None,
        spell_slots: None,
        spells_known: None,
        equipment: Some(EquipmentField::Items(vec![SheetItem::Name(
            "Longsword".to_string(),
        )])),
        spellcasting_ability: None,
        conditions: Vec::new(),
    }
}

/// A first-level wizard with fire bolt, shield and sleep prepared.
pub fn wizard_sheet(name: &str) -> CharacterSheet {
    CharacterSheet {
        name: name.to_string(),
        race: "Elf".to_string(),
        class: "Wizard".to_string(),
        level: 1,
        abilities: abilities(8, 14, 12, 16, 10, 10),
        proficiency_bonus: Some(2),
        hp: Some(SheetHp {
            current: 7,
            max: 7,
            temp: 0,
        }),
        ac: Some(12),
        speed: Some(30),
        skills: None,
        expertise: None,
        spell_slots: Some(BTreeMap::from([(
            "1".to_string(),
            SlotState { current: 2, max: 2 },
        )])),
        spells_known: Some(vec![
            SheetSpell {
                name: "Fire Bolt".to_string(),
                level: 0,
                school: Some("Evocation".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("120 feet".to_string()),
                damage: Some("1d10".to_string()),
                damage_type: Some("fire".to_string()),
                healing: None,
                attack: Some("ranged".to_string()),
                saving_throw: None,
            },
            SheetSpell {
                name: "Shield".to_string(),
                level: 1,
                school: Some("Abjuration".to_string()),
                casting_time: Some("1 reaction".to_string()),
                range: Some("Self".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
            SheetSpell {
                name: "Sleep".to_string(),
                level: 1,
                school: Some("Enchantment".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("90 feet".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
        ]),
        equipment: Some(EquipmentField::Items(vec![SheetItem::Name(
            "Dagger".to_string(),
        )])),
        spellcasting_ability: None,
        conditions: Vec::new(),
    }
}

/// A first-level cleric with the support spell kit.
pub fn cleric_sheet(name: &str) -> CharacterSheet {
    CharacterSheet {
        name: name.to_string(),
        race: "Dwarf".to_string(),
        class: "Cleric".to_string(),
        level: 1,
        abilities: abilities(14, 10, 14, 10, 16, 12),
        proficiency_bonus: Some(2),
        hp: Some(SheetHp {
            current: 10,
            max: 10,
            temp: 0,
        }),
        ac: Some(16),
        speed: Some(25),
        skills: None,
        expertise: None,
        spell_slots: Some(BTreeMap::from([(
            "1".to_string(),
            SlotState { current: 3, max: 3 },
        )])),
        spells_known: Some(vec![
            SheetSpell {
                name: "Guidance".to_string(),
                level: 0,
                school: Some("Divination".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("Touch".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
            SheetSpell {
                name: "Spare the Dying".to_string(),
                level: 0,
                school: Some("Necromancy".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("Touch".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
            SheetSpell {
                name: "Bless".to_string(),
                level: 1,
                school: Some("Enchantment".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("30 feet".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
            SheetSpell {
                name: "Cure Wounds".to_string(),
                level: 1,
                school: Some("Evocation".to_string()),
                casting_time: Some("1 action".to_string()),
                range: Some("Touch".to_string()),
                damage: None,
                damage_type: None,
                healing: Some("1d8+3".to_string()),
                attack: None,
                saving_throw: None,
            },
            SheetSpell {
                name: "Shield of Faith".to_string(),
                level: 1,
                school: Some("Abjuration".to_string()),
                casting_time: Some("1 bonus action".to_string()),
                range: Some("60 feet".to_string()),
                damage: None,
                damage_type: None,
                healing: None,
                attack: None,
                saving_throw: None,
            },
        ]),
        equipment: Some(EquipmentField::Items(vec![SheetItem::Name(
            "Mace".to_string(),
        )])),
        spellcasting_ability: None,
        conditions: Vec::new(),
    }
}

/// A second-level rogue with expertise in stealth.
pub fn rogue_sheet(name: &str) -> CharacterSheet {
    CharacterSheet {
        name: name.to_string(),
        race: "Halfling".to_string(),
        class: "Rogue".to_string(),
        level: 2,
        abilities: abilities(10, 16, 12, 12, 10, 14),
        proficiency_bonus: Some(2),
        hp: Some(SheetHp {
            current: 15,
            max: 15,
            temp: 0,
        }),
        ac: Some(14),
        speed: Some(25),
        skills: None,
        expertise: Some(vec!["Stealth".to_string()]),
        spell_slots: None,
        spells_known: None,
        equipment: Some(EquipmentField::Items(vec![
            SheetItem::Name("Rapier".to_string()),
            SheetItem::Name("Shortbow".to_string()),
        ])),
        spellcasting_ability: None,
        conditions: Vec::new(),
    }
}

/// The canonical four-person party.
pub fn party_sheets() -> Vec<CharacterSheet> {
    vec![
        fighter_sheet("Roland"),
        wizard_sheet("Elora"),
        cleric_sheet("Bramli"),
        rogue_sheet("Pip"),
    ]
}

/// A goblin stat block.
pub fn goblin_template() -> MonsterTemplate {
    MonsterTemplate {
        id: "goblin".to_string(),
        name: "Goblin".to_string(),
        creature_type: "humanoid".to_string(),
        size: "Small".to_string(),
        alignment: "neutral evil".to_string(),
        challenge_rating: 0.25,
        hp: SheetHp {
            current: 7,
            max: 7,
            temp: 0,
        },
        ac: 15,
        speed: MonsterSpeed {
            walk: 30,
            other: BTreeMap::new(),
        },
        abilities: abilities(8, 14, 10, 10, 8, 8),
        actions: vec![
            MonsterAction {
                name: "Scimitar".to_string(),
                action_type: "melee".to_string(),
                attack_bonus: Some(4),
                damage: Some("1d6+2".to_string()),
                damage_type: Some("slashing".to_string()),
                reach: Some(5),
                range: None,
            },
            MonsterAction {
                name: "Shortbow".to_string(),
                action_type: "ranged".to_string(),
                attack_bonus: Some(4),
                damage: Some("1d6+2".to_string()),
                damage_type: Some("piercing".to_string()),
                reach: None,
                range: Some((80, 320)),
            },
        ],
        saving_throws: BTreeMap::new(),
        skills: BTreeMap::from([("stealth".to_string(), 6)]),
        resistances: Vec::new(),
        immunities: Vec::new(),
        vulnerabilities: Vec::new(),
        senses: vec!["darkvision 60 ft.".to_string()],
        languages: vec!["Common".to_string(), "Goblin".to_string()],
        xp: Some(50),
        legendary_actions: None,
    }
}

/// An ogre stat block.
pub fn ogre_template() -> MonsterTemplate {
    MonsterTemplate {
        id: "ogre".to_string(),
        name: "Ogre".to_string(),
        creature_type: "giant".to_string(),
        size: "Large".to_string(),
        alignment: "chaotic evil".to_string(),
        challenge_rating: 2.0,
        hp: SheetHp {
            current: 59,
            max: 59,
            temp: 0,
        },
        ac: 11,
        speed: MonsterSpeed {
            walk: 40,
            other: BTreeMap::new(),
        },
        abilities: abilities(19, 8, 16, 5, 7, 7),
        actions: vec![MonsterAction {
            name: "Greatclub".to_string(),
            action_type: "melee".to_string(),
            attack_bonus: Some(6),
            damage: Some("2d8+4".to_string()),
            damage_type: Some("bludgeoning".to_string()),
            reach: Some(5),
            range: None,
        }],
        saving_throws: BTreeMap::new(),
        skills: BTreeMap::new(),
        resistances: Vec::new(),
        immunities: Vec::new(),
        vulnerabilities: Vec::new(),
        senses: vec!["darkvision 60 ft.".to_string()],
        languages: vec!["Giant".to_string()],
        xp: Some(450),
        legendary_actions: None,
    }
}

/// A young red dragon: fire immunity and a legendary action budget.
pub fn dragon_template() -> MonsterTemplate {
    MonsterTemplate {
        id: "young-red-dragon".to_string(),
        name: "Young Red Dragon".to_string(),
        creature_type: "dragon".to_string(),
        size: "Large".to_string(),
        alignment: "chaotic evil".to_string(),
        challenge_rating: 10.0,
        hp: SheetHp {
            current: 178,
            max: 178,
            temp: 0,
        },
        ac: 18,
        speed: MonsterSpeed {
            walk: 40,
            other: BTreeMap::from([("fly".to_string(), 80)]),
        },
        abilities: abilities(23, 10, 21, 14, 11, 19),
        actions: vec![MonsterAction {
            name: "Bite".to_string(),
            action_type: "melee".to_string(),
            attack_bonus: Some(10),
            damage: Some("2d10+6".to_string()),
            damage_type: Some("piercing".to_string()),
            reach: Some(10),
            range: None,
        }],
        saving_throws: BTreeMap::from([("dex".to_string(), 4), ("wis".to_string(), 4)]),
        skills: BTreeMap::from([("perception".to_string(), 8), ("stealth".to_string(), 4)]),
        resistances: Vec::new(),
        immunities: vec!["fire".to_string()],
        vulnerabilities: Vec::new(),
        senses: vec!["blindsight 30 ft.".to_string(), "darkvision 120 ft.".to_string()],
        languages: vec!["Common".to_string(), "Draconic".to_string()],
        xp: Some(5900),
        legendary_actions: Some(3),
    }
}

/// A bare-bones PC combatant for pipeline unit tests.
pub fn sample_pc(name: &str, max_hp: u32, ac: u32) -> Combatant {
    Combatant {
        id: CombatantId::new(),
        name: name.to_string(),
        kind: CombatantKind::Pc,
        source_id: name.to_string(),
        initiative: 10,
        dex_mod: 2,
        wis_mod: 1,
        con_mod: 2,
        hp: HitPoints::new(max_hp),
        ac,
        speed: 30,
        position: None,
        conditions: Vec::new(),
        concentrating_on: None,
        death_saves: Some(DeathSaves::default()),
        turn_resources: TurnResources::fresh(30),
        resistances: Default::default(),
        immunities: Default::default(),
        vulnerabilities: Default::default(),
        xp: None,
        stealth_mod: 2,
        perception_mod: 1,
        athletics_mod: 2,
        acrobatics_mod: 2,
        spell_attack_bonus: 2,
        spell_save_dc: 10,
        spells: Vec::new(),
        spell_slots: Default::default(),
    }
}

/// A bare-bones monster combatant for pipeline unit tests.
pub fn sample_monster(name: &str, max_hp: u32, ac: u32) -> Combatant {
    Combatant {
        kind: CombatantKind::Monster,
        death_saves: None,
        xp: Some(25),
        ..sample_pc(name, max_hp, ac)
    }
}
