//! Standard SRD weapon and armor tables.
//!
//! The stat resolver consults these when a sheet lists bare item names, so
//! "Longsword" resolves to its real damage profile without the sheet
//! spelling it out.

use crate::damage::DamageType;

/// Damage and handling profile for a standard weapon.
#[derive(Debug, Clone)]
pub struct WeaponProfile {
    pub name: &'static str,
    pub damage_dice: &'static str,
    pub damage_type: DamageType,
    pub properties: &'static [&'static str],
    pub range: Option<(u32, u32)>,
}

impl WeaponProfile {
    const fn new(
        name: &'static str,
        damage_dice: &'static str,
        damage_type: DamageType,
        properties: &'static [&'static str],
        range: Option<(u32, u32)>,
    ) -> Self {
        WeaponProfile {
            name,
            damage_dice,
            damage_type,
            properties,
            range,
        }
    }
}

/// Base AC profile for standard armor.
#[derive(Debug, Clone)]
pub struct ArmorProfile {
    pub name: &'static str,
    pub base_ac: u32,
    /// Maximum DEX bonus applied on top of the base; `None` is uncapped.
    pub max_dex_bonus: Option<i32>,
}

lazy_static::lazy_static! {
    /// Standard SRD weapons.
    pub static ref WEAPONS: Vec<WeaponProfile> = vec![
        // Simple melee
        WeaponProfile::new("Club", "1d4", DamageType::Bludgeoning, &["light"], None),
        WeaponProfile::new("Dagger", "1d4", DamageType::Piercing, &["finesse", "light", "thrown"], Some((20, 60))),
        WeaponProfile::new("Greatclub", "1d8", DamageType::Bludgeoning, &["two-handed"], None),
        WeaponProfile::new("Handaxe", "1d6", DamageType::Slashing, &["light", "thrown"], Some((20, 60))),
        WeaponProfile::new("Javelin", "1d6", DamageType::Piercing, &["thrown"], Some((30, 120))),
        WeaponProfile::new("Mace", "1d6", DamageType::Bludgeoning, &[], None),
        WeaponProfile::new("Quarterstaff", "1d6", DamageType::Bludgeoning, &["versatile"], None),
        WeaponProfile::new("Spear", "1d6", DamageType::Piercing, &["thrown", "versatile"], Some((20, 60))),
        // Simple ranged
        WeaponProfile::new("Light Crossbow", "1d8", DamageType::Piercing, &["ammunition", "loading", "two-handed"], Some((80, 320))),
        WeaponProfile::new("Shortbow", "1d6", DamageType::Piercing, &["ammunition", "two-handed"], Some((80, 320))),
        WeaponProfile::new("Sling", "1d4", DamageType::Bludgeoning, &["ammunition"], Some((30, 120))),
        // Martial melee
        WeaponProfile::new("Battleaxe", "1d8", DamageType::Slashing, &["versatile"], None),
        WeaponProfile::new("Glaive", "1d10", DamageType::Slashing, &["heavy", "reach", "two-handed"], None),
        WeaponProfile::new("Greataxe", "1d12", DamageType::Slashing, &["heavy", "two-handed"], None),
        WeaponProfile::new("Greatsword", "2d6", DamageType::Slashing, &["heavy", "two-handed"], None),
        WeaponProfile::new("Longsword", "1d8", DamageType::Slashing, &["versatile"], None),
        WeaponProfile::new("Maul", "2d6", DamageType::Bludgeoning, &["heavy", "two-handed"], None),
        WeaponProfile::new("Morningstar", "1d8", DamageType::Piercing, &[], None),
        WeaponProfile::new("Rapier", "1d8", DamageType::Piercing, &["finesse"], None),
        WeaponProfile::new("Scimitar", "1d6", DamageType::Slashing, &["finesse", "light"], None),
        WeaponProfile::new("Shortsword", "1d6", DamageType::Piercing, &["finesse", "light"], None),
        WeaponProfile::new("Warhammer", "1d8", DamageType::Bludgeoning, &["versatile"], None),
        // Martial ranged
        WeaponProfile::new("Heavy Crossbow", "1d10", DamageType::Piercing, &["ammunition", "heavy", "loading", "two-handed"], Some((100, 400))),
        WeaponProfile::new("Longbow", "1d8", DamageType::Piercing, &["ammunition", "heavy", "two-handed"], Some((150, 600))),
        WeaponProfile::new("Hand Crossbow", "1d6", DamageType::Piercing, &["ammunition", "light", "loading"], Some((30, 120))),
    ];

    /// Standard SRD armor.
    pub static ref ARMORS: Vec<ArmorProfile> = vec![
        ArmorProfile { name: "Padded", base_ac: 11, max_dex_bonus: None },
        ArmorProfile { name: "Leather", base_ac: 11, max_dex_bonus: None },
        ArmorProfile { name: "Studded Leather", base_ac: 12, max_dex_bonus: None },
        ArmorProfile { name: "Hide", base_ac: 12, max_dex_bonus: Some(2) },
        ArmorProfile { name: "Chain Shirt", base_ac: 13, max_dex_bonus: Some(2) },
        ArmorProfile { name: "Scale Mail", base_ac: 14, max_dex_bonus: Some(2) },
        ArmorProfile { name: "Breastplate", base_ac: 14, max_dex_bonus: Some(2) },
        ArmorProfile { name: "Half Plate", base_ac: 15, max_dex_bonus: Some(2) },
        ArmorProfile { name: "Ring Mail", base_ac: 14, max_dex_bonus: Some(0) },
        ArmorProfile { name: "Chain Mail", base_ac: 16, max_dex_bonus: Some(0) },
        ArmorProfile { name: "Splint", base_ac: 17, max_dex_bonus: Some(0) },
        ArmorProfile { name: "Plate", base_ac: 18, max_dex_bonus: Some(0) },
    ];
}

/// Look up a standard weapon by name, case-insensitively.
pub fn get_weapon(name: &str) -> Option<WeaponProfile> {
    let name = name.trim();
    WEAPONS
        .iter()
        .find(|w| w.name.eq_ignore_ascii_case(name))
        .cloned()
}

/// Look up standard armor by name, case-insensitively.
pub fn get_armor(name: &str) -> Option<ArmorProfile> {
    let name = name.trim();
    ARMORS
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(name))
        .cloned()
}
