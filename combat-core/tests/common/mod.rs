//! Shared fixtures for the integration suite.
#![allow(dead_code)]

use combat_core::testing::{goblin_template, party_sheets};
use combat_core::{CombatantId, Encounter, EncounterManager, EncounterOptions};

/// The canonical four-person party against `goblins` goblins, started.
pub fn party_vs_goblins(seed: u64, goblins: usize) -> Encounter {
    let _ = env_logger::builder().is_test(true).try_init();
    let manager = EncounterManager::new();
    let enc = manager.create_encounter("campaign", "session-1", EncounterOptions::with_seed(seed));
    let (enc, _) = manager.add_party(&enc, &party_sheets()).unwrap();
    let templates: Vec<_> = (0..goblins).map(|_| goblin_template()).collect();
    let (enc, _) = manager.add_monsters(&enc, &templates, true).unwrap();
    manager.start_combat(&enc).unwrap()
}

/// End turns until the named combatant is up.
pub fn advance_until(manager: &EncounterManager, enc: Encounter, name: &str) -> Encounter {
    let mut enc = enc;
    for _ in 0..50 {
        if enc.current().map(|c| c.name.as_str()) == Some(name) {
            return enc;
        }
        enc = manager.end_turn(&enc).unwrap();
    }
    panic!("{name} never came up in the initiative order");
}

pub fn id_of(enc: &Encounter, name: &str) -> CombatantId {
    enc.initiative_order
        .iter()
        .find(|c| c.name == name)
        .unwrap_or_else(|| panic!("no combatant named {name}"))
        .id
}
