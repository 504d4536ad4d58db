//! Deterministic SRD 5e combat engine.
//!
//! This crate is the combat core of the virtual tabletop: it takes a party
//! of player characters, a set of adversaries and a stream of declared
//! actions, and advances them through an initiative-ordered encounter.
//! Given the same seed and the same action stream it produces identical
//! state transitions and identical log output.
//!
//! # Quick Start
//!
//! ```
//! use combat_core::{DeclaredAction, EncounterManager, EncounterOptions};
//! use combat_core::testing::{goblin_template, party_sheets};
//!
//! let manager = EncounterManager::new();
//! let enc = manager.create_encounter("campaign", "session-1", EncounterOptions::with_seed(7));
//! let (enc, _rolls) = manager.add_party(&enc, &party_sheets()).unwrap();
//! let (enc, _rolls) = manager.add_monsters(&enc, &[goblin_template()], false).unwrap();
//! let enc = manager.start_combat(&enc).unwrap();
//!
//! let actor = enc.current().unwrap().id;
//! let (enc, _result) = manager
//!     .submit_action(&enc, DeclaredAction::Dodge { actor })
//!     .unwrap();
//! assert!(enc.check_invariants().is_ok());
//! ```

pub mod actions;
pub mod combatant;
pub mod conditions;
pub mod damage;
pub mod dice;
pub mod encounter;
pub mod error;
pub mod initiative;
pub mod items;
pub mod events;
pub mod manager;
pub mod rng;
pub mod spells;
pub mod stats;
pub mod testing;

// Primary public API
pub use actions::{
    ActionResult, AttackDamage, AttackOptions, DeclaredAction, HelpKind, ShoveMode,
};
pub use combatant::{
    combatant_from_character, combatant_from_monster, Combatant, CombatantId, CombatantKind,
    DeathSaves, HitPoints, MonsterTemplate, TurnResources,
};
pub use conditions::{ActiveCondition, ConditionDuration, ConditionKind, TickPhase};
pub use damage::{DamageInstance, DamageOutcome, DamageType, HealingOutcome};
pub use dice::{AdvantageMode, DiceExpression, DiceRoll, DieType};
pub use encounter::{Encounter, EncounterId, EncounterOptions, EncounterStatus, Lighting};
pub use error::CombatError;
pub use initiative::InitiativeRoll;
pub use events::LogEntry;
pub use manager::{CombatEndCheck, CombatSummary, EncounterManager, Side};
pub use rng::DiceRoller;
pub use stats::{CharacterSheet, CombatStats, ResolvedSpell, ResolvedWeapon};
