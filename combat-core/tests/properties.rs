//! Property tests for the engine's universally quantified invariants.

mod common;

use proptest::prelude::*;

use combat_core::conditions::{self, ActiveCondition, ConditionDuration, ConditionKind, TickPhase};
use combat_core::damage::{
    apply_damage, apply_healing, apply_temp_hp, DamageInstance, DamageType,
};
use combat_core::testing::sample_pc;
use combat_core::{
    AdvantageMode, AttackDamage, AttackOptions, DeclaredAction, EncounterManager,
};

use common::{advance_until, id_of, party_vs_goblins};

fn damage_type_for(index: u32) -> DamageType {
    match index % 3 {
        0 => DamageType::Fire,
        1 => DamageType::Cold,
        _ => DamageType::Slashing,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Hit points stay within bounds under any damage/heal sequence, and
    // resistance/vulnerability never overshoot the original amount.
    #[test]
    fn hp_bounds_hold_under_any_sequence(
        seq in prop::collection::vec((0u32..120, any::<bool>()), 1..40)
    ) {
        let mut pc = sample_pc("Subject", 60, 14);
        pc.resistances.insert(DamageType::Fire);
        pc.vulnerabilities.insert(DamageType::Cold);

        for (amount, heal) in seq {
            if heal {
                apply_healing(&mut pc, amount, "potion");
            } else {
                let outcome = apply_damage(
                    &mut pc,
                    &DamageInstance::new(amount, damage_type_for(amount), "hazard"),
                );
                if outcome.was_resisted {
                    prop_assert!(outcome.final_amount <= outcome.original);
                }
                if outcome.was_vulnerable {
                    prop_assert!(outcome.final_amount >= outcome.original);
                }
            }
            prop_assert!(pc.hp.current <= pc.hp.max);
        }
    }

    // Temporary hit points strictly absorb before current.
    #[test]
    fn temp_hp_absorbs_first(temp in 1u32..30, amount in 1u32..80) {
        let mut pc = sample_pc("Subject", 40, 12);
        apply_temp_hp(&mut pc, temp);
        let before = pc.hp.current;

        apply_damage(
            &mut pc,
            &DamageInstance::new(amount, DamageType::Slashing, "hazard"),
        );
        let absorbed = temp.min(amount);
        prop_assert_eq!(pc.hp.temp, temp - absorbed);
        let carried = amount - absorbed;
        prop_assert_eq!(pc.hp.current, before.saturating_sub(carried));
    }

    // Idempotence: granting the same temp HP twice equals granting it once.
    #[test]
    fn temp_hp_grant_is_idempotent(k in 0u32..60) {
        let mut once = sample_pc("A", 30, 12);
        apply_temp_hp(&mut once, k);
        let mut twice = sample_pc("B", 30, 12);
        apply_temp_hp(&mut twice, k);
        apply_temp_hp(&mut twice, k);
        prop_assert_eq!(once.hp.temp, twice.hp.temp);
    }

    // Add then remove a condition leaves the list as it was.
    #[test]
    fn condition_add_remove_round_trips(level in 1u8..4) {
        let mut conds = vec![
            ActiveCondition::new(ConditionKind::Prone, "Shove"),
            ActiveCondition::new(ConditionKind::Exhaustion(level), "march"),
        ];
        let original = conds.clone();

        conditions::add(
            &mut conds,
            ActiveCondition::new(ConditionKind::Blessed, "Bless")
                .with_duration(ConditionDuration::Minutes(1)),
        );
        prop_assert_eq!(conds.len(), 3);
        conditions::remove(&mut conds, Some(&ConditionKind::Blessed), Some("Bless"));
        prop_assert_eq!(conds, original);
    }

    // The initiative order stays sorted and the turn index stays in
    // range under arbitrary seeds and repeated turn cycling.
    #[test]
    fn order_sorted_and_index_valid(seed in any::<u64>()) {
        let manager = EncounterManager::new();
        let mut enc = party_vs_goblins(seed, 2);
        for _ in 0..10 {
            prop_assert!(enc.check_invariants().is_ok());
            prop_assert!(enc.current_turn_index < enc.initiative_order.len());
            for pair in enc.initiative_order.windows(2) {
                prop_assert!(
                    (pair[0].initiative, pair[0].dex_mod)
                        >= (pair[1].initiative, pair[1].dex_mod)
                );
            }
            enc = manager.end_turn(&enc).unwrap();
        }
    }

    // Every accepted action appends to the log without rewriting history.
    #[test]
    fn log_is_append_only(seed in any::<u64>()) {
        let manager = EncounterManager::new();
        let mut enc = party_vs_goblins(seed, 1);
        for _ in 0..6 {
            let before = enc.action_log.clone();
            let actor = enc.current().unwrap().id;
            let (next, _) = manager
                .submit_action(&enc, DeclaredAction::Dodge { actor })
                .unwrap();
            prop_assert!(next.action_log.len() > before.len());
            prop_assert_eq!(&next.action_log[..before.len()], &before[..]);

            let after_dodge = next.action_log.clone();
            enc = manager.end_turn(&next).unwrap();
            prop_assert!(enc.action_log.len() > after_dodge.len());
            prop_assert_eq!(&enc.action_log[..after_dodge.len()], &after_dodge[..]);
        }
    }

    // A full cycle of end-turns comes back to the same actor with the
    // round advanced exactly once.
    #[test]
    fn end_turn_cycle_increments_round_once(seed in any::<u64>()) {
        let manager = EncounterManager::new();
        let mut enc = party_vs_goblins(seed, 2);
        let first = enc.current().unwrap().id;
        let round = enc.round;
        for _ in 0..enc.initiative_order.len() {
            enc = manager.end_turn(&enc).unwrap();
        }
        prop_assert_eq!(enc.current().unwrap().id, first);
        prop_assert_eq!(enc.round, round + 1);
    }
}

// ---------------------------------------------------------------------------
// Advantage and disadvantage cancel to a single d20
// ---------------------------------------------------------------------------

#[test]
fn advantage_and_disadvantage_cancel_to_one_die() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(31, 1);
    let enc = advance_until(&manager, enc, "Roland");
    let attacker = id_of(&enc, "Roland");
    let target = id_of(&enc, "Goblin");

    let (_enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::Attack {
                attacker,
                target,
                attack_bonus: 5,
                damage: AttackDamage {
                    dice: "1d8+3".to_string(),
                    damage_type: DamageType::Slashing,
                },
                options: AttackOptions {
                    advantage: true,
                    disadvantage: true,
                    ..Default::default()
                },
            },
        )
        .unwrap();
    let entry = result.log_entry.unwrap();
    let roll = &entry.dice_rolls[0];
    assert_eq!(roll.advantage, AdvantageMode::Normal);
    assert_eq!(roll.rolls.len(), 1);
}

#[test]
fn condition_sourced_disadvantage_cancels_caller_advantage() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(32, 1);

    // The goblin dodges (disadvantage source); the fighter attacks with a
    // caller-supplied advantage flag. The sources cancel to one d20.
    let enc = advance_until(&manager, enc, "Goblin");
    let goblin = id_of(&enc, "Goblin");
    let (enc, _) = manager
        .submit_action(&enc, DeclaredAction::Dodge { actor: goblin })
        .unwrap();

    // Advancing from the dodger reaches the fighter before the dodger's
    // own turn (and the buff's expiry) can come around again.
    let enc = advance_until(&manager, enc, "Roland");
    let fighter = id_of(&enc, "Roland");
    let (_enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::Attack {
                attacker: fighter,
                target: goblin,
                attack_bonus: 5,
                damage: AttackDamage {
                    dice: "1d8+3".to_string(),
                    damage_type: DamageType::Slashing,
                },
                options: AttackOptions {
                    advantage: true,
                    ..Default::default()
                },
            },
        )
        .unwrap();
    let entry = result.log_entry.unwrap();
    let roll = &entry.dice_rolls[0];
    assert_eq!(roll.advantage, AdvantageMode::Normal);
    assert_eq!(roll.rolls.len(), 1);
}

// ---------------------------------------------------------------------------
// AC reverts exactly when the carrying condition expires
// ---------------------------------------------------------------------------

#[test]
fn ac_bonus_reverts_on_expiry() {
    let mut pc = sample_pc("Elora", 7, 12);
    let original = pc.ac;
    conditions::add(
        &mut pc.conditions,
        ActiveCondition::new(ConditionKind::Shielded, "Shield")
            .with_duration(ConditionDuration::until_next_turn_start())
            .with_ac_bonus(5, original),
    );
    pc.ac += 5;
    assert_eq!(pc.ac, 17);

    // End-of-turn does nothing; start-of-turn expires the buff and hands
    // back the adjustment in the same step.
    let outcome = conditions::tick(&mut pc.conditions, TickPhase::EndOfTurn);
    assert_eq!(outcome.ac_adjustment, 0);
    let outcome = conditions::tick(&mut pc.conditions, TickPhase::StartOfTurn);
    pc.ac = (pc.ac as i32 + outcome.ac_adjustment) as u32;
    assert_eq!(pc.ac, original);
    assert!(pc.conditions.is_empty());
}
