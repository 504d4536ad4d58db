//! Support casting, environment effects and the post-combat recap.

mod common;

use combat_core::conditions::{self, ConditionKind};
use combat_core::testing::party_sheets;
use combat_core::{
    AttackDamage, AttackOptions, CombatError, DamageType, DeathSaves, DeclaredAction,
    EncounterManager, EncounterOptions, Lighting,
};

use common::{advance_until, id_of, party_vs_goblins};

#[test]
fn guidance_lasts_through_the_targets_turn() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(51, 1);

    let enc = advance_until(&manager, enc, "Bramli");
    let caster = id_of(&enc, "Bramli");
    let rogue = id_of(&enc, "Pip");
    let (enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::CastSpell {
                caster,
                spell_name: "Guidance".to_string(),
                targets: vec![rogue],
                slot_level: None,
            },
        )
        .unwrap();
    assert!(result.success);
    assert!(conditions::has(
        &enc.combatant(rogue).unwrap().conditions,
        &ConditionKind::Guided
    ));

    // Still guided on the rogue's own turn; gone once that turn ends.
    let enc = advance_until(&manager, enc, "Pip");
    assert!(conditions::has(
        &enc.combatant(rogue).unwrap().conditions,
        &ConditionKind::Guided
    ));
    let enc = manager.end_turn(&enc).unwrap();
    assert!(!conditions::has(
        &enc.combatant(rogue).unwrap().conditions,
        &ConditionKind::Guided
    ));
}

#[test]
fn spare_the_dying_stabilizes_through_the_manager() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(52, 1);

    // Bring the cleric up first so the wizard's automatic death save never
    // fires before the cast.
    let enc = advance_until(&manager, enc, "Bramli");
    let caster = id_of(&enc, "Bramli");
    let wizard_id = id_of(&enc, "Elora");
    let mut elora = enc.combatant(wizard_id).unwrap().clone();
    elora.hp.current = 0;
    elora.death_saves = Some(DeathSaves {
        successes: 1,
        failures: 1,
    });
    conditions::add(
        &mut elora.conditions,
        combat_core::ActiveCondition::new(ConditionKind::Unconscious, "damage"),
    );
    let enc = manager.update_combatant(&enc, elora).unwrap();
    let (enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::CastSpell {
                caster,
                spell_name: "Spare the Dying".to_string(),
                targets: vec![wizard_id],
                slot_level: None,
            },
        )
        .unwrap();
    assert!(result.success);
    let elora = enc.combatant(wizard_id).unwrap();
    assert!(elora.is_stable());
    assert_eq!(elora.hp.current, 0);

    // A stable PC is skipped on advance but never leaves the order.
    let mut enc = enc;
    for _ in 0..2 * enc.initiative_order.len() {
        enc = manager.end_turn(&enc).unwrap();
        assert_ne!(enc.current().unwrap().id, wizard_id);
    }
    assert!(enc.combatant(wizard_id).is_some());
}

#[test]
fn bless_marks_allies_and_holds_concentration() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(53, 1);

    let enc = advance_until(&manager, enc, "Bramli");
    let caster = id_of(&enc, "Bramli");
    let allies = [id_of(&enc, "Roland"), id_of(&enc, "Elora"), id_of(&enc, "Pip")];
    let (enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::CastSpell {
                caster,
                spell_name: "Bless".to_string(),
                targets: allies.to_vec(),
                slot_level: None,
            },
        )
        .unwrap();
    assert!(result.success);
    for ally in allies {
        assert!(conditions::has(
            &enc.combatant(ally).unwrap().conditions,
            &ConditionKind::Blessed
        ));
    }
    assert_eq!(
        enc.combatant(caster).unwrap().concentrating_on.as_deref(),
        Some("Bless")
    );
    // The level-one slot was consumed.
    assert_eq!(
        enc.combatant(caster).unwrap().spell_slots.get(&1).unwrap().current,
        2
    );
}

#[test]
fn bonus_action_casting_leaves_the_action_free() {
    let manager = EncounterManager::new();
    let enc = party_vs_goblins(54, 1);

    let enc = advance_until(&manager, enc, "Bramli");
    let caster = id_of(&enc, "Bramli");
    let fighter = id_of(&enc, "Roland");

    // Shield of Faith is a bonus action; Guidance still fits in the turn.
    let (enc, _) = manager
        .submit_action(
            &enc,
            DeclaredAction::CastSpell {
                caster,
                spell_name: "Shield of Faith".to_string(),
                targets: vec![fighter],
                slot_level: None,
            },
        )
        .unwrap();
    let (enc, _) = manager
        .submit_action(
            &enc,
            DeclaredAction::CastSpell {
                caster,
                spell_name: "Guidance".to_string(),
                targets: vec![fighter],
                slot_level: None,
            },
        )
        .unwrap();

    // Starting Guidance does not break Shield of Faith: guidance is not a
    // concentration effect here, so the buff and its AC stay up.
    assert_eq!(enc.combatant(fighter).unwrap().ac, 20);

    // But the action and bonus action are both spent now.
    let result = manager.submit_action(
        &enc,
        DeclaredAction::CastSpell {
            caster,
            spell_name: "Guidance".to_string(),
            targets: vec![fighter],
            slot_level: None,
        },
    );
    assert!(matches!(result, Err(CombatError::ResourceUnavailable(_))));
    let result = manager.submit_action(
        &enc,
        DeclaredAction::CastSpell {
            caster,
            spell_name: "Shield of Faith".to_string(),
            targets: vec![fighter],
            slot_level: None,
        },
    );
    assert!(matches!(result, Err(CombatError::ResourceUnavailable(_))));
}

#[test]
fn darkness_tips_the_hide_check() {
    let manager = EncounterManager::new();

    let build = |lighting: Lighting| {
        let options = EncounterOptions {
            seed: 55,
            lighting,
            environmental_effects: vec!["thick fog".to_string()],
        };
        let enc = manager.create_encounter("c", "s", options);
        let (enc, _) = manager.add_party(&enc, &party_sheets()).unwrap();
        manager.start_combat(&enc).unwrap()
    };

    // Total 10 vs DC 12 fails in bright light...
    let enc = build(Lighting::Bright);
    let enc = advance_until(&manager, enc, "Pip");
    let pip = id_of(&enc, "Pip");
    let (_, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::Hide {
                actor: pip,
                stealth_roll: 5,
                stealth_mod: 5,
            },
        )
        .unwrap();
    assert!(!result.success);

    // ...and squeaks in under darkness.
    let enc = build(Lighting::Dark);
    assert_eq!(enc.environmental_effects, vec!["thick fog".to_string()]);
    let enc = advance_until(&manager, enc, "Pip");
    let pip = id_of(&enc, "Pip");
    let (enc, result) = manager
        .submit_action(
            &enc,
            DeclaredAction::Hide {
                actor: pip,
                stealth_roll: 5,
                stealth_mod: 5,
            },
        )
        .unwrap();
    assert!(result.success);
    assert!(conditions::has(
        &enc.combatant(pip).unwrap().conditions,
        &ConditionKind::Hidden
    ));
}

#[test]
fn summary_credits_damage_to_the_dealer() {
    let manager = EncounterManager::new();
    for seed in 0..40u64 {
        let enc = party_vs_goblins(seed + 600, 1);
        let enc = advance_until(&manager, enc, "Roland");
        let attacker = id_of(&enc, "Roland");
        let target = id_of(&enc, "Goblin");

        let (enc, result) = manager
            .submit_action(
                &enc,
                DeclaredAction::Attack {
                    attacker,
                    target,
                    attack_bonus: 30,
                    damage: AttackDamage {
                        dice: "1d8+3".to_string(),
                        damage_type: DamageType::Slashing,
                    },
                    options: AttackOptions::default(),
                },
            )
            .unwrap();
        if !result.success {
            continue; // natural 1
        }

        let summary = manager.combat_summary(&enc);
        let dealt = summary.damage_dealt.get("Roland").copied().unwrap_or(0);
        assert!(dealt >= 4); // 1d8+3 minimum
        assert_eq!(summary.mvp.as_deref(), Some("Roland"));
        // Goblin has 7 HP; a max-damage swing fells it.
        if !enc.defeated.is_empty() {
            assert_eq!(summary.casualties, vec!["Goblin".to_string()]);
        }
        return;
    }
    panic!("forty swings without a hit");
}
