//! Condition engine.
//!
//! Tracks the closed catalogue of SRD conditions plus the combat-internal
//! markers the action resolver uses (dodging, hidden, helped, readied and
//! the spell buffs). Conditions carry a typed duration ticked at turn
//! boundaries, and may carry reversible side effects in their metadata: a
//! condition whose metadata holds `ac_bonus` contributes the negated bonus
//! to the returned `ac_adjustment` when it expires or is removed, so the
//! caller can restore the combatant's armor class in the same step.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::stats::Ability;

// ============================================================================
// Catalogue
// ============================================================================

/// The closed set of conditions the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Blinded,
    Charmed,
    Deafened,
    Frightened,
    Grappled,
    Incapacitated,
    Invisible,
    Paralyzed,
    Petrified,
    Poisoned,
    Prone,
    Restrained,
    Stunned,
    Unconscious,
    Exhaustion(u8),
    // Combat-internal markers
    Dodging,
    Disengaged,
    Hidden,
    Readied,
    HelpedAttack,
    HelpedCheck,
    Shielded,
    ShieldOfFaith,
    Blessed,
    Guided,
}

impl ConditionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConditionKind::Blinded => "blinded",
            ConditionKind::Charmed => "charmed",
            ConditionKind::Deafened => "deafened",
            ConditionKind::Frightened => "frightened",
            ConditionKind::Grappled => "grappled",
            ConditionKind::Incapacitated => "incapacitated",
            ConditionKind::Invisible => "invisible",
            ConditionKind::Paralyzed => "paralyzed",
            ConditionKind::Petrified => "petrified",
            ConditionKind::Poisoned => "poisoned",
            ConditionKind::Prone => "prone",
            ConditionKind::Restrained => "restrained",
            ConditionKind::Stunned => "stunned",
            ConditionKind::Unconscious => "unconscious",
            ConditionKind::Exhaustion(_) => "exhaustion",
            ConditionKind::Dodging => "dodging",
            ConditionKind::Disengaged => "disengaged",
            ConditionKind::Hidden => "hidden",
            ConditionKind::Readied => "readied",
            ConditionKind::HelpedAttack => "helped_attack",
            ConditionKind::HelpedCheck => "helped_check",
            ConditionKind::Shielded => "shielded",
            ConditionKind::ShieldOfFaith => "shield_of_faith",
            ConditionKind::Blessed => "blessed",
            ConditionKind::Guided => "guided",
        }
    }

    /// Parse a condition name, case-insensitively. Exhaustion parses at
    /// level 1; callers that track levels use [`add_exhaustion`].
    pub fn from_name(name: &str) -> Option<ConditionKind> {
        match name.trim().to_lowercase().as_str() {
            "blinded" => Some(ConditionKind::Blinded),
            "charmed" => Some(ConditionKind::Charmed),
            "deafened" => Some(ConditionKind::Deafened),
            "frightened" => Some(ConditionKind::Frightened),
            "grappled" => Some(ConditionKind::Grappled),
            "incapacitated" => Some(ConditionKind::Incapacitated),
            "invisible" => Some(ConditionKind::Invisible),
            "paralyzed" => Some(ConditionKind::Paralyzed),
            "petrified" => Some(ConditionKind::Petrified),
            "poisoned" => Some(ConditionKind::Poisoned),
            "prone" => Some(ConditionKind::Prone),
            "restrained" => Some(ConditionKind::Restrained),
            "stunned" => Some(ConditionKind::Stunned),
            "unconscious" => Some(ConditionKind::Unconscious),
            "exhaustion" => Some(ConditionKind::Exhaustion(1)),
            "dodging" => Some(ConditionKind::Dodging),
            "disengaged" => Some(ConditionKind::Disengaged),
            "hidden" => Some(ConditionKind::Hidden),
            "readied" => Some(ConditionKind::Readied),
            "helped_attack" => Some(ConditionKind::HelpedAttack),
            "helped_check" => Some(ConditionKind::HelpedCheck),
            "shielded" => Some(ConditionKind::Shielded),
            "shield_of_faith" => Some(ConditionKind::ShieldOfFaith),
            "blessed" => Some(ConditionKind::Blessed),
            "guided" => Some(ConditionKind::Guided),
            _ => None,
        }
    }

    /// True when two kinds are the same condition, ignoring exhaustion level.
    pub fn same_kind(&self, other: &ConditionKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn is_incapacitating(&self) -> bool {
        matches!(
            self,
            ConditionKind::Incapacitated
                | ConditionKind::Paralyzed
                | ConditionKind::Petrified
                | ConditionKind::Stunned
                | ConditionKind::Unconscious
        )
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionKind::Exhaustion(level) => write!(f, "exhaustion ({level})"),
            _ => write!(f, "{}", self.name()),
        }
    }
}

// ============================================================================
// Durations
// ============================================================================

/// Which boundary of a combatant's turn a duration ticks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickPhase {
    StartOfTurn,
    EndOfTurn,
}

/// How long a condition lasts.
///
/// `Rounds` decrements only at round rollover. `Turns` decrements at the
/// matching turn phase of its owner. `Minutes`/`Hours` persist within
/// combat; an out-of-combat scheduler owns their decay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConditionDuration {
    Rounds(u32),
    Turns { n: u32, ends_at: TickPhase },
    Minutes(u32),
    Hours(u32),
    Permanent,
    UntilSave { dc: u32, ability: Ability },
    UntilDispelled,
    Special(String),
}

impl ConditionDuration {
    /// One turn, expiring at the owner's next turn start.
    pub fn until_next_turn_start() -> ConditionDuration {
        ConditionDuration::Turns {
            n: 1,
            ends_at: TickPhase::StartOfTurn,
        }
    }

    /// One turn, expiring at the owner's turn end.
    pub fn until_turn_end() -> ConditionDuration {
        ConditionDuration::Turns {
            n: 1,
            ends_at: TickPhase::EndOfTurn,
        }
    }

    /// Approximate in-world length in seconds; `None` is open-ended.
    ///
    /// Turn- and round-scoped durations count six seconds apiece. Used only
    /// to pick the longer of two merged durations.
    pub fn approx_seconds(&self) -> Option<u64> {
        match self {
            ConditionDuration::Rounds(n) => Some(6 * *n as u64),
            ConditionDuration::Turns { n, .. } => Some(6 * *n as u64),
            ConditionDuration::Minutes(n) => Some(60 * *n as u64),
            ConditionDuration::Hours(n) => Some(3600 * *n as u64),
            ConditionDuration::Permanent
            | ConditionDuration::UntilSave { .. }
            | ConditionDuration::UntilDispelled
            | ConditionDuration::Special(_) => None,
        }
    }

    fn outlasts(&self, other: &ConditionDuration) -> bool {
        match (self.approx_seconds(), other.approx_seconds()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => a >= b,
        }
    }
}

impl<'de> Deserialize<'de> for ConditionDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Historical payloads carry a bare turn count; treat it as
        // Turns { n, EndOfTurn }.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Bare(u32),
            Full(FullDuration),
        }

        #[derive(Deserialize)]
        enum FullDuration {
            Rounds(u32),
            Turns { n: u32, ends_at: TickPhase },
            Minutes(u32),
            Hours(u32),
            Permanent,
            UntilSave { dc: u32, ability: Ability },
            UntilDispelled,
            Special(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Bare(n) => ConditionDuration::Turns {
                n,
                ends_at: TickPhase::EndOfTurn,
            },
            Repr::Full(full) => match full {
                FullDuration::Rounds(n) => ConditionDuration::Rounds(n),
                FullDuration::Turns { n, ends_at } => ConditionDuration::Turns { n, ends_at },
                FullDuration::Minutes(n) => ConditionDuration::Minutes(n),
                FullDuration::Hours(n) => ConditionDuration::Hours(n),
                FullDuration::Permanent => ConditionDuration::Permanent,
                FullDuration::UntilSave { dc, ability } => {
                    ConditionDuration::UntilSave { dc, ability }
                }
                FullDuration::UntilDispelled => ConditionDuration::UntilDispelled,
                FullDuration::Special(text) => ConditionDuration::Special(text),
            },
        })
    }
}

// ============================================================================
// Active conditions
// ============================================================================

/// A condition applied to a combatant.
///
/// Older payloads named the kind field `condition` or `name`; both aliases
/// are accepted on input and canonicalized into `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveCondition {
    #[serde(alias = "condition", alias = "name")]
    pub kind: ConditionKind,
    pub source: String,
    pub duration: ConditionDuration,
    /// Set on turn-scoped conditions granted by another combatant: the
    /// owner's first matching turn boundary is not the one the duration is
    /// anchored to, so that single tick is skipped.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_next_tick: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ActiveCondition {
    pub fn new(kind: ConditionKind, source: impl Into<String>) -> Self {
        ActiveCondition {
            kind,
            source: source.into(),
            duration: ConditionDuration::Permanent,
            skip_next_tick: false,
            metadata: Map::new(),
        }
    }

    pub fn with_duration(mut self, duration: ConditionDuration) -> Self {
        self.duration = duration;
        self
    }

    /// Anchor a turn-scoped duration past the owner's imminent turn
    /// boundary (used when someone else grants the condition mid-round).
    pub fn with_delayed_tick(mut self) -> Self {
        self.skip_next_tick = true;
        self
    }

    /// Record a reversible armor-class delta along with the pre-buff value.
    pub fn with_ac_bonus(mut self, bonus: i64, original_ac: u32) -> Self {
        self.metadata.insert("ac_bonus".to_string(), bonus.into());
        self.metadata
            .insert("original_ac".to_string(), original_ac.into());
        self
    }

    /// The armor-class delta this condition carries, if any.
    pub fn ac_bonus(&self) -> i32 {
        self.metadata
            .get("ac_bonus")
            .and_then(Value::as_i64)
            .unwrap_or(0) as i32
    }
}

/// Result of a tick or removal pass.
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    /// Conditions dropped by this pass.
    pub expired: Vec<ActiveCondition>,
    /// Net armor-class correction the caller must apply.
    pub ac_adjustment: i32,
}

impl TickOutcome {
    fn from_expired(expired: Vec<ActiveCondition>) -> Self {
        let ac_adjustment = expired.iter().map(|c| -c.ac_bonus()).sum();
        TickOutcome {
            expired,
            ac_adjustment,
        }
    }
}

// ============================================================================
// Add / remove
// ============================================================================

/// Add a condition, merging with an existing `(kind, source)` record.
///
/// A merge keeps the longer of the two durations. Returns true when a new
/// record was appended.
pub fn add(conditions: &mut Vec<ActiveCondition>, incoming: ActiveCondition) -> bool {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| c.kind.same_kind(&incoming.kind) && c.source == incoming.source)
    {
        if let (ConditionKind::Exhaustion(have), ConditionKind::Exhaustion(new)) =
            (&mut existing.kind, &incoming.kind)
        {
            *have = (*have).max(*new).min(6);
        }
        if incoming.duration.outlasts(&existing.duration) {
            existing.duration = incoming.duration;
        }
        existing.skip_next_tick |= incoming.skip_next_tick;
        for (key, value) in incoming.metadata {
            existing.metadata.entry(key).or_insert(value);
        }
        false
    } else {
        conditions.push(incoming);
        true
    }
}

/// Raise exhaustion by `levels`, capped at 6. Exhaustion accumulates across
/// sources, so any existing record is raised in place.
pub fn add_exhaustion(conditions: &mut Vec<ActiveCondition>, levels: u8, source: &str) -> u8 {
    if let Some(existing) = conditions
        .iter_mut()
        .find(|c| matches!(c.kind, ConditionKind::Exhaustion(_)))
    {
        if let ConditionKind::Exhaustion(level) = &mut existing.kind {
            *level = level.saturating_add(levels).min(6);
            return *level;
        }
    }
    let level = levels.min(6);
    conditions.push(ActiveCondition::new(
        ConditionKind::Exhaustion(level),
        source,
    ));
    level
}

/// Remove conditions matching a kind and/or source.
///
/// With `kind` only, all records of that kind go. With `source` as well,
/// only records from that source go. With `source` only, everything the
/// source applied goes (the concentration-break path).
pub fn remove(
    conditions: &mut Vec<ActiveCondition>,
    kind: Option<&ConditionKind>,
    source: Option<&str>,
) -> TickOutcome {
    let mut removed = Vec::new();
    conditions.retain(|c| {
        let kind_matches = kind.map_or(true, |k| c.kind.same_kind(k));
        let source_matches = source.map_or(true, |s| c.source.eq_ignore_ascii_case(s));
        if kind_matches && source_matches {
            removed.push(c.clone());
            false
        } else {
            true
        }
    });
    TickOutcome::from_expired(removed)
}

pub fn has(conditions: &[ActiveCondition], kind: &ConditionKind) -> bool {
    conditions.iter().any(|c| c.kind.same_kind(kind))
}

// ============================================================================
// Ticking
// ============================================================================

/// Advance turn-scoped durations at a turn boundary of their owner.
///
/// Only `Turns { ends_at }` durations matching the phase decrement here;
/// round-scoped durations wait for [`tick_round_rollover`], and
/// minute/hour/open-ended durations persist.
pub fn tick(conditions: &mut Vec<ActiveCondition>, phase: TickPhase) -> TickOutcome {
    let mut expired = Vec::new();
    conditions.retain_mut(|c| match &mut c.duration {
        ConditionDuration::Turns { n, ends_at } if *ends_at == phase => {
            if c.skip_next_tick {
                c.skip_next_tick = false;
                return true;
            }
            *n = n.saturating_sub(1);
            if *n == 0 {
                expired.push(c.clone());
                false
            } else {
                true
            }
        }
        _ => true,
    });
    TickOutcome::from_expired(expired)
}

/// Advance round-scoped durations when the round counter rolls over.
pub fn tick_round_rollover(conditions: &mut Vec<ActiveCondition>) -> TickOutcome {
    let mut expired = Vec::new();
    conditions.retain_mut(|c| match &mut c.duration {
        ConditionDuration::Rounds(n) => {
            *n = n.saturating_sub(1);
            if *n == 0 {
                expired.push(c.clone());
                false
            } else {
                true
            }
        }
        _ => true,
    });
    TickOutcome::from_expired(expired)
}

// ============================================================================
// Queries
// ============================================================================

/// Advantage/disadvantage/auto-fail flags for a roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollModifiers {
    pub advantage: bool,
    pub disadvantage: bool,
    pub auto_fail: bool,
}

pub fn is_incapacitated(conditions: &[ActiveCondition]) -> bool {
    conditions.iter().any(|c| c.kind.is_incapacitating())
}

pub fn exhaustion_level(conditions: &[ActiveCondition]) -> u8 {
    conditions
        .iter()
        .find_map(|c| match c.kind {
            ConditionKind::Exhaustion(level) => Some(level),
            _ => None,
        })
        .unwrap_or(0)
}

/// Do attacks against a combatant with these conditions have advantage?
///
/// `distance_ft` is attacker-to-target distance; prone grants advantage
/// only to adjacent attackers.
pub fn attacks_against_have_advantage(conditions: &[ActiveCondition], distance_ft: u32) -> bool {
    conditions.iter().any(|c| match c.kind {
        ConditionKind::Blinded
        | ConditionKind::Paralyzed
        | ConditionKind::Restrained
        | ConditionKind::Stunned
        | ConditionKind::Unconscious => true,
        ConditionKind::Prone => distance_ft <= 5,
        _ => false,
    })
}

/// Do attacks against a combatant with these conditions have disadvantage?
pub fn attacks_against_have_disadvantage(conditions: &[ActiveCondition], distance_ft: u32) -> bool {
    conditions.iter().any(|c| match c.kind {
        ConditionKind::Invisible | ConditionKind::Dodging => true,
        ConditionKind::Prone => distance_ft > 5,
        _ => false,
    })
}

/// Modifiers on attack rolls the combatant itself makes.
pub fn attacker_modifiers(conditions: &[ActiveCondition]) -> RollModifiers {
    let mut mods = RollModifiers::default();
    for c in conditions {
        match c.kind {
            ConditionKind::Poisoned
            | ConditionKind::Frightened
            | ConditionKind::Prone
            | ConditionKind::Restrained => mods.disadvantage = true,
            ConditionKind::Exhaustion(level) if level >= 3 => mods.disadvantage = true,
            ConditionKind::Invisible => mods.advantage = true,
            kind if kind.is_incapacitating() => mods.auto_fail = true,
            _ => {}
        }
    }
    mods
}

/// Modifiers on a saving throw with the given ability.
pub fn save_modifiers(conditions: &[ActiveCondition], ability: Ability) -> RollModifiers {
    let mut mods = RollModifiers::default();
    let physical = matches!(ability, Ability::Strength | Ability::Dexterity);
    for c in conditions {
        match c.kind {
            ConditionKind::Restrained if ability == Ability::Dexterity => {
                mods.disadvantage = true
            }
            ConditionKind::Paralyzed
            | ConditionKind::Stunned
            | ConditionKind::Petrified
            | ConditionKind::Unconscious
                if physical =>
            {
                mods.auto_fail = true
            }
            ConditionKind::Exhaustion(level) if level >= 3 => mods.disadvantage = true,
            _ => {}
        }
    }
    mods
}

/// Cumulative effects of an exhaustion level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustionEffect {
    DisadvantageOnAbilityChecks,
    SpeedHalved,
    DisadvantageOnAttacksAndSaves,
    HitPointMaximumHalved,
    SpeedZero,
    Death,
}

pub fn exhaustion_effects(level: u8) -> Vec<ExhaustionEffect> {
    use ExhaustionEffect::*;
    let ladder = [
        DisadvantageOnAbilityChecks,
        SpeedHalved,
        DisadvantageOnAttacksAndSaves,
        HitPointMaximumHalved,
        SpeedZero,
        Death,
    ];
    ladder[..(level.min(6) as usize)].to_vec()
}

/// Movement speed after condition effects.
pub fn effective_speed(conditions: &[ActiveCondition], base: u32) -> u32 {
    if conditions.iter().any(|c| {
        matches!(
            c.kind,
            ConditionKind::Grappled | ConditionKind::Restrained
        )
    }) {
        return 0;
    }
    match exhaustion_level(conditions) {
        level if level >= 5 => 0,
        level if level >= 2 => base / 2,
        _ => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dodge() -> ActiveCondition {
        ActiveCondition::new(ConditionKind::Dodging, "Dodge action")
            .with_duration(ConditionDuration::until_next_turn_start())
    }

    #[test]
    fn test_add_merges_same_kind_and_source() {
        let mut conds = Vec::new();
        assert!(add(&mut conds, dodge()));
        assert!(!add(&mut conds, dodge()));
        assert_eq!(conds.len(), 1);
    }

    #[test]
    fn test_add_keeps_longer_duration() {
        let mut conds = vec![ActiveCondition::new(ConditionKind::Blessed, "Bless")
            .with_duration(ConditionDuration::Minutes(1))];
        add(
            &mut conds,
            ActiveCondition::new(ConditionKind::Blessed, "Bless")
                .with_duration(ConditionDuration::Turns {
                    n: 2,
                    ends_at: TickPhase::EndOfTurn,
                }),
        );
        assert_eq!(conds[0].duration, ConditionDuration::Minutes(1));

        add(
            &mut conds,
            ActiveCondition::new(ConditionKind::Blessed, "Bless")
                .with_duration(ConditionDuration::Hours(1)),
        );
        assert_eq!(conds[0].duration, ConditionDuration::Hours(1));
    }

    #[test]
    fn test_exhaustion_accumulates_and_caps() {
        let mut conds = Vec::new();
        assert_eq!(add_exhaustion(&mut conds, 2, "forced march"), 2);
        assert_eq!(add_exhaustion(&mut conds, 3, "sickness"), 5);
        assert_eq!(add_exhaustion(&mut conds, 4, "worse sickness"), 6);
        assert_eq!(conds.len(), 1);
    }

    #[test]
    fn test_remove_by_kind_and_source() {
        let mut conds = vec![
            ActiveCondition::new(ConditionKind::Grappled, "Ogre"),
            ActiveCondition::new(ConditionKind::Grappled, "Wolf"),
            ActiveCondition::new(ConditionKind::Prone, "Wolf"),
        ];

        let outcome = remove(&mut conds, Some(&ConditionKind::Grappled), Some("Ogre"));
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(conds.len(), 2);

        let outcome = remove(&mut conds, Some(&ConditionKind::Grappled), None);
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(conds.len(), 1);
        assert!(has(&conds, &ConditionKind::Prone));
    }

    #[test]
    fn test_remove_by_source_only() {
        let mut conds = vec![
            ActiveCondition::new(ConditionKind::Blessed, "Bless"),
            ActiveCondition::new(ConditionKind::ShieldOfFaith, "Shield of Faith")
                .with_ac_bonus(2, 15),
        ];
        let outcome = remove(&mut conds, None, Some("shield of faith"));
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(outcome.ac_adjustment, -2);
        assert_eq!(conds.len(), 1);
    }

    #[test]
    fn test_tick_only_matching_phase() {
        let mut conds = vec![dodge()];
        let outcome = tick(&mut conds, TickPhase::EndOfTurn);
        assert!(outcome.expired.is_empty());
        assert_eq!(conds.len(), 1);

        let outcome = tick(&mut conds, TickPhase::StartOfTurn);
        assert_eq!(outcome.expired.len(), 1);
        assert!(conds.is_empty());
    }

    #[test]
    fn test_delayed_tick_survives_first_boundary() {
        let mut conds = vec![ActiveCondition::new(ConditionKind::HelpedAttack, "Pip")
            .with_duration(ConditionDuration::until_next_turn_start())
            .with_delayed_tick()];

        // The owner's imminent turn start is skipped once.
        assert!(tick(&mut conds, TickPhase::StartOfTurn).expired.is_empty());
        assert_eq!(conds.len(), 1);
        assert!(!conds[0].skip_next_tick);

        // The following one expires it.
        assert_eq!(tick(&mut conds, TickPhase::StartOfTurn).expired.len(), 1);
        assert!(conds.is_empty());
    }

    #[test]
    fn test_tick_multi_turn_counts_down() {
        let mut conds = vec![ActiveCondition::new(ConditionKind::Guided, "Guidance")
            .with_duration(ConditionDuration::Turns {
                n: 2,
                ends_at: TickPhase::EndOfTurn,
            })];
        assert!(tick(&mut conds, TickPhase::EndOfTurn).expired.is_empty());
        assert_eq!(conds.len(), 1);
        assert_eq!(tick(&mut conds, TickPhase::EndOfTurn).expired.len(), 1);
    }

    #[test]
    fn test_rounds_persist_through_turn_ticks() {
        let mut conds = vec![ActiveCondition::new(ConditionKind::Frightened, "Dragon")
            .with_duration(ConditionDuration::Rounds(2))];
        tick(&mut conds, TickPhase::StartOfTurn);
        tick(&mut conds, TickPhase::EndOfTurn);
        assert_eq!(conds.len(), 1);

        assert!(tick_round_rollover(&mut conds).expired.is_empty());
        assert_eq!(tick_round_rollover(&mut conds).expired.len(), 1);
        assert!(conds.is_empty());
    }

    #[test]
    fn test_expiry_returns_ac_adjustment() {
        let mut conds = vec![ActiveCondition::new(ConditionKind::Shielded, "Shield spell")
            .with_duration(ConditionDuration::until_next_turn_start())
            .with_ac_bonus(5, 12)];
        let outcome = tick(&mut conds, TickPhase::StartOfTurn);
        assert_eq!(outcome.ac_adjustment, -5);
    }

    #[test]
    fn test_permanent_durations_persist() {
        let mut conds = vec![
            ActiveCondition::new(ConditionKind::Grappled, "Ogre"),
            ActiveCondition::new(ConditionKind::Hidden, "Hide action")
                .with_duration(ConditionDuration::Special("until detected".to_string())),
            ActiveCondition::new(ConditionKind::Charmed, "Fey")
                .with_duration(ConditionDuration::UntilSave {
                    dc: 13,
                    ability: Ability::Wisdom,
                }),
        ];
        tick(&mut conds, TickPhase::StartOfTurn);
        tick(&mut conds, TickPhase::EndOfTurn);
        tick_round_rollover(&mut conds);
        assert_eq!(conds.len(), 3);
    }

    #[test]
    fn test_incapacitation_set() {
        let conds = vec![ActiveCondition::new(ConditionKind::Stunned, "Spell")];
        assert!(is_incapacitated(&conds));
        let conds = vec![ActiveCondition::new(ConditionKind::Prone, "Shove")];
        assert!(!is_incapacitated(&conds));
    }

    #[test]
    fn test_attacks_against_prone_depend_on_distance() {
        let conds = vec![ActiveCondition::new(ConditionKind::Prone, "Shove")];
        assert!(attacks_against_have_advantage(&conds, 5));
        assert!(!attacks_against_have_advantage(&conds, 30));
        assert!(attacks_against_have_disadvantage(&conds, 30));
        assert!(!attacks_against_have_disadvantage(&conds, 5));
    }

    #[test]
    fn test_dodging_grants_disadvantage_only() {
        let conds = vec![dodge()];
        assert!(attacks_against_have_disadvantage(&conds, 5));
        assert!(!attacks_against_have_advantage(&conds, 5));
    }

    #[test]
    fn test_attacker_modifiers() {
        let conds = vec![ActiveCondition::new(ConditionKind::Poisoned, "Venom")];
        assert!(attacker_modifiers(&conds).disadvantage);

        let conds = vec![ActiveCondition::new(ConditionKind::Invisible, "Spell")];
        assert!(attacker_modifiers(&conds).advantage);

        let conds = vec![ActiveCondition::new(ConditionKind::Paralyzed, "Spell")];
        assert!(attacker_modifiers(&conds).auto_fail);

        let mut conds = Vec::new();
        add_exhaustion(&mut conds, 3, "march");
        assert!(attacker_modifiers(&conds).disadvantage);
    }

    #[test]
    fn test_save_modifiers() {
        let conds = vec![ActiveCondition::new(ConditionKind::Restrained, "Net")];
        assert!(save_modifiers(&conds, Ability::Dexterity).disadvantage);
        assert!(!save_modifiers(&conds, Ability::Wisdom).disadvantage);

        let conds = vec![ActiveCondition::new(ConditionKind::Unconscious, "damage")];
        assert!(save_modifiers(&conds, Ability::Strength).auto_fail);
        assert!(save_modifiers(&conds, Ability::Dexterity).auto_fail);
        assert!(!save_modifiers(&conds, Ability::Constitution).auto_fail);
    }

    #[test]
    fn test_exhaustion_effects_cumulative() {
        assert!(exhaustion_effects(0).is_empty());
        assert_eq!(exhaustion_effects(1).len(), 1);
        assert_eq!(exhaustion_effects(3).len(), 3);
        assert_eq!(exhaustion_effects(6).len(), 6);
        assert_eq!(exhaustion_effects(6).last(), Some(&ExhaustionEffect::Death));
    }

    #[test]
    fn test_effective_speed() {
        let conds = vec![ActiveCondition::new(ConditionKind::Grappled, "Ogre")];
        assert_eq!(effective_speed(&conds, 30), 0);

        let mut conds = Vec::new();
        add_exhaustion(&mut conds, 2, "march");
        assert_eq!(effective_speed(&conds, 30), 15);
    }

    #[test]
    fn test_legacy_field_names_canonicalize() {
        let json = r#"{"condition": "prone", "source": "Shove", "duration": "Permanent"}"#;
        let cond: ActiveCondition = serde_json::from_str(json).unwrap();
        assert!(cond.kind.same_kind(&ConditionKind::Prone));

        let json = r#"{"kind": "dodging", "source": "Dodge action", "duration": 1}"#;
        let cond: ActiveCondition = serde_json::from_str(json).unwrap();
        assert_eq!(
            cond.duration,
            ConditionDuration::Turns {
                n: 1,
                ends_at: TickPhase::EndOfTurn
            }
        );
    }
}
