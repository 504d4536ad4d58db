//! Dice rolling.
//!
//! Supports the combat notation subset `NdS+M` / `NdS-M`, d20 rolls with
//! advantage and disadvantage, and detailed roll records suitable for the
//! action log.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Clone, Error)]
pub enum DiceError {
    #[error("invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("invalid die size: d{0}")]
    InvalidDieSize(u32),
}

/// Advantage state for d20 rolls.
///
/// `Both` models an attacker who has picked up an advantage source and a
/// disadvantage source at the dice layer: two dice are thrown and the first
/// is kept. Resolver code normally collapses that case to `Normal` with
/// [`AdvantageMode::combine`] before reaching the dice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AdvantageMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
    Both,
}

impl AdvantageMode {
    /// Build a mode from independent advantage/disadvantage flags.
    pub fn from_flags(advantage: bool, disadvantage: bool) -> AdvantageMode {
        match (advantage, disadvantage) {
            (true, true) => AdvantageMode::Normal,
            (true, false) => AdvantageMode::Advantage,
            (false, true) => AdvantageMode::Disadvantage,
            (false, false) => AdvantageMode::Normal,
        }
    }

    /// Combine two modes; advantage and disadvantage cancel to normal.
    pub fn combine(self, other: AdvantageMode) -> AdvantageMode {
        match (self, other) {
            (AdvantageMode::Normal, x) | (x, AdvantageMode::Normal) => x,
            (AdvantageMode::Both, _) | (_, AdvantageMode::Both) => AdvantageMode::Normal,
            (AdvantageMode::Advantage, AdvantageMode::Disadvantage) => AdvantageMode::Normal,
            (AdvantageMode::Disadvantage, AdvantageMode::Advantage) => AdvantageMode::Normal,
            (AdvantageMode::Advantage, AdvantageMode::Advantage) => AdvantageMode::Advantage,
            (AdvantageMode::Disadvantage, AdvantageMode::Disadvantage) => {
                AdvantageMode::Disadvantage
            }
        }
    }
}

/// Standard die types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DieType {
    D4,
    D6,
    D8,
    D10,
    D12,
    D20,
    D100,
}

impl DieType {
    pub fn sides(&self) -> u32 {
        match self {
            DieType::D4 => 4,
            DieType::D6 => 6,
            DieType::D8 => 8,
            DieType::D10 => 10,
            DieType::D12 => 12,
            DieType::D20 => 20,
            DieType::D100 => 100,
        }
    }

    pub fn from_sides(sides: u32) -> Option<DieType> {
        match sides {
            4 => Some(DieType::D4),
            6 => Some(DieType::D6),
            8 => Some(DieType::D8),
            10 => Some(DieType::D10),
            12 => Some(DieType::D12),
            20 => Some(DieType::D20),
            100 => Some(DieType::D100),
            _ => None,
        }
    }
}

impl fmt::Display for DieType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.sides())
    }
}

/// A parsed dice expression (e.g. `2d6+3`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub count: u32,
    pub die: DieType,
    pub modifier: i32,
    pub original: String,
}

impl DiceExpression {
    /// Parse combat dice notation: `NdS`, `NdS+M` or `NdS-M`.
    ///
    /// Case-insensitive; surrounding whitespace is trimmed. `N` defaults to 1
    /// when omitted. Sides must be one of 4, 6, 8, 10, 12, 20, 100.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let trimmed = notation.trim().to_lowercase();
        if trimmed.is_empty() {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }

        let d_pos = trimmed
            .find('d')
            .ok_or_else(|| DiceError::InvalidNotation(notation.to_string()))?;

        let count_str = trimmed[..d_pos].trim();
        let count: u32 = if count_str.is_empty() {
            1
        } else {
            count_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?
        };
        if count == 0 {
            return Err(DiceError::InvalidNotation(notation.to_string()));
        }

        let rest = &trimmed[d_pos + 1..];
        let (sides_str, modifier) = if let Some(pos) = rest.find(|c| c == '+' || c == '-') {
            let sign: i32 = if rest.as_bytes()[pos] == b'+' { 1 } else { -1 };
            let value: i32 = rest[pos + 1..]
                .trim()
                .parse()
                .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
            (rest[..pos].trim(), sign * value)
        } else {
            (rest.trim(), 0)
        };

        let sides: u32 = sides_str
            .parse()
            .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
        let die = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

        Ok(DiceExpression {
            count,
            die,
            modifier,
            original: trimmed,
        })
    }

    /// Roll the expression with a specific RNG.
    pub fn roll<R: Rng>(&self, rng: &mut R) -> DiceRoll {
        execute(rng, self.count, self.die, self.modifier, AdvantageMode::Normal)
    }

    /// Roll applying an advantage mode (only meaningful for a single d20).
    pub fn roll_with_advantage<R: Rng>(&self, rng: &mut R, mode: AdvantageMode) -> DiceRoll {
        execute(rng, self.count, self.die, self.modifier, mode)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiceExpression::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Detailed record of one dice execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Notation the roll came from, e.g. `1d20+5`.
    pub notation: String,
    /// Every die thrown, in throw order (two entries for advantage rolls).
    pub rolls: Vec<u32>,
    /// Sum of the kept dice before the modifier.
    pub natural: u32,
    pub modifier: i32,
    pub total: i32,
    /// The advantage mode actually applied to the roll.
    pub advantage: AdvantageMode,
    pub crit_hit: bool,
    pub crit_miss: bool,
}

impl fmt::Display for DiceRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.notation, self.total)
    }
}

/// Roll a single die, uniform in `1..=sides` of the given type.
pub fn roll_die<R: Rng>(rng: &mut R, die: DieType) -> u32 {
    rng.gen_range(1..=die.sides())
}

/// Roll a d20 under an advantage mode.
///
/// Returns the kept value and the raw throws. `Normal` throws once; the
/// other modes throw twice, keeping the higher (`Advantage`), the lower
/// (`Disadvantage`), or the first (`Both`).
pub fn roll_d20_adv<R: Rng>(rng: &mut R, mode: AdvantageMode) -> (u32, (u32, Option<u32>)) {
    let first = rng.gen_range(1..=20u32);
    match mode {
        AdvantageMode::Normal => (first, (first, None)),
        AdvantageMode::Advantage => {
            let second = rng.gen_range(1..=20u32);
            (first.max(second), (first, Some(second)))
        }
        AdvantageMode::Disadvantage => {
            let second = rng.gen_range(1..=20u32);
            (first.min(second), (first, Some(second)))
        }
        AdvantageMode::Both => {
            let second = rng.gen_range(1..=20u32);
            (first, (first, Some(second)))
        }
    }
}

/// Execute a dice pool and return the detailed record.
///
/// Advantage modes apply only when rolling exactly one d20; crit flags are
/// set from the natural die in that same case, before the modifier.
pub fn execute<R: Rng>(
    rng: &mut R,
    count: u32,
    die: DieType,
    modifier: i32,
    mode: AdvantageMode,
) -> DiceRoll {
    let single_d20 = count == 1 && die == DieType::D20;
    let effective_mode = if single_d20 { mode } else { AdvantageMode::Normal };

    let (rolls, natural) = if single_d20 && effective_mode != AdvantageMode::Normal {
        let (kept, (first, second)) = roll_d20_adv(rng, effective_mode);
        let mut rolls = vec![first];
        if let Some(second) = second {
            rolls.push(second);
        }
        (rolls, kept)
    } else {
        let rolls: Vec<u32> = (0..count).map(|_| roll_die(rng, die)).collect();
        let natural = rolls.iter().sum();
        (rolls, natural)
    };

    let modifier_str = match modifier {
        0 => String::new(),
        m if m > 0 => format!("+{m}"),
        m => m.to_string(),
    };

    DiceRoll {
        notation: format!("{count}{die}{modifier_str}"),
        rolls,
        natural,
        modifier,
        total: natural as i32 + modifier,
        advantage: effective_mode,
        crit_hit: single_d20 && natural == 20,
        crit_miss: single_d20 && natural == 1,
    }
}

/// Parse and roll in one step.
pub fn roll_notation<R: Rng>(rng: &mut R, notation: &str) -> Result<DiceRoll, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll(rng))
}

/// Roll a damage expression, doubling only the dice count on a critical.
/// The flat modifier is never doubled.
pub fn roll_damage<R: Rng>(rng: &mut R, expr: &DiceExpression, critical: bool) -> DiceRoll {
    let count = if critical { expr.count * 2 } else { expr.count };
    execute(rng, count, expr.die, expr.modifier, AdvantageMode::Normal)
}

/// A damage amount that is either a dice expression or a flat value
/// (an unarmed strike deals a flat 1 + STR).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DamageFormula {
    Flat(i32),
    Dice(String),
}

impl DamageFormula {
    /// Roll the formula. Flat values ignore criticals entirely; dice double
    /// their count per [`roll_damage`].
    pub fn roll<R: Rng>(&self, rng: &mut R, critical: bool) -> Result<DiceRoll, DiceError> {
        match self {
            DamageFormula::Flat(value) => Ok(DiceRoll {
                notation: value.to_string(),
                rolls: Vec::new(),
                natural: 0,
                modifier: *value,
                total: *value,
                advantage: AdvantageMode::Normal,
                crit_hit: false,
                crit_miss: false,
            }),
            DamageFormula::Dice(notation) => {
                let expr = DiceExpression::parse(notation)?;
                Ok(roll_damage(rng, &expr, critical))
            }
        }
    }
}

impl fmt::Display for DamageFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageFormula::Flat(value) => write!(f, "{value}"),
            DamageFormula::Dice(notation) => write!(f, "{notation}"),
        }
    }
}
