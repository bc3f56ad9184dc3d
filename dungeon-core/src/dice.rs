//! Dice rolling.
//!
//! Every stochastic decision in the engine goes through a [`Roller`], so a
//! fixed sequence of die faces fully determines an outcome. Dice notation
//! (`XdY+Z`, `N × XdY`) is parsed by [`DiceExpression`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),
    #[error("Invalid die size: {0}")]
    InvalidDieSize(u32),
    #[error("No dice specified")]
    NoDice,
}

// ============================================================================
// Rollers
// ============================================================================

/// Source of uniform die rolls.
pub trait Roller: Send {
    /// Roll a single die, returning a value in `1..=sides`.
    fn roll(&mut self, sides: u32) -> u32;

    /// Sum of `count` independent rolls of a `sides`-sided die.
    fn roll_many(&mut self, sides: u32, count: u32) -> u32 {
        (0..count).map(|_| self.roll(sides)).sum()
    }

    /// Percentile check: true when a d100 lands at or under `percent`.
    fn chance(&mut self, percent: u32) -> bool {
        self.roll(100) <= percent
    }

    /// Uniform index into a collection of `len` elements.
    ///
    /// Returns 0 for empty collections; callers check emptiness first.
    fn pick(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.roll(len as u32) as usize - 1).min(len - 1)
    }
}

/// Roller backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngRoller<R: Rng> {
    rng: R,
}

impl<R: Rng> RngRoller<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl RngRoller<StdRng> {
    /// Roller seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible roller for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> Roller for RngRoller<R> {
    fn roll(&mut self, sides: u32) -> u32 {
        if sides <= 1 {
            return 1;
        }
        self.rng.gen_range(1..=sides)
    }
}

// ============================================================================
// Die types
// ============================================================================

/// Supported die sizes.
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

// ============================================================================
// Expressions
// ============================================================================

/// A single die component of a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceComponent {
    pub count: u32,
    pub die_type: DieType,
}

/// A complete dice expression, e.g. `2d6+3` or `3 × 2d6`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    pub components: Vec<DiceComponent>,
    pub modifier: i32,
    /// Number of independent times the whole expression is rolled and summed.
    /// `3 × 2d6` is three separate 2d6 rolls, six dice in all, as for a spell
    /// that fires three rays of 2d6 each.
    pub repeat: u32,
    pub original: String,
}

impl DiceExpression {
    /// Parse a dice notation string.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let original = notation.trim().to_lowercase();
        if original.is_empty() {
            return Err(DiceError::NoDice);
        }

        let (repeat, body) = Self::split_repeat(&original)?;

        let mut components = Vec::new();
        let mut modifier: i32 = 0;
        let mut current = String::new();
        let mut sign: i32 = 1;

        for ch in body.chars() {
            match ch {
                '+' | '-' => {
                    if !current.is_empty() {
                        Self::parse_component(&current, sign, &mut components, &mut modifier)?;
                        current.clear();
                    }
                    sign = if ch == '+' { 1 } else { -1 };
                }
                ' ' => continue,
                _ => current.push(ch),
            }
        }

        if !current.is_empty() {
            Self::parse_component(&current, sign, &mut components, &mut modifier)?;
        }

        if components.is_empty() && modifier == 0 {
            return Err(DiceError::NoDice);
        }

        Ok(DiceExpression {
            components,
            modifier,
            repeat,
            original,
        })
    }

    /// Split a leading `N ×` / `N x` / `N *` repeat prefix off the body.
    fn split_repeat(notation: &str) -> Result<(u32, &str), DiceError> {
        for separator in ['×', '*', 'x'] {
            if let Some(pos) = notation.find(separator) {
                let head = notation[..pos].trim();
                // "3 x 2d6" has a numeric head; a bare 'x' elsewhere is not a repeat.
                if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
                    let repeat: u32 = head
                        .parse()
                        .map_err(|_| DiceError::InvalidNotation(notation.to_string()))?;
                    if repeat == 0 {
                        return Err(DiceError::NoDice);
                    }
                    return Ok((repeat, &notation[pos + separator.len_utf8()..]));
                }
            }
        }
        Ok((1, notation))
    }

    fn parse_component(
        s: &str,
        sign: i32,
        components: &mut Vec<DiceComponent>,
        modifier: &mut i32,
    ) -> Result<(), DiceError> {
        if let Some(d_pos) = s.find('d') {
            let count_str = &s[..d_pos];
            let sides_str = &s[d_pos + 1..];

            let count: u32 = if count_str.is_empty() {
                1
            } else {
                count_str
                    .parse()
                    .map_err(|_| DiceError::InvalidNotation(s.to_string()))?
            };
            if sign < 0 {
                return Err(DiceError::InvalidNotation(s.to_string()));
            }

            let sides: u32 = sides_str
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            let die_type = DieType::from_sides(sides).ok_or(DiceError::InvalidDieSize(sides))?;

            components.push(DiceComponent { count, die_type });
        } else {
            let value: i32 = s
                .parse()
                .map_err(|_| DiceError::InvalidNotation(s.to_string()))?;
            *modifier += sign * value;
        }

        Ok(())
    }

    /// Roll the expression with the given roller.
    pub fn roll_with(&self, roller: &mut dyn Roller) -> RollResult {
        let mut rolls = Vec::new();
        let mut total = 0;

        for _ in 0..self.repeat {
            for component in &self.components {
                for _ in 0..component.count {
                    let face = roller.roll(component.die_type.sides());
                    rolls.push(face);
                    total += face as i32;
                }
            }
            total += self.modifier;
        }

        RollResult {
            rolls,
            total: total.max(0),
        }
    }

    /// Largest possible total.
    pub fn max_total(&self) -> i32 {
        let dice: i32 = self
            .components
            .iter()
            .map(|c| (c.count * c.die_type.sides()) as i32)
            .sum();
        (dice + self.modifier) * self.repeat as i32
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

/// Result of rolling an expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Individual die faces in roll order.
    pub rolls: Vec<u32>,
    /// Sum of faces plus modifiers, never negative.
    pub total: i32,
}

/// Parse and roll a notation string.
pub fn roll(notation: &str, roller: &mut dyn Roller) -> Result<RollResult, DiceError> {
    let expr = DiceExpression::parse(notation)?;
    Ok(expr.roll_with(roller))
}

/// Ability modifier for a score: `floor((score - 10) / 2)`.
pub fn stat_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}
