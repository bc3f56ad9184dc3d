//! Character builder for creating the player's party leader.
//!
//! Covers the three ways of generating scores (rolled 3d6+3, a standard
//! array, or 27-point buy) and assembles a level-1 [`PartyMember`] with
//! class bonuses, starting kit and starting spells.

use crate::class_data::Background;
use crate::dice::Roller;
use crate::equipment;
use crate::items::get_item;
use crate::world::{Ability, CharacterClass, CombatAi, Item, ItemKind, MemberId, PartyMember, Stats};
use thiserror::Error;

/// Method for determining ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbilityMethod {
    /// Roll 3d6+3 for each ability.
    #[default]
    Rolled,
    /// Assign 15, 14, 13, 12, 10, 8.
    StandardArray,
    /// Spend 27 points, scores 8-15.
    PointBuy,
}

impl AbilityMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AbilityMethod::Rolled => "Roll Dice",
            AbilityMethod::StandardArray => "Standard Array",
            AbilityMethod::PointBuy => "Point Buy",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AbilityMethod::Rolled => "Roll 3d6+3 for each stat",
            AbilityMethod::StandardArray => "Choose from a preset",
            AbilityMethod::PointBuy => "Spend 27 points",
        }
    }
}

/// Standard array values.
pub const STANDARD_ARRAY: [i32; 6] = [15, 14, 13, 12, 10, 8];

/// Total points available for point buy.
pub const POINT_BUY_TOTAL: u32 = 27;
pub const POINT_BUY_MIN: i32 = 8;
pub const POINT_BUY_MAX: i32 = 15;

/// Cumulative point-buy cost of a score.
pub fn point_buy_cost(score: i32) -> Option<u32> {
    match score {
        8 => Some(0),
        9 => Some(1),
        10 => Some(2),
        11 => Some(3),
        12 => Some(4),
        13 => Some(5),
        14 => Some(7),
        15 => Some(9),
        _ => None,
    }
}

/// Cost of raising a score by one from `score`.
fn step_cost(score: i32) -> u32 {
    if score >= 13 {
        2
    } else {
        1
    }
}

/// Error from character building.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuilderError {
    #[error("Character name is required")]
    MissingName,
    #[error("Class selection is required")]
    MissingClass,
    #[error("Ability scores are required")]
    MissingAbilityScores,
    #[error("{ability} score {score} is out of range ({POINT_BUY_MIN}-{POINT_BUY_MAX})")]
    ScoreOutOfRange { ability: Ability, score: i32 },
    #[error("Total point cost {spent} exceeds maximum {POINT_BUY_TOTAL}")]
    OverBudget { spent: u32 },
    #[error("Not enough points to raise {ability} (need {cost}, have {remaining})")]
    NotEnoughPoints { ability: Ability, cost: u32, remaining: u32 },
}

// ============================================================================
// Point Buy
// ============================================================================

/// Interactive point-buy allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointBuy {
    scores: Stats,
    remaining: u32,
}

impl Default for PointBuy {
    fn default() -> Self {
        Self::new()
    }
}

impl PointBuy {
    /// All scores at 8 with the full budget.
    pub fn new() -> Self {
        Self {
            scores: Stats::uniform(POINT_BUY_MIN),
            remaining: POINT_BUY_TOTAL,
        }
    }

    pub fn scores(&self) -> Stats {
        self.scores
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Raise an ability by one, paying 1 point below 13 and 2 from 13 up.
    pub fn raise(&mut self, ability: Ability) -> Result<u32, BuilderError> {
        let score = self.scores.get(ability);
        if score >= POINT_BUY_MAX {
            return Err(BuilderError::ScoreOutOfRange {
                ability,
                score: score + 1,
            });
        }
        let cost = step_cost(score);
        if cost > self.remaining {
            return Err(BuilderError::NotEnoughPoints {
                ability,
                cost,
                remaining: self.remaining,
            });
        }
        self.scores.set(ability, score + 1);
        self.remaining -= cost;
        Ok(cost)
    }

    /// Lower an ability by one, refunding what the last raise cost.
    pub fn lower(&mut self, ability: Ability) -> Result<u32, BuilderError> {
        let score = self.scores.get(ability);
        if score <= POINT_BUY_MIN {
            return Err(BuilderError::ScoreOutOfRange {
                ability,
                score: score - 1,
            });
        }
        let refund = step_cost(score - 1);
        self.scores.set(ability, score - 1);
        self.remaining += refund;
        Ok(refund)
    }
}

/// Validate point buy scores.
pub fn validate_point_buy(scores: &Stats) -> Result<(), BuilderError> {
    let mut spent = 0;

    for ability in Ability::all() {
        let score = scores.get(ability);
        match point_buy_cost(score) {
            Some(cost) => spent += cost,
            None => return Err(BuilderError::ScoreOutOfRange { ability, score }),
        }
    }

    if spent > POINT_BUY_TOTAL {
        return Err(BuilderError::OverBudget { spent });
    }

    Ok(())
}

/// Roll 3d6+3 for each ability.
pub fn roll_stats(roller: &mut dyn Roller) -> Stats {
    let mut stats = Stats::default();
    for ability in Ability::all() {
        stats.set(ability, roller.roll_many(6, 3) as i32 + 3);
    }
    stats
}

/// Assign the standard array in the given ability order (highest first).
pub fn standard_array(order: [Ability; 6]) -> Stats {
    let mut stats = Stats::default();
    for (value, ability) in STANDARD_ARRAY.into_iter().zip(order) {
        stats.set(ability, value);
    }
    stats
}

// ============================================================================
// Builder
// ============================================================================

/// Tags that mark the player as touched by the dungeon's story.
pub const SYMBOLIC_TAGS: [&str; 7] = [
    "Cursed", "Blessed", "Witness", "Marked", "Chosen", "Forsaken", "Haunted",
];

/// Builder for the player character.
#[derive(Debug, Clone, Default)]
pub struct CharacterBuilder {
    name: Option<String>,
    class: Option<CharacterClass>,
    background: Background,
    ability_scores: Option<Stats>,
    ability_method: AbilityMethod,
    portrait: Option<String>,
}

impl CharacterBuilder {
    /// Create a new character builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the character's name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the character's class.
    pub fn class(mut self, class: CharacterClass) -> Self {
        self.class = Some(class);
        self
    }

    /// Set the character's background.
    pub fn background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn portrait(mut self, portrait: impl Into<String>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }

    /// Use rolled or hand-picked scores without point-buy validation.
    pub fn ability_scores(mut self, scores: Stats) -> Self {
        self.ability_scores = Some(scores);
        self.ability_method = AbilityMethod::Rolled;
        self
    }

    /// Use the standard array in the given order.
    pub fn standard_array(mut self, order: [Ability; 6]) -> Self {
        self.ability_scores = Some(standard_array(order));
        self.ability_method = AbilityMethod::StandardArray;
        self
    }

    /// Use point-buy scores; validated on build.
    pub fn point_buy(mut self, scores: Stats) -> Self {
        self.ability_scores = Some(scores);
        self.ability_method = AbilityMethod::PointBuy;
        self
    }

    /// Build the player member. The roller picks the symbolic tag.
    pub fn build(self, roller: &mut dyn Roller) -> Result<PartyMember, BuilderError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or(BuilderError::MissingName)?;
        let class = self.class.ok_or(BuilderError::MissingClass)?;
        let scores = self
            .ability_scores
            .ok_or(BuilderError::MissingAbilityScores)?;

        if self.ability_method == AbilityMethod::PointBuy {
            validate_point_buy(&scores)?;
        }

        let class_data = class.data();
        let background_data = self.background.data();

        let mut base_stats = scores;
        for (ability, bonus) in class_data.stat_bonuses {
            base_stats.add(*ability, *bonus);
        }

        let max_hp = 20 + base_stats.modifier(Ability::Constitution);
        let mut member = PartyMember::new(MemberId::player(), name.trim(), class, base_stats, max_hp);
        member.is_player = true;
        member.loyalty = 100;
        member.combat_ai = CombatAi::Balanced;
        member.portrait = self.portrait.unwrap_or_else(|| "@".to_string());
        member.backstory = background_data.starting_lore.to_string();

        member.inventory = class_data
            .starting_items
            .iter()
            .chain(background_data.items.iter())
            .map(|item_name| starting_item(item_name))
            .collect();

        member.known_spells = class_data
            .starting_spells
            .iter()
            .map(|s| s.to_string())
            .collect();
        member.spell_slots = class.starting_spell_slots();

        member.tags = class_data
            .tags
            .iter()
            .chain(background_data.tags.iter())
            .map(|t| t.to_string())
            .collect();
        member
            .tags
            .push(SYMBOLIC_TAGS[roller.pick(SYMBOLIC_TAGS.len())].to_string());
        member.personality_traits = class_data
            .traits
            .iter()
            .chain(background_data.traits.iter())
            .map(|t| t.to_string())
            .collect();

        member.record_event(format!("Born as {}", class.name()));
        member.record_event(format!("Background: {}", self.background.name()));

        // Starting hp comes from the creation formula, not the level formula.
        equipment::refresh_stats(&mut member);

        Ok(member)
    }
}

/// Catalog copy of a starting item, or a plain keepsake if it is unknown.
fn starting_item(name: &str) -> Item {
    get_item(name).unwrap_or_else(|| {
        Item::new(name, ItemKind::Tool, 10).with_description("Background item")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRoller;

    #[test]
    fn test_point_buy_costs() {
        let mut buy = PointBuy::new();
        assert_eq!(buy.remaining(), 27);

        for _ in 0..4 {
            assert_eq!(buy.raise(Ability::Strength), Ok(1));
        }
        // 12 -> 13 still costs 1
        assert_eq!(buy.raise(Ability::Strength), Ok(1));
        // 13 -> 14 and 14 -> 15 cost 2
        assert_eq!(buy.raise(Ability::Strength), Ok(2));
        assert_eq!(buy.raise(Ability::Strength), Ok(2));
        assert_eq!(buy.scores().strength, 15);
        assert_eq!(buy.remaining(), 18);
        assert_eq!(point_buy_cost(15), Some(27 - buy.remaining()));

        assert!(matches!(
            buy.raise(Ability::Strength),
            Err(BuilderError::ScoreOutOfRange { score: 16, .. })
        ));
    }

    #[test]
    fn test_point_buy_lower_refunds() {
        let mut buy = PointBuy::new();
        assert!(buy.lower(Ability::Wisdom).is_err());

        for _ in 0..6 {
            buy.raise(Ability::Wisdom).unwrap();
        }
        assert_eq!(buy.scores().wisdom, 14);
        assert_eq!(buy.lower(Ability::Wisdom), Ok(2));
        assert_eq!(buy.lower(Ability::Wisdom), Ok(1));
        assert_eq!(buy.remaining(), 27 - 4);
    }

    #[test]
    fn test_point_buy_budget() {
        let mut buy = PointBuy::new();
        for ability in [Ability::Strength, Ability::Dexterity, Ability::Constitution] {
            while buy.scores().get(ability) < 15 {
                buy.raise(ability).unwrap();
            }
        }
        assert_eq!(buy.remaining(), 0);
        assert!(matches!(
            buy.raise(Ability::Intelligence),
            Err(BuilderError::NotEnoughPoints { remaining: 0, .. })
        ));
        assert!(validate_point_buy(&buy.scores()).is_ok());
    }

    #[test]
    fn test_validate_point_buy() {
        assert!(validate_point_buy(&Stats::uniform(8)).is_ok());
        assert_eq!(
            validate_point_buy(&Stats::new(15, 15, 15, 15, 8, 8)),
            Err(BuilderError::OverBudget { spent: 36 })
        );
        assert!(matches!(
            validate_point_buy(&Stats::new(16, 8, 8, 8, 8, 8)),
            Err(BuilderError::ScoreOutOfRange { score: 16, .. })
        ));
    }

    #[test]
    fn test_roll_stats_is_3d6_plus_3() {
        let mut dice = ScriptedRoller::new([1, 1, 1, 6, 6, 6]);
        let stats = roll_stats(&mut dice);
        assert_eq!(stats.strength, 6);
        assert_eq!(stats.dexterity, 21);
    }

    #[test]
    fn test_build_mage() {
        let mut dice = ScriptedRoller::new([2]);
        let mage = CharacterBuilder::new()
            .name("Morgana")
            .class(CharacterClass::Mage)
            .background(Background::Scholar)
            .standard_array([
                Ability::Intelligence,
                Ability::Constitution,
                Ability::Dexterity,
                Ability::Wisdom,
                Ability::Strength,
                Ability::Charisma,
            ])
            .build(&mut dice)
            .expect("Should build successfully");

        assert_eq!(mage.id, MemberId::player());
        assert!(mage.is_player);
        // INT 15 + 2 class bonus
        assert_eq!(mage.base_stats.intelligence, 17);
        assert_eq!(mage.stats, mage.base_stats);
        // 20 + CON mod (+2 from 14)
        assert_eq!(mage.max_hp(), 22);
        assert_eq!(mage.hp(), 22);
        // 10 + DEX mod (+1 from 13)
        assert_eq!(mage.armor_class, 11);
        assert!(mage.knows_spell("Magic Missile"));
        assert_eq!(mage.spell_slots.len(), 1);
        assert_eq!(mage.spell_slots[0].total, 2);
        assert!(mage.tags.contains(&"Blessed".to_string()));
        assert!(mage.inventory.iter().any(|i| i.name == "Lantern"));
    }

    #[test]
    fn test_build_warrior_has_no_spells() {
        let mut dice = ScriptedRoller::new([1]);
        let warrior = CharacterBuilder::new()
            .name("Brakka")
            .class(CharacterClass::Warrior)
            .ability_scores(Stats::new(14, 12, 13, 10, 10, 8))
            .build(&mut dice)
            .unwrap();
        assert!(warrior.known_spells.is_empty());
        assert!(warrior.spell_slots.is_empty());
        assert_eq!(warrior.base_stats.strength, 16);
        assert_eq!(warrior.carried_weapon().map(|w| w.name.as_str()), Some("Longsword"));
    }

    #[test]
    fn test_missing_fields() {
        let mut dice = ScriptedRoller::new([1]);
        let result = CharacterBuilder::new()
            .class(CharacterClass::Rogue)
            .ability_scores(Stats::default())
            .build(&mut dice);
        assert_eq!(result.unwrap_err(), BuilderError::MissingName);

        let result = CharacterBuilder::new()
            .name("Nameless")
            .ability_scores(Stats::default())
            .build(&mut dice);
        assert_eq!(result.unwrap_err(), BuilderError::MissingClass);

        let result = CharacterBuilder::new()
            .name("Greedy")
            .class(CharacterClass::Rogue)
            .point_buy(Stats::uniform(15))
            .build(&mut dice);
        assert!(matches!(result, Err(BuilderError::OverBudget { .. })));
    }
}
