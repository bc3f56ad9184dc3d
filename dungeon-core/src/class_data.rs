//! Class, background and companion data for character creation.
//!
//! Starting kits, stat bonuses, starting spells, the spell slot
//! progression, backgrounds and the roster of recruitable companions.

use crate::world::{Ability, CharacterClass, CombatAi, SpellSlot, Stats};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Class-specific data for character creation.
pub struct ClassData {
    /// Bonuses added on top of the generated scores.
    pub stat_bonuses: &'static [(Ability, i32)],
    /// Catalog names of the starting inventory.
    pub starting_items: &'static [&'static str],
    /// Spells known at level 1.
    pub starting_spells: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub traits: &'static [&'static str],
}

impl CharacterClass {
    /// Get class data for character creation.
    pub fn data(&self) -> ClassData {
        match self {
            CharacterClass::Warrior => ClassData {
                stat_bonuses: &[(Ability::Strength, 2), (Ability::Constitution, 1)],
                starting_items: &["Longsword", "Leather Armor", "Minor Healing Potion"],
                starting_spells: &[],
                tags: &["Steadfast"],
                traits: &["Brave", "Direct"],
            },
            CharacterClass::Rogue => ClassData {
                stat_bonuses: &[(Ability::Dexterity, 2), (Ability::Charisma, 1)],
                starting_items: &["Iron Dagger", "Thieves' Tools", "Minor Healing Potion"],
                starting_spells: &[],
                tags: &["Shadowed"],
                traits: &["Cunning", "Wary"],
            },
            CharacterClass::Ranger => ClassData {
                stat_bonuses: &[(Ability::Dexterity, 1), (Ability::Wisdom, 2)],
                starting_items: &["Shortbow", "Leather Boots", "Rope (50 ft)"],
                starting_spells: &[],
                tags: &["Wanderer"],
                traits: &["Patient", "Observant"],
            },
            CharacterClass::Mage => ClassData {
                stat_bonuses: &[(Ability::Intelligence, 2), (Ability::Wisdom, 1)],
                starting_items: &["Wooden Staff", "Simple Robes", "Mana Potion"],
                starting_spells: &["Light", "Mage Hand", "Magic Missile", "Shield"],
                tags: &["Arcane"],
                traits: &["Curious", "Proud"],
            },
            CharacterClass::Cleric => ClassData {
                stat_bonuses: &[(Ability::Wisdom, 2), (Ability::Constitution, 1)],
                starting_items: &["Warhammer", "Holy Symbol", "Healing Potion"],
                starting_spells: &["Light", "Sacred Flame", "Cure Light Wounds", "Bless"],
                tags: &["Faithful"],
                traits: &["Compassionate", "Devout"],
            },
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "A master of arms who meets the dark head-on",
            CharacterClass::Rogue => "A quick blade who trusts shadows more than people",
            CharacterClass::Ranger => "A tracker at home in wild and buried places alike",
            CharacterClass::Mage => "A scholar of the arcane who bends force and flame",
            CharacterClass::Cleric => "A vessel of divine power who mends and smites",
        }
    }

    /// Spell slots for a level. Non-casters have none.
    pub fn spell_slots_for_level(&self, level: u32) -> Vec<SpellSlot> {
        let first_level_total = match self {
            CharacterClass::Mage => (level + 1).min(4),
            CharacterClass::Cleric => level.min(4),
            _ => return Vec::new(),
        };

        let mut slots = Vec::new();
        if level >= 1 {
            slots.push(SpellSlot::new(1, first_level_total as u8));
        }
        if level >= 3 {
            slots.push(SpellSlot::new(2, (level / 2).min(3) as u8));
        }
        if level >= 5 {
            slots.push(SpellSlot::new(3, (level / 3).min(3) as u8));
        }
        if level >= 7 {
            slots.push(SpellSlot::new(4, (level / 4).min(3) as u8));
        }
        if level >= 9 {
            slots.push(SpellSlot::new(5, (level / 5).min(2) as u8));
        }
        slots
    }

    /// Slots a freshly created caster starts with.
    pub fn starting_spell_slots(&self) -> Vec<SpellSlot> {
        if self.is_spellcaster() {
            vec![SpellSlot::new(1, 2)]
        } else {
            Vec::new()
        }
    }
}

// ============================================================================
// Backgrounds
// ============================================================================

/// Character backgrounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Background {
    #[default]
    Wanderer,
    Noble,
    Acolyte,
    Scholar,
    Outcast,
}

/// Data a background contributes to a new character.
pub struct BackgroundData {
    pub gold: u32,
    pub items: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub traits: &'static [&'static str],
    pub starting_lore: &'static str,
}

impl Background {
    pub fn name(&self) -> &'static str {
        match self {
            Background::Wanderer => "Wanderer",
            Background::Noble => "Noble",
            Background::Acolyte => "Acolyte",
            Background::Scholar => "Scholar",
            Background::Outcast => "Outcast",
        }
    }

    pub fn all() -> [Background; 5] {
        [
            Background::Wanderer,
            Background::Noble,
            Background::Acolyte,
            Background::Scholar,
            Background::Outcast,
        ]
    }

    pub fn parse(s: &str) -> Option<Background> {
        Background::all()
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
    }

    pub fn data(&self) -> BackgroundData {
        match self {
            Background::Wanderer => BackgroundData {
                gold: 10,
                items: &["Torch"],
                tags: &["Rootless"],
                traits: &["Restless"],
                starting_lore: "Every road you walked led, in the end, to this stair into the dark.",
            },
            Background::Noble => BackgroundData {
                gold: 100,
                items: &[],
                tags: &["Highborn"],
                traits: &["Commanding"],
                starting_lore: "Your family's name opens doors above. Below, it opens nothing.",
            },
            Background::Acolyte => BackgroundData {
                gold: 25,
                items: &["Holy Symbol"],
                tags: &["Devoted"],
                traits: &["Pious"],
                starting_lore: "The temple sent you to consecrate what was lost beneath the catacombs.",
            },
            Background::Scholar => BackgroundData {
                gold: 40,
                items: &["Lantern"],
                tags: &["Learned"],
                traits: &["Inquisitive"],
                starting_lore: "A half-burned map in a library margin marked this place. You had to know.",
            },
            Background::Outcast => BackgroundData {
                gold: 0,
                items: &["Crowbar"],
                tags: &["Exiled"],
                traits: &["Self-reliant"],
                starting_lore: "No one above will miss you. Perhaps something below will remember you.",
            },
        }
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Recruitable Companions
// ============================================================================

/// A companion who can be hired into the party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecruitableNpc {
    pub name: String,
    pub class: CharacterClass,
    pub stats: Stats,
    pub recruitment_cost: u32,
    /// Minimum party reputation before the companion agrees to join.
    pub loyalty_requirement: i32,
    pub combat_ai: CombatAi,
    pub tags: Vec<String>,
    pub traits: Vec<String>,
    pub portrait: String,
    pub backstory: String,
}

/// The companions available for hire.
pub fn recruitable_npcs() -> Vec<RecruitableNpc> {
    vec![
        RecruitableNpc {
            name: "Brother Aldric".to_string(),
            class: CharacterClass::Cleric,
            stats: Stats::new(11, 10, 14, 12, 16, 13),
            recruitment_cost: 50,
            loyalty_requirement: 0,
            combat_ai: CombatAi::Support,
            tags: vec!["Healer".to_string()],
            traits: vec!["Gentle".to_string(), "Steadfast".to_string()],
            portrait: "⛨".to_string(),
            backstory: "I tended the dying in these halls once. I will not leave the living to them."
                .to_string(),
        },
        RecruitableNpc {
            name: "Kessa Ironhand".to_string(),
            class: CharacterClass::Warrior,
            stats: Stats::new(16, 12, 15, 9, 10, 8),
            recruitment_cost: 75,
            loyalty_requirement: 0,
            combat_ai: CombatAi::Aggressive,
            tags: vec!["Mercenary".to_string()],
            traits: vec!["Blunt".to_string()],
            portrait: "⚔".to_string(),
            backstory: "Coin first, questions never. Point me at whatever screams loudest."
                .to_string(),
        },
        RecruitableNpc {
            name: "Veyla the Grey".to_string(),
            class: CharacterClass::Mage,
            stats: Stats::new(8, 13, 11, 17, 13, 10),
            recruitment_cost: 120,
            loyalty_requirement: 10,
            combat_ai: CombatAi::Balanced,
            tags: vec!["Scholar".to_string()],
            traits: vec!["Aloof".to_string(), "Precise".to_string()],
            portrait: "✶".to_string(),
            backstory: "My mentor descended with a lantern and a question. I intend to find both."
                .to_string(),
        },
        RecruitableNpc {
            name: "Tamsin Reed".to_string(),
            class: CharacterClass::Ranger,
            stats: Stats::new(12, 16, 13, 11, 14, 9),
            recruitment_cost: 90,
            loyalty_requirement: 5,
            combat_ai: CombatAi::Defensive,
            tags: vec!["Tracker".to_string()],
            traits: vec!["Quiet".to_string()],
            portrait: "➶".to_string(),
            backstory: "Something down here took my brother. It left tracks. I follow tracks."
                .to_string(),
        },
    ]
}

/// Find a companion on the roster by name (case-insensitive).
pub fn find_recruit(name: &str) -> Option<RecruitableNpc> {
    recruitable_npcs()
        .into_iter()
        .find(|npc| npc.name.eq_ignore_ascii_case(name.trim()))
}
