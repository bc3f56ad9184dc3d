//! Spell catalog.
//!
//! Cantrips through third-level spells for the two spellcasting classes.
//! Lookups accept display names ("Magic Missile") as well as the
//! snake_case references scrolls carry ("magic_missile").

use crate::world::CharacterClass;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Schools of magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpellSchool {
    Abjuration,
    Conjuration,
    Enchantment,
    Evocation,
    Illusion,
}

impl SpellSchool {
    pub fn name(&self) -> &'static str {
        match self {
            SpellSchool::Abjuration => "Abjuration",
            SpellSchool::Conjuration => "Conjuration",
            SpellSchool::Enchantment => "Enchantment",
            SpellSchool::Evocation => "Evocation",
            SpellSchool::Illusion => "Illusion",
        }
    }
}

/// A catalog spell. Static; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellData {
    pub name: String,
    /// 0 for cantrips, which never use a slot.
    pub level: u8,
    pub school: SpellSchool,
    pub casting_time: String,
    pub range: String,
    pub duration: String,
    pub description: String,
    /// Damage in dice notation.
    pub damage: Option<String>,
    /// Healing in dice notation.
    pub healing: Option<String>,
    /// Non-numeric effect text.
    pub effect: Option<String>,
    pub classes: Vec<CharacterClass>,
}

impl SpellData {
    pub fn is_cantrip(&self) -> bool {
        self.level == 0
    }

    pub fn available_to(&self, class: CharacterClass) -> bool {
        self.classes.contains(&class)
    }
}

// ============================================================================
// Spell Database
// ============================================================================

static SPELL_DATABASE: LazyLock<HashMap<String, SpellData>> = LazyLock::new(build_spell_database);

/// Lookup key: lower case, underscores read as spaces.
fn spell_key(name: &str) -> String {
    name.trim().to_lowercase().replace('_', " ")
}

/// Look up a spell by name (case-insensitive, snake_case accepted).
pub fn get_spell(name: &str) -> Option<&'static SpellData> {
    SPELL_DATABASE.get(&spell_key(name))
}

/// Spells available to a class, ordered by level then name.
pub fn spells_for_class(class: CharacterClass) -> Vec<&'static SpellData> {
    let mut spells: Vec<_> = SPELL_DATABASE
        .values()
        .filter(|s| s.available_to(class))
        .collect();
    spells.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.name.cmp(&b.name)));
    spells
}

struct SpellDef {
    name: &'static str,
    level: u8,
    school: SpellSchool,
    casting_time: &'static str,
    range: &'static str,
    duration: &'static str,
    description: &'static str,
    damage: Option<&'static str>,
    healing: Option<&'static str>,
    effect: Option<&'static str>,
    classes: &'static [CharacterClass],
}

const MAGE: &[CharacterClass] = &[CharacterClass::Mage];
const CLERIC: &[CharacterClass] = &[CharacterClass::Cleric];
const BOTH: &[CharacterClass] = &[CharacterClass::Cleric, CharacterClass::Mage];

const SPELLS: &[SpellDef] = &[
    // Cantrips
    SpellDef {
        name: "Light",
        level: 0,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Touch",
        duration: "1 hour",
        description: "Creates a bright light on an object",
        damage: None,
        healing: None,
        effect: None,
        classes: BOTH,
    },
    SpellDef {
        name: "Mage Hand",
        level: 0,
        school: SpellSchool::Conjuration,
        casting_time: "1 action",
        range: "30 feet",
        duration: "1 minute",
        description: "Creates a spectral hand that can manipulate objects",
        damage: None,
        healing: None,
        effect: None,
        classes: MAGE,
    },
    SpellDef {
        name: "Sacred Flame",
        level: 0,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "60 feet",
        duration: "Instantaneous",
        description: "Divine flame descends on a creature",
        damage: Some("1d8"),
        healing: None,
        effect: None,
        classes: CLERIC,
    },
    SpellDef {
        name: "Eldritch Blast",
        level: 0,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "120 feet",
        duration: "Instantaneous",
        description: "A beam of crackling energy",
        damage: Some("1d10"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    // Level 1
    SpellDef {
        name: "Magic Missile",
        level: 1,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "120 feet",
        duration: "Instantaneous",
        description: "Creates 3 darts of magical force",
        damage: Some("3d4+3"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    SpellDef {
        name: "Cure Light Wounds",
        level: 1,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Touch",
        duration: "Instantaneous",
        description: "Heals a creature",
        damage: None,
        healing: Some("1d8+3"),
        effect: None,
        classes: CLERIC,
    },
    SpellDef {
        name: "Shield",
        level: 1,
        school: SpellSchool::Abjuration,
        casting_time: "1 reaction",
        range: "Self",
        duration: "1 round",
        description: "+5 AC until start of next turn",
        damage: None,
        healing: None,
        effect: Some("+5 AC"),
        classes: MAGE,
    },
    SpellDef {
        name: "Bless",
        level: 1,
        school: SpellSchool::Enchantment,
        casting_time: "1 action",
        range: "30 feet",
        duration: "1 minute",
        description: "Blesses up to 3 creatures",
        damage: None,
        healing: None,
        effect: Some("+1d4 to attack rolls and saves"),
        classes: CLERIC,
    },
    SpellDef {
        name: "Burning Hands",
        level: 1,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Self (15-foot cone)",
        duration: "Instantaneous",
        description: "A thin sheet of flames shoots forth",
        damage: Some("3d6"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    // Level 2
    SpellDef {
        name: "Scorching Ray",
        level: 2,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "120 feet",
        duration: "Instantaneous",
        description: "Creates 3 rays of fire",
        damage: Some("3 × 2d6"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    SpellDef {
        name: "Cure Moderate Wounds",
        level: 2,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Touch",
        duration: "Instantaneous",
        description: "Heals moderate wounds",
        damage: None,
        healing: Some("2d8+5"),
        effect: None,
        classes: CLERIC,
    },
    SpellDef {
        name: "Hold Person",
        level: 2,
        school: SpellSchool::Enchantment,
        casting_time: "1 action",
        range: "60 feet",
        duration: "1 minute",
        description: "Paralyzes a humanoid",
        damage: None,
        healing: None,
        effect: Some("Target is paralyzed"),
        classes: BOTH,
    },
    SpellDef {
        name: "Mirror Image",
        level: 2,
        school: SpellSchool::Illusion,
        casting_time: "1 action",
        range: "Self",
        duration: "1 minute",
        description: "Creates illusory duplicates of yourself",
        damage: None,
        healing: None,
        effect: Some("Creates 3 duplicates"),
        classes: MAGE,
    },
    // Level 3
    SpellDef {
        name: "Fireball",
        level: 3,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "150 feet",
        duration: "Instantaneous",
        description: "A bright flash then a roar of flame",
        damage: Some("8d6"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    SpellDef {
        name: "Cure Serious Wounds",
        level: 3,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Touch",
        duration: "Instantaneous",
        description: "Heals serious wounds",
        damage: None,
        healing: Some("3d8+7"),
        effect: None,
        classes: CLERIC,
    },
    SpellDef {
        name: "Lightning Bolt",
        level: 3,
        school: SpellSchool::Evocation,
        casting_time: "1 action",
        range: "Self (100-foot line)",
        duration: "Instantaneous",
        description: "A stroke of lightning forming a line",
        damage: Some("8d6"),
        healing: None,
        effect: None,
        classes: MAGE,
    },
    SpellDef {
        name: "Dispel Magic",
        level: 3,
        school: SpellSchool::Abjuration,
        casting_time: "1 action",
        range: "120 feet",
        duration: "Instantaneous",
        description: "Dispels magical effects",
        damage: None,
        healing: None,
        effect: Some("Removes magic effects"),
        classes: BOTH,
    },
];

fn build_spell_database() -> HashMap<String, SpellData> {
    SPELLS
        .iter()
        .map(|def| {
            let spell = SpellData {
                name: def.name.to_string(),
                level: def.level,
                school: def.school,
                casting_time: def.casting_time.to_string(),
                range: def.range.to_string(),
                duration: def.duration.to_string(),
                description: def.description.to_string(),
                damage: def.damage.map(str::to_string),
                healing: def.healing.map(str::to_string),
                effect: def.effect.map(str::to_string),
                classes: def.classes.to_vec(),
            };
            (spell_key(def.name), spell)
        })
        .collect()
}
