//! Game world types.
//!
//! Contains the data model shared by every service: ability scores, items,
//! equipment, party members, the party, enemies, rooms and the dungeon.

use crate::dice::stat_modifier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Stable identifier of a party member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub String);

impl MemberId {
    /// The human-controlled member always uses this id.
    pub fn player() -> Self {
        Self("player".to_string())
    }

    /// Fresh id for a recruited companion.
    pub fn new_npc() -> Self {
        Self(format!("npc_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Ability Scores
// ============================================================================

/// The six ability scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Dexterity,
    Constitution,
    Intelligence,
    Wisdom,
    Charisma,
}

impl Ability {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Ability::Strength => "STR",
            Ability::Dexterity => "DEX",
            Ability::Constitution => "CON",
            Ability::Intelligence => "INT",
            Ability::Wisdom => "WIS",
            Ability::Charisma => "CHA",
        }
    }

    pub fn all() -> [Ability; 6] {
        [
            Ability::Strength,
            Ability::Dexterity,
            Ability::Constitution,
            Ability::Intelligence,
            Ability::Wisdom,
            Ability::Charisma,
        ]
    }

    /// Parse `STR`, `str` or `strength`.
    pub fn parse(s: &str) -> Option<Ability> {
        let lower = s.trim().to_lowercase();
        Ability::all()
            .into_iter()
            .find(|a| a.abbreviation().eq_ignore_ascii_case(&lower) || format!("{a:?}").to_lowercase() == lower)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Ability scores container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub charisma: i32,
}

impl Stats {
    pub fn new(str: i32, dex: i32, con: i32, int: i32, wis: i32, cha: i32) -> Self {
        Self {
            strength: str,
            dexterity: dex,
            constitution: con,
            intelligence: int,
            wisdom: wis,
            charisma: cha,
        }
    }

    /// Every score set to the same value.
    pub fn uniform(value: i32) -> Self {
        Self::new(value, value, value, value, value, value)
    }

    pub fn get(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn set(&mut self, ability: Ability, value: i32) {
        match ability {
            Ability::Strength => self.strength = value,
            Ability::Dexterity => self.dexterity = value,
            Ability::Constitution => self.constitution = value,
            Ability::Intelligence => self.intelligence = value,
            Ability::Wisdom => self.wisdom = value,
            Ability::Charisma => self.charisma = value,
        }
    }

    pub fn add(&mut self, ability: Ability, amount: i32) {
        self.set(ability, self.get(ability) + amount);
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        stat_modifier(self.get(ability))
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::uniform(10)
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = Ability::all()
            .iter()
            .map(|a| format!("{} {}", a.abbreviation(), self.get(*a)))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

// ============================================================================
// Hit Points
// ============================================================================

/// Current and maximum hit points. `current` stays within `0..=maximum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: i32,
    pub maximum: i32,
}

impl HitPoints {
    pub fn new(maximum: i32) -> Self {
        let maximum = maximum.max(0);
        Self {
            current: maximum,
            maximum,
        }
    }

    /// Remove hit points, flooring at zero.
    pub fn take_damage(&mut self, amount: i32) -> DamageResult {
        let before = self.current;
        self.current = (self.current - amount.max(0)).max(0);
        DamageResult {
            damage_taken: before - self.current,
            dropped_to_zero: before > 0 && self.current == 0,
        }
    }

    /// Restore hit points up to the maximum, returning the amount healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let old = self.current;
        self.current = (self.current + amount.max(0)).min(self.maximum);
        self.current - old
    }

    pub fn is_down(&self) -> bool {
        self.current <= 0
    }

    pub fn ratio(&self) -> f64 {
        if self.maximum <= 0 {
            return 0.0;
        }
        (self.current as f64 / self.maximum as f64).max(0.0)
    }

    /// Change the maximum, keeping the current/maximum ratio.
    ///
    /// The new current value is `floor(new_max * current / old_max)`.
    pub fn rescale(&mut self, new_maximum: i32) {
        let new_maximum = new_maximum.max(0);
        if new_maximum == self.maximum {
            return;
        }
        self.current = if self.maximum <= 0 {
            new_maximum
        } else {
            ((new_maximum as i64 * self.current as i64) / self.maximum as i64) as i32
        };
        self.maximum = new_maximum;
        self.current = self.current.clamp(0, self.maximum);
    }
}

/// Result of taking damage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageResult {
    pub damage_taken: i32,
    pub dropped_to_zero: bool,
}

// ============================================================================
// Items
// ============================================================================

/// Fixed set of item type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Robe,
    Helmet,
    Hat,
    Boots,
    Shoes,
    Pants,
    Greaves,
    Ring,
    Necklace,
    Amulet,
    Cloak,
    Cape,
    Shield,
    Consumable,
    Treasure,
    Tool,
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Weapon => "weapon",
            ItemKind::Armor => "armor",
            ItemKind::Robe => "robe",
            ItemKind::Helmet => "helmet",
            ItemKind::Hat => "hat",
            ItemKind::Boots => "boots",
            ItemKind::Shoes => "shoes",
            ItemKind::Pants => "pants",
            ItemKind::Greaves => "greaves",
            ItemKind::Ring => "ring",
            ItemKind::Necklace => "necklace",
            ItemKind::Amulet => "amulet",
            ItemKind::Cloak => "cloak",
            ItemKind::Cape => "cape",
            ItemKind::Shield => "shield",
            ItemKind::Consumable => "consumable",
            ItemKind::Treasure => "treasure",
            ItemKind::Tool => "tool",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// What an item does beyond its plain damage/healing/defense numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemEffect {
    /// Permanent bonus while equipped.
    StatBonus { ability: Ability, amount: i32 },
    /// Bonus for a number of turns after drinking.
    TemporaryStatBonus {
        ability: Ability,
        amount: i32,
        duration: u32,
    },
    /// Refunds this many units of spell-slot usage.
    RestoresMana { amount: u32 },
    /// Casts (scrolls) or teaches (tomes) the named spell.
    GrantsSpell { spell: String },
    /// Defense counts as natural armor rather than deflection.
    NaturalArmor,
}

/// An item. Immutable once drawn from the catalog; the owner holds its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub kind: ItemKind,
    pub description: String,
    pub damage: Option<i32>,
    pub healing: Option<i32>,
    pub defense: Option<i32>,
    pub value: u32,
    pub weight: u32,
    pub rarity: Option<Rarity>,
    pub magical: bool,
    pub effects: Vec<ItemEffect>,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind, value: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            damage: None,
            healing: None,
            defense: None,
            value,
            weight: 0,
            rarity: None,
            magical: false,
            effects: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_damage(mut self, damage: i32) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_healing(mut self, healing: i32) -> Self {
        self.healing = Some(healing);
        self
    }

    pub fn with_defense(mut self, defense: i32) -> Self {
        self.defense = Some(defense);
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_rarity(mut self, rarity: Rarity) -> Self {
        self.rarity = Some(rarity);
        self
    }

    pub fn with_effect(mut self, effect: ItemEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_stat_bonus(self, ability: Ability, amount: i32) -> Self {
        self.with_effect(ItemEffect::StatBonus { ability, amount })
    }

    pub fn magical(mut self) -> Self {
        self.magical = true;
        self
    }

    /// Permanent stat bonuses granted while equipped.
    pub fn stat_bonuses(&self) -> impl Iterator<Item = (Ability, i32)> + '_ {
        self.effects.iter().filter_map(|e| match e {
            ItemEffect::StatBonus { ability, amount } => Some((*ability, *amount)),
            _ => None,
        })
    }

    /// Spell carried by a scroll or tome.
    pub fn spell(&self) -> Option<&str> {
        self.effects.iter().find_map(|e| match e {
            ItemEffect::GrantsSpell { spell } => Some(spell.as_str()),
            _ => None,
        })
    }

    pub fn restores_mana(&self) -> Option<u32> {
        self.effects.iter().find_map(|e| match e {
            ItemEffect::RestoresMana { amount } => Some(*amount),
            _ => None,
        })
    }

    pub fn is_natural_armor(&self) -> bool {
        self.effects.contains(&ItemEffect::NaturalArmor)
    }

    /// True for items with a positive healing value.
    pub fn heals(&self) -> bool {
        self.healing.is_some_and(|h| h > 0)
    }

    pub fn is_consumable(&self) -> bool {
        self.kind == ItemKind::Consumable
    }
}

// ============================================================================
// Equipment
// ============================================================================

/// The fixed set of equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquipmentSlot {
    MainHand,
    OffHand,
    Head,
    Body,
    Legs,
    Feet,
    Ring1,
    Ring2,
    Neck,
    Cloak,
}

impl EquipmentSlot {
    pub const ALL: [EquipmentSlot; 10] = [
        EquipmentSlot::MainHand,
        EquipmentSlot::OffHand,
        EquipmentSlot::Head,
        EquipmentSlot::Body,
        EquipmentSlot::Legs,
        EquipmentSlot::Feet,
        EquipmentSlot::Ring1,
        EquipmentSlot::Ring2,
        EquipmentSlot::Neck,
        EquipmentSlot::Cloak,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            EquipmentSlot::MainHand => "mainHand",
            EquipmentSlot::OffHand => "offHand",
            EquipmentSlot::Head => "head",
            EquipmentSlot::Body => "body",
            EquipmentSlot::Legs => "legs",
            EquipmentSlot::Feet => "feet",
            EquipmentSlot::Ring1 => "ring1",
            EquipmentSlot::Ring2 => "ring2",
            EquipmentSlot::Neck => "neck",
            EquipmentSlot::Cloak => "cloak",
        }
    }

    pub fn parse(s: &str) -> Option<EquipmentSlot> {
        EquipmentSlot::ALL
            .into_iter()
            .find(|slot| slot.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Item kinds this slot accepts.
    pub fn allowed_kinds(&self) -> &'static [ItemKind] {
        match self {
            EquipmentSlot::MainHand | EquipmentSlot::OffHand => {
                &[ItemKind::Weapon, ItemKind::Shield]
            }
            EquipmentSlot::Head => &[ItemKind::Helmet, ItemKind::Hat],
            EquipmentSlot::Body => &[ItemKind::Armor, ItemKind::Robe],
            EquipmentSlot::Legs => &[ItemKind::Pants, ItemKind::Greaves],
            EquipmentSlot::Feet => &[ItemKind::Boots, ItemKind::Shoes],
            EquipmentSlot::Ring1 | EquipmentSlot::Ring2 => &[ItemKind::Ring],
            EquipmentSlot::Neck => &[ItemKind::Necklace, ItemKind::Amulet],
            EquipmentSlot::Cloak => &[ItemKind::Cloak, ItemKind::Cape],
        }
    }

    pub fn accepts(&self, kind: ItemKind) -> bool {
        self.allowed_kinds().contains(&kind)
    }
}

impl fmt::Display for EquipmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Equipped items, at most one per slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    slots: [Option<Item>; 10],
}

impl Equipment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: EquipmentSlot) -> Option<&Item> {
        self.slots[slot.index()].as_ref()
    }

    /// Place an item, returning whatever occupied the slot.
    pub(crate) fn put(&mut self, slot: EquipmentSlot, item: Item) -> Option<Item> {
        self.slots[slot.index()].replace(item)
    }

    pub(crate) fn take(&mut self, slot: EquipmentSlot) -> Option<Item> {
        self.slots[slot.index()].take()
    }

    /// Occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (EquipmentSlot, &Item)> {
        EquipmentSlot::ALL
            .into_iter()
            .filter_map(move |slot| self.get(slot).map(|item| (slot, item)))
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

// ============================================================================
// Spellcasting
// ============================================================================

/// A pool of spell slots of one level. `used` never exceeds `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellSlot {
    pub level: u8,
    pub total: u8,
    pub used: u8,
}

impl SpellSlot {
    pub fn new(level: u8, total: u8) -> Self {
        Self {
            level,
            total,
            used: 0,
        }
    }

    pub fn available(&self) -> u8 {
        self.total.saturating_sub(self.used)
    }
}

// ============================================================================
// Classes and Behaviour Tags
// ============================================================================

/// Character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Rogue,
    Ranger,
    Mage,
    Cleric,
}

impl CharacterClass {
    pub fn name(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Rogue => "Rogue",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Mage => "Mage",
            CharacterClass::Cleric => "Cleric",
        }
    }

    pub fn all() -> [CharacterClass; 5] {
        [
            CharacterClass::Warrior,
            CharacterClass::Rogue,
            CharacterClass::Ranger,
            CharacterClass::Mage,
            CharacterClass::Cleric,
        ]
    }

    pub fn parse(s: &str) -> Option<CharacterClass> {
        CharacterClass::all()
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
    }

    /// Classes that learn spells and hold slots.
    pub fn is_spellcaster(&self) -> bool {
        matches!(self, CharacterClass::Mage | CharacterClass::Cleric)
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Automated combat behaviour of a party member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatAi {
    Aggressive,
    Defensive,
    Support,
    #[default]
    Balanced,
}

/// A timed effect on a member, e.g. from a temporary stat potion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub name: String,
    /// Remaining combat rounds.
    pub duration: u32,
    pub effect: String,
    /// Stat change applied on top of base stats while active.
    pub bonus: Option<(Ability, i32)>,
}

// ============================================================================
// Party Members
// ============================================================================

/// A member of the adventuring party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyMember {
    pub id: MemberId,
    pub name: String,
    pub class: CharacterClass,
    pub portrait: String,
    pub level: u32,
    pub hit_points: HitPoints,
    pub xp: u32,
    pub xp_to_next: u32,
    /// The rolled scores. Never edited after creation.
    pub base_stats: Stats,
    /// Base plus equipment; recomputed by the equipment service.
    pub stats: Stats,
    pub inventory: Vec<Item>,
    pub equipment: Equipment,
    pub armor_class: i32,
    pub spell_slots: Vec<SpellSlot>,
    pub known_spells: Vec<String>,
    pub tags: Vec<String>,
    pub personality_traits: Vec<String>,
    pub is_player: bool,
    pub loyalty: u8,
    pub combat_ai: CombatAi,
    pub status_effects: Vec<StatusEffect>,
    pub backstory: String,
    pub story_events: Vec<String>,
}

impl PartyMember {
    /// A level-1 member with the given scores and hit point maximum.
    pub fn new(
        id: MemberId,
        name: impl Into<String>,
        class: CharacterClass,
        stats: Stats,
        max_hp: i32,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            class,
            portrait: String::new(),
            level: 1,
            hit_points: HitPoints::new(max_hp),
            xp: 0,
            xp_to_next: xp_to_next(1),
            base_stats: stats,
            stats,
            inventory: Vec::new(),
            equipment: Equipment::new(),
            armor_class: 10 + stats.modifier(Ability::Dexterity),
            spell_slots: Vec::new(),
            known_spells: Vec::new(),
            tags: Vec::new(),
            personality_traits: Vec::new(),
            is_player: false,
            loyalty: 100,
            combat_ai: CombatAi::Balanced,
            status_effects: Vec::new(),
            backstory: String::new(),
            story_events: Vec::new(),
        }
    }

    pub fn hp(&self) -> i32 {
        self.hit_points.current
    }

    pub fn max_hp(&self) -> i32 {
        self.hit_points.maximum
    }

    /// Members at zero hit points neither act nor get targeted.
    pub fn is_alive(&self) -> bool {
        self.hit_points.current > 0
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.stats.modifier(ability)
    }

    pub fn knows_spell(&self, name: &str) -> bool {
        self.known_spells.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// First weapon carried in the inventory.
    pub fn carried_weapon(&self) -> Option<&Item> {
        self.inventory.iter().find(|i| i.kind == ItemKind::Weapon)
    }

    /// Index of the first inventory item with a healing value.
    pub fn healing_item_index(&self) -> Option<usize> {
        self.inventory.iter().position(Item::heals)
    }

    pub fn record_event(&mut self, event: impl Into<String>) {
        self.story_events.push(event.into());
    }
}

/// Experience needed for the next level: `100 + (level - 1) * 50`.
pub fn xp_to_next(level: u32) -> u32 {
    100 + level.saturating_sub(1) * 50
}

/// Level reached with a total amount of experience: `floor(xp / 100) + 1`.
pub fn level_for_xp(xp: u32) -> u32 {
    xp / 100 + 1
}

// ============================================================================
// Party
// ============================================================================

/// Maximum members in a party.
pub const MAX_PARTY_SIZE: usize = 4;

/// The adventuring party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Party {
    pub members: Vec<PartyMember>,
    pub shared_gold: u32,
    pub shared_inventory: Vec<Item>,
    /// Member ids in turn order; kept in sync with `members`.
    pub formation: Vec<MemberId>,
    pub morale: u8,
    pub reputation: i32,
}

impl Party {
    pub fn member(&self, id: &MemberId) -> Option<&PartyMember> {
        self.members.iter().find(|m| &m.id == id)
    }

    pub fn member_mut(&mut self, id: &MemberId) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| &m.id == id)
    }

    pub fn player(&self) -> Option<&PartyMember> {
        self.members.iter().find(|m| m.is_player)
    }

    pub fn player_mut(&mut self) -> Option<&mut PartyMember> {
        self.members.iter_mut().find(|m| m.is_player)
    }

    pub fn alive_members(&self) -> impl Iterator<Item = &PartyMember> {
        self.members.iter().filter(|m| m.is_alive())
    }

    /// True when every member is at zero hit points.
    pub fn is_wiped_out(&self) -> bool {
        self.members.iter().all(|m| !m.is_alive())
    }
}

// ============================================================================
// Enemies
// ============================================================================

/// A single enemy for one encounter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enemy {
    pub name: String,
    pub hit_points: HitPoints,
    pub attack: i32,
    pub defense: i32,
    pub xp_reward: u32,
    pub loot: Vec<Item>,
    pub symbolic: String,
    pub ai_generated: bool,
}

impl Enemy {
    pub fn new(name: impl Into<String>, max_hp: i32, attack: i32, defense: i32, xp_reward: u32) -> Self {
        Self {
            name: name.into(),
            hit_points: HitPoints::new(max_hp),
            attack,
            defense,
            xp_reward,
            loot: Vec::new(),
            symbolic: String::new(),
            ai_generated: false,
        }
    }

    pub fn with_loot(mut self, loot: Vec<Item>) -> Self {
        self.loot = loot;
        self
    }

    pub fn with_symbolic(mut self, text: impl Into<String>) -> Self {
        self.symbolic = text.into();
        self
    }

    pub fn hp(&self) -> i32 {
        self.hit_points.current
    }

    pub fn is_defeated(&self) -> bool {
        self.hit_points.is_down()
    }

    /// Archetype key: the first word of the name, lower-cased.
    pub fn archetype(&self) -> String {
        self.name
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }
}

// ============================================================================
// Rooms and Dungeon
// ============================================================================

/// Compass exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

impl Direction {
    pub fn letter(&self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::South => "S",
            Direction::East => "E",
            Direction::West => "W",
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s.trim().to_lowercase().as_str() {
            "n" | "north" => Some(Direction::North),
            "s" | "south" => Some(Direction::South),
            "e" | "east" => Some(Direction::East),
            "w" | "west" => Some(Direction::West),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// A generated room. Once in the dungeon map it is mutated, never regenerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub ascii: Vec<String>,
    pub exits: Vec<Direction>,
    pub description: String,
    pub symbolic_text: String,
    pub explored: bool,
    pub has_loot: bool,
    pub has_trap: bool,
    pub has_enemy: bool,
    pub loot: Vec<Item>,
    pub enemy: Option<Enemy>,
    pub depth: u32,
    pub room_type: String,
}

impl Room {
    pub fn has_exit(&self, direction: Direction) -> bool {
        self.exits.contains(&direction)
    }
}

/// Room id for a depth and index: `room_{depth}_{index}`.
pub fn room_id(depth: u32, index: u32) -> String {
    format!("room_{depth}_{index}")
}

/// Context handed through to the narrative collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarratorContext {
    pub tone: String,
    pub focus: Vec<String>,
    pub memory_events: Vec<String>,
}

impl Default for NarratorContext {
    fn default() -> Self {
        Self {
            tone: "mythic".to_string(),
            focus: vec![
                "character_growth".to_string(),
                "symbolic_meaning".to_string(),
            ],
            memory_events: Vec::new(),
        }
    }
}

/// The dungeon: every generated room keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dungeon {
    pub rooms: HashMap<String, Room>,
    pub current_room_id: String,
    pub depth: u32,
    pub max_depth: u32,
    pub theme: String,
    pub narrator: NarratorContext,
}

impl Dungeon {
    /// The room the party stands in.
    ///
    /// # Panics
    ///
    /// Panics if the current id is not in the room map; that only happens
    /// after a corrupted call sequence.
    pub fn current_room(&self) -> &Room {
        self.rooms
            .get(&self.current_room_id)
            .unwrap_or_else(|| panic!("current room {} missing from dungeon", self.current_room_id))
    }

    /// Mutable access to the current room. Same panic contract as [`Dungeon::current_room`].
    pub fn current_room_mut(&mut self) -> &mut Room {
        let id = self.current_room_id.clone();
        self.rooms
            .get_mut(&id)
            .unwrap_or_else(|| panic!("current room {id} missing from dungeon"))
    }

    /// Number of rooms generated at a depth.
    pub fn rooms_at(&self, depth: u32) -> u32 {
        self.rooms.values().filter(|r| r.depth == depth).count() as u32
    }

    pub fn remember(&mut self, event: impl Into<String>) {
        self.narrator.memory_events.push(event.into());
    }
}

// ============================================================================
// Game Log
// ============================================================================

/// Category of a log line shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Combat,
    Narrative,
    System,
    Dice,
    Death,
    Level,
    Ai,
}

/// A line of the player-facing game log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub text: String,
    pub kind: LogKind,
}

impl LogEntry {
    pub fn new(text: impl Into<String>, kind: LogKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}
