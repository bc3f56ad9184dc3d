//! Item catalog.
//!
//! Weapons, armor, accessories, consumables and tools that rooms, enemies
//! and starting kits draw copies from. The catalog itself is never mutated.

use crate::world::{Ability, Item, ItemEffect, ItemKind, Rarity};

/// Name marker of items that teach their spell when read.
pub const TOME_MARKER: &str = "Ancient Tome";

/// Look up a catalog item by name (case-insensitive).
pub fn get_item(name: &str) -> Option<Item> {
    let name_lower = name.to_lowercase();
    ALL_ITEMS
        .iter()
        .find(|i| i.name.to_lowercase() == name_lower)
        .cloned()
}

/// True when reading this item teaches a spell.
pub fn is_tome(item: &Item) -> bool {
    item.name.contains(TOME_MARKER)
}

fn weapon(name: &str, damage: i32, value: u32, weight: u32, description: &str) -> Item {
    Item::new(name, ItemKind::Weapon, value)
        .with_damage(damage)
        .with_weight(weight)
        .with_description(description)
        .with_rarity(Rarity::Common)
}

fn armor(kind: ItemKind, name: &str, defense: i32, value: u32, weight: u32, description: &str) -> Item {
    Item::new(name, kind, value)
        .with_defense(defense)
        .with_weight(weight)
        .with_description(description)
        .with_rarity(Rarity::Common)
}

fn accessory(kind: ItemKind, name: &str, value: u32, description: &str) -> Item {
    Item::new(name, kind, value)
        .with_description(description)
        .with_rarity(Rarity::Uncommon)
        .magical()
}

fn consumable(name: &str, value: u32, description: &str) -> Item {
    Item::new(name, ItemKind::Consumable, value)
        .with_description(description)
        .with_rarity(Rarity::Common)
}

fn tool(name: &str, value: u32, weight: u32, description: &str) -> Item {
    Item::new(name, ItemKind::Tool, value)
        .with_weight(weight)
        .with_description(description)
        .with_rarity(Rarity::Common)
}

fn grants(spell: &str) -> ItemEffect {
    ItemEffect::GrantsSpell {
        spell: spell.to_string(),
    }
}

// ============================================================================
// Catalog
// ============================================================================

lazy_static::lazy_static! {
    /// Weapons, from daggers to enchanted staves.
    pub static ref WEAPONS: Vec<Item> = vec![
        weapon("Iron Dagger", 4, 20, 1, "Light, quick weapon"),
        weapon("Short Sword", 6, 50, 2, "Versatile blade"),
        weapon("Longsword", 8, 100, 3, "Classic warrior's blade"),
        weapon("Battleaxe", 10, 150, 4, "Heavy two-handed weapon"),
        weapon("Warhammer", 9, 120, 3, "Crushing bludgeon"),
        weapon("Flaming Sword", 12, 800, 3, "+2 fire damage, glows with flame")
            .with_rarity(Rarity::Rare)
            .magical(),
        weapon("Frost Dagger", 6, 400, 1, "+1 cold damage, chance to slow")
            .with_rarity(Rarity::Uncommon)
            .magical(),
        weapon("Thunder Hammer", 14, 1200, 4, "+3 thunder damage, stuns on crit")
            .with_rarity(Rarity::Rare)
            .magical(),
        weapon("Shortbow", 6, 75, 2, "Light ranged weapon"),
        weapon("Longbow", 8, 150, 3, "Long range weapon"),
        weapon("Crossbow", 10, 200, 4, "Mechanical ranged weapon"),
        weapon("Wooden Staff", 4, 30, 2, "Basic spellcasting focus"),
        weapon("Crystal Staff", 6, 300, 3, "+2 spell damage")
            .with_rarity(Rarity::Uncommon)
            .magical(),
        weapon("Archmage Staff", 8, 1000, 3, "+4 spell damage, +1 spell slot")
            .with_rarity(Rarity::Rare)
            .magical(),
        weapon("Wand of Magic Missiles", 3, 500, 1, "Casts Magic Missile (3 charges)")
            .with_rarity(Rarity::Uncommon)
            .magical(),
    ];

    /// Body armor, robes and shields.
    pub static ref ARMOR: Vec<Item> = vec![
        armor(ItemKind::Armor, "Leather Armor", 2, 50, 2, "+2 AC, light armor"),
        armor(ItemKind::Armor, "Studded Leather", 3, 100, 3, "+3 AC, light armor"),
        armor(ItemKind::Armor, "Chain Shirt", 4, 200, 4, "+4 AC, medium armor"),
        armor(ItemKind::Armor, "Scale Mail", 5, 300, 5, "+5 AC, medium armor"),
        armor(ItemKind::Armor, "Chainmail", 6, 500, 6, "+6 AC, medium armor"),
        armor(ItemKind::Armor, "Plate Armor", 8, 1000, 8, "+8 AC, heavy armor"),
        armor(ItemKind::Armor, "Full Plate", 10, 2000, 10, "+10 AC, heavy armor")
            .with_rarity(Rarity::Uncommon),
        armor(ItemKind::Armor, "Elven Chainmail", 7, 1500, 4, "+7 AC, +1 DEX, silent movement")
            .with_rarity(Rarity::Rare)
            .with_stat_bonus(Ability::Dexterity, 1)
            .magical(),
        armor(ItemKind::Armor, "Dragon Scale Mail", 9, 3000, 6, "+9 AC, fire resistance")
            .with_rarity(Rarity::Rare)
            .magical(),
        armor(ItemKind::Robe, "Simple Robes", 1, 25, 1, "+1 AC, cloth armor"),
        armor(ItemKind::Robe, "Mage Robes", 2, 200, 1, "+2 AC, +1 INT")
            .with_rarity(Rarity::Uncommon)
            .with_stat_bonus(Ability::Intelligence, 1),
        armor(ItemKind::Robe, "Archmage Robes", 3, 800, 1, "+3 AC, +2 INT, +1 spell slot")
            .with_rarity(Rarity::Rare)
            .with_stat_bonus(Ability::Intelligence, 2)
            .magical(),
        armor(ItemKind::Shield, "Wooden Shield", 1, 30, 3, "+1 AC when held in the off hand"),
        armor(ItemKind::Shield, "Iron Shield", 2, 90, 6, "+2 AC when held in the off hand"),
    ];

    /// Rings, amulets, cloaks, helmets and boots.
    pub static ref ACCESSORIES: Vec<Item> = vec![
        accessory(ItemKind::Ring, "Ring of Protection", 500, "+1 AC, +1 to all saves").with_defense(1),
        accessory(ItemKind::Ring, "Ring of Strength", 600, "+2 STR")
            .with_stat_bonus(Ability::Strength, 2),
        accessory(ItemKind::Ring, "Ring of Wizardry", 1000, "+2 INT, +1 spell slot")
            .with_rarity(Rarity::Rare)
            .with_stat_bonus(Ability::Intelligence, 2),
        accessory(ItemKind::Ring, "Ring of Regeneration", 1500, "Regenerate 1 HP per turn")
            .with_rarity(Rarity::Rare),
        accessory(ItemKind::Amulet, "Amulet of Health", 800, "+3 CON")
            .with_stat_bonus(Ability::Constitution, 3),
        Item::new("Holy Symbol", ItemKind::Necklace, 100)
            .with_description("Divine spellcasting focus")
            .with_rarity(Rarity::Common),
        accessory(ItemKind::Amulet, "Amulet of Natural Armor", 600, "+2 natural AC")
            .with_defense(2)
            .with_effect(ItemEffect::NaturalArmor),
        accessory(ItemKind::Cloak, "Cloak of Elvenkind", 500, "+2 DEX, advantage on stealth")
            .with_stat_bonus(Ability::Dexterity, 2)
            .with_weight(1),
        accessory(ItemKind::Cloak, "Cloak of Protection", 700, "+1 AC, +1 to saves")
            .with_defense(1)
            .with_weight(1),
        armor(ItemKind::Helmet, "Iron Helmet", 1, 50, 2, "+1 AC"),
        accessory(ItemKind::Helmet, "Helmet of Brilliance", 1200, "+2 AC, +1 INT, +1 WIS")
            .with_rarity(Rarity::Rare)
            .with_defense(2)
            .with_weight(2)
            .with_stat_bonus(Ability::Intelligence, 1)
            .with_stat_bonus(Ability::Wisdom, 1),
        Item::new("Leather Boots", ItemKind::Boots, 20)
            .with_description("Basic footwear")
            .with_rarity(Rarity::Common)
            .with_weight(1),
        accessory(ItemKind::Boots, "Boots of Speed", 800, "+1 DEX, double movement speed")
            .with_stat_bonus(Ability::Dexterity, 1)
            .with_weight(1),
        accessory(ItemKind::Boots, "Boots of Elvenkind", 600, "Silent movement, +1 DEX")
            .with_stat_bonus(Ability::Dexterity, 1)
            .with_weight(1),
    ];

    /// Potions, scrolls and tomes.
    pub static ref CONSUMABLES: Vec<Item> = vec![
        consumable("Minor Healing Potion", 25, "Restores 1d4+4 HP").with_healing(8),
        consumable("Healing Potion", 50, "Restores 2d4+7 HP").with_healing(15),
        consumable("Greater Healing Potion", 150, "Restores 4d4+9 HP")
            .with_healing(25)
            .with_rarity(Rarity::Uncommon),
        consumable("Superior Healing Potion", 300, "Restores 8d4+8 HP")
            .with_healing(40)
            .with_rarity(Rarity::Rare),
        consumable("Mana Potion", 60, "Restores 1 spell slot")
            .with_effect(ItemEffect::RestoresMana { amount: 1 }),
        consumable("Greater Mana Potion", 200, "Restores 2 spell slots")
            .with_rarity(Rarity::Uncommon)
            .with_effect(ItemEffect::RestoresMana { amount: 2 }),
        consumable("Potion of Giant Strength", 400, "+4 STR for 1 hour")
            .with_rarity(Rarity::Uncommon)
            .with_effect(ItemEffect::TemporaryStatBonus { ability: Ability::Strength, amount: 4, duration: 10 }),
        consumable("Potion of Eagle's Splendor", 300, "+4 CHA for 1 hour")
            .with_rarity(Rarity::Uncommon)
            .with_effect(ItemEffect::TemporaryStatBonus { ability: Ability::Charisma, amount: 4, duration: 10 }),
        consumable("Scroll of Cure Light Wounds", 100, "Casts Cure Light Wounds").with_healing(12),
        consumable("Scroll of Magic Missile", 150, "Casts Magic Missile (3 missiles)")
            .with_effect(grants("magic_missile")),
        consumable("Scroll of Fireball", 500, "Casts Fireball (8d6 damage)")
            .with_rarity(Rarity::Uncommon)
            .with_effect(grants("fireball")),
        consumable("Ancient Tome of Burning Hands", 250, "Its pages smoulder with a forgotten incantation")
            .with_rarity(Rarity::Uncommon)
            .with_effect(grants("Burning Hands")),
        consumable("Ancient Tome of Restoration", 300, "A hymnal of mending, bound in pale leather")
            .with_rarity(Rarity::Uncommon)
            .with_effect(grants("Cure Moderate Wounds")),
    ];

    /// Adventuring tools.
    pub static ref TOOLS: Vec<Item> = vec![
        tool("Thieves' Tools", 50, 1, "Required for lock picking"),
        tool("Rope (50 ft)", 15, 2, "Useful for climbing"),
        tool("Torch", 5, 1, "Provides light"),
        tool("Lantern", 25, 2, "Bright light source"),
        tool("Grappling Hook", 30, 2, "For climbing walls"),
        tool("Crowbar", 20, 3, "For prying open doors"),
    ];

    /// Every catalog entry.
    pub static ref ALL_ITEMS: Vec<Item> = WEAPONS
        .iter()
        .chain(ARMOR.iter())
        .chain(ACCESSORIES.iter())
        .chain(CONSUMABLES.iter())
        .chain(TOOLS.iter())
        .cloned()
        .collect();

    /// Ordered loot table indexed by the room generator.
    pub static ref LOOT_TABLE: Vec<Item> = vec![
        Item::new("Gold Coins", ItemKind::Treasure, 25)
            .with_description("A handful of tarnished coins"),
        get_catalog("Minor Healing Potion"),
        get_catalog("Iron Dagger"),
        Item::new("Silver Chalice", ItemKind::Treasure, 60)
            .with_description("Engraved with the sigil of a forgotten house"),
        get_catalog("Leather Armor"),
        get_catalog("Healing Potion"),
        get_catalog("Scroll of Magic Missile"),
        get_catalog("Iron Helmet"),
        get_catalog("Mana Potion"),
        Item::new("Ruby Shard", ItemKind::Treasure, 120)
            .with_description("It pulses faintly, like a slow heart")
            .with_rarity(Rarity::Uncommon),
        get_catalog("Short Sword"),
        get_catalog("Ancient Tome of Burning Hands"),
        get_catalog("Ring of Protection"),
        get_catalog("Wooden Shield"),
        get_catalog("Scroll of Fireball"),
        get_catalog("Ancient Tome of Restoration"),
    ];
}

/// Catalog entry used while building the derived tables above.
fn get_catalog(name: &str) -> Item {
    get_item(name).unwrap_or_else(|| Item::new(name, ItemKind::Treasure, 10))
}
