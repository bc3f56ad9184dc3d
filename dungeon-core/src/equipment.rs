//! Equipment service.
//!
//! Moves items between a member's inventory and equipment slots and keeps
//! the derived numbers (current stats, armor class, maximum hit points) in
//! step with what is worn.

use crate::world::{Ability, EquipmentSlot, Item, ItemKind, PartyMember};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Body armor at or above this defense ignores the DEX bonus.
pub const HEAVY_ARMOR_DEFENSE: i32 = 6;

/// Hit points per level before the CON modifier.
pub const HP_PER_LEVEL: i32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EquipError {
    #[error("Cannot equip {item} ({kind}) in {slot} slot")]
    InvalidSlot {
        item: String,
        kind: ItemKind,
        slot: EquipmentSlot,
    },
    #[error("No item equipped in {0} slot")]
    EmptySlot(EquipmentSlot),
    #[error("No item at inventory position {0}")]
    ItemNotInInventory(usize),
}

/// True iff the slot's allow-list contains the item's kind.
pub fn can_equip(item: &Item, slot: EquipmentSlot) -> bool {
    slot.accepts(item.kind)
}

/// Equip the inventory item at `index` into `slot`.
///
/// Whatever was in the slot goes back to the inventory. Returns the name of
/// that displaced item, if any.
pub fn equip(
    member: &mut PartyMember,
    index: usize,
    slot: EquipmentSlot,
) -> Result<Option<String>, EquipError> {
    let item = member
        .inventory
        .get(index)
        .ok_or(EquipError::ItemNotInInventory(index))?;

    if !can_equip(item, slot) {
        return Err(EquipError::InvalidSlot {
            item: item.name.clone(),
            kind: item.kind,
            slot,
        });
    }

    let item = member.inventory.remove(index);
    log::debug!("{} equips {} in {}", member.name, item.name, slot);

    let displaced = member.equipment.put(slot, item).map(|old| {
        let name = old.name.clone();
        member.inventory.push(old);
        name
    });

    recompute_derived_stats(member);
    Ok(displaced)
}

/// Move the item in `slot` back to the inventory, returning its name.
pub fn unequip(member: &mut PartyMember, slot: EquipmentSlot) -> Result<String, EquipError> {
    let item = member
        .equipment
        .take(slot)
        .ok_or(EquipError::EmptySlot(slot))?;
    let name = item.name.clone();
    member.inventory.push(item);

    recompute_derived_stats(member);
    Ok(name)
}

/// Reset current stats to base, then apply equipment and status bonuses and
/// refresh armor class. Hit points are left alone.
pub fn refresh_stats(member: &mut PartyMember) {
    let mut stats = member.base_stats;

    for (_, item) in member.equipment.iter() {
        for (ability, amount) in item.stat_bonuses() {
            stats.add(ability, amount);
        }
    }
    for effect in &member.status_effects {
        if let Some((ability, amount)) = effect.bonus {
            stats.add(ability, amount);
        }
    }

    member.stats = stats;
    member.armor_class = armor_class_breakdown(member).total();
}

/// Full recomputation after any equipment change.
///
/// Max HP becomes `level * 8 + CON mod * level`; current HP keeps its
/// ratio to the old maximum.
pub fn recompute_derived_stats(member: &mut PartyMember) {
    refresh_stats(member);

    let level = member.level as i32;
    let new_max = level * HP_PER_LEVEL + member.modifier(Ability::Constitution) * level;
    member.hit_points.rescale(new_max);
}

// ============================================================================
// Armor Class
// ============================================================================

/// Components of a member's armor class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArmorClassBreakdown {
    /// 10 + DEX modifier, or a flat 10 under heavy armor.
    pub base: i32,
    pub armor: i32,
    pub shield: i32,
    pub natural: i32,
    pub deflection: i32,
}

impl ArmorClassBreakdown {
    pub fn total(&self) -> i32 {
        self.base + self.armor + self.shield + self.natural + self.deflection
    }
}

/// Break armor class into its sources from current stats and equipment.
pub fn armor_class_breakdown(member: &PartyMember) -> ArmorClassBreakdown {
    let mut breakdown = ArmorClassBreakdown {
        base: 10 + member.modifier(Ability::Dexterity),
        ..Default::default()
    };

    for (slot, item) in member.equipment.iter() {
        let defense = item.defense.unwrap_or(0);
        match slot {
            EquipmentSlot::Body => {
                breakdown.armor = defense;
                if item.kind == ItemKind::Armor && defense >= HEAVY_ARMOR_DEFENSE {
                    breakdown.base = 10;
                }
            }
            EquipmentSlot::OffHand if item.kind == ItemKind::Shield => {
                breakdown.shield = defense;
            }
            _ if item.kind == ItemKind::Shield => {}
            _ if item.is_natural_armor() => {
                breakdown.natural += defense;
            }
            _ => breakdown.deflection += defense,
        }
    }

    breakdown
}

// ============================================================================
// Summaries
// ============================================================================

/// `slot: item` pairs joined by commas, or "No equipment".
pub fn equipped_items_description(member: &PartyMember) -> String {
    let parts: Vec<String> = member
        .equipment
        .iter()
        .map(|(slot, item)| format!("{}: {}", slot, item.name))
        .collect();

    if parts.is_empty() {
        "No equipment".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn total_equipment_value(member: &PartyMember) -> u32 {
    member.equipment.iter().map(|(_, item)| item.value).sum()
}

pub fn equipment_weight(member: &PartyMember) -> u32 {
    member.equipment.iter().map(|(_, item)| item.weight).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::get_item;
    use crate::testing::sample_warrior;

    fn give(member: &mut PartyMember, name: &str) -> usize {
        member.inventory.push(get_item(name).unwrap());
        member.inventory.len() - 1
    }

    #[test]
    fn test_can_equip() {
        let sword = get_item("Longsword").unwrap();
        let shield = get_item("Wooden Shield").unwrap();
        assert!(can_equip(&sword, EquipmentSlot::MainHand));
        assert!(!can_equip(&sword, EquipmentSlot::Head));
        assert!(can_equip(&shield, EquipmentSlot::OffHand));
    }

    #[test]
    fn test_invalid_slot_leaves_state() {
        let mut warrior = sample_warrior();
        let index = give(&mut warrior, "Iron Helmet");
        let before = warrior.inventory.len();

        let err = equip(&mut warrior, index, EquipmentSlot::Feet).unwrap_err();
        assert!(matches!(err, EquipError::InvalidSlot { .. }));
        assert_eq!(warrior.inventory.len(), before);
        assert!(warrior.equipment.is_empty());

        assert_eq!(
            equip(&mut warrior, 99, EquipmentSlot::Head),
            Err(EquipError::ItemNotInInventory(99))
        );
        assert_eq!(
            unequip(&mut warrior, EquipmentSlot::Neck),
            Err(EquipError::EmptySlot(EquipmentSlot::Neck))
        );
    }

    #[test]
    fn test_equip_moves_item_out_of_inventory() {
        let mut warrior = sample_warrior();
        let index = give(&mut warrior, "Iron Helmet");
        equip(&mut warrior, index, EquipmentSlot::Head).unwrap();

        assert!(!warrior.inventory.iter().any(|i| i.name == "Iron Helmet"));
        assert_eq!(
            warrior.equipment.get(EquipmentSlot::Head).map(|i| i.name.as_str()),
            Some("Iron Helmet")
        );
    }

    #[test]
    fn test_equip_swaps_occupied_slot() {
        let mut warrior = sample_warrior();
        let first = give(&mut warrior, "Iron Dagger");
        equip(&mut warrior, first, EquipmentSlot::MainHand).unwrap();

        let second = give(&mut warrior, "Battleaxe");
        let displaced = equip(&mut warrior, second, EquipmentSlot::MainHand).unwrap();
        assert_eq!(displaced.as_deref(), Some("Iron Dagger"));
        assert!(warrior.inventory.iter().any(|i| i.name == "Iron Dagger"));
        assert!(!warrior.inventory.iter().any(|i| i.name == "Battleaxe"));
    }

    #[test]
    fn test_heavy_armor_ignores_dex() {
        let mut warrior = sample_warrior();
        warrior.base_stats.dexterity = 14;
        refresh_stats(&mut warrior);
        assert_eq!(warrior.armor_class, 12);

        let index = give(&mut warrior, "Chainmail");
        equip(&mut warrior, index, EquipmentSlot::Body).unwrap();
        // Flat 10 + 6
        assert_eq!(warrior.armor_class, 16);

        unequip(&mut warrior, EquipmentSlot::Body).unwrap();
        let index = give(&mut warrior, "Scale Mail");
        equip(&mut warrior, index, EquipmentSlot::Body).unwrap();
        // 10 + 2 + 5
        assert_eq!(warrior.armor_class, 17);
    }

    #[test]
    fn test_armor_class_sources() {
        let mut warrior = sample_warrior();
        warrior.base_stats.dexterity = 10;
        for (name, slot) in [
            ("Leather Armor", EquipmentSlot::Body),
            ("Iron Shield", EquipmentSlot::OffHand),
            ("Amulet of Natural Armor", EquipmentSlot::Neck),
            ("Ring of Protection", EquipmentSlot::Ring1),
            ("Cloak of Protection", EquipmentSlot::Cloak),
        ] {
            let index = give(&mut warrior, name);
            equip(&mut warrior, index, slot).unwrap();
        }

        let breakdown = armor_class_breakdown(&warrior);
        assert_eq!(
            breakdown,
            ArmorClassBreakdown {
                base: 10,
                armor: 2,
                shield: 2,
                natural: 2,
                deflection: 2,
            }
        );
        assert_eq!(breakdown.total(), warrior.armor_class);
    }

    #[test]
    fn test_natural_armor_comes_from_the_item_tag() {
        let mut warrior = sample_warrior();
        let mut charm = get_item("Ring of Protection").unwrap();
        charm.description = "Naturally lucky".to_string();
        warrior.inventory.push(charm);
        let index = warrior.inventory.len() - 1;
        equip(&mut warrior, index, EquipmentSlot::Ring1).unwrap();

        let breakdown = armor_class_breakdown(&warrior);
        assert_eq!((breakdown.natural, breakdown.deflection), (0, 1));
        assert!(get_item("Amulet of Natural Armor").unwrap().is_natural_armor());
    }

    #[test]
    fn test_shield_in_main_hand_adds_nothing() {
        let mut warrior = sample_warrior();
        let before = warrior.armor_class;
        let index = give(&mut warrior, "Wooden Shield");
        equip(&mut warrior, index, EquipmentSlot::MainHand).unwrap();
        assert_eq!(warrior.armor_class, before);
    }

    #[test]
    fn test_stat_bonus_and_hp_rescale() {
        let mut warrior = sample_warrior();
        warrior.level = 2;
        warrior.base_stats.constitution = 10;
        warrior.hit_points.maximum = 16;
        warrior.hit_points.current = 8;

        let index = give(&mut warrior, "Amulet of Health");
        equip(&mut warrior, index, EquipmentSlot::Neck).unwrap();
        assert_eq!(warrior.stats.constitution, 13);
        // 2 * 8 + 1 * 2 = 18, half of it
        assert_eq!(warrior.max_hp(), 18);
        assert_eq!(warrior.hp(), 9);

        unequip(&mut warrior, EquipmentSlot::Neck).unwrap();
        assert_eq!(warrior.stats, warrior.base_stats);
        assert_eq!(warrior.max_hp(), 16);
        assert_eq!(warrior.hp(), 8);
    }

    #[test]
    fn test_summaries() {
        let mut warrior = sample_warrior();
        assert_eq!(equipped_items_description(&warrior), "No equipment");

        let index = give(&mut warrior, "Longsword");
        equip(&mut warrior, index, EquipmentSlot::MainHand).unwrap();
        let index = give(&mut warrior, "Iron Helmet");
        equip(&mut warrior, index, EquipmentSlot::Head).unwrap();

        assert_eq!(
            equipped_items_description(&warrior),
            "mainHand: Longsword, head: Iron Helmet"
        );
        assert_eq!(total_equipment_value(&warrior), 150);
        assert_eq!(equipment_weight(&warrior), 5);
    }
}
