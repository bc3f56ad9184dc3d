//! Magic service.
//!
//! A cast runs eligibility, then slot consumption, then effect resolution.
//! Cantrips skip the slot step entirely.

use crate::dice::{DiceExpression, Roller};
use crate::spells::{get_spell, spells_for_class, SpellData};
use crate::world::{CharacterClass, PartyMember};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Amount used when a spell's dice notation cannot be read.
pub const DEFAULT_SPELL_ROLL: i32 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MagicError {
    #[error("Spell not found: {0}")]
    UnknownSpell(String),
    #[error("{class} cannot cast {spell}")]
    ClassMismatch { class: CharacterClass, spell: String },
    #[error("{caster} doesn't know {spell}")]
    SpellNotKnown { caster: String, spell: String },
    #[error("No spell slots available for {spell}")]
    NoSlotAvailable { spell: String },
}

/// Result of a successful cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastOutcome {
    pub spell: String,
    /// Raw damage for the caller to apply to an enemy.
    pub damage: i32,
    /// Healing actually rolled; already applied to the target.
    pub healing: i32,
    pub effect: Option<String>,
    /// Level of the slot that paid for the cast, if any.
    pub slot_level: Option<u8>,
    pub message: String,
}

/// Index of the slot a spell of `level` would consume: the lowest-level
/// slot with `slot.level >= level` and capacity left, first in list order on ties.
fn slot_for(caster: &PartyMember, level: u8) -> Option<usize> {
    caster
        .spell_slots
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.level >= level && slot.available() > 0)
        .min_by_key(|(_, slot)| slot.level)
        .map(|(index, _)| index)
}

/// Check whether a caster may cast a spell right now.
pub fn can_cast(caster: &PartyMember, spell_name: &str) -> Result<&'static SpellData, MagicError> {
    let spell = get_spell(spell_name).ok_or_else(|| MagicError::UnknownSpell(spell_name.to_string()))?;

    if !spell.available_to(caster.class) {
        return Err(MagicError::ClassMismatch {
            class: caster.class,
            spell: spell.name.clone(),
        });
    }

    if !caster.knows_spell(&spell.name) {
        return Err(MagicError::SpellNotKnown {
            caster: caster.name.clone(),
            spell: spell.name.clone(),
        });
    }

    if !spell.is_cantrip() && slot_for(caster, spell.level).is_none() {
        return Err(MagicError::NoSlotAvailable {
            spell: spell.name.clone(),
        });
    }

    Ok(spell)
}

/// Roll a dice-notation amount, falling back to the fixed default when
/// the notation is unreadable.
pub fn roll_amount(notation: &str, roller: &mut dyn Roller) -> i32 {
    match DiceExpression::parse(notation) {
        Ok(expr) => expr.roll_with(roller).total,
        Err(err) => {
            log::warn!("Unreadable spell dice {notation:?}: {err}");
            DEFAULT_SPELL_ROLL
        }
    }
}

/// Who receives a spell's healing.
enum Recipient<'a> {
    Nobody,
    Caster,
    Member(&'a mut PartyMember),
}

/// Cast a known spell, paying with a slot when it is not a cantrip.
///
/// Healing goes to `target`. Without one it is rolled and reported but lands
/// on nobody; use [`cast_on_self`] to heal the caster.
pub fn cast(
    caster: &mut PartyMember,
    spell_name: &str,
    target: Option<&mut PartyMember>,
    roller: &mut dyn Roller,
) -> Result<CastOutcome, MagicError> {
    let recipient = match target {
        Some(member) => Recipient::Member(member),
        None => Recipient::Nobody,
    };
    cast_with(caster, spell_name, recipient, roller)
}

/// Cast a known spell with the caster as its target.
pub fn cast_on_self(
    caster: &mut PartyMember,
    spell_name: &str,
    roller: &mut dyn Roller,
) -> Result<CastOutcome, MagicError> {
    cast_with(caster, spell_name, Recipient::Caster, roller)
}

fn cast_with(
    caster: &mut PartyMember,
    spell_name: &str,
    recipient: Recipient<'_>,
    roller: &mut dyn Roller,
) -> Result<CastOutcome, MagicError> {
    let spell = can_cast(caster, spell_name)?;

    let slot_level = if spell.is_cantrip() {
        None
    } else {
        // can_cast just found one
        let index = slot_for(caster, spell.level).ok_or_else(|| MagicError::NoSlotAvailable {
            spell: spell.name.clone(),
        })?;
        let slot = &mut caster.spell_slots[index];
        slot.used += 1;
        Some(slot.level)
    };

    let outcome = resolve_effect(caster, spell, recipient, slot_level, roller);
    log::debug!("{}", outcome.message);
    Ok(outcome)
}

/// Cast the spell written on a scroll. The reader only needs a class that
/// can use the spell; scrolls never cost a slot and need not be known.
/// Healing goes to the reader.
pub fn cast_scroll(
    reader: &mut PartyMember,
    spell_name: &str,
    roller: &mut dyn Roller,
) -> Result<CastOutcome, MagicError> {
    let spell = get_spell(spell_name).ok_or_else(|| MagicError::UnknownSpell(spell_name.to_string()))?;
    if !spell.available_to(reader.class) {
        return Err(MagicError::ClassMismatch {
            class: reader.class,
            spell: spell.name.clone(),
        });
    }
    Ok(resolve_effect(reader, spell, Recipient::Caster, None, roller))
}

fn resolve_effect(
    caster: &mut PartyMember,
    spell: &SpellData,
    recipient: Recipient<'_>,
    slot_level: Option<u8>,
    roller: &mut dyn Roller,
) -> CastOutcome {
    let mut message = format!("{} casts {}!", caster.name, spell.name);

    let damage = match &spell.damage {
        Some(notation) => {
            let damage = roll_amount(notation, roller);
            message.push_str(&format!(" Deals {damage} damage."));
            damage
        }
        None => 0,
    };

    let healing = match &spell.healing {
        Some(notation) => {
            let healing = roll_amount(notation, roller);
            message.push_str(&format!(" Heals {healing} HP."));
            match recipient {
                Recipient::Nobody => 0,
                Recipient::Caster => caster.hit_points.heal(healing),
                Recipient::Member(member) => member.hit_points.heal(healing),
            };
            healing
        }
        None => 0,
    };

    if let Some(effect) = &spell.effect {
        message.push(' ');
        message.push_str(effect);
    }

    CastOutcome {
        spell: spell.name.clone(),
        damage,
        healing,
        effect: spell.effect.clone(),
        slot_level,
        message,
    }
}

// ============================================================================
// Slot Management
// ============================================================================

/// Reset every slot's usage to zero.
pub fn long_rest(caster: &mut PartyMember) {
    for slot in &mut caster.spell_slots {
        slot.used = 0;
    }
}

/// Refund up to `amount` units of usage, lowest-level slots first.
/// Returns how many units were refunded.
pub fn restore_slots(caster: &mut PartyMember, amount: u32) -> u32 {
    let mut order: Vec<usize> = (0..caster.spell_slots.len()).collect();
    order.sort_by_key(|&i| caster.spell_slots[i].level);

    let mut remaining = amount;
    for index in order {
        if remaining == 0 {
            break;
        }
        let slot = &mut caster.spell_slots[index];
        let refund = remaining.min(slot.used as u32);
        slot.used -= refund as u8;
        remaining -= refund;
    }
    amount - remaining
}

/// Learn a spell. False when it doesn't exist, the class can't take it, or
/// it is already known.
pub fn learn_spell(caster: &mut PartyMember, spell_name: &str) -> bool {
    let Some(spell) = get_spell(spell_name) else {
        return false;
    };
    if !spell.available_to(caster.class) || caster.knows_spell(&spell.name) {
        return false;
    }
    caster.known_spells.push(spell.name.clone());
    true
}

/// Spells the caster knows, in catalog order.
pub fn available_spells(caster: &PartyMember) -> Vec<&'static SpellData> {
    spells_for_class(caster.class)
        .into_iter()
        .filter(|spell| caster.knows_spell(&spell.name))
        .collect()
}

/// Replace slot totals with the class table for the caster's level.
/// Existing usage carries over, clamped to the new totals.
pub fn refresh_slots_for_level(caster: &mut PartyMember) {
    let mut slots = caster.class.spell_slots_for_level(caster.level);
    if slots.is_empty() {
        return;
    }
    for slot in &mut slots {
        if let Some(old) = caster.spell_slots.iter().find(|s| s.level == slot.level) {
            slot.used = old.used.min(slot.total);
        }
    }
    caster.spell_slots = slots;
}
