//! Combat service.
//!
//! One enemy per encounter. Turn order is the party formation followed by a
//! single enemy slot, and the only scheduling primitive is
//! [`CombatState::next_turn`].

use crate::ai::{AttackStyle, EnemyTurnOutcome};
use crate::dice::Roller;
use crate::equipment;
use crate::items::is_tome;
use crate::magic::{self, CastOutcome, MagicError};
use crate::narrator;
use crate::world::{
    level_for_xp, xp_to_next, Ability, Enemy, EquipmentSlot, ItemEffect, ItemKind, LogEntry, LogKind,
    MemberId, Party, PartyMember, StatusEffect,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Damage of an unarmed strike.
pub const UNARMED_DAMAGE: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CombatError {
    #[error("Not in combat")]
    NotInCombat,
    #[error("It is not {0}'s turn")]
    NotYourTurn(String),
    #[error("{0} is incapacitated")]
    MemberIncapacitated(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemUseError {
    #[error("{0} cannot be used")]
    ItemNotUsable(String),
    #[error("{member} already knows {spell}")]
    AlreadyKnown { member: String, spell: String },
    #[error("{member} cannot learn {spell}")]
    CannotLearn { member: String, spell: String },
    #[error("No item at inventory position {0}")]
    NoSuchItem(usize),
    #[error("The scroll crumbles uselessly: {0}")]
    ScrollFailed(#[source] MagicError),
}

// ============================================================================
// Turn State
// ============================================================================

/// A slot in the turn order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Combatant {
    Member(MemberId),
    Enemy,
}

/// How an encounter ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEnd {
    Victory,
    Defeat,
    Fled,
}

/// State of an encounter in progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatState {
    pub enemy: Enemy,
    pub turn_order: Vec<Combatant>,
    pub turn_index: usize,
    /// Starts at 1 and grows each time the order wraps.
    pub round: u32,
    /// Enemy turns taken so far; the first one may use an opening move.
    pub enemy_turns: u32,
}

impl CombatState {
    /// Formation order, then the enemy.
    pub fn initiate(party: &Party, enemy: Enemy) -> Self {
        let mut turn_order: Vec<Combatant> = party
            .formation
            .iter()
            .cloned()
            .map(Combatant::Member)
            .collect();
        turn_order.push(Combatant::Enemy);

        log::info!("Combat begins against {}", enemy.name);
        Self {
            enemy,
            turn_order,
            turn_index: 0,
            round: 1,
            enemy_turns: 0,
        }
    }

    pub fn current(&self) -> &Combatant {
        &self.turn_order[self.turn_index]
    }

    /// Advance to `(index + 1) mod len`. Returns true when a new round starts.
    pub fn next_turn(&mut self) -> bool {
        self.turn_index = (self.turn_index + 1) % self.turn_order.len();
        if self.turn_index == 0 {
            self.round += 1;
            true
        } else {
            false
        }
    }

    /// Id of the member whose turn it is, if it is not the enemy's.
    pub fn current_member(&self) -> Option<&MemberId> {
        match self.current() {
            Combatant::Member(id) => Some(id),
            Combatant::Enemy => None,
        }
    }
}

// ============================================================================
// Party Attacks
// ============================================================================

/// Result of a party member's weapon attack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackOutcome {
    /// The face of the d20.
    pub natural: u32,
    /// d20 + STR modifier.
    pub total: i32,
    pub hit: bool,
    pub critical: bool,
    pub damage: i32,
    pub enemy_defeated: bool,
}

/// Base damage of the attacker's weapon: the main hand weapon, else the
/// first weapon carried, else an unarmed strike.
pub fn weapon_damage(attacker: &PartyMember) -> i32 {
    attacker
        .equipment
        .get(EquipmentSlot::MainHand)
        .filter(|item| item.kind == ItemKind::Weapon)
        .or_else(|| attacker.carried_weapon())
        .and_then(|weapon| weapon.damage)
        .unwrap_or(UNARMED_DAMAGE)
}

/// Attack the enemy: d20 + STR mod against 10 + defense.
///
/// A hit deals weapon damage + d6 + STR mod, doubled on a natural 20.
pub fn resolve_attack(attacker: &PartyMember, enemy: &mut Enemy, roller: &mut dyn Roller) -> AttackOutcome {
    let strength = attacker.modifier(Ability::Strength);
    let natural = roller.roll(20);
    let total = natural as i32 + strength;
    let hit = total >= 10 + enemy.defense;

    if !hit {
        return AttackOutcome {
            natural,
            total,
            hit,
            critical: false,
            damage: 0,
            enemy_defeated: false,
        };
    }

    let critical = natural == 20;
    let mut damage = (weapon_damage(attacker) + roller.roll(6) as i32 + strength).max(0);
    if critical {
        damage *= 2;
    }

    let enemy_defeated = damage_enemy(enemy, damage);
    AttackOutcome {
        natural,
        total,
        hit,
        critical,
        damage,
        enemy_defeated,
    }
}

/// Apply damage to the enemy, returning true once it is defeated.
pub fn damage_enemy(enemy: &mut Enemy, damage: i32) -> bool {
    enemy.hit_points.take_damage(damage);
    enemy.is_defeated()
}

/// Log lines for an attack; `narration` replaces the plain hit line when given.
pub fn attack_log(attacker: &str, enemy: &Enemy, outcome: &AttackOutcome, narration: Option<String>) -> Vec<LogEntry> {
    let mut log = vec![LogEntry::new(
        format!("{attacker} rolled {} to attack.", outcome.total),
        LogKind::Dice,
    )];

    if !outcome.hit {
        log.push(LogEntry::new(format!("{attacker}'s attack misses!"), LogKind::Combat));
        return log;
    }

    if outcome.critical {
        log.push(LogEntry::new("Critical hit!", LogKind::Combat));
    }
    log.push(match narration {
        Some(text) => LogEntry::new(text, LogKind::Ai),
        None => LogEntry::new(narrator::fallback_combat_text(attacker, outcome.damage), LogKind::Combat),
    });
    if outcome.enemy_defeated {
        log.push(LogEntry::new(format!("The {} is defeated!", enemy.name), LogKind::Combat));
    }
    log
}

// ============================================================================
// Items
// ============================================================================

/// What using an item did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemUseOutcome {
    /// A scroll was read; damage is for the caller to apply.
    Scroll(CastOutcome),
    LearnedSpell(String),
    Healed(i32),
    RestoredSlots(u32),
    Boosted { ability: Ability, amount: i32, duration: u32 },
    /// A consumable with nothing mechanical to it.
    Flavor,
}

/// Use the inventory item at `index`. The item is consumed on success and
/// left in place on failure.
pub fn use_item(
    member: &mut PartyMember,
    index: usize,
    roller: &mut dyn Roller,
) -> Result<(ItemUseOutcome, Vec<LogEntry>), ItemUseError> {
    let item = member
        .inventory
        .get(index)
        .cloned()
        .ok_or(ItemUseError::NoSuchItem(index))?;
    let name = member.name.clone();
    let mut log = Vec::new();

    let outcome = if is_tome(&item) {
        let spell = match item.spell() {
            Some(spell) if member.class.is_spellcaster() => spell.to_string(),
            _ => return Err(ItemUseError::ItemNotUsable(item.name.clone())),
        };
        if member.knows_spell(&spell) {
            return Err(ItemUseError::AlreadyKnown { member: name, spell });
        }
        if !magic::learn_spell(member, &spell) {
            return Err(ItemUseError::CannotLearn { member: name, spell });
        }
        log.push(LogEntry::new(
            format!("{name} learns {spell} from the {}!", item.name),
            LogKind::System,
        ));
        ItemUseOutcome::LearnedSpell(spell)
    } else if let (ItemKind::Consumable, Some(spell)) = (item.kind, item.spell()) {
        let cast = magic::cast_scroll(member, spell, roller).map_err(ItemUseError::ScrollFailed)?;
        log.push(LogEntry::new(format!("{name} reads the {}!", item.name), LogKind::System));
        log.push(LogEntry::new(cast.message.clone(), LogKind::Combat));
        ItemUseOutcome::Scroll(cast)
    } else if item.heals() {
        let healed = member.hit_points.heal(item.healing.unwrap_or(0));
        log.push(LogEntry::new(
            format!("{name} uses {} and recovers {healed} HP!", item.name),
            LogKind::System,
        ));
        ItemUseOutcome::Healed(healed)
    } else if let Some(amount) = item.restores_mana() {
        if member.spell_slots.is_empty() {
            return Err(ItemUseError::ItemNotUsable(item.name));
        }
        let refunded = magic::restore_slots(member, amount);
        log.push(LogEntry::new(
            format!("{name} drinks the {} and recovers {refunded} spell slot(s).", item.name),
            LogKind::System,
        ));
        ItemUseOutcome::RestoredSlots(refunded)
    } else if let Some((ability, amount, duration)) = temporary_bonus(&item.effects) {
        member.status_effects.push(StatusEffect {
            name: item.name.clone(),
            duration,
            effect: item.description.clone(),
            bonus: Some((ability, amount)),
        });
        equipment::refresh_stats(member);
        log.push(LogEntry::new(
            format!("{name} drinks the {}! {ability} +{amount} for {duration} rounds.", item.name),
            LogKind::System,
        ));
        ItemUseOutcome::Boosted {
            ability,
            amount,
            duration,
        }
    } else if item.is_consumable() {
        let text = if item.description.is_empty() {
            format!("{name} uses the {}.", item.name)
        } else {
            format!("{name} uses the {}. {}", item.name, item.description)
        };
        log.push(LogEntry::new(text, LogKind::Narrative));
        ItemUseOutcome::Flavor
    } else {
        return Err(ItemUseError::ItemNotUsable(item.name));
    };

    member.inventory.remove(index);
    Ok((outcome, log))
}

fn temporary_bonus(effects: &[ItemEffect]) -> Option<(Ability, i32, u32)> {
    effects.iter().find_map(|effect| match effect {
        ItemEffect::TemporaryStatBonus {
            ability,
            amount,
            duration,
        } => Some((*ability, *amount, *duration)),
        _ => None,
    })
}

/// One member hands a healing item to another (or themselves) and it is used
/// on the spot. Returns the hit points restored.
pub fn heal_ally(party: &mut Party, user: &MemberId, index: usize, target: &MemberId) -> Result<i32, ItemUseError> {
    let member = party
        .member_mut(user)
        .unwrap_or_else(|| panic!("healer {user} not in party"));
    match member.inventory.get(index) {
        Some(item) if item.heals() => {}
        Some(item) => return Err(ItemUseError::ItemNotUsable(item.name.clone())),
        None => return Err(ItemUseError::NoSuchItem(index)),
    }
    let item = member.inventory.remove(index);

    let recipient = party
        .member_mut(target)
        .unwrap_or_else(|| panic!("heal target {target} not in party"));
    Ok(recipient.hit_points.heal(item.healing.unwrap_or(0)))
}

/// Count down timed effects at the end of a round, dropping expired ones.
pub fn tick_status_effects(member: &mut PartyMember) -> Vec<String> {
    if member.status_effects.is_empty() {
        return Vec::new();
    }
    for effect in &mut member.status_effects {
        effect.duration = effect.duration.saturating_sub(1);
    }
    let (expired, active): (Vec<_>, Vec<_>) = member
        .status_effects
        .drain(..)
        .partition(|effect| effect.duration == 0);
    member.status_effects = active;

    if !expired.is_empty() {
        equipment::refresh_stats(member);
    }
    expired.into_iter().map(|effect| effect.name).collect()
}

// ============================================================================
// Enemy Turns and Endings
// ============================================================================

/// Apply a rolled enemy turn to the party.
pub fn apply_enemy_turn(party: &mut Party, enemy: &Enemy, outcome: &EnemyTurnOutcome) -> (Vec<LogEntry>, Option<CombatEnd>) {
    let mut log = Vec::new();

    match outcome {
        EnemyTurnOutcome::Attack {
            target,
            style,
            hit,
            damage,
        } => {
            let member = party
                .member_mut(target)
                .unwrap_or_else(|| panic!("enemy target {target} not in party"));

            if *hit {
                let result = member.hit_points.take_damage(*damage);
                let verb = if *style == AttackStyle::Spell { "blasts" } else { "hits" };
                log.push(LogEntry::new(
                    format!("The {} {verb} {} for {damage} damage!", enemy.name, member.name),
                    LogKind::Combat,
                ));
                if result.dropped_to_zero {
                    log.push(LogEntry::new(format!("{} has fallen!", member.name), LogKind::Death));
                    member.record_event(format!("Fell to the {}", enemy.name));
                }
            } else {
                log.push(LogEntry::new(
                    format!("The {} misses {}!", enemy.name, member.name),
                    LogKind::Combat,
                ));
            }
        }
        EnemyTurnOutcome::Flee => {
            log.push(LogEntry::new(
                format!("The {} has fled the battle!", enemy.name),
                LogKind::Narrative,
            ));
            return (log, Some(CombatEnd::Fled));
        }
        EnemyTurnOutcome::Defend | EnemyTurnOutcome::Wait => {}
    }

    if party.is_wiped_out() {
        log.push(LogEntry::new("Your party has been defeated...", LogKind::Death));
        return (log, Some(CombatEnd::Defeat));
    }
    (log, None)
}

/// Share experience, level members up and collect the enemy's loot.
///
/// Each living member gains `xp_reward / member count`, rounded down.
pub fn award_victory(party: &mut Party, enemy: &Enemy) -> Vec<LogEntry> {
    let mut log = vec![LogEntry::new("Victory belongs to your party!", LogKind::Narrative)];
    if party.members.is_empty() {
        return log;
    }
    let share = enemy.xp_reward / party.members.len() as u32;

    for member in party.members.iter_mut().filter(|m| m.is_alive()) {
        member.xp += share;
        member.record_event(format!("Defeated {} in combat", enemy.name));

        let new_level = level_for_xp(member.xp);
        if new_level > member.level {
            member.level = new_level;
            member.xp_to_next = xp_to_next(new_level);
            magic::refresh_slots_for_level(member);
            // Max HP only moves with equipment changes.
            equipment::refresh_stats(member);
            log::info!("{} reached level {}", member.name, new_level);
            log.push(LogEntry::new(
                format!("{} reached level {}!", member.name, new_level),
                LogKind::Level,
            ));
        }
    }

    if !enemy.loot.is_empty() {
        let names: Vec<&str> = enemy.loot.iter().map(|i| i.name.as_str()).collect();
        log.push(LogEntry::new(format!("Found: {}", names.join(", ")), LogKind::System));
        party.shared_inventory.extend(enemy.loot.iter().cloned());
    }
    log
}
