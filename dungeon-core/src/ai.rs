//! Enemy and ally decision-making.
//!
//! Enemies are driven by a [`BehaviorTable`] keyed by archetype (the first
//! word of the enemy's name). The table is an ordinary value owned by the
//! game, built from defaults and optionally overridden from JSON. Allies
//! follow their member's [`CombatAi`] tag.

use crate::dice::Roller;
use crate::world::{Ability, CombatAi, Enemy, LogEntry, LogKind, MemberId, Party, PartyMember};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("Invalid behavior table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("No behavior registered for archetype: {0}")]
    UnknownArchetype(String),
}

// ============================================================================
// Behavior Profiles
// ============================================================================

/// Who an enemy goes after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetPriority {
    Weakest,
    Strongest,
    Random,
    Healer,
    Caster,
}

/// What an enemy does once its health drops to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowHealthAction {
    Flee,
    Berserk,
    Defensive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowHealthPolicy {
    /// Fraction of max hp at or below which the policy kicks in.
    pub threshold: f64,
    pub action: LowHealthAction,
}

/// An action an enemy can choose.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnemyAction {
    Attack,
    Berserk,
    CastSpell,
    Defend,
    Flee,
    /// A named special ability; resolves as a standard attack.
    Special(String),
}

impl EnemyAction {
    pub fn name(&self) -> &str {
        match self {
            EnemyAction::Attack => "attack",
            EnemyAction::Berserk => "berserk",
            EnemyAction::CastSpell => "cast_spell",
            EnemyAction::Defend => "defend",
            EnemyAction::Flee => "flee",
            EnemyAction::Special(name) => name,
        }
    }
}

impl From<String> for EnemyAction {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "attack" => EnemyAction::Attack,
            "berserk" => EnemyAction::Berserk,
            "cast_spell" => EnemyAction::CastSpell,
            "defend" => EnemyAction::Defend,
            "flee" => EnemyAction::Flee,
            _ => EnemyAction::Special(value),
        }
    }
}

impl From<&str> for EnemyAction {
    fn from(value: &str) -> Self {
        EnemyAction::from(value.to_string())
    }
}

impl From<EnemyAction> for String {
    fn from(value: EnemyAction) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for EnemyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Behavior of one enemy archetype.
///
/// Only `intelligence` and the low-health policy drive decisions; the other
/// scores describe the archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub name: String,
    pub aggression: u8,
    pub intelligence: u8,
    pub teamwork: u8,
    pub survival: u8,
    pub preferred_actions: Vec<EnemyAction>,
    pub target_priority: TargetPriority,
    #[serde(default)]
    pub opening_move: Option<EnemyAction>,
    pub low_health: LowHealthPolicy,
    #[serde(default)]
    pub special_abilities: Vec<EnemyAction>,
}

/// Archetype name to behavior profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BehaviorTable {
    profiles: HashMap<String, BehaviorProfile>,
}

impl BehaviorTable {
    /// An empty table; every enemy uses the fallback policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Goblin, orc, skeleton and wizard.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register(
            "goblin",
            BehaviorProfile {
                name: "Goblin".to_string(),
                aggression: 7,
                intelligence: 4,
                teamwork: 6,
                survival: 8,
                preferred_actions: vec![EnemyAction::Attack, EnemyAction::Flee],
                target_priority: TargetPriority::Weakest,
                opening_move: Some(EnemyAction::Attack),
                low_health: LowHealthPolicy {
                    threshold: 0.3,
                    action: LowHealthAction::Flee,
                },
                special_abilities: Vec::new(),
            },
        );
        table.register(
            "orc",
            BehaviorProfile {
                name: "Orc".to_string(),
                aggression: 9,
                intelligence: 3,
                teamwork: 4,
                survival: 5,
                preferred_actions: vec![EnemyAction::Attack, EnemyAction::Berserk],
                target_priority: TargetPriority::Strongest,
                opening_move: Some(EnemyAction::Attack),
                low_health: LowHealthPolicy {
                    threshold: 0.2,
                    action: LowHealthAction::Berserk,
                },
                special_abilities: Vec::new(),
            },
        );
        table.register(
            "skeleton",
            BehaviorProfile {
                name: "Skeleton".to_string(),
                aggression: 6,
                intelligence: 2,
                teamwork: 8,
                survival: 2,
                preferred_actions: vec![EnemyAction::Attack, EnemyAction::Defend],
                target_priority: TargetPriority::Random,
                opening_move: Some(EnemyAction::Attack),
                low_health: LowHealthPolicy {
                    threshold: 0.1,
                    action: LowHealthAction::Defensive,
                },
                special_abilities: Vec::new(),
            },
        );
        table.register(
            "wizard",
            BehaviorProfile {
                name: "Wizard".to_string(),
                aggression: 5,
                intelligence: 9,
                teamwork: 7,
                survival: 9,
                preferred_actions: vec![EnemyAction::CastSpell, EnemyAction::Defend],
                target_priority: TargetPriority::Caster,
                opening_move: Some(EnemyAction::CastSpell),
                low_health: LowHealthPolicy {
                    threshold: 0.4,
                    action: LowHealthAction::Defensive,
                },
                special_abilities: vec!["fireball".into(), "shield".into(), "teleport".into()],
            },
        );
        table
    }

    /// Parse a table from a JSON object of archetype to profile.
    pub fn from_json(json: &str) -> Result<Self, BehaviorError> {
        let mut table: BehaviorTable = serde_json::from_str(json)?;
        table.profiles = table
            .profiles
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Ok(table)
    }

    /// Add or replace profiles from JSON, returning how many were read.
    pub fn merge_json(&mut self, json: &str) -> Result<usize, BehaviorError> {
        let other = Self::from_json(json)?;
        let count = other.profiles.len();
        self.profiles.extend(other.profiles);
        Ok(count)
    }

    pub fn register(&mut self, archetype: impl Into<String>, profile: BehaviorProfile) {
        self.profiles.insert(archetype.into().to_lowercase(), profile);
    }

    pub fn get(&self, archetype: &str) -> Option<&BehaviorProfile> {
        self.profiles.get(&archetype.to_lowercase())
    }

    /// Like [`BehaviorTable::get`], but an error for unknown archetypes.
    pub fn profile(&self, archetype: &str) -> Result<&BehaviorProfile, BehaviorError> {
        self.get(archetype)
            .ok_or_else(|| BehaviorError::UnknownArchetype(archetype.to_string()))
    }

    /// Registered archetype names, sorted.
    pub fn archetypes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

// ============================================================================
// Enemy Turns
// ============================================================================

/// How an enemy attack was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackStyle {
    Standard,
    /// Damage multiplied by 1.5, rounded down.
    Berserk,
    /// Rolled against WIS instead of DEX.
    Spell,
}

/// What the enemy ends up doing on its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnemyTurnOutcome {
    Attack {
        target: MemberId,
        style: AttackStyle,
        hit: bool,
        damage: i32,
    },
    Defend,
    /// Combat ends with no rewards.
    Flee,
    /// Nobody left to act against.
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyTurn {
    pub outcome: EnemyTurnOutcome,
    pub log: Vec<LogEntry>,
}

/// Pick a target among living members by priority.
///
/// Returns `None` only when nobody is alive.
pub fn choose_target(
    priority: TargetPriority,
    party: &Party,
    roller: &mut dyn Roller,
) -> Option<MemberId> {
    let alive: Vec<&PartyMember> = party.alive_members().collect();
    if alive.is_empty() {
        return None;
    }

    let chosen = match priority {
        TargetPriority::Weakest => alive.iter().copied().reduce(|a, b| if b.hp() < a.hp() { b } else { a }),
        TargetPriority::Strongest => alive.iter().copied().reduce(|a, b| if b.hp() > a.hp() { b } else { a }),
        TargetPriority::Healer => alive.iter().copied().find(|m| is_healer(m)),
        TargetPriority::Caster => alive.iter().copied().find(|m| is_caster(m)),
        TargetPriority::Random => None,
    };

    let chosen = chosen.unwrap_or_else(|| alive[roller.pick(alive.len())]);
    Some(chosen.id.clone())
}

fn is_healer(member: &PartyMember) -> bool {
    let class = member.class.name().to_lowercase();
    class.contains("cleric") || class.contains("priest") || member.healing_item_index().is_some()
}

fn is_caster(member: &PartyMember) -> bool {
    let class = member.class.name().to_lowercase();
    class.contains("wizard") || class.contains("mage") || member.stats.intelligence > 14
}

/// Opening move on the first turn, a special ability on a sharp
/// intelligence check, otherwise a preferred action.
pub fn choose_action(
    profile: &BehaviorProfile,
    first_turn: bool,
    roller: &mut dyn Roller,
) -> EnemyAction {
    if first_turn {
        if let Some(opening) = &profile.opening_move {
            return opening.clone();
        }
    }

    let check = roller.roll(20) + profile.intelligence as u32;
    if check >= 15 && !profile.special_abilities.is_empty() {
        let index = roller.pick(profile.special_abilities.len());
        return profile.special_abilities[index].clone();
    }

    if profile.preferred_actions.is_empty() {
        return EnemyAction::Attack;
    }
    let index = roller.pick(profile.preferred_actions.len());
    profile.preferred_actions[index].clone()
}

/// Decide and roll the enemy's turn. Party state is not touched; the combat
/// service applies the outcome.
pub fn enemy_turn(
    table: &BehaviorTable,
    enemy: &Enemy,
    party: &Party,
    first_turn: bool,
    roller: &mut dyn Roller,
) -> EnemyTurn {
    let mut turn = TurnBuilder::new(enemy);

    if party.is_wiped_out() {
        return turn.finish(EnemyTurnOutcome::Wait);
    }

    let Some(profile) = table.get(&enemy.archetype()) else {
        let outcome = turn.random_attack(party, AttackStyle::Standard, roller);
        return turn.finish(outcome);
    };

    if enemy.hit_points.ratio() <= profile.low_health.threshold {
        let outcome = match profile.low_health.action {
            LowHealthAction::Flee => turn.attempt_flee(party, roller),
            LowHealthAction::Berserk => {
                turn.say(format!("The {} enters a berserker rage!", enemy.name));
                turn.random_attack(party, AttackStyle::Berserk, roller)
            }
            LowHealthAction::Defensive => {
                turn.say(format!("The {} takes a defensive stance!", enemy.name));
                EnemyTurnOutcome::Defend
            }
        };
        return turn.finish(outcome);
    }

    let Some(target) = choose_target(profile.target_priority, party, roller) else {
        return turn.finish(EnemyTurnOutcome::Wait);
    };
    let action = choose_action(profile, first_turn, roller);
    log::debug!("{} chooses {} against {}", enemy.name, action, target);

    let outcome = match action {
        EnemyAction::Attack => turn.attack(party, &target, AttackStyle::Standard, roller),
        // The rage bonus belongs to the low-health branch only.
        EnemyAction::Berserk => turn.attack(party, &target, AttackStyle::Standard, roller),
        EnemyAction::CastSpell => turn.attack(party, &target, AttackStyle::Spell, roller),
        EnemyAction::Defend => EnemyTurnOutcome::Defend,
        // A chosen retreat always succeeds; only a wounded enemy has to roll.
        EnemyAction::Flee => EnemyTurnOutcome::Flee,
        EnemyAction::Special(ability) => {
            turn.say(format!("The {} uses {}!", enemy.name, ability));
            turn.attack(party, &target, AttackStyle::Standard, roller)
        }
    };
    turn.finish(outcome)
}

/// Collects log lines while an enemy turn is rolled.
struct TurnBuilder<'a> {
    enemy: &'a Enemy,
    log: Vec<LogEntry>,
}

impl<'a> TurnBuilder<'a> {
    fn new(enemy: &'a Enemy) -> Self {
        Self {
            enemy,
            log: Vec::new(),
        }
    }

    fn say(&mut self, text: String) {
        self.log.push(LogEntry::new(text, LogKind::Combat));
    }

    fn finish(self, outcome: EnemyTurnOutcome) -> EnemyTurn {
        EnemyTurn {
            outcome,
            log: self.log,
        }
    }

    /// 50% escape; a failed attempt becomes a standard attack on a random target.
    fn attempt_flee(&mut self, party: &Party, roller: &mut dyn Roller) -> EnemyTurnOutcome {
        self.say(format!("The {} attempts to flee!", self.enemy.name));
        if roller.chance(50) {
            self.log.push(LogEntry::new(
                format!("The {} escapes into the shadows!", self.enemy.name),
                LogKind::Narrative,
            ));
            EnemyTurnOutcome::Flee
        } else {
            self.say(format!("The {} fails to escape!", self.enemy.name));
            self.random_attack(party, AttackStyle::Standard, roller)
        }
    }

    fn random_attack(
        &mut self,
        party: &Party,
        style: AttackStyle,
        roller: &mut dyn Roller,
    ) -> EnemyTurnOutcome {
        match choose_target(TargetPriority::Random, party, roller) {
            Some(target) => self.attack(party, &target, style, roller),
            None => EnemyTurnOutcome::Wait,
        }
    }

    fn attack(
        &mut self,
        party: &Party,
        target_id: &MemberId,
        style: AttackStyle,
        roller: &mut dyn Roller,
    ) -> EnemyTurnOutcome {
        let target = party
            .member(target_id)
            .unwrap_or_else(|| panic!("enemy target {target_id} not in party"));

        let damage = match style {
            AttackStyle::Spell => spell_attack_damage(self.enemy, target, roller),
            _ => standard_attack_damage(self.enemy, target, style, roller),
        };

        match style {
            AttackStyle::Berserk => self.say(format!(
                "The {}'s berserk attack deals devastating damage!",
                self.enemy.name
            )),
            AttackStyle::Spell => {
                self.say(format!("The {} casts a spell at {}!", self.enemy.name, target.name))
            }
            AttackStyle::Standard => {}
        }

        EnemyTurnOutcome::Attack {
            target: target_id.clone(),
            style,
            hit: damage.is_some(),
            damage: damage.unwrap_or(0),
        }
    }
}

/// d20 + attack against 10 + target DEX mod; on a hit d6 + attack/2.
/// Returns `None` on a miss.
pub fn standard_attack_damage(
    enemy: &Enemy,
    target: &PartyMember,
    style: AttackStyle,
    roller: &mut dyn Roller,
) -> Option<i32> {
    let attack_roll = roller.roll(20) as i32 + enemy.attack;
    let defense = 10 + target.modifier(Ability::Dexterity);
    if attack_roll < defense {
        return None;
    }

    let base = roller.roll(6) as i32 + enemy.attack.div_euclid(2);
    Some(match style {
        AttackStyle::Berserk => (base * 3).div_euclid(2),
        _ => base,
    })
}

/// d20 + attack/2 + 2 against 10 + target WIS mod; on a hit d8 + 2.
pub fn spell_attack_damage(enemy: &Enemy, target: &PartyMember, roller: &mut dyn Roller) -> Option<i32> {
    let attack_roll = roller.roll(20) as i32 + enemy.attack.div_euclid(2) + 2;
    let defense = 10 + target.modifier(Ability::Wisdom);
    if attack_roll < defense {
        return None;
    }
    Some(roller.roll(8) as i32 + 2)
}

// ============================================================================
// Ally Decisions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllyAction {
    Attack,
    Defend,
    /// Use the healing item at `item_index` of the acting member's inventory on `target`.
    UseItem { target: MemberId, item_index: usize },
    /// Nothing useful to do this turn.
    Hold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllyDecision {
    pub action: AllyAction,
    pub log: LogEntry,
}

/// hp below `percent` of max, in integer math.
fn below(member: &PartyMember, percent: i32) -> bool {
    member.hp() * 100 < member.max_hp() * percent
}

/// First living member below `percent` of max hp, in party order.
fn first_injured(party: &Party, percent: i32) -> Option<&PartyMember> {
    party.alive_members().find(|m| below(m, percent))
}

/// Decide a computer-controlled member's turn from its combat AI tag.
pub fn ally_decision(member: &PartyMember, party: &Party) -> AllyDecision {
    let healing_item = member.healing_item_index();

    let (action, text) = match member.combat_ai {
        CombatAi::Support => {
            let critical = first_injured(party, 25);
            let injured = first_injured(party, 50);
            match (critical, injured, healing_item) {
                (Some(target), _, Some(item_index)) => (
                    AllyAction::UseItem {
                        target: target.id.clone(),
                        item_index,
                    },
                    format!("{} rushes to help {}!", member.name, target.name),
                ),
                (None, Some(target), Some(item_index)) => (
                    AllyAction::UseItem {
                        target: target.id.clone(),
                        item_index,
                    },
                    format!("{} assists {}!", member.name, target.name),
                ),
                _ => (
                    AllyAction::Hold,
                    format!(
                        "{} looks for someone to help but finds none in immediate danger.",
                        member.name
                    ),
                ),
            }
        }
        CombatAi::Defensive => {
            if below(member, 40) {
                (
                    AllyAction::Defend,
                    format!("{} takes a cautious defensive stance.", member.name),
                )
            } else {
                (
                    AllyAction::Attack,
                    format!("{} attacks while maintaining guard.", member.name),
                )
            }
        }
        CombatAi::Aggressive => (
            AllyAction::Attack,
            format!("{} charges forward aggressively!", member.name),
        ),
        CombatAi::Balanced => {
            if below(member, 30) {
                (AllyAction::Defend, format!("{} prioritizes survival.", member.name))
            } else if let (Some(target), Some(item_index)) = (first_injured(party, 25), healing_item) {
                (
                    AllyAction::UseItem {
                        target: target.id.clone(),
                        item_index,
                    },
                    format!("{} balances offense with care for allies.", member.name),
                )
            } else {
                (AllyAction::Attack, format!("{} takes a measured approach.", member.name))
            }
        }
    };

    AllyDecision {
        action,
        log: LogEntry::new(text, LogKind::Combat),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_cleric, sample_mage, sample_party, sample_warrior, ScriptedRoller};

    fn goblin(hp: i32) -> Enemy {
        let mut enemy = Enemy::new("Goblin Sneak", 20, 4, 1, 30);
        enemy.hit_points.current = hp;
        enemy
    }

    #[test]
    fn test_action_names_round_trip() {
        assert_eq!(EnemyAction::from("cast_spell"), EnemyAction::CastSpell);
        assert_eq!(
            EnemyAction::from("teleport"),
            EnemyAction::Special("teleport".to_string())
        );
        assert_eq!(String::from(EnemyAction::Berserk), "berserk");
    }

    #[test]
    fn test_weakest_and_strongest_targets() {
        let mut party = sample_party();
        party.members[0].hit_points.current = 12;
        party.members[1].hit_points.current = 3;
        party.members[2].hit_points.current = 0;

        let mut dice = ScriptedRoller::new([]);
        assert_eq!(
            choose_target(TargetPriority::Weakest, &party, &mut dice),
            Some(party.members[1].id.clone())
        );
        assert_eq!(
            choose_target(TargetPriority::Strongest, &party, &mut dice),
            Some(party.members[0].id.clone())
        );
    }

    #[test]
    fn test_role_targets_fall_back_to_random() {
        let party = sample_party();
        let mut dice = ScriptedRoller::new([]);
        // Cleric is the healer, the mage the caster
        assert_eq!(
            choose_target(TargetPriority::Healer, &party, &mut dice),
            Some(party.members[1].id.clone())
        );
        assert_eq!(
            choose_target(TargetPriority::Caster, &party, &mut dice),
            Some(party.members[2].id.clone())
        );

        let mut warriors = sample_party();
        warriors.members.truncate(1);
        warriors.members[0].inventory.clear();
        let mut dice = ScriptedRoller::new([1]);
        assert_eq!(
            choose_target(TargetPriority::Healer, &warriors, &mut dice),
            Some(warriors.members[0].id.clone())
        );
    }

    #[test]
    fn test_dead_members_are_never_targets() {
        let mut party = sample_party();
        for member in &mut party.members {
            member.hit_points.current = 0;
        }
        let mut dice = ScriptedRoller::new([1]);
        assert_eq!(choose_target(TargetPriority::Random, &party, &mut dice), None);

        let turn = enemy_turn(&BehaviorTable::with_defaults(), &goblin(20), &party, false, &mut dice);
        assert_eq!(turn.outcome, EnemyTurnOutcome::Wait);
    }

    #[test]
    fn test_opening_move_then_intelligence_check() {
        let table = BehaviorTable::with_defaults();
        let wizard = table.get("wizard").unwrap();

        let mut dice = ScriptedRoller::new([]);
        assert_eq!(choose_action(wizard, true, &mut dice), EnemyAction::CastSpell);

        // 6 + 9 = 15 picks a special; third special
        let mut dice = ScriptedRoller::new([6, 3]);
        assert_eq!(choose_action(wizard, false, &mut dice), EnemyAction::Special("teleport".into()));

        // 5 + 9 = 14 falls back to preferred; second preferred
        let mut dice = ScriptedRoller::new([5, 2]);
        assert_eq!(choose_action(wizard, false, &mut dice), EnemyAction::Defend);
    }

    #[test]
    fn test_low_health_flee_escapes() {
        let table = BehaviorTable::with_defaults();
        let party = sample_party();
        // 3/20 = 15%, at or below goblin threshold of 30%
        let mut dice = ScriptedRoller::new([50]);
        let turn = enemy_turn(&table, &goblin(3), &party, false, &mut dice);
        assert_eq!(turn.outcome, EnemyTurnOutcome::Flee);
        assert!(turn.log.iter().any(|e| e.text == "The Goblin Sneak escapes into the shadows!"));
    }

    #[test]
    fn test_low_health_failed_flee_attacks() {
        let table = BehaviorTable::with_defaults();
        let party = sample_party();
        // 51 fails; pick member 1; d20 20 hits; d6 3 + 4/2
        let mut dice = ScriptedRoller::new([51, 1, 20, 3]);
        let turn = enemy_turn(&table, &goblin(3), &party, false, &mut dice);
        assert_eq!(
            turn.outcome,
            EnemyTurnOutcome::Attack {
                target: party.members[0].id.clone(),
                style: AttackStyle::Standard,
                hit: true,
                damage: 5,
            }
        );
    }

    #[test]
    fn test_berserk_damage() {
        let table = BehaviorTable::with_defaults();
        let party = sample_party();
        let mut orc = Enemy::new("Orc Brute", 20, 5, 1, 40);
        orc.hit_points.current = 4;
        // pick member 2; d20 19 hits; d6 6 + 5/2 = 8, x1.5 = 12
        let mut dice = ScriptedRoller::new([2, 19, 6]);
        let turn = enemy_turn(&table, &orc, &party, false, &mut dice);
        assert_eq!(
            turn.outcome,
            EnemyTurnOutcome::Attack {
                target: party.members[1].id.clone(),
                style: AttackStyle::Berserk,
                hit: true,
                damage: 12,
            }
        );
        assert_eq!(turn.log[0].text, "The Orc Brute enters a berserker rage!");
    }

    #[test]
    fn test_preferred_flee_always_leaves() {
        let table = BehaviorTable::with_defaults();
        let party = sample_party();
        // 1 + 4 fails the check; second preferred action is flee
        let mut dice = ScriptedRoller::new([1, 2]);
        let turn = enemy_turn(&table, &goblin(20), &party, false, &mut dice);
        assert_eq!(turn.outcome, EnemyTurnOutcome::Flee);
        assert!(turn.log.is_empty());
    }

    #[test]
    fn test_preferred_berserk_is_a_plain_attack() {
        let table = BehaviorTable::with_defaults();
        let party = sample_party();
        let orc = Enemy::new("Orc Brute", 20, 5, 1, 40);
        // 1 + 3 fails the check; second preferred is berserk; d20 19 hits; d6 6 + 5/2
        let mut dice = ScriptedRoller::new([1, 2, 19, 6]);
        let turn = enemy_turn(&table, &orc, &party, false, &mut dice);
        assert_eq!(
            turn.outcome,
            EnemyTurnOutcome::Attack {
                target: party.members[0].id.clone(),
                style: AttackStyle::Standard,
                hit: true,
                damage: 8,
            }
        );
        assert!(turn.log.is_empty());
    }

    #[test]
    fn test_low_health_defensive() {
        let table = BehaviorTable::with_defaults();
        let mut skeleton = Enemy::new("Skeleton Guard", 10, 3, 2, 25);
        skeleton.hit_points.current = 1;
        let mut dice = ScriptedRoller::new([]);
        let turn = enemy_turn(&table, &skeleton, &sample_party(), true, &mut dice);
        assert_eq!(turn.outcome, EnemyTurnOutcome::Defend);
    }

    #[test]
    fn test_unknown_archetype_attacks_random_target() {
        let table = BehaviorTable::with_defaults();
        let wraith = Enemy::new("Shadow Wraith", 10, 4, 0, 35);
        let party = sample_party();
        // pick member 3 (mage, DEX 14 -> AC 12); d20 7 + 4 = 11 misses
        let mut dice = ScriptedRoller::new([3, 7]);
        let turn = enemy_turn(&table, &wraith, &party, true, &mut dice);
        assert_eq!(
            turn.outcome,
            EnemyTurnOutcome::Attack {
                target: party.members[2].id.clone(),
                style: AttackStyle::Standard,
                hit: false,
                damage: 0,
            }
        );
    }

    #[test]
    fn test_spell_attack_uses_wisdom() {
        let wizard = Enemy::new("Wizard Adept", 12, 6, 1, 50);
        let mut cleric = sample_cleric();
        cleric.stats.wisdom = 18;
        // 10 + 3 + 2 = 15 vs 14 hits; d8 4 + 2
        let mut dice = ScriptedRoller::new([10, 4]);
        assert_eq!(spell_attack_damage(&wizard, &cleric, &mut dice), Some(6));
        // 8 + 3 + 2 = 13 misses
        let mut dice = ScriptedRoller::new([8]);
        assert_eq!(spell_attack_damage(&wizard, &cleric, &mut dice), None);
    }

    #[test]
    fn test_behavior_json_override() {
        let mut table = BehaviorTable::with_defaults();
        let json = r#"{
            "Kobold": {
                "name": "Kobold",
                "aggression": 5,
                "intelligence": 6,
                "teamwork": 9,
                "survival": 7,
                "preferred_actions": ["attack", "flee"],
                "target_priority": "healer",
                "low_health": { "threshold": 0.5, "action": "flee" }
            }
        }"#;
        assert_eq!(table.merge_json(json).unwrap(), 1);
        let kobold = table.profile("kobold").unwrap();
        assert_eq!(kobold.target_priority, TargetPriority::Healer);
        assert!(kobold.opening_move.is_none());
        assert_eq!(table.archetypes(), vec!["goblin", "kobold", "orc", "skeleton", "wizard"]);

        assert!(matches!(table.profile("dragon"), Err(BehaviorError::UnknownArchetype(_))));
        assert!(matches!(BehaviorTable::from_json("[1, 2]"), Err(BehaviorError::Parse(_))));
    }

    #[test]
    fn test_support_prefers_critical_ally() {
        let mut party = sample_party();
        let cleric = party.members[1].clone();
        // warrior at 40%, mage at 20%
        party.members[0].hit_points.current = party.members[0].max_hp() * 2 / 5;
        party.members[2].hit_points.current = party.members[2].max_hp() / 5;

        let decision = ally_decision(&cleric, &party);
        assert_eq!(
            decision.action,
            AllyAction::UseItem {
                target: party.members[2].id.clone(),
                item_index: cleric.healing_item_index().unwrap(),
            }
        );
        assert_eq!(decision.log.text, format!("{} rushes to help {}!", cleric.name, party.members[2].name));

        party.members[2].hit_points.current = party.members[2].max_hp();
        let decision = ally_decision(&cleric, &party);
        assert!(matches!(decision.action, AllyAction::UseItem { ref target, .. } if *target == party.members[0].id));
    }

    #[test]
    fn test_support_without_items_holds() {
        let party = sample_party();
        let mut cleric = party.members[1].clone();
        cleric.inventory.clear();
        assert_eq!(ally_decision(&cleric, &party).action, AllyAction::Hold);
    }

    #[test]
    fn test_defensive_and_aggressive() {
        let party = sample_party();
        let mut member = sample_warrior();
        member.combat_ai = CombatAi::Defensive;
        member.hit_points.current = member.max_hp() * 3 / 10;
        assert_eq!(ally_decision(&member, &party).action, AllyAction::Defend);

        member.hit_points.current = member.max_hp();
        assert_eq!(ally_decision(&member, &party).action, AllyAction::Attack);

        member.combat_ai = CombatAi::Aggressive;
        member.hit_points.current = 1;
        let decision = ally_decision(&member, &party);
        assert_eq!(decision.action, AllyAction::Attack);
        assert!(decision.log.text.ends_with("charges forward aggressively!"));
    }

    #[test]
    fn test_balanced_branches() {
        let mut party = sample_party();
        let mut mage = sample_mage();
        mage.combat_ai = CombatAi::Balanced;

        mage.hit_points.current = mage.max_hp() / 5;
        assert_eq!(ally_decision(&mage, &party).action, AllyAction::Defend);

        mage.hit_points.current = mage.max_hp();
        assert_eq!(ally_decision(&mage, &party).action, AllyAction::Attack);

        party.members[0].hit_points.current = 1;
        let potion = mage.healing_item_index().unwrap();
        assert_eq!(
            ally_decision(&mage, &party).action,
            AllyAction::UseItem {
                target: party.members[0].id.clone(),
                item_index: potion,
            }
        );
    }
}
