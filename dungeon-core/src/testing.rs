//! Testing utilities for the dungeon engine.
//!
//! This module provides tools for deterministic tests:
//! - `ScriptedRoller` for fixed dice sequences
//! - `MockNarrator` for scripted narrator responses and failures
//! - `TestHarness` for scripted game scenarios
//! - Sample members and a sample party
//! - Assertion helpers for verifying game state

use crate::dice::Roller;
use crate::game::{Game, GamePhase};
use crate::items::get_item;
use crate::narrator::{CombatEventKind, Narrator, NarratorError, RoomDescription};
use crate::combat::AttackOutcome;
use crate::equipment;
use crate::world::{
    CharacterClass, CombatAi, Enemy, Item, LogEntry, MemberId, Party, PartyMember, Room, SpellSlot, Stats,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ============================================================================
// Dice
// ============================================================================

/// A roller that returns scripted faces in order.
///
/// Each face is clamped to `[1, sides]` for the die being rolled. Once the
/// script runs out the last scripted face repeats (1 if nothing was scripted).
#[derive(Debug, Clone, Default)]
pub struct ScriptedRoller {
    faces: VecDeque<u32>,
    last: Option<u32>,
    rolled: usize,
}

impl ScriptedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            last: None,
            rolled: 0,
        }
    }

    /// Append more faces to the script.
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    /// Faces not yet consumed.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }

    /// Total rolls made so far.
    pub fn rolled(&self) -> usize {
        self.rolled
    }
}

impl Roller for ScriptedRoller {
    fn roll(&mut self, sides: u32) -> u32 {
        let face = match self.faces.pop_front() {
            Some(face) => {
                self.last = Some(face);
                face
            }
            None => self.last.unwrap_or(1),
        };
        self.rolled += 1;
        face.clamp(1, sides.max(1))
    }
}

// ============================================================================
// Narrator
// ============================================================================

fn pop<T>(queue: &Mutex<VecDeque<Result<T, NarratorError>>>) -> Result<T, NarratorError> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
        .unwrap_or_else(|| Err(NarratorError::Unavailable("nothing scripted".to_string())))
}

fn push<T>(queue: &Mutex<VecDeque<Result<T, NarratorError>>>, value: Result<T, NarratorError>) {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push_back(value);
}

/// A narrator that returns scripted responses in order.
///
/// Anything not scripted fails with `Unavailable`, so the engine's
/// fallbacks are exercised by default.
#[derive(Debug, Default)]
pub struct MockNarrator {
    rooms: Mutex<VecDeque<Result<RoomDescription, NarratorError>>>,
    combat: Mutex<VecDeque<Result<String, NarratorError>>>,
    encounters: Mutex<VecDeque<Result<Enemy, NarratorError>>>,
}

impl MockNarrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(self, description: impl Into<String>, symbolic_text: impl Into<String>) -> Self {
        self.queue_room(description, symbolic_text);
        self
    }

    pub fn with_combat_text(self, text: impl Into<String>) -> Self {
        self.queue_combat_text(text);
        self
    }

    pub fn with_encounter(self, enemy: Enemy) -> Self {
        self.queue_encounter(enemy);
        self
    }

    pub fn queue_room(&self, description: impl Into<String>, symbolic_text: impl Into<String>) {
        push(
            &self.rooms,
            Ok(RoomDescription {
                description: description.into(),
                symbolic_text: symbolic_text.into(),
            }),
        );
    }

    pub fn queue_combat_text(&self, text: impl Into<String>) {
        push(&self.combat, Ok(text.into()));
    }

    pub fn queue_encounter(&self, enemy: Enemy) {
        push(&self.encounters, Ok(enemy));
    }

    /// Make the next encounter request fail.
    pub fn queue_encounter_failure(&self, reason: impl Into<String>) {
        push(&self.encounters, Err(NarratorError::Rejected(reason.into())));
    }
}

#[async_trait]
impl Narrator for MockNarrator {
    async fn describe_room(&self, _room: &Room, _member: &PartyMember) -> Result<RoomDescription, NarratorError> {
        pop(&self.rooms)
    }

    async fn describe_combat_event(
        &self,
        _kind: CombatEventKind,
        _actor: &PartyMember,
        _enemy: &Enemy,
        _outcome: &AttackOutcome,
    ) -> Result<String, NarratorError> {
        pop(&self.combat)
    }

    async fn describe_encounter(
        &self,
        _room_type: &str,
        _depth: u32,
        _member: &PartyMember,
    ) -> Result<Enemy, NarratorError> {
        pop(&self.encounters)
    }
}

// ============================================================================
// Sample Party
// ============================================================================

fn catalog_item(name: &str) -> Item {
    get_item(name).unwrap_or_else(|| panic!("{name} missing from the item catalog"))
}

fn caster_kit(member: &mut PartyMember) {
    member.known_spells = member
        .class
        .data()
        .starting_spells
        .iter()
        .map(|s| s.to_string())
        .collect();
    member.spell_slots = vec![SpellSlot::new(1, 2)];
}

/// Level-1 warrior player: STR 16, DEX 12, 22 hp, carrying a longsword and
/// leather armor (nothing equipped).
pub fn sample_warrior() -> PartyMember {
    let mut member = PartyMember::new(
        MemberId::player(),
        "Brakka",
        CharacterClass::Warrior,
        Stats::new(16, 12, 14, 10, 10, 8),
        22,
    );
    member.is_player = true;
    member.portrait = "@".to_string();
    member.inventory = vec![catalog_item("Longsword"), catalog_item("Leather Armor")];
    equipment::refresh_stats(&mut member);
    member
}

/// Support cleric with a healing potion at inventory index 1.
pub fn sample_cleric() -> PartyMember {
    let mut member = PartyMember::new(
        MemberId::from("npc_cleric"),
        "Aldric",
        CharacterClass::Cleric,
        Stats::new(12, 10, 14, 10, 16, 12),
        12,
    );
    member.combat_ai = CombatAi::Support;
    member.loyalty = 60;
    member.inventory = vec![catalog_item("Warhammer"), catalog_item("Healing Potion")];
    caster_kit(&mut member);
    equipment::refresh_stats(&mut member);
    member
}

/// Balanced mage with INT 17.
pub fn sample_mage() -> PartyMember {
    let mut member = PartyMember::new(
        MemberId::from("npc_mage"),
        "Morgana",
        CharacterClass::Mage,
        Stats::new(8, 14, 12, 17, 12, 10),
        10,
    );
    member.loyalty = 60;
    member.inventory = vec![catalog_item("Wooden Staff"), catalog_item("Minor Healing Potion")];
    caster_kit(&mut member);
    equipment::refresh_stats(&mut member);
    member
}

/// Warrior, cleric and mage, in that formation order.
pub fn sample_party() -> Party {
    let members = vec![sample_warrior(), sample_cleric(), sample_mage()];
    let formation = members.iter().map(|m| m.id.clone()).collect();
    Party {
        members,
        shared_gold: 100,
        shared_inventory: Vec::new(),
        formation,
        morale: 75,
        reputation: 0,
    }
}

// ============================================================================
// Game Harness
// ============================================================================

/// Test harness for running game scenarios with scripted dice and narration.
pub struct TestHarness {
    pub game: Game,
    /// Shared with the game; script more responses at any time.
    pub narrator: Arc<MockNarrator>,
}

impl TestHarness {
    /// The sample party at the dungeon entrance.
    pub async fn new(dice: impl IntoIterator<Item = u32>) -> Self {
        Self::with_party(sample_party(), dice).await
    }

    /// A custom party at the dungeon entrance.
    pub async fn with_party(party: Party, dice: impl IntoIterator<Item = u32>) -> Self {
        let narrator = Arc::new(MockNarrator::new());
        let game = Game::from_party(party, narrator.clone(), Box::new(ScriptedRoller::new(dice))).await;
        Self { game, narrator }
    }

    /// Replace the dice script.
    pub fn script(&mut self, dice: impl IntoIterator<Item = u32>) {
        self.game.set_roller(Box::new(ScriptedRoller::new(dice)));
    }

    /// Start a fight with `enemy` in the current room.
    pub async fn fight(&mut self, enemy: Enemy) -> Vec<LogEntry> {
        self.game.begin_combat(enemy).await
    }

    pub fn member(&self, id: &str) -> &PartyMember {
        self.game
            .party()
            .member(&MemberId::from(id))
            .unwrap_or_else(|| panic!("no member {id}"))
    }

    pub fn member_mut(&mut self, id: &str) -> &mut PartyMember {
        self.game
            .party_mut()
            .member_mut(&MemberId::from(id))
            .unwrap_or_else(|| panic!("no member {id}"))
    }

    /// Player HP as (current, max).
    pub fn player_hp(&self) -> (i32, i32) {
        let hp = &self.member("player").hit_points;
        (hp.current, hp.maximum)
    }

    pub fn enemy_hp(&self) -> Option<i32> {
        self.game.combat().map(|c| c.enemy.hp())
    }

    pub fn in_combat(&self) -> bool {
        self.game.phase() == GamePhase::Combat
    }

    /// True if any log line so far contains `text`.
    pub fn log_contains(&self, text: &str) -> bool {
        self.game.log().iter().any(|entry| entry.text.contains(text))
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert player HP is at expected values.
#[track_caller]
pub fn assert_hp(harness: &TestHarness, current: i32, max: i32) {
    let (actual_current, actual_max) = harness.player_hp();
    assert_eq!(
        (actual_current, actual_max),
        (current, max),
        "Expected HP {current}/{max}, got {actual_current}/{actual_max}"
    );
}

#[track_caller]
pub fn assert_in_combat(harness: &TestHarness) {
    assert!(harness.in_combat(), "Expected to be in combat");
}

#[track_caller]
pub fn assert_not_in_combat(harness: &TestHarness) {
    assert!(!harness.in_combat(), "Expected to NOT be in combat");
}

#[track_caller]
pub fn assert_log_contains(harness: &TestHarness, text: &str) {
    assert!(
        harness.log_contains(text),
        "Expected a log line containing '{text}', log was: {:#?}",
        harness.game.log()
    );
}
