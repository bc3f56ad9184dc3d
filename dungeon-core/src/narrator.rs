//! Narrative collaborator.
//!
//! Room prose, combat color and encounter design come from a [`Narrator`].
//! Any narrator call may fail; the engine then uses the fixed fallbacks in
//! this module and carries on without telling the player.

use crate::combat::AttackOutcome;
use crate::world::{Enemy, PartyMember, Room};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FALLBACK_ROOM_DESCRIPTION: &str =
    "A chamber carved from living stone, its walls bearing the weight of ages.";
pub const FALLBACK_ROOM_SYMBOLIC: &str = "The darkness watches and remembers.";
pub const PLACEHOLDER_ROOM_DESCRIPTION: &str = "A chamber awaiting description...";
pub const PLACEHOLDER_ROOM_SYMBOLIC: &str = "The narrator prepares to speak...";
pub const FALLBACK_ENEMY_NAME: &str = "Shadow Wraith";
pub const FALLBACK_ENEMY_SYMBOLIC: &str = "A fragment of darkness given malevolent form.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NarratorError {
    #[error("Narrator unavailable: {0}")]
    Unavailable(String),
    #[error("Narrator rejected the request: {0}")]
    Rejected(String),
}

/// Prose for a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomDescription {
    pub description: String,
    pub symbolic_text: String,
}

impl RoomDescription {
    pub fn fallback() -> Self {
        Self {
            description: FALLBACK_ROOM_DESCRIPTION.to_string(),
            symbolic_text: FALLBACK_ROOM_SYMBOLIC.to_string(),
        }
    }
}

/// Who did the thing being narrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatEventKind {
    PlayerAttack,
    AllyAttack,
}

/// Source of flavor text and encounters.
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn describe_room(&self, room: &Room, member: &PartyMember) -> Result<RoomDescription, NarratorError>;

    async fn describe_combat_event(
        &self,
        kind: CombatEventKind,
        actor: &PartyMember,
        enemy: &Enemy,
        outcome: &AttackOutcome,
    ) -> Result<String, NarratorError>;

    async fn describe_encounter(
        &self,
        room_type: &str,
        depth: u32,
        member: &PartyMember,
    ) -> Result<Enemy, NarratorError>;
}

/// Narrator used when no text generator is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNarrator;

#[async_trait]
impl Narrator for OfflineNarrator {
    async fn describe_room(&self, _room: &Room, _member: &PartyMember) -> Result<RoomDescription, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }

    async fn describe_combat_event(
        &self,
        _kind: CombatEventKind,
        _actor: &PartyMember,
        _enemy: &Enemy,
        _outcome: &AttackOutcome,
    ) -> Result<String, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }

    async fn describe_encounter(
        &self,
        _room_type: &str,
        _depth: u32,
        _member: &PartyMember,
    ) -> Result<Enemy, NarratorError> {
        Err(NarratorError::Unavailable("offline".to_string()))
    }
}

/// Baseline encounter scaled by depth.
pub fn fallback_enemy(depth: u32) -> Enemy {
    let depth = depth as i32;
    Enemy::new(
        FALLBACK_ENEMY_NAME,
        8 + 2 * depth,
        3 + depth,
        depth / 2,
        (20 + 15 * depth) as u32,
    )
    .with_symbolic(FALLBACK_ENEMY_SYMBOLIC)
}

/// Plain hit line used when combat narration fails.
pub fn fallback_combat_text(actor: &str, damage: i32) -> String {
    format!("{actor}'s strike finds its mark for {damage} damage!")
}

/// Ask for attack narration, returning `None` on failure so the caller
/// logs the plain line.
pub async fn narrate_attack(
    narrator: &dyn Narrator,
    kind: CombatEventKind,
    actor: &PartyMember,
    enemy: &Enemy,
    outcome: &AttackOutcome,
) -> Option<String> {
    if !outcome.hit {
        return None;
    }
    match narrator.describe_combat_event(kind, actor, enemy, outcome).await {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("Combat narration failed, using fallback: {err}");
            None
        }
    }
}
