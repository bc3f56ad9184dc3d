//! Game - the command surface over the rules engine.
//!
//! A [`Game`] owns the party, the dungeon, the encounter in progress and the
//! player-facing log. Every command returns the log entries it produced.
//! Computer-controlled turns (the enemy and non-player members) run
//! automatically after each player action until it is the player's turn
//! again or the encounter ends.
//!
//! [`GameHandle`] wraps a game for shared use. Only one command runs at a
//! time; a command issued while another is in flight fails with
//! [`GameError::Busy`].

use crate::ai::{self, AllyAction, BehaviorError, BehaviorTable};
use crate::character_builder::{roll_stats, BuilderError, CharacterBuilder};
use crate::class_data::{find_recruit, Background};
use crate::combat::{self, CombatEnd, CombatError, CombatState, Combatant, ItemUseError, ItemUseOutcome};
use crate::dice::{Roller, RngRoller};
use crate::dungeon::{self, DEFAULT_MAX_DEPTH, DEFAULT_THEME};
use crate::equipment::{self, EquipError};
use crate::magic::{self, MagicError};
use crate::narrator::{self, CombatEventKind, Narrator};
use crate::party::{PartyError, TransferEnd};
use crate::world::{
    room_id, Ability, CharacterClass, Direction, Dungeon, Enemy, EquipmentSlot, LogEntry, LogKind, MemberId,
    Party, PartyMember, Stats,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

/// Upper bound on automatic turns, enemy and ally alike, between two player
/// turns. Only reached when the player is down and nobody left standing can
/// end the fight.
pub const MAX_AUTO_TURNS: usize = 200;

const SEARCH_FLAVOR: [&str; 5] = [
    "You find nothing of interest.",
    "The shadows yield no secrets.",
    "Your search reveals only dust and echoes.",
    "The room holds no hidden treasures.",
    "You discover only the marks of those who came before.",
];

/// Percent chance of finding loose gold on an otherwise empty search.
const SEARCH_GOLD_CHANCE: u32 = 30;

// ============================================================================
// Errors
// ============================================================================

/// Errors from game commands. Nothing is mutated when a command fails.
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Equip(#[from] EquipError),

    #[error(transparent)]
    Item(#[from] ItemUseError),

    #[error(transparent)]
    Party(#[from] PartyError),

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),

    #[error("Another command is still being processed")]
    Busy,

    #[error("The game is over")]
    GameOver,

    #[error("No game in progress")]
    NotStarted,

    #[error("You cannot go {0} from here.")]
    NoExit(Direction),

    #[error("That can only be done while exploring")]
    NotExploring,

    #[error("No companion named {0} is looking for work")]
    UnknownRecruit(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// How the player's ability scores are produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AbilityScores {
    /// 3d6+3 per ability.
    #[default]
    Rolled,
    /// The standard array assigned in this order.
    StandardArray([Ability; 6]),
    /// Explicit point-buy scores, validated against the budget.
    PointBuy(Stats),
}

/// Configuration for a new game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub player_name: String,
    pub class: CharacterClass,
    pub background: Background,
    pub abilities: AbilityScores,
    pub portrait: Option<String>,
    /// Seed for the dice; entropy when absent.
    pub seed: Option<u64>,
    pub theme: String,
    pub max_depth: u32,
}

impl GameConfig {
    /// A warrior with rolled scores and default dungeon settings.
    pub fn quick_start(name: impl Into<String>) -> Self {
        Self {
            player_name: name.into(),
            class: CharacterClass::Warrior,
            background: Background::default(),
            abilities: AbilityScores::default(),
            portrait: None,
            seed: None,
            theme: DEFAULT_THEME.to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_class(mut self, class: CharacterClass) -> Self {
        self.class = class;
        self
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_portrait(mut self, portrait: impl Into<String>) -> Self {
        self.portrait = Some(portrait.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    fn build_player(&self, roller: &mut dyn Roller) -> Result<PartyMember, BuilderError> {
        let builder = CharacterBuilder::new()
            .name(&self.player_name)
            .class(self.class)
            .background(self.background);
        let builder = match &self.abilities {
            AbilityScores::Rolled => builder.ability_scores(roll_stats(roller)),
            AbilityScores::StandardArray(order) => builder.standard_array(*order),
            AbilityScores::PointBuy(scores) => builder.point_buy(*scores),
        };
        let builder = match &self.portrait {
            Some(portrait) => builder.portrait(portrait),
            None => builder,
        };
        builder.build(roller)
    }
}

/// Where the game stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    CharacterCreation,
    Exploring,
    Combat,
    Defeated,
    Victory,
}

// ============================================================================
// Game
// ============================================================================

/// A running game.
pub struct Game {
    phase: GamePhase,
    party: Party,
    dungeon: Dungeon,
    combat: Option<CombatState>,
    log: Vec<LogEntry>,
    roller: Box<dyn Roller>,
    narrator: Arc<dyn Narrator>,
    behaviors: BehaviorTable,
}

impl Game {
    /// Create the player, the party and the first room.
    pub async fn new(config: GameConfig, narrator: Arc<dyn Narrator>) -> Result<Self, GameError> {
        let roller: Box<dyn Roller> = match config.seed {
            Some(seed) => Box::new(RngRoller::seeded(seed)),
            None => Box::new(RngRoller::from_entropy()),
        };
        Self::with_roller(config, narrator, roller).await
    }

    /// Like [`Game::new`] with an explicit source of dice.
    pub async fn with_roller(
        config: GameConfig,
        narrator: Arc<dyn Narrator>,
        mut roller: Box<dyn Roller>,
    ) -> Result<Self, GameError> {
        let player = config.build_player(roller.as_mut())?;
        let party = Party::new(player, config.background);
        let dungeon = dungeon::generate_dungeon(Some(&party), narrator.as_ref(), &config.theme, config.max_depth).await;

        let mut game = Self {
            phase: GamePhase::Exploring,
            party,
            dungeon,
            combat: None,
            log: Vec::new(),
            roller,
            narrator,
            behaviors: BehaviorTable::with_defaults(),
        };
        game.announce_start(config.background);
        Ok(game)
    }

    /// A game around an existing party, at the entrance of a default dungeon.
    pub async fn from_party(party: Party, narrator: Arc<dyn Narrator>, roller: Box<dyn Roller>) -> Self {
        let dungeon = dungeon::generate_dungeon(Some(&party), narrator.as_ref(), DEFAULT_THEME, DEFAULT_MAX_DEPTH).await;
        Self {
            phase: GamePhase::Exploring,
            party,
            dungeon,
            combat: None,
            log: Vec::new(),
            roller,
            narrator,
            behaviors: BehaviorTable::with_defaults(),
        }
    }

    /// Replace the enemy behavior table.
    pub fn with_behaviors(mut self, behaviors: BehaviorTable) -> Self {
        self.behaviors = behaviors;
        self
    }

    fn announce_start(&mut self, background: Background) {
        let Some(player) = self.party.player() else {
            return;
        };
        let entries = vec![
            LogEntry::new(
                format!("{} the {} enters the dungeon...", player.name, player.class),
                LogKind::Narrative,
            ),
            LogEntry::new(background.data().starting_lore, LogKind::Ai),
            LogEntry::new("The narrator awakens, ready to weave your tale...", LogKind::Ai),
        ];
        log::info!("New game: {} the {}", player.name, player.class);
        self.record(entries);
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn party(&self) -> &Party {
        &self.party
    }

    pub fn party_mut(&mut self) -> &mut Party {
        &mut self.party
    }

    pub fn dungeon(&self) -> &Dungeon {
        &self.dungeon
    }

    pub fn dungeon_mut(&mut self) -> &mut Dungeon {
        &mut self.dungeon
    }

    pub fn combat(&self) -> Option<&CombatState> {
        self.combat.as_ref()
    }

    /// Every log entry since the game started.
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn behaviors(&self) -> &BehaviorTable {
        &self.behaviors
    }

    /// Add or override enemy archetypes from JSON. Returns how many were loaded.
    pub fn merge_behaviors(&mut self, json: &str) -> Result<usize, GameError> {
        Ok(self.behaviors.merge_json(json)?)
    }

    pub fn set_roller(&mut self, roller: Box<dyn Roller>) {
        self.roller = roller;
    }

    fn record(&mut self, entries: Vec<LogEntry>) -> Vec<LogEntry> {
        self.log.extend(entries.iter().cloned());
        entries
    }

    fn ensure_started(&self) -> Result<(), GameError> {
        match self.phase {
            GamePhase::CharacterCreation => Err(GameError::NotStarted),
            GamePhase::Defeated | GamePhase::Victory => Err(GameError::GameOver),
            GamePhase::Exploring | GamePhase::Combat => Ok(()),
        }
    }

    fn ensure_exploring(&self) -> Result<(), GameError> {
        self.ensure_started()?;
        if self.phase == GamePhase::Combat {
            return Err(GameError::NotExploring);
        }
        Ok(())
    }

    /// The player's id, if it is their turn and they can act.
    fn player_turn(&self) -> Result<MemberId, GameError> {
        self.ensure_started()?;
        let combat = self.combat.as_ref().ok_or(CombatError::NotInCombat)?;
        match combat.current() {
            Combatant::Enemy => Err(CombatError::NotYourTurn(combat.enemy.name.clone()).into()),
            Combatant::Member(id) => {
                let member = self.member(id);
                if !member.is_player {
                    Err(CombatError::NotYourTurn(member.name.clone()).into())
                } else if !member.is_alive() {
                    Err(CombatError::MemberIncapacitated(member.name.clone()).into())
                } else {
                    Ok(id.clone())
                }
            }
        }
    }

    fn member(&self, id: &MemberId) -> &PartyMember {
        self.party
            .member(id)
            .unwrap_or_else(|| panic!("member {id} in turn order but not in party"))
    }

    fn member_mut(&mut self, id: &MemberId) -> &mut PartyMember {
        self.party
            .member_mut(id)
            .unwrap_or_else(|| panic!("member {id} in turn order but not in party"))
    }

    // ------------------------------------------------------------------------
    // Exploration
    // ------------------------------------------------------------------------

    /// Leave the current room through an exit.
    pub async fn move_to(&mut self, direction: Direction) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        if !self.dungeon.current_room().has_exit(direction) {
            return Err(GameError::NoExit(direction));
        }

        let mut log = Vec::new();
        if direction == Direction::North && self.dungeon.depth >= self.dungeon.max_depth {
            self.phase = GamePhase::Victory;
            self.dungeon.remember("Conquered the deepest level");
            log::info!("Party cleared {} at depth {}", self.dungeon.theme, self.dungeon.depth);
            log.push(LogEntry::new(
                format!(
                    "Your party emerges from the deepest reaches of the {}, triumphant!",
                    self.dungeon.theme
                ),
                LogKind::Narrative,
            ));
            return Ok(self.record(log));
        }

        let depth = dungeon::next_depth(self.dungeon.depth, direction);
        let index = self.dungeon.rooms_at(depth);
        let id = room_id(depth, index);
        if !self.dungeon.rooms.contains_key(&id) {
            let room = dungeon::generate_room(depth, index, Some(&self.party), self.narrator.as_ref()).await;
            self.dungeon.rooms.insert(id.clone(), room);
        }
        self.dungeon.current_room_id = id;
        self.dungeon.depth = depth;

        let room = self.dungeon.current_room_mut();
        room.explored = true;
        let room_type = room.room_type.clone();
        let enemy = room.enemy.clone().filter(|_| room.has_enemy);

        log.push(LogEntry::new(format!("You move {direction}..."), LogKind::System));
        log.push(LogEntry::new(room.description.clone(), LogKind::Narrative));
        log.push(LogEntry::new(room.symbolic_text.clone(), LogKind::Ai));

        for member in &mut self.party.members {
            member.record_event(format!("Moved {direction} to {room_type} at depth {depth}"));
        }

        let mut log = self.record(log);
        if let Some(enemy) = enemy {
            log.extend(self.begin_combat(enemy).await);
        }
        Ok(log)
    }

    /// Search the current room: loot first, then traps, then nothing much.
    pub async fn search(&mut self) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        let mut log = vec![LogEntry::new("You search the room carefully...", LogKind::System)];

        let depth = self.dungeon.depth;
        let room = self.dungeon.current_room_mut();
        let room_type = room.room_type.clone();

        if room.has_loot && !room.loot.is_empty() {
            let item = room.loot.remove(0);
            if room.loot.is_empty() {
                room.has_loot = false;
            }
            log.push(LogEntry::new(format!("You found: {}!", item.name), LogKind::System));
            let flavor = if item.description.is_empty() {
                "A mysterious item of unknown purpose.".to_string()
            } else {
                item.description.clone()
            };
            log.push(LogEntry::new(flavor, LogKind::Narrative));
            self.party.shared_inventory.push(item);
        } else if room.has_trap {
            room.has_trap = false;
            let damage = self.roller.roll(6) as i32;
            if let Some(player) = self.party.player_mut() {
                let result = player.hit_points.take_damage(damage);
                log.push(LogEntry::new(
                    format!("You triggered a trap! {} takes {damage} damage!", player.name),
                    LogKind::Combat,
                ));
                if result.dropped_to_zero {
                    log.push(LogEntry::new(format!("{} has fallen!", player.name), LogKind::Death));
                }
            }
            if self.party.is_wiped_out() {
                log.push(LogEntry::new("Your party has been defeated...", LogKind::Death));
                self.phase = GamePhase::Defeated;
                self.dungeon.remember("The party fell to a trap");
            }
        } else {
            let line = SEARCH_FLAVOR[self.roller.pick(SEARCH_FLAVOR.len())];
            log.push(LogEntry::new(line, LogKind::Narrative));
            if self.roller.chance(SEARCH_GOLD_CHANCE) {
                let gold = self.roller.roll(10);
                self.party.shared_gold += gold;
                log.push(LogEntry::new(
                    format!("You found {gold} gold pieces hidden in a crevice."),
                    LogKind::System,
                ));
            }
        }

        for member in &mut self.party.members {
            member.record_event(format!("Searched {room_type} at depth {depth}"));
        }
        Ok(self.record(log))
    }

    /// Hire a companion from the roster by name.
    pub async fn recruit(&mut self, name: &str) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        let npc = find_recruit(name).ok_or_else(|| GameError::UnknownRecruit(name.to_string()))?;
        self.party.recruit(&npc)?;

        let log = vec![
            LogEntry::new(format!("{} joins your party!", npc.name), LogKind::System),
            LogEntry::new(format!("\"{}\"", npc.backstory), LogKind::Ai),
        ];
        Ok(self.record(log))
    }

    /// Part ways with a companion. The player cannot be dismissed.
    pub async fn dismiss(&mut self, member: &MemberId) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        let gone = self.party.remove_member(member)?;
        log::info!("{} left the party", gone.name);

        let log = vec![LogEntry::new(format!("{} leaves the party.", gone.name), LogKind::System)];
        Ok(self.record(log))
    }

    /// Move an item between inventories and the shared pool.
    pub async fn transfer_item(
        &mut self,
        from: TransferEnd,
        index: usize,
        to: TransferEnd,
    ) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_started()?;
        let item = self.party.transfer_item(&from, index, &to)?;

        let name_of = |party: &Party, end: &TransferEnd| match end {
            TransferEnd::Member(id) => party.member(id).map(|m| m.name.clone()).unwrap_or_default(),
            TransferEnd::Shared => String::new(),
        };
        let text = match (&from, &to) {
            (TransferEnd::Member(_), TransferEnd::Shared) => {
                format!("{} moved {item} to shared inventory.", name_of(&self.party, &from))
            }
            (TransferEnd::Shared, TransferEnd::Member(_)) => {
                format!("{} took {item} from shared inventory.", name_of(&self.party, &to))
            }
            (TransferEnd::Member(_), TransferEnd::Member(_)) => format!(
                "{} gave {item} to {}.",
                name_of(&self.party, &from),
                name_of(&self.party, &to)
            ),
            (TransferEnd::Shared, TransferEnd::Shared) => format!("{item} stays in shared inventory."),
        };
        Ok(self.record(vec![LogEntry::new(text, LogKind::System)]))
    }

    /// Equip a member's inventory item into a slot.
    pub async fn equip(
        &mut self,
        member: &MemberId,
        index: usize,
        slot: EquipmentSlot,
    ) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        let target = self
            .party
            .member_mut(member)
            .ok_or_else(|| PartyError::UnknownMember(member.clone()))?;
        let item = target
            .inventory
            .get(index)
            .map(|i| i.name.clone())
            .ok_or(EquipError::ItemNotInInventory(index))?;
        let displaced = equipment::equip(target, index, slot)?;

        let mut log = vec![LogEntry::new(
            format!("{} equips {item} ({slot}).", target.name),
            LogKind::System,
        )];
        if let Some(old) = displaced {
            log.push(LogEntry::new(
                format!("{old} returns to {}'s pack.", target.name),
                LogKind::System,
            ));
        }
        Ok(self.record(log))
    }

    pub async fn unequip(&mut self, member: &MemberId, slot: EquipmentSlot) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        let target = self
            .party
            .member_mut(member)
            .ok_or_else(|| PartyError::UnknownMember(member.clone()))?;
        let item = equipment::unequip(target, slot)?;
        let text = format!("{} unequips {item}.", target.name);
        Ok(self.record(vec![LogEntry::new(text, LogKind::System)]))
    }

    /// Restore every member's spell slots.
    pub async fn long_rest(&mut self) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_exploring()?;
        for member in &mut self.party.members {
            magic::long_rest(member);
        }
        Ok(self.record(vec![LogEntry::new(
            "The party rests. Spell slots are restored.",
            LogKind::System,
        )]))
    }

    /// Drop the current game and return to character creation.
    pub async fn reset_game(&mut self) -> Vec<LogEntry> {
        self.phase = GamePhase::CharacterCreation;
        self.combat = None;
        self.log.clear();
        log::info!("Game reset");
        self.record(vec![LogEntry::new("The tale begins anew...", LogKind::System)])
    }

    /// Start over with a new character and dungeon.
    pub async fn new_game(&mut self, config: GameConfig) -> Result<Vec<LogEntry>, GameError> {
        let player = config.build_player(self.roller.as_mut())?;
        let party = Party::new(player, config.background);
        self.dungeon =
            dungeon::generate_dungeon(Some(&party), self.narrator.as_ref(), &config.theme, config.max_depth).await;
        self.party = party;
        self.combat = None;
        self.log.clear();
        self.phase = GamePhase::Exploring;
        self.announce_start(config.background);
        Ok(self.log.clone())
    }

    // ------------------------------------------------------------------------
    // Combat
    // ------------------------------------------------------------------------

    /// Start an encounter and run turns until the player is up.
    pub async fn begin_combat(&mut self, enemy: Enemy) -> Vec<LogEntry> {
        let mut log = vec![LogEntry::new(
            format!("A {} blocks your party's path!", enemy.name),
            LogKind::Combat,
        )];
        if !enemy.symbolic.is_empty() {
            log.push(LogEntry::new(enemy.symbolic.clone(), LogKind::Ai));
        }

        let combat = CombatState::initiate(&self.party, enemy);
        self.phase = GamePhase::Combat;
        self.run_auto_turns(combat, &mut log).await;
        self.record(log)
    }

    /// Weapon attack on the player's turn.
    pub async fn attack(&mut self) -> Result<Vec<LogEntry>, GameError> {
        let id = self.player_turn()?;
        let mut combat = self.take_combat()?;
        let (mut log, end) = self.member_attack(&mut combat, &id, CombatEventKind::PlayerAttack).await;
        self.after_action(combat, end, &mut log).await;
        Ok(self.record(log))
    }

    /// Take a defensive stance. Has no mechanical effect beyond passing the turn.
    pub async fn defend(&mut self) -> Result<Vec<LogEntry>, GameError> {
        let id = self.player_turn()?;
        let combat = self.take_combat()?;
        let mut log = vec![LogEntry::new(
            format!("{} takes a defensive stance.", self.member(&id).name),
            LogKind::Combat,
        )];
        self.after_action(combat, None, &mut log).await;
        Ok(self.record(log))
    }

    /// Cast a spell on the player's turn. Healing goes to `target`, or to
    /// the caster when no target is given; damage goes to the enemy.
    ///
    /// A spell that cannot be cast still spends the turn: the reason is
    /// logged and the enemy acts.
    pub async fn cast_spell(&mut self, spell: &str, target: Option<&MemberId>) -> Result<Vec<LogEntry>, GameError> {
        let id = self.player_turn()?;
        if let Some(target) = target {
            if self.party.member(target).is_none() {
                return Err(PartyError::UnknownMember(target.clone()).into());
            }
        }
        let cast = self.cast_for(&id, spell, target);

        let mut combat = self.take_combat()?;
        let outcome = match cast {
            Ok(outcome) => outcome,
            Err(err) => {
                log::debug!("{} fails to cast {spell}: {err}", self.member(&id).name);
                let mut log = vec![LogEntry::new(err.to_string(), LogKind::System)];
                self.after_action(combat, None, &mut log).await;
                return Ok(self.record(log));
            }
        };
        let mut log = vec![LogEntry::new(outcome.message.clone(), LogKind::Combat)];
        let mut end = None;
        if outcome.damage > 0 && combat::damage_enemy(&mut combat.enemy, outcome.damage) {
            log.push(LogEntry::new(
                format!("The {} is defeated by magic!", combat.enemy.name),
                LogKind::Combat,
            ));
            end = Some(CombatEnd::Victory);
        }
        self.after_action(combat, end, &mut log).await;
        Ok(self.record(log))
    }

    fn cast_for(
        &mut self,
        caster: &MemberId,
        spell: &str,
        target: Option<&MemberId>,
    ) -> Result<magic::CastOutcome, MagicError> {
        let roller = self.roller.as_mut();
        match target.filter(|t| *t != caster) {
            None => {
                let member = self
                    .party
                    .member_mut(caster)
                    .unwrap_or_else(|| panic!("caster {caster} not in party"));
                magic::cast_on_self(member, spell, roller)
            }
            Some(target) => {
                let caster_index = position(&self.party, caster);
                let target_index = position(&self.party, target);
                let (caster, target) = pair_mut(&mut self.party.members, caster_index, target_index);
                magic::cast(caster, spell, Some(target), roller)
            }
        }
    }

    /// Use an inventory item. In combat this takes the player's turn; outside
    /// combat the player may use items freely.
    pub async fn use_item(&mut self, index: usize) -> Result<Vec<LogEntry>, GameError> {
        self.ensure_started()?;
        if self.phase == GamePhase::Exploring {
            let player = self
                .party
                .player_mut()
                .ok_or_else(|| PartyError::UnknownMember(MemberId::player()))?;
            let (_, log) = combat::use_item(player, index, self.roller.as_mut())?;
            return Ok(self.record(log));
        }

        let id = self.player_turn()?;
        let member = self
            .party
            .member_mut(&id)
            .unwrap_or_else(|| panic!("player {id} not in party"));
        let (outcome, mut log) = combat::use_item(member, index, self.roller.as_mut())?;

        let mut combat = self.take_combat()?;
        let mut end = None;
        if let ItemUseOutcome::Scroll(cast) = &outcome {
            if cast.damage > 0 && combat::damage_enemy(&mut combat.enemy, cast.damage) {
                log.push(LogEntry::new(
                    format!("The {} is defeated by the scroll's magic!", combat.enemy.name),
                    LogKind::Combat,
                ));
                end = Some(CombatEnd::Victory);
            }
        }
        self.after_action(combat, end, &mut log).await;
        Ok(self.record(log))
    }

    fn take_combat(&mut self) -> Result<CombatState, GameError> {
        self.combat.take().ok_or_else(|| CombatError::NotInCombat.into())
    }

    /// A member's weapon attack, narrated when the narrator obliges.
    async fn member_attack(
        &mut self,
        combat: &mut CombatState,
        id: &MemberId,
        kind: CombatEventKind,
    ) -> (Vec<LogEntry>, Option<CombatEnd>) {
        let member = self
            .party
            .member(id)
            .unwrap_or_else(|| panic!("attacker {id} not in party"));
        let outcome = combat::resolve_attack(member, &mut combat.enemy, self.roller.as_mut());
        let narration = narrator::narrate_attack(self.narrator.as_ref(), kind, member, &combat.enemy, &outcome).await;
        let log = combat::attack_log(&member.name, &combat.enemy, &outcome, narration);
        let end = outcome.enemy_defeated.then_some(CombatEnd::Victory);
        (log, end)
    }

    /// Close out the acting turn: end the encounter or pass to the next actor.
    async fn after_action(&mut self, mut combat: CombatState, end: Option<CombatEnd>, log: &mut Vec<LogEntry>) {
        if let Some(end) = end {
            self.finish_combat(combat, end, log);
            return;
        }
        self.advance(&mut combat, log);
        self.run_auto_turns(combat, log).await;
    }

    /// Move to the next turn, counting down timed effects when a round ends.
    fn advance(&mut self, combat: &mut CombatState, log: &mut Vec<LogEntry>) {
        if !combat.next_turn() {
            return;
        }
        for member in &mut self.party.members {
            for effect in combat::tick_status_effects(member) {
                log.push(LogEntry::new(
                    format!("The {effect} wears off for {}.", member.name),
                    LogKind::System,
                ));
            }
        }
    }

    /// Run enemy and ally turns until the player can act or the fight ends.
    async fn run_auto_turns(&mut self, mut combat: CombatState, log: &mut Vec<LogEntry>) {
        for _ in 0..MAX_AUTO_TURNS {
            match combat.current().clone() {
                Combatant::Enemy => {
                    let first_turn = combat.enemy_turns == 0;
                    combat.enemy_turns += 1;
                    let turn = ai::enemy_turn(
                        &self.behaviors,
                        &combat.enemy,
                        &self.party,
                        first_turn,
                        self.roller.as_mut(),
                    );
                    log.extend(turn.log);
                    let (entries, end) = combat::apply_enemy_turn(&mut self.party, &combat.enemy, &turn.outcome);
                    log.extend(entries);
                    if let Some(end) = end {
                        self.finish_combat(combat, end, log);
                        return;
                    }
                }
                Combatant::Member(id) => {
                    let member = self.member(&id);
                    if member.is_alive() {
                        if member.is_player {
                            self.combat = Some(combat);
                            return;
                        }
                        if let Some(end) = self.ally_turn(&mut combat, &id, log).await {
                            self.finish_combat(combat, end, log);
                            return;
                        }
                    }
                }
            }
            self.advance(&mut combat, log);
        }

        log::warn!("Combat against {} stalled after {MAX_AUTO_TURNS} turns", combat.enemy.name);
        log.push(LogEntry::new(
            format!("The {} slips away into the darkness.", combat.enemy.name),
            LogKind::Narrative,
        ));
        self.finish_combat(combat, CombatEnd::Fled, log);
    }

    async fn ally_turn(
        &mut self,
        combat: &mut CombatState,
        id: &MemberId,
        log: &mut Vec<LogEntry>,
    ) -> Option<CombatEnd> {
        let decision = ai::ally_decision(self.member(id), &self.party);
        log.push(decision.log);

        match decision.action {
            AllyAction::Attack => {
                let (entries, end) = self.member_attack(combat, id, CombatEventKind::AllyAttack).await;
                log.extend(entries);
                end
            }
            AllyAction::UseItem { target, item_index } => {
                let item = self
                    .member(id)
                    .inventory
                    .get(item_index)
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                match combat::heal_ally(&mut self.party, id, item_index, &target) {
                    Ok(healed) => {
                        let healer = self.member(id).name.clone();
                        let patient = self.member(&target).name.clone();
                        log.push(LogEntry::new(
                            format!("{healer} uses {item} on {patient}, restoring {healed} HP."),
                            LogKind::Combat,
                        ));
                    }
                    Err(err) => log::warn!("Ally item use failed: {err}"),
                }
                None
            }
            AllyAction::Defend | AllyAction::Hold => None,
        }
    }

    fn finish_combat(&mut self, combat: CombatState, end: CombatEnd, log: &mut Vec<LogEntry>) {
        let enemy = combat.enemy;
        log::info!("Combat against {} ended: {end:?}", enemy.name);

        match end {
            CombatEnd::Victory => {
                log.extend(combat::award_victory(&mut self.party, &enemy));
                self.dungeon.remember(format!("Defeated {}", enemy.name));
                self.phase = GamePhase::Exploring;
            }
            CombatEnd::Fled => {
                self.dungeon.remember(format!("{} fled", enemy.name));
                self.phase = GamePhase::Exploring;
            }
            CombatEnd::Defeat => {
                self.dungeon.remember(format!("The party fell to {}", enemy.name));
                self.phase = GamePhase::Defeated;
            }
        }

        let room = self.dungeon.current_room_mut();
        room.enemy = None;
        room.has_enemy = false;
        self.combat = None;
    }
}

fn position(party: &Party, id: &MemberId) -> usize {
    party
        .members
        .iter()
        .position(|m| &m.id == id)
        .unwrap_or_else(|| panic!("member {id} not in party"))
}

/// Two distinct members borrowed mutably at once.
fn pair_mut(members: &mut [PartyMember], a: usize, b: usize) -> (&mut PartyMember, &mut PartyMember) {
    if a < b {
        let (left, right) = members.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = members.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

// ============================================================================
// Shared Handle
// ============================================================================

/// A game shared between tasks. Commands never wait for each other: if
/// another command holds the game, the new one fails with [`GameError::Busy`].
#[derive(Clone)]
pub struct GameHandle {
    inner: Arc<Mutex<Game>>,
}

impl GameHandle {
    pub fn new(game: Game) -> Self {
        Self {
            inner: Arc::new(Mutex::new(game)),
        }
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Game>, GameError> {
        self.inner.try_lock().map_err(|_| GameError::Busy)
    }

    /// Wait for the game, e.g. to read state between commands.
    pub async fn lock(&self) -> MutexGuard<'_, Game> {
        self.inner.lock().await
    }

    pub async fn move_to(&self, direction: Direction) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.move_to(direction).await
    }

    pub async fn search(&self) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.search().await
    }

    pub async fn attack(&self) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.attack().await
    }

    pub async fn defend(&self) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.defend().await
    }

    pub async fn cast_spell(&self, spell: &str, target: Option<&MemberId>) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.cast_spell(spell, target).await
    }

    pub async fn use_item(&self, index: usize) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.use_item(index).await
    }

    pub async fn transfer_item(
        &self,
        from: TransferEnd,
        index: usize,
        to: TransferEnd,
    ) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.transfer_item(from, index, to).await
    }

    pub async fn recruit(&self, name: &str) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.recruit(name).await
    }

    pub async fn dismiss(&self, member: &MemberId) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.dismiss(member).await
    }

    pub async fn equip(
        &self,
        member: &MemberId,
        index: usize,
        slot: EquipmentSlot,
    ) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.equip(member, index, slot).await
    }

    pub async fn unequip(&self, member: &MemberId, slot: EquipmentSlot) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.unequip(member, slot).await
    }

    pub async fn long_rest(&self) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.long_rest().await
    }

    pub async fn reset_game(&self) -> Result<Vec<LogEntry>, GameError> {
        Ok(self.acquire()?.reset_game().await)
    }

    pub async fn new_game(&self, config: GameConfig) -> Result<Vec<LogEntry>, GameError> {
        self.acquire()?.new_game(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::OfflineNarrator;
    use crate::testing::{assert_in_combat, assert_log_contains, assert_not_in_combat, ScriptedRoller, TestHarness};
    use crate::world::Item;

    fn dummy(hp: i32) -> Enemy {
        // "training" has no behavior profile: random target, standard attack.
        Enemy::new("Training Dummy", hp, 0, 0, 30)
    }

    #[tokio::test]
    async fn test_new_game_logs_entry() {
        let config = GameConfig::quick_start("Brakka").with_seed(7);
        let game = Game::new(config, Arc::new(OfflineNarrator)).await.unwrap();

        assert_eq!(game.phase(), GamePhase::Exploring);
        assert_eq!(game.party().members.len(), 1);
        assert_eq!(game.party().shared_gold, 110);
        assert_eq!(game.dungeon().rooms.len(), 1);
        assert_eq!(game.log()[0].text, "Brakka the Warrior enters the dungeon...");
        assert_eq!(game.log()[2].text, "The narrator awakens, ready to weave your tale...");
    }

    #[tokio::test]
    async fn test_point_buy_config_is_validated() {
        let config = GameConfig::quick_start("Brakka").with_abilities(AbilityScores::PointBuy(Stats::uniform(15)));
        let result = Game::with_roller(config, Arc::new(OfflineNarrator), Box::new(ScriptedRoller::new([]))).await;
        assert!(matches!(result, Err(GameError::Builder(BuilderError::OverBudget { .. }))));
    }

    #[tokio::test]
    async fn test_scenario_a_attack_through_game() {
        let mut harness = TestHarness::new([]).await;
        harness.fight(Enemy::new("Training Dummy", 40, 0, 2, 30)).await;

        // Player: d20 15, d6 6. Then cleric holds, mage attacks and misses (d20 1),
        // the dummy attacks and misses (pick 1 -> first member, d20 1).
        harness.script([15, 6, 1, 1, 1]);
        let log = harness.game.attack().await.unwrap();

        assert_eq!(log[0].text, "Brakka rolled 18 to attack.");
        assert_eq!(harness.enemy_hp(), Some(23));
        assert_in_combat(&harness);
        assert!(harness.game.player_turn().is_ok());
    }

    #[tokio::test]
    async fn test_not_your_turn_outside_combat() {
        let mut harness = TestHarness::new([]).await;
        assert!(matches!(
            harness.game.attack().await,
            Err(GameError::Combat(CombatError::NotInCombat))
        ));
        assert!(matches!(harness.game.defend().await, Err(GameError::Combat(_))));
    }

    #[tokio::test]
    async fn test_victory_ends_combat_and_clears_room() {
        let mut harness = TestHarness::new([20, 6]).await;
        harness.fight(dummy(5)).await;
        harness.game.attack().await.unwrap();

        assert_not_in_combat(&harness);
        assert_log_contains(&harness, "Critical hit!");
        assert_log_contains(&harness, "Victory belongs to your party!");
        assert_eq!(harness.member("player").xp, 10);
        assert!(!harness.game.dungeon().current_room().has_enemy);
        assert!(harness.game.dungeon().narrator.memory_events.contains(&"Defeated Training Dummy".to_string()));
    }

    #[tokio::test]
    async fn test_failed_spell_spends_turn() {
        let mut harness = TestHarness::new([1]).await;
        harness.fight(dummy(20)).await;

        let log = harness.game.cast_spell("Magic Missile", None).await.unwrap();
        assert_eq!(log[0].text, "Warrior cannot cast Magic Missile");
        assert_eq!(log[0].kind, LogKind::System);
        assert_in_combat(&harness);
        assert_eq!(harness.game.combat().unwrap().round, 2);
        assert!(harness.game.player_turn().is_ok());
    }

    #[tokio::test]
    async fn test_defend_passes_turn() {
        let mut harness = TestHarness::new([1]).await;
        harness.fight(dummy(20)).await;
        let log = harness.game.defend().await.unwrap();
        assert_eq!(log[0].text, "Brakka takes a defensive stance.");
        assert_eq!(harness.game.combat().unwrap().round, 2);
        assert!(harness.game.player_turn().is_ok());
    }

    #[tokio::test]
    async fn test_move_without_exit() {
        let mut harness = TestHarness::new([]).await;
        // The entrance template at (1, 0) is the corridor: every exit is open.
        harness.game.dungeon_mut().current_room_mut().exits = vec![Direction::North];
        assert!(matches!(
            harness.game.move_to(Direction::West).await,
            Err(GameError::NoExit(Direction::West))
        ));
        assert_eq!(harness.game.dungeon().rooms.len(), 1);
    }

    #[tokio::test]
    async fn test_move_generates_room_and_starts_combat() {
        let mut harness = TestHarness::new([1]).await;
        harness.narrator.queue_room("A flooded nave.", "Water remembers.");
        harness.narrator.queue_encounter(dummy(12));

        let log = harness.game.move_to(Direction::North).await.unwrap();
        assert_eq!(log[0].text, "You move N...");
        assert_eq!(log[1].text, "A flooded nave.");
        assert_eq!(harness.game.dungeon().current_room_id, "room_2_0");
        assert_eq!(harness.game.dungeon().depth, 2);
        assert!(harness.game.dungeon().current_room().explored);
        assert_in_combat(&harness);
        assert_eq!(harness.enemy_hp(), Some(12));
    }

    #[tokio::test]
    async fn test_search_order() {
        let mut harness = TestHarness::new([3]).await;
        let room = harness.game.dungeon_mut().current_room_mut();
        room.has_loot = true;
        room.loot = vec![Item::new("Silver Key", crate::world::ItemKind::Treasure, 5)];
        room.has_trap = true;

        let log = harness.game.search().await.unwrap();
        assert_eq!(log[1].text, "You found: Silver Key!");
        assert_eq!(harness.game.party().shared_inventory.len(), 1);
        assert!(!harness.game.dungeon().current_room().has_loot);

        let log = harness.game.search().await.unwrap();
        assert_eq!(log[1].text, "You triggered a trap! Brakka takes 3 damage!");
        assert_eq!(harness.player_hp(), (19, 22));
        assert!(!harness.game.dungeon().current_room().has_trap);

        // pick(5) with a 3 -> third line; chance(30) with a 3 -> gold d10 = 3
        let log = harness.game.search().await.unwrap();
        assert_eq!(log[1].text, SEARCH_FLAVOR[2]);
        assert_eq!(log[2].text, "You found 3 gold pieces hidden in a crevice.");
        assert_eq!(harness.game.party().shared_gold, 103);
    }

    #[tokio::test]
    async fn test_handle_rejects_concurrent_commands() {
        let harness = TestHarness::new([]).await;
        let handle = GameHandle::new(harness.game);

        let guard = handle.lock().await;
        assert!(matches!(handle.search().await, Err(GameError::Busy)));
        drop(guard);

        assert!(handle.search().await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_and_new_game() {
        let mut harness = TestHarness::new([]).await;
        harness.game.reset_game().await;
        assert_eq!(harness.game.phase(), GamePhase::CharacterCreation);
        assert!(matches!(harness.game.search().await, Err(GameError::NotStarted)));

        let config = GameConfig::quick_start("Vess").with_class(CharacterClass::Mage);
        harness.game.new_game(config).await.unwrap();
        assert_eq!(harness.game.phase(), GamePhase::Exploring);
        assert_eq!(harness.game.party().player().unwrap().name, "Vess");
        assert_eq!(harness.game.party().members.len(), 1);
    }
}
