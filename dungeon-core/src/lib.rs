//! Turn-based dungeon crawler rules engine with a pluggable narrator.
//!
//! This crate provides:
//! - Character creation, equipment and spellcasting rules
//! - Party management and recruitment
//! - Deterministic room generation with narrated flavor
//! - Turn-based combat with data-driven enemy behavior
//! - A single-writer game facade with a player-facing log
//!
//! # Quick Start
//!
//! ```ignore
//! use dungeon_core::{Direction, Game, GameConfig, OfflineNarrator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::quick_start("Brakka").with_seed(42);
//!     let mut game = Game::new(config, Arc::new(OfflineNarrator)).await?;
//!
//!     for entry in game.move_to(Direction::North).await? {
//!         println!("{}", entry.text);
//!     }
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod character_builder;
pub mod class_data;
pub mod combat;
pub mod dice;
pub mod dungeon;
pub mod equipment;
pub mod game;
pub mod items;
pub mod magic;
pub mod narrator;
pub mod party;
pub mod spells;
pub mod testing;
pub mod world;

// Primary public API
pub use ai::BehaviorTable;
pub use character_builder::{AbilityMethod, CharacterBuilder};
pub use class_data::Background;
pub use dice::{Roller, RngRoller};
pub use game::{AbilityScores, Game, GameConfig, GameError, GameHandle, GamePhase};
pub use narrator::{Narrator, NarratorError, OfflineNarrator};
pub use party::TransferEnd;
pub use testing::{MockNarrator, ScriptedRoller, TestHarness};
pub use world::{CharacterClass, Direction, EquipmentSlot, LogEntry, LogKind, MemberId};
