//! Room and dungeon generation.
//!
//! Layout, loot, traps and enemy presence are pure functions of
//! `(depth, index)`. Only the prose and the enemy itself come from the
//! narrator, with fixed fallbacks when it fails.

use crate::items::LOOT_TABLE;
use crate::narrator::{self, Narrator, RoomDescription};
use crate::world::{room_id, Direction, Dungeon, Enemy, Item, NarratorContext, Party, Room};
use std::collections::HashMap;

pub const DEFAULT_THEME: &str = "Ancient Catacombs";
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Shape of a room before anything is placed in it.
#[derive(Debug, Clone, Copy)]
pub struct RoomTemplate {
    pub room_type: &'static str,
    pub ascii: &'static [&'static str],
    pub exits: &'static [Direction],
}

use Direction::{East, North, South, West};

pub const ROOM_TEMPLATES: &[RoomTemplate] = &[
    RoomTemplate {
        room_type: "entrance",
        ascii: &[
            "+----[ ]----+",
            "|           |",
            "|     @     |",
            "|           |",
            "+-----------+",
        ],
        exits: &[North],
    },
    RoomTemplate {
        room_type: "corridor",
        ascii: &[
            "+---[ ]---+",
            "|  .   .  |",
            "[    @    ]",
            "|  .   .  |",
            "+---[ ]---+",
        ],
        exits: &[North, South, East, West],
    },
    RoomTemplate {
        room_type: "crypt",
        ascii: &[
            "+-----------+",
            "| [=]   [=] |",
            "[     @     ]",
            "| [=]   [=] |",
            "+----[ ]----+",
        ],
        exits: &[South, East, West],
    },
    RoomTemplate {
        room_type: "shrine",
        ascii: &[
            "+----[ ]----+",
            "|     +     |",
            "|    /_\\    |",
            "|     @     ]",
            "+-----------+",
        ],
        exits: &[North, East],
    },
    RoomTemplate {
        room_type: "cavern",
        ascii: &[
            " ,---[ ]--.  ",
            "/  ~    ~  \\ ",
            "[    @     ] ",
            "\\  ~   ~   / ",
            " `---[ ]--'  ",
        ],
        exits: &[North, South, West, East],
    },
    RoomTemplate {
        room_type: "vault",
        ascii: &[
            "+===[ ]===+",
            "|$       $|",
            "|    @    |",
            "|$       $|",
            "+===[ ]===+",
        ],
        exits: &[North, South],
    },
    RoomTemplate {
        room_type: "library",
        ascii: &[
            "+-----------+",
            "|###  @  ###|",
            "[###     ###|",
            "|###     ###|",
            "+----[ ]----+",
        ],
        exits: &[South, West],
    },
];

/// Template for a room: `templates[(depth + index) % len]`.
pub fn template_for(depth: u32, index: u32) -> &'static RoomTemplate {
    &ROOM_TEMPLATES[((depth + index) as usize) % ROOM_TEMPLATES.len()]
}

pub fn has_loot(depth: u32, index: u32) -> bool {
    (depth + index) % 10 < 3 + depth
}

pub fn has_trap(depth: u32, index: u32) -> bool {
    (depth + index * 2) % 10 < 2 + depth / 2
}

pub fn has_enemy(depth: u32, index: u32) -> bool {
    (depth + index * 3) % 10 < 4 + depth
}

/// Loot placed in a flagged room: one item, or two when `(depth + index) % 10 >= 7`.
pub fn loot_for(depth: u32, index: u32) -> Vec<Item> {
    let count = if (depth + index) % 10 < 7 { 1 } else { 2 };
    (0..count)
        .map(|i| LOOT_TABLE[((depth + index + i) as usize) % LOOT_TABLE.len()].clone())
        .collect()
}

/// Depth after leaving in a direction. North goes deeper, south climbs
/// back up but never above depth 1.
pub fn next_depth(depth: u32, direction: Direction) -> u32 {
    match direction {
        Direction::North => depth + 1,
        Direction::South => depth.saturating_sub(1).max(1),
        Direction::East | Direction::West => depth,
    }
}

/// Build the room at `(depth, index)`.
///
/// Without a party there is nobody to describe the room to or to design an
/// encounter around, so the placeholders stay and no enemy is placed.
pub async fn generate_room(depth: u32, index: u32, party: Option<&Party>, narrator: &dyn Narrator) -> Room {
    let template = template_for(depth, index);
    let loot_present = has_loot(depth, index);
    let enemy_present = has_enemy(depth, index);

    let mut room = Room {
        id: room_id(depth, index),
        ascii: template.ascii.iter().map(|line| line.to_string()).collect(),
        exits: template.exits.to_vec(),
        description: narrator::PLACEHOLDER_ROOM_DESCRIPTION.to_string(),
        symbolic_text: narrator::PLACEHOLDER_ROOM_SYMBOLIC.to_string(),
        explored: false,
        has_loot: loot_present,
        has_trap: has_trap(depth, index),
        has_enemy: enemy_present,
        loot: if loot_present { loot_for(depth, index) } else { Vec::new() },
        enemy: None,
        depth,
        room_type: template.room_type.to_string(),
    };

    let Some(party) = party else {
        return room;
    };

    if enemy_present {
        if let Some(player) = party.player() {
            room.enemy = Some(encounter(narrator, template.room_type, depth, player).await);
        }
    }

    if let Some(first) = party.members.first() {
        let RoomDescription {
            description,
            symbolic_text,
        } = match narrator.describe_room(&room, first).await {
            Ok(text) => text,
            Err(err) => {
                log::warn!("Room narration failed for {}, using fallback: {err}", room.id);
                RoomDescription::fallback()
            }
        };
        room.description = description;
        room.symbolic_text = symbolic_text;
    }

    log::debug!(
        "Generated {} ({}) loot={} trap={} enemy={}",
        room.id,
        room.room_type,
        room.has_loot,
        room.has_trap,
        room.has_enemy
    );
    room
}

async fn encounter(
    narrator: &dyn Narrator,
    room_type: &str,
    depth: u32,
    player: &crate::world::PartyMember,
) -> Enemy {
    match narrator.describe_encounter(room_type, depth, player).await {
        Ok(mut enemy) => {
            enemy.ai_generated = true;
            // A fresh encounter always starts at full health.
            enemy.hit_points.current = enemy.hit_points.maximum;
            enemy
        }
        Err(err) => {
            log::warn!("Encounter generation failed at depth {depth}, using fallback: {err}");
            narrator::fallback_enemy(depth)
        }
    }
}

/// A new dungeon: one explored room at depth 1, index 0.
pub async fn generate_dungeon(
    party: Option<&Party>,
    narrator: &dyn Narrator,
    theme: &str,
    max_depth: u32,
) -> Dungeon {
    let mut start = generate_room(1, 0, party, narrator).await;
    start.explored = true;

    let current_room_id = start.id.clone();
    let mut rooms = HashMap::new();
    rooms.insert(start.id.clone(), start);

    log::info!("Generated dungeon \"{theme}\" (max depth {max_depth})");
    Dungeon {
        rooms,
        current_room_id,
        depth: 1,
        max_depth,
        theme: theme.to_string(),
        narrator: NarratorContext::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrator::OfflineNarrator;
    use crate::testing::{sample_party, MockNarrator};

    #[test]
    fn test_presence_thresholds() {
        // depth 1, index 0: 1 < 4 loot, 1 < 2 trap, 1 < 5 enemy
        assert!(has_loot(1, 0));
        assert!(has_trap(1, 0));
        assert!(has_enemy(1, 0));

        // depth 1, index 3: 4 < 4 no loot, 7 < 2 no trap, 0 < 5 enemy
        assert!(!has_loot(1, 3));
        assert!(!has_trap(1, 3));
        assert!(has_enemy(1, 3));

        // depth 4, index 2: 6 < 7 loot, 8 < 4 no trap, 10 % 10 = 0 < 8 enemy
        assert!(has_loot(4, 2));
        assert!(!has_trap(4, 2));
        assert!(has_enemy(4, 2));

        assert!(!has_trap(2, 2)); // 6 < 3
        assert!(!has_enemy(1, 2)); // 7 < 5
    }

    #[test]
    fn test_loot_count_and_indexing() {
        let loot = loot_for(1, 0);
        assert_eq!(loot.len(), 1);
        assert_eq!(loot[0].name, LOOT_TABLE[1].name);

        let loot = loot_for(3, 5);
        assert_eq!(loot.len(), 2);
        assert_eq!(loot[0].name, LOOT_TABLE[8 % LOOT_TABLE.len()].name);
        assert_eq!(loot[1].name, LOOT_TABLE[9 % LOOT_TABLE.len()].name);
    }

    #[test]
    fn test_template_rotation() {
        assert_eq!(template_for(1, 0).room_type, ROOM_TEMPLATES[1].room_type);
        assert_eq!(
            template_for(3, ROOM_TEMPLATES.len() as u32).room_type,
            ROOM_TEMPLATES[3].room_type
        );
        for template in ROOM_TEMPLATES {
            assert!(!template.exits.is_empty());
        }
    }

    #[test]
    fn test_next_depth() {
        assert_eq!(next_depth(1, Direction::North), 2);
        assert_eq!(next_depth(1, Direction::South), 1);
        assert_eq!(next_depth(4, Direction::South), 3);
        assert_eq!(next_depth(4, Direction::East), 4);
    }

    #[tokio::test]
    async fn test_fallbacks_when_narrator_fails() {
        let party = sample_party();
        let room = generate_room(1, 0, Some(&party), &OfflineNarrator).await;

        assert_eq!(room.id, "room_1_0");
        assert_eq!(room.description, narrator::FALLBACK_ROOM_DESCRIPTION);
        assert_eq!(room.symbolic_text, narrator::FALLBACK_ROOM_SYMBOLIC);
        let enemy = room.enemy.expect("depth 1 index 0 has an enemy");
        assert_eq!(enemy.name, "Shadow Wraith");
        assert_eq!(enemy.hit_points.maximum, 10);
        assert!(!enemy.ai_generated);
    }

    #[tokio::test]
    async fn test_narrated_room_and_encounter() {
        let party = sample_party();
        let narrator = MockNarrator::new()
            .with_room("A drowned chapel.", "Water remembers.")
            .with_encounter(Enemy::new("Goblin Cutthroat", 9, 4, 1, 30));

        let room = generate_room(1, 0, Some(&party), &narrator).await;
        assert_eq!(room.description, "A drowned chapel.");
        let enemy = room.enemy.unwrap();
        assert_eq!(enemy.name, "Goblin Cutthroat");
        assert!(enemy.ai_generated);
    }

    #[tokio::test]
    async fn test_without_party_keeps_placeholders() {
        let room = generate_room(1, 0, None, &OfflineNarrator).await;
        assert_eq!(room.description, narrator::PLACEHOLDER_ROOM_DESCRIPTION);
        assert!(room.has_enemy);
        assert!(room.enemy.is_none());
    }

    #[tokio::test]
    async fn test_dungeon_starts_explored() {
        let party = sample_party();
        let dungeon = generate_dungeon(Some(&party), &OfflineNarrator, DEFAULT_THEME, DEFAULT_MAX_DEPTH).await;
        assert_eq!(dungeon.rooms.len(), 1);
        assert_eq!(dungeon.current_room_id, "room_1_0");
        assert!(dungeon.current_room().explored);
        assert_eq!(dungeon.depth, 1);
        assert_eq!(dungeon.theme, "Ancient Catacombs");
        assert_eq!(dungeon.narrator.tone, "mythic");
    }
}
