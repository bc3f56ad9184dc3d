//! Headless mode for the dungeon crawler.
//!
//! A line-oriented front end over [`GameHandle`]: one command per line on
//! stdin, log entries on stdout tagged by kind. Suitable for scripted play
//! and automated testing.

use dungeon_core::world::{LogKind, MemberId};
use dungeon_core::{equipment, magic};
use dungeon_core::{
    Background, CharacterClass, Direction, EquipmentSlot, GameConfig, GameError, GameHandle, LogEntry,
    TransferEnd,
};
use std::io::{self, BufRead, Write};

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move(Direction),
    Search,
    Attack,
    Defend,
    Cast { spell: String, target: Option<MemberId> },
    Use(usize),
    Transfer { from: TransferEnd, index: usize, to: TransferEnd },
    Recruit(String),
    Dismiss(MemberId),
    Equip { member: MemberId, index: usize, slot: EquipmentSlot },
    Unequip { member: MemberId, slot: EquipmentSlot },
    Rest,
    Status,
    Party,
    Room,
    Reset,
    NewGame,
    Behavior(String),
    Help,
    Quit,
}

/// Parse a line. Lines starting with `#` are meta commands; everything else
/// is a game action.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    if let Some(meta) = line.strip_prefix('#') {
        let (word, rest) = split_word(meta);
        return match word.as_str() {
            "quit" | "exit" => Ok(Command::Quit),
            "status" => Ok(Command::Status),
            "party" => Ok(Command::Party),
            "room" => Ok(Command::Room),
            "reset" => Ok(Command::Reset),
            "new" => Ok(Command::NewGame),
            "help" => Ok(Command::Help),
            "behavior" if !rest.is_empty() => Ok(Command::Behavior(rest.to_string())),
            "behavior" => Err("Usage: #behavior <json>".to_string()),
            _ => Err("Unknown command. Type #help for help.".to_string()),
        };
    }

    let (word, rest) = split_word(line);
    let args: Vec<&str> = rest.split_whitespace().collect();
    match word.as_str() {
        "move" | "go" => args
            .first()
            .and_then(|d| Direction::parse(d))
            .map(Command::Move)
            .ok_or_else(|| "Usage: move <n|s|e|w>".to_string()),
        "n" | "s" | "e" | "w" | "north" | "south" | "east" | "west" => Direction::parse(&word)
            .map(Command::Move)
            .ok_or_else(|| "Unknown direction".to_string()),
        "search" => Ok(Command::Search),
        "attack" => Ok(Command::Attack),
        "defend" => Ok(Command::Defend),
        "cast" => {
            let (spell, target) = match rest.rsplit_once('@') {
                Some((spell, target)) => (spell.trim(), Some(MemberId::from(target.trim()))),
                None => (rest, None),
            };
            if spell.is_empty() {
                return Err("Usage: cast <spell> [@member]".to_string());
            }
            Ok(Command::Cast {
                spell: spell.to_string(),
                target,
            })
        }
        "use" => parse_index(args.first()).map(Command::Use),
        "transfer" | "give" => match args.as_slice() {
            [from, index, to] => Ok(Command::Transfer {
                from: transfer_end(from),
                index: parse_index(Some(index))?,
                to: transfer_end(to),
            }),
            _ => Err("Usage: transfer <member|shared> <index> <member|shared>".to_string()),
        },
        "recruit" if !rest.is_empty() => Ok(Command::Recruit(rest.to_string())),
        "recruit" => Err("Usage: recruit <name>".to_string()),
        "dismiss" => match args.as_slice() {
            [member] => Ok(Command::Dismiss(MemberId::from(*member))),
            _ => Err("Usage: dismiss <member>".to_string()),
        },
        "equip" => match args.as_slice() {
            [member, index, slot] => Ok(Command::Equip {
                member: MemberId::from(*member),
                index: parse_index(Some(index))?,
                slot: parse_slot(slot)?,
            }),
            _ => Err("Usage: equip <member> <index> <slot>".to_string()),
        },
        "unequip" => match args.as_slice() {
            [member, slot] => Ok(Command::Unequip {
                member: MemberId::from(*member),
                slot: parse_slot(slot)?,
            }),
            _ => Err("Usage: unequip <member> <slot>".to_string()),
        },
        "rest" => Ok(Command::Rest),
        _ => Err(format!("Unknown action '{word}'. Type #help for help.")),
    }
}

fn split_word(line: &str) -> (String, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (line.to_lowercase(), ""),
    }
}

fn parse_index(arg: Option<&&str>) -> Result<usize, String> {
    arg.and_then(|s| s.parse().ok())
        .ok_or_else(|| "Expected an inventory position".to_string())
}

fn parse_slot(arg: &str) -> Result<EquipmentSlot, String> {
    EquipmentSlot::parse(arg).ok_or_else(|| format!("Unknown slot '{arg}'"))
}

fn transfer_end(arg: &str) -> TransferEnd {
    if arg.eq_ignore_ascii_case("shared") {
        TransferEnd::Shared
    } else {
        TransferEnd::Member(MemberId::from(arg))
    }
}

fn kind_tag(kind: LogKind) -> &'static str {
    match kind {
        LogKind::Combat => "COMBAT",
        LogKind::Narrative => "NARRATIVE",
        LogKind::System => "SYSTEM",
        LogKind::Dice => "DICE",
        LogKind::Death => "DEATH",
        LogKind::Level => "LEVEL",
        LogKind::Ai => "NARRATOR",
    }
}

fn print_log(entries: &[LogEntry]) {
    for entry in entries {
        println!("[{}] {}", kind_tag(entry.kind), entry.text);
    }
}

fn print_help() {
    println!("[HELP]");
    println!("  move <n|s|e|w>                     - Leave through an exit");
    println!("  search                             - Search the room");
    println!("  attack | defend                    - Combat actions");
    println!("  cast <spell> [@member]             - Cast a spell");
    println!("  use <index>                        - Use an inventory item");
    println!("  transfer <from> <index> <to>       - Move an item (member id or 'shared')");
    println!("  recruit <name>                     - Hire a companion");
    println!("  dismiss <member>                   - Part ways with a companion");
    println!("  equip <member> <index> <slot>      - Equip an item");
    println!("  unequip <member> <slot>            - Unequip a slot");
    println!("  rest                               - Restore spell slots");
    println!("  #status #party #room               - Show game state");
    println!("  #behavior <json>                   - Load enemy behavior profiles");
    println!("  #reset | #new                      - Abandon the game / start over");
    println!("  #quit                              - Exit");
}

async fn print_status(handle: &GameHandle) {
    let game = handle.lock().await;
    println!("[STATUS]");
    println!("  Phase: {:?}", game.phase());
    if let Some(player) = game.party().player() {
        println!(
            "  {} the {} - level {}, HP {}/{}, AC {}",
            player.name,
            player.class,
            player.level,
            player.hp(),
            player.max_hp(),
            player.armor_class
        );
    }
    println!("  Depth: {}/{}", game.dungeon().depth, game.dungeon().max_depth);
    println!("  Gold: {}", game.party().shared_gold);
    if let Some(combat) = game.combat() {
        println!(
            "  Fighting: {} (HP {}/{}), round {}",
            combat.enemy.name,
            combat.enemy.hp(),
            combat.enemy.hit_points.maximum,
            combat.round
        );
    }
}

async fn print_party(handle: &GameHandle) {
    let game = handle.lock().await;
    let party = game.party();
    println!("[PARTY] morale {}, reputation {}", party.morale, party.reputation);
    for member in &party.members {
        println!(
            "  {} ({}) {} L{} HP {}/{}",
            member.name,
            member.id,
            member.class,
            member.level,
            member.hp(),
            member.max_hp()
        );
        let ac = equipment::armor_class_breakdown(member);
        println!(
            "    AC {} (base {}, armor {}, shield {}, natural {}, deflection {})",
            ac.total(),
            ac.base,
            ac.armor,
            ac.shield,
            ac.natural,
            ac.deflection
        );
        println!(
            "    Equipped: {} ({} gp, {} lb)",
            equipment::equipped_items_description(member),
            equipment::total_equipment_value(member),
            equipment::equipment_weight(member)
        );
        let spells: Vec<&str> = magic::available_spells(member).into_iter().map(|s| s.name.as_str()).collect();
        if !spells.is_empty() {
            println!("    Spells: {}", spells.join(", "));
        }
        for (i, item) in member.inventory.iter().enumerate() {
            println!("    {i}: {}", item.name);
        }
    }
    for (i, item) in party.shared_inventory.iter().enumerate() {
        println!("  shared {i}: {}", item.name);
    }
}

async fn print_room(handle: &GameHandle) {
    let game = handle.lock().await;
    let room = game.dungeon().current_room();
    println!("[ROOM] {} ({})", room.id, room.room_type);
    for line in &room.ascii {
        println!("  {line}");
    }
    println!("  {}", room.description);
    let exits: Vec<&str> = room.exits.iter().map(|d| d.letter()).collect();
    println!("  Exits: {}", exits.join(" "));
}

async fn dispatch(handle: &GameHandle, command: Command, config: &GameConfig) -> Result<Vec<LogEntry>, GameError> {
    match command {
        Command::Move(direction) => handle.move_to(direction).await,
        Command::Search => handle.search().await,
        Command::Attack => handle.attack().await,
        Command::Defend => handle.defend().await,
        Command::Cast { spell, target } => handle.cast_spell(&spell, target.as_ref()).await,
        Command::Use(index) => handle.use_item(index).await,
        Command::Transfer { from, index, to } => handle.transfer_item(from, index, to).await,
        Command::Recruit(name) => handle.recruit(&name).await,
        Command::Dismiss(member) => handle.dismiss(&member).await,
        Command::Equip { member, index, slot } => handle.equip(&member, index, slot).await,
        Command::Unequip { member, slot } => handle.unequip(&member, slot).await,
        Command::Rest => handle.long_rest().await,
        Command::Reset => handle.reset_game().await,
        Command::NewGame => handle.new_game(config.clone()).await,
        Command::Behavior(json) => {
            let count = handle.lock().await.merge_behaviors(&json)?;
            Ok(vec![LogEntry::new(
                format!("Loaded {count} enemy behavior profile(s)."),
                LogKind::System,
            )])
        }
        Command::Status | Command::Party | Command::Room | Command::Help | Command::Quit => Ok(Vec::new()),
    }
}

/// Run the game in headless mode until stdin closes or `#quit`.
pub async fn run_headless(handle: GameHandle, config: GameConfig) -> io::Result<()> {
    println!("=== Dungeon Headless Mode ===");
    print_log(handle.lock().await.log());
    println!();
    print_help();
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("[ERROR] {message}");
                continue;
            }
        };

        match command {
            Command::Quit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => print_help(),
            Command::Status => print_status(&handle).await,
            Command::Party => print_party(&handle).await,
            Command::Room => print_room(&handle).await,
            command => match dispatch(&handle, command, &config).await {
                Ok(entries) => print_log(&entries),
                Err(e) => println!("[ERROR] {e}"),
            },
        }
        stdout.flush()?;
    }

    Ok(())
}

/// Parse game configuration from command line arguments.
pub fn parse_config_from_args(args: &[String]) -> GameConfig {
    let mut config = GameConfig::quick_start("Adventurer");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--name" => {
                if let Some(name) = args.get(i + 1) {
                    config.player_name = name.clone();
                    i += 1;
                }
            }
            "--class" => {
                if let Some(class) = args.get(i + 1) {
                    config.class = CharacterClass::parse(class).unwrap_or(CharacterClass::Warrior);
                    i += 1;
                }
            }
            "--background" => {
                if let Some(bg) = args.get(i + 1) {
                    config.background = Background::parse(bg).unwrap_or_default();
                    i += 1;
                }
            }
            "--seed" => {
                if let Some(seed) = args.get(i + 1).and_then(|s| s.parse().ok()) {
                    config.seed = Some(seed);
                    i += 1;
                }
            }
            "--theme" => {
                if let Some(theme) = args.get(i + 1) {
                    config.theme = theme.clone();
                    i += 1;
                }
            }
            "--depth" => {
                if let Some(depth) = args.get(i + 1).and_then(|s| s.parse().ok()) {
                    config = config.with_max_depth(depth);
                    i += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_parse_config_from_args() {
        let config = parse_config_from_args(&args("dungeon --name Vess --class mage --background noble --seed 7"));
        assert_eq!(config.player_name, "Vess");
        assert_eq!(config.class, CharacterClass::Mage);
        assert_eq!(config.background, Background::Noble);
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_parse_config_defaults_on_garbage() {
        let config = parse_config_from_args(&args("dungeon --class bard --seed soon --depth 0"));
        assert_eq!(config.player_name, "Adventurer");
        assert_eq!(config.class, CharacterClass::Warrior);
        assert_eq!(config.seed, None);
        assert_eq!(config.max_depth, 1);
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(parse_command("move north"), Ok(Command::Move(Direction::North)));
        assert_eq!(parse_command("W"), Ok(Command::Move(Direction::West)));
        assert_eq!(parse_command("  attack "), Ok(Command::Attack));
        assert_eq!(parse_command("use 2"), Ok(Command::Use(2)));
        assert_eq!(
            parse_command("cast Cure Light Wounds @npc_1"),
            Ok(Command::Cast {
                spell: "Cure Light Wounds".to_string(),
                target: Some(MemberId::from("npc_1")),
            })
        );
        assert_eq!(
            parse_command("transfer player 0 shared"),
            Ok(Command::Transfer {
                from: TransferEnd::Member(MemberId::player()),
                index: 0,
                to: TransferEnd::Shared,
            })
        );
        assert_eq!(
            parse_command("equip player 1 body"),
            Ok(Command::Equip {
                member: MemberId::player(),
                index: 1,
                slot: EquipmentSlot::Body,
            })
        );
        assert_eq!(
            parse_command("recruit Brother Aldric"),
            Ok(Command::Recruit("Brother Aldric".to_string()))
        );
        assert_eq!(
            parse_command("dismiss npc_1"),
            Ok(Command::Dismiss(MemberId::from("npc_1")))
        );
    }

    #[test]
    fn test_parse_meta_commands() {
        assert_eq!(parse_command("#quit"), Ok(Command::Quit));
        assert_eq!(
            parse_command("#behavior {\"a\": 1}"),
            Ok(Command::Behavior("{\"a\": 1}".to_string()))
        );
        assert!(parse_command("#behavior").is_err());
        assert!(parse_command("#dance").is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("move up").is_err());
        assert!(parse_command("use potion").is_err());
        assert!(parse_command("equip player one body").is_err());
        assert!(parse_command("unequip player pocket").is_err());
        assert!(parse_command("dismiss").is_err());
        assert!(parse_command("dance").is_err());
    }
}
