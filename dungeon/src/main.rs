//! Dungeon - a turn-based dungeon crawler driven over stdin.

mod headless;

use dungeon_core::{Game, GameHandle, OfflineNarrator};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = headless::parse_config_from_args(&args);
    log::info!(
        "Starting {} the {} ({}), seed {:?}",
        config.player_name,
        config.class,
        config.background,
        config.seed
    );

    let game = Game::new(config.clone(), Arc::new(OfflineNarrator)).await?;
    headless::run_headless(GameHandle::new(game), config).await?;
    Ok(())
}

fn print_help() {
    println!("Dungeon - turn-based dungeon crawler");
    println!();
    println!("USAGE:");
    println!("    dungeon [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --name <NAME>          Character name (default: Adventurer)");
    println!("    --class <CLASS>        warrior, mage, rogue, cleric or ranger");
    println!("    --background <BG>      Wanderer, Noble, Acolyte, Scholar or Outcast");
    println!("    --seed <N>             Seed the dice for a repeatable run");
    println!("    --theme <THEME>        Dungeon theme");
    println!("    --depth <N>            Deepest level before victory");
    println!("    -h, --help             Print help information");
    println!();
    println!("Commands are read one per line from stdin. Type #help once running.");
    println!("Set RUST_LOG=debug for engine diagnostics.");
}
