//! QA tests for combat through the game facade.
//!
//! Every test scripts the dice, so outcomes are exact.
//! Run with: `cargo test -p dungeon-core --test qa_combat`

use dungeon_core::class_data::Background;
use dungeon_core::combat::CombatError;
use dungeon_core::testing::{
    assert_hp, assert_in_combat, assert_log_contains, assert_not_in_combat, sample_cleric, sample_party,
    sample_warrior,
};
use dungeon_core::world::{Enemy, Party};
use dungeon_core::{GameError, GamePhase, TestHarness};

fn solo_warrior() -> Party {
    Party::new(sample_warrior(), Background::Wanderer)
}

fn goblin_at(current: i32, maximum: i32) -> Enemy {
    let mut enemy = Enemy::new("Goblin Sneak", maximum, 4, 1, 30);
    enemy.hit_points.current = current;
    enemy
}

// =============================================================================
// TEST 1: Player attack arithmetic (Scenario A)
// =============================================================================

#[tokio::test]
async fn test_warrior_attack_scenario() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.fight(Enemy::new("Training Dummy", 40, 0, 2, 30)).await;
    assert_in_combat(&harness);

    // d20 = 15 -> 15 + 3 = 18 against 12. d6 = 6 -> 8 + 6 + 3 = 17.
    // The dummy then swings: d20 = 1 misses.
    harness.script([15, 6, 1, 1]);
    let log = harness.game.attack().await.unwrap();

    assert_eq!(log[0].text, "Brakka rolled 18 to attack.");
    assert_eq!(log[1].text, "Brakka's strike finds its mark for 17 damage!");
    assert_eq!(harness.enemy_hp(), Some(23));
    assert_log_contains(&harness, "The Training Dummy misses Brakka!");
}

#[tokio::test]
async fn test_attack_threshold() {
    // Defense 2, STR +3: a natural 8 totals 11 and misses, a 9 totals 12 and hits.
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.fight(Enemy::new("Training Dummy", 100, 0, 2, 0)).await;

    harness.script([8, 1]);
    harness.game.attack().await.unwrap();
    assert_eq!(harness.enemy_hp(), Some(100));
    assert_log_contains(&harness, "Brakka's attack misses!");

    harness.script([9, 1, 1]);
    harness.game.attack().await.unwrap();
    assert_eq!(harness.enemy_hp(), Some(100 - (8 + 1 + 3)));
}

#[tokio::test]
async fn test_narrated_hit_replaces_plain_line() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.narrator.queue_combat_text("Steel sings through the dark.");
    harness.fight(Enemy::new("Training Dummy", 40, 0, 2, 30)).await;

    harness.script([15, 6, 1, 1]);
    let log = harness.game.attack().await.unwrap();
    assert_eq!(log[1].text, "Steel sings through the dark.");
}

// =============================================================================
// TEST 2: Victory, XP and level-up
// =============================================================================

#[tokio::test]
async fn test_victory_awards_xp_to_living_members() {
    let mut harness = TestHarness::new([]).await;
    harness.member_mut("npc_mage").hit_points.current = 0;
    harness.fight(Enemy::new("Bone Colossus", 5, 0, 0, 330)).await;

    harness.script([20, 6]);
    harness.game.attack().await.unwrap();

    assert_not_in_combat(&harness);
    assert_eq!(harness.game.phase(), GamePhase::Exploring);
    // 330 / 3 members = 110 each, dead members get nothing.
    assert_eq!(harness.member("player").xp, 110);
    assert_eq!(harness.member("npc_cleric").xp, 110);
    assert_eq!(harness.member("npc_mage").xp, 0);

    assert_eq!(harness.member("player").level, 2);
    assert_eq!(harness.member("player").xp_to_next, 150);
    assert_log_contains(&harness, "Brakka reached level 2!");
    assert!(harness.game.combat().is_none());
}

#[tokio::test]
async fn test_enemy_loot_goes_to_shared_pool() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    let loot = dungeon_core::items::get_item("Iron Helmet").unwrap();
    harness
        .fight(Enemy::new("Training Dummy", 1, 0, 0, 10).with_loot(vec![loot]))
        .await;

    harness.script([15, 1]);
    harness.game.attack().await.unwrap();

    assert_not_in_combat(&harness);
    assert_eq!(harness.game.party().shared_inventory.len(), 1);
    assert_eq!(harness.game.party().shared_inventory[0].name, "Iron Helmet");
}

// =============================================================================
// TEST 3: Enemy flight (Scenario C)
// =============================================================================

#[tokio::test]
async fn test_fleeing_goblin_ends_combat_without_reward() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.fight(goblin_at(3, 20)).await;
    let gold = harness.game.party().shared_gold;

    // 3/20 = 15% is under the goblin's 30% threshold; d100 = 1 escapes.
    harness.script([1]);
    harness.game.defend().await.unwrap();

    assert_not_in_combat(&harness);
    assert_eq!(harness.game.phase(), GamePhase::Exploring);
    assert_log_contains(&harness, "The Goblin Sneak attempts to flee!");
    assert_log_contains(&harness, "The Goblin Sneak escapes into the shadows!");
    assert_eq!(harness.member("player").xp, 0);
    assert_eq!(harness.game.party().shared_gold, gold);
    assert!(harness.game.party().shared_inventory.is_empty());
    assert!(!harness.game.dungeon().current_room().has_enemy);
}

#[tokio::test]
async fn test_failed_escape_becomes_attack() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.fight(goblin_at(3, 20)).await;

    // d100 = 100 fails, pick the only target, d20 = 20 hits, d6 = 4 -> 4 + 2.
    harness.script([100, 1, 20, 4]);
    harness.game.defend().await.unwrap();

    assert_in_combat(&harness);
    assert_log_contains(&harness, "The Goblin Sneak fails to escape!");
    assert_hp(&harness, 16, 22);
}

// =============================================================================
// TEST 4: Defeat
// =============================================================================

#[tokio::test]
async fn test_party_wipe_is_game_over() {
    let mut harness = TestHarness::with_party(solo_warrior(), []).await;
    harness.member_mut("player").hit_points.current = 1;
    harness.fight(Enemy::new("Orc Brute", 30, 10, 1, 50)).await;

    // Orc opens with an attack on the strongest: d20 = 20 hits, d6 = 1.
    harness.script([20, 1]);
    harness.game.defend().await.unwrap();

    assert_eq!(harness.game.phase(), GamePhase::Defeated);
    assert_hp(&harness, 0, 22);
    assert_log_contains(&harness, "Brakka has fallen!");
    assert_log_contains(&harness, "Your party has been defeated...");

    assert!(matches!(harness.game.attack().await, Err(GameError::GameOver)));
    assert!(matches!(harness.game.search().await, Err(GameError::GameOver)));
}

#[tokio::test]
async fn test_one_survivor_keeps_fighting() {
    let mut harness = TestHarness::new([]).await;
    harness.member_mut("npc_cleric").hit_points.current = 0;
    harness.member_mut("npc_mage").hit_points.current = 0;
    harness.fight(Enemy::new("Training Dummy", 50, 0, 0, 0)).await;

    harness.script([1]);
    harness.game.defend().await.unwrap();

    assert_in_combat(&harness);
    assert_eq!(harness.game.phase(), GamePhase::Combat);
    assert!(harness.game.party().alive_members().count() == 1);
}

// =============================================================================
// TEST 5: Turn validation
// =============================================================================

#[tokio::test]
async fn test_commands_need_combat() {
    let mut harness = TestHarness::new([]).await;
    assert!(matches!(
        harness.game.attack().await,
        Err(GameError::Combat(CombatError::NotInCombat))
    ));
    assert!(matches!(
        harness.game.cast_spell("Light", None).await,
        Err(GameError::Combat(CombatError::NotInCombat))
    ));
}

#[tokio::test]
async fn test_exploration_commands_blocked_in_combat() {
    let mut harness = TestHarness::new([]).await;
    harness.fight(Enemy::new("Training Dummy", 50, 0, 0, 0)).await;

    assert!(matches!(harness.game.search().await, Err(GameError::NotExploring)));
    assert!(matches!(harness.game.long_rest().await, Err(GameError::NotExploring)));
    assert!(matches!(
        harness.game.move_to(dungeon_core::Direction::North).await,
        Err(GameError::NotExploring)
    ));
}

// =============================================================================
// TEST 6: Ally turns
// =============================================================================

#[tokio::test]
async fn test_support_cleric_heals_critical_player() {
    let mut harness = TestHarness::new([]).await;
    harness.member_mut("player").hit_points.current = 4;
    harness.fight(Enemy::new("Training Dummy", 50, 0, 0, 0)).await;

    // Mage attacks and misses, dummy misses.
    harness.script([1]);
    harness.game.defend().await.unwrap();

    assert_log_contains(&harness, "Aldric rushes to help Brakka!");
    assert_log_contains(&harness, "Aldric uses Healing Potion on Brakka, restoring 15 HP.");
    assert_hp(&harness, 19, 22);
    assert_eq!(harness.member("npc_cleric").inventory.len(), 1);
}

#[tokio::test]
async fn test_support_without_potion_holds() {
    let mut party = sample_party();
    party.members[1].inventory.truncate(1);
    party.members[2].inventory.truncate(1);
    party.members[0].hit_points.current = 4;

    let mut harness = TestHarness::with_party(party, []).await;
    harness.fight(Enemy::new("Training Dummy", 50, 0, 0, 0)).await;
    harness.script([1]);
    harness.game.defend().await.unwrap();

    assert_log_contains(
        &harness,
        "Aldric looks for someone to help but finds none in immediate danger.",
    );
    assert_hp(&harness, 4, 22);
}

#[tokio::test]
async fn test_dead_allies_are_skipped() {
    let mut harness = TestHarness::new([]).await;
    harness.member_mut("npc_cleric").hit_points.current = 0;
    harness.fight(Enemy::new("Training Dummy", 50, 0, 0, 0)).await;

    harness.script([1]);
    let log = harness.game.defend().await.unwrap();
    assert!(log.iter().all(|entry| !entry.text.starts_with("Aldric")));
    assert!(log.iter().any(|entry| entry.text.starts_with("Morgana")));
}

// =============================================================================
// TEST 7: Stalled fights
// =============================================================================

#[tokio::test]
async fn test_stalled_fight_ends_after_auto_turn_cap() {
    let mut party = solo_warrior();
    party.members[0].hit_points.current = 0;
    party.add_member(sample_cleric()).unwrap();

    // The player is down, the cleric has nobody to help and the dummy
    // misses on every 1, so only the cap ends the fight.
    let mut harness = TestHarness::with_party(party, [1]).await;
    harness.fight(Enemy::new("Training Dummy", 100, 0, 0, 0)).await;

    assert_not_in_combat(&harness);
    assert_log_contains(&harness, "The Training Dummy slips away into the darkness.");
    assert_eq!(harness.game.phase(), GamePhase::Exploring);
    assert_eq!(harness.member("npc_cleric").hp(), harness.member("npc_cleric").max_hp());
}
