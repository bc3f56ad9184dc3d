//! Party management: membership, the shared pool and recruitment.

use crate::class_data::{Background, RecruitableNpc};
use crate::equipment;
use crate::world::{Ability, Item, MemberId, Party, PartyMember, MAX_PARTY_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Gold every party starts with before the background bonus.
pub const STARTING_GOLD: u32 = 100;
pub const STARTING_MORALE: u8 = 75;
pub const RECRUIT_LOYALTY: u8 = 60;
pub const RECRUIT_MORALE_BOOST: u8 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartyError {
    #[error("Not enough gold: need {needed}, have {available}")]
    InsufficientGold { needed: u32, available: u32 },
    #[error("{name} requires reputation {required} (party has {current})")]
    InsufficientReputation { name: String, required: i32, current: i32 },
    #[error("The party is full ({MAX_PARTY_SIZE} members)")]
    PartyFull,
    #[error("No party member with id {0}")]
    UnknownMember(MemberId),
    #[error("No item at position {0}")]
    BadItemIndex(usize),
    #[error("A member with id {0} is already in the party")]
    DuplicateMember(MemberId),
    #[error("The player cannot leave the party")]
    CannotRemovePlayer,
}

/// One side of an item transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferEnd {
    Member(MemberId),
    Shared,
}

impl Party {
    /// A party of one around the player.
    pub fn new(player: PartyMember, background: Background) -> Self {
        let formation = vec![player.id.clone()];
        Self {
            members: vec![player],
            shared_gold: STARTING_GOLD + background.data().gold,
            shared_inventory: Vec::new(),
            formation,
            morale: STARTING_MORALE,
            reputation: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_PARTY_SIZE
    }

    /// Add a member at the back of the formation.
    pub fn add_member(&mut self, member: PartyMember) -> Result<(), PartyError> {
        if self.is_full() {
            return Err(PartyError::PartyFull);
        }
        if self.member(&member.id).is_some() {
            return Err(PartyError::DuplicateMember(member.id));
        }
        self.formation.push(member.id.clone());
        self.members.push(member);
        Ok(())
    }

    pub fn remove_member(&mut self, id: &MemberId) -> Result<PartyMember, PartyError> {
        let pos = self
            .members
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| PartyError::UnknownMember(id.clone()))?;
        if self.members[pos].is_player {
            return Err(PartyError::CannotRemovePlayer);
        }
        self.formation.retain(|f| f != id);
        Ok(self.members.remove(pos))
    }

    /// Move an item between member inventories and the shared pool.
    ///
    /// Both ends are validated before anything moves. Returns the item's name.
    pub fn transfer_item(&mut self, from: &TransferEnd, index: usize, to: &TransferEnd) -> Result<String, PartyError> {
        if let TransferEnd::Member(id) = to {
            if self.member(id).is_none() {
                return Err(PartyError::UnknownMember(id.clone()));
            }
        }

        let source = self.inventory_mut(from)?;
        if index >= source.len() {
            return Err(PartyError::BadItemIndex(index));
        }
        let item = source.remove(index);
        let name = item.name.clone();

        self.inventory_mut(to)?.push(item);
        Ok(name)
    }

    fn inventory_mut(&mut self, end: &TransferEnd) -> Result<&mut Vec<Item>, PartyError> {
        match end {
            TransferEnd::Shared => Ok(&mut self.shared_inventory),
            TransferEnd::Member(id) => self
                .member_mut(id)
                .map(|m| &mut m.inventory)
                .ok_or_else(|| PartyError::UnknownMember(id.clone())),
        }
    }

    /// Hire a companion. Checks gold, then reputation, then room in the party.
    pub fn recruit(&mut self, npc: &RecruitableNpc) -> Result<MemberId, PartyError> {
        if self.shared_gold < npc.recruitment_cost {
            return Err(PartyError::InsufficientGold {
                needed: npc.recruitment_cost,
                available: self.shared_gold,
            });
        }
        if self.reputation < npc.loyalty_requirement {
            return Err(PartyError::InsufficientReputation {
                name: npc.name.clone(),
                required: npc.loyalty_requirement,
                current: self.reputation,
            });
        }
        if self.is_full() {
            return Err(PartyError::PartyFull);
        }

        let member = recruit_member(npc);
        let id = member.id.clone();
        self.add_member(member)?;
        self.shared_gold -= npc.recruitment_cost;
        self.morale = self.morale.saturating_add(RECRUIT_MORALE_BOOST).min(100);

        log::info!("{} joined the party as {}", npc.name, id);
        Ok(id)
    }
}

fn recruit_member(npc: &RecruitableNpc) -> PartyMember {
    let max_hp = 10 + npc.stats.modifier(Ability::Constitution);
    let mut member = PartyMember::new(MemberId::new_npc(), npc.name.clone(), npc.class, npc.stats, max_hp);

    let class_data = npc.class.data();
    member.inventory = class_data
        .starting_items
        .iter()
        .filter_map(|name| crate::items::get_item(name))
        .collect();
    member.known_spells = class_data.starting_spells.iter().map(|s| s.to_string()).collect();
    member.spell_slots = npc.class.starting_spell_slots();

    member.portrait = npc.portrait.clone();
    member.tags = npc.tags.clone();
    member.personality_traits = npc.traits.clone();
    member.backstory = npc.backstory.clone();
    member.loyalty = RECRUIT_LOYALTY;
    member.combat_ai = npc.combat_ai;
    member.record_event("Joined the party");

    equipment::refresh_stats(&mut member);
    member
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_data::find_recruit;
    use crate::items::get_item;
    use crate::testing::{sample_cleric, sample_mage, sample_party, sample_warrior};
    use crate::world::CombatAi;

    #[test]
    fn test_new_party() {
        let party = Party::new(sample_warrior(), Background::Noble);
        assert_eq!(party.shared_gold, 200);
        assert_eq!(party.morale, 75);
        assert_eq!(party.reputation, 0);
        assert_eq!(party.formation, vec![MemberId::player()]);
    }

    #[test]
    fn test_add_and_remove_keep_formation_in_sync() {
        let mut party = Party::new(sample_warrior(), Background::Wanderer);
        party.add_member(sample_cleric()).unwrap();
        party.add_member(sample_mage()).unwrap();
        assert_eq!(
            party.formation,
            vec![MemberId::player(), MemberId::from("npc_cleric"), MemberId::from("npc_mage")]
        );

        assert_eq!(
            party.add_member(sample_mage()),
            Err(PartyError::DuplicateMember(MemberId::from("npc_mage")))
        );

        let removed = party.remove_member(&MemberId::from("npc_cleric")).unwrap();
        assert_eq!(removed.name, "Aldric");
        assert_eq!(party.formation, vec![MemberId::player(), MemberId::from("npc_mage")]);
        assert!(matches!(
            party.remove_member(&MemberId::player()),
            Err(PartyError::CannotRemovePlayer)
        ));
    }

    #[test]
    fn test_transfer_moves_not_copies() {
        let mut party = sample_party();
        let cleric = MemberId::from("npc_cleric");

        let name = party
            .transfer_item(&TransferEnd::Member(cleric.clone()), 1, &TransferEnd::Shared)
            .unwrap();
        assert_eq!(name, "Healing Potion");
        assert_eq!(party.member(&cleric).unwrap().inventory.len(), 1);
        assert_eq!(party.shared_inventory.len(), 1);

        party
            .transfer_item(&TransferEnd::Shared, 0, &TransferEnd::Member(MemberId::player()))
            .unwrap();
        assert!(party.shared_inventory.is_empty());
        assert_eq!(party.player().unwrap().inventory.last().unwrap().name, "Healing Potion");
    }

    #[test]
    fn test_transfer_validation_leaves_state() {
        let mut party = sample_party();
        let before = party.player().unwrap().inventory.len();

        assert_eq!(
            party.transfer_item(&TransferEnd::Member(MemberId::player()), 9, &TransferEnd::Shared),
            Err(PartyError::BadItemIndex(9))
        );
        assert_eq!(
            party.transfer_item(
                &TransferEnd::Member(MemberId::player()),
                0,
                &TransferEnd::Member(MemberId::from("ghost"))
            ),
            Err(PartyError::UnknownMember(MemberId::from("ghost")))
        );
        assert_eq!(party.player().unwrap().inventory.len(), before);
    }

    #[test]
    fn test_recruit() {
        let mut party = Party::new(sample_warrior(), Background::Wanderer);
        let npc = find_recruit("Brother Aldric").unwrap();

        let id = party.recruit(&npc).unwrap();
        assert!(id.as_str().starts_with("npc_"));
        assert_eq!(party.shared_gold, 60);
        assert_eq!(party.morale, 85);
        assert_eq!(party.formation.last(), Some(&id));

        let member = party.member(&id).unwrap();
        assert_eq!(member.max_hp(), 12); // 10 + CON 14
        assert_eq!(member.hp(), 12);
        assert_eq!(member.loyalty, 60);
        assert_eq!(member.combat_ai, CombatAi::Support);
        assert!(member.knows_spell("Cure Light Wounds"));
        assert!(!member.is_player);
    }

    #[test]
    fn test_recruit_check_order() {
        let mut party = sample_party();
        party.shared_gold = 10;
        party.reputation = 0;
        let veyla = find_recruit("Veyla the Grey").unwrap();

        // Gold is checked before reputation.
        assert!(matches!(party.recruit(&veyla), Err(PartyError::InsufficientGold { .. })));

        party.shared_gold = 500;
        assert!(matches!(
            party.recruit(&veyla),
            Err(PartyError::InsufficientReputation { required: 10, .. })
        ));

        party.reputation = 10;
        party.recruit(&veyla).unwrap();
        assert_eq!(party.members.len(), 4);

        let kessa = find_recruit("Kessa Ironhand").unwrap();
        assert_eq!(party.recruit(&kessa), Err(PartyError::PartyFull));
        assert_eq!(party.shared_gold, 380);
    }

    #[test]
    fn test_morale_caps_at_100() {
        let mut party = Party::new(sample_warrior(), Background::Noble);
        party.morale = 95;
        let id = party.recruit(&find_recruit("Kessa Ironhand").unwrap()).unwrap();
        assert_eq!(party.morale, 100);

        let kessa = party.member(&id).unwrap();
        assert!(kessa.inventory.contains(&get_item("Longsword").unwrap()));
        assert!(kessa.spell_slots.is_empty());
    }
}
