//! Hotbar/inventory transactions
//!
//! Every operation here validates fully before touching any slot, so a
//! rejected request leaves the loadout exactly as it was. Successful
//! operations only rearrange existing petal instances: the set of petal ids
//! across hotbar and inventory is the same before and after.

use crate::ws::protocol::{InventorySync, PetalKind, SlotArea, SlotRef, WirePetal};

use super::petal::{Petal, PetalId};

/// Fixed hotbar size
pub const HOTBAR_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("{area:?} slot {index} is out of range")]
    SlotOutOfRange { area: SlotArea, index: usize },

    #[error("source slot is empty")]
    EmptySource,

    #[error("hotbar holds at most 5 slots, got {0}")]
    HotbarCapacity(usize),

    #[error("unknown petal: {0}")]
    UnknownPetal(String),

    #[error("petal {0} listed more than once")]
    DuplicatePetal(PetalId),

    #[error("layout accounts for {found} of {expected} petals")]
    Conservation { expected: usize, found: usize },
}

impl InventoryError {
    /// True when the request would have created or destroyed petals, as
    /// opposed to merely pointing at a bad slot
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            InventoryError::HotbarCapacity(_)
                | InventoryError::UnknownPetal(_)
                | InventoryError::DuplicatePetal(_)
                | InventoryError::Conservation { .. }
        )
    }
}

/// A player's equipped hotbar plus unordered backpack
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Loadout {
    hotbar: [Option<Petal>; HOTBAR_SIZE],
    inventory: Vec<Petal>,
}

impl Loadout {
    /// Fill hotbar slots in order; anything past the hotbar goes to the inventory
    pub fn new(petals: impl IntoIterator<Item = Petal>) -> Self {
        let mut loadout = Self::default();
        for (i, petal) in petals.into_iter().enumerate() {
            if i < HOTBAR_SIZE {
                loadout.hotbar[i] = Some(petal);
            } else {
                loadout.inventory.push(petal);
            }
        }
        loadout
    }

    pub fn hotbar(&self) -> &[Option<Petal>] {
        &self.hotbar
    }

    pub fn inventory(&self) -> &[Petal] {
        &self.inventory
    }

    /// Equipped petals with their hotbar slot index
    pub fn equipped(&self) -> impl Iterator<Item = (usize, &Petal)> {
        self.hotbar
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|p| (i, p)))
    }

    pub fn equipped_mut(&mut self) -> impl Iterator<Item = (usize, &mut Petal)> {
        self.hotbar
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|p| (i, p)))
    }

    pub fn petals_mut(&mut self) -> impl Iterator<Item = &mut Petal> {
        self.hotbar.iter_mut().flatten().chain(self.inventory.iter_mut())
    }

    /// Put a newly picked-up petal into the inventory
    pub fn stash(&mut self, petal: Petal) {
        self.inventory.push(petal);
    }

    /// Move the petal at `from` to `to`, swapping with whatever is there.
    ///
    /// `Inventory` destinations may use `index == len` to append.
    pub fn move_petal(&mut self, from: SlotRef, to: SlotRef) -> Result<(), InventoryError> {
        self.check_slot(from, false)?;
        self.check_slot(to, true)?;
        if self.slot(from).is_none() {
            return Err(InventoryError::EmptySource);
        }
        if from == to {
            return Ok(());
        }

        match (from.area, to.area) {
            (SlotArea::Hotbar, SlotArea::Hotbar) => {
                self.hotbar.swap(from.index, to.index);
            }
            (SlotArea::Inventory, SlotArea::Inventory) => {
                if to.index == self.inventory.len() {
                    let petal = self.inventory.remove(from.index);
                    self.inventory.push(petal);
                } else {
                    self.inventory.swap(from.index, to.index);
                }
            }
            (SlotArea::Inventory, SlotArea::Hotbar) => {
                let incoming = self.inventory.remove(from.index);
                if let Some(displaced) = self.hotbar[to.index].replace(incoming) {
                    self.inventory.insert(from.index, displaced);
                }
            }
            (SlotArea::Hotbar, SlotArea::Inventory) => {
                let Some(outgoing) = self.hotbar[from.index].take() else {
                    return Err(InventoryError::EmptySource);
                };
                if to.index == self.inventory.len() {
                    self.inventory.push(outgoing);
                } else {
                    let displaced = std::mem::replace(&mut self.inventory[to.index], outgoing);
                    self.hotbar[from.index] = Some(displaced);
                }
            }
        }

        Ok(())
    }

    /// Apply a client-proposed layout.
    ///
    /// The proposal must mention every owned petal exactly once. Server-side
    /// petal records (hp, reload) are kept; only positions come from the
    /// client. Returns whether the layout actually changed.
    pub fn sync(&mut self, layout: &InventorySync) -> Result<bool, InventoryError> {
        if layout.petals.len() > HOTBAR_SIZE {
            return Err(InventoryError::HotbarCapacity(layout.petals.len()));
        }

        let owned: Vec<&Petal> = self
            .hotbar
            .iter()
            .flatten()
            .chain(self.inventory.iter())
            .collect();
        let mut claimed = vec![false; owned.len()];
        let mut hotbar_claims: Vec<Option<usize>> = vec![None; HOTBAR_SIZE];
        let mut inventory_claims: Vec<Option<usize>> = vec![None; layout.inventory.len()];

        // Explicit ids first so a legacy type string never steals a petal
        // that is referenced by id elsewhere in the same layout.
        for (slot, entry) in layout.petals.iter().enumerate() {
            if let Some(WirePetal::Full(view)) = entry {
                hotbar_claims[slot] = Some(claim_id(&owned, &mut claimed, view.id)?);
            }
        }
        for (i, entry) in layout.inventory.iter().enumerate() {
            if let WirePetal::Full(view) = entry {
                inventory_claims[i] = Some(claim_id(&owned, &mut claimed, view.id)?);
            }
        }
        for (slot, entry) in layout.petals.iter().enumerate() {
            if let Some(WirePetal::Legacy(kind)) = entry {
                hotbar_claims[slot] = Some(claim_kind(&owned, &mut claimed, *kind)?);
            }
        }
        for (i, entry) in layout.inventory.iter().enumerate() {
            if let WirePetal::Legacy(kind) = entry {
                inventory_claims[i] = Some(claim_kind(&owned, &mut claimed, *kind)?);
            }
        }

        let found = claimed.iter().filter(|c| **c).count();
        if found != owned.len() {
            return Err(InventoryError::Conservation {
                expected: owned.len(),
                found,
            });
        }

        let mut hotbar: [Option<Petal>; HOTBAR_SIZE] = Default::default();
        for (slot, claim) in hotbar_claims.iter().enumerate() {
            hotbar[slot] = claim.map(|i| owned[i].clone());
        }
        let inventory: Vec<Petal> = inventory_claims
            .iter()
            .flatten()
            .map(|&i| owned[i].clone())
            .collect();

        let changed = hotbar != self.hotbar || inventory != self.inventory;
        self.hotbar = hotbar;
        self.inventory = inventory;
        Ok(changed)
    }

    fn check_slot(&self, slot: SlotRef, destination: bool) -> Result<(), InventoryError> {
        let limit = match slot.area {
            SlotArea::Hotbar => HOTBAR_SIZE,
            SlotArea::Inventory if destination => self.inventory.len() + 1,
            SlotArea::Inventory => self.inventory.len(),
        };
        if slot.index < limit {
            Ok(())
        } else {
            Err(InventoryError::SlotOutOfRange {
                area: slot.area,
                index: slot.index,
            })
        }
    }

    fn slot(&self, slot: SlotRef) -> Option<&Petal> {
        match slot.area {
            SlotArea::Hotbar => self.hotbar.get(slot.index).and_then(|s| s.as_ref()),
            SlotArea::Inventory => self.inventory.get(slot.index),
        }
    }
}

fn claim_id(owned: &[&Petal], claimed: &mut [bool], id: PetalId) -> Result<usize, InventoryError> {
    let idx = owned
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| InventoryError::UnknownPetal(format!("id {}", id)))?;
    if claimed[idx] {
        return Err(InventoryError::DuplicatePetal(id));
    }
    claimed[idx] = true;
    Ok(idx)
}

fn claim_kind(
    owned: &[&Petal],
    claimed: &mut [bool],
    kind: PetalKind,
) -> Result<usize, InventoryError> {
    let idx = owned
        .iter()
        .enumerate()
        .position(|(i, p)| !claimed[i] && p.kind == kind)
        .ok_or_else(|| InventoryError::UnknownPetal(format!("no unclaimed {:?}", kind)))?;
    claimed[idx] = true;
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::PetalView;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use uuid::Uuid;

    fn petal(id: PetalId, kind: PetalKind) -> Petal {
        Petal::new(id, kind, Uuid::nil())
    }

    /// Hotbar: basic(1), basic(2), empty, basic(3), basic(4); inventory: rock(5)
    fn sample() -> Loadout {
        let mut loadout = Loadout::new([
            petal(1, PetalKind::Basic),
            petal(2, PetalKind::Basic),
            petal(9, PetalKind::Basic),
            petal(3, PetalKind::Basic),
            petal(4, PetalKind::Basic),
        ]);
        loadout
            .move_petal(SlotRef::hotbar(2), SlotRef::inventory(0))
            .unwrap();
        loadout.inventory.clear();
        loadout.stash(petal(5, PetalKind::Rock));
        loadout
    }

    /// Sorted ids of every petal instance held
    fn instance_ids(loadout: &Loadout) -> Vec<PetalId> {
        let mut ids: Vec<PetalId> = loadout
            .hotbar
            .iter()
            .flatten()
            .chain(loadout.inventory.iter())
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn full(p: &Petal) -> WirePetal {
        WirePetal::Full(p.view())
    }

    #[test]
    fn moves_inventory_petal_into_empty_hotbar_slot() {
        let mut loadout = sample();
        assert!(loadout.hotbar()[2].is_none());

        loadout
            .move_petal(SlotRef::inventory(0), SlotRef::hotbar(2))
            .unwrap();

        assert_eq!(loadout.hotbar()[2].as_ref().map(|p| p.kind), Some(PetalKind::Rock));
        assert!(loadout.inventory().iter().all(|p| p.id != 5));
        assert_eq!(loadout.hotbar().len(), HOTBAR_SIZE);
    }

    #[test]
    fn swaps_occupied_slots() {
        let mut loadout = sample();
        loadout
            .move_petal(SlotRef::inventory(0), SlotRef::hotbar(0))
            .unwrap();

        assert_eq!(loadout.hotbar()[0].as_ref().map(|p| p.id), Some(5));
        assert_eq!(loadout.inventory()[0].id, 1);
    }

    #[test]
    fn moves_hotbar_petal_to_inventory_end() {
        let mut loadout = sample();
        loadout
            .move_petal(SlotRef::hotbar(1), SlotRef::inventory(1))
            .unwrap();

        assert!(loadout.hotbar()[1].is_none());
        assert_eq!(loadout.inventory().iter().map(|p| p.id).collect::<Vec<_>>(), vec![5, 2]);
    }

    #[test]
    fn rejected_moves_leave_loadout_unchanged() {
        let mut loadout = sample();
        let before = loadout.clone();

        assert_eq!(
            loadout.move_petal(SlotRef::hotbar(5), SlotRef::hotbar(0)),
            Err(InventoryError::SlotOutOfRange {
                area: SlotArea::Hotbar,
                index: 5
            })
        );
        assert_eq!(
            loadout.move_petal(SlotRef::inventory(0), SlotRef::inventory(3)),
            Err(InventoryError::SlotOutOfRange {
                area: SlotArea::Inventory,
                index: 3
            })
        );
        assert_eq!(
            loadout.move_petal(SlotRef::hotbar(2), SlotRef::hotbar(0)),
            Err(InventoryError::EmptySource)
        );
        assert_eq!(loadout, before);
    }

    #[test]
    fn random_moves_conserve_petals() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut loadout = sample();
        for id in 10..16 {
            loadout.stash(petal(id, PetalKind::Light));
        }
        let expected = instance_ids(&loadout);

        for _ in 0..2_000 {
            let pick = |rng: &mut ChaCha8Rng| {
                let index = rng.gen_range(0..9);
                if rng.gen_bool(0.5) {
                    SlotRef::hotbar(index)
                } else {
                    SlotRef::inventory(index)
                }
            };
            let from = pick(&mut rng);
            let to = pick(&mut rng);
            let before = loadout.clone();
            if loadout.move_petal(from, to).is_err() {
                assert_eq!(loadout, before);
            }
            assert_eq!(instance_ids(&loadout), expected);
        }
    }

    #[test]
    fn echoing_current_layout_is_a_no_op() {
        let mut loadout = sample();
        let before = loadout.clone();
        let layout = InventorySync {
            player_id: None,
            petals: loadout.hotbar().iter().map(|s| s.as_ref().map(full)).collect(),
            inventory: loadout.inventory().iter().map(full).collect(),
        };

        assert_eq!(loadout.sync(&layout), Ok(false));
        assert_eq!(loadout, before);
    }

    #[test]
    fn sync_rearranges_and_keeps_server_records() {
        let mut loadout = sample();
        loadout.petals_mut().for_each(|p| {
            if p.id == 5 {
                p.strike();
            }
        });

        let layout = InventorySync {
            player_id: None,
            petals: vec![
                Some(WirePetal::Full(PetalView {
                    id: 5,
                    kind: PetalKind::Rock,
                    hp: 3,
                    reload: 0,
                })),
                Some(WirePetal::Legacy(PetalKind::Basic)),
                None,
                Some(WirePetal::Legacy(PetalKind::Basic)),
            ],
            inventory: vec![WirePetal::Legacy(PetalKind::Basic), WirePetal::Legacy(PetalKind::Basic)],
        };

        assert_eq!(loadout.sync(&layout), Ok(true));
        let rock = loadout.hotbar()[0].as_ref().unwrap();
        assert_eq!(rock.id, 5);
        assert_eq!(rock.hp, 2, "client-reported hp is ignored");
        assert!(loadout.hotbar()[4].is_none());
        assert_eq!(loadout.inventory().len(), 2);
        assert_eq!(instance_ids(&loadout), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn sync_rejects_layouts_that_break_conservation() {
        let mut loadout = sample();
        let before = loadout.clone();

        let dropped_one = InventorySync {
            player_id: None,
            petals: vec![Some(WirePetal::Legacy(PetalKind::Basic))],
            inventory: vec![],
        };
        assert_eq!(
            loadout.sync(&dropped_one),
            Err(InventoryError::Conservation {
                expected: 5,
                found: 1
            })
        );

        let duplicated = InventorySync {
            player_id: None,
            petals: vec![Some(full(&petal(1, PetalKind::Basic))), Some(full(&petal(1, PetalKind::Basic)))],
            inventory: vec![],
        };
        assert_eq!(loadout.sync(&duplicated), Err(InventoryError::DuplicatePetal(1)));

        let invented = InventorySync {
            player_id: None,
            petals: vec![],
            inventory: vec![WirePetal::Legacy(PetalKind::Stinger)],
        };
        assert!(matches!(loadout.sync(&invented), Err(InventoryError::UnknownPetal(_))));

        let oversized = InventorySync {
            player_id: None,
            petals: vec![None; HOTBAR_SIZE + 1],
            inventory: vec![],
        };
        assert_eq!(
            loadout.sync(&oversized),
            Err(InventoryError::HotbarCapacity(HOTBAR_SIZE + 1))
        );

        assert_eq!(loadout, before);
    }
}
