//! Petals - small orbiting combat units

use uuid::Uuid;

use crate::ws::protocol::{PetalKind, PetalView};

pub type PetalId = u64;

/// Per-kind petal stats
#[derive(Debug, Clone, Copy)]
pub struct PetalStats {
    /// Enemy hp removed per hit
    pub damage: i32,
    /// Hits absorbed before the petal breaks (at most 3)
    pub max_hp: u8,
    /// Ticks spent reloading after a hit
    pub reload_ticks: u32,
}

impl PetalStats {
    pub fn for_kind(kind: PetalKind) -> Self {
        match kind {
            PetalKind::Basic => Self {
                damage: 1,
                max_hp: 1,
                reload_ticks: 20,
            },
            PetalKind::Rock => Self {
                damage: 2,
                max_hp: 3,
                reload_ticks: 40,
            },
            PetalKind::Light => Self {
                damage: 1,
                max_hp: 1,
                reload_ticks: 10,
            },
            PetalKind::Stinger => Self {
                damage: 3,
                max_hp: 1,
                reload_ticks: 60,
            },
        }
    }
}

/// One petal instance. Lives inside its owner's loadout, so it is dropped
/// together with the owning player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Petal {
    pub id: PetalId,
    pub kind: PetalKind,
    pub hp: u8,
    /// Ticks until ready (0 = ready)
    pub reload: u32,
    pub owner: Uuid,
}

impl Petal {
    pub fn new(id: PetalId, kind: PetalKind, owner: Uuid) -> Self {
        Self {
            id,
            kind,
            hp: PetalStats::for_kind(kind).max_hp,
            reload: 0,
            owner,
        }
    }

    pub fn stats(&self) -> PetalStats {
        PetalStats::for_kind(self.kind)
    }

    pub fn is_ready(&self) -> bool {
        self.reload == 0 && self.hp > 0
    }

    /// Register a landed hit: lose one hp and start reloading
    pub fn strike(&mut self) {
        self.hp = self.hp.saturating_sub(1);
        self.reload = self.stats().reload_ticks;
    }

    /// Count the reload down one tick, restoring hp once it completes
    pub fn tick_reload(&mut self) {
        if self.reload > 0 {
            self.reload -= 1;
            if self.reload == 0 {
                self.hp = self.stats().max_hp;
            }
        }
    }

    /// Drop any reload in progress (used on respawn)
    pub fn refresh(&mut self) {
        self.reload = 0;
        self.hp = self.stats().max_hp;
    }

    pub fn view(&self) -> PetalView {
        PetalView {
            id: self.id,
            kind: self.kind,
            hp: self.hp,
            reload: self.reload,
        }
    }
}
