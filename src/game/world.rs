//! Canonical world state: every entity the engine owns

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use crate::ws::protocol::{PetalKind, TankType};

use super::combat::Projectile;
use super::inventory::{Loadout, HOTBAR_SIZE};
use super::petal::Petal;
use super::physics::{Arena, TankStats, Wall};
use super::GameConfig;

pub type EntityId = u64;

/// Name shown for players that never set one
pub const DEFAULT_USERNAME: &str = "Anonymous";

/// Authoritative player state, keyed by session id
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub username: String,
    pub username_set: bool,
    pub tank_type: TankType,
    pub tank_set: bool,

    pub x: f32,
    pub y: f32,
    /// Heading in radians
    pub angle: f32,

    pub health: f32,
    pub dead: bool,
    pub kills: u32,
    /// Ticks until the weapon can fire again
    pub weapon_cooldown: u32,

    pub loadout: Loadout,
}

impl Player {
    pub fn stats(&self) -> TankStats {
        TankStats::for_type(self.tank_type)
    }

    pub fn max_health(&self) -> f32 {
        self.stats().max_health
    }

    /// Apply damage, clamping health to `[0, max]`. Returns true only on the
    /// hit that kills.
    pub fn apply_damage(&mut self, damage: f32) -> bool {
        if self.dead {
            return false;
        }
        self.health = (self.health - damage).clamp(0.0, self.max_health());
        if self.health <= 0.0 {
            self.dead = true;
            self.weapon_cooldown = 0;
            return true;
        }
        false
    }

    /// Bring a dead player back at `(x, y)` with full health
    pub fn revive(&mut self, x: f32, y: f32) {
        self.dead = false;
        self.health = self.max_health();
        self.x = x;
        self.y = y;
        self.weapon_cooldown = 0;
        self.loadout.petals_mut().for_each(Petal::refresh);
    }
}

/// Hostile mob that drops a petal when destroyed
#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub drop: PetalKind,
}

/// Petal lying on the ground, waiting to be picked up
#[derive(Debug, Clone, PartialEq)]
pub struct Drop {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub petal: PetalKind,
    /// Ticks until the drop disappears
    pub ttl: u32,
}

/// World state store, owned by the engine task
pub struct World {
    pub tick: u64,
    pub arena: Arena,
    pub walls: Vec<Wall>,
    pub spawn_point: (f32, f32),
    pub players: BTreeMap<Uuid, Player>,
    pub enemies: BTreeMap<EntityId, Enemy>,
    pub projectiles: Vec<Projectile>,
    pub drops: BTreeMap<EntityId, Drop>,
    pub rng: ChaCha8Rng,
    next_id: EntityId,
}

impl World {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            tick: 0,
            arena: config.arena,
            walls: config.walls.clone(),
            spawn_point: config.spawn_point,
            players: BTreeMap::new(),
            enemies: BTreeMap::new(),
            projectiles: Vec::new(),
            drops: BTreeMap::new(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            next_id: 1,
        }
    }

    /// Allocate an id for any non-player entity or petal
    pub fn next_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Register a new player at the spawn point with five basic petals
    pub fn add_player(&mut self, id: Uuid) -> &Player {
        let petals: Vec<Petal> = (0..HOTBAR_SIZE)
            .map(|_| Petal::new(self.next_id(), PetalKind::Basic, id))
            .collect();
        let tank_type = TankType::default();
        let (x, y) = self.spawn_point;

        let player = Player {
            id,
            username: DEFAULT_USERNAME.to_string(),
            username_set: false,
            tank_type,
            tank_set: false,
            x,
            y,
            angle: 0.0,
            health: TankStats::for_type(tank_type).max_health,
            dead: false,
            kills: 0,
            weapon_cooldown: 0,
            loadout: Loadout::new(petals),
        };

        self.players.entry(id).or_insert(player)
    }

    /// Remove a player together with its petals and in-flight projectiles
    pub fn remove_player(&mut self, id: &Uuid) -> Option<Player> {
        let player = self.players.remove(id)?;
        self.projectiles.retain(|p| p.owner_id != *id);
        Some(player)
    }

    pub fn insert_enemy(&mut self, x: f32, y: f32, hp: i32, drop: PetalKind) -> EntityId {
        let id = self.next_id();
        self.enemies.insert(id, Enemy { id, x, y, hp, drop });
        id
    }

    pub fn insert_drop(&mut self, x: f32, y: f32, petal: PetalKind, ttl: u32) -> EntityId {
        let id = self.next_id();
        self.drops.insert(id, Drop { id, x, y, petal, ttl });
        id
    }

    pub fn alive_players(&self) -> usize {
        self.players.values().filter(|p| !p.dead).count()
    }
}
