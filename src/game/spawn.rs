//! Enemy population, drops, pickups and respawns

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::PetalKind;

use super::combat::{EnemyKill, ENEMY_RADIUS};
use super::error::GameError;
use super::petal::Petal;
use super::physics::{PhysicsSystem, PLAYER_RADIUS};
use super::world::{EntityId, World};
use super::GameConfig;

/// Hit points of a freshly spawned enemy
pub const ENEMY_HP: i32 = 3;

/// Radius of a drop on the ground
pub const DROP_RADIUS: f32 = 10.0;

/// Relative odds of each drop type
const DROP_TABLE: [(PetalKind, u32); 4] = [
    (PetalKind::Basic, 6),
    (PetalKind::Rock, 2),
    (PetalKind::Light, 2),
    (PetalKind::Stinger, 1),
];

/// What the spawn manager changed during one tick
#[derive(Debug, Default)]
pub struct SpawnReport {
    pub spawned: Vec<EntityId>,
    pub drops_created: Vec<EntityId>,
    pub expired: Vec<EntityId>,
    /// Players that picked something up
    pub picked_up: Vec<(Uuid, PetalKind)>,
}

/// Spawn & lifecycle manager
pub struct SpawnManager {
    enemy_cap: usize,
    spawn_interval: u32,
    ticks_until_spawn: u32,
    drop_ttl: u32,
}

impl SpawnManager {
    pub fn new(config: &GameConfig) -> Self {
        let spawn_interval = config.ticks(config.enemy_spawn_every);
        Self {
            enemy_cap: config.enemy_cap,
            spawn_interval,
            ticks_until_spawn: spawn_interval,
            drop_ttl: config.ticks(config.drop_ttl),
        }
    }

    /// Run one tick: turn kills into drops, age drops, hand out pickups and
    /// top up the enemy population
    pub fn tick(&mut self, world: &mut World, kills: &[EnemyKill]) -> SpawnReport {
        let mut report = SpawnReport::default();

        for kill in kills {
            let id = world.insert_drop(kill.x, kill.y, kill.drop, self.drop_ttl);
            debug!(enemy_id = kill.enemy_id, drop_id = id, petal = ?kill.drop, "Enemy dropped petal");
            report.drops_created.push(id);
        }

        for drop in world.drops.values_mut() {
            drop.ttl = drop.ttl.saturating_sub(1);
            if drop.ttl == 0 {
                report.expired.push(drop.id);
            }
        }
        for id in &report.expired {
            world.drops.remove(id);
        }

        self.collect_pickups(world, &mut report);

        self.ticks_until_spawn = self.ticks_until_spawn.saturating_sub(1);
        if self.ticks_until_spawn == 0 {
            self.ticks_until_spawn = self.spawn_interval;
            if world.enemies.len() < self.enemy_cap {
                report.spawned.push(Self::spawn_enemy(world));
            }
        }

        report
    }

    /// Spawn one enemy at a random in-bounds position
    pub fn spawn_enemy(world: &mut World) -> EntityId {
        let (x, y) = world.arena.random_point(&mut world.rng, ENEMY_RADIUS);
        let drop = roll_drop(&mut world.rng);
        let id = world.insert_enemy(x, y, ENEMY_HP, drop);
        debug!(enemy_id = id, x, y, drop = ?drop, "Enemy spawned");
        id
    }

    fn collect_pickups(&self, world: &mut World, report: &mut SpawnReport) {
        let mut claimed: Vec<(EntityId, Uuid)> = Vec::new();
        for drop in world.drops.values() {
            let taker = world.players.values().find(|p| {
                !p.dead
                    && PhysicsSystem::circles_overlap(p.x, p.y, PLAYER_RADIUS, drop.x, drop.y, DROP_RADIUS)
            });
            if let Some(player) = taker {
                claimed.push((drop.id, player.id));
            }
        }

        for (drop_id, player_id) in claimed {
            let Some(drop) = world.drops.remove(&drop_id) else {
                continue;
            };
            let petal_id = world.next_id();
            if let Some(player) = world.players.get_mut(&player_id) {
                player.loadout.stash(Petal::new(petal_id, drop.petal, player_id));
                report.picked_up.push((player_id, drop.petal));
            }
        }
    }
}

/// Respawn a dead player at the spawn point; alive players are rejected
/// without any state change
pub fn respawn_player(world: &mut World, session: Uuid) -> Result<(), GameError> {
    let (x, y) = world.spawn_point;
    let player = world
        .players
        .get_mut(&session)
        .ok_or(GameError::SessionLost(session))?;
    if !player.dead {
        return Err(GameError::validation("respawn requested while alive"));
    }
    player.revive(x, y);
    info!(player_id = %session, "Player respawned");
    Ok(())
}

fn roll_drop<R: Rng>(rng: &mut R) -> PetalKind {
    let total: u32 = DROP_TABLE.iter().map(|(_, w)| w).sum();
    let mut roll = rng.gen_range(0..total);
    for (kind, weight) in DROP_TABLE {
        if roll < weight {
            return kind;
        }
        roll -= weight;
    }
    PetalKind::Basic
}
