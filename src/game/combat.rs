//! Combat system - weapons, petals, damage, hit detection

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::ws::protocol::{PetalKind, TankType};

use super::error::GameError;
use super::input::IntentBuffer;
use super::inventory::HOTBAR_SIZE;
use super::physics::{PhysicsSystem, PLAYER_RADIUS};
use super::world::{EntityId, World};

pub const BULLET_RADIUS: f32 = 5.0;
pub const ENEMY_RADIUS: f32 = 15.0;
pub const PETAL_RADIUS: f32 = 10.0;

/// Orbit radius while idle / while attacking
pub const ORBIT_RADIUS: f32 = 40.0;
pub const ORBIT_RADIUS_ATTACKING: f32 = 70.0;
/// Orbit angular speed in radians per tick
pub const ORBIT_SPEED: f32 = 0.1;

/// Enemy hp removed by one bullet
pub const BULLET_ENEMY_DAMAGE: i32 = 1;

/// How far a player may reach when collecting an enemy directly
pub const COLLECT_RADIUS: f32 = PLAYER_RADIUS + ENEMY_RADIUS + 25.0;

/// Which combat model a deployment runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatMode {
    /// Tanks fire bullets at their aim angle
    Ranged,
    /// Equipped petals orbit their owner and strike enemies
    #[default]
    Orbit,
    /// Enemies are picked up directly by proximity
    Collect,
}

impl fmt::Display for CombatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CombatMode::Ranged => "ranged",
            CombatMode::Orbit => "orbit",
            CombatMode::Collect => "collect",
        };
        f.write_str(name)
    }
}

impl FromStr for CombatMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ranged" => Ok(CombatMode::Ranged),
            "orbit" | "melee" => Ok(CombatMode::Orbit),
            "collect" => Ok(CombatMode::Collect),
            other => Err(format!("unknown combat mode '{}'", other)),
        }
    }
}

/// Ranged weapon stats per tank type
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    /// Player health removed per hit
    pub damage: f32,
    /// Bullet travel per tick
    pub bullet_speed: f32,
    /// Ticks between shots
    pub cooldown_ticks: u32,
    /// Bullet lifetime in ticks
    pub ttl_ticks: u32,
    /// Bullets per shot
    pub pellets: u32,
    /// Total fan angle across all pellets (radians)
    pub spread: f32,
}

impl WeaponStats {
    pub fn for_type(tank_type: TankType) -> Self {
        match tank_type {
            TankType::Default => Self {
                damage: 10.0,
                bullet_speed: 6.0,
                cooldown_ticks: 10,
                ttl_ticks: 100,
                pellets: 1,
                spread: 0.0,
            },
            TankType::Sniper => Self {
                damage: 25.0,
                bullet_speed: 12.0,
                cooldown_ticks: 30,
                ttl_ticks: 100,
                pellets: 1,
                spread: 0.0,
            },
            TankType::Minigun => Self {
                damage: 4.0,
                bullet_speed: 7.0,
                cooldown_ticks: 3,
                ttl_ticks: 60,
                pellets: 1,
                spread: 0.0,
            },
            TankType::Shotgun => Self {
                damage: 6.0,
                bullet_speed: 6.0,
                cooldown_ticks: 20,
                ttl_ticks: 40,
                pellets: 5,
                spread: 0.6,
            },
            TankType::Scout => Self {
                damage: 8.0,
                bullet_speed: 7.0,
                cooldown_ticks: 8,
                ttl_ticks: 80,
                pellets: 1,
                spread: 0.0,
            },
            TankType::Heavy => Self {
                damage: 15.0,
                bullet_speed: 5.0,
                cooldown_ticks: 18,
                ttl_ticks: 100,
                pellets: 1,
                spread: 0.0,
            },
        }
    }

    /// Launch angles for one shot, fanned evenly around `aim`
    pub fn pellet_angles(&self, aim: f32) -> impl Iterator<Item = f32> {
        let pellets = self.pellets.max(1);
        let spread = self.spread;
        (0..pellets).map(move |i| {
            if pellets == 1 {
                aim
            } else {
                aim - spread / 2.0 + spread * i as f32 / (pellets - 1) as f32
            }
        })
    }
}

/// Bullet in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    pub id: EntityId,
    /// Shooter; never damaged by its own bullets
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub angle: f32,
    pub damage: f32,
    /// Ticks left before expiry
    pub ttl: u32,
}

impl Projectile {
    pub fn new(
        id: EntityId,
        owner_id: Uuid,
        x: f32,
        y: f32,
        angle: f32,
        stats: &WeaponStats,
    ) -> Self {
        Self {
            id,
            owner_id,
            x,
            y,
            vel_x: angle.cos() * stats.bullet_speed,
            vel_y: angle.sin() * stats.bullet_speed,
            angle,
            damage: stats.damage,
            ttl: stats.ttl_ticks,
        }
    }

    /// Move one tick, returns false once expired
    pub fn advance(&mut self) -> bool {
        self.x += self.vel_x;
        self.y += self.vel_y;
        self.ttl = self.ttl.saturating_sub(1);
        self.ttl > 0
    }

    pub fn check_hit(&self, target_x: f32, target_y: f32, target_radius: f32) -> bool {
        PhysicsSystem::circles_overlap(self.x, self.y, BULLET_RADIUS, target_x, target_y, target_radius)
    }
}

/// Server-side orbit position of the petal in `slot`
pub fn orbit_position(owner_x: f32, owner_y: f32, tick: u64, slot: usize, attacking: bool) -> (f32, f32) {
    let radius = if attacking {
        ORBIT_RADIUS_ATTACKING
    } else {
        ORBIT_RADIUS
    };
    let base = (tick as f64 * ORBIT_SPEED as f64).rem_euclid(std::f64::consts::TAU) as f32;
    let angle = base + slot as f32 * std::f32::consts::TAU / HOTBAR_SIZE as f32;
    (owner_x + angle.cos() * radius, owner_y + angle.sin() * radius)
}

/// An enemy removed this tick; the spawn manager turns it into a drop
#[derive(Debug, Clone, PartialEq)]
pub struct EnemyKill {
    pub enemy_id: EntityId,
    pub x: f32,
    pub y: f32,
    pub drop: PetalKind,
    /// Everyone who hit the enemy in the tick it died
    pub credited: Vec<Uuid>,
}

/// Result of one tick of combat
#[derive(Debug, Default)]
pub struct CombatOutcome {
    pub kills: Vec<EnemyKill>,
    /// Players that died this tick
    pub deaths: Vec<Uuid>,
    /// Players whose health changed this tick
    pub damaged: BTreeSet<Uuid>,
}

/// Combat resolution for the tick loop
pub struct CombatResolver;

impl CombatResolver {
    /// Move bullets; drop those that expire, leave the arena or touch a wall
    pub fn advance_projectiles(world: &mut World) {
        let arena = world.arena;
        let walls = &world.walls;
        world.projectiles.retain_mut(|p| {
            p.advance()
                && arena.contains(p.x, p.y)
                && !walls.iter().any(|w| w.blocks(p.x, p.y, BULLET_RADIUS))
        });
    }

    /// Resolve this tick's hits for the configured mode
    pub fn resolve(world: &mut World, intents: &IntentBuffer, mode: CombatMode) -> CombatOutcome {
        for player in world.players.values_mut() {
            player.weapon_cooldown = player.weapon_cooldown.saturating_sub(1);
            player.loadout.petals_mut().for_each(|p| p.tick_reload());
        }

        let mut outcome = CombatOutcome::default();
        let mut enemy_attackers: BTreeMap<EntityId, Vec<Uuid>> = BTreeMap::new();

        match mode {
            CombatMode::Ranged => {
                Self::resolve_bullets(world, &mut outcome, &mut enemy_attackers);
                Self::fire(world, intents);
            }
            CombatMode::Orbit => {
                Self::resolve_petals(world, intents, &mut enemy_attackers);
            }
            CombatMode::Collect => {}
        }

        outcome.kills = Self::reap_enemies(world, enemy_attackers);
        outcome
    }

    fn resolve_bullets(
        world: &mut World,
        outcome: &mut CombatOutcome,
        enemy_attackers: &mut BTreeMap<EntityId, Vec<Uuid>>,
    ) {
        let mut player_hits: Vec<(Uuid, Uuid, f32)> = Vec::new();

        world.projectiles.retain(|bullet| {
            let target = world
                .players
                .values()
                .filter(|p| !p.dead && p.id != bullet.owner_id)
                .find(|p| bullet.check_hit(p.x, p.y, PLAYER_RADIUS));
            if let Some(target) = target {
                player_hits.push((target.id, bullet.owner_id, bullet.damage));
                return false;
            }
            true
        });

        let enemies = &mut world.enemies;
        world.projectiles.retain(|bullet| {
            let target = enemies
                .values_mut()
                .find(|e| e.hp > 0 && bullet.check_hit(e.x, e.y, ENEMY_RADIUS));
            if let Some(enemy) = target {
                enemy.hp -= BULLET_ENEMY_DAMAGE;
                enemy_attackers.entry(enemy.id).or_default().push(bullet.owner_id);
                return false;
            }
            true
        });

        let mut died: HashSet<Uuid> = HashSet::new();
        for (target_id, _, damage) in &player_hits {
            if let Some(target) = world.players.get_mut(target_id) {
                outcome.damaged.insert(*target_id);
                if target.apply_damage(*damage) {
                    died.insert(*target_id);
                    outcome.deaths.push(*target_id);
                }
            }
        }

        let mut credited: HashSet<(Uuid, Uuid)> = HashSet::new();
        for (target_id, shooter_id, _) in player_hits {
            if died.contains(&target_id) && credited.insert((target_id, shooter_id)) {
                if let Some(shooter) = world.players.get_mut(&shooter_id) {
                    shooter.kills += 1;
                }
                info!(victim_id = %target_id, shooter_id = %shooter_id, "Player killed");
            }
        }
    }

    fn fire(world: &mut World, intents: &IntentBuffer) {
        let mut shots: Vec<(Uuid, f32, f32, f32, WeaponStats)> = Vec::new();
        for player in world.players.values_mut() {
            if player.dead || player.weapon_cooldown > 0 || !intents.is_attacking(&player.id) {
                continue;
            }
            let stats = WeaponStats::for_type(player.tank_type);
            shots.push((player.id, player.x, player.y, player.angle, stats));
            player.weapon_cooldown = stats.cooldown_ticks;
        }

        for (owner, x, y, aim, stats) in shots {
            for angle in stats.pellet_angles(aim) {
                let id = world.next_id();
                world
                    .projectiles
                    .push(Projectile::new(id, owner, x, y, angle, &stats));
            }
        }
    }

    fn resolve_petals(
        world: &mut World,
        intents: &IntentBuffer,
        enemy_attackers: &mut BTreeMap<EntityId, Vec<Uuid>>,
    ) {
        let tick = world.tick;
        let enemies = &mut world.enemies;

        for player in world.players.values_mut() {
            if player.dead {
                continue;
            }
            let attacking = intents.is_attacking(&player.id);
            let (owner_x, owner_y, owner_id) = (player.x, player.y, player.id);

            for (slot, petal) in player.loadout.equipped_mut() {
                if !petal.is_ready() {
                    continue;
                }
                let (px, py) = orbit_position(owner_x, owner_y, tick, slot, attacking);
                let target = enemies.values_mut().find(|e| {
                    e.hp > 0
                        && PhysicsSystem::circles_overlap(px, py, PETAL_RADIUS, e.x, e.y, ENEMY_RADIUS)
                });
                if let Some(enemy) = target {
                    enemy.hp -= petal.stats().damage;
                    enemy_attackers.entry(enemy.id).or_default().push(owner_id);
                    petal.strike();
                    debug!(
                        player_id = %owner_id,
                        petal_id = petal.id,
                        enemy_id = enemy.id,
                        enemy_hp = enemy.hp,
                        "Petal hit"
                    );
                }
            }
        }
    }

    /// Remove every enemy at or below zero hp, crediting all of its attackers
    fn reap_enemies(
        world: &mut World,
        mut attackers: BTreeMap<EntityId, Vec<Uuid>>,
    ) -> Vec<EnemyKill> {
        let dead: Vec<EntityId> = world
            .enemies
            .values()
            .filter(|e| e.hp <= 0)
            .map(|e| e.id)
            .collect();

        let mut kills = Vec::with_capacity(dead.len());
        for id in dead {
            let Some(enemy) = world.enemies.remove(&id) else {
                continue;
            };
            let mut credited = attackers.remove(&id).unwrap_or_default();
            credited.sort_unstable();
            credited.dedup();
            for player_id in &credited {
                if let Some(player) = world.players.get_mut(player_id) {
                    player.kills += 1;
                }
            }
            kills.push(EnemyKill {
                enemy_id: enemy.id,
                x: enemy.x,
                y: enemy.y,
                drop: enemy.drop,
                credited,
            });
        }
        kills
    }

    /// Direct pickup of an enemy, re-validated against the server positions
    pub fn collect(world: &mut World, session: Uuid, enemy_id: EntityId) -> Result<EnemyKill, GameError> {
        let player = world
            .players
            .get(&session)
            .ok_or(GameError::SessionLost(session))?;
        if player.dead {
            return Err(GameError::validation("dead players cannot collect"));
        }
        let enemy = world
            .enemies
            .get(&enemy_id)
            .ok_or_else(|| GameError::validation(format!("unknown enemy {}", enemy_id)))?;
        if !PhysicsSystem::circles_overlap(player.x, player.y, COLLECT_RADIUS, enemy.x, enemy.y, 0.0) {
            return Err(GameError::validation(format!("enemy {} is out of reach", enemy_id)));
        }

        let mut attackers = BTreeMap::new();
        attackers.insert(enemy_id, vec![session]);
        if let Some(enemy) = world.enemies.get_mut(&enemy_id) {
            enemy.hp = 0;
        }
        let mut kills = Self::reap_enemies(world, attackers);
        kills
            .pop()
            .ok_or_else(|| GameError::validation(format!("unknown enemy {}", enemy_id)))
    }
}
