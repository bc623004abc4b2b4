//! Game simulation modules

pub mod chat;
pub mod combat;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod input;
pub mod inventory;
pub mod petal;
pub mod physics;
pub mod snapshot;
pub mod spawn;
pub mod world;

pub use engine::{Command, EngineHandle, EngineStats, GameEngine};

use std::time::Duration;

use self::combat::CombatMode;
use self::physics::{Arena, Wall};

/// Simulation tuning for one engine instance
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Tick period
    pub tick: Duration,
    pub mode: CombatMode,
    pub arena: Arena,
    /// Where new and respawning players appear
    pub spawn_point: (f32, f32),
    pub walls: Vec<Wall>,
    /// Maximum live enemies
    pub enemy_cap: usize,
    pub enemy_spawn_every: Duration,
    /// How long an unclaimed drop stays on the ground
    pub drop_ttl: Duration,
    /// Consecutive full-queue sends tolerated before a session is dropped
    pub max_missed_sends: u32,
    /// Seed for spawn randomness
    pub seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(50),
            mode: CombatMode::default(),
            arena: Arena::default(),
            spawn_point: (500.0, 500.0),
            walls: Vec::new(),
            enemy_cap: 10,
            enemy_spawn_every: Duration::from_secs(5),
            drop_ttl: Duration::from_secs(30),
            max_missed_sends: 20,
            seed: 0,
        }
    }
}

impl GameConfig {
    /// Whole ticks covering `duration`, at least one
    pub fn ticks(&self, duration: Duration) -> u32 {
        let tick_ms = self.tick.as_millis().max(1);
        ((duration.as_millis() / tick_ms) as u32).max(1)
    }
}
