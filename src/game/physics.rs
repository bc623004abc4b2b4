//! Tank movement, arena bounds and wall blocking

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::TankType;

use super::input::Intent;

/// Player hitbox radius
pub const PLAYER_RADIUS: f32 = 20.0;

/// Per-archetype movement and durability
#[derive(Debug, Clone, Copy)]
pub struct TankStats {
    /// Distance covered per tick at full input
    pub speed: f32,
    /// Maximum health
    pub max_health: f32,
}

/// Base per-tick speed before the archetype multiplier
const BASE_SPEED: f32 = 4.0;

impl TankStats {
    pub fn for_type(tank_type: TankType) -> Self {
        let (multiplier, max_health) = match tank_type {
            TankType::Default => (1.0, 100.0),
            TankType::Sniper => (0.85, 100.0),
            TankType::Minigun => (0.9, 100.0),
            TankType::Shotgun => (0.95, 100.0),
            TankType::Scout => (1.4, 80.0),
            TankType::Heavy => (0.7, 150.0),
        };
        Self {
            speed: BASE_SPEED * multiplier,
            max_health,
        }
    }
}

/// Rectangular play area anchored at the origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 1000.0,
        }
    }
}

impl Arena {
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    /// Uniform random point at least `margin` away from the edges
    pub fn random_point<R: Rng>(&self, rng: &mut R, margin: f32) -> (f32, f32) {
        let margin_x = margin.min(self.width / 2.0);
        let margin_y = margin.min(self.height / 2.0);
        let x = if self.width - margin_x > margin_x {
            rng.gen_range(margin_x..self.width - margin_x)
        } else {
            self.width / 2.0
        };
        let y = if self.height - margin_y > margin_y {
            rng.gen_range(margin_y..self.height - margin_y)
        } else {
            self.height / 2.0
        };
        (x, y)
    }
}

/// Static axis-aligned obstacle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Wall {
    /// Circle vs. rectangle overlap
    pub fn blocks(&self, x: f32, y: f32, radius: f32) -> bool {
        let nearest_x = x.clamp(self.x, self.x + self.width);
        let nearest_y = y.clamp(self.y, self.y + self.height);
        let dx = x - nearest_x;
        let dy = y - nearest_y;
        dx * dx + dy * dy < radius * radius
    }
}

/// Physics helpers for the tick loop
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one tick of movement.
    ///
    /// Each axis is applied separately; an axis whose delta would end inside a
    /// wall is rejected while the other axis still moves.
    pub fn step_player(
        x: f32,
        y: f32,
        intent: &Intent,
        stats: &TankStats,
        arena: &Arena,
        walls: &[Wall],
    ) -> (f32, f32) {
        let mut dir_x = axis(intent.left, intent.right);
        let mut dir_y = axis(intent.up, intent.down);

        if dir_x != 0.0 && dir_y != 0.0 {
            dir_x *= std::f32::consts::FRAC_1_SQRT_2;
            dir_y *= std::f32::consts::FRAC_1_SQRT_2;
        }

        let (cand_x, _) = arena.clamp(x + dir_x * stats.speed, y);
        let new_x = if Self::blocked(cand_x, y, walls) { x } else { cand_x };

        let (_, cand_y) = arena.clamp(new_x, y + dir_y * stats.speed);
        let new_y = if Self::blocked(new_x, cand_y, walls) { y } else { cand_y };

        (new_x, new_y)
    }

    fn blocked(x: f32, y: f32, walls: &[Wall]) -> bool {
        walls.iter().any(|w| w.blocks(x, y, PLAYER_RADIUS))
    }

    /// Check overlap between two circles
    pub fn circles_overlap(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
        let dx = x2 - x1;
        let dy = y2 - y1;
        let combined = r1 + r2;
        dx * dx + dy * dy <= combined * combined
    }
}

fn axis(negative: bool, positive: bool) -> f32 {
    match (negative, positive) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    }
}
