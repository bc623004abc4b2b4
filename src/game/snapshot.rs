//! Snapshot building for network transmission

use uuid::Uuid;

use crate::ws::protocol::{
    BulletView, ChatLine, DropView, EnemyView, GameState, InitState, PlayerView, ServerMsg,
};

use super::world::{Player, World};

/// Builds wire views of the world
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn player_view(p: &Player) -> PlayerView {
        PlayerView {
            id: p.id,
            username: p.username.clone(),
            tank_type: p.tank_type,
            x: p.x,
            y: p.y,
            angle: p.angle,
            health: p.health,
            max_health: p.max_health(),
            dead: p.dead,
            kills: p.kills,
            petals: p
                .loadout
                .hotbar()
                .iter()
                .map(|slot| slot.as_ref().map(|petal| petal.view()))
                .collect(),
            inventory: p.loadout.inventory().iter().map(|petal| petal.view()).collect(),
        }
    }

    /// Periodic `gameState` snapshot
    pub fn game_state(world: &World) -> ServerMsg {
        ServerMsg::GameState(GameState {
            tick: world.tick,
            players: Self::players(world),
            bullets: Self::bullets(world),
            enemies: Self::enemies(world),
            drops: Self::drops(world),
            walls: world.walls.clone(),
        })
    }

    /// Full `init` snapshot for a newly connected session
    pub fn init(world: &World, session: Uuid, chat: Vec<ChatLine>) -> ServerMsg {
        ServerMsg::Init(InitState {
            id: session,
            tick: world.tick,
            players: Self::players(world),
            enemies: Self::enemies(world),
            bullets: Self::bullets(world),
            drops: Self::drops(world),
            walls: world.walls.clone(),
            chat,
        })
    }

    fn players(world: &World) -> Vec<PlayerView> {
        world.players.values().map(Self::player_view).collect()
    }

    fn enemies(world: &World) -> Vec<EnemyView> {
        world
            .enemies
            .values()
            .map(|e| EnemyView {
                id: e.id,
                x: e.x,
                y: e.y,
                hp: e.hp,
                drop: e.drop,
            })
            .collect()
    }

    fn bullets(world: &World) -> Vec<BulletView> {
        world
            .projectiles
            .iter()
            .map(|b| BulletView {
                id: b.id,
                owner_id: b.owner_id,
                x: b.x,
                y: b.y,
                angle: b.angle,
            })
            .collect()
    }

    fn drops(world: &World) -> Vec<DropView> {
        world
            .drops
            .values()
            .map(|d| DropView {
                id: d.id,
                x: d.x,
                y: d.y,
                petal: d.petal,
            })
            .collect()
    }
}

/// Broadcast size stats for debugging
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub total_bytes: u64,
    pub avg_sessions_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, session_count: usize, bytes: usize) {
        self.total_snapshots += 1;
        self.total_bytes += bytes as u64;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_sessions_per_snapshot =
            self.avg_sessions_per_snapshot * ((n - 1.0) / n) + (session_count as f32 / n);
    }

    pub fn avg_bytes(&self) -> u64 {
        self.total_bytes.checked_div(self.total_snapshots).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameConfig;
    use crate::ws::protocol::PetalKind;

    #[test]
    fn game_state_lists_every_entity() {
        let mut world = World::new(&GameConfig::default());
        let id = Uuid::new_v4();
        world.add_player(id);
        world.insert_enemy(1.0, 2.0, 3, PetalKind::Rock);
        world.insert_drop(4.0, 5.0, PetalKind::Light, 10);

        let ServerMsg::GameState(state) = SnapshotBuilder::game_state(&world) else {
            panic!("expected gameState");
        };

        assert_eq!(state.players.len(), 1);
        assert_eq!(state.players[0].id, id);
        assert_eq!(state.players[0].petals.len(), 5);
        assert_eq!(state.enemies[0].drop, PetalKind::Rock);
        assert_eq!(state.drops[0].petal, PetalKind::Light);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn stats_average() {
        let mut stats = SnapshotStats::default();
        stats.record(2, 100);
        stats.record(4, 300);
        assert_eq!(stats.avg_bytes(), 200);
        assert!((stats.avg_sessions_per_snapshot - 3.0).abs() < 1e-5);
    }
}
