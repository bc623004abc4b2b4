//! Engine state and authoritative tick loop

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::Timer;
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::chat::ChatLog;
use super::combat::{CombatResolver, EnemyKill};
use super::dispatch::{self, Dispatch};
use super::gateway::{Gateway, Outbound};
use super::input::IntentBuffer;
use super::physics::PhysicsSystem;
use super::snapshot::SnapshotBuilder;
use super::spawn::SpawnManager;
use super::world::World;
use super::GameConfig;

/// Inbound command queue depth
const COMMAND_QUEUE: usize = 1024;

/// Everything that mutates the world goes through this queue
#[derive(Debug)]
pub enum Command {
    /// A socket was accepted
    Connect { session: Uuid, outbound: Outbound },
    /// A decoded client message
    Client { session: Uuid, msg: ClientMsg },
    /// The socket closed
    Disconnect { session: Uuid },
}

/// Counters published after every tick
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub tick: u64,
    pub sessions: usize,
    pub players: usize,
    pub alive_players: usize,
    pub enemies: usize,
    pub projectiles: usize,
    pub drops: usize,
    /// Sessions with a held intent
    pub buffered_intents: usize,
    pub dropped_intents: u64,
    pub rejected_requests: u64,
    pub protocol_errors: u64,
    pub avg_snapshot_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
#[error("game engine is not running")]
pub struct EngineClosed;

/// Handle to the running engine
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<Command>,
    stats: Arc<Mutex<EngineStats>>,
}

impl EngineHandle {
    pub async fn connect(&self, session: Uuid, outbound: Outbound) -> Result<(), EngineClosed> {
        self.send(Command::Connect { session, outbound }).await
    }

    pub async fn submit(&self, session: Uuid, msg: ClientMsg) -> Result<(), EngineClosed> {
        self.send(Command::Client { session, msg }).await
    }

    pub async fn disconnect(&self, session: Uuid) {
        if self.send(Command::Disconnect { session }).await.is_err() {
            debug!(session_id = %session, "Engine gone before disconnect");
        }
    }

    /// Count a frame that could not be decoded
    pub fn record_protocol_error(&self) {
        self.stats.lock().protocol_errors += 1;
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.lock().clone()
    }

    async fn send(&self, cmd: Command) -> Result<(), EngineClosed> {
        self.cmd_tx.send(cmd).await.map_err(|_| EngineClosed)
    }
}

/// The authoritative simulation
pub struct GameEngine {
    config: GameConfig,
    world: World,
    intents: IntentBuffer,
    spawner: SpawnManager,
    chat: ChatLog,
    gateway: Gateway,
    /// Enemies collected between ticks
    pending_kills: Vec<EnemyKill>,
    cmd_rx: mpsc::Receiver<Command>,
    stats: Arc<Mutex<EngineStats>>,
    rejected: u64,
}

impl GameEngine {
    pub fn new(config: GameConfig) -> (Self, EngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
        let stats = Arc::new(Mutex::new(EngineStats::default()));

        let handle = EngineHandle {
            cmd_tx,
            stats: stats.clone(),
        };

        let engine = Self {
            world: World::new(&config),
            intents: IntentBuffer::new(),
            spawner: SpawnManager::new(&config),
            chat: ChatLog::default(),
            gateway: Gateway::new(config.max_missed_sends),
            pending_kills: Vec::new(),
            cmd_rx,
            stats,
            rejected: 0,
            config,
        };

        (engine, handle)
    }

    /// Run the tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            mode = %self.config.mode,
            tick_ms = self.config.tick.as_millis() as u64,
            walls = self.world.walls.len(),
            "Engine started"
        );

        let mut tick_interval = interval(self.config.tick);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let budget_micros = self.config.tick.as_micros() as u64;

        loop {
            tick_interval.tick().await;

            if !self.process_commands() {
                break;
            }

            let timer = Timer::new();
            self.tick();
            let elapsed = timer.elapsed_micros();
            if elapsed > budget_micros {
                warn!(
                    tick = self.world.tick,
                    elapsed_micros = elapsed,
                    budget_micros,
                    "Tick overran its period"
                );
            }

            if self.world.tick % 200 == 0 {
                let stats = self.gateway.stats();
                debug!(
                    tick = self.world.tick,
                    sessions = self.gateway.len(),
                    avg_snapshot_bytes = stats.avg_bytes(),
                    avg_sessions_per_snapshot = stats.avg_sessions_per_snapshot,
                    "Engine heartbeat"
                );
            }
        }

        info!(tick = self.world.tick, "Engine stopped");
    }

    /// Drain the command queue; returns false once all handles are gone
    fn process_commands(&mut self) -> bool {
        loop {
            match self.cmd_rx.try_recv() {
                Ok(cmd) => self.apply(cmd),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Connect { session, outbound } => self.handle_connect(session, outbound),
            Command::Client { session, msg } => self.handle_client(session, msg),
            Command::Disconnect { session } => self.handle_disconnect(session),
        }
    }

    fn handle_connect(&mut self, session: Uuid, outbound: Outbound) {
        if self.world.players.contains_key(&session) {
            warn!(session_id = %session, "Session already connected");
            return;
        }

        let view = SnapshotBuilder::player_view(self.world.add_player(session));
        self.gateway.attach(session, outbound);

        let init = SnapshotBuilder::init(&self.world, session, self.chat.history());
        self.gateway.send_to(&session, &init);
        self.gateway
            .broadcast_except(&session, &ServerMsg::NewPlayer(view));

        info!(
            session_id = %session,
            player_count = self.world.players.len(),
            "Player joined"
        );
    }

    fn handle_client(&mut self, session: Uuid, msg: ClientMsg) {
        let kind = msg.kind();
        let mut ctx = Dispatch {
            world: &mut self.world,
            intents: &mut self.intents,
            chat: &mut self.chat,
            pending_kills: &mut self.pending_kills,
            mode: self.config.mode,
        };

        match dispatch::handle(&mut ctx, session, msg) {
            Ok(effects) => {
                for effect in &effects {
                    self.gateway.broadcast(effect);
                }
            }
            Err(e) => {
                self.rejected += 1;
                debug!(session_id = %session, kind, error = %e, "Request rejected");
            }
        }
    }

    fn handle_disconnect(&mut self, session: Uuid) {
        self.gateway.detach(&session);
        self.drop_player(session, "disconnected");
    }

    /// Synchronous cleanup of a session's player, intents and projectiles
    fn drop_player(&mut self, session: Uuid, reason: &str) {
        self.intents.forget(&session);
        match self.world.remove_player(&session) {
            Some(player) => {
                self.gateway
                    .broadcast(&ServerMsg::PlayerDisconnected(session));
                info!(
                    session_id = %session,
                    username = %player.username,
                    reason,
                    player_count = self.world.players.len(),
                    "Player left"
                );
            }
            None => debug!(session_id = %session, "No player to remove"),
        }
    }

    /// Run one simulation step and broadcast its snapshot
    pub fn tick(&mut self) {
        self.world.tick += 1;

        self.move_players();

        CombatResolver::advance_projectiles(&mut self.world);

        let mut outcome = CombatResolver::resolve(&mut self.world, &self.intents, self.config.mode);
        for id in &outcome.deaths {
            self.intents.forget(id);
        }

        let mut kills = std::mem::take(&mut self.pending_kills);
        kills.append(&mut outcome.kills);
        let report = self.spawner.tick(&mut self.world, &kills);
        self.intents.clear_hints();

        if !outcome.damaged.is_empty()
            || !kills.is_empty()
            || !report.spawned.is_empty()
            || !report.expired.is_empty()
        {
            debug!(
                tick = self.world.tick,
                damaged = outcome.damaged.len(),
                deaths = outcome.deaths.len(),
                kills = kills.len(),
                drops_created = report.drops_created.len(),
                drops_expired = report.expired.len(),
                pickups = report.picked_up.len(),
                spawned = report.spawned.len(),
                "Tick events"
            );
        }

        let changed: BTreeSet<Uuid> = outcome
            .deaths
            .iter()
            .copied()
            .chain(report.picked_up.iter().map(|(id, _)| *id))
            .collect();
        for id in changed {
            if let Some(player) = self.world.players.get(&id) {
                let notice = ServerMsg::PlayerUpdated(SnapshotBuilder::player_view(player));
                self.gateway.broadcast(&notice);
            }
        }

        let snapshot = SnapshotBuilder::game_state(&self.world);
        self.gateway.broadcast_snapshot(&snapshot);

        for session in self.gateway.take_stalled() {
            warn!(session_id = %session, "Dropping unresponsive session");
            self.drop_player(session, "unresponsive");
        }

        self.publish_stats();
    }

    /// Apply each alive player's current intent
    fn move_players(&mut self) {
        let arena = self.world.arena;
        let walls = &self.world.walls;
        for player in self.world.players.values_mut() {
            if player.dead {
                continue;
            }
            let Some(intent) = self.intents.get(&player.id) else {
                continue;
            };
            player.angle = intent.angle;
            let (x, y) =
                PhysicsSystem::step_player(player.x, player.y, intent, &player.stats(), &arena, walls);
            player.x = x;
            player.y = y;
        }
    }

    fn publish_stats(&self) {
        let mut stats = self.stats.lock();
        stats.tick = self.world.tick;
        stats.sessions = self.gateway.len();
        stats.players = self.world.players.len();
        stats.alive_players = self.world.alive_players();
        stats.enemies = self.world.enemies.len();
        stats.projectiles = self.world.projectiles.len();
        stats.drops = self.world.drops.len();
        stats.buffered_intents = self.intents.len();
        stats.dropped_intents = self.intents.dropped();
        stats.rejected_requests = self.rejected;
        stats.avg_snapshot_bytes = self.gateway.stats().avg_bytes();
    }
}
