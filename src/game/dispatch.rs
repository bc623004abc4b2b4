//! Inbound message dispatch
//!
//! One handler per message kind. Handlers only touch the state they are
//! handed, so they run the same way inside the engine task and in tests.

use tracing::trace;
use uuid::Uuid;

use crate::ws::protocol::{
    ChatLine, ClientMsg, InputState, InventorySync, MoveDelta, MovePetal, PetalAttack, ServerMsg,
    TankType,
};

use super::chat::ChatLog;
use super::combat::{orbit_position, CombatMode, CombatResolver, EnemyKill};
use super::error::GameError;
use super::input::{Intent, IntentBuffer};
use super::snapshot::SnapshotBuilder;
use super::spawn::respawn_player;
use super::world::{Player, World, DEFAULT_USERNAME};

/// Longest accepted username, in characters
pub const MAX_USERNAME_CHARS: usize = 20;

/// Messages to broadcast as a result of a handled request
pub type Effects = Vec<ServerMsg>;

/// Mutable engine state a handler may touch
pub struct Dispatch<'a> {
    pub world: &'a mut World,
    pub intents: &'a mut IntentBuffer,
    pub chat: &'a mut ChatLog,
    /// Enemies removed outside the tick, turned into drops on the next one
    pub pending_kills: &'a mut Vec<EnemyKill>,
    pub mode: CombatMode,
}

pub fn handle(ctx: &mut Dispatch<'_>, session: Uuid, msg: ClientMsg) -> Result<Effects, GameError> {
    match msg {
        ClientMsg::SetUsername(name) => set_username(ctx, session, name),
        ClientMsg::SetTankType(tank_type) => set_tank_type(ctx, session, tank_type),
        ClientMsg::Input(input) => input_state(ctx, session, input),
        ClientMsg::Move(delta) => move_delta(ctx, session, delta),
        ClientMsg::PetalAttack(attack) => petal_attack(ctx, session, attack),
        ClientMsg::Collect(enemy_id) => collect(ctx, session, enemy_id),
        ClientMsg::UpdatePetalsInventory(layout) => update_inventory(ctx, session, layout),
        ClientMsg::MovePetal(request) => move_petal(ctx, session, request),
        ClientMsg::ChatMessage(line) => chat_message(ctx, session, line),
        ClientMsg::Respawn => respawn(ctx, session),
    }
}

fn set_username(ctx: &mut Dispatch<'_>, session: Uuid, name: String) -> Result<Effects, GameError> {
    let player = player_mut(ctx.world, session)?;
    if player.username_set {
        return Err(GameError::validation("username already set"));
    }

    let name: String = name.trim().chars().take(MAX_USERNAME_CHARS).collect();
    player.username = if name.is_empty() {
        DEFAULT_USERNAME.to_string()
    } else {
        name
    };
    player.username_set = true;
    Ok(vec![updated(player)])
}

fn set_tank_type(
    ctx: &mut Dispatch<'_>,
    session: Uuid,
    tank_type: TankType,
) -> Result<Effects, GameError> {
    let player = player_mut(ctx.world, session)?;
    if player.tank_set {
        return Err(GameError::validation("tank type already set"));
    }

    let fraction = player.health / player.max_health();
    player.tank_type = tank_type;
    player.tank_set = true;
    player.health = fraction * player.max_health();
    Ok(vec![updated(player)])
}

fn input_state(ctx: &mut Dispatch<'_>, session: Uuid, input: InputState) -> Result<Effects, GameError> {
    ctx.intents.submit(ctx.world, session, Intent::from(input))?;
    Ok(Vec::new())
}

fn move_delta(ctx: &mut Dispatch<'_>, session: Uuid, delta: MoveDelta) -> Result<Effects, GameError> {
    ctx.intents.submit_delta(ctx.world, session, delta)?;
    Ok(Vec::new())
}

/// The reported coordinates are never used for hit detection; the report
/// only makes the owner count as attacking on the next tick.
fn petal_attack(
    ctx: &mut Dispatch<'_>,
    session: Uuid,
    attack: PetalAttack,
) -> Result<Effects, GameError> {
    if ctx.mode != CombatMode::Orbit {
        return Err(GameError::validation(format!("petalAttack unavailable in {} mode", ctx.mode)));
    }
    if !attack.x.is_finite() || !attack.y.is_finite() {
        return Err(GameError::Protocol("non-finite petal position".into()));
    }

    let tick = ctx.world.tick;
    let player = player_mut(ctx.world, session)?;
    if player.dead {
        return Err(GameError::validation("dead players cannot attack"));
    }
    let slot = player
        .loadout
        .equipped()
        .find(|(_, p)| p.id == attack.petal_id)
        .map(|(slot, _)| slot)
        .ok_or_else(|| GameError::validation(format!("petal {} is not equipped", attack.petal_id)))?;

    let (server_x, server_y) = orbit_position(player.x, player.y, tick, slot, true);
    trace!(
        player_id = %session,
        petal_id = attack.petal_id,
        reported_x = attack.x,
        reported_y = attack.y,
        server_x,
        server_y,
        "Petal attack hint"
    );

    ctx.intents.hint_attack(session);
    Ok(Vec::new())
}

fn collect(ctx: &mut Dispatch<'_>, session: Uuid, enemy_id: u64) -> Result<Effects, GameError> {
    if ctx.mode != CombatMode::Collect {
        return Err(GameError::validation(format!("collect unavailable in {} mode", ctx.mode)));
    }
    let kill = CombatResolver::collect(ctx.world, session, enemy_id)?;
    ctx.pending_kills.push(kill);
    Ok(Vec::new())
}

fn update_inventory(
    ctx: &mut Dispatch<'_>,
    session: Uuid,
    layout: InventorySync,
) -> Result<Effects, GameError> {
    check_owner(session, layout.player_id)?;
    let player = player_mut(ctx.world, session)?;
    if player.loadout.sync(&layout)? {
        Ok(vec![updated(player)])
    } else {
        Ok(Vec::new())
    }
}

fn move_petal(ctx: &mut Dispatch<'_>, session: Uuid, request: MovePetal) -> Result<Effects, GameError> {
    check_owner(session, request.player_id)?;
    let player = player_mut(ctx.world, session)?;
    player.loadout.move_petal(request.from, request.to)?;
    Ok(vec![updated(player)])
}

/// The sender's registered name replaces whatever name the client put in
/// the payload.
fn chat_message(ctx: &mut Dispatch<'_>, session: Uuid, line: ChatLine) -> Result<Effects, GameError> {
    let player = player_mut(ctx.world, session)?;
    let relayed = ctx
        .chat
        .push(&player.username, &line.message)
        .ok_or_else(|| GameError::Protocol("empty chat message".into()))?;
    Ok(vec![ServerMsg::ChatMessage(relayed)])
}

fn respawn(ctx: &mut Dispatch<'_>, session: Uuid) -> Result<Effects, GameError> {
    respawn_player(ctx.world, session)?;
    ctx.intents.forget(&session);
    let player = player_mut(ctx.world, session)?;
    Ok(vec![updated(player)])
}

fn player_mut(world: &mut World, session: Uuid) -> Result<&mut Player, GameError> {
    world
        .players
        .get_mut(&session)
        .ok_or(GameError::SessionLost(session))
}

fn check_owner(session: Uuid, claimed: Option<Uuid>) -> Result<(), GameError> {
    match claimed {
        Some(id) if id != session => Err(GameError::validation(format!(
            "session {} cannot act on player {}",
            session, id
        ))),
        _ => Ok(()),
    }
}

fn updated(player: &Player) -> ServerMsg {
    ServerMsg::PlayerUpdated(SnapshotBuilder::player_view(player))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::inventory::InventoryError;
    use crate::game::GameConfig;
    use crate::ws::protocol::{PetalKind, SlotRef, WirePetal};

    struct Fixture {
        world: World,
        intents: IntentBuffer,
        chat: ChatLog,
        pending_kills: Vec<EnemyKill>,
        mode: CombatMode,
        id: Uuid,
    }

    impl Fixture {
        fn new(mode: CombatMode) -> Self {
            let mut world = World::new(&GameConfig::default());
            let id = Uuid::new_v4();
            world.add_player(id);
            Self {
                world,
                intents: IntentBuffer::new(),
                chat: ChatLog::default(),
                pending_kills: Vec::new(),
                mode,
                id,
            }
        }

        fn send(&mut self, msg: ClientMsg) -> Result<Effects, GameError> {
            self.send_as(self.id, msg)
        }

        fn send_as(&mut self, session: Uuid, msg: ClientMsg) -> Result<Effects, GameError> {
            let mut ctx = Dispatch {
                world: &mut self.world,
                intents: &mut self.intents,
                chat: &mut self.chat,
                pending_kills: &mut self.pending_kills,
                mode: self.mode,
            };
            handle(&mut ctx, session, msg)
        }

        fn player(&self) -> &Player {
            &self.world.players[&self.id]
        }
    }

    #[test]
    fn username_is_set_once() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let effects = f.send(ClientMsg::SetUsername("  ace  ".into())).unwrap();
        assert_eq!(effects.len(), 1);
        assert_eq!(f.player().username, "ace");

        assert!(matches!(
            f.send(ClientMsg::SetUsername("other".into())),
            Err(GameError::Validation(_))
        ));
        assert_eq!(f.player().username, "ace");
    }

    #[test]
    fn blank_username_falls_back_to_default() {
        let mut f = Fixture::new(CombatMode::Orbit);
        f.send(ClientMsg::SetUsername("   ".into())).unwrap();
        assert_eq!(f.player().username, DEFAULT_USERNAME);
    }

    #[test]
    fn tank_type_rescales_health() {
        let mut f = Fixture::new(CombatMode::Ranged);
        f.send(ClientMsg::SetTankType(TankType::Heavy)).unwrap();
        assert_eq!(f.player().tank_type, TankType::Heavy);
        assert_eq!(f.player().health, 150.0);
        assert!(f.send(ClientMsg::SetTankType(TankType::Scout)).is_err());
    }

    #[test]
    fn respawn_while_alive_is_a_silent_no_op() {
        let mut f = Fixture::new(CombatMode::Orbit);
        f.world.players.get_mut(&f.id).unwrap().x = 123.0;
        let before = (f.player().x, f.player().y, f.player().health);

        assert!(matches!(f.send(ClientMsg::Respawn), Err(GameError::Validation(_))));
        assert_eq!((f.player().x, f.player().y, f.player().health), before);
    }

    #[test]
    fn respawn_after_death_restores_player() {
        let mut f = Fixture::new(CombatMode::Orbit);
        f.world.players.get_mut(&f.id).unwrap().apply_damage(1000.0);
        assert!(f.send(ClientMsg::Input(InputState::default())).is_err());

        let effects = f.send(ClientMsg::Respawn).unwrap();
        assert!(matches!(&effects[..], [ServerMsg::PlayerUpdated(view)] if !view.dead));
        assert_eq!(f.player().health, 100.0);
        assert!(f.send(ClientMsg::Input(InputState::default())).is_ok());
    }

    #[test]
    fn init_layout_round_trip_changes_nothing() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let view = SnapshotBuilder::player_view(f.player());
        let before = f.player().loadout.clone();

        let effects = f
            .send(ClientMsg::UpdatePetalsInventory(InventorySync {
                player_id: Some(f.id),
                petals: view.petals.into_iter().map(|p| p.map(WirePetal::Full)).collect(),
                inventory: view.inventory.into_iter().map(WirePetal::Full).collect(),
            }))
            .unwrap();

        assert!(effects.is_empty());
        assert_eq!(f.player().loadout, before);
    }

    #[test]
    fn inventory_sync_rejects_invented_petals() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let result = f.send(ClientMsg::UpdatePetalsInventory(InventorySync {
            player_id: None,
            petals: vec![Some(WirePetal::Legacy(PetalKind::Stinger))],
            inventory: vec![],
        }));
        assert!(matches!(
            result,
            Err(GameError::Consistency(InventoryError::UnknownPetal(_)))
        ));
    }

    #[test]
    fn move_petal_rejects_foreign_player_and_bad_slots() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let before = f.player().loadout.clone();

        let foreign = f.send(ClientMsg::MovePetal(MovePetal {
            player_id: Some(Uuid::new_v4()),
            from: SlotRef::hotbar(0),
            to: SlotRef::hotbar(1),
        }));
        assert!(matches!(foreign, Err(GameError::Validation(_))));

        let out_of_range = f.send(ClientMsg::MovePetal(MovePetal {
            player_id: None,
            from: SlotRef::hotbar(0),
            to: SlotRef::inventory(4),
        }));
        assert!(matches!(out_of_range, Err(GameError::Validation(_))));
        assert_eq!(f.player().loadout, before);

        let ok = f.send(ClientMsg::MovePetal(MovePetal {
            player_id: Some(f.id),
            from: SlotRef::hotbar(0),
            to: SlotRef::inventory(0),
        }));
        assert!(ok.is_ok());
        assert!(f.player().loadout.hotbar()[0].is_none());
        assert_eq!(f.player().loadout.inventory().len(), 1);
    }

    #[test]
    fn petal_attack_only_hints_for_equipped_petals() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let petal_id = f.player().loadout.hotbar()[0].as_ref().unwrap().id;

        assert!(f
            .send(ClientMsg::PetalAttack(PetalAttack {
                petal_id: 9_999,
                x: 0.0,
                y: 0.0
            }))
            .is_err());
        assert!(!f.intents.is_attacking(&f.id));

        f.send(ClientMsg::PetalAttack(PetalAttack {
            petal_id,
            x: -1_000.0,
            y: -1_000.0,
        }))
        .unwrap();
        assert!(f.intents.is_attacking(&f.id));
    }

    #[test]
    fn mode_specific_messages_are_rejected_elsewhere() {
        let mut f = Fixture::new(CombatMode::Ranged);
        assert!(matches!(f.send(ClientMsg::Collect(1)), Err(GameError::Validation(_))));
        assert!(matches!(
            f.send(ClientMsg::PetalAttack(PetalAttack {
                petal_id: 1,
                x: 0.0,
                y: 0.0
            })),
            Err(GameError::Validation(_))
        ));
    }

    #[test]
    fn collect_queues_a_kill() {
        let mut f = Fixture::new(CombatMode::Collect);
        let enemy = f.world.insert_enemy(510.0, 510.0, 3, PetalKind::Rock);

        f.send(ClientMsg::Collect(enemy)).unwrap();

        assert!(f.world.enemies.is_empty());
        assert_eq!(f.pending_kills.len(), 1);
        assert_eq!(f.pending_kills[0].drop, PetalKind::Rock);
    }

    #[test]
    fn chat_uses_registered_name() {
        let mut f = Fixture::new(CombatMode::Orbit);
        f.send(ClientMsg::SetUsername("ace".into())).unwrap();

        let effects = f
            .send(ClientMsg::ChatMessage(ChatLine {
                username: "admin".into(),
                message: "hello".into(),
            }))
            .unwrap();

        assert_eq!(
            effects,
            vec![ServerMsg::ChatMessage(ChatLine {
                username: "ace".into(),
                message: "hello".into(),
            })]
        );
        assert_eq!(f.chat.history().len(), 1);
    }

    #[test]
    fn unknown_session_is_reported_lost() {
        let mut f = Fixture::new(CombatMode::Orbit);
        let ghost = Uuid::new_v4();
        assert_eq!(
            f.send_as(ghost, ClientMsg::Respawn),
            Err(GameError::SessionLost(ghost))
        );
    }
}
