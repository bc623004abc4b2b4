//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON object `{"type": <kind>, "data": <payload>}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::physics::Wall;

/// Tank archetypes available to players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TankType {
    /// Balanced stats
    #[default]
    Default,
    /// Slow, long range, heavy hits
    Sniper,
    /// Rapid fire, light damage
    Minigun,
    /// Fires a spread of pellets
    Shotgun,
    /// Fast but fragile
    Scout,
    /// Slow and tanky
    Heavy,
}

/// Petal type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetalKind {
    Basic,
    Rock,
    Light,
    Stinger,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientMsg {
    /// Display name for this session's player
    SetUsername(String),

    /// Archetype selection
    SetTankType(TankType),

    /// Latest key/aim state
    Input(InputState),

    /// Legacy movement shape; only the direction of the delta is used
    Move(MoveDelta),

    /// Client-computed petal hit, used as an attack timing hint only
    PetalAttack(PetalAttack),

    /// Direct pickup of an enemy (collect mode)
    Collect(u64),

    /// Bulk rearrangement of hotbar and inventory
    UpdatePetalsInventory(InventorySync),

    /// Single atomic slot move
    MovePetal(MovePetal),

    /// Chat line to relay
    ChatMessage(ChatLine),

    /// Request to respawn after death
    Respawn,
}

impl ClientMsg {
    /// Message kind, as it appears in the `type` field
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMsg::SetUsername(_) => "setUsername",
            ClientMsg::SetTankType(_) => "setTankType",
            ClientMsg::Input(_) => "input",
            ClientMsg::Move(_) => "move",
            ClientMsg::PetalAttack(_) => "petalAttack",
            ClientMsg::Collect(_) => "collect",
            ClientMsg::UpdatePetalsInventory(_) => "updatePetalsInventory",
            ClientMsg::MovePetal(_) => "movePetal",
            ClientMsg::ChatMessage(_) => "chatMessage",
            ClientMsg::Respawn => "respawn",
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerMsg {
    /// Full world state, sent once to a newly connected session
    Init(InitState),

    /// A player joined
    NewPlayer(PlayerView),

    /// A player left
    PlayerDisconnected(Uuid),

    /// A player's metadata, life state or loadout changed
    PlayerUpdated(PlayerView),

    /// Periodic snapshot, one per tick
    GameState(GameState),

    /// Chat relay
    ChatMessage(ChatLine),
}

/// Directional/aim/attack state
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InputState {
    #[serde(default)]
    pub up: bool,
    #[serde(default)]
    pub down: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    /// Fire (ranged) or spread petals (orbit)
    #[serde(default)]
    pub shooting: bool,
    /// Aim direction in radians
    #[serde(default)]
    pub angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoveDelta {
    pub dx: f32,
    pub dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PetalAttack {
    pub petal_id: u64,
    pub x: f32,
    pub y: f32,
}

/// Which container a slot reference points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotArea {
    Hotbar,
    Inventory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub area: SlotArea,
    pub index: usize,
}

impl SlotRef {
    pub fn hotbar(index: usize) -> Self {
        Self {
            area: SlotArea::Hotbar,
            index,
        }
    }

    pub fn inventory(index: usize) -> Self {
        Self {
            area: SlotArea::Inventory,
            index,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePetal {
    /// Player the client believes it is acting on
    #[serde(default)]
    pub player_id: Option<Uuid>,
    pub from: SlotRef,
    pub to: SlotRef,
}

/// Bulk hotbar/inventory layout proposed by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySync {
    #[serde(default)]
    pub player_id: Option<Uuid>,
    /// Hotbar slots in order, `null` for empty
    pub petals: Vec<Option<WirePetal>>,
    pub inventory: Vec<WirePetal>,
}

/// Petal as accepted from clients: full record or a bare type string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WirePetal {
    Full(PetalView),
    Legacy(PetalKind),
}

/// Petal as reported to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetalView {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: PetalKind,
    #[serde(default)]
    pub hp: u8,
    /// Ticks until the petal can strike again (0 = ready)
    #[serde(default)]
    pub reload: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLine {
    #[serde(default)]
    pub username: String,
    pub message: String,
}

/// Player state as seen by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub username: String,
    pub tank_type: TankType,
    pub x: f32,
    pub y: f32,
    /// Heading in radians
    pub angle: f32,
    pub health: f32,
    pub max_health: f32,
    pub dead: bool,
    pub kills: u32,
    /// Hotbar slots, `null` for empty
    pub petals: Vec<Option<PetalView>>,
    pub inventory: Vec<PetalView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub hp: i32,
    pub drop: PetalKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletView {
    pub id: u64,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub petal: PetalKind,
}

/// Payload of `init`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitState {
    /// The receiving session's own player id
    pub id: Uuid,
    pub tick: u64,
    pub players: Vec<PlayerView>,
    pub enemies: Vec<EnemyView>,
    pub bullets: Vec<BulletView>,
    pub drops: Vec<DropView>,
    pub walls: Vec<Wall>,
    /// Recent chat history, oldest first
    pub chat: Vec<ChatLine>,
}

/// Payload of `gameState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub tick: u64,
    pub players: Vec<PlayerView>,
    pub bullets: Vec<BulletView>,
    pub enemies: Vec<EnemyView>,
    pub drops: Vec<DropView>,
    pub walls: Vec<Wall>,
}
