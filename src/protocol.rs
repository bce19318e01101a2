// Wire protocol
//
// Inbound commands and outbound events as tagged enums. Every message is a
// JSON object whose `type` field names the variant; field names are camelCase.
// Anything that fails to deserialize into `ClientCommand` is rejected at the
// boundary and never reaches a room.

use serde::{Deserialize, Serialize};

use crate::map::MapGrid;
use crate::types::{
    Bomb, BombId, Coord, Curse, Direction, Player, PlayerId, PlayerStats, PowerUp, PowerUpId, Tile,
};

/// Commands sent by clients
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    #[serde(rename_all = "camelCase")]
    CreateRoom {
        name: String,
        #[serde(default)]
        emoji: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        name: String,
        #[serde(default)]
        emoji: Option<String>,
    },
    ChangeEmoji {
        #[serde(default)]
        emoji: Option<String>,
    },
    AddBot {},
    StartGame {},
    Move { direction: Direction },
    PlaceBomb {},
}

impl ClientCommand {
    /// Parses a raw inbound message
    pub fn parse(raw: &str) -> Result<Self, String> {
        serde_json::from_str(raw).map_err(|e| format!("Malformed command: {}", e))
    }
}

/// Board snapshot sent at the start of every round
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RoundState {
    pub round: u32,
    pub players: Vec<Player>,
    pub game_map: MapGrid,
    pub bombs: Vec<Bomb>,
    pub power_ups: Vec<PowerUp>,
}

/// One mutated cell
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TileChange {
    pub x: i32,
    pub y: i32,
    pub new_type: Tile,
}

impl TileChange {
    pub fn new(at: Coord, tile: Tile) -> Self {
        TileChange { x: at.x, y: at.y, new_type: tile }
    }
}

/// Changed player fields; unset fields are left out of the message
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bomb_power: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bombs: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_super_bomb: Option<bool>,
}

/// Events broadcast to room members
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        player_id: PlayerId,
        room_code: String,
        host_id: PlayerId,
        players: Vec<Player>,
    },
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        player_id: PlayerId,
        room_code: String,
        host_id: PlayerId,
        players: Vec<Player>,
    },
    #[serde(rename_all = "camelCase")]
    LobbyUpdate {
        players: Vec<Player>,
        host_id: Option<PlayerId>,
    },
    #[serde(rename_all = "camelCase")]
    GameStart { initial_state: RoundState },
    #[serde(rename_all = "camelCase")]
    RoundStart { new_state: RoundState },
    #[serde(rename_all = "camelCase")]
    PlayerMoved { player_id: PlayerId, x: i32, y: i32 },
    #[serde(rename_all = "camelCase")]
    BombPlaced { id: BombId, x: i32, y: i32, is_super: bool },
    #[serde(rename_all = "camelCase")]
    BombMoved { bomb_id: BombId, x: i32, y: i32 },
    #[serde(rename_all = "camelCase")]
    BombExploded { bomb_id: BombId, explosion_tiles: Vec<Coord> },
    MapUpdate { tiles: Vec<TileChange> },
    #[serde(rename_all = "camelCase")]
    PowerupSpawned { power_up: PowerUp },
    #[serde(rename_all = "camelCase")]
    PowerupCollected {
        power_up_id: PowerUpId,
        player_id: PlayerId,
        stats: PlayerStats,
    },
    #[serde(rename_all = "camelCase")]
    PlayerCursed { player_id: PlayerId, curse: Curse },
    #[serde(rename_all = "camelCase")]
    PlayerCured { player_id: PlayerId },
    #[serde(rename_all = "camelCase")]
    CurseTransferred { from_id: PlayerId, to_id: PlayerId, curse: Curse },
    #[serde(rename_all = "camelCase")]
    PlayerUpdate {
        player_id: PlayerId,
        #[serde(flatten)]
        change: PlayerChange,
    },
    SuddenDeath,
    SuddenDeathStarting,
    #[serde(rename_all = "camelCase")]
    RoundOver { winner_name: Option<String> },
    ScoreUpdate { players: Vec<Player> },
    #[serde(rename_all = "camelCase")]
    GameOver { winner_name: String },
    #[serde(rename_all = "camelCase")]
    PlayerLeft { player_id: PlayerId, new_host_id: Option<PlayerId> },
    ErrorMessage { message: String },
}

impl ServerEvent {
    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::RoomCreated { .. } => "room_created",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::LobbyUpdate { .. } => "lobby_update",
            ServerEvent::GameStart { .. } => "game_start",
            ServerEvent::RoundStart { .. } => "round_start",
            ServerEvent::PlayerMoved { .. } => "player_moved",
            ServerEvent::BombPlaced { .. } => "bomb_placed",
            ServerEvent::BombMoved { .. } => "bomb_moved",
            ServerEvent::BombExploded { .. } => "bomb_exploded",
            ServerEvent::MapUpdate { .. } => "map_update",
            ServerEvent::PowerupSpawned { .. } => "powerup_spawned",
            ServerEvent::PowerupCollected { .. } => "powerup_collected",
            ServerEvent::PlayerCursed { .. } => "player_cursed",
            ServerEvent::PlayerCured { .. } => "player_cured",
            ServerEvent::CurseTransferred { .. } => "curse_transferred",
            ServerEvent::PlayerUpdate { .. } => "player_update",
            ServerEvent::SuddenDeath => "sudden_death",
            ServerEvent::SuddenDeathStarting => "sudden_death_starting",
            ServerEvent::RoundOver { .. } => "round_over",
            ServerEvent::ScoreUpdate { .. } => "score_update",
            ServerEvent::GameOver { .. } => "game_over",
            ServerEvent::PlayerLeft { .. } => "player_left",
            ServerEvent::ErrorMessage { .. } => "error_message",
        }
    }

    /// Round and match results, the entries worth keeping in the match log
    pub fn is_outcome(&self) -> bool {
        matches!(self, ServerEvent::RoundOver { .. } | ServerEvent::GameOver { .. })
    }
}

/// Who an event is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    Room,
    Player(PlayerId),
}

/// An outbound event with its audience
#[derive(Debug, Clone)]
pub struct Envelope {
    pub to: Recipient,
    pub event: ServerEvent,
}
