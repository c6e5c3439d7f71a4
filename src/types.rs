use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A seat in a room, bound to the websocket connection that currently
/// holds it. The connection id changes on reconnection; everything else
/// survives it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub is_host: bool,
    pub is_alive: bool,
    pub joined_at: DateTime<Utc>,
}

/// Distinguishes a first-time join from a reconnection onto an existing seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Joined,
    Reconnected,
}

/// A point-in-time view of one room, safe to broadcast to every client.
/// The bullet position never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room_id: String,
    pub players: Vec<Player>,
    pub current_player: Option<Player>,
    pub is_game_over: bool,
    pub game_started: bool,
    pub winner: Option<String>,
    pub current_chamber: u32,
    pub total_chambers: u32,
    pub host: Option<String>,
    pub player_count: usize,
}

/// Result payload of a trigger pull, tagged by what the chamber held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TriggerOutcome {
    Bullet {
        eliminated_player: String,
        winner: String,
        game_over: bool,
    },
    Empty {
        current_player: String,
        current_player_id: String,
        game_over: bool,
    },
}

/// Messages sent from clients to the server via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    CreateRoom { player_name: String },
    JoinRoom { room_id: String, player_name: String },
    StartGame { room_id: String },
    PullTrigger { room_id: String },
    ResetGame { room_id: String },
    GetGameState { room_id: String },
    LeaveRoom { room_id: String },
}

/// Messages sent from the server to clients via WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    RoomCreated {
        room_id: String,
        message: String,
        game_state: GameSnapshot,
        is_host: bool,
    },
    PlayerJoined {
        message: String,
        game_state: GameSnapshot,
    },
    PlayerLeft {
        message: String,
        game_state: GameSnapshot,
    },
    GameStarted {
        message: String,
        game_state: GameSnapshot,
    },
    TriggerResult {
        message: String,
        result_data: TriggerOutcome,
        game_state: GameSnapshot,
    },
    GameReset {
        message: String,
        game_state: GameSnapshot,
    },
    GameStateUpdate {
        game_state: Option<GameSnapshot>,
    },
    Error {
        message: String,
    },
}
