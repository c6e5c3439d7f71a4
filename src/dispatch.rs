//! Operation layer between the transport and the room state machine.
//!
//! Each operation validates the inbound payload, resolves the target room
//! through the registry, runs the room mutation under that room's lock and
//! returns the message plus snapshot the transport broadcasts to everyone
//! bound to the room. Errors go back to the caller only and are never
//! broadcast.

use crate::config;
use crate::game::RoomError;
use crate::registry::{Registry, SharedRoom};
use crate::types::{GameSnapshot, JoinKind, TriggerOutcome};

/// A successful mutation: the human-readable message and the snapshot to
/// fan out to the room.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub message: String,
    pub state: GameSnapshot,
}

fn validate_name(raw: &str) -> Result<&str, RoomError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RoomError::EmptyName);
    }
    if name.chars().count() > config::MAX_NAME_LEN {
        return Err(RoomError::NameTooLong);
    }
    Ok(name)
}

fn lookup(registry: &Registry, room_id: &str) -> Result<SharedRoom, RoomError> {
    if room_id.trim().is_empty() {
        return Err(RoomError::EmptyRoomId);
    }
    registry.get(room_id).ok_or(RoomError::RoomNotFound)
}

/// Creates a room with the caller as sole participant and host.
pub async fn create_room(
    registry: &Registry,
    conn_id: &str,
    player_name: &str,
) -> Result<(String, Outcome), RoomError> {
    let name = validate_name(player_name)?;
    let (room_id, room) = registry.create_room();

    let mut room = room.lock().await;
    if let Err(err) = room.add_player(conn_id, name) {
        drop(room);
        registry.remove(&room_id);
        return Err(err);
    }
    tracing::info!("Room {} created by {} ({})", room_id, name, conn_id);

    Ok((
        room_id,
        Outcome {
            message: "Room created successfully!".to_string(),
            state: room.snapshot(),
        },
    ))
}

/// Joins a room, or resumes an existing seat when the name is already
/// present (reconnection). The presence check and the rebind run under one
/// room lock, so a concurrent operation can never observe a half-moved
/// seat.
pub async fn join_room(
    registry: &Registry,
    conn_id: &str,
    room_id: &str,
    player_name: &str,
) -> Result<(JoinKind, Outcome), RoomError> {
    let name = validate_name(player_name)?;
    let room = lookup(registry, room_id)?;
    let mut room = room.lock().await;

    if room.has_player_named(name) {
        let old_id = room.reconnect(name, conn_id)?;
        tracing::info!(
            "{} reconnected to room {} as {} (was {})",
            name,
            room.id(),
            conn_id,
            old_id
        );
        return Ok((
            JoinKind::Reconnected,
            Outcome {
                message: format!("{name} reconnected!"),
                state: room.snapshot(),
            },
        ));
    }

    room.add_player(conn_id, name)?;
    tracing::info!("{} ({}) joined room {}", name, conn_id, room.id());
    Ok((
        JoinKind::Joined,
        Outcome {
            message: format!("{name} joined the game!"),
            state: room.snapshot(),
        },
    ))
}

/// Starts a round. Host only.
pub async fn start_game(
    registry: &Registry,
    conn_id: &str,
    room_id: &str,
) -> Result<Outcome, RoomError> {
    let room = lookup(registry, room_id)?;
    let mut room = room.lock().await;
    room.start(conn_id)?;
    tracing::info!("Game started in room {}", room.id());
    Ok(Outcome {
        message: "Game started!".to_string(),
        state: room.snapshot(),
    })
}

/// One trigger pull by the connection whose turn it is.
pub async fn pull_trigger(
    registry: &Registry,
    conn_id: &str,
    room_id: &str,
) -> Result<(TriggerOutcome, Outcome), RoomError> {
    let room = lookup(registry, room_id)?;
    let mut room = room.lock().await;
    let (message, result) = room.pull_trigger(conn_id)?;
    Ok((
        result,
        Outcome {
            message,
            state: room.snapshot(),
        },
    ))
}

/// Returns the room to the lobby. Host only.
pub async fn reset_game(
    registry: &Registry,
    conn_id: &str,
    room_id: &str,
) -> Result<Outcome, RoomError> {
    let room = lookup(registry, room_id)?;
    let mut room = room.lock().await;
    room.reset(conn_id)?;
    tracing::info!("Game reset in room {}", room.id());
    Ok(Outcome {
        message: "Game has been reset!".to_string(),
        state: room.snapshot(),
    })
}

/// Pure read. `None` for an unknown room, so clients can tell "no such
/// room" apart from an error on their own connection.
pub async fn get_state(registry: &Registry, room_id: &str) -> Option<GameSnapshot> {
    let room = registry.get(room_id)?;
    let room = room.lock().await;
    Some(room.snapshot())
}

/// Explicit leave, distinct from a silent disconnect: the seat is given up
/// immediately.
pub async fn leave_room(
    registry: &Registry,
    conn_id: &str,
    room_id: &str,
) -> Result<Outcome, RoomError> {
    let room = lookup(registry, room_id)?;
    let mut room = room.lock().await;
    let message = room.remove_player(conn_id)?;
    tracing::info!("{} left room {}", conn_id, room.id());
    Ok(Outcome {
        message,
        state: room.snapshot(),
    })
}
