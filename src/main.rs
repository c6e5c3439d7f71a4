use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use sixshot::config::ServerConfig;
use sixshot::dispatch;
use sixshot::game::RoomError;
use sixshot::registry::Registry;
use sixshot::types::{ClientMsg, JoinKind, ServerMsg};

type OutboundTx = mpsc::UnboundedSender<Message>;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    connections: Arc<Connections>,
}

// ─── Broadcast bookkeeping ────────────────────────────────────────

/// Which connections are bound to which room, for broadcast fan-out only.
/// The game core never sees this; seats in a room outlive the sockets
/// bound to them.
struct Connections {
    /// room id -> (connection id -> outbound channel)
    rooms: DashMap<String, HashMap<String, OutboundTx>>,
    /// connection id -> room id
    memberships: DashMap<String, String>,
}

impl Connections {
    fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            memberships: DashMap::new(),
        }
    }

    /// Binds a connection to a room, replacing any previous binding.
    fn bind(&self, room_id: &str, conn_id: &str, tx: OutboundTx) {
        self.unbind(conn_id);
        self.rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
        self.memberships
            .insert(conn_id.to_string(), room_id.to_string());
    }

    /// Drops a connection's binding. Game state is untouched: a dropped
    /// socket keeps its seat until it reconnects, leaves explicitly, or
    /// the room is reaped.
    fn unbind(&self, conn_id: &str) {
        if let Some((_, room_id)) = self.memberships.remove(conn_id) {
            let now_empty = self
                .rooms
                .get_mut(&room_id)
                .map(|mut conns| {
                    conns.remove(conn_id);
                    conns.is_empty()
                })
                .unwrap_or(false);
            if now_empty {
                self.rooms.remove_if(&room_id, |_, conns| conns.is_empty());
            }
        }
    }

    /// Sends a message to every connection bound to a room.
    fn broadcast(&self, room_id: &str, msg: &ServerMsg) {
        let Ok(json) = serde_json::to_string(msg) else {
            return;
        };
        if let Some(conns) = self.rooms.get(room_id) {
            for tx in conns.values() {
                let _ = tx.send(Message::Text(json.clone().into()));
            }
        }
    }
}

/// Sends a message to a single connection.
fn send(tx: &OutboundTx, msg: &ServerMsg) {
    if let Ok(json) = serde_json::to_string(msg) {
        let _ = tx.send(Message::Text(json.into()));
    }
}

/// Errors go to the originating connection only, never the room.
fn send_error(tx: &OutboundTx, err: RoomError) {
    send(
        tx,
        &ServerMsg::Error {
            message: err.to_string(),
        },
    );
}

// ─── WebSocket handling ───────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!("WebSocket connected: {}", conn_id);

    // Writer task drains the outbound channel into the socket, so
    // broadcasts never block on a slow peer's sink from inside a handler.
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let client_msg: ClientMsg = match serde_json::from_str(&text) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!("Invalid message from {}: {}", conn_id, err);
                continue;
            }
        };
        handle_client_msg(&state, &conn_id, &tx, client_msg).await;
    }

    // A disconnect only tears down the socket. The seat stays so the
    // player can come back under a new connection id.
    tracing::info!("WebSocket disconnected: {}", conn_id);
    state.connections.unbind(&conn_id);
    write_task.abort();
}

async fn handle_client_msg(state: &AppState, conn_id: &str, tx: &OutboundTx, msg: ClientMsg) {
    match msg {
        ClientMsg::CreateRoom { player_name } => {
            match dispatch::create_room(&state.registry, conn_id, &player_name).await {
                Ok((room_id, outcome)) => {
                    state.connections.bind(&room_id, conn_id, tx.clone());
                    send(
                        tx,
                        &ServerMsg::RoomCreated {
                            room_id,
                            message: outcome.message,
                            game_state: outcome.state,
                            is_host: true,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }

        ClientMsg::JoinRoom { room_id, player_name } => {
            match dispatch::join_room(&state.registry, conn_id, &room_id, &player_name).await {
                Ok((kind, outcome)) => {
                    let room_id = outcome.state.room_id.clone();
                    state.connections.bind(&room_id, conn_id, tx.clone());
                    if kind == JoinKind::Reconnected {
                        send(
                            tx,
                            &ServerMsg::PlayerJoined {
                                message: format!("Welcome back, {}!", player_name.trim()),
                                game_state: outcome.state.clone(),
                            },
                        );
                    }
                    state.connections.broadcast(
                        &room_id,
                        &ServerMsg::PlayerJoined {
                            message: outcome.message,
                            game_state: outcome.state,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }

        ClientMsg::StartGame { room_id } => {
            match dispatch::start_game(&state.registry, conn_id, &room_id).await {
                Ok(outcome) => {
                    let room_id = outcome.state.room_id.clone();
                    state.connections.broadcast(
                        &room_id,
                        &ServerMsg::GameStarted {
                            message: outcome.message,
                            game_state: outcome.state,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }

        ClientMsg::PullTrigger { room_id } => {
            match dispatch::pull_trigger(&state.registry, conn_id, &room_id).await {
                Ok((result, outcome)) => {
                    let room_id = outcome.state.room_id.clone();
                    state.connections.broadcast(
                        &room_id,
                        &ServerMsg::TriggerResult {
                            message: outcome.message,
                            result_data: result,
                            game_state: outcome.state,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }

        ClientMsg::ResetGame { room_id } => {
            match dispatch::reset_game(&state.registry, conn_id, &room_id).await {
                Ok(outcome) => {
                    let room_id = outcome.state.room_id.clone();
                    state.connections.broadcast(
                        &room_id,
                        &ServerMsg::GameReset {
                            message: outcome.message,
                            game_state: outcome.state,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }

        ClientMsg::GetGameState { room_id } => {
            let game_state = dispatch::get_state(&state.registry, &room_id).await;
            send(tx, &ServerMsg::GameStateUpdate { game_state });
        }

        ClientMsg::LeaveRoom { room_id } => {
            match dispatch::leave_room(&state.registry, conn_id, &room_id).await {
                Ok(outcome) => {
                    let room_id = outcome.state.room_id.clone();
                    state.connections.unbind(conn_id);
                    state.connections.broadcast(
                        &room_id,
                        &ServerMsg::PlayerLeft {
                            message: outcome.message,
                            game_state: outcome.state,
                        },
                    );
                }
                Err(err) => send_error(tx, err),
            }
        }
    }
}

// ─── Diagnostics ──────────────────────────────────────────────────

async fn debug_rooms(State(state): State<AppState>) -> impl IntoResponse {
    let mut rooms = serde_json::Map::new();
    for id in state.registry.room_ids() {
        if let Some(snapshot) = dispatch::get_state(&state.registry, &id).await {
            rooms.insert(
                id,
                serde_json::json!({
                    "players": snapshot.players.iter().map(|p| p.id.clone()).collect::<Vec<_>>(),
                    "player_names": snapshot.players.iter().map(|p| p.name.clone()).collect::<Vec<_>>(),
                    "host": snapshot.host,
                    "game_started": snapshot.game_started,
                    "is_game_over": snapshot.is_game_over,
                    "player_count": snapshot.player_count,
                    "current_chamber": snapshot.current_chamber,
                }),
            );
        }
    }
    axum::Json(serde_json::json!({
        "total_rooms": state.registry.len(),
        "rooms": rooms,
        "server_status": "running",
    }))
}

async fn health() -> &'static str {
    "ok"
}

// ─── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cfg = ServerConfig::from_env();

    let default_level = if cfg.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let registry = Registry::new();
    let _reaper = registry.spawn_reaper();

    let state = AppState {
        registry,
        connections: Arc::new(Connections::new()),
    };

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/debug/rooms", get(debug_rooms))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", cfg.host, cfg.port))
        .await
        .expect("Failed to bind");

    tracing::info!("Sixshot server running on {}:{}", cfg.host, cfg.port);

    axum::serve(listener, app).await.unwrap();
}
