//! The per-room state machine for the elimination game.
//!
//! A `Room` owns its participants, the turn order and the chamber state.
//! It is plain synchronous data: callers serialize access through the
//! per-room mutex handed out by the registry, and no method here blocks
//! or performs I/O.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config;
use crate::types::{GameSnapshot, Player, TriggerOutcome};

/// Errors a room operation reports back to the acting connection.
///
/// All of these are recoverable; the display text is relayed verbatim to
/// the originating connection and never broadcast. Grouped by kind:
/// validation, not-found, authorization, state and capacity.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    // validation
    #[error("Player name is required")]
    EmptyName,
    #[error("Player name must be 20 characters or less")]
    NameTooLong,
    #[error("Player name already taken")]
    NameTaken,
    #[error("You are already in this game")]
    AlreadyJoined,
    #[error("Room ID is required")]
    EmptyRoomId,

    // not found
    #[error("Room not found or has expired")]
    RoomNotFound,

    // authorization
    #[error("Only the host can {0} the game")]
    NotHost(&'static str),

    // state
    #[error("Game already started")]
    AlreadyStarted,
    #[error("Game hasn't started yet")]
    NotStarted,
    #[error("Game is already over")]
    GameOver,
    #[error("It's not your turn")]
    NotYourTurn,
    #[error("Player not in game")]
    NotInRoom,
    #[error("No players in game")]
    NoPlayers,
    #[error("Need at least 2 players to start")]
    NotEnoughPlayers,
    #[error("Cannot reset empty room")]
    EmptyRoom,

    // capacity
    #[error("Room is full")]
    RoomFull,

    // invariant violation; logged at the site that detected it
    #[error("Internal server error")]
    Internal,
}

/// Room lifecycle: Lobby -> InProgress -> Finished -> (reset) -> Lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    InProgress,
    Finished,
}

fn draw_bullet(chamber_count: u32) -> u32 {
    rand::rng().random_range(1..=chamber_count)
}

/// One game room.
pub struct Room {
    id: String,
    /// Seats in join order. The uniqueness key is `Player::id`.
    players: Vec<Player>,
    /// Turn order by connection id. Membership freezes while a game is in
    /// progress: departures remove entries, nothing is reordered or
    /// re-added until the next lobby.
    player_order: Vec<String>,
    current_player_index: usize,
    chamber_count: u32,
    /// Which pull hits, in [1, chamber_count]. Hidden from clients.
    bullet_position: u32,
    /// Shots fired this round.
    current_chamber: u32,
    phase: Phase,
    winner: Option<String>,
    host: Option<String>,
    created_at: DateTime<Utc>,
    last_activity: Instant,
}

impl Room {
    pub fn new(id: String) -> Self {
        Self {
            id,
            players: Vec::new(),
            player_order: Vec::new(),
            current_player_index: 0,
            chamber_count: config::CHAMBER_COUNT,
            bullet_position: draw_bullet(config::CHAMBER_COUNT),
            current_chamber: 0,
            phase: Phase::Lobby,
            winner: None,
            host: None,
            created_at: Utc::now(),
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn has_player_named(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    /// True when the reaper may delete this room: nobody seated and no
    /// activity for longer than `timeout`. Non-empty rooms never expire.
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.players.is_empty() && self.last_activity.elapsed() > timeout
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn find_player(&self, conn_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == conn_id)
    }

    /// Adds a new player. The first player in becomes host. While a game
    /// is in progress the newcomer gets no turn slot; they watch until the
    /// next round.
    pub fn add_player(&mut self, conn_id: &str, name: &str) -> Result<(), RoomError> {
        if self.players.len() >= config::MAX_PLAYERS {
            return Err(RoomError::RoomFull);
        }
        if self.find_player(conn_id).is_some() {
            return Err(RoomError::AlreadyJoined);
        }
        if self.has_player_named(name) {
            return Err(RoomError::NameTaken);
        }

        if self.host.is_none() {
            self.host = Some(conn_id.to_string());
        }
        self.players.push(Player {
            id: conn_id.to_string(),
            name: name.to_string(),
            is_host: self.host.as_deref() == Some(conn_id),
            is_alive: true,
            joined_at: Utc::now(),
        });
        if self.phase != Phase::InProgress {
            self.player_order.push(conn_id.to_string());
        }
        self.touch();
        Ok(())
    }

    /// Re-keys the seat holding `name` onto a new connection id, preserving
    /// aliveness, host status, join time and the turn-order slot. Returns
    /// the replaced connection id.
    pub fn reconnect(&mut self, name: &str, new_conn_id: &str) -> Result<String, RoomError> {
        let seat = self
            .players
            .iter()
            .position(|p| p.name == name)
            .ok_or(RoomError::NotInRoom)?;

        let old_id = std::mem::replace(&mut self.players[seat].id, new_conn_id.to_string());
        if self.players[seat].is_host {
            self.host = Some(new_conn_id.to_string());
        }
        if let Some(slot) = self.player_order.iter().position(|id| *id == old_id) {
            self.player_order[slot] = new_conn_id.to_string();
        }
        self.touch();
        Ok(old_id)
    }

    /// Removes a player, transferring host status and patching the turn
    /// index so "whose turn is it" is preserved across the removal.
    /// Returns the departure message for broadcast.
    pub fn remove_player(&mut self, conn_id: &str) -> Result<String, RoomError> {
        let seat = self
            .players
            .iter()
            .position(|p| p.id == conn_id)
            .ok_or(RoomError::NotInRoom)?;
        let removed = self.players.remove(seat);

        if self.phase != Phase::InProgress {
            self.player_order.retain(|id| id != conn_id);
        } else if let Some(pos) = self.player_order.iter().position(|id| id == conn_id) {
            self.player_order.remove(pos);
            if self.player_order.is_empty() {
                self.current_player_index = 0;
            } else if pos < self.current_player_index {
                self.current_player_index -= 1;
            } else if pos == self.current_player_index {
                // The departing player held the turn: the same slot now
                // points at the next remaining player, wrapping past the end.
                self.current_player_index %= self.player_order.len();
            }
        }

        if removed.is_host {
            // Earliest joined remaining player inherits the room.
            match self.players.first_mut() {
                Some(next) => {
                    next.is_host = true;
                    self.host = Some(next.id.clone());
                }
                None => self.host = None,
            }
        }

        self.touch();
        Ok(format!("{} left the game", removed.name))
    }

    /// Starts a round. Host only, needs at least two players.
    pub fn start(&mut self, conn_id: &str) -> Result<(), RoomError> {
        if self.host.as_deref() != Some(conn_id) {
            return Err(RoomError::NotHost("start"));
        }
        if self.players.len() < config::MIN_PLAYERS {
            return Err(RoomError::NotEnoughPlayers);
        }
        if self.phase == Phase::InProgress {
            return Err(RoomError::AlreadyStarted);
        }
        self.phase = Phase::InProgress;
        self.reset_round();
        Ok(())
    }

    /// Back to the lobby with a fresh chamber. Host only.
    pub fn reset(&mut self, conn_id: &str) -> Result<(), RoomError> {
        if self.players.is_empty() {
            return Err(RoomError::EmptyRoom);
        }
        if self.host.as_deref() != Some(conn_id) {
            return Err(RoomError::NotHost("reset"));
        }
        self.reset_round();
        self.phase = Phase::Lobby;
        Ok(())
    }

    /// Rewinds the round state: new bullet, zero shots, everyone alive,
    /// turn back to the first slot. The caller sets the phase.
    fn reset_round(&mut self) {
        self.bullet_position = draw_bullet(self.chamber_count);
        self.current_chamber = 0;
        self.current_player_index = 0;
        self.winner = None;
        for player in &mut self.players {
            player.is_alive = true;
        }
        self.touch();
    }

    /// One trigger pull by `conn_id`. Returns the broadcast message and the
    /// tagged outcome.
    pub fn pull_trigger(&mut self, conn_id: &str) -> Result<(String, TriggerOutcome), RoomError> {
        match self.phase {
            Phase::Lobby => return Err(RoomError::NotStarted),
            Phase::Finished => return Err(RoomError::GameOver),
            Phase::InProgress => {}
        }
        if self.player_order.is_empty() {
            return Err(RoomError::NoPlayers);
        }
        // Prior removals can only shrink the order; clamp before comparing.
        if self.current_player_index >= self.player_order.len() {
            self.current_player_index = 0;
        }
        if self.player_order[self.current_player_index] != conn_id {
            return Err(RoomError::NotYourTurn);
        }
        let Some(shooter) = self.find_player(conn_id).map(|p| p.name.clone()) else {
            tracing::error!("room {}: turn order references unknown player {}", self.id, conn_id);
            return Err(RoomError::Internal);
        };

        self.current_chamber += 1;
        self.touch();

        if self.current_chamber == self.bullet_position {
            if let Some(player) = self.players.iter_mut().find(|p| p.id == conn_id) {
                player.is_alive = false;
            }
            self.phase = Phase::Finished;

            let survivors: Vec<&str> = self
                .players
                .iter()
                .filter(|p| p.is_alive)
                .map(|p| p.name.as_str())
                .collect();
            let winner = match survivors.as_slice() {
                [] => "No survivors".to_string(),
                [only] => (*only).to_string(),
                many => format!("Survivors: {}", many.join(", ")),
            };
            self.winner = Some(winner.clone());

            return Ok((
                format!("{shooter} got the bullet! Game Over!"),
                TriggerOutcome::Bullet {
                    eliminated_player: shooter,
                    winner,
                    game_over: true,
                },
            ));
        }

        self.current_player_index = (self.current_player_index + 1) % self.player_order.len();
        let next_id = self.player_order[self.current_player_index].clone();
        let Some(next) = self.find_player(&next_id).map(|p| p.name.clone()) else {
            tracing::error!("room {}: turn order references unknown player {}", self.id, next_id);
            return Err(RoomError::Internal);
        };

        Ok((
            format!("{shooter} is safe! {next}'s turn."),
            TriggerOutcome::Empty {
                current_player: next,
                current_player_id: next_id,
                game_over: false,
            },
        ))
    }

    /// Pure read. Never mutates state or the activity timestamp.
    pub fn snapshot(&self) -> GameSnapshot {
        let current_player = if self.phase == Phase::InProgress {
            self.player_order
                .get(self.current_player_index)
                .and_then(|id| self.find_player(id))
                .cloned()
        } else {
            None
        };

        GameSnapshot {
            room_id: self.id.clone(),
            players: self.players.clone(),
            current_player,
            is_game_over: self.phase == Phase::Finished,
            game_started: matches!(self.phase, Phase::InProgress | Phase::Finished),
            winner: self.winner.clone(),
            current_chamber: self.current_chamber,
            total_chambers: self.chamber_count,
            host: self.host.clone(),
            player_count: self.players.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(i: usize) -> String {
        format!("conn-{i}")
    }

    fn room_with(names: &[&str]) -> Room {
        let mut room = Room::new("TESTROOM".to_string());
        for (i, name) in names.iter().enumerate() {
            room.add_player(&conn(i), name).unwrap();
        }
        room
    }

    fn current_conn(room: &Room) -> String {
        room.player_order[room.current_player_index].clone()
    }

    #[test]
    fn first_player_becomes_host() {
        let room = room_with(&["Alice", "Bob"]);
        assert_eq!(room.host(), Some(conn(0).as_str()));
        assert!(room.players[0].is_host);
        assert!(!room.players[1].is_host);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut room = room_with(&["a", "b", "c", "d", "e", "f"]);
        assert_eq!(room.player_count(), config::MAX_PLAYERS);
        assert_eq!(room.add_player("conn-6", "g"), Err(RoomError::RoomFull));
        assert_eq!(room.player_count(), config::MAX_PLAYERS);
    }

    #[test]
    fn duplicate_name_and_connection_rejected() {
        let mut room = room_with(&["Alice"]);
        assert_eq!(room.add_player("conn-9", "Alice"), Err(RoomError::NameTaken));
        assert_eq!(room.add_player(&conn(0), "Eve"), Err(RoomError::AlreadyJoined));
        assert_eq!(room.player_count(), 1);
    }

    #[test]
    fn names_stay_distinct_under_churn() {
        let mut room = room_with(&["a", "b", "c"]);
        room.remove_player(&conn(1)).unwrap();
        room.add_player("conn-9", "b").unwrap();
        let mut names: Vec<_> = room.players.iter().map(|p| p.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), room.player_count());
    }

    #[test]
    fn host_departure_promotes_earliest_joined() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.remove_player(&conn(0)).unwrap();
        assert_eq!(room.host(), Some(conn(1).as_str()));
        let hosts = room.players.iter().filter(|p| p.is_host).count();
        assert_eq!(hosts, 1);
    }

    #[test]
    fn last_player_leaving_clears_host() {
        let mut room = room_with(&["Alice"]);
        room.remove_player(&conn(0)).unwrap();
        assert_eq!(room.host(), None);
        assert_eq!(room.player_count(), 0);
    }

    #[test]
    fn remove_unknown_player_fails() {
        let mut room = room_with(&["Alice"]);
        assert_eq!(room.remove_player("nope"), Err(RoomError::NotInRoom));
    }

    #[test]
    fn start_requires_host_and_enough_players() {
        let mut room = room_with(&["Alice"]);
        assert_eq!(room.start(&conn(0)), Err(RoomError::NotEnoughPlayers));

        room.add_player(&conn(1), "Bob").unwrap();
        assert_eq!(room.start(&conn(1)), Err(RoomError::NotHost("start")));

        room.start(&conn(0)).unwrap();
        assert_eq!(room.phase(), Phase::InProgress);
        assert_eq!(room.current_player_index, 0);
        assert_eq!(room.current_chamber, 0);
        assert!(room.players.iter().all(|p| p.is_alive));

        assert_eq!(room.start(&conn(0)), Err(RoomError::AlreadyStarted));
    }

    #[test]
    fn start_is_allowed_from_finished() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 1;
        room.pull_trigger(&conn(0)).unwrap();
        assert_eq!(room.phase(), Phase::Finished);

        room.start(&conn(0)).unwrap();
        assert_eq!(room.phase(), Phase::InProgress);
        assert!(room.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn bullet_position_always_in_range() {
        for _ in 0..100 {
            let room = Room::new("R".to_string());
            assert!((1..=config::CHAMBER_COUNT).contains(&room.bullet_position));
        }
        let mut room = room_with(&["Alice", "Bob"]);
        for _ in 0..100 {
            room.reset_round();
            assert!((1..=config::CHAMBER_COUNT).contains(&room.bullet_position));
        }
    }

    #[test]
    fn act_out_of_turn_fails_without_state_change() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        let index_before = room.current_player_index;
        let chamber_before = room.current_chamber;

        assert_eq!(room.pull_trigger(&conn(1)), Err(RoomError::NotYourTurn));
        assert_eq!(room.current_player_index, index_before);
        assert_eq!(room.current_chamber, chamber_before);
    }

    #[test]
    fn act_outside_a_round_fails() {
        let mut room = room_with(&["Alice", "Bob"]);
        assert_eq!(room.pull_trigger(&conn(0)), Err(RoomError::NotStarted));

        room.start(&conn(0)).unwrap();
        room.bullet_position = 1;
        room.pull_trigger(&conn(0)).unwrap();
        assert_eq!(room.pull_trigger(&conn(1)), Err(RoomError::GameOver));
    }

    #[test]
    fn turn_alternates_until_the_bullet() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 6;

        for shot in 1..=5u32 {
            let actor = current_conn(&room);
            let (_, outcome) = room.pull_trigger(&actor).unwrap();
            assert_eq!(room.current_chamber, shot);
            match outcome {
                TriggerOutcome::Empty { current_player_id, .. } => {
                    assert_ne!(current_player_id, actor);
                    assert_eq!(current_player_id, current_conn(&room));
                }
                TriggerOutcome::Bullet { .. } => panic!("bullet before chamber 6"),
            }
        }

        let actor = current_conn(&room);
        let (_, outcome) = room.pull_trigger(&actor).unwrap();
        match outcome {
            TriggerOutcome::Bullet { game_over, .. } => assert!(game_over),
            TriggerOutcome::Empty { .. } => panic!("chamber 6 must hold the bullet"),
        }
        assert_eq!(room.phase(), Phase::Finished);
    }

    #[test]
    fn winner_is_the_single_survivor() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 1;

        let (message, outcome) = room.pull_trigger(&conn(0)).unwrap();
        assert!(message.contains("Alice got the bullet"));
        match outcome {
            TriggerOutcome::Bullet { eliminated_player, winner, .. } => {
                assert_eq!(eliminated_player, "Alice");
                assert_eq!(winner, "Bob");
            }
            TriggerOutcome::Empty { .. } => panic!("expected elimination"),
        }
        assert_eq!(room.snapshot().winner.as_deref(), Some("Bob"));
    }

    #[test]
    fn winner_lists_multiple_survivors() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 1;

        let (_, outcome) = room.pull_trigger(&conn(0)).unwrap();
        match outcome {
            TriggerOutcome::Bullet { winner, .. } => {
                assert_eq!(winner, "Survivors: Bob, Carol");
            }
            TriggerOutcome::Empty { .. } => panic!("expected elimination"),
        }
    }

    #[test]
    fn no_survivors_is_reported_without_panicking() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.remove_player(&conn(1)).unwrap();
        room.bullet_position = 1;

        let (_, outcome) = room.pull_trigger(&conn(0)).unwrap();
        match outcome {
            TriggerOutcome::Bullet { winner, .. } => assert_eq!(winner, "No survivors"),
            TriggerOutcome::Empty { .. } => panic!("expected elimination"),
        }
    }

    #[test]
    fn removing_before_current_keeps_the_turn_holder() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();
        room.current_player_index = 2; // Carol's turn

        room.remove_player(&conn(0)).unwrap();
        assert_eq!(room.current_player_index, 1);
        assert_eq!(current_conn(&room), conn(2));
    }

    #[test]
    fn removing_current_passes_turn_to_same_slot() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();
        room.current_player_index = 1; // Bob's turn

        room.remove_player(&conn(1)).unwrap();
        assert_eq!(room.current_player_index, 1);
        assert_eq!(current_conn(&room), conn(2));
    }

    #[test]
    fn removing_current_at_end_wraps_to_front() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();
        room.current_player_index = 2; // Carol's turn

        room.remove_player(&conn(2)).unwrap();
        assert_eq!(room.current_player_index, 0);
        assert_eq!(current_conn(&room), conn(0));
    }

    #[test]
    fn removing_after_current_changes_nothing() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();

        room.remove_player(&conn(2)).unwrap();
        assert_eq!(room.current_player_index, 0);
        assert_eq!(current_conn(&room), conn(0));
    }

    #[test]
    fn removing_everyone_mid_game_empties_the_order() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.remove_player(&conn(0)).unwrap();
        room.remove_player(&conn(1)).unwrap();

        assert_eq!(room.current_player_index, 0);
        assert!(room.player_order.is_empty());
        assert_eq!(room.pull_trigger(&conn(0)), Err(RoomError::NoPlayers));
    }

    #[test]
    fn act_clamps_a_stale_turn_index() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 6;
        room.current_player_index = 99;

        // Clamped to slot 0, so Alice may act.
        room.pull_trigger(&conn(0)).unwrap();
        assert_eq!(room.current_player_index, 1);
    }

    #[test]
    fn mid_game_joiner_gets_no_turn_slot() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.add_player("conn-9", "Carol").unwrap();

        assert_eq!(room.player_count(), 3);
        assert_eq!(room.player_order.len(), 2);
        assert!(!room.player_order.contains(&"conn-9".to_string()));

        // A reset does not rebuild the order either.
        room.reset(&conn(0)).unwrap();
        assert_eq!(room.player_order.len(), 2);
    }

    #[test]
    fn joining_a_finished_game_appends_to_the_order() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        room.bullet_position = 1;
        room.pull_trigger(&conn(0)).unwrap();
        assert_eq!(room.phase(), Phase::Finished);

        room.add_player("conn-9", "Carol").unwrap();
        assert!(room.player_order.contains(&"conn-9".to_string()));
    }

    #[test]
    fn reconnect_preserves_seat_and_turn_slot() {
        let mut room = room_with(&["Alice", "Bob", "Carol"]);
        room.start(&conn(0)).unwrap();
        room.players[1].is_alive = false;
        let joined_at = room.players[1].joined_at;

        let old = room.reconnect("Bob", "conn-9").unwrap();
        assert_eq!(old, conn(1));
        assert!(room.find_player(&conn(1)).is_none());

        let bob = room.find_player("conn-9").unwrap();
        assert!(!bob.is_alive);
        assert!(!bob.is_host);
        assert_eq!(bob.joined_at, joined_at);
        assert_eq!(room.player_order[1], "conn-9");
        assert_eq!(room.player_count(), 3);
    }

    #[test]
    fn reconnecting_host_moves_host_id() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.reconnect("Alice", "conn-9").unwrap();
        assert_eq!(room.host(), Some("conn-9"));
        assert!(room.find_player("conn-9").unwrap().is_host);
    }

    #[test]
    fn reconnect_unknown_name_fails() {
        let mut room = room_with(&["Alice"]);
        assert_eq!(room.reconnect("Ghost", "conn-9"), Err(RoomError::NotInRoom));
    }

    #[test]
    fn reset_needs_host_and_players() {
        let mut room = room_with(&["Alice", "Bob"]);
        room.start(&conn(0)).unwrap();
        assert_eq!(room.reset(&conn(1)), Err(RoomError::NotHost("reset")));

        room.reset(&conn(0)).unwrap();
        assert_eq!(room.phase(), Phase::Lobby);
        assert_eq!(room.current_chamber, 0);
        assert_eq!(room.snapshot().winner, None);
        assert!(room.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn reset_of_empty_room_fails() {
        let mut room = Room::new("R".to_string());
        assert_eq!(room.reset("anyone"), Err(RoomError::EmptyRoom));
        room.add_player(&conn(0), "Alice").unwrap();
        room.remove_player(&conn(0)).unwrap();
        assert_eq!(room.reset(&conn(0)), Err(RoomError::EmptyRoom));
    }

    #[test]
    fn snapshot_reports_phase_flags_and_current_player() {
        let mut room = room_with(&["Alice", "Bob"]);
        let snap = room.snapshot();
        assert!(!snap.game_started);
        assert!(!snap.is_game_over);
        assert!(snap.current_player.is_none());

        room.start(&conn(0)).unwrap();
        let snap = room.snapshot();
        assert!(snap.game_started);
        assert!(!snap.is_game_over);
        assert_eq!(snap.current_player.as_ref().map(|p| p.name.as_str()), Some("Alice"));

        room.bullet_position = 1;
        room.pull_trigger(&conn(0)).unwrap();
        let snap = room.snapshot();
        assert!(snap.game_started);
        assert!(snap.is_game_over);
        assert!(snap.current_player.is_none());
    }

    #[test]
    fn snapshot_does_not_touch_activity() {
        let room = room_with(&["Alice"]);
        let before = room.last_activity;
        let _ = room.snapshot();
        assert_eq!(room.last_activity, before);
    }

    #[test]
    fn expiry_needs_an_empty_room() {
        let mut room = room_with(&["Alice"]);
        std::thread::sleep(Duration::from_millis(2));
        assert!(!room.is_expired(Duration::ZERO));

        room.remove_player(&conn(0)).unwrap();
        std::thread::sleep(Duration::from_millis(2));
        assert!(room.is_expired(Duration::ZERO));
        assert!(!room.is_expired(Duration::from_secs(3600)));
    }
}
