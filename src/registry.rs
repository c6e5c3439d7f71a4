//! Process-wide room registry and the background reaper.
//!
//! The registry owns the id -> room map; each room carries its own mutex,
//! so a lookup hands back a shared handle and the caller locks it without
//! holding anything registry-wide. Long room operations therefore never
//! block lookups of unrelated rooms.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config;
use crate::game::Room;

/// Shared handle to one room.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Short, shareable, URL-safe room id: the first 8 hex characters of a
/// v4 uuid, upper-cased.
fn generate_room_id() -> String {
    Uuid::new_v4().simple().to_string()[..config::ROOM_ID_LEN].to_uppercase()
}

/// Room ids are case-insensitive on input; upper-case is canonical.
pub fn canonical_room_id(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// All live rooms, keyed by canonical id.
pub struct Registry {
    rooms: DashMap<String, SharedRoom>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
        })
    }

    /// Creates an empty lobby under a freshly generated id, retrying on
    /// the unlikely id collision.
    pub fn create_room(&self) -> (String, SharedRoom) {
        loop {
            let id = generate_room_id();
            match self.rooms.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    let room = Arc::new(Mutex::new(Room::new(id.clone())));
                    slot.insert(room.clone());
                    tracing::info!("Room created: {}", id);
                    return (id, room);
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<SharedRoom> {
        self.rooms
            .get(&canonical_room_id(id))
            .map(|entry| entry.value().clone())
    }

    /// No-op if the id is absent.
    pub fn remove(&self, id: &str) {
        self.rooms.remove(&canonical_room_id(id));
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn room_ids(&self) -> Vec<String> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }

    /// One sweep: deletes rooms that are empty and idle for longer than
    /// `timeout`. The emptiness check and the map removal happen together
    /// under `remove_if`, and a room whose lock is currently held is in
    /// use and gets skipped. Non-empty rooms are never touched. Returns
    /// how many rooms were deleted.
    pub fn reap_expired(&self, timeout: Duration) -> usize {
        let mut reaped = 0;
        for id in self.room_ids() {
            let removed = self
                .rooms
                .remove_if(&id, |_, room| {
                    room.try_lock()
                        .map(|room| room.is_expired(timeout))
                        .unwrap_or(false)
                })
                .is_some();
            if removed {
                tracing::info!("Cleaning up inactive room: {}", id);
                reaped += 1;
            }
        }
        if reaped > 0 {
            tracing::info!("Cleaned up {} inactive rooms", reaped);
        }
        reaped
    }

    /// Spawns the periodic reaper, bound to this registry. The returned
    /// handle lets the process owner stop the sweeps; the task itself
    /// never exits on its own.
    pub fn spawn_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config::REAP_INTERVAL);
            loop {
                ticker.tick().await;
                registry.reap_expired(config::INACTIVE_TIMEOUT);
            }
        })
    }
}
