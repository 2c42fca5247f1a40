use std::collections::HashSet;

use dashmap::DashMap;
use wastewatch_core::{ConnectionId, Room};

/// Tracks which live connections belong to which audience room.
///
/// Rooms are created lazily on first join and removed once their last member
/// leaves; there is no persisted room list. Membership is connection-scoped:
/// `leave_all` runs synchronously in the disconnect path, so a broadcast
/// issued after a disconnect never sees the departed connection.
pub struct RoomRegistry {
    rooms: DashMap<String, HashSet<ConnectionId>>,
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Add a connection to a room. Idempotent; joining a room that does not
    /// exist yet creates it.
    pub fn join(&self, connection_id: &ConnectionId, room: &Room) {
        let mut members = self.rooms.entry(room.name()).or_default();
        if members.insert(connection_id.clone()) {
            tracing::debug!(connection_id = %connection_id, room = %room, "Joined room");
        }
    }

    /// Remove a connection from every room it belongs to, dropping rooms
    /// that end up empty.
    pub fn leave_all(&self, connection_id: &ConnectionId) {
        let mut emptied = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            if entry.value_mut().remove(connection_id) && entry.value().is_empty() {
                emptied.push(entry.key().clone());
            }
        }
        for name in emptied {
            self.rooms.remove_if(&name, |_, members| members.is_empty());
        }
    }

    /// Members of a room by wire name. Empty for unknown rooms.
    pub fn members(&self, room_name: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_name)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn member_count(&self, room: &Room) -> usize {
        self.rooms
            .get(&room.name())
            .map(|members| members.len())
            .unwrap_or(0)
    }

    pub fn contains(&self, room: &Room, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(&room.name())
            .map(|members| members.contains(connection_id))
            .unwrap_or(false)
    }

    /// Number of currently live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
