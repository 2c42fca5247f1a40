use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// A broadcast audience group. Rooms are ephemeral: they exist on the hub
/// only while at least one live connection is joined.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Room {
    Admins,
    User(UserId),
}

impl Room {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(UserId::from_raw(id))
    }

    /// Wire-level room name (`admins`, `user_{id}`).
    pub fn name(&self) -> String {
        match self {
            Self::Admins => "admins".to_string(),
            Self::User(id) => format!("user_{id}"),
        }
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Scope of a single broadcast call.
#[derive(Clone, Debug)]
pub enum Audience {
    All,
    Room(Room),
    Rooms(Vec<Room>),
}

impl From<Room> for Audience {
    fn from(room: Room) -> Self {
        Self::Room(room)
    }
}
