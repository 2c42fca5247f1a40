use std::collections::HashSet;
use std::sync::Arc;

use wastewatch_core::{Audience, ConnectionId, HubEvent, Report, Room, StatsAction, StatsDelta};

use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;
use crate::wire;

/// Accepts typed events from mutation producers and fans them out to rooms.
///
/// Broadcast is fire-and-forget: the frame is serialized once and enqueued on
/// every in-scope connection synchronously within the call. No delivery
/// confirmation, no retry, no replay for late joiners.
#[derive(Clone)]
pub struct BroadcastHub {
    connections: Arc<ConnectionRegistry>,
    rooms: Arc<RoomRegistry>,
}

impl BroadcastHub {
    pub fn new(connections: Arc<ConnectionRegistry>, rooms: Arc<RoomRegistry>) -> Self {
        Self { connections, rooms }
    }

    pub fn connections(&self) -> &Arc<ConnectionRegistry> {
        &self.connections
    }

    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.rooms
    }

    /// Deliver one event to every connection in scope. Returns the number of
    /// connections the frame was enqueued for. Broadcasting to an empty or
    /// unknown room is a no-op, not an error.
    pub fn broadcast(&self, event: &HubEvent, audience: &Audience) -> usize {
        let Some(frame) = wire::encode_event(event) else {
            return 0;
        };

        let targets: Vec<ConnectionId> = match audience {
            Audience::All => self.connections.ids(),
            Audience::Room(room) => self.rooms.members(&room.name()),
            Audience::Rooms(rooms) => {
                let mut seen = HashSet::new();
                rooms
                    .iter()
                    .flat_map(|room| self.rooms.members(&room.name()))
                    .filter(|id| seen.insert(id.clone()))
                    .collect()
            }
        };

        let mut delivered = 0;
        for id in &targets {
            if self.connections.send_to(id, frame.clone()) {
                delivered += 1;
            }
        }

        tracing::debug!(
            event_type = event.event_type(),
            targets = targets.len(),
            delivered,
            "Broadcast"
        );
        delivered
    }

    /// Routing policy for report creation: everyone hears about the report;
    /// admins additionally get a distinct urgent alert for high/critical
    /// priorities, so urgency can never be lost to filtering on the general
    /// channel.
    pub fn publish_report(&self, report: Report) {
        let urgent = report.priority.is_urgent();

        self.broadcast(&HubEvent::new_report(report.clone()), &Audience::All);

        if urgent {
            self.broadcast(
                &HubEvent::urgent_alert(report),
                &Audience::Room(Room::Admins),
            );
        }
    }

    /// Coarse stats pushes always go to everyone.
    pub fn publish_stats(&self, action: StatsAction, delta: StatsDelta) {
        self.broadcast(&HubEvent::dashboard_update(action, delta), &Audience::All);
    }
}
