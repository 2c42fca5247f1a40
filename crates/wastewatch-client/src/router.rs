use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Deserialize;
use wastewatch_core::HubEvent;

/// The event kinds a subscriber can register interest in.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum EventKind {
    NewReport,
    UrgentAlert,
    DashboardUpdate,
}

impl EventKind {
    pub fn of(event: &HubEvent) -> Self {
        match event {
            HubEvent::NewReport { .. } => Self::NewReport,
            HubEvent::UrgentAlert { .. } => Self::UrgentAlert,
            HubEvent::DashboardUpdate { .. } => Self::DashboardUpdate,
        }
    }
}

type Handler = Box<dyn Fn(&HubEvent) + Send + Sync>;

/// Envelope shape for frames arriving from the hub.
#[derive(Deserialize)]
struct InboundFrame {
    #[allow(dead_code)]
    event: String,
    payload: HubEvent,
}

/// Dispatches decoded hub events to per-kind subscribers.
///
/// Malformed or unrecognized frames are dropped with a log line; decoding
/// problems never propagate into subscriber code. Subscribers for one kind
/// run in registration order; kinds impose no ordering between each other
/// beyond channel arrival order.
pub struct EventRouter {
    handlers: RwLock<HashMap<EventKind, Vec<Handler>>>,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber for one event kind.
    pub fn subscribe(&self, kind: EventKind, handler: impl Fn(&HubEvent) + Send + Sync + 'static) {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Box::new(handler));
    }

    /// Invoke every subscriber registered for the event's kind.
    pub fn dispatch(&self, event: &HubEvent) {
        let handlers = self.handlers.read();
        if let Some(subscribers) = handlers.get(&EventKind::of(event)) {
            for handler in subscribers {
                handler(event);
            }
        }
    }

    /// Decode a raw wire frame and dispatch it. Undecodable frames are
    /// dropped, never an error.
    pub fn dispatch_frame(&self, raw: &str) {
        match serde_json::from_str::<InboundFrame>(raw) {
            Ok(frame) => self.dispatch(&frame.payload),
            Err(err) => {
                tracing::warn!(error = %err, frame_len = raw.len(), "Dropping undecodable frame");
            }
        }
    }

    /// Drop every registered subscriber. Called on transport teardown so
    /// handlers cannot leak across reconnect cycles.
    pub fn clear(&self) {
        self.handlers.write().clear();
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .get(&kind)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use wastewatch_core::{Priority, Report};

    #[test]
    fn dispatch_reaches_matching_subscribers_only() {
        let router = EventRouter::new();
        let new_hits = Arc::new(AtomicUsize::new(0));
        let urgent_hits = Arc::new(AtomicUsize::new(0));

        let n = Arc::clone(&new_hits);
        router.subscribe(EventKind::NewReport, move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        });
        let u = Arc::clone(&urgent_hits);
        router.subscribe(EventKind::UrgentAlert, move |_| {
            u.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch(&HubEvent::new_report(Report::new("t", "l", Priority::Low)));

        assert_eq!(new_hits.load(Ordering::SeqCst), 1);
        assert_eq!(urgent_hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn multiple_subscribers_all_fire() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let h = Arc::clone(&hits);
            router.subscribe(EventKind::NewReport, move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            });
        }

        router.dispatch(&HubEvent::new_report(Report::new("t", "l", Priority::Low)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn frame_dispatch_decodes_payload() {
        let router = EventRouter::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        router.subscribe(EventKind::UrgentAlert, move |event| {
            if let HubEvent::UrgentAlert { report, .. } = event {
                s.lock().push(report.title.clone());
            }
        });

        let event = HubEvent::urgent_alert(Report::new("Spill", "Dock 4", Priority::High));
        let frame = serde_json::json!({"event": "urgentAlert", "payload": event}).to_string();
        router.dispatch_frame(&frame);

        assert_eq!(seen.lock().as_slice(), ["Spill"]);
    }

    #[test]
    fn unknown_event_type_is_ignored() {
        let router = EventRouter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        router.subscribe(EventKind::NewReport, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        router.dispatch_frame(r#"{"event":"legacyPing","payload":{"type":"PING"}}"#);
        router.dispatch_frame("garbage");
        router.dispatch_frame(r#"{"event":"newReport"}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_drops_subscribers() {
        let router = EventRouter::new();
        router.subscribe(EventKind::DashboardUpdate, |_| {});
        assert_eq!(router.subscriber_count(EventKind::DashboardUpdate), 1);

        router.clear();
        assert_eq!(router.subscriber_count(EventKind::DashboardUpdate), 0);
    }
}
