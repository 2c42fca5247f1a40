use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use wastewatch_core::{HubEvent, Report, StatsAction, StatsDelta};

use crate::router::{EventKind, EventRouter};

/// An in-app notification entry, kept alongside OS-level notifications.
#[derive(Clone, Debug)]
pub struct InAppNotification {
    pub kind: EventKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// In-memory client state fed by the event router.
///
/// Reports and notifications are insertion-ordered and append-only here;
/// pruning for display is the UI's business.
#[derive(Default)]
pub struct ClientState {
    reports: Mutex<Vec<Report>>,
    notifications: Mutex<Vec<InAppNotification>>,
    stats: Mutex<Option<(StatsAction, StatsDelta)>>,
}

impl ClientState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Subscribe this store to a router. Every qualifying event appends;
    /// nothing is ever removed.
    pub fn attach(self: &Arc<Self>, router: &EventRouter) {
        let store = Arc::clone(self);
        router.subscribe(EventKind::NewReport, move |event| {
            if let HubEvent::NewReport {
                report,
                message,
                timestamp,
            } = event
            {
                store.reports.lock().push(report.clone());
                store.notifications.lock().push(InAppNotification {
                    kind: EventKind::NewReport,
                    message: message.clone(),
                    timestamp: *timestamp,
                });
            }
        });

        let store = Arc::clone(self);
        router.subscribe(EventKind::UrgentAlert, move |event| {
            if let HubEvent::UrgentAlert {
                message, timestamp, ..
            } = event
            {
                store.notifications.lock().push(InAppNotification {
                    kind: EventKind::UrgentAlert,
                    message: message.clone(),
                    timestamp: *timestamp,
                });
            }
        });

        let store = Arc::clone(self);
        router.subscribe(EventKind::DashboardUpdate, move |event| {
            if let HubEvent::DashboardUpdate { action, data, .. } = event {
                *store.stats.lock() = Some((*action, *data));
            }
        });
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().clone()
    }

    pub fn notifications(&self) -> Vec<InAppNotification> {
        self.notifications.lock().clone()
    }

    pub fn stats(&self) -> Option<(StatsAction, StatsDelta)> {
        *self.stats.lock()
    }
}
