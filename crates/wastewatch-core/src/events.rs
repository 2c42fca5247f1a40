use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::{Priority, Report, StatsDelta};

/// What a stats push describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsAction {
    ReportCreated,
    ReportUpdated,
    ReportResolved,
}

/// Events fanned out from the hub to connected clients.
///
/// A closed sum type: each kind carries its own payload and a server
/// timestamp set at emission. Events are never mutated after emission.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HubEvent {
    #[serde(rename = "NEW_REPORT")]
    NewReport {
        #[serde(rename = "data")]
        report: Report,
        message: String,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "URGENT_REPORT")]
    UrgentAlert {
        #[serde(rename = "data")]
        report: Report,
        message: String,
        priority: Priority,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "STATS_UPDATE")]
    DashboardUpdate {
        action: StatsAction,
        data: StatsDelta,
        timestamp: DateTime<Utc>,
    },
}

impl HubEvent {
    pub fn new_report(report: Report) -> Self {
        let message = format!("New report submitted: {}", report.title);
        Self::NewReport {
            report,
            message,
            timestamp: Utc::now(),
        }
    }

    pub fn urgent_alert(report: Report) -> Self {
        let message = format!("Urgent report: {} at {}", report.title, report.location);
        let priority = report.priority;
        Self::UrgentAlert {
            report,
            message,
            priority,
            timestamp: Utc::now(),
        }
    }

    pub fn dashboard_update(action: StatsAction, data: StatsDelta) -> Self {
        Self::DashboardUpdate {
            action,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::NewReport { .. } => "NEW_REPORT",
            Self::UrgentAlert { .. } => "URGENT_REPORT",
            Self::DashboardUpdate { .. } => "STATS_UPDATE",
        }
    }

    /// Logical channel name on the wire envelope.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::NewReport { .. } => "newReport",
            Self::UrgentAlert { .. } => "urgentAlert",
            Self::DashboardUpdate { .. } => "dashboardUpdate",
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::NewReport { report, .. } | Self::UrgentAlert { report, .. } => Some(report),
            Self::DashboardUpdate { .. } => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::NewReport { timestamp, .. }
            | Self::UrgentAlert { timestamp, .. }
            | Self::DashboardUpdate { timestamp, .. } => *timestamp,
        }
    }
}
