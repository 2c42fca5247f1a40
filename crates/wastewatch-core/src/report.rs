use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ReportId, UserId};

/// Severity assigned to a report at submission time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// High and critical reports trigger the admin-only urgent alert.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A waste-management report as seen by the broadcast pipeline.
///
/// Persistence and validation happen upstream in the CRUD handlers; by the
/// time a report reaches the hub it is an immutable value object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(
        title: impl Into<String>,
        location: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: ReportId::new(),
            title: title.into(),
            description: String::new(),
            location: location.into(),
            priority,
            reporter_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reporter(mut self, reporter_id: UserId) -> Self {
        self.reporter_id = Some(reporter_id);
        self
    }
}

/// Coarse counters pushed to dashboards. A snapshot, not an event log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsDelta {
    pub total_reports: u64,
    pub pending: u64,
    pub resolved: u64,
}
