pub mod events;
pub mod ids;
pub mod report;
pub mod rooms;

pub use events::{HubEvent, StatsAction};
pub use ids::{ConnectionId, ReportId, UserId};
pub use report::{Priority, Report, StatsDelta};
pub use rooms::{Audience, Room};
