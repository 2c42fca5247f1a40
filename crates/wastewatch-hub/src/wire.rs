use serde::{Deserialize, Serialize};
use wastewatch_core::HubEvent;

/// Inbound frames a client may send after connecting.
///
/// Anything that fails to parse is dropped by the reader with a warn log;
/// clients never receive a protocol error for a bad frame.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ClientCommand {
    JoinAdmin,
    #[serde(rename_all = "camelCase")]
    JoinUser { user_id: String },
}

impl ClientCommand {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Outbound envelope: `{ "event": <channel>, "payload": <HubEvent> }`.
#[derive(Debug, Serialize)]
pub struct ServerFrame<'a> {
    pub event: &'static str,
    pub payload: &'a HubEvent,
}

/// Serialize an event into its wire envelope.
pub fn encode_event(event: &HubEvent) -> Option<String> {
    let frame = ServerFrame {
        event: event.channel(),
        payload: event,
    };
    match serde_json::to_string(&frame) {
        Ok(json) => Some(json),
        Err(err) => {
            tracing::error!(error = %err, event_type = event.event_type(), "Failed to encode event");
            None
        }
    }
}
