use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

pub const EVENT_MESSAGE: &str = "m.room.message";
pub const EVENT_ENCRYPTED: &str = "m.room.encrypted";
pub const EVENT_REACTION: &str = "m.reaction";
pub const EVENT_MEMBER: &str = "m.room.member";

/// An event exactly as the protocol source delivered it, before gating and
/// classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Absent for stripped state (e.g. invites).
    pub external_id: Option<String>,
    pub room: String,
    pub sender: String,
    pub event_type: String,
    pub state_key: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub content: serde_json::Value,
}

impl RawEvent {
    pub fn is_encrypted(&self) -> bool {
        self.event_type == EVENT_ENCRYPTED
    }

    /// Message and reaction events must come from known rooms and members;
    /// membership events are how rooms become known in the first place.
    pub fn requires_known_room(&self) -> bool {
        matches!(
            self.event_type.as_str(),
            EVENT_MESSAGE | EVENT_ENCRYPTED | EVENT_REACTION
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(event_type: &str) -> RawEvent {
        RawEvent {
            external_id: Some("$e".into()),
            room: "!room:hs".into(),
            sender: "@alice:hs".into(),
            event_type: event_type.into(),
            state_key: None,
            timestamp: Utc::now(),
            content: serde_json::json!({}),
        }
    }

    #[test]
    fn membership_does_not_require_known_room() {
        assert!(!raw(EVENT_MEMBER).requires_known_room());
        assert!(raw(EVENT_MESSAGE).requires_known_room());
        assert!(raw(EVENT_REACTION).requires_known_room());
        assert!(raw(EVENT_ENCRYPTED).requires_known_room());
    }
}
