use {
    async_trait::async_trait,
    nudge_common::types::{MessageKind, MessageRecord, Room},
};

use crate::Result;

/// Selection criteria for [`MessageStore::list`]. Unset fields match all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub room: Option<String>,
    pub incoming: Option<bool>,
    pub kind: Option<MessageKind>,
    pub related_event_id: Option<String>,
    pub limit: Option<u32>,
}

impl MessageFilter {
    pub fn room(room: impl Into<String>) -> Self {
        Self {
            room: Some(room.into()),
            ..Self::default()
        }
    }
}

/// Persistent record of every message the bot has seen or sent.
///
/// Each call is atomic on its own; no operation spans several calls.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a new record. A record with the same external id yields
    /// [`crate::Error::Duplicate`].
    async fn create(&self, record: MessageRecord) -> Result<MessageRecord>;
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<MessageRecord>>;
    /// Newest first.
    async fn list(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>>;
    async fn delete_all_for_room(&self, room: &str) -> Result<()>;
}

/// Knowledge of which rooms and members the bot tracks.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn get_room_by_external_id(&self, external_id: &str) -> Result<Option<Room>>;
    async fn is_member_known(&self, room: &str, user: &str) -> Result<bool>;
}
