use std::sync::Arc;

use tracing::{debug, warn};

use {
    nudge_channels::MessageStore,
    nudge_common::types::{MessageEvent, MessageRecord},
};

/// Links inbound events to records the bot already knows.
///
/// Every failure mode resolves to `None`: a missing record, a record from a
/// different room, or a store error (logged).
pub struct ReplyResolver {
    store: Arc<dyn MessageStore>,
}

impl ReplyResolver {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// The stored message `msg` replies to, if any.
    pub async fn resolve(&self, msg: &MessageEvent) -> Option<MessageRecord> {
        let reply_to = msg.reply_to_id.as_deref()?;
        self.lookup(&msg.room, reply_to).await
    }

    /// The stored record with `external_id` in `room`.
    pub async fn lookup(&self, room: &str, external_id: &str) -> Option<MessageRecord> {
        match self.store.get_by_external_id(external_id).await {
            Ok(Some(record)) if record.room == room => Some(record),
            Ok(Some(_)) => {
                debug!(room, event_id = external_id, "referenced event belongs to another room");
                None
            },
            Ok(None) => None,
            Err(e) => {
                warn!(room, event_id = external_id, error = %e, "reference lookup failed");
                None
            },
        }
    }
}
