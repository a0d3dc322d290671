use std::sync::Arc;

use {
    nudge_channels::MessageStore,
    nudge_common::types::{DeliveryReceipt, OutgoingContent},
    nudge_delivery::{DeliveryEngine, DeliveryRequest},
};

/// What an action gets to work with: the delivery engine, the message store
/// and the bot's own identity.
#[derive(Clone)]
pub struct ActionContext {
    engine: DeliveryEngine,
    store: Arc<dyn MessageStore>,
    bot_user: String,
}

impl ActionContext {
    pub fn new(
        engine: DeliveryEngine,
        store: Arc<dyn MessageStore>,
        bot_user: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            store,
            bot_user: bot_user.into(),
        }
    }

    pub fn engine(&self) -> &DeliveryEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    pub fn bot_user(&self) -> &str {
        &self.bot_user
    }

    /// Send with the synchronous policy, wait for the receipt and record the
    /// sent message.
    pub async fn send_text(
        &self,
        room: &str,
        content: OutgoingContent,
        reply_to: Option<&str>,
    ) -> nudge_delivery::Result<DeliveryReceipt> {
        let request = self.request(room, content, reply_to.map(str::to_string), false);
        let receipt = self.engine.send(&request).await?;
        self.engine.persist_sent(&receipt, &request, None).await;
        Ok(receipt)
    }

    /// Queue a background send. `related_event_id` links the stored record to
    /// the business object it belongs to.
    pub fn send_text_async(
        &self,
        room: &str,
        content: OutgoingContent,
        reply_to: Option<String>,
        related_event_id: Option<String>,
    ) {
        let request = self.request(room, content, reply_to, true);
        self.engine.send_async(request, related_event_id);
    }

    pub fn react_async(&self, room: &str, target: &str, key: &str) {
        self.engine
            .react_async(room.to_string(), target.to_string(), key.to_string());
    }

    /// Redact with the synchronous policy.
    pub async fn redact(
        &self,
        room: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> nudge_delivery::Result<()> {
        self.engine
            .redact(room, event_id, reason, self.engine.policies().sync)
            .await
    }

    fn request(
        &self,
        room: &str,
        content: OutgoingContent,
        reply_to: Option<String>,
        background: bool,
    ) -> DeliveryRequest {
        let policies = self.engine.policies();
        let policy = if background {
            policies.background
        } else {
            policies.sync
        };
        DeliveryRequest {
            room: room.to_string(),
            content,
            reply_to,
            policy,
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{MemoryStore, RecordingClient, Sent, context},
        nudge_common::types::MessageKind,
        std::time::Duration,
    };

    #[tokio::test(start_paused = true)]
    async fn send_text_persists_outgoing_record() {
        let client = Arc::new(RecordingClient::default());
        let store = Arc::new(MemoryStore::default());
        let ctx = context(Arc::clone(&client), Arc::clone(&store));

        let receipt = ctx
            .send_text("!room:hs", OutgoingContent::notice("pong"), Some("$ping"))
            .await
            .unwrap();

        assert_eq!(
            client.sent(),
            vec![Sent::Message {
                room: "!room:hs".into(),
                body: "pong".into(),
                reply_to: Some("$ping".into()),
            }]
        );
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].external_id, receipt.external_id);
        assert_eq!(records[0].kind, MessageKind::Notice);
        assert_eq!(records[0].reply_to_id.as_deref(), Some("$ping"));
    }

    #[tokio::test(start_paused = true)]
    async fn background_helpers_record_after_delivery() {
        let client = Arc::new(RecordingClient::default());
        let store = Arc::new(MemoryStore::default());
        let ctx = context(Arc::clone(&client), Arc::clone(&store));

        ctx.send_text_async(
            "!room:hs",
            OutgoingContent::text("later"),
            None,
            Some("$reminder".into()),
        );
        ctx.react_async("!room:hs", "$target", "👍");
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(client.sent().len(), 2);
        let records = store.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().any(|r| r.kind == MessageKind::Reaction));
        assert!(
            records
                .iter()
                .any(|r| r.related_event_id.as_deref() == Some("$reminder"))
        );
    }
}
