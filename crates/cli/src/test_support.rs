#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {async_trait::async_trait, chrono::Utc};

use {
    nudge_channels::{MessageStore, TransmissionClient, TransmitError},
    nudge_common::types::{
        DeliveryReceipt, MembershipEvent, MembershipKind, MessageEvent, MessageKind,
        MessageRecord, OutgoingContent,
    },
    nudge_delivery::{DeliveryEngine, DeliveryPolicies, RateLimiter},
    nudge_dispatch::ActionContext,
    nudge_store::{SqliteMessageStore, SqliteRoomDirectory},
};

pub const BOT: &str = "@nudge:hs";
pub const ROOM: &str = "!room:hs";
pub const ALICE: &str = "@alice:hs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        room: String,
        body: String,
        reply_to: Option<String>,
    },
    Reaction {
        target: String,
        key: String,
    },
    Redaction(String),
    Join(String),
    Leave(String),
}

#[derive(Default)]
pub struct RecordingClient {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingClient {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, sent: Sent) -> DeliveryReceipt {
        let mut log = self.sent.lock().unwrap();
        log.push(sent);
        DeliveryReceipt {
            external_id: format!("$out{}", log.len()),
            server_timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl TransmissionClient for RecordingClient {
    async fn send_message(
        &self,
        room: &str,
        _txn_id: &str,
        content: &OutgoingContent,
        reply_to: Option<&str>,
    ) -> Result<DeliveryReceipt, TransmitError> {
        Ok(self.push(Sent::Message {
            room: room.into(),
            body: content.body.clone(),
            reply_to: reply_to.map(str::to_string),
        }))
    }

    async fn send_reaction(
        &self,
        _room: &str,
        _txn_id: &str,
        target_event_id: &str,
        key: &str,
    ) -> Result<DeliveryReceipt, TransmitError> {
        Ok(self.push(Sent::Reaction {
            target: target_event_id.into(),
            key: key.into(),
        }))
    }

    async fn redact(
        &self,
        _room: &str,
        _txn_id: &str,
        event_id: &str,
        _reason: Option<&str>,
    ) -> Result<(), TransmitError> {
        self.push(Sent::Redaction(event_id.into()));
        Ok(())
    }

    async fn join_room(&self, room: &str) -> Result<(), TransmitError> {
        self.push(Sent::Join(room.into()));
        Ok(())
    }

    async fn leave_room(&self, room: &str) -> Result<(), TransmitError> {
        self.push(Sent::Leave(room.into()));
        Ok(())
    }
}

/// Real SQLite stores behind a recording client.
pub struct Harness {
    pub client: Arc<RecordingClient>,
    pub store: Arc<SqliteMessageStore>,
    pub rooms: Arc<SqliteRoomDirectory>,
    pub ctx: ActionContext,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = nudge_store::connect("sqlite::memory:").await.unwrap();
        let client = Arc::new(RecordingClient::default());
        let store = Arc::new(SqliteMessageStore::new(pool.clone()));
        let rooms = Arc::new(SqliteRoomDirectory::new(pool));
        let engine = DeliveryEngine::new(
            Arc::clone(&client) as Arc<dyn TransmissionClient>,
            Arc::clone(&store) as Arc<dyn MessageStore>,
            RateLimiter::default(),
            DeliveryPolicies::default(),
            BOT,
        );
        let ctx = ActionContext::new(engine, Arc::clone(&store) as Arc<dyn MessageStore>, BOT);
        Self {
            client,
            store,
            rooms,
            ctx,
        }
    }

    /// Wait for background deliveries to reach the client.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<Sent> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let sent = self.client.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("background delivery")
    }

    /// Store a message the bot sent earlier.
    pub async fn bot_message(&self, external_id: &str) -> MessageRecord {
        let record = MessageRecord {
            external_id: external_id.into(),
            room: ROOM.into(),
            sender: Some(BOT.into()),
            body: "Reminder set".into(),
            body_formatted: String::new(),
            sent_at: Utc::now(),
            incoming: false,
            kind: MessageKind::Notice,
            related_event_id: None,
            reply_to_id: None,
        };
        self.store.create(record).await.unwrap()
    }
}

pub fn message(external_id: &str, body: &str) -> MessageEvent {
    MessageEvent {
        external_id: external_id.into(),
        room: ROOM.into(),
        sender: ALICE.into(),
        body: body.into(),
        body_formatted: String::new(),
        timestamp: Utc::now(),
        reply_to_id: None,
        notice: false,
    }
}

pub fn membership(kind: MembershipKind, sender: &str, state_key: &str) -> MembershipEvent {
    MembershipEvent {
        external_id: None,
        room: ROOM.into(),
        sender: sender.into(),
        state_key: state_key.into(),
        kind,
        timestamp: Utc::now(),
    }
}
