//! In-memory collaborators shared by the dispatch tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    chrono::Utc,
    serde_json::{Value, json},
};

use {
    nudge_channels::{
        Crypto, DecryptedPayload, Error, MessageFilter, MessageStore, RawEvent, Result,
        RoomDirectory, TransmissionClient, TransmitError,
        raw::{EVENT_MEMBER, EVENT_MESSAGE, EVENT_REACTION},
    },
    nudge_common::types::{
        DeliveryReceipt, MembershipEvent, MessageEvent, MessageKind, MessageRecord,
        OutgoingContent, ReactionEvent, Room,
    },
    nudge_delivery::{DeliveryEngine, DeliveryPolicies, RateLimiter},
};

use crate::{
    actions::{MembershipHandler, MessageAction, ReactionAction},
    context::ActionContext,
};

pub const BOT: &str = "@nudge:hs";
pub const ROOM: &str = "!room:hs";
pub const ALICE: &str = "@alice:hs";

// ── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<MessageRecord>>,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, record: MessageRecord) {
        self.records.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<MessageRecord> {
        self.records.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(Error::unavailable("store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, record: MessageRecord) -> Result<MessageRecord> {
        self.check()?;
        let mut records = self.records.lock().unwrap();
        if records.iter().any(|r| r.external_id == record.external_id) {
            return Err(Error::duplicate(record.external_id));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<MessageRecord>> {
        self.check()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.external_id == external_id)
            .cloned())
    }

    async fn list(&self, filter: &MessageFilter) -> Result<Vec<MessageRecord>> {
        self.check()?;
        let records = self.records.lock().unwrap();
        let matching = records
            .iter()
            .rev()
            .filter(|r| filter.room.as_ref().is_none_or(|room| &r.room == room))
            .filter(|r| filter.incoming.is_none_or(|incoming| r.incoming == incoming))
            .filter(|r| filter.kind.is_none_or(|kind| r.kind == kind))
            .filter(|r| {
                filter
                    .related_event_id
                    .as_ref()
                    .is_none_or(|id| r.related_event_id.as_ref() == Some(id))
            })
            .take(filter.limit.map_or(usize::MAX, |l| l as usize))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn delete_all_for_room(&self, room: &str) -> Result<()> {
        self.check()?;
        self.records.lock().unwrap().retain(|r| r.room != room);
        Ok(())
    }
}

// ── Room directory ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryRooms {
    rooms: HashSet<String>,
    members: HashSet<(String, String)>,
    fail: bool,
}

impl MemoryRooms {
    pub fn with_member(room: &str, user: &str) -> Arc<Self> {
        Arc::new(Self {
            rooms: HashSet::from([room.to_string()]),
            members: HashSet::from([(room.to_string(), user.to_string())]),
            fail: false,
        })
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl RoomDirectory for MemoryRooms {
    async fn get_room_by_external_id(&self, external_id: &str) -> Result<Option<Room>> {
        if self.fail {
            return Err(Error::unavailable("directory offline"));
        }
        Ok(self.rooms.contains(external_id).then(|| Room {
            external_id: external_id.to_string(),
            name: None,
            created_at: Utc::now(),
        }))
    }

    async fn is_member_known(&self, room: &str, user: &str) -> Result<bool> {
        if self.fail {
            return Err(Error::unavailable("directory offline"));
        }
        Ok(self
            .members
            .contains(&(room.to_string(), user.to_string())))
    }
}

// ── Transmission ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message {
        room: String,
        body: String,
        reply_to: Option<String>,
    },
    Reaction {
        room: String,
        target: String,
        key: String,
    },
    Redaction {
        room: String,
        event_id: String,
    },
    Join(String),
    Leave(String),
}

/// Transmission client that always succeeds and remembers every call.
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
    ) -> std::result::Result<DeliveryReceipt, TransmitError> {
        Ok(self.push(Sent::Message {
            room: room.into(),
            body: content.body.clone(),
            reply_to: reply_to.map(str::to_string),
        }))
    }

    async fn send_reaction(
        &self,
        room: &str,
        _txn_id: &str,
        target_event_id: &str,
        key: &str,
    ) -> std::result::Result<DeliveryReceipt, TransmitError> {
        Ok(self.push(Sent::Reaction {
            room: room.into(),
            target: target_event_id.into(),
            key: key.into(),
        }))
    }

    async fn redact(
        &self,
        room: &str,
        _txn_id: &str,
        event_id: &str,
        _reason: Option<&str>,
    ) -> std::result::Result<(), TransmitError> {
        self.push(Sent::Redaction {
            room: room.into(),
            event_id: event_id.into(),
        });
        Ok(())
    }

    async fn join_room(&self, room: &str) -> std::result::Result<(), TransmitError> {
        self.push(Sent::Join(room.into()));
        Ok(())
    }

    async fn leave_room(&self, room: &str) -> std::result::Result<(), TransmitError> {
        self.push(Sent::Leave(room.into()));
        Ok(())
    }
}

/// "Decrypts" `plain:<text>` ciphertexts into a text message.
pub struct FakeCrypto;

#[async_trait]
impl Crypto for FakeCrypto {
    async fn decrypt(&self, raw: &RawEvent) -> Result<DecryptedPayload> {
        let text = raw
            .content
            .get("ciphertext")
            .and_then(Value::as_str)
            .and_then(|c| c.strip_prefix("plain:"))
            .ok_or_else(|| Error::invalid_input("unknown session"))?;
        Ok(DecryptedPayload {
            event_type: EVENT_MESSAGE.into(),
            content: json!({ "msgtype": "m.text", "body": text }),
        })
    }
}

pub fn context(client: Arc<RecordingClient>, store: Arc<MemoryStore>) -> ActionContext {
    let engine = DeliveryEngine::new(
        client,
        Arc::clone(&store) as Arc<dyn MessageStore>,
        RateLimiter::default(),
        DeliveryPolicies::default(),
        BOT,
    );
    ActionContext::new(engine, store, BOT)
}

// ── Actions ─────────────────────────────────────────────────────────────────

/// One recorded action invocation: action name, triggering event id and the
/// external id of the resolved reply or reaction target.
pub type Invocation = (String, String, Option<String>);

#[derive(Clone, Default)]
pub struct Invocations(Arc<Mutex<Vec<Invocation>>>);

impl Invocations {
    pub fn all(&self) -> Vec<Invocation> {
        self.0.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|(name, ..)| name).collect()
    }

    pub fn action(&self, name: &str) -> Arc<RecordingAction> {
        Arc::new(RecordingAction {
            name: name.to_string(),
            log: self.clone(),
            fail: false,
        })
    }

    pub fn failing_action(&self, name: &str) -> Arc<RecordingAction> {
        Arc::new(RecordingAction {
            name: name.to_string(),
            log: self.clone(),
            fail: true,
        })
    }

    fn push(&self, name: &str, event_id: &str, related: Option<&MessageRecord>) {
        self.0.lock().unwrap().push((
            name.to_string(),
            event_id.to_string(),
            related.map(|r| r.external_id.clone()),
        ));
    }
}

pub struct RecordingAction {
    name: String,
    log: Invocations,
    fail: bool,
}

impl RecordingAction {
    fn result(&self) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("{} blew up", self.name);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageAction for RecordingAction {
    async fn handle(
        &self,
        _ctx: &ActionContext,
        msg: &MessageEvent,
        reply_to: Option<&MessageRecord>,
    ) -> anyhow::Result<()> {
        self.log.push(&self.name, &msg.external_id, reply_to);
        self.result()
    }
}

#[async_trait]
impl ReactionAction for RecordingAction {
    async fn handle(
        &self,
        _ctx: &ActionContext,
        reaction: &ReactionEvent,
        target: &MessageRecord,
    ) -> anyhow::Result<()> {
        self.log.push(&self.name, &reaction.external_id, Some(target));
        self.result()
    }
}

#[derive(Default)]
pub struct RecordingMembership {
    pub calls: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingMembership {
    fn push(&self, kind: &'static str, event: &MembershipEvent) {
        self.calls
            .lock()
            .unwrap()
            .push((kind, event.state_key.clone()));
    }
}

#[async_trait]
impl MembershipHandler for RecordingMembership {
    async fn on_invite(&self, _ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        self.push("invite", event);
        Ok(())
    }

    async fn on_join(&self, _ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        self.push("join", event);
        Ok(())
    }

    async fn on_leave(&self, _ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        self.push("leave", event);
        Ok(())
    }
}

// ── Raw events and records ──────────────────────────────────────────────────

pub fn raw_event(event_type: &str, external_id: Option<&str>, content: Value) -> RawEvent {
    RawEvent {
        external_id: external_id.map(str::to_string),
        room: ROOM.into(),
        sender: ALICE.into(),
        event_type: event_type.into(),
        state_key: (event_type == EVENT_MEMBER).then(|| ALICE.to_string()),
        timestamp: Utc::now(),
        content,
    }
}

pub fn raw_message(external_id: &str, body: &str) -> RawEvent {
    raw_event(
        EVENT_MESSAGE,
        Some(external_id),
        json!({ "msgtype": "m.text", "body": body }),
    )
}

pub fn raw_reply(external_id: &str, body: &str, reply_to: &str) -> RawEvent {
    raw_event(
        EVENT_MESSAGE,
        Some(external_id),
        json!({
            "msgtype": "m.text",
            "body": body,
            "m.relates_to": { "m.in_reply_to": { "event_id": reply_to } },
        }),
    )
}

pub fn raw_reaction(external_id: &str, target: &str, key: &str) -> RawEvent {
    raw_event(
        EVENT_REACTION,
        Some(external_id),
        json!({
            "m.relates_to": { "rel_type": "m.annotation", "event_id": target, "key": key },
        }),
    )
}

/// An outgoing record the bot sent earlier into [`ROOM`].
pub fn stored(external_id: &str, body: &str) -> MessageRecord {
    MessageRecord {
        external_id: external_id.into(),
        room: ROOM.into(),
        sender: Some(BOT.into()),
        body: body.into(),
        body_formatted: String::new(),
        sent_at: Utc::now(),
        incoming: false,
        kind: MessageKind::Message,
        related_event_id: None,
        reply_to_id: None,
    }
}
