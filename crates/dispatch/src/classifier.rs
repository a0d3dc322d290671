use std::sync::Arc;

use {
    serde_json::Value,
    tracing::{debug, warn},
};

use {
    nudge_channels::{
        Crypto, RawEvent,
        raw::{EVENT_ENCRYPTED, EVENT_MEMBER, EVENT_MESSAGE, EVENT_REACTION},
    },
    nudge_common::types::{
        InboundEvent, MembershipEvent, MembershipKind, MessageEvent, ReactionEvent,
    },
};

const HTML_FORMAT: &str = "org.matrix.custom.html";
const TEXT_MSGTYPES: &[&str] = &["m.text", "m.notice", "m.emote"];

/// Result of classifying a gated raw event.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Event(InboundEvent),
    /// Encrypted payload that could not be decrypted.
    Undecryptable,
    /// Any shape that is not a text message, an annotation or a membership change.
    Unknown,
}

/// Turns raw payloads into typed [`InboundEvent`]s, decrypting through the
/// optional [`Crypto`] collaborator.
#[derive(Default)]
pub struct EventClassifier {
    crypto: Option<Arc<dyn Crypto>>,
}

impl EventClassifier {
    pub fn new(crypto: Option<Arc<dyn Crypto>>) -> Self {
        Self { crypto }
    }

    pub async fn classify(&self, raw: &RawEvent) -> Classification {
        if !raw.is_encrypted() {
            return classify_plain(raw, &raw.event_type, &raw.content);
        }

        let Some(crypto) = self.crypto.as_ref() else {
            debug!(room = %raw.room, "encrypted event but no crypto configured");
            return Classification::Undecryptable;
        };
        match crypto.decrypt(raw).await {
            Ok(payload) if payload.event_type == EVENT_ENCRYPTED => Classification::Unknown,
            Ok(payload) => classify_plain(raw, &payload.event_type, &payload.content),
            Err(e) => {
                warn!(
                    room = %raw.room,
                    event_id = ?raw.external_id,
                    error = %e,
                    "failed to decrypt event"
                );
                Classification::Undecryptable
            },
        }
    }
}

fn classify_plain(raw: &RawEvent, event_type: &str, content: &Value) -> Classification {
    let event = match event_type {
        EVENT_MESSAGE => message(raw, content).map(InboundEvent::Message),
        EVENT_REACTION => reaction(raw, content).map(InboundEvent::Reaction),
        EVENT_MEMBER => membership(raw, content).map(InboundEvent::Membership),
        _ => None,
    };
    event.map_or(Classification::Unknown, Classification::Event)
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value.pointer(pointer).and_then(Value::as_str)
}

fn message(raw: &RawEvent, content: &Value) -> Option<MessageEvent> {
    let external_id = raw.external_id.clone()?;
    let msgtype = str_at(content, "/msgtype")?;
    if !TEXT_MSGTYPES.contains(&msgtype) {
        return None;
    }
    // Edits carry the new text in `m.new_content`; they are not new commands.
    if str_at(content, "/m.relates_to/rel_type") == Some("m.replace") {
        return None;
    }
    let body = str_at(content, "/body")?.to_string();
    let body_formatted = match str_at(content, "/format") {
        Some(HTML_FORMAT) => str_at(content, "/formatted_body")
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    let reply_to_id = str_at(content, "/m.relates_to/m.in_reply_to/event_id").map(str::to_string);

    Some(MessageEvent {
        external_id,
        room: raw.room.clone(),
        sender: raw.sender.clone(),
        body,
        body_formatted,
        timestamp: raw.timestamp,
        reply_to_id,
        notice: msgtype == "m.notice",
    })
}

fn reaction(raw: &RawEvent, content: &Value) -> Option<ReactionEvent> {
    let external_id = raw.external_id.clone()?;
    if str_at(content, "/m.relates_to/rel_type") != Some("m.annotation") {
        return None;
    }
    Some(ReactionEvent {
        external_id,
        room: raw.room.clone(),
        sender: raw.sender.clone(),
        relates_to_id: str_at(content, "/m.relates_to/event_id")?.to_string(),
        key: str_at(content, "/m.relates_to/key")?.to_string(),
        timestamp: raw.timestamp,
    })
}

fn membership(raw: &RawEvent, content: &Value) -> Option<MembershipEvent> {
    Some(MembershipEvent {
        external_id: raw.external_id.clone(),
        room: raw.room.clone(),
        sender: raw.sender.clone(),
        state_key: raw.state_key.clone()?,
        kind: MembershipKind::from_wire(str_at(content, "/membership")?),
        timestamp: raw.timestamp,
    })
}
