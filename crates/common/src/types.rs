//! Data model shared by the dispatch core, the delivery engine and the
//! collaborators that persist or transmit events.

use std::{fmt, str::FromStr};

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

use crate::Error;

// ── Inbound events ──────────────────────────────────────────────────────────

/// A classified inbound protocol event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(MessageEvent),
    Reaction(ReactionEvent),
    Membership(MembershipEvent),
}

impl InboundEvent {
    pub fn room(&self) -> &str {
        match self {
            Self::Message(m) => &m.room,
            Self::Reaction(r) => &r.room,
            Self::Membership(m) => &m.room,
        }
    }

    pub fn sender(&self) -> &str {
        match self {
            Self::Message(m) => &m.sender,
            Self::Reaction(r) => &r.sender,
            Self::Membership(m) => &m.sender,
        }
    }
}

/// A text message received in a room.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageEvent {
    pub external_id: String,
    pub room: String,
    pub sender: String,
    pub body: String,
    /// HTML rendition, empty when the sender did not provide one.
    pub body_formatted: String,
    pub timestamp: DateTime<Utc>,
    pub reply_to_id: Option<String>,
    /// `true` for `m.notice` style messages.
    pub notice: bool,
}

/// An annotation (emoji reaction) on an earlier event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionEvent {
    pub external_id: String,
    pub room: String,
    pub sender: String,
    pub relates_to_id: String,
    pub key: String,
    pub timestamp: DateTime<Utc>,
}

/// A membership change of `state_key` in `room`, performed by `sender`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipEvent {
    /// Stripped invite state carries no event id.
    pub external_id: Option<String>,
    pub room: String,
    pub sender: String,
    pub state_key: String,
    pub kind: MembershipKind,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipKind {
    Invite,
    Join,
    Leave,
    Ban,
    Other(String),
}

impl MembershipKind {
    /// Maps the `membership` content field onto a kind. Never fails: unknown
    /// values are kept verbatim in [`MembershipKind::Other`].
    pub fn from_wire(value: &str) -> Self {
        match value {
            "invite" => Self::Invite,
            "join" => Self::Join,
            "leave" => Self::Leave,
            "ban" => Self::Ban,
            other => Self::Other(other.to_string()),
        }
    }
}

// ── Persisted records ───────────────────────────────────────────────────────

/// What a stored message record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    Notice,
    Reaction,
    Redaction,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Notice => "notice",
            Self::Reaction => "reaction",
            Self::Redaction => "redaction",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "notice" => Ok(Self::Notice),
            "reaction" => Ok(Self::Reaction),
            "redaction" => Ok(Self::Redaction),
            other => Err(Error::unrecognised("message kind", other)),
        }
    }
}

/// A message known to the bot, inbound or outbound.
///
/// `external_id` is globally unique; a stored record with a given id means
/// the event has already been handled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub external_id: String,
    pub room: String,
    pub sender: Option<String>,
    pub body: String,
    pub body_formatted: String,
    pub sent_at: DateTime<Utc>,
    pub incoming: bool,
    pub kind: MessageKind,
    pub related_event_id: Option<String>,
    pub reply_to_id: Option<String>,
}

impl MessageRecord {
    /// Record for an inbound message as it arrived.
    pub fn from_inbound_message(msg: &MessageEvent) -> Self {
        Self {
            external_id: msg.external_id.clone(),
            room: msg.room.clone(),
            sender: Some(msg.sender.clone()),
            body: msg.body.clone(),
            body_formatted: msg.body_formatted.clone(),
            sent_at: msg.timestamp,
            incoming: true,
            kind: if msg.notice {
                MessageKind::Notice
            } else {
                MessageKind::Message
            },
            related_event_id: None,
            reply_to_id: msg.reply_to_id.clone(),
        }
    }

    /// Record for an inbound reaction; the reaction key is kept as the body.
    pub fn from_inbound_reaction(reaction: &ReactionEvent) -> Self {
        Self {
            external_id: reaction.external_id.clone(),
            room: reaction.room.clone(),
            sender: Some(reaction.sender.clone()),
            body: reaction.key.clone(),
            body_formatted: String::new(),
            sent_at: reaction.timestamp,
            incoming: true,
            kind: MessageKind::Reaction,
            related_event_id: Some(reaction.relates_to_id.clone()),
            reply_to_id: None,
        }
    }
}

/// Known room, as tracked by the room directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub external_id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ── Outbound ────────────────────────────────────────────────────────────────

/// Content of an outgoing text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingContent {
    pub body: String,
    /// Optional HTML rendition of `body`.
    pub formatted_body: Option<String>,
    pub notice: bool,
}

impl OutgoingContent {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            formatted_body: None,
            notice: false,
        }
    }

    pub fn notice(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            formatted_body: None,
            notice: true,
        }
    }

    #[must_use]
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.formatted_body = Some(html.into());
        self
    }

    pub fn kind(&self) -> MessageKind {
        if self.notice {
            MessageKind::Notice
        } else {
            MessageKind::Message
        }
    }
}

/// What the server returned for a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub external_id: String,
    pub server_timestamp: DateTime<Utc>,
}
