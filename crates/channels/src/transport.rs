use std::time::Duration;

use {
    async_trait::async_trait,
    nudge_common::types::{DeliveryReceipt, OutgoingContent},
};

use crate::{Result, raw::RawEvent};

/// Failure reported by a [`TransmissionClient`].
///
/// The client only reports what happened on the wire; deciding whether a
/// failure is retryable is left to the delivery engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransmitError {
    /// The server answered with a non-success status.
    #[error(
        "server rejected request ({status} {}): {message}",
        .errcode.as_deref().unwrap_or("-")
    )]
    Server {
        status: u16,
        /// Protocol error code, e.g. `M_LIMIT_EXCEEDED`.
        errcode: Option<String>,
        message: String,
        /// Server-suggested wait before retrying, if any.
        retry_after: Option<Duration>,
    },

    /// No response was received (connect failure, timeout, reset).
    #[error("transport failure: {message}")]
    Transport { message: String, timed_out: bool },

    /// The request could not be built or its response could not be read.
    #[error("malformed payload: {message}")]
    Malformed { message: String },
}

impl TransmitError {
    pub fn server(status: u16, errcode: Option<&str>, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            errcode: errcode.map(str::to_string),
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    pub fn errcode(&self) -> Option<&str> {
        match self {
            Self::Server { errcode, .. } => errcode.as_deref(),
            _ => None,
        }
    }
}

/// Outbound protocol operations.
///
/// `txn_id` identifies one logical event: every attempt to deliver the same
/// event passes the same id, so the server can drop a repeat of an attempt
/// that already landed.
#[async_trait]
pub trait TransmissionClient: Send + Sync {
    /// Send a text message, optionally as a reply to `reply_to`.
    async fn send_message(
        &self,
        room: &str,
        txn_id: &str,
        content: &OutgoingContent,
        reply_to: Option<&str>,
    ) -> std::result::Result<DeliveryReceipt, TransmitError>;

    /// Annotate `target_event_id` with `key`.
    async fn send_reaction(
        &self,
        room: &str,
        txn_id: &str,
        target_event_id: &str,
        key: &str,
    ) -> std::result::Result<DeliveryReceipt, TransmitError>;

    async fn redact(
        &self,
        room: &str,
        txn_id: &str,
        event_id: &str,
        reason: Option<&str>,
    ) -> std::result::Result<(), TransmitError>;

    async fn join_room(&self, room: &str) -> std::result::Result<(), TransmitError>;

    async fn leave_room(&self, room: &str) -> std::result::Result<(), TransmitError>;
}

/// Typed content recovered from an encrypted envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedPayload {
    pub event_type: String,
    pub content: serde_json::Value,
}

/// End-to-end decryption. Key management lives entirely behind this trait.
#[async_trait]
pub trait Crypto: Send + Sync {
    async fn decrypt(&self, raw: &RawEvent) -> Result<DecryptedPayload>;
}
