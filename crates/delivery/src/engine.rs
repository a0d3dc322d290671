use std::{future::Future, sync::Arc};

use tracing::{debug, info, warn};

use {
    nudge_channels::{MessageStore, TransmissionClient, TransmitError},
    nudge_common::types::{DeliveryReceipt, MessageKind, MessageRecord, OutgoingContent},
};

use crate::{
    classify::{Outcome, classify},
    error::{DeliveryError, Result},
    policy::{DeliveryPolicies, RetryPolicy},
    rate_limit::RateLimiter,
};

/// One outbound text message. Built per call and consumed by the send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub room: String,
    pub content: OutgoingContent,
    /// Event the message replies to.
    pub reply_to: Option<String>,
    pub policy: RetryPolicy,
}

impl DeliveryRequest {
    pub fn new(room: impl Into<String>, content: OutgoingContent, policy: RetryPolicy) -> Self {
        Self {
            room: room.into(),
            content,
            reply_to: None,
            policy,
        }
    }

    #[must_use]
    pub fn in_reply_to(mut self, event_id: impl Into<String>) -> Self {
        self.reply_to = Some(event_id.into());
        self
    }
}

/// Sends messages, reactions and redactions through a [`TransmissionClient`]
/// with bounded retry, honouring the shared [`RateLimiter`].
///
/// Cheap to clone; clones share the client, the store and the limiter.
#[derive(Clone)]
pub struct DeliveryEngine {
    client: Arc<dyn TransmissionClient>,
    store: Arc<dyn MessageStore>,
    limiter: RateLimiter,
    policies: DeliveryPolicies,
    bot_user: String,
}

impl DeliveryEngine {
    pub fn new(
        client: Arc<dyn TransmissionClient>,
        store: Arc<dyn MessageStore>,
        limiter: RateLimiter,
        policies: DeliveryPolicies,
        bot_user: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            limiter,
            policies,
            bot_user: bot_user.into(),
        }
    }

    pub fn policies(&self) -> DeliveryPolicies {
        self.policies
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Send and wait for the receipt. Persisting the sent record is up to
    /// the caller (see [`Self::persist_sent`]).
    pub async fn send(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        let txn_id = new_txn_id();
        self.run_with_retry(&request.room, "send message", request.policy, || {
            self.client.send_message(
                &request.room,
                &txn_id,
                &request.content,
                request.reply_to.as_deref(),
            )
        })
        .await
    }

    /// Fire-and-forget send. The spawned task persists the record on success
    /// and only logs on failure; nothing is returned to the caller and the
    /// task is never joined, so a shutdown may drop it mid-flight.
    pub fn send_async(&self, request: DeliveryRequest, related_event_id: Option<String>) {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.send(&request).await {
                Ok(receipt) => {
                    engine
                        .persist_sent(&receipt, &request, related_event_id)
                        .await;
                },
                Err(e) => {
                    warn!(room = %request.room, error = %e, "background send abandoned");
                },
            }
        });
    }

    /// Annotate `target` with `key` and wait for the receipt.
    pub async fn react(
        &self,
        room: &str,
        target: &str,
        key: &str,
        policy: RetryPolicy,
    ) -> Result<DeliveryReceipt> {
        let txn_id = new_txn_id();
        self.run_with_retry(room, "send reaction", policy, || {
            self.client.send_reaction(room, &txn_id, target, key)
        })
        .await
    }

    /// Fire-and-forget reaction, recorded on success.
    pub fn react_async(&self, room: String, target: String, key: String) {
        let engine = self.clone();
        let policy = self.policies.background;
        tokio::spawn(async move {
            match engine.react(&room, &target, &key, policy).await {
                Ok(receipt) => {
                    let record = MessageRecord {
                        external_id: receipt.external_id,
                        room: room.clone(),
                        sender: Some(engine.bot_user.clone()),
                        body: key,
                        body_formatted: String::new(),
                        sent_at: receipt.server_timestamp,
                        incoming: false,
                        kind: MessageKind::Reaction,
                        related_event_id: Some(target),
                        reply_to_id: None,
                    };
                    engine.persist(record).await;
                },
                Err(e) => {
                    warn!(room = %room, target = %target, error = %e, "background reaction abandoned");
                },
            }
        });
    }

    pub async fn redact(
        &self,
        room: &str,
        event_id: &str,
        reason: Option<&str>,
        policy: RetryPolicy,
    ) -> Result<()> {
        let txn_id = new_txn_id();
        self.run_with_retry(room, "redact", policy, || {
            self.client.redact(room, &txn_id, event_id, reason)
        })
        .await
    }

    pub async fn join(&self, room: &str, policy: RetryPolicy) -> Result<()> {
        self.run_with_retry(room, "join room", policy, || self.client.join_room(room))
            .await
    }

    pub async fn leave(&self, room: &str, policy: RetryPolicy) -> Result<()> {
        self.run_with_retry(room, "leave room", policy, || self.client.leave_room(room))
            .await
    }

    /// Store the outgoing record for a delivered message.
    ///
    /// A failure here is logged and swallowed: the message is already
    /// visible to users and is neither retracted nor resent.
    pub async fn persist_sent(
        &self,
        receipt: &DeliveryReceipt,
        request: &DeliveryRequest,
        related_event_id: Option<String>,
    ) {
        let record = MessageRecord {
            external_id: receipt.external_id.clone(),
            room: request.room.clone(),
            sender: Some(self.bot_user.clone()),
            body: request.content.body.clone(),
            body_formatted: request.content.formatted_body.clone().unwrap_or_default(),
            sent_at: receipt.server_timestamp,
            incoming: false,
            kind: request.content.kind(),
            related_event_id,
            reply_to_id: request.reply_to.clone(),
        };
        self.persist(record).await;
    }

    async fn persist(&self, record: MessageRecord) {
        let external_id = record.external_id.clone();
        let room = record.room.clone();
        match self.store.create(record).await {
            Ok(_) => debug!(room = %room, event_id = %external_id, "sent record persisted"),
            Err(e) => warn!(
                room = %room,
                event_id = %external_id,
                error = %e,
                "message delivered but its record could not be persisted"
            ),
        }
    }

    async fn run_with_retry<T, F, Fut>(
        &self,
        room: &str,
        operation: &'static str,
        policy: RetryPolicy,
        mut request: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, TransmitError>>,
    {
        let attempts = policy.attempts();
        let mut remaining = attempts;
        let mut attempt = 0u32;

        loop {
            self.limiter.wait_until_clear().await;
            attempt += 1;

            let err = match request().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(room, operation, attempt, "delivered after retry");
                    }
                    return Ok(value);
                },
                Err(err) => err,
            };

            match classify(&err) {
                Outcome::RateLimited => {
                    self.limiter.block();
                    warn!(
                        room,
                        operation,
                        attempt,
                        outcome = "rate-limited",
                        cooldown_secs = self.limiter.cooldown().as_secs(),
                        error = %err,
                        "rate limited, pausing all senders"
                    );
                },
                Outcome::Terminal => {
                    warn!(
                        room,
                        operation,
                        attempt,
                        outcome = "terminal-error",
                        error = %err,
                        "delivery failed permanently"
                    );
                    return Err(DeliveryError::Terminal {
                        operation,
                        source: err,
                    });
                },
                Outcome::Transient => {
                    remaining -= 1;
                    if remaining == 0 {
                        warn!(
                            room,
                            operation,
                            attempts,
                            outcome = "retries-exceeded",
                            error = %err,
                            "delivery retries exhausted"
                        );
                        return Err(DeliveryError::RetriesExceeded {
                            operation,
                            attempts,
                            last: err,
                        });
                    }
                    let backoff = policy.backoff(remaining);
                    debug!(
                        room,
                        operation,
                        attempt,
                        remaining,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "transient delivery failure, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                },
            }
        }
    }
}

/// Transaction id shared by every attempt of one logical send.
fn new_txn_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
