use {async_trait::async_trait, tracing::debug};

use crate::raw::{EVENT_ENCRYPTED, EVENT_MEMBER, EVENT_MESSAGE, EVENT_REACTION, RawEvent};

/// Ordered callbacks a protocol source delivers events through.
///
/// The source awaits each callback before delivering the next event, so
/// implementations see events one at a time in arrival order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_message(&self, raw: RawEvent);
    async fn on_reaction(&self, raw: RawEvent);
    async fn on_membership(&self, raw: RawEvent);
}

/// Route a raw event to the matching callback. Returns `false` for event
/// types the core does not handle.
///
/// Encrypted envelopes go through `on_message`; the real type is only known
/// after decryption.
pub async fn route_event(handler: &dyn EventHandler, raw: RawEvent) -> bool {
    let event_type = raw.event_type.clone();
    match event_type.as_str() {
        EVENT_MESSAGE | EVENT_ENCRYPTED => handler.on_message(raw).await,
        EVENT_REACTION => handler.on_reaction(raw).await,
        EVENT_MEMBER => handler.on_membership(raw).await,
        other => {
            debug!(room = %raw.room, event_type = other, "ignoring unhandled event type");
            return false;
        },
    }
    true
}
