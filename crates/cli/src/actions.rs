//! Built-in actions shipped with the binary.

use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, info},
};

use {
    nudge_common::types::{MessageEvent, MessageRecord, OutgoingContent, ReactionEvent},
    nudge_dispatch::{ActionContext, ActionRegistry, MessageAction, ReactionAction},
};

/// Reaction keys that delete the bot message they are placed on.
pub const DELETE_KEYS: [&str; 3] = ["❌", "🗑️", "🗑"];

const DELETE_REASON: &str = "deleted on request";

/// Registry with the built-in actions in evaluation order.
pub fn registry(help_text: &str) -> nudge_dispatch::Result<ActionRegistry> {
    ActionRegistry::builder()
        .reply(
            "delete-reply",
            r"(?i)^\s*(delete|remove)\s*$",
            Arc::new(DeleteReplied),
        )
        .message("ping", r"^!ping$", Arc::new(Ping))
        .default_message("help", Arc::new(Help::new(help_text)))
        .reaction("delete-reaction", DELETE_KEYS, Arc::new(DeleteReacted))
        .build()
}

/// Fallback for anything no pattern claims.
pub struct Help {
    text: String,
}

impl Help {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl MessageAction for Help {
    async fn handle(
        &self,
        ctx: &ActionContext,
        msg: &MessageEvent,
        _reply_to: Option<&MessageRecord>,
    ) -> anyhow::Result<()> {
        // Notices come from other bots; answering them can loop.
        if msg.notice {
            debug!(room = %msg.room, event_id = %msg.external_id, "ignoring notice");
            return Ok(());
        }
        ctx.send_text_async(
            &msg.room,
            OutgoingContent::notice(self.text.clone()),
            Some(msg.external_id.clone()),
            None,
        );
        Ok(())
    }
}

/// Answers `!ping` and waits for the reply to go out.
pub struct Ping;

#[async_trait]
impl MessageAction for Ping {
    async fn handle(
        &self,
        ctx: &ActionContext,
        msg: &MessageEvent,
        _reply_to: Option<&MessageRecord>,
    ) -> anyhow::Result<()> {
        ctx.send_text(
            &msg.room,
            OutgoingContent::notice("pong"),
            Some(&msg.external_id),
        )
        .await?;
        Ok(())
    }
}

/// Replying `delete` to one of the bot's messages removes it.
pub struct DeleteReplied;

#[async_trait]
impl MessageAction for DeleteReplied {
    async fn handle(
        &self,
        ctx: &ActionContext,
        msg: &MessageEvent,
        reply_to: Option<&MessageRecord>,
    ) -> anyhow::Result<()> {
        let Some(target) = reply_to else {
            return Ok(());
        };
        if !sent_by_bot(ctx, target) {
            ctx.send_text_async(
                &msg.room,
                OutgoingContent::notice("I can only delete my own messages."),
                Some(msg.external_id.clone()),
                None,
            );
            return Ok(());
        }
        ctx.redact(&msg.room, &target.external_id, Some(DELETE_REASON))
            .await?;
        ctx.react_async(&msg.room, &msg.external_id, "✅");
        info!(room = %msg.room, event_id = %target.external_id, requested_by = %msg.sender, "message deleted");
        Ok(())
    }
}

/// A delete reaction on one of the bot's messages removes it.
pub struct DeleteReacted;

#[async_trait]
impl ReactionAction for DeleteReacted {
    async fn handle(
        &self,
        ctx: &ActionContext,
        reaction: &ReactionEvent,
        target: &MessageRecord,
    ) -> anyhow::Result<()> {
        if !sent_by_bot(ctx, target) {
            debug!(room = %reaction.room, event_id = %target.external_id, "delete reaction on a foreign message");
            return Ok(());
        }
        ctx.redact(&reaction.room, &target.external_id, Some(DELETE_REASON))
            .await?;
        info!(room = %reaction.room, event_id = %target.external_id, requested_by = %reaction.sender, "message deleted");
        Ok(())
    }
}

fn sent_by_bot(ctx: &ActionContext, record: &MessageRecord) -> bool {
    !record.incoming && record.sender.as_deref() == Some(ctx.bot_user())
}
