use std::sync::Arc;

use {
    anyhow::Context,
    async_trait::async_trait,
    tracing::{debug, info},
};

use {
    nudge_channels::RoomDirectory,
    nudge_common::types::MembershipEvent,
    nudge_dispatch::{ActionContext, MembershipHandler},
    nudge_store::SqliteRoomDirectory,
};

/// Keeps the room directory in step with membership changes.
///
/// Invites addressed to the bot are accepted. Joins and leaves of other users
/// update the member list of rooms the bot already tracks. When the bot itself
/// is removed, the room and its stored messages are forgotten.
pub struct RoomMembership {
    rooms: Arc<SqliteRoomDirectory>,
    leave_empty_rooms: bool,
}

impl RoomMembership {
    pub fn new(rooms: Arc<SqliteRoomDirectory>, leave_empty_rooms: bool) -> Self {
        Self {
            rooms,
            leave_empty_rooms,
        }
    }

    async fn is_tracked(&self, room: &str) -> anyhow::Result<bool> {
        Ok(self.rooms.get_room_by_external_id(room).await?.is_some())
    }

    async fn forget_room(&self, ctx: &ActionContext, room: &str) -> anyhow::Result<()> {
        ctx.store()
            .delete_all_for_room(room)
            .await
            .context("failed to delete room messages")?;
        self.rooms.delete_room(room).await?;
        info!(room, "room forgotten");
        Ok(())
    }
}

#[async_trait]
impl MembershipHandler for RoomMembership {
    async fn on_invite(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        if event.state_key != ctx.bot_user() {
            return Ok(());
        }
        let policy = ctx.engine().policies().sync;
        ctx.engine()
            .join(&event.room, policy)
            .await
            .with_context(|| format!("failed to join {}", event.room))?;
        self.rooms.upsert_room(&event.room, None).await?;
        self.rooms.add_member(&event.room, &event.sender).await?;
        info!(room = %event.room, inviter = %event.sender, "joined room");
        Ok(())
    }

    async fn on_join(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        if event.state_key == ctx.bot_user() {
            self.rooms.upsert_room(&event.room, None).await?;
            return Ok(());
        }
        if !self.is_tracked(&event.room).await? {
            debug!(room = %event.room, user = %event.state_key, "join in untracked room");
            return Ok(());
        }
        self.rooms.add_member(&event.room, &event.state_key).await?;
        debug!(room = %event.room, user = %event.state_key, "member added");
        Ok(())
    }

    async fn on_leave(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()> {
        if event.state_key == ctx.bot_user() {
            return self.forget_room(ctx, &event.room).await;
        }
        self.rooms
            .remove_member(&event.room, &event.state_key)
            .await?;
        debug!(room = %event.room, user = %event.state_key, "member removed");

        if !self.leave_empty_rooms || !self.is_tracked(&event.room).await? {
            return Ok(());
        }
        if self.rooms.member_count(&event.room).await? == 0 {
            let policy = ctx.engine().policies().sync;
            ctx.engine()
                .leave(&event.room, policy)
                .await
                .with_context(|| format!("failed to leave {}", event.room))?;
            self.forget_room(ctx, &event.room).await?;
        }
        Ok(())
    }
}
