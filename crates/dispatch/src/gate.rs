use std::{fmt, sync::Arc};

use tracing::warn;

use nudge_channels::{MessageStore, RawEvent, RoomDirectory};

/// Why an event was not dispatched. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    SelfOrigin,
    Duplicate,
    UnknownRoom,
    UnknownUser,
    /// A store or directory lookup failed while gating.
    LookupFailed,
    Undecryptable,
    UnknownKind,
    /// A reaction to a message the bot never stored.
    UntrackedTarget,
    UnmatchedReaction,
    UnhandledMembership,
}

impl DropReason {
    /// Outcome tag used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SelfOrigin => "dropped:self",
            Self::Duplicate => "dropped:duplicate",
            Self::UnknownRoom => "dropped:unknown-room",
            Self::UnknownUser => "dropped:unknown-user",
            Self::LookupFailed => "dropped:lookup-failed",
            Self::Undecryptable => "dropped:undecryptable",
            Self::UnknownKind => "dropped:unknown-kind",
            Self::UntrackedTarget => "dropped:untracked-target",
            Self::UnmatchedReaction => "dropped:unmatched-reaction",
            Self::UnhandledMembership => "dropped:unhandled-membership",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Process,
    Drop(DropReason),
}

/// First filter every raw event passes through.
///
/// Rules, in order: the bot's own events, already-recorded external ids,
/// then (message and reaction events only) unknown rooms and unknown members.
/// A failed lookup drops the event instead of surfacing an error.
pub struct InboundGate {
    bot_user: String,
    store: Arc<dyn MessageStore>,
    rooms: Arc<dyn RoomDirectory>,
}

impl InboundGate {
    pub fn new(
        bot_user: impl Into<String>,
        store: Arc<dyn MessageStore>,
        rooms: Arc<dyn RoomDirectory>,
    ) -> Self {
        Self {
            bot_user: bot_user.into(),
            store,
            rooms,
        }
    }

    pub async fn evaluate(&self, raw: &RawEvent) -> Verdict {
        if raw.sender == self.bot_user {
            return Verdict::Drop(DropReason::SelfOrigin);
        }

        if let Some(external_id) = raw.external_id.as_deref() {
            match self.store.get_by_external_id(external_id).await {
                Ok(Some(_)) => return Verdict::Drop(DropReason::Duplicate),
                Ok(None) => {},
                Err(e) => {
                    warn!(room = %raw.room, event_id = external_id, error = %e, "dedup lookup failed");
                    return Verdict::Drop(DropReason::LookupFailed);
                },
            }
        }

        if !raw.requires_known_room() {
            return Verdict::Process;
        }

        match self.rooms.get_room_by_external_id(&raw.room).await {
            Ok(Some(_)) => {},
            Ok(None) => return Verdict::Drop(DropReason::UnknownRoom),
            Err(e) => {
                warn!(room = %raw.room, error = %e, "room lookup failed");
                return Verdict::Drop(DropReason::LookupFailed);
            },
        }

        match self.rooms.is_member_known(&raw.room, &raw.sender).await {
            Ok(true) => Verdict::Process,
            Ok(false) => Verdict::Drop(DropReason::UnknownUser),
            Err(e) => {
                warn!(room = %raw.room, sender = %raw.sender, error = %e, "member lookup failed");
                Verdict::Drop(DropReason::LookupFailed)
            },
        }
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::test_support::{BOT, MemoryRooms, MemoryStore, raw_message, raw_event, stored},
        nudge_channels::raw::EVENT_MEMBER,
    };

    fn gate(store: Arc<MemoryStore>, rooms: Arc<MemoryRooms>) -> InboundGate {
        InboundGate::new(BOT, store, rooms)
    }

    #[tokio::test]
    async fn own_events_are_dropped_first() {
        let gate = gate(Arc::default(), Arc::default());
        let mut raw = raw_message("$1", "hello");
        raw.sender = BOT.into();
        assert_eq!(
            gate.evaluate(&raw).await,
            Verdict::Drop(DropReason::SelfOrigin)
        );
    }

    #[tokio::test]
    async fn recorded_events_are_duplicates() {
        let store = Arc::new(MemoryStore::default());
        store.insert(stored("$1", "hello"));
        let gate = gate(store, MemoryRooms::with_member("!room:hs", "@alice:hs"));
        assert_eq!(
            gate.evaluate(&raw_message("$1", "hello")).await,
            Verdict::Drop(DropReason::Duplicate)
        );
    }

    #[tokio::test]
    async fn unknown_room_and_member() {
        let gate_no_room = gate(Arc::default(), Arc::default());
        assert_eq!(
            gate_no_room.evaluate(&raw_message("$1", "hi")).await,
            Verdict::Drop(DropReason::UnknownRoom)
        );

        let gate_other_member = gate(
            Arc::default(),
            MemoryRooms::with_member("!room:hs", "@bob:hs"),
        );
        assert_eq!(
            gate_other_member.evaluate(&raw_message("$1", "hi")).await,
            Verdict::Drop(DropReason::UnknownUser)
        );
    }

    #[tokio::test]
    async fn known_member_is_processed() {
        let gate = gate(
            Arc::default(),
            MemoryRooms::with_member("!room:hs", "@alice:hs"),
        );
        assert_eq!(
            gate.evaluate(&raw_message("$1", "hi")).await,
            Verdict::Process
        );
    }

    #[tokio::test]
    async fn membership_skips_room_checks() {
        let gate = gate(Arc::default(), Arc::default());
        let raw = raw_event(
            EVENT_MEMBER,
            None,
            serde_json::json!({ "membership": "invite" }),
        );
        assert_eq!(gate.evaluate(&raw).await, Verdict::Process);
    }

    #[tokio::test]
    async fn lookup_failures_drop() {
        let store = Arc::new(MemoryStore::failing());
        let gate_store = gate(store, MemoryRooms::with_member("!room:hs", "@alice:hs"));
        assert_eq!(
            gate_store.evaluate(&raw_message("$1", "hi")).await,
            Verdict::Drop(DropReason::LookupFailed)
        );

        let gate_rooms = gate(Arc::default(), Arc::new(MemoryRooms::failing()));
        assert_eq!(
            gate_rooms.evaluate(&raw_message("$1", "hi")).await,
            Verdict::Drop(DropReason::LookupFailed)
        );
    }

    #[test]
    fn drop_reasons_render_as_outcome_tags() {
        assert_eq!(DropReason::SelfOrigin.to_string(), "dropped:self");
        assert_eq!(DropReason::UnknownRoom.as_str(), "dropped:unknown-room");
    }
}
