use std::sync::Arc;

use {
    async_trait::async_trait,
    tracing::{debug, info, warn},
};

use {
    nudge_channels::{EventHandler, RawEvent},
    nudge_common::types::{
        InboundEvent, MembershipEvent, MembershipKind, MessageEvent, MessageRecord,
        ReactionEvent,
    },
};

use crate::{
    actions::{ActionRegistry, MembershipHandler},
    classifier::{Classification, EventClassifier},
    context::ActionContext,
    gate::{DropReason, InboundGate, Verdict},
    reply::ReplyResolver,
};

/// What happened to one raw event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    /// An action ran. Its own failure is logged, not reported here.
    Matched { action: String },
}

/// Runs raw events through gate, classifier and action selection, invoking at
/// most one action per event.
pub struct Dispatcher {
    gate: InboundGate,
    classifier: EventClassifier,
    resolver: ReplyResolver,
    registry: ActionRegistry,
    membership: Arc<dyn MembershipHandler>,
    ctx: ActionContext,
}

impl Dispatcher {
    pub fn new(
        gate: InboundGate,
        classifier: EventClassifier,
        registry: ActionRegistry,
        membership: Arc<dyn MembershipHandler>,
        ctx: ActionContext,
    ) -> Self {
        Self {
            gate,
            classifier,
            resolver: ReplyResolver::new(Arc::clone(ctx.store())),
            registry,
            membership,
            ctx,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub async fn handle(&self, raw: RawEvent) -> DispatchOutcome {
        let outcome = self.dispatch(&raw).await;
        let event_id = raw.external_id.as_deref().unwrap_or("-");
        match &outcome {
            DispatchOutcome::Dropped(reason) => debug!(
                room = %raw.room,
                event_id,
                event_type = %raw.event_type,
                outcome = reason.as_str(),
                "event dropped"
            ),
            DispatchOutcome::Matched { action } => {
                let tag = format!("matched:{action}");
                info!(room = %raw.room, event_id, outcome = %tag, "event dispatched");
            },
        }
        outcome
    }

    async fn dispatch(&self, raw: &RawEvent) -> DispatchOutcome {
        if let Verdict::Drop(reason) = self.gate.evaluate(raw).await {
            return DispatchOutcome::Dropped(reason);
        }

        match self.classifier.classify(raw).await {
            Classification::Event(InboundEvent::Message(msg)) => self.on_message_event(msg).await,
            Classification::Event(InboundEvent::Reaction(r)) => self.on_reaction_event(r).await,
            Classification::Event(InboundEvent::Membership(m)) => {
                self.on_membership_event(m).await
            },
            Classification::Undecryptable => DispatchOutcome::Dropped(DropReason::Undecryptable),
            Classification::Unknown => DispatchOutcome::Dropped(DropReason::UnknownKind),
        }
    }

    async fn on_message_event(&self, msg: MessageEvent) -> DispatchOutcome {
        if let Some(reason) = self.record(MessageRecord::from_inbound_message(&msg)).await {
            return DispatchOutcome::Dropped(reason);
        }

        let reply_to = self.resolver.resolve(&msg).await;
        let selected = self
            .registry
            .select_message(&msg.body, reply_to.is_some());
        if let Err(e) = selected
            .action
            .handle(&self.ctx, &msg, reply_to.as_ref())
            .await
        {
            warn!(room = %msg.room, event_id = %msg.external_id, action = selected.name, error = %e, "message action failed");
        }
        DispatchOutcome::Matched {
            action: selected.name.to_string(),
        }
    }

    async fn on_reaction_event(&self, reaction: ReactionEvent) -> DispatchOutcome {
        let Some(target) = self
            .resolver
            .lookup(&reaction.room, &reaction.relates_to_id)
            .await
        else {
            return DispatchOutcome::Dropped(DropReason::UntrackedTarget);
        };
        if let Some(reason) = self
            .record(MessageRecord::from_inbound_reaction(&reaction))
            .await
        {
            return DispatchOutcome::Dropped(reason);
        }

        let Some(selected) = self.registry.select_reaction(&reaction.key) else {
            return DispatchOutcome::Dropped(DropReason::UnmatchedReaction);
        };
        if let Err(e) = selected.action.handle(&self.ctx, &reaction, &target).await {
            warn!(room = %reaction.room, event_id = %reaction.external_id, action = selected.name, error = %e, "reaction action failed");
        }
        DispatchOutcome::Matched {
            action: selected.name.to_string(),
        }
    }

    async fn on_membership_event(&self, event: MembershipEvent) -> DispatchOutcome {
        let (action, result) = match &event.kind {
            MembershipKind::Invite => ("invite", self.membership.on_invite(&self.ctx, &event).await),
            MembershipKind::Join => ("join", self.membership.on_join(&self.ctx, &event).await),
            MembershipKind::Leave | MembershipKind::Ban => {
                ("leave", self.membership.on_leave(&self.ctx, &event).await)
            },
            MembershipKind::Other(kind) => {
                debug!(room = %event.room, membership = %kind, "unhandled membership kind");
                return DispatchOutcome::Dropped(DropReason::UnhandledMembership);
            },
        };
        if let Err(e) = result {
            warn!(room = %event.room, state_key = %event.state_key, action, error = %e, "membership handler failed");
        }
        DispatchOutcome::Matched {
            action: action.to_string(),
        }
    }

    /// Record an inbound event before acting on it, so a redelivery is seen as
    /// a duplicate. A store failure is logged and processing continues.
    async fn record(&self, record: MessageRecord) -> Option<DropReason> {
        let external_id = record.external_id.clone();
        match self.ctx.store().create(record).await {
            Ok(_) => None,
            Err(nudge_channels::Error::Duplicate { .. }) => Some(DropReason::Duplicate),
            Err(e) => {
                warn!(event_id = %external_id, error = %e, "failed to record inbound event");
                None
            },
        }
    }
}

#[async_trait]
impl EventHandler for Dispatcher {
    async fn on_message(&self, raw: RawEvent) {
        self.handle(raw).await;
    }

    async fn on_reaction(&self, raw: RawEvent) {
        self.handle(raw).await;
    }

    async fn on_membership(&self, raw: RawEvent) {
        self.handle(raw).await;
    }
}
