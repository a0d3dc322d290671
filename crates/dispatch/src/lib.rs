//! Inbound event dispatch.
//!
//! Raw protocol events flow through the [`gate::InboundGate`], the
//! [`classifier::EventClassifier`] and, for messages, the
//! [`reply::ReplyResolver`], before the [`actions::ActionRegistry`] picks
//! exactly one action to run. [`dispatcher::Dispatcher`] wires the stages
//! together and implements the protocol source callbacks.

pub mod actions;
pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod matcher;
pub mod quote;
pub mod reply;

#[cfg(test)]
pub(crate) mod test_support;

pub use {
    actions::{ActionRegistry, MembershipHandler, MessageAction, ReactionAction},
    context::ActionContext,
    dispatcher::{DispatchOutcome, Dispatcher},
    error::{Error, Result},
    gate::{DropReason, InboundGate, Verdict},
};
