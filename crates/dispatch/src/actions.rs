use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;

use nudge_common::types::{MembershipEvent, MessageEvent, MessageRecord, ReactionEvent};

use crate::{
    context::ActionContext,
    error::{Error, Result},
    matcher::{KeyMatcher, PatternMatcher},
    quote::strip_reply_fallback,
};

/// Business logic bound to a text pattern.
#[async_trait]
pub trait MessageAction: Send + Sync {
    /// `reply_to` is the stored record the message replies to, when it
    /// resolved.
    async fn handle(
        &self,
        ctx: &ActionContext,
        msg: &MessageEvent,
        reply_to: Option<&MessageRecord>,
    ) -> anyhow::Result<()>;
}

/// Business logic bound to a set of reaction keys.
#[async_trait]
pub trait ReactionAction: Send + Sync {
    async fn handle(
        &self,
        ctx: &ActionContext,
        reaction: &ReactionEvent,
        target: &MessageRecord,
    ) -> anyhow::Result<()>;
}

/// Fixed handler for membership changes. Bans are delivered as leaves.
#[async_trait]
pub trait MembershipHandler: Send + Sync {
    async fn on_invite(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()>;
    async fn on_join(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()>;
    async fn on_leave(&self, ctx: &ActionContext, event: &MembershipEvent) -> anyhow::Result<()>;
}

/// An action picked by the registry, with the name it was registered under.
pub struct Selected<'a, A: ?Sized> {
    pub name: &'a str,
    pub action: &'a A,
}

struct PatternEntry {
    name: String,
    matcher: PatternMatcher,
    action: Arc<dyn MessageAction>,
}

struct KeyEntry {
    name: String,
    matcher: KeyMatcher,
    action: Arc<dyn ReactionAction>,
}

/// Ordered action lists. The first matching entry of a lane wins.
pub struct ActionRegistry {
    reply: Vec<PatternEntry>,
    message: Vec<PatternEntry>,
    default_message: (String, Arc<dyn MessageAction>),
    reaction: Vec<KeyEntry>,
    default_reaction: Option<(String, Arc<dyn ReactionAction>)>,
}

impl ActionRegistry {
    pub fn builder() -> ActionRegistryBuilder {
        ActionRegistryBuilder::default()
    }

    /// Pick the action for a message body.
    ///
    /// The quoted reply fallback is stripped once, before any pattern sees
    /// the body. Reply actions are only considered when `has_reply` is set;
    /// when none match, message actions and then the default are tried.
    pub fn select_message(&self, body: &str, has_reply: bool) -> Selected<'_, dyn MessageAction> {
        let body = strip_reply_fallback(body);
        let reply = if has_reply {
            self.reply.as_slice()
        } else {
            &[]
        };

        reply
            .iter()
            .chain(&self.message)
            .find(|entry| entry.matcher.matches(body))
            .map(|entry| Selected {
                name: &entry.name,
                action: entry.action.as_ref(),
            })
            .unwrap_or_else(|| Selected {
                name: &self.default_message.0,
                action: self.default_message.1.as_ref(),
            })
    }

    /// Pick the action for a reaction key, falling back to the optional
    /// default.
    pub fn select_reaction(&self, key: &str) -> Option<Selected<'_, dyn ReactionAction>> {
        self.reaction
            .iter()
            .find(|entry| entry.matcher.matches(key))
            .map(|entry| (&entry.name, &entry.action))
            .or_else(|| self.default_reaction.as_ref().map(|(n, a)| (n, a)))
            .map(|(name, action)| Selected {
                name,
                action: action.as_ref(),
            })
    }

    /// Registered names per lane, in evaluation order.
    pub fn describe(&self) -> Vec<(&'static str, &str)> {
        let mut lanes = Vec::new();
        lanes.extend(self.reply.iter().map(|e| ("reply", e.name.as_str())));
        lanes.extend(self.message.iter().map(|e| ("message", e.name.as_str())));
        lanes.push(("message", self.default_message.0.as_str()));
        lanes.extend(self.reaction.iter().map(|e| ("reaction", e.name.as_str())));
        if let Some((name, _)) = &self.default_reaction {
            lanes.push(("reaction", name.as_str()));
        }
        lanes
    }
}

/// Collects registrations; patterns are compiled and names checked in
/// [`ActionRegistryBuilder::build`].
#[derive(Default)]
pub struct ActionRegistryBuilder {
    reply: Vec<(String, String, Arc<dyn MessageAction>)>,
    message: Vec<(String, String, Arc<dyn MessageAction>)>,
    default_message: Option<(String, Arc<dyn MessageAction>)>,
    reaction: Vec<(String, KeyMatcher, Arc<dyn ReactionAction>)>,
    default_reaction: Option<(String, Arc<dyn ReactionAction>)>,
}

impl ActionRegistryBuilder {
    #[must_use]
    pub fn reply(
        mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        action: Arc<dyn MessageAction>,
    ) -> Self {
        self.reply.push((name.into(), pattern.into(), action));
        self
    }

    #[must_use]
    pub fn message(
        mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
        action: Arc<dyn MessageAction>,
    ) -> Self {
        self.message.push((name.into(), pattern.into(), action));
        self
    }

    /// Replaces any earlier default.
    #[must_use]
    pub fn default_message(
        mut self,
        name: impl Into<String>,
        action: Arc<dyn MessageAction>,
    ) -> Self {
        self.default_message = Some((name.into(), action));
        self
    }

    #[must_use]
    pub fn reaction<I, S>(
        mut self,
        name: impl Into<String>,
        keys: I,
        action: Arc<dyn ReactionAction>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reaction
            .push((name.into(), KeyMatcher::new(keys), action));
        self
    }

    #[must_use]
    pub fn default_reaction(
        mut self,
        name: impl Into<String>,
        action: Arc<dyn ReactionAction>,
    ) -> Self {
        self.default_reaction = Some((name.into(), action));
        self
    }

    pub fn build(self) -> Result<ActionRegistry> {
        let mut names = HashSet::new();
        let mut claim = |name: &str| {
            if names.insert(name.to_string()) {
                Ok(())
            } else {
                Err(Error::DuplicateName {
                    name: name.to_string(),
                })
            }
        };

        let mut compile = |entries: Vec<(String, String, Arc<dyn MessageAction>)>| {
            entries
                .into_iter()
                .map(|(name, pattern, action)| -> Result<PatternEntry> {
                    claim(&name)?;
                    let matcher = PatternMatcher::new(&pattern).map_err(|source| {
                        Error::InvalidPattern {
                            name: name.clone(),
                            source,
                        }
                    })?;
                    Ok(PatternEntry {
                        name,
                        matcher,
                        action,
                    })
                })
                .collect::<Result<Vec<_>>>()
        };
        let reply = compile(self.reply)?;
        let message = compile(self.message)?;

        let reaction = self
            .reaction
            .into_iter()
            .map(|(name, matcher, action)| -> Result<KeyEntry> {
                claim(&name)?;
                if matcher.is_empty() {
                    return Err(Error::EmptyKeySet { name });
                }
                Ok(KeyEntry {
                    name,
                    matcher,
                    action,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let default_message = self.default_message.ok_or(Error::MissingDefault)?;
        claim(&default_message.0)?;
        if let Some((name, _)) = &self.default_reaction {
            claim(name)?;
        }

        Ok(ActionRegistry {
            reply,
            message,
            default_message,
            reaction,
            default_reaction: self.default_reaction,
        })
    }
}
