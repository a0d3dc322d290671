//! Matchers are plain values: a compiled pattern for text actions, a key set
//! for reaction actions.

use std::collections::BTreeSet;

use regex::Regex;

/// Regex evaluated against a quote-stripped message body.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }

    pub fn matches(&self, body: &str) -> bool {
        self.regex.is_match(body)
    }
}

/// Set of reaction keys that trigger an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMatcher {
    keys: BTreeSet<String>,
}

impl KeyMatcher {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn matches(&self, key: &str) -> bool {
        self.keys.contains(key) || self.keys.contains(strip_variation_selector(key))
    }
}

/// Clients disagree on whether to append U+FE0F to emoji keys; treat
/// `"❤️"` and `"❤"` as the same key.
fn strip_variation_selector(key: &str) -> &str {
    key.strip_suffix('\u{fe0f}').unwrap_or(key)
}
