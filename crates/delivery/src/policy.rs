use std::time::Duration;

/// Retry budget and base delay for one send.
///
/// After the k-th transient failure the engine sleeps `delay × k`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub budget: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(budget: u32, delay: Duration) -> Self {
        Self { budget, delay }
    }

    /// Number of attempts this policy allows. A zero budget still makes one.
    pub fn attempts(&self) -> u32 {
        self.budget.max(1)
    }

    /// Sleep before the next attempt when `remaining` budget is left.
    pub fn backoff(&self, remaining: u32) -> Duration {
        self.delay * self.attempts().saturating_sub(remaining)
    }
}

/// The two policy classes call sites choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicies {
    /// Small budget, short delay: the caller is waiting for the receipt.
    pub sync: RetryPolicy,
    /// Larger budget, longer delay: nobody is waiting.
    pub background: RetryPolicy,
}

impl Default for DeliveryPolicies {
    fn default() -> Self {
        Self {
            sync: RetryPolicy::new(3, Duration::from_secs(5)),
            background: RetryPolicy::new(10, Duration::from_secs(30)),
        }
    }
}
