use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {tokio::time::Instant, tracing::debug};

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Process-wide send throttle shared by every sender and every room.
///
/// One rate-limit signal pauses all in-flight and future sends until the
/// cooldown elapses. Clones share the same state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// std mutex: only held for a read or a compare-and-set, never across
    /// an `.await`.
    blocked_until: Arc<Mutex<Option<Instant>>>,
    cooldown: Duration,
    poll_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, DEFAULT_POLL_INTERVAL)
    }
}

impl RateLimiter {
    pub fn new(cooldown: Duration, poll_interval: Duration) -> Self {
        Self {
            blocked_until: Arc::new(Mutex::new(None)),
            cooldown,
            // A zero interval would spin.
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Time left until sends may resume, `None` when not blocked.
    pub fn remaining(&self) -> Option<Duration> {
        let guard = self.blocked_until.lock().unwrap_or_else(|e| e.into_inner());
        let until = (*guard)?;
        let now = Instant::now();
        (until > now).then(|| until - now)
    }

    #[cfg(test)]
    fn is_blocked(&self) -> bool {
        self.remaining().is_some()
    }

    /// Record a rate-limit signal: block every sender for the cooldown.
    ///
    /// `blocked_until` only ever moves forward; a signal that would end the
    /// block earlier than an existing one leaves it untouched.
    pub fn block(&self) -> Instant {
        let candidate = Instant::now() + self.cooldown;
        let mut guard = self.blocked_until.lock().unwrap_or_else(|e| e.into_inner());
        let until = match *guard {
            Some(existing) if existing >= candidate => existing,
            _ => candidate,
        };
        *guard = Some(until);
        until
    }

    /// Sleep in fixed increments until no block is active. Returns the time
    /// spent waiting.
    pub async fn wait_until_clear(&self) -> Duration {
        let started = Instant::now();
        let mut logged = false;
        while let Some(remaining) = self.remaining() {
            if !logged {
                debug!(
                    remaining_ms = remaining.as_millis() as u64,
                    "send blocked by rate limit, waiting"
                );
                logged = true;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
        started.elapsed()
    }
}
