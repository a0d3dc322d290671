//! Config schema types (matrix account, delivery retry policy, database, bot texts).
use std::{path::PathBuf, time::Duration};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub matrix: MatrixConfig,
    pub delivery: DeliveryConfig,
    pub database: DatabaseConfig,
    pub bot: BotConfig,
}

/// Homeserver account the bot runs as.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatrixConfig {
    /// Base URL of the homeserver, e.g. `https://matrix.example.org`.
    pub homeserver: String,

    /// Fully-qualified user id of the bot, e.g. `@nudge:example.org`.
    pub user_id: String,

    /// Access token for the bot account.
    #[serde(serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,

    /// Long-poll timeout passed to `/sync` (seconds).
    pub sync_timeout_secs: u64,

    /// Back-off after a failed `/sync` request (seconds).
    pub sync_retry_secs: u64,

    /// Skip the backlog returned by the very first `/sync` after startup.
    pub skip_initial_backlog: bool,
}

impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("homeserver", &self.homeserver)
            .field("user_id", &self.user_id)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver: String::new(),
            user_id: String::new(),
            access_token: Secret::new(String::new()),
            sync_timeout_secs: 30,
            sync_retry_secs: 5,
            skip_initial_backlog: true,
        }
    }
}

/// Retry budget and base delay for one class of call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    pub budget: u32,
    pub delay_secs: u64,
}

impl RetrySettings {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

/// Outbound delivery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Policy for blocking sends whose receipt the caller waits for.
    pub sync_retry: RetrySettings,

    /// Policy for fire-and-forget sends.
    pub background_retry: RetrySettings,

    /// How long every sender pauses after a rate-limit signal (seconds).
    pub rate_limit_cooldown_secs: u64,

    /// Sleep increment while waiting for the cooldown to elapse (milliseconds).
    pub blocked_poll_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            sync_retry: RetrySettings {
                budget: 3,
                delay_secs: 5,
            },
            background_retry: RetrySettings {
                budget: 10,
                delay_secs: 30,
            },
            rate_limit_cooldown_secs: 60,
            blocked_poll_ms: 1000,
        }
    }
}

impl DeliveryConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn blocked_poll(&self) -> Duration {
        Duration::from_millis(self.blocked_poll_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file holding message records and the room directory.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nudge.db"),
        }
    }
}

impl DatabaseConfig {
    /// Connection URL understood by `sqlx`; creates the file when missing.
    pub fn url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}

/// Texts used by the built-in actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Sent when a message matches no registered action.
    pub help_text: String,

    /// Leave rooms once the bot is the last member left.
    pub leave_empty_rooms: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            help_text: "I didn't understand that. Try `!ping`, or reply `delete` to one of my \
                        messages to remove it."
                .into(),
            leave_empty_rooms: true,
        }
    }
}
