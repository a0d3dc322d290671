//! Configuration validation.
//!
//! Checks a loaded [`NudgeConfig`] for values the bot cannot start with and
//! for settings that work but are probably not what the operator meant.

use std::{fmt, path::PathBuf};

use secrecy::ExposeSecret;

use crate::schema::{NudgeConfig, RetrySettings};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "missing", "invalid-value", "security", "tuning"
    pub category: &'static str,
    /// Dotted path, e.g. "matrix.user_id"
    pub path: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}: {}",
            self.severity, self.category, self.path, self.message
        )
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

struct Collector(Vec<Diagnostic>);

impl Collector {
    fn push(
        &mut self,
        severity: Severity,
        category: &'static str,
        path: &str,
        message: impl Into<String>,
    ) {
        self.0.push(Diagnostic {
            severity,
            category,
            path: path.to_string(),
            message: message.into(),
        });
    }
}

/// Validate a loaded config. `config_path` is only carried through for reporting.
pub fn validate(config: &NudgeConfig, config_path: Option<PathBuf>) -> ValidationResult {
    let mut out = Collector(Vec::new());

    check_matrix(config, &mut out);
    check_retry(&config.delivery.sync_retry, "delivery.sync_retry", &mut out);
    check_retry(
        &config.delivery.background_retry,
        "delivery.background_retry",
        &mut out,
    );

    if config.delivery.rate_limit_cooldown_secs == 0 {
        out.push(
            Severity::Warning,
            "tuning",
            "delivery.rate_limit_cooldown_secs",
            "a zero cooldown retries rate-limited sends immediately",
        );
    }
    if config.delivery.blocked_poll_ms == 0 {
        out.push(
            Severity::Error,
            "invalid-value",
            "delivery.blocked_poll_ms",
            "must be greater than zero",
        );
    }
    if config.delivery.background_retry.budget < config.delivery.sync_retry.budget {
        out.push(
            Severity::Info,
            "tuning",
            "delivery.background_retry.budget",
            "background sends usually get a larger budget than blocking sends",
        );
    }
    if config.database.path.as_os_str().is_empty() {
        out.push(
            Severity::Error,
            "missing",
            "database.path",
            "a database path is required",
        );
    }

    ValidationResult {
        diagnostics: out.0,
        config_path,
    }
}

fn check_matrix(config: &NudgeConfig, out: &mut Collector) {
    let matrix = &config.matrix;

    if matrix.homeserver.is_empty() {
        out.push(
            Severity::Error,
            "missing",
            "matrix.homeserver",
            "homeserver URL is required",
        );
    } else {
        match url::Url::parse(&matrix.homeserver) {
            Ok(url) if url.scheme() == "http" => out.push(
                Severity::Warning,
                "security",
                "matrix.homeserver",
                "homeserver is reached over plain http; the access token is sent unencrypted",
            ),
            Ok(url) if url.scheme() == "https" => {},
            Ok(url) => out.push(
                Severity::Error,
                "invalid-value",
                "matrix.homeserver",
                format!("unsupported URL scheme '{}'", url.scheme()),
            ),
            Err(e) => out.push(
                Severity::Error,
                "invalid-value",
                "matrix.homeserver",
                format!("not a valid URL: {e}"),
            ),
        }
    }

    if matrix.user_id.is_empty() {
        out.push(
            Severity::Error,
            "missing",
            "matrix.user_id",
            "bot user id is required",
        );
    } else if !is_user_id(&matrix.user_id) {
        out.push(
            Severity::Error,
            "invalid-value",
            "matrix.user_id",
            format!("'{}' is not of the form @localpart:server", matrix.user_id),
        );
    }

    let token = matrix.access_token.expose_secret();
    if token.is_empty() {
        out.push(
            Severity::Error,
            "missing",
            "matrix.access_token",
            "access token is required (set NUDGE_ACCESS_TOKEN or use ${VAR} substitution)",
        );
    } else if token.starts_with("${") {
        out.push(
            Severity::Error,
            "missing",
            "matrix.access_token",
            format!("placeholder {token} was not resolved from the environment"),
        );
    }

    if matrix.sync_timeout_secs > 120 {
        out.push(
            Severity::Warning,
            "tuning",
            "matrix.sync_timeout_secs",
            "long-poll timeouts above 120s are often cut by reverse proxies",
        );
    }
}

fn check_retry(settings: &RetrySettings, path: &str, out: &mut Collector) {
    if settings.budget == 0 {
        out.push(
            Severity::Warning,
            "tuning",
            &format!("{path}.budget"),
            "a zero budget still makes one attempt but never retries",
        );
    }
    if settings.delay_secs == 0 {
        out.push(
            Severity::Warning,
            "tuning",
            &format!("{path}.delay_secs"),
            "transient failures will be retried back-to-back",
        );
    }
}

fn is_user_id(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('@') else {
        return false;
    };
    matches!(rest.split_once(':'), Some((local, server)) if !local.is_empty() && !server.is_empty())
}
