//! Configuration loading, validation, and env substitution.
//!
//! Config files: `nudge.toml`, `nudge.yaml`, or `nudge.json`
//! Searched in `./` then `~/.config/nudge/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{apply_env_overrides, config_dir, discover_and_load, load_config},
    schema::{BotConfig, DatabaseConfig, DeliveryConfig, MatrixConfig, NudgeConfig, RetrySettings},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
