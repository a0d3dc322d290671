use std::path::{Path, PathBuf};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::NudgeConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["nudge.toml", "nudge.yaml", "nudge.yml", "nudge.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<NudgeConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./nudge.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/nudge/nudge.{toml,yaml,yml,json}` (user-global)
///
/// Returns `NudgeConfig::default()` if no config file is found. Environment
/// overrides are applied in every case.
pub fn discover_and_load() -> (NudgeConfig, Option<PathBuf>) {
    let path = find_config_file();
    let mut config = match path.as_deref() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            match load_config(path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                    NudgeConfig::default()
                },
            }
        },
        None => {
            debug!("no config file found, using defaults");
            NudgeConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    (config, path)
}

/// Overlay `NUDGE_*` environment variables onto a loaded config.
pub fn apply_env_overrides(config: &mut NudgeConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut NudgeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("NUDGE_HOMESERVER") {
        config.matrix.homeserver = v;
    }
    if let Some(v) = lookup("NUDGE_USER_ID") {
        config.matrix.user_id = v;
    }
    if let Some(v) = lookup("NUDGE_ACCESS_TOKEN") {
        config.matrix.access_token = Secret::new(v);
    }
    if let Some(v) = lookup("NUDGE_DATABASE_PATH") {
        config.database.path = PathBuf::from(v);
    }
}

/// Find the first config file in standard locations.
fn find_config_file() -> Option<PathBuf> {
    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/nudge/
    if let Some(dir) = config_dir() {
        for name in CONFIG_FILENAMES {
            let p = dir.join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }

    None
}

/// Returns the user-global config directory (`~/.config/nudge/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "nudge").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<NudgeConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, std::io::Write};

    #[test]
    fn loads_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[matrix]\nhomeserver = \"https://hs.example\"\nuser_id = \"@nudge:hs.example\""
        )
        .unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.matrix.homeserver, "https://hs.example");
        assert_eq!(cfg.matrix.user_id, "@nudge:hs.example");
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "database:\n  path: /tmp/nudge-test.db").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.database.path, PathBuf::from("/tmp/nudge-test.db"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }

    #[test]
    fn env_overrides_replace_values() {
        let mut cfg = NudgeConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "NUDGE_ACCESS_TOKEN" => Some("from-env".into()),
            "NUDGE_DATABASE_PATH" => Some("/data/nudge.db".into()),
            _ => None,
        });
        assert_eq!(cfg.matrix.access_token.expose_secret(), "from-env");
        assert_eq!(cfg.database.path, PathBuf::from("/data/nudge.db"));
        assert!(cfg.matrix.homeserver.is_empty());
    }
}
