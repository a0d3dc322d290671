use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    tracing::{error, warn},
};

use nudge_config::{NudgeConfig, Severity, ValidationResult};

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Load `explicit` when given, otherwise search the standard locations.
/// `NUDGE_*` overrides apply either way.
pub fn load(explicit: Option<&Path>) -> Result<(NudgeConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => {
            let mut config = nudge_config::load_config(path)
                .with_context(|| format!("cannot load config {}", path.display()))?;
            nudge_config::apply_env_overrides(&mut config);
            Ok((config, Some(path.to_path_buf())))
        },
        None => Ok(nudge_config::discover_and_load()),
    }
}

/// Log warnings and refuse to start on errors.
pub fn ensure_valid(config: &NudgeConfig) -> Result<()> {
    let result = nudge_config::validate(config, None);
    for d in &result.diagnostics {
        match d.severity {
            Severity::Error => error!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, category = d.category, "{}", d.message),
            Severity::Info => {},
        }
    }
    if result.has_errors() {
        bail!(
            "configuration has {} error(s); run `nudge check-config` for details",
            result.count(Severity::Error)
        );
    }
    Ok(())
}

pub fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let (config, path) = load(explicit)?;
    let result = nudge_config::validate(&config, path);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults and environment.\n");
    }

    let shown = report(&result, verbose);
    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }
    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        bail!("invalid configuration");
    }
    Ok(())
}

fn report(result: &ValidationResult, verbose: bool) -> usize {
    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }
    shown
}
