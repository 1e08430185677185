//! Settings discovery, file parsing, and environment overrides.

use std::path::{Path, PathBuf};

use crate::errors::{Result, SettingsError};
use crate::types::HuddleSettings;

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "HUDDLE_SETTINGS";

/// Path of the settings file, if one was configured.
pub fn settings_path() -> Option<PathBuf> {
    std::env::var_os(SETTINGS_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Load settings from the configured file (if any) plus the process
/// environment.
pub fn load_settings() -> Result<HuddleSettings> {
    load_with(settings_path().as_deref(), |key| std::env::var(key).ok())
}

/// Load settings from a specific file plus the process environment.
///
/// A file that does not exist yields defaults.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    load_with(Some(path), |key| std::env::var(key).ok())
}

fn load_with(
    path: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<HuddleSettings> {
    let mut settings = match path {
        Some(path) => read_file(path)?,
        None => HuddleSettings::default(),
    };
    apply_env_overrides(&mut settings, env)?;
    settings.validate();
    Ok(settings)
}

fn read_file(path: &Path) -> Result<HuddleSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(?path, "settings file not found, using defaults");
            return Ok(HuddleSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply `PORT` and `HUDDLE_*` overrides using `env` as the variable source.
///
/// | Variable | Field |
/// |----------|-------|
/// | `PORT` | `server.port` |
/// | `HUDDLE_HOST` | `server.host` |
/// | `HUDDLE_STATIC_DIR` | `server.staticDir` |
/// | `HUDDLE_LOG_LEVEL` | `logging.level` |
/// | `HUDDLE_LOG_JSON` | `logging.json` |
pub fn apply_env_overrides(
    settings: &mut HuddleSettings,
    env: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(port) = env("PORT") {
        settings.server.port = port
            .trim()
            .parse()
            .map_err(|_| SettingsError::InvalidEnv {
                var: "PORT",
                value: port,
            })?;
    }
    if let Some(host) = env("HUDDLE_HOST") {
        settings.server.host = host;
    }
    if let Some(dir) = env("HUDDLE_STATIC_DIR") {
        settings.server.static_dir = PathBuf::from(dir);
    }
    if let Some(level) = env("HUDDLE_LOG_LEVEL") {
        settings.logging.level = level;
    }
    if let Some(json) = env("HUDDLE_LOG_JSON") {
        settings.logging.json = parse_bool(&json).ok_or(SettingsError::InvalidEnv {
            var: "HUDDLE_LOG_JSON",
            value: json,
        })?;
    }
    Ok(())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
