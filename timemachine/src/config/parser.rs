//! INI parsing: `Ini` → [`ConfigFile`].
//!
//! Starts from defaults and overlays every key found in the file. This is the
//! only place where INI key names map to struct fields.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::file::{ConfigFile, ConfigFileError};
use super::settings::default_cache_directory;
use crate::provider::Database;
use crate::scheduler::{MAX_PARALLELISM, MIN_PARALLELISM};

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [database] section
    if let Some(section) = ini.section(Some("database")) {
        if let Some(v) = section.get("name") {
            config.store.database =
                Database::from_str(v).map_err(|_| invalid("database", "name", v, db_reason()))?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.store.cache_directory = if v.is_empty() {
                default_cache_directory()
            } else {
                Some(expand_tilde(v))
            };
        }
        if let Some(v) = section.get("enabled") {
            if !parse_bool(v).ok_or_else(|| {
                invalid("cache", "enabled", v, "must be 'true' or 'false'".to_string())
            })? {
                config.store.cache_directory = None;
            }
        }
        if let Some(v) = section.get("packet_ttl_ms") {
            let ms = parse_positive(v).ok_or_else(|| {
                invalid(
                    "cache",
                    "packet_ttl_ms",
                    v,
                    "must be a positive integer (milliseconds)".to_string(),
                )
            })?;
            config.store.packet_ttl = Duration::from_millis(ms);
        }
    }

    // [network] section
    if let Some(section) = ini.section(Some("network")) {
        if let Some(v) = section.get("timeout") {
            config.store.http_timeout_secs = parse_positive(v).ok_or_else(|| {
                invalid(
                    "network",
                    "timeout",
                    v,
                    "must be a positive integer (seconds)".to_string(),
                )
            })?;
        }
        if let Some(v) = section.get("parallelism") {
            config.store.parallelism = v
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| (MIN_PARALLELISM..=MAX_PARALLELISM).contains(n))
                .ok_or_else(|| {
                    invalid(
                        "network",
                        "parallelism",
                        v,
                        format!(
                            "must be an integer between {} and {}",
                            MIN_PARALLELISM, MAX_PARALLELISM
                        ),
                    )
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            config.logging.directory = (!v.is_empty()).then(|| expand_tilde(v));
        }
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if v.is_empty() {
                return Err(invalid(
                    "logging",
                    "file",
                    v,
                    "must not be empty".to_string(),
                ));
            }
            config.logging.file = v.to_string();
        }
    }

    Ok(config)
}

/// Expands a leading `~/` to the user's home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn parse_positive(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok().filter(|n| *n > 0)
}

fn db_reason() -> String {
    let names: Vec<&str> = Database::ALL.iter().map(|db| db.name()).collect();
    format!("must be one of: {}", names.join(", "))
}

fn invalid(section: &str, key: &str, value: &str, reason: String) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason,
    }
}
