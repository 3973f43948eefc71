//! INI serialization for [`ConfigFile`].

use std::path::Path;

use super::file::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let store = &config.store;
    let (cache_enabled, cache_directory) = match &store.cache_directory {
        Some(dir) => ("true", path_to_string(dir)),
        None => ("false", String::new()),
    };
    let log_directory = config
        .logging
        .directory
        .as_deref()
        .map(path_to_string)
        .unwrap_or_default();

    format!(
        r#"[database]
; Tile database: default, tm, sky, moon or mars
name = {database}

[cache]
; Disk cache for manifests, packets and images
enabled = {cache_enabled}
directory = {cache_directory}
; Idle time before a decoded packet is dropped from memory
packet_ttl_ms = {packet_ttl_ms}

[network]
; HTTP request timeout in seconds
timeout = {timeout}
; Concurrent fetches (1-100)
parallelism = {parallelism}

[logging]
; Leave directory empty to log to stderr only
directory = {log_directory}
file = {log_file}
"#,
        database = store.database,
        packet_ttl_ms = store.packet_ttl.as_millis(),
        timeout = store.http_timeout_secs,
        parallelism = store.parallelism,
        log_file = config.logging.file,
    )
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
