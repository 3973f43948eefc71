//! Logging setup
//!
//! Installs a global `tracing` subscriber with:
//! - a stderr layer for interactive use
//! - a non-blocking file layer when a log directory is configured
//! - an `EnvFilter` driven by `RUST_LOG` (defaults to `info`)

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging from configuration.
///
/// The log file is truncated at startup. Fails if the directory cannot be
/// created or a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    let (file_layer, file_guard) = match &settings.directory {
        Some(dir) => {
            let (writer, guard) = file_writer(dir, &settings.file)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

fn file_writer(
    dir: &Path,
    file: &str,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), io::Error> {
    fs::create_dir_all(dir)?;
    fs::write(dir.join(file), "")?;

    let appender = tracing_appender::rolling::never(dir, file);
    Ok(tracing_appender::non_blocking(appender))
}
