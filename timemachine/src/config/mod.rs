//! Configuration
//!
//! [`StoreConfig`] carries everything a [`PacketStore`](crate::store::PacketStore)
//! needs at construction. [`ConfigFile`] loads the same settings (plus logging
//! options) from an INI file such as:
//!
//! ```ini
//! [database]
//! name = tm
//!
//! [cache]
//! enabled = true
//! directory = ~/.cache/timemachine
//! packet_ttl_ms = 2000
//!
//! [network]
//! timeout = 30
//! parallelism = 8
//!
//! [logging]
//! directory = ~/.cache/timemachine/logs
//! file = timemachine.log
//! ```

mod file;
mod parser;
mod settings;
mod writer;

pub use file::{ConfigFile, ConfigFileError, LoggingSettings, DEFAULT_LOG_FILE};
pub use settings::{
    default_cache_directory, StoreConfig, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_PARALLELISM,
};
