//! Database kinds and URL templates
//!
//! # Endpoints
//!
//! The default Earth database lives on `kh.google.com` and serves binary
//! quantum packets:
//!
//! - manifest: `https://kh.google.com/dbRoot.v5?&hl=en&gl=us&output=proto`
//! - packets: `https://kh.google.com/flatfile?q2-{path}-q.{epoch}`
//! - imagery: `https://kh.google.com/flatfile?f1-{path}-i.{epoch}`
//!
//! Named databases (`tm`, `sky`, `moon`, `mars`) live on `khmdb.google.com`
//! and serve protobuf packets:
//!
//! - manifest: `https://khmdb.google.com/dbRoot.v5?db={db}&hl=en&gl=us&output=proto`
//! - packets: `https://khmdb.google.com/flatfile?db={db}&qp-{path}-q.{epoch}`
//! - dated imagery: `https://khmdb.google.com/flatfile?db={db}&f1-{path}-i.{epoch}-{date}`

use std::fmt;
use std::str::FromStr;

use super::ProviderError;
use crate::codec::PacketFormat;
use crate::packet::ImageDate;

const DEFAULT_HOST: &str = "https://kh.google.com";
const NAMED_HOST: &str = "https://khmdb.google.com";
const MANIFEST_QUERY: &str = "hl=en&gl=us&output=proto";

/// A tile database published by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Database {
    /// Current Earth imagery (binary packets)
    Default,
    /// Historical Earth imagery
    #[default]
    TimeMachine,
    Sky,
    Moon,
    Mars,
}

impl Database {
    pub const ALL: [Database; 5] = [
        Database::Default,
        Database::TimeMachine,
        Database::Sky,
        Database::Moon,
        Database::Mars,
    ];

    /// Short name used in `db=` query parameters.
    pub fn name(&self) -> &'static str {
        match self {
            Database::Default => "default",
            Database::TimeMachine => "tm",
            Database::Sky => "sky",
            Database::Moon => "moon",
            Database::Mars => "mars",
        }
    }

    /// Packet encoding served by this database.
    pub fn format(&self) -> PacketFormat {
        match self {
            Database::Default => PacketFormat::Quantum,
            _ => PacketFormat::Protobuf,
        }
    }

    pub fn dbroot_url(&self) -> String {
        match self {
            Database::Default => format!("{}/dbRoot.v5?&{}", DEFAULT_HOST, MANIFEST_QUERY),
            db => format!(
                "{}/dbRoot.v5?db={}&{}",
                NAMED_HOST,
                db.name(),
                MANIFEST_QUERY
            ),
        }
    }

    /// File name of the cached manifest.
    pub fn dbroot_file_name(&self) -> String {
        match self {
            Database::Default => "dbRoot.v5".to_string(),
            db => format!("dbRoot.v5.{}", db.name()),
        }
    }

    pub fn packet_url(&self, path: &str, epoch: u32) -> String {
        match self {
            Database::Default => format!("{}/flatfile?q2-{}-q.{}", DEFAULT_HOST, path, epoch),
            db => format!(
                "{}/flatfile?db={}&qp-{}-q.{}",
                NAMED_HOST,
                db.name(),
                path,
                epoch
            ),
        }
    }

    /// URL of a dated historical image.
    pub fn history_image_url(&self, path: &str, epoch: u32, date: ImageDate) -> String {
        match self {
            Database::Default => Self::current_image_url(path, epoch),
            db => format!(
                "{}/flatfile?db={}&f1-{}-i.{}-{}",
                NAMED_HOST,
                db.name(),
                path,
                epoch,
                date.hex()
            ),
        }
    }

    /// URL of an image served as current imagery.
    pub fn current_image_url(path: &str, epoch: u32) -> String {
        format!("{}/flatfile?f1-{}-i.{}", DEFAULT_HOST, path, epoch)
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Database {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" | "earth" => Ok(Database::Default),
            "tm" | "timemachine" => Ok(Database::TimeMachine),
            "sky" => Ok(Database::Sky),
            "moon" => Ok(Database::Moon),
            "mars" => Ok(Database::Mars),
            _ => Err(ProviderError::UnknownDatabase(s.to_string())),
        }
    }
}
