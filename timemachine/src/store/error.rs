//! Store error types

use thiserror::Error;

use crate::codec::CodecError;
use crate::coord::CoordError;
use crate::provider::ProviderError;

/// Errors raised by [`PacketStore`](super::PacketStore).
///
/// Cloneable so a single failed packet load can be reported to every caller
/// that was waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Tile path could not be parsed.
    #[error("Invalid tile address: {0}")]
    Coord(#[from] CoordError),

    /// Packet or manifest failed to decode.
    #[error("Decode error: {0}")]
    Codec(#[from] CodecError),

    /// Network fetch failed.
    #[error("Fetch error: {0}")]
    Provider(#[from] ProviderError),

    /// Manifest decoded but lacks a required field.
    #[error("Invalid database manifest: {0}")]
    Manifest(String),
}
