//! Codec error types

use thiserror::Error;

/// Errors raised while decoding a packet. Each one is fatal for that fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Compression header is short or carries an unknown magic.
    #[error("Invalid packet header: {0}")]
    InvalidPacketHeader(String),

    /// Payload is corrupt or inconsistent with its header.
    #[error("Invalid packet data: {0}")]
    InvalidPacketData(String),

    /// Binary packet does not start with the keyhole magic id.
    #[error("Invalid packet magic: {found} (expected {expected})")]
    InvalidMagic { found: u32, expected: u32 },

    /// Binary packet header describes an impossible layout.
    #[error("Invalid packet header layout: {0}")]
    InvalidHeaderLayout(String),

    /// Cipher key too short for the keystream walk.
    #[error("Invalid XOR key length: {len} bytes (min: {min})")]
    InvalidKeyLength { len: usize, min: usize },
}
