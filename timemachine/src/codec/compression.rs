//! Packet compression envelope
//!
//! ```text
//! +--------+--------+------------------+
//! | magic  | size   | zlib stream ...  |
//! | u32 LE | u32 LE |                  |
//! +--------+--------+------------------+
//! ```
//!
//! A writer on a big-endian host produces the byte-swapped magic, in which
//! case the size field is byte-swapped too.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::CodecError;

/// Envelope magic as written by a little-endian host.
pub const PACKET_MAGIC: u32 = 0x7468_dead;

/// Envelope magic as written by a big-endian host.
pub const PACKET_MAGIC_SWAPPED: u32 = 0xadde_6874;

/// Largest inflated payload accepted from the network.
pub const MAX_PACKET_SIZE: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = 8;

/// Validates the envelope header and inflates the payload.
///
/// The zlib stream must inflate to exactly the size the header declares.
pub fn decompress_packet(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::InvalidPacketHeader(format!(
            "{} bytes, need at least {}",
            data.len(),
            HEADER_LEN
        )));
    }

    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let raw_size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let size = match magic {
        PACKET_MAGIC => raw_size,
        PACKET_MAGIC_SWAPPED => raw_size.swap_bytes(),
        other => {
            return Err(CodecError::InvalidPacketHeader(format!(
                "unknown magic {:#010x}",
                other
            )))
        }
    } as usize;

    if size > MAX_PACKET_SIZE {
        return Err(CodecError::InvalidPacketData(format!(
            "declared size {} exceeds {}",
            size, MAX_PACKET_SIZE
        )));
    }

    // Read one byte past the declared size so an overlong stream is caught
    let mut payload = Vec::with_capacity(size);
    ZlibDecoder::new(&data[HEADER_LEN..])
        .take(size as u64 + 1)
        .read_to_end(&mut payload)
        .map_err(|e| CodecError::InvalidPacketData(format!("zlib: {}", e)))?;

    if payload.len() != size {
        return Err(CodecError::InvalidPacketData(format!(
            "inflated {} bytes, header declares {}",
            payload.len(),
            size
        )));
    }

    Ok(payload)
}

/// Wraps `payload` in a little-endian envelope.
pub fn compress_packet(payload: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() / 2);
    out.extend_from_slice(&PACKET_MAGIC.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());

    let mut encoder = ZlibEncoder::new(out, Compression::default());
    encoder.write_all(payload)?;
    encoder.finish()
}
