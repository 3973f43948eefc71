//! Packet wire decoding.
//!
//! Every packet travels as `XOR-encrypted( header + zlib(payload) )`. Decoding
//! is a fixed three step pipeline:
//!
//! 1. [`XorKey::apply`] undoes the session cipher
//! 2. [`decompress_packet`] validates the header and inflates the payload
//! 3. a [`PacketDecoder`] turns the payload into a [`Packet`]
//!
//! Decryption happens when a download is cached, so cached packets are stored
//! in the clear and [`decode_packet`] covers the remaining two steps.
//!
//! The payload comes in two encodings. The default database serves a legacy
//! binary-struct layout ([`QuantumDecoder`]); the named databases serve
//! protobuf ([`ProtobufDecoder`]). The store picks one decoder when it is
//! built and never branches on the format again.

mod cipher;
mod compression;
mod error;
pub mod proto;
mod protobuf;
mod quantum;

pub use cipher::{XorKey, MIN_KEY_LEN};
pub use compression::{
    compress_packet, decompress_packet, MAX_PACKET_SIZE, PACKET_MAGIC, PACKET_MAGIC_SWAPPED,
};
pub use error::CodecError;
pub use protobuf::ProtobufDecoder;
pub use quantum::{QuantumDecoder, KEYHOLE_MAGIC};

use std::fmt;

use crate::packet::Packet;

/// Where a packet sits in the tree, needed by formats that carry no such
/// information on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketContext {
    /// The root packet uses root subindices and covers one level less.
    pub root: bool,
    /// Epoch the packet was requested with.
    pub epoch: u32,
}

/// Payload encoding served by a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketFormat {
    /// Fixed-size binary quantum records
    Quantum,
    /// Protobuf `QuadtreePacket` messages
    Protobuf,
}

impl PacketFormat {
    /// Builds the decoder for this format.
    pub fn decoder(self) -> Box<dyn PacketDecoder> {
        match self {
            PacketFormat::Quantum => Box::new(QuantumDecoder),
            PacketFormat::Protobuf => Box::new(ProtobufDecoder),
        }
    }
}

impl fmt::Display for PacketFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketFormat::Quantum => write!(f, "quantum"),
            PacketFormat::Protobuf => write!(f, "protobuf"),
        }
    }
}

/// Parses an inflated packet payload.
pub trait PacketDecoder: Send + Sync + fmt::Debug {
    fn decode(&self, payload: &[u8], context: PacketContext) -> Result<Packet, CodecError>;
}

/// Inflates and parses a decrypted packet.
pub fn decode_packet(
    decoder: &dyn PacketDecoder,
    data: &[u8],
    context: PacketContext,
) -> Result<Packet, CodecError> {
    let payload = decompress_packet(data)?;
    decoder.decode(&payload, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_encrypt_decrypt_decode_pipeline() {
        let key = XorKey::new((0..64u8).collect::<Vec<_>>()).unwrap();
        let message = proto::QuadtreePacket {
            packet_epoch: 5,
            sparse_quadtree_node: vec![proto::quadtree_packet::SparseQuadtreeNode {
                index: 0,
                node: Some(proto::QuadtreeNode {
                    cache_node_epoch: Some(9),
                    ..Default::default()
                }),
            }],
        };
        let mut wire = compress_packet(&message.encode_to_vec()).unwrap();
        // Encrypt as served, then decrypt as the asset cache does
        key.apply(&mut wire);
        key.apply(&mut wire);

        let decoder = PacketFormat::Protobuf.decoder();
        let packet = decode_packet(
            decoder.as_ref(),
            &wire,
            PacketContext {
                root: true,
                epoch: 5,
            },
        )
        .unwrap();

        assert_eq!(packet.epoch(), 5);
        assert_eq!(packet.node(0).unwrap().cache_node_epoch, 9);
    }

    #[test]
    fn test_wrong_key_breaks_envelope_header() {
        let key = XorKey::new(vec![0x11; 32]).unwrap();
        let other = XorKey::new(vec![0x22; 32]).unwrap();
        let mut wire = compress_packet(b"payload").unwrap();
        key.apply(&mut wire);
        other.apply(&mut wire);

        let decoder = PacketFormat::Quantum.decoder();
        let result = decode_packet(
            decoder.as_ref(),
            &wire,
            PacketContext {
                root: true,
                epoch: 1,
            },
        );
        assert!(matches!(result, Err(CodecError::InvalidPacketHeader(_))));
    }
}
