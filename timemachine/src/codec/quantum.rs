//! Binary quantum packet decoder
//!
//! Layout of an inflated packet (all integers little-endian):
//!
//! ```text
//! header (32 bytes)
//!   u32 magic_id            32301
//!   u32 data_type_id
//!   u32 version
//!   i32 num_instances
//!   i32 data_instance_size  32
//!   i32 data_buffer_offset  32 + num_instances * 32
//!   i32 data_buffer_size
//!   i32 meta_buffer_size
//! quanta (num_instances * 32 bytes), pre-order
//!   u8  children  bits 0-3 child present, 4 cache node, 5 vector, 6 imagery, 7 terrain
//!   u8  pad
//!   u16 cnode_version, image_version, terrain_version, num_channels
//!   u16 pad
//!   i32 type_offset, version_offset   into the data buffer
//!   u64 image_neighbors
//!   u8  image_provider, terrain_provider
//!   u16 pad
//! data buffer (i16 channel types and versions)
//! ```

use super::{CodecError, PacketContext, PacketDecoder};
use crate::coord::{root_sub_index, tree_sub_index, PACKET_DEPTH};
use crate::packet::{Channel, Layer, LayerKind, Node, Packet};

/// Magic id at the start of every binary packet.
pub const KEYHOLE_MAGIC: u32 = 32301;

const HEADER_SIZE: usize = 32;
const QUANTUM_SIZE: usize = 32;

const CHILD_MASK: u8 = 0x0F;
const CACHE_NODE_BIT: u8 = 1 << 4;
const VECTOR_BIT: u8 = 1 << 5;
const IMAGERY_BIT: u8 = 1 << 6;
const TERRAIN_BIT: u8 = 1 << 7;

/// Decodes the legacy binary-struct packets served by the default database.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuantumDecoder;

impl PacketDecoder for QuantumDecoder {
    fn decode(&self, payload: &[u8], context: PacketContext) -> Result<Packet, CodecError> {
        let header = Header::parse(payload)?;
        let mut walk = Walk {
            quanta: &payload[HEADER_SIZE..header.data_buffer_offset],
            buffer: &payload
                [header.data_buffer_offset..header.data_buffer_offset + header.data_buffer_size],
            cursor: 0,
            root: context.root,
            packet: Packet::new(context.epoch),
        };

        // The root packet is addressed from the globe node "0"
        let mut segment = String::with_capacity(PACKET_DEPTH + 1);
        if context.root {
            segment.push('0');
        }
        walk.visit(&mut segment)?;
        Ok(walk.packet)
    }
}

struct Header {
    data_buffer_offset: usize,
    data_buffer_size: usize,
}

impl Header {
    fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_SIZE {
            return Err(CodecError::InvalidPacketData(format!(
                "truncated header: {} bytes",
                data.len()
            )));
        }

        let magic = read_u32(data, 0);
        if magic != KEYHOLE_MAGIC {
            return Err(CodecError::InvalidMagic {
                found: magic,
                expected: KEYHOLE_MAGIC,
            });
        }

        let num_instances = read_i32(data, 12);
        let instance_size = read_i32(data, 16);
        let data_buffer_offset = read_i32(data, 20);
        let data_buffer_size = read_i32(data, 24);

        if instance_size != QUANTUM_SIZE as i32 {
            return Err(CodecError::InvalidHeaderLayout(format!(
                "instance size {} (expected {})",
                instance_size, QUANTUM_SIZE
            )));
        }
        if num_instances <= 0 {
            return Err(CodecError::InvalidHeaderLayout(format!(
                "{} instances",
                num_instances
            )));
        }

        let expected_offset = HEADER_SIZE as u64 + num_instances as u64 * QUANTUM_SIZE as u64;
        if data_buffer_offset < 0 || data_buffer_offset as u64 != expected_offset {
            return Err(CodecError::InvalidHeaderLayout(format!(
                "data buffer at {} (expected {})",
                data_buffer_offset, expected_offset
            )));
        }
        if data_buffer_size < 0
            || data_buffer_offset as u64 + data_buffer_size as u64 > data.len() as u64
        {
            return Err(CodecError::InvalidHeaderLayout(format!(
                "data buffer of {} bytes at {} overruns {} byte packet",
                data_buffer_size,
                data_buffer_offset,
                data.len()
            )));
        }

        Ok(Self {
            data_buffer_offset: data_buffer_offset as usize,
            data_buffer_size: data_buffer_size as usize,
        })
    }
}

/// One 32-byte quantum record.
struct Quantum {
    children: u8,
    cnode_version: u16,
    image_version: u16,
    terrain_version: u16,
    num_channels: u16,
    type_offset: i32,
    version_offset: i32,
    image_provider: u8,
    terrain_provider: u8,
}

impl Quantum {
    fn parse(record: &[u8]) -> Self {
        Self {
            children: record[0],
            cnode_version: read_u16(record, 2),
            image_version: read_u16(record, 4),
            terrain_version: read_u16(record, 6),
            num_channels: read_u16(record, 8),
            type_offset: read_i32(record, 12),
            version_offset: read_i32(record, 16),
            image_provider: record[28],
            terrain_provider: record[29],
        }
    }

    fn has_child(&self, quadrant: u8) -> bool {
        self.children & CHILD_MASK & (1 << quadrant) != 0
    }

    fn to_node(&self, buffer: &[u8]) -> Result<Node, CodecError> {
        let mut node = Node {
            cache_node_epoch: if self.children & CACHE_NODE_BIT != 0 {
                u32::from(self.cnode_version)
            } else {
                0
            },
            ..Default::default()
        };

        if self.children & IMAGERY_BIT != 0 {
            node.push_layer(Layer::new(
                LayerKind::Imagery,
                u32::from(self.image_version),
                u32::from(self.image_provider),
            ));
        }
        if self.children & TERRAIN_BIT != 0 {
            node.push_layer(Layer::new(
                LayerKind::Terrain,
                u32::from(self.terrain_version),
                u32::from(self.terrain_provider),
            ));
        }
        if self.children & VECTOR_BIT != 0 {
            node.push_layer(Layer::new(LayerKind::Vector, 0, 0));
        }

        for i in 0..usize::from(self.num_channels) {
            let kind = channel_value(buffer, self.type_offset, i)?;
            let epoch = channel_value(buffer, self.version_offset, i)?;
            node.channels.push(Channel {
                kind: i32::from(kind),
                epoch: i32::from(epoch),
            });
        }

        Ok(node)
    }
}

/// Pre-order walk over the quantum table.
struct Walk<'a> {
    quanta: &'a [u8],
    buffer: &'a [u8],
    cursor: usize,
    root: bool,
    packet: Packet,
}

impl Walk<'_> {
    fn visit(&mut self, segment: &mut String) -> Result<(), CodecError> {
        let quantum = self.next_quantum()?;
        let index = if self.root {
            root_sub_index(segment)
        } else if segment.is_empty() {
            0
        } else {
            tree_sub_index(segment)
        };
        self.packet.insert(index, quantum.to_node(self.buffer)?);

        if segment.len() >= PACKET_DEPTH {
            return Ok(());
        }
        for quadrant in 0..4u8 {
            if quantum.has_child(quadrant) {
                segment.push(char::from(b'0' + quadrant));
                self.visit(segment)?;
                segment.pop();
            }
        }
        Ok(())
    }

    fn next_quantum(&mut self) -> Result<Quantum, CodecError> {
        let start = self.cursor * QUANTUM_SIZE;
        let record = self
            .quanta
            .get(start..start + QUANTUM_SIZE)
            .ok_or_else(|| {
                CodecError::InvalidPacketData(format!(
                    "child flags reference quantum {} of {}",
                    self.cursor,
                    self.quanta.len() / QUANTUM_SIZE
                ))
            })?;
        self.cursor += 1;
        Ok(Quantum::parse(record))
    }
}

fn channel_value(buffer: &[u8], offset: i32, i: usize) -> Result<i16, CodecError> {
    let at = usize::try_from(offset)
        .ok()
        .and_then(|offset| offset.checked_add(i * 2));
    match at.and_then(|at| buffer.get(at..at + 2)) {
        Some(bytes) => Ok(i16::from_le_bytes([bytes[0], bytes[1]])),
        None => Err(CodecError::InvalidHeaderLayout(format!(
            "channel table offset {} entry {} outside {} byte data buffer",
            offset,
            i,
            buffer.len()
        ))),
    }
}

#[inline]
fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

#[inline]
fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

#[inline]
fn read_i32(data: &[u8], at: usize) -> i32 {
    read_u32(data, at) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A quantum record as written by the packet builder.
    #[derive(Default, Clone)]
    struct Record {
        children: u8,
        cnode_version: u16,
        image_version: u16,
        terrain_version: u16,
        image_provider: u8,
        terrain_provider: u8,
        channels: Vec<(i16, i16)>,
    }

    /// Serializes records in the given (pre-order) sequence.
    fn build_packet(records: &[Record]) -> Vec<u8> {
        let n = records.len();
        let mut types = Vec::new();
        let mut versions = Vec::new();
        let mut offsets = Vec::new();
        for record in records {
            offsets.push(types.len() * 2);
            for (kind, version) in &record.channels {
                types.push(*kind);
                versions.push(*version);
            }
        }
        let version_base = types.len() * 2;

        let mut buffer = Vec::new();
        for value in types.iter().chain(versions.iter()) {
            buffer.extend_from_slice(&value.to_le_bytes());
        }

        let mut out = Vec::new();
        for value in [
            KEYHOLE_MAGIC as i32,
            1,
            2,
            n as i32,
            QUANTUM_SIZE as i32,
            (HEADER_SIZE + n * QUANTUM_SIZE) as i32,
            buffer.len() as i32,
            0,
        ] {
            out.extend_from_slice(&value.to_le_bytes());
        }

        for (record, type_offset) in records.iter().zip(offsets) {
            out.push(record.children);
            out.push(0);
            out.extend_from_slice(&record.cnode_version.to_le_bytes());
            out.extend_from_slice(&record.image_version.to_le_bytes());
            out.extend_from_slice(&record.terrain_version.to_le_bytes());
            out.extend_from_slice(&(record.channels.len() as u16).to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&(type_offset as i32).to_le_bytes());
            out.extend_from_slice(&((version_base + type_offset) as i32).to_le_bytes());
            out.extend_from_slice(&0u64.to_le_bytes());
            out.push(record.image_provider);
            out.push(record.terrain_provider);
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out.extend_from_slice(&buffer);
        out
    }

    fn root() -> PacketContext {
        PacketContext {
            root: true,
            epoch: 11,
        }
    }

    fn non_root() -> PacketContext {
        PacketContext {
            root: false,
            epoch: 22,
        }
    }

    #[test]
    fn test_root_packet_preorder_indices() {
        // "0" has children 1 and 3; "01" has child 2
        let records = vec![
            Record {
                children: 0b1010 | IMAGERY_BIT,
                image_version: 100,
                image_provider: 7,
                ..Default::default()
            },
            Record {
                children: 0b0100 | CACHE_NODE_BIT,
                cnode_version: 5,
                ..Default::default()
            },
            Record {
                children: TERRAIN_BIT,
                terrain_version: 9,
                terrain_provider: 3,
                ..Default::default()
            },
            Record::default(),
        ];

        let packet = QuantumDecoder.decode(&build_packet(&records), root()).unwrap();
        assert_eq!(packet.epoch(), 11);
        assert_eq!(packet.len(), 4);

        let top = packet.node(root_sub_index("0")).unwrap();
        let imagery = top.layer(LayerKind::Imagery).unwrap();
        assert_eq!((imagery.epoch, imagery.provider), (100, 7));
        assert_eq!(top.cache_node_epoch, 0);

        let n01 = packet.node(root_sub_index("01")).unwrap();
        assert_eq!(n01.cache_node_epoch, 5);

        let n012 = packet.node(root_sub_index("012")).unwrap();
        let terrain = n012.layer(LayerKind::Terrain).unwrap();
        assert_eq!((terrain.epoch, terrain.provider), (9, 3));

        assert!(packet.node(root_sub_index("03")).is_some());
    }

    #[test]
    fn test_cnode_version_ignored_without_cache_bit() {
        let records = vec![Record {
            cnode_version: 77,
            ..Default::default()
        }];
        let packet = QuantumDecoder.decode(&build_packet(&records), root()).unwrap();
        assert_eq!(packet.node(0).unwrap().cache_node_epoch, 0);
    }

    #[test]
    fn test_root_packet_stops_at_level_3() {
        // A chain "0" -> "00" -> "000" -> "0000"; the last node claims a child
        // that must not be read because the root packet ends at level 3.
        let records = vec![
            Record {
                children: 0b0001,
                ..Default::default()
            },
            Record {
                children: 0b0001,
                ..Default::default()
            },
            Record {
                children: 0b0001,
                ..Default::default()
            },
            Record {
                children: 0b0001 | CACHE_NODE_BIT,
                cnode_version: 3,
                ..Default::default()
            },
        ];
        let packet = QuantumDecoder.decode(&build_packet(&records), root()).unwrap();
        assert_eq!(packet.len(), 4);
        assert_eq!(
            packet.node(root_sub_index("0000")).unwrap().cache_node_epoch,
            3
        );
    }

    #[test]
    fn test_non_root_packet_uses_tree_indices() {
        // top -> "2" -> "23" -> "230" -> "2301" (four levels below the top)
        let mut records = vec![
            Record {
                children: 0b0100,
                ..Default::default()
            },
            Record {
                children: 0b1000,
                ..Default::default()
            },
            Record {
                children: 0b0001,
                ..Default::default()
            },
            Record {
                children: 0b0010,
                ..Default::default()
            },
        ];
        records.push(Record {
            children: 0b1111 | CACHE_NODE_BIT | VECTOR_BIT,
            cnode_version: 12,
            ..Default::default()
        });

        let packet = QuantumDecoder
            .decode(&build_packet(&records), non_root())
            .unwrap();
        assert_eq!(packet.epoch(), 22);
        assert!(packet.node(0).is_some());
        assert!(packet.node(tree_sub_index("2")).is_some());
        assert!(packet.node(tree_sub_index("23")).is_some());
        assert!(packet.node(tree_sub_index("230")).is_some());

        let leaf = packet.node(tree_sub_index("2301")).unwrap();
        assert_eq!(leaf.cache_node_epoch, 12);
        assert!(leaf.layer(LayerKind::Vector).is_some());
    }

    #[test]
    fn test_channels_are_read_from_data_buffer() {
        let records = vec![
            Record {
                children: 0b0001,
                channels: vec![(2, 40), (8, 41)],
                ..Default::default()
            },
            Record {
                channels: vec![(5, -1)],
                ..Default::default()
            },
        ];
        let packet = QuantumDecoder
            .decode(&build_packet(&records), non_root())
            .unwrap();

        assert_eq!(
            packet.node(0).unwrap().channels,
            vec![Channel { kind: 2, epoch: 40 }, Channel { kind: 8, epoch: 41 }]
        );
        assert_eq!(
            packet.node(tree_sub_index("0")).unwrap().channels,
            vec![Channel { kind: 5, epoch: -1 }]
        );
    }

    #[test]
    fn test_missing_quantum_is_invalid_data() {
        let records = vec![Record {
            children: 0b0011,
            ..Default::default()
        }];
        let result = QuantumDecoder.decode(&build_packet(&records), root());
        assert!(matches!(result, Err(CodecError::InvalidPacketData(_))));
    }

    #[test]
    fn test_wrong_magic() {
        let mut data = build_packet(&[Record::default()]);
        data[0] = 0;
        assert!(matches!(
            QuantumDecoder.decode(&data, root()),
            Err(CodecError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn test_inconsistent_buffer_offset() {
        let mut data = build_packet(&[Record::default()]);
        data[20..24].copy_from_slice(&48i32.to_le_bytes());
        assert!(matches!(
            QuantumDecoder.decode(&data, root()),
            Err(CodecError::InvalidHeaderLayout(_))
        ));
    }

    #[test]
    fn test_wrong_instance_size() {
        let mut data = build_packet(&[Record::default()]);
        data[16..20].copy_from_slice(&24i32.to_le_bytes());
        assert!(matches!(
            QuantumDecoder.decode(&data, root()),
            Err(CodecError::InvalidHeaderLayout(_))
        ));
    }

    #[test]
    fn test_data_buffer_overrun() {
        let mut data = build_packet(&[Record::default()]);
        data[24..28].copy_from_slice(&1000i32.to_le_bytes());
        assert!(matches!(
            QuantumDecoder.decode(&data, root()),
            Err(CodecError::InvalidHeaderLayout(_))
        ));
    }

    #[test]
    fn test_channel_offset_outside_buffer() {
        let mut data = build_packet(&[Record {
            channels: vec![(1, 1)],
            ..Default::default()
        }]);
        // type_offset of the first quantum
        data[HEADER_SIZE + 12..HEADER_SIZE + 16].copy_from_slice(&64i32.to_le_bytes());
        assert!(matches!(
            QuantumDecoder.decode(&data, root()),
            Err(CodecError::InvalidHeaderLayout(_))
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            QuantumDecoder.decode(&[0u8; 10], root()),
            Err(CodecError::InvalidPacketData(_))
        ));
    }
}
