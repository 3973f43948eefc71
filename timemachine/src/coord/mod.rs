//! Quadtree addressing module
//!
//! Tiles are addressed by a quadtree path over `{0,1,2,3}` that always starts
//! with the globe root `'0'`. Metadata for the tree is split into packets: the
//! root packet covers levels 0 to 3 and every further packet covers the four
//! levels below a node whose path length is a multiple of four.
//!
//! Two numbering schemes place a node inside its packet:
//!
//! - **root subindex** for the root packet (85 nodes, indices 0..=84)
//! - **tree subindex** for every other packet (341 nodes, index 0 is the
//!   packet's own top node)

mod types;

pub use types::{CoordError, PacketPrefixes, TileAddress, MAX_LEVEL};

/// Number of quadtree levels covered by one packet.
pub const PACKET_DEPTH: usize = 4;

/// Node slots in the root packet (levels 0 to 3).
pub const ROOT_PACKET_NODES: u32 = 85;

/// Node slots in a non-root packet (its top node plus four levels below).
pub const PACKET_NODES: u32 = 341;

/// Subindex of a segment inside the root packet.
///
/// The first character is the packet's own top node and does not contribute.
/// Every following digit `d` advances the index as `idx * 4 + d + 1`.
///
/// Segments are expected to be validated quadtree digits; addresses built
/// through [`TileAddress`] always are.
#[inline]
pub fn root_sub_index(segment: &str) -> u32 {
    segment
        .bytes()
        .skip(1)
        .fold(0u32, |idx, c| idx.wrapping_mul(4).wrapping_add(digit(c) + 1))
}

/// Subindex of a segment inside a non-root packet.
///
/// The leading digit selects one of the four 85-node subtrees below the
/// packet's top node, which itself occupies index 0.
#[inline]
pub fn tree_sub_index(segment: &str) -> u32 {
    match segment.bytes().next() {
        Some(first) => root_sub_index(segment)
            .wrapping_add(digit(first) * ROOT_PACKET_NODES)
            .wrapping_add(1),
        None => 0,
    }
}

#[inline]
fn digit(c: u8) -> u32 {
    u32::from(c.wrapping_sub(b'0'))
}
