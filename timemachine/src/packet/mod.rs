//! Decoded quadtree packet model.
//!
//! Both wire encodings decode into the same logical shape: a packet is a
//! sparse map from subindex to [`Node`], and each node carries the layers and
//! channels available at that tile plus the epoch of the child packet below
//! it (zero when there is none).

mod date;
mod types;

pub use date::{DatedTile, ImageDate};
pub use types::{Channel, DatedEntry, Layer, LayerKind, Node, Packet};
