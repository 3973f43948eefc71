//! Packet, node and layer types

use std::collections::HashMap;

use super::ImageDate;

/// A decoded metadata packet covering up to four quadtree levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Packet {
    epoch: u32,
    nodes: HashMap<u32, Node>,
}

impl Packet {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            nodes: HashMap::new(),
        }
    }

    /// Builds a packet from `(subindex, node)` pairs. Later duplicates win.
    pub fn from_nodes(epoch: u32, nodes: impl IntoIterator<Item = (u32, Node)>) -> Self {
        Self {
            epoch,
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Node at `index`, if the packet carries one there.
    pub fn node(&self, index: u32) -> Option<&Node> {
        self.nodes.get(&index)
    }

    pub fn insert(&mut self, index: u32, node: Node) {
        self.nodes.insert(index, node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over `(subindex, node)` pairs in no particular order.
    pub fn nodes(&self) -> impl Iterator<Item = (u32, &Node)> {
        self.nodes.iter().map(|(index, node)| (*index, node))
    }
}

/// Metadata for one tile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    /// Epoch of the child packet rooted at this node; 0 means no child packet.
    pub cache_node_epoch: u32,
    pub layers: Vec<Layer>,
    pub channels: Vec<Channel>,
}

impl Node {
    /// Returns the layer of the given kind, if present.
    pub fn layer(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.kind == kind)
    }

    /// Adds a layer unless one of the same kind is already present.
    ///
    /// Returns `false` when the layer was dropped as a duplicate.
    pub fn push_layer(&mut self, layer: Layer) -> bool {
        if self.layer(layer.kind).is_some() {
            return false;
        }
        self.layers.push(layer);
        true
    }

    pub fn has_child_packet(&self) -> bool {
        self.cache_node_epoch != 0
    }
}

/// Kinds of per-tile data a node can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Current imagery
    Imagery,
    /// Dated historical imagery
    ImageryHistory,
    Terrain,
    Vector,
}

/// One layer of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub epoch: u32,
    pub provider: u32,
    /// Dated entries, only populated for [`LayerKind::ImageryHistory`].
    pub dates: Vec<DatedEntry>,
}

impl Layer {
    pub fn new(kind: LayerKind, epoch: u32, provider: u32) -> Self {
        Self {
            kind,
            epoch,
            provider,
            dates: Vec::new(),
        }
    }

    pub fn with_dates(mut self, dates: Vec<DatedEntry>) -> Self {
        self.dates = dates;
        self
    }
}

/// A historical capture listed in an imagery-history layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatedEntry {
    pub date: ImageDate,
    pub epoch: u32,
    /// Imagery provider id; 0 means the capture is served as current imagery.
    pub provider: u32,
}

/// Auxiliary per-node channel (type id and epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub kind: i32,
    pub epoch: i32,
}
