//! Resolved tile metadata

use crate::coord::TileAddress;
use crate::packet::{DatedTile, LayerKind, Node};
use crate::provider::Database;

/// A node together with the tile and database it was resolved for.
#[derive(Debug, Clone, PartialEq)]
pub struct TileNode {
    address: TileAddress,
    node: Node,
    database: Database,
}

impl TileNode {
    pub fn new(address: TileAddress, node: Node, database: Database) -> Self {
        Self {
            address,
            node,
            database,
        }
    }

    pub fn address(&self) -> &TileAddress {
        &self.address
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn database(&self) -> Database {
        self.database
    }

    /// Epoch of the current imagery for this tile, if any.
    pub fn imagery_epoch(&self) -> Option<u32> {
        self.node.layer(LayerKind::Imagery).map(|layer| layer.epoch)
    }

    /// Historical images listed for this tile, in layer order.
    ///
    /// Entries with provider 0 are the current imagery re-listed under a
    /// date; they take the epoch and provider of the node's imagery layer and
    /// point at the current-imagery URL. Such an entry is skipped when the
    /// node has no imagery layer.
    pub fn dated_tiles(&self) -> impl Iterator<Item = DatedTile> + '_ {
        let path = self.address.path();
        let imagery = self.node.layer(LayerKind::Imagery);

        self.node
            .layer(LayerKind::ImageryHistory)
            .into_iter()
            .flat_map(|history| history.dates.iter())
            .filter_map(move |entry| {
                if entry.provider != 0 {
                    return Some(DatedTile {
                        date: entry.date,
                        epoch: entry.epoch,
                        provider: entry.provider,
                        asset_url: self.database.history_image_url(path, entry.epoch, entry.date),
                    });
                }
                imagery.map(|current| DatedTile {
                    date: entry.date,
                    epoch: current.epoch,
                    provider: current.provider,
                    asset_url: Database::current_image_url(path, current.epoch),
                })
            })
    }
}
