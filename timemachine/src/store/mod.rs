//! Packet store
//!
//! [`PacketStore`] resolves a [`TileAddress`] to its [`Node`] by walking the
//! packet tree from the root:
//!
//! ```text
//! root packet (epoch from manifest)
//!   └─ node at prefix[0].sub_index() ─ cache_node_epoch ─> packet (prefix[0], epoch)
//!        └─ node at prefix[1].sub_index() ─ ...            ─> packet (prefix[1], epoch)
//!             └─ node at tile.sub_index()
//! ```
//!
//! A zero cache epoch anywhere on the way means the tree stops there and the
//! tile has no node. Packets are fetched through the [`AssetCache`] (which
//! decrypts them before caching) and decoded packets are kept in a
//! [`PacketCache`].

mod error;
mod manifest;
mod node;
mod packet_cache;

pub use error::StoreError;
pub use manifest::Manifest;
pub use node::TileNode;
pub use packet_cache::{PacketCache, PacketKey, DEFAULT_PACKET_TTL, ROOT_PACKET_PATH};

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::cache::AssetCache;
use crate::codec::{decode_packet, PacketContext, PacketDecoder};
use crate::config::StoreConfig;
use crate::coord::TileAddress;
use crate::packet::{DatedTile, Packet};
use crate::provider::{AsyncHttpClient, AsyncReqwestClient, Database};

/// Read access to one tile database.
pub struct PacketStore<C> {
    database: Database,
    assets: AssetCache<C>,
    manifest: Manifest,
    decoder: Box<dyn PacketDecoder>,
    packets: PacketCache,
}

impl PacketStore<AsyncReqwestClient> {
    /// Opens the configured database over HTTPS.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let http = AsyncReqwestClient::with_timeout(config.http_timeout_secs)?;
        let assets = AssetCache::new(Arc::new(http), config.cache_directory.clone());
        Self::open(assets, config).await
    }
}

impl<C: AsyncHttpClient> PacketStore<C> {
    /// Fetches the database manifest and prepares the store.
    ///
    /// The manifest is revalidated against the server on every open.
    pub async fn open(assets: AssetCache<C>, config: &StoreConfig) -> Result<Self, StoreError> {
        let database = config.database;
        let data = assets
            .get_if_newer(&database.dbroot_url(), &database.dbroot_file_name())
            .await?;
        let manifest = Manifest::parse(&data)?;

        info!(
            database = %database,
            format = %database.format(),
            root_epoch = manifest.root_epoch(),
            disk_cache = assets.is_enabled(),
            "Packet store opened"
        );

        Ok(Self {
            database,
            assets,
            manifest,
            decoder: database.format().decoder(),
            packets: PacketCache::new(config.packet_ttl),
        })
    }

    pub fn database(&self) -> Database {
        self.database
    }

    /// Epoch of the root packet.
    pub fn root_epoch(&self) -> u32 {
        self.manifest.root_epoch()
    }

    pub fn assets(&self) -> &AssetCache<C> {
        &self.assets
    }

    /// Resolves the node for `tile`.
    ///
    /// Returns `Ok(None)` when the tree ends above the tile or the final
    /// packet has no node at the tile's subindex.
    pub async fn get_node(&self, tile: &TileAddress) -> Result<Option<TileNode>, StoreError> {
        let mut packet = self.packet(PacketKey::root(self.root_epoch())).await?;

        for prefix in tile.indices() {
            let Some(epoch) = child_packet_epoch(&packet, prefix.sub_index()) else {
                debug!(tile = %tile, at = %prefix, "Packet tree ends above tile");
                return Ok(None);
            };
            packet = self.packet(PacketKey::new(prefix.path(), epoch)).await?;
        }

        Ok(packet
            .node(tile.sub_index())
            .map(|node| TileNode::new(tile.clone(), node.clone(), self.database)))
    }

    /// Resolves the node for a quadtree path such as `"0231"`.
    pub async fn get_node_by_path(&self, path: &str) -> Result<Option<TileNode>, StoreError> {
        let tile = TileAddress::from_path(path)?;
        self.get_node(&tile).await
    }

    /// Convenience for `get_node` followed by [`TileNode::dated_tiles`].
    pub async fn dated_tiles(&self, tile: &TileAddress) -> Result<Vec<DatedTile>, StoreError> {
        Ok(self
            .get_node(tile)
            .await?
            .map(|node| node.dated_tiles().collect())
            .unwrap_or_default())
    }

    /// Downloads (or reads from cache) the decrypted image for a dated tile.
    pub async fn fetch_asset(&self, dated: &DatedTile) -> Result<Bytes, StoreError> {
        let key = self.manifest.key();
        Ok(self
            .assets
            .get(&dated.asset_url, |data| key.apply(data))
            .await?)
    }

    /// Number of decoded packets currently cached in memory.
    pub async fn packets_cached(&self) -> u64 {
        self.packets.len().await
    }

    async fn packet(&self, key: PacketKey) -> Result<Arc<Packet>, StoreError> {
        self.packets
            .get_or_load(key.clone(), self.load_packet(key))
            .await
    }

    async fn load_packet(&self, key: PacketKey) -> Result<Arc<Packet>, StoreError> {
        let url = self.database.packet_url(&key.path, key.epoch);
        debug!(path = %key.path, epoch = key.epoch, "Loading packet");

        let cipher = self.manifest.key();
        let data = self.assets.get(&url, |data| cipher.apply(data)).await?;
        let context = PacketContext {
            root: key.is_root(),
            epoch: key.epoch,
        };

        match decode_packet(self.decoder.as_ref(), &data, context) {
            Ok(packet) => Ok(Arc::new(packet)),
            Err(e) => {
                warn!(url = %url, error = %e, "Discarding undecodable packet");
                self.assets.invalidate(&url).await;
                Err(e.into())
            }
        }
    }
}

/// Epoch of the packet below the node at `index`, if there is one.
fn child_packet_epoch(packet: &Packet, index: u32) -> Option<u32> {
    packet
        .node(index)
        .filter(|node| node.has_child_packet())
        .map(|node| node.cache_node_epoch)
}
