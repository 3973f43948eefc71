//! Timemachine - read access to Google Earth's historical imagery tile store
//!
//! The library resolves quadtree tile addresses to their metadata nodes by
//! walking the service's packet tree, lists the dated historical images a node
//! carries, and downloads them through a shared on-disk cache.
//!
//! # Layers
//!
//! - [`coord`]: quadtree paths and the packet subindex arithmetic
//! - [`codec`]: XOR envelope, zlib framing and the two packet encodings
//! - [`packet`]: decoded packet and node model
//! - [`provider`]: database endpoints and the HTTP transport
//! - [`cache`]: content-addressed disk cache with cross-process locking
//! - [`store`]: packet tree traversal with an in-memory packet cache
//! - [`scheduler`]: bounded-concurrency processing of async jobs
//!
//! # Example
//!
//! ```no_run
//! use timemachine::{PacketStore, StoreConfig, TileAddress};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PacketStore::connect(&StoreConfig::default()).await?;
//! let tile = TileAddress::from_row_col_level(1204, 3506, 12)?;
//! for dated in store.dated_tiles(&tile).await? {
//!     let image = store.fetch_asset(&dated).await?;
//!     println!("{} {} bytes", dated.date, image.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod coord;
pub mod logging;
pub mod packet;
pub mod provider;
pub mod scheduler;
pub mod store;

pub use cache::AssetCache;
pub use config::{ConfigFile, StoreConfig};
pub use coord::TileAddress;
pub use packet::{DatedTile, ImageDate};
pub use provider::{AsyncHttpClient, AsyncReqwestClient, Database};
pub use scheduler::{Parallelism, ParallelProcessor};
pub use store::{PacketStore, StoreError, TileNode};
