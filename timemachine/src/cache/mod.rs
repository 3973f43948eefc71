//! On-disk asset cache
//!
//! Downloads are cached in one flat directory that may be shared by several
//! processes. Two kinds of entries live there:
//!
//! - **named singletons** such as the database manifest, refreshed with a
//!   conditional GET on every use ([`AssetCache::get_if_newer`])
//! - **content-addressed blobs** named by the SHA-1 of their URL, which never
//!   change once written ([`AssetCache::get`])
//!
//! Every read or write failure is logged and ignored; the cache can only make
//! a fetch faster, never make it fail.

mod disk;
mod key;
mod lock;

pub use disk::AssetCache;
pub use key::cache_key;
pub use lock::{CacheLockGuard, CacheLocks, LOCK_DIR};
