//! In-memory packet cache
//!
//! Packets are keyed by `(path, epoch)` and expire after sitting unused for
//! the configured time-to-idle. Concurrent requests for a packet that is not
//! cached yet share one load: the first caller runs it and every other caller
//! waits for its result, success or failure.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache as MokaCache;
use parking_lot::Mutex;
use tracing::trace;

use super::StoreError;
use crate::packet::Packet;

/// Default idle expiry for cached packets.
pub const DEFAULT_PACKET_TTL: Duration = Duration::from_secs(2);

/// Path of the root packet.
pub const ROOT_PACKET_PATH: &str = "0";

/// Identity of a packet on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PacketKey {
    pub path: String,
    pub epoch: u32,
}

impl PacketKey {
    pub fn new(path: impl Into<String>, epoch: u32) -> Self {
        Self {
            path: path.into(),
            epoch,
        }
    }

    pub fn root(epoch: u32) -> Self {
        Self::new(ROOT_PACKET_PATH, epoch)
    }

    pub fn is_root(&self) -> bool {
        self.path == ROOT_PACKET_PATH
    }
}

/// Decoded packets with shared in-flight loads and sliding expiration.
pub struct PacketCache {
    cache: MokaCache<PacketKey, Arc<Packet>>,
    ttl: Duration,
    /// When expired entries were last swept.
    last_compaction: Mutex<Instant>,
}

impl PacketCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: MokaCache::builder().time_to_idle(ttl).build(),
            ttl,
            last_compaction: Mutex::new(Instant::now()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached packet or runs `load` to produce it.
    ///
    /// Only one `load` runs per key at a time; a failed load is not cached.
    pub async fn get_or_load<F>(&self, key: PacketKey, load: F) -> Result<Arc<Packet>, StoreError>
    where
        F: Future<Output = Result<Arc<Packet>, StoreError>>,
    {
        self.maybe_compact().await;
        self.cache
            .try_get_with(key, load)
            .await
            .map_err(|e| (*e).clone())
    }

    pub fn contains(&self, key: &PacketKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Number of live entries after flushing pending maintenance.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sweeps expired entries at most once per TTL window.
    async fn maybe_compact(&self) {
        let due = {
            let mut last = self.last_compaction.lock();
            if last.elapsed() >= self.ttl {
                *last = Instant::now();
                true
            } else {
                false
            }
        };

        if due {
            self.cache.run_pending_tasks().await;
            trace!(entries = self.cache.entry_count(), "Packet cache compacted");
        }
    }
}

impl Default for PacketCache {
    fn default() -> Self {
        Self::new(DEFAULT_PACKET_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_concurrent_loads_share_one_call() {
        let cache = Arc::new(PacketCache::new(Duration::from_secs(60)));
        let loads = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let loads = Arc::clone(&loads);
                tokio::spawn(async move {
                    cache
                        .get_or_load(PacketKey::root(7), async move {
                            loads.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok(Arc::new(Packet::new(7)))
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().epoch(), 7);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.contains(&PacketKey::root(7)));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached() {
        let cache = PacketCache::default();
        let key = PacketKey::new("0123", 3);

        let err = cache
            .get_or_load(key.clone(), async {
                Err(StoreError::Provider(ProviderError::HttpError(
                    "boom".to_string(),
                )))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Provider(_)));
        assert!(!cache.contains(&key));

        let packet = cache
            .get_or_load(key.clone(), async { Ok(Arc::new(Packet::new(3))) })
            .await
            .unwrap();
        assert_eq!(packet.epoch(), 3);
    }

    #[tokio::test]
    async fn test_epoch_is_part_of_the_key() {
        let cache = PacketCache::default();
        cache
            .get_or_load(PacketKey::new("0123", 1), async {
                Ok(Arc::new(Packet::new(1)))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_load(PacketKey::new("0123", 2), async {
                Ok(Arc::new(Packet::new(2)))
            })
            .await
            .unwrap();
        assert_eq!(second.epoch(), 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_idle_entries_expire() {
        let cache = PacketCache::new(Duration::from_millis(50));
        let key = PacketKey::root(1);
        cache
            .get_or_load(key.clone(), async { Ok(Arc::new(Packet::new(1))) })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!cache.contains(&key));
        assert!(cache.is_empty().await);
    }

    #[test]
    fn test_root_key() {
        assert!(PacketKey::root(5).is_root());
        assert!(!PacketKey::new("0123", 5).is_root());
    }
}
