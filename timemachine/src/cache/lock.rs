//! Per-key locks over a shared cache directory
//!
//! Two layers guard each key:
//!
//! - an async mutex serializes tasks of this process without tying up threads
//! - an exclusive advisory lock on `<dir>/.locks/<key>.lock` serializes
//!   processes sharing the directory
//!
//! The OS lock call blocks, so it runs on the blocking pool. A process that
//! dies while holding a lock has its lock released by the OS; the next waiter
//! simply acquires it.
//!
//! Lock files outlive their guards. One stays behind for every key that was
//! ever locked until [`AssetCache::invalidate`](super::AssetCache::invalidate)
//! removes it together with the blob.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use fs4::fs_std::FileExt;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{trace, warn};

/// Directory, relative to the cache root, that holds lock files.
pub const LOCK_DIR: &str = ".locks";

type Registry = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Registry of per-key locks for one cache directory.
#[derive(Clone)]
pub struct CacheLocks {
    lock_dir: Option<PathBuf>,
    local: Registry,
}

impl CacheLocks {
    /// Locks coordinated across processes through files under `cache_dir`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            lock_dir: Some(cache_dir.join(LOCK_DIR)),
            local: Arc::new(DashMap::new()),
        }
    }

    /// Locks that only serialize tasks of this process.
    pub fn in_process() -> Self {
        Self {
            lock_dir: None,
            local: Arc::new(DashMap::new()),
        }
    }

    /// Waits until this caller exclusively owns `key`.
    ///
    /// Failure to take the OS lock is logged and the guard proceeds with
    /// only the in-process lock held.
    pub async fn acquire(&self, key: &str) -> CacheLockGuard {
        let mutex = self.local.entry(key.to_string()).or_default().clone();
        let local = mutex.lock_owned().await;

        let file = match self.lock_path(key) {
            Some(path) => lock_file(path).await,
            None => None,
        };
        trace!(key = key, cross_process = file.is_some(), "Cache lock acquired");

        CacheLockGuard {
            key: key.to_string(),
            local: Some(local),
            file,
            registry: Arc::clone(&self.local),
        }
    }

    /// Lock file for `key`, if locks are shared across processes.
    pub fn lock_path(&self, key: &str) -> Option<PathBuf> {
        self.lock_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.lock", key)))
    }

    /// Keys with a live in-process mutex.
    pub fn active(&self) -> usize {
        self.local.len()
    }
}

async fn lock_file(path: PathBuf) -> Option<File> {
    let result = tokio::task::spawn_blocking(move || -> io::Result<File> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(file)
    })
    .await;

    match result {
        Ok(Ok(file)) => Some(file),
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to take cross-process cache lock");
            None
        }
        Err(e) => {
            warn!(error = %e, "Cache lock task failed");
            None
        }
    }
}

/// Holds a key's locks until dropped.
pub struct CacheLockGuard {
    key: String,
    local: Option<OwnedMutexGuard<()>>,
    file: Option<File>,
    registry: Registry,
}

impl CacheLockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the cross-process lock is held.
    pub fn is_cross_process(&self) -> bool {
        self.file.is_some()
    }
}

impl Drop for CacheLockGuard {
    fn drop(&mut self) {
        // Closing the file releases the OS lock
        self.file.take();
        self.local.take();
        self.registry
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
