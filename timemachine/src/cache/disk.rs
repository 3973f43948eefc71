//! Asset cache backed by a directory

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use filetime::FileTime;
use tracing::{debug, trace, warn};

use super::key::cache_key;
use super::lock::CacheLocks;
use crate::provider::{AsyncHttpClient, ConditionalResponse, HttpResponse, ProviderError};

/// Network fetches with an optional disk cache in front.
///
/// With no directory configured every call goes straight to the network.
pub struct AssetCache<C> {
    http: Arc<C>,
    directory: Option<PathBuf>,
    locks: CacheLocks,
}

impl<C: AsyncHttpClient> AssetCache<C> {
    /// Creates a cache in `directory`, or a pass-through when `None`.
    pub fn new(http: Arc<C>, directory: Option<PathBuf>) -> Self {
        let locks = match &directory {
            Some(dir) => CacheLocks::new(dir),
            None => CacheLocks::in_process(),
        };
        Self {
            http,
            directory,
            locks,
        }
    }

    /// Creates a pass-through cache.
    pub fn disabled(http: Arc<C>) -> Self {
        Self::new(http, None)
    }

    pub fn is_enabled(&self) -> bool {
        self.directory.is_some()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn http(&self) -> &Arc<C> {
        &self.http
    }

    /// Fetches a named resource, revalidating any cached copy.
    ///
    /// A cached copy is offered to the server through `If-Modified-Since`
    /// (its file mtime). On 304 the cached bytes are returned; otherwise the
    /// new body replaces the file and the file mtime is set from the
    /// response's `Last-Modified`.
    pub async fn get_if_newer(&self, url: &str, name: &str) -> Result<Bytes, ProviderError> {
        let Some(dir) = &self.directory else {
            return Ok(self.http.get(url).await?.body);
        };
        let path = dir.join(name);
        let _guard = self.locks.acquire(name).await;

        if let Some(since) = cached_mtime(path.clone()).await {
            match self.http.get_if_modified_since(url, since).await? {
                ConditionalResponse::NotModified => {
                    if let Some(body) = read_cached(path.clone()).await {
                        debug!(name = name, "Cached copy is current");
                        return Ok(body);
                    }
                    warn!(name = name, "Cached copy vanished after revalidation, refetching");
                }
                ConditionalResponse::Modified(response) => {
                    debug!(name = name, "Remote copy is newer");
                    write_cached(path, response.body.clone(), response.last_modified).await;
                    return Ok(response.body);
                }
            }
        }

        let HttpResponse {
            body,
            last_modified,
        } = self.http.get(url).await?;
        write_cached(path, body.clone(), last_modified).await;
        Ok(body)
    }

    /// Fetches an immutable resource by URL.
    ///
    /// A non-empty cached blob is returned as-is. Otherwise the body is
    /// downloaded, passed through `post_process`, persisted and returned. The
    /// transformed bytes are what the cache stores.
    pub async fn get<F>(&self, url: &str, post_process: F) -> Result<Bytes, ProviderError>
    where
        F: FnOnce(&mut Vec<u8>) + Send,
    {
        let Some(dir) = &self.directory else {
            return download(self.http.as_ref(), url, post_process).await;
        };
        let key = cache_key(url);
        let path = dir.join(&key);
        let _guard = self.locks.acquire(&key).await;

        if let Some(body) = read_cached(path.clone()).await {
            trace!(url = url, key = %key, "Asset cache hit");
            return Ok(body);
        }

        trace!(url = url, key = %key, "Asset cache miss");
        let body = download(self.http.as_ref(), url, post_process).await?;
        write_cached(path, body.clone(), None).await;
        Ok(body)
    }

    /// Drops the cached blob for `url`, e.g. after it failed to decode.
    pub async fn invalidate(&self, url: &str) {
        let Some(dir) = &self.directory else {
            return;
        };
        let key = cache_key(url);
        let path = dir.join(&key);
        let lock_path = self.locks.lock_path(&key);
        let _guard = self.locks.acquire(&key).await;

        let result = tokio::task::spawn_blocking(move || {
            // Unlinking an open lock file leaves our held lock intact
            if let Some(lock_path) = lock_path {
                if let Err(e) = std::fs::remove_file(&lock_path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!(error = %e, "Failed to remove lock file");
                    }
                }
            }
            std::fs::remove_file(path)
        })
        .await;
        match result {
            Ok(Ok(())) => debug!(url = url, "Cached asset invalidated"),
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {}
            Ok(Err(e)) => warn!(url = url, error = %e, "Failed to invalidate cached asset"),
            Err(e) => warn!(url = url, error = %e, "Cache invalidation task failed"),
        }
    }
}

async fn download<C, F>(http: &C, url: &str, post_process: F) -> Result<Bytes, ProviderError>
where
    C: AsyncHttpClient,
    F: FnOnce(&mut Vec<u8>),
{
    let mut body = http.get(url).await?.body.to_vec();
    post_process(&mut body);
    Ok(Bytes::from(body))
}

/// Modification time of a non-empty cached file.
async fn cached_mtime(path: PathBuf) -> Option<SystemTime> {
    tokio::task::spawn_blocking(move || {
        let metadata = std::fs::metadata(&path).ok()?;
        if metadata.len() == 0 {
            return None;
        }
        metadata.modified().ok()
    })
    .await
    .ok()
    .flatten()
}

/// Contents of a non-empty cached file.
async fn read_cached(path: PathBuf) -> Option<Bytes> {
    let result = tokio::task::spawn_blocking(move || match std::fs::read(&path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err((path, e)),
    })
    .await;

    match result {
        Ok(Ok(data)) if !data.is_empty() => Some(Bytes::from(data)),
        Ok(Ok(_)) => None,
        Ok(Err((path, e))) => {
            warn!(path = %path.display(), error = %e, "Failed to read cache file");
            None
        }
        Err(e) => {
            warn!(error = %e, "Cache read task failed");
            None
        }
    }
}

/// Persists `body` through a temporary file and rename.
async fn write_cached(path: PathBuf, body: Bytes, modified: Option<SystemTime>) {
    let shown = path.display().to_string();
    let result = tokio::task::spawn_blocking(move || write_file(&path, &body, modified)).await;

    match result {
        Ok(Ok(())) => trace!(path = %shown, "Cache file written"),
        Ok(Err(e)) => warn!(path = %shown, error = %e, "Failed to write cache file"),
        Err(e) => warn!(path = %shown, error = %e, "Cache write task failed"),
    }
}

fn write_file(path: &Path, body: &[u8], modified: Option<SystemTime>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{}.tmp", std::process::id()));
    let temp = PathBuf::from(temp);

    std::fs::write(&temp, body)?;
    if let Some(modified) = modified {
        filetime::set_file_mtime(&temp, FileTime::from_system_time(modified))?;
    }
    std::fs::rename(&temp, path).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LOCK_DIR;
    use crate::provider::MockAsyncHttpClient;
    use std::time::Duration;

    const MANIFEST_URL: &str = "http://test/dbRoot.v5";
    const BLOB_URL: &str = "http://test/flatfile?qp-0-q.1";

    fn modified_at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[tokio::test]
    async fn test_write_cached_replaces_file_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blob");

        write_cached(path.clone(), Bytes::from_static(b"first"), None).await;
        write_cached(path.clone(), Bytes::from_static(b"second"), Some(modified_at(1_000))).await;

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert_eq!(
            std::fs::metadata(&path).unwrap().modified().unwrap(),
            modified_at(1_000)
        );
        let entries = std::fs::read_dir(dir.path().join("nested")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[tokio::test]
    async fn test_get_if_newer_first_fetch_sets_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(MANIFEST_URL, b"v1".to_vec(), Some(modified_at(1_600_000_000)));
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));

        let body = cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();
        assert_eq!(&body[..], b"v1");

        let path = dir.path().join("dbRoot.v5");
        assert_eq!(std::fs::read(&path).unwrap(), b"v1");
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(mtime, modified_at(1_600_000_000));
    }

    #[tokio::test]
    async fn test_get_if_newer_not_modified_serves_cached_copy() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(MANIFEST_URL, b"v1".to_vec(), Some(modified_at(1_600_000_000)));
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));

        cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();
        // Server still has v1 but would now serve different bytes if asked unconditionally
        http.route(MANIFEST_URL, b"other".to_vec(), Some(modified_at(1_600_000_000)));

        let body = cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();
        assert_eq!(&body[..], b"v1");
        assert_eq!(http.last_since(), Some(modified_at(1_600_000_000)));
        assert_eq!(http.calls_to(MANIFEST_URL), 2);
    }

    #[tokio::test]
    async fn test_get_if_newer_replaces_stale_copy() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(MANIFEST_URL, b"v1".to_vec(), Some(modified_at(1_600_000_000)));
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));
        cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();

        http.route(MANIFEST_URL, b"v2".to_vec(), Some(modified_at(1_700_000_000)));
        let body = cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();

        assert_eq!(&body[..], b"v2");
        assert_eq!(std::fs::read(dir.path().join("dbRoot.v5")).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_get_caches_post_processed_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, vec![1u8, 2, 3], None);
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));

        let invert = |data: &mut Vec<u8>| data.iter_mut().for_each(|b| *b = !*b);
        let first = cache.get(BLOB_URL, invert).await.unwrap();
        let second = cache.get(BLOB_URL, invert).await.unwrap();

        assert_eq!(&first[..], &[!1u8, !2, !3]);
        assert_eq!(first, second);
        assert_eq!(http.calls_to(BLOB_URL), 1);
        assert!(dir.path().join(cache_key(BLOB_URL)).exists());
    }

    #[tokio::test]
    async fn test_get_ignores_empty_cached_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(cache_key(BLOB_URL)), b"").unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"data".to_vec(), None);
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));

        let body = cache.get(BLOB_URL, |_| {}).await.unwrap();
        assert_eq!(&body[..], b"data");
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_get_downloads_once() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"shared".to_vec(), None);
        let cache = Arc::new(AssetCache::new(
            Arc::clone(&http),
            Some(dir.path().to_path_buf()),
        ));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get(BLOB_URL, |_| {}).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(&task.await.unwrap().unwrap()[..], b"shared");
        }
        assert_eq!(http.calls_to(BLOB_URL), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_hits_network() {
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"x".to_vec(), None);
        http.route(MANIFEST_URL, b"m".to_vec(), Some(modified_at(1)));
        let cache = AssetCache::disabled(Arc::clone(&http));
        assert!(!cache.is_enabled());

        cache.get(BLOB_URL, |_| {}).await.unwrap();
        cache.get(BLOB_URL, |_| {}).await.unwrap();
        cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();
        cache.get_if_newer(MANIFEST_URL, "dbRoot.v5").await.unwrap();

        assert_eq!(http.calls(), 4);
        assert_eq!(http.last_since(), None);
    }

    #[tokio::test]
    async fn test_unwritable_directory_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A file in place of the cache directory makes every write fail
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"").unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"ok".to_vec(), None);
        let cache = AssetCache::new(Arc::clone(&http), Some(blocked));

        let body = cache.get(BLOB_URL, |_| {}).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_http_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        let cache = AssetCache::new(http, Some(dir.path().to_path_buf()));

        let result = cache.get("http://test/missing", |_| {}).await;
        assert!(matches!(
            result,
            Err(ProviderError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalidate_removes_blob() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"v".to_vec(), None);
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));

        cache.get(BLOB_URL, |_| {}).await.unwrap();
        cache.invalidate(BLOB_URL).await;
        assert!(!dir.path().join(cache_key(BLOB_URL)).exists());

        cache.get(BLOB_URL, |_| {}).await.unwrap();
        assert_eq!(http.calls_to(BLOB_URL), 2);
    }

    #[tokio::test]
    async fn test_invalidate_removes_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let http = Arc::new(MockAsyncHttpClient::new());
        http.route(BLOB_URL, b"v".to_vec(), None);
        let cache = AssetCache::new(Arc::clone(&http), Some(dir.path().to_path_buf()));
        let lock_file = dir
            .path()
            .join(LOCK_DIR)
            .join(format!("{}.lock", cache_key(BLOB_URL)));

        cache.get(BLOB_URL, |_| {}).await.unwrap();
        assert!(lock_file.exists());

        cache.invalidate(BLOB_URL).await;
        assert!(!lock_file.exists());
        assert!(!dir.path().join(cache_key(BLOB_URL)).exists());
    }
}
