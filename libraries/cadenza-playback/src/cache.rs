//! Stream prefetch cache
//!
//! Downloads the first bytes of upcoming streams to disk so the next track
//! starts without waiting on the network. Entries are keyed by stream
//! locator, evicted least-recently-used once the byte budget is exceeded,
//! and always optional: any miss or read problem falls back to streaming.
//!
//! Only the network fetch of a download can be aborted. Writing runs on the
//! blocking pool through to its epoch check, so a download cancelled mid-write
//! deletes its own file instead of leaving unaccounted bytes behind. Files
//! land in a `.part` file and are renamed into place before the index learns
//! about them.

use crate::output::StreamSource;
use crate::types::StreamCacheConfig;
use cadenza_core::StreamFetcher;
use lru::LruCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
struct CacheEntry {
    path: PathBuf,
    size: u64,
}

#[derive(Debug)]
struct CacheIndex {
    entries: LruCache<String, CacheEntry>,
    total_bytes: u64,
    in_flight: HashMap<String, AbortHandle>,
    /// Bumped by `cancel_downloads` and `clear`; writes from an older epoch
    /// delete their file instead of indexing it
    epoch: u64,
    /// Disk jobs (stores and removals) that have not finished yet
    disk_jobs: usize,
}

/// Bounded on-disk cache of stream heads
///
/// Cheap to clone; clones share the same index.
#[derive(Clone)]
pub struct StreamPrefetchCache {
    index: Arc<Mutex<CacheIndex>>,
    fetcher: Arc<dyn StreamFetcher>,
    config: StreamCacheConfig,
}

impl std::fmt::Debug for StreamPrefetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPrefetchCache")
            .field("config", &self.config)
            .field("total_bytes", &self.total_bytes())
            .finish_non_exhaustive()
    }
}

impl StreamPrefetchCache {
    /// Create a cache storing files under `config.directory`
    ///
    /// The directory is created lazily on the first download.
    pub fn new(config: StreamCacheConfig, fetcher: Arc<dyn StreamFetcher>) -> Self {
        Self {
            index: Arc::new(Mutex::new(CacheIndex {
                entries: LruCache::unbounded(),
                total_bytes: 0,
                in_flight: HashMap::new(),
                epoch: 0,
                disk_jobs: 0,
            })),
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &StreamCacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cached head for `locator`, marking it recently used
    ///
    /// Answers from the index alone. A file that vanished underneath the
    /// cache surfaces as an output error, after which the caller `evict`s it.
    pub fn lookup(&self, locator: &str) -> Option<PathBuf> {
        let path = self.lock().entries.get(locator)?.path.clone();
        debug!(locator, "Prefetch cache hit");
        Some(path)
    }

    /// Where the output should read `locator` from
    pub fn source_for(&self, locator: &str) -> StreamSource {
        match self.lookup(locator) {
            Some(path) => StreamSource::Cached {
                path,
                locator: locator.to_string(),
            },
            None => {
                debug!(locator, "Prefetch cache miss");
                StreamSource::Network {
                    locator: locator.to_string(),
                }
            }
        }
    }

    /// Drop the entry for `locator` and delete its file in the background
    ///
    /// Returns whether an entry existed.
    pub fn evict(&self, locator: &str) -> bool {
        let mut index = self.lock();
        let Some(entry) = index.entries.pop(locator) else {
            return false;
        };
        index.total_bytes = index.total_bytes.saturating_sub(entry.size);
        drop(index);

        debug!(locator, size = entry.size, "Evicted stream head");
        self.remove_in_background(vec![entry.path], false);
        true
    }

    /// Whether `locator` is cached (does not touch recency)
    pub fn contains(&self, locator: &str) -> bool {
        self.lock().entries.contains(locator)
    }

    /// Whether a download for `locator` is running
    pub fn is_fetching(&self, locator: &str) -> bool {
        self.lock().in_flight.contains_key(locator)
    }

    /// No download is running and every file write or removal has finished
    pub fn is_idle(&self) -> bool {
        let index = self.lock();
        index.in_flight.is_empty() && index.disk_jobs == 0
    }

    /// Bytes currently accounted to cached entries
    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start downloading the head of `locator` in the background
    ///
    /// Returns `false` when the locator is already cached or being fetched.
    /// Must be called from within a tokio runtime.
    pub fn prefetch(&self, locator: &str) -> bool {
        let mut index = self.lock();
        if index.entries.contains(locator) || index.in_flight.contains_key(locator) {
            return false;
        }

        debug!(locator, "Prefetching stream head");
        let epoch = index.epoch;
        let cache = self.clone();
        let key = locator.to_string();
        let handle = tokio::spawn(async move { cache.download(key, epoch).await });
        index.in_flight.insert(locator.to_string(), handle.abort_handle());
        true
    }

    async fn download(self, locator: String, epoch: u64) {
        let bytes = match self
            .fetcher
            .fetch_head(&locator, self.config.head_bytes)
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(locator, error = %e, "Stream prefetch failed");
                let mut index = self.lock();
                if index.epoch == epoch {
                    index.in_flight.remove(&locator);
                }
                return;
            }
        };

        // From here on the work is detached; aborting this task no longer
        // stops the store
        self.lock().disk_jobs += 1;
        let cache = self.clone();
        let store = tokio::task::spawn_blocking(move || cache.store(&locator, epoch, &bytes));
        if let Err(e) = store.await {
            if !e.is_cancelled() {
                warn!(error = %e, "Stream head store task failed");
            }
        }
    }

    /// Write a fetched head and index it; runs on the blocking pool
    fn store(&self, locator: &str, epoch: u64, bytes: &[u8]) {
        let size = bytes.len() as u64;
        let path = self.config.directory.join(Uuid::new_v4().to_string());
        let written = if size > self.config.max_bytes {
            None
        } else {
            Some(write_atomically(&self.config.directory, &path, bytes))
        };

        let stale = self.index_stored(locator, epoch, path, size, written);
        for path in &stale {
            remove_quietly(path);
        }

        let mut index = self.lock();
        index.disk_jobs = index.disk_jobs.saturating_sub(1);
    }

    /// Record a finished write, returning the files that must be deleted
    fn index_stored(
        &self,
        locator: &str,
        epoch: u64,
        path: PathBuf,
        size: u64,
        written: Option<std::io::Result<()>>,
    ) -> Vec<PathBuf> {
        let mut index = self.lock();
        if index.epoch != epoch {
            debug!(locator, "Prefetch finished after it was cancelled");
            return vec![path];
        }
        index.in_flight.remove(locator);

        match written {
            None => {
                debug!(locator, size, "Stream head larger than cache budget");
                return Vec::new();
            }
            Some(Err(e)) => {
                warn!(locator, error = %e, "Failed to write stream head");
                return Vec::new();
            }
            Some(Ok(())) => {}
        }

        let mut stale = Vec::new();
        if let Some(old) = index.entries.put(locator.to_string(), CacheEntry { path, size }) {
            index.total_bytes = index.total_bytes.saturating_sub(old.size);
            stale.push(old.path);
        }
        index.total_bytes += size;

        while index.total_bytes > self.config.max_bytes {
            let Some((evicted_locator, entry)) = index.entries.pop_lru() else {
                break;
            };
            index.total_bytes = index.total_bytes.saturating_sub(entry.size);
            debug!(locator = %evicted_locator, size = entry.size, "Evicted stream head");
            stale.push(entry.path);
        }
        debug!(locator, size, total = index.total_bytes, "Stream head cached");
        stale
    }

    /// Abort running downloads, keeping what is already cached
    ///
    /// Used when the queue is replaced and the pending heads are no longer
    /// upcoming. A download already writing to disk finishes and deletes its
    /// file.
    pub fn cancel_downloads(&self) {
        let mut index = self.lock();
        if index.in_flight.is_empty() {
            return;
        }
        index.epoch += 1;
        let cancelled = index.in_flight.len();
        for (_, handle) in index.in_flight.drain() {
            handle.abort();
        }
        drop(index);
        debug!(cancelled, "Cancelled stream prefetches");
    }

    /// Drop every cached byte and abort running downloads
    ///
    /// The index is emptied immediately; files are deleted on the blocking
    /// pool. Downloads that still complete afterwards discard their file
    /// instead of repopulating the index.
    pub fn clear(&self) {
        let mut index = self.lock();
        index.epoch += 1;
        for (_, handle) in index.in_flight.drain() {
            handle.abort();
        }
        let paths: Vec<PathBuf> = std::iter::from_fn(|| index.entries.pop_lru())
            .map(|(_, entry)| entry.path)
            .collect();
        index.total_bytes = 0;
        drop(index);

        debug!(files = paths.len(), "Clearing prefetch cache");
        self.remove_in_background(paths, true);
    }

    /// Purge everything when the user signs out
    pub fn clear_on_logout(&self) {
        self.clear();
    }

    fn remove_in_background(&self, paths: Vec<PathBuf>, sweep: bool) {
        self.lock().disk_jobs += 1;
        let cache = self.clone();
        tokio::task::spawn_blocking(move || {
            for path in &paths {
                remove_quietly(path);
            }
            if sweep {
                sweep_partials(&cache.config.directory);
            }
            let mut index = cache.lock();
            index.disk_jobs = index.disk_jobs.saturating_sub(1);
        });
    }
}

fn write_atomically(directory: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::create_dir_all(directory)?;
    let partial = path.with_extension("part");
    let result = std::fs::write(&partial, bytes).and_then(|()| std::fs::rename(&partial, path));
    if result.is_err() {
        remove_quietly(&partial);
    }
    result
}

/// Delete `.part` files left behind by an earlier run
fn sweep_partials(directory: &Path) {
    let Ok(dir) = std::fs::read_dir(directory) else {
        return;
    };
    for entry in dir.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "part") {
            remove_quietly(&path);
        }
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove cached stream head");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadenza_core::CoreError;
    use std::time::Duration;

    struct FixedFetcher {
        size: usize,
        fail: bool,
    }

    #[async_trait]
    impl StreamFetcher for FixedFetcher {
        async fn fetch_head(&self, _locator: &str, max_bytes: u64) -> cadenza_core::Result<Vec<u8>> {
            if self.fail {
                return Err(CoreError::network("unreachable"));
            }
            let len = self.size.min(usize::try_from(max_bytes).unwrap());
            Ok(vec![7u8; len])
        }
    }

    fn cache(dir: &Path, size: usize, max_bytes: u64) -> StreamPrefetchCache {
        StreamPrefetchCache::new(
            StreamCacheConfig {
                directory: dir.to_path_buf(),
                max_bytes,
                head_bytes: 64,
            },
            Arc::new(FixedFetcher { size, fail: false }),
        )
    }

    async fn settle(cache: &StreamPrefetchCache) {
        for _ in 0..400 {
            if cache.is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("cache never went idle");
    }

    fn files_on_disk(dir: &Path) -> (usize, u64) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return (0, 0);
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|e| e.metadata().ok())
            .fold((0, 0), |(count, bytes), meta| (count + 1, bytes + meta.len()))
    }

    #[tokio::test]
    async fn prefetch_then_lookup_hits() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 100, 1024);

        assert!(cache.prefetch("stream://a"));
        settle(&cache).await;

        let path = cache.lookup("stream://a").unwrap();
        assert_eq!(std::fs::read(&path).unwrap().len(), 64);
        assert_eq!(cache.total_bytes(), 64);
        assert!(cache.source_for("stream://a").is_cached());
    }

    #[tokio::test]
    async fn miss_falls_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 100, 1024);

        assert_eq!(
            cache.source_for("stream://x"),
            StreamSource::Network {
                locator: "stream://x".to_string()
            }
        );
    }

    #[tokio::test]
    async fn duplicate_prefetch_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 10, 1024);

        assert!(cache.prefetch("stream://a"));
        assert!(!cache.prefetch("stream://a"));
        settle(&cache).await;
        assert!(!cache.prefetch("stream://a"));
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 64, 128);

        for locator in ["stream://a", "stream://b"] {
            cache.prefetch(locator);
            settle(&cache).await;
        }
        // Touch a so b becomes the eviction candidate
        assert!(cache.lookup("stream://a").is_some());

        cache.prefetch("stream://c");
        settle(&cache).await;

        assert!(cache.contains("stream://a"));
        assert!(!cache.contains("stream://b"));
        assert!(cache.contains("stream://c"));
        assert_eq!(cache.total_bytes(), 128);
    }

    #[tokio::test]
    async fn clear_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 32, 1024);

        cache.prefetch("stream://a");
        settle(&cache).await;
        let path = cache.lookup("stream://a").unwrap();
        std::fs::write(dir.path().join("leftover.part"), b"stale").unwrap();

        cache.clear_on_logout();
        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);

        settle(&cache).await;
        assert!(!path.exists());
        assert_eq!(files_on_disk(dir.path()), (0, 0));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_no_entry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StreamPrefetchCache::new(
            StreamCacheConfig {
                directory: dir.path().to_path_buf(),
                max_bytes: 1024,
                head_bytes: 64,
            },
            Arc::new(FixedFetcher { size: 0, fail: true }),
        );

        cache.prefetch("stream://a");
        settle(&cache).await;
        assert!(!cache.contains("stream://a"));
        assert!(cache.lookup("stream://a").is_none());
    }

    #[tokio::test]
    async fn evict_drops_entry_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 32, 1024);

        cache.prefetch("stream://a");
        settle(&cache).await;
        let path = cache.lookup("stream://a").unwrap();

        assert!(cache.evict("stream://a"));
        assert!(!cache.evict("stream://a"));
        assert!(cache.lookup("stream://a").is_none());
        assert_eq!(cache.total_bytes(), 0);

        settle(&cache).await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn lookup_answers_from_index_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 32, 1024);

        cache.prefetch("stream://a");
        settle(&cache).await;
        let path = cache.lookup("stream://a").unwrap();
        std::fs::remove_file(&path).unwrap();

        // The output reports the unreadable file; the entry stays until evicted
        assert_eq!(cache.lookup("stream://a"), Some(path));
        assert_eq!(cache.total_bytes(), 32);
    }

    // ===== Cancellation =====

    /// Serves large heads and signals once each fetch has returned
    struct SignallingFetcher {
        size: usize,
        fetched: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl StreamFetcher for SignallingFetcher {
        async fn fetch_head(&self, _locator: &str, _max_bytes: u64) -> cadenza_core::Result<Vec<u8>> {
            let bytes = vec![3u8; self.size];
            self.fetched.notify_one();
            Ok(bytes)
        }
    }

    #[tokio::test]
    async fn cancel_during_write_leaves_no_stray_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fetched = Arc::new(tokio::sync::Notify::new());
        let cache = StreamPrefetchCache::new(
            StreamCacheConfig {
                directory: dir.path().to_path_buf(),
                max_bytes: 200 * 1024 * 1024,
                head_bytes: 64 * 1024 * 1024,
            },
            Arc::new(SignallingFetcher {
                size: 16 * 1024 * 1024,
                fetched: Arc::clone(&fetched),
            }),
        );

        for i in 0..10 {
            assert!(cache.prefetch(&format!("stream://{i}")));
            fetched.notified().await;
            cache.cancel_downloads();
        }
        settle(&cache).await;

        assert!(cache.is_empty());
        assert_eq!(cache.total_bytes(), 0);
        assert_eq!(files_on_disk(dir.path()), (0, 0));
    }

    #[tokio::test]
    async fn cancel_keeps_cached_entries_and_allows_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), 32, 1024);

        cache.prefetch("stream://a");
        settle(&cache).await;
        cache.prefetch("stream://b");
        cache.cancel_downloads();
        settle(&cache).await;

        assert!(cache.contains("stream://a"));
        assert!(!cache.contains("stream://b"));

        assert!(cache.prefetch("stream://b"));
        settle(&cache).await;
        assert!(cache.contains("stream://b"));
        assert_eq!(files_on_disk(dir.path()), (2, cache.total_bytes()));
    }
}
