//! Cache registry
//!
//! Maps file identities to their position caches, bounded by LRU eviction.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::source::SourceIdentity;

use super::{max_positions_for, PositionCache};

/// Shared registry of position caches, one per file path
///
/// Construct one per process (or per test) and pass it to every iterator
/// that should share what earlier seeks learned.
///
/// ## Concurrency:
/// - `caches`: Protected by Mutex (lookups reorder the LRU list)
/// - Returned caches are `Arc`s and have their own locking
pub struct CacheRegistry {
    caches: Mutex<LruCache<String, Arc<PositionCache>>>,
    positions_per_gb: usize,
    max_positions_per_cache: usize,
}

impl CacheRegistry {
    /// Create a registry sized from the configuration
    pub fn new(config: &Config) -> Self {
        let capacity = NonZeroUsize::new(config.max_files_in_cache).unwrap_or(NonZeroUsize::MIN);
        Self {
            caches: Mutex::new(LruCache::new(capacity)),
            positions_per_gb: config.positions_per_gb,
            max_positions_per_cache: config.max_positions_per_cache,
        }
    }

    /// Create a registry holding at most `max_files` identities, other settings default
    pub fn with_capacity(max_files: usize) -> Self {
        Self::new(&Config::builder().max_files_in_cache(max_files).build())
    }

    /// Cache for `identity`, creating or replacing it as needed
    ///
    /// - Same path and same unique id: the existing cache is returned.
    /// - Same path, different unique id: the stale cache is dropped and replaced.
    /// - No unique id: a fresh cache that is never registered nor shared.
    pub fn get_or_create(&self, identity: &SourceIdentity, data_start: u64, file_size: u64) -> Arc<PositionCache> {
        let unique_id = identity.unique_id.as_deref().filter(|id| !id.is_empty());
        let mut caches = self.caches.lock();

        if let Some(id) = unique_id {
            if let Some(existing) = caches.get(&identity.path) {
                if existing.unique_id() == Some(id) {
                    return Arc::clone(existing);
                }
                warn!(
                    path = %identity.path,
                    old = ?existing.unique_id(),
                    new = id,
                    "File content changed, discarding position cache"
                );
            }
        }

        let max_positions = max_positions_for(
            data_start,
            file_size,
            self.positions_per_gb,
            self.max_positions_per_cache,
        );
        let cache = Arc::new(PositionCache::new(
            unique_id.map(str::to_string),
            data_start,
            file_size,
            max_positions,
        ));

        match unique_id {
            Some(_) => {
                if let Some((evicted, _)) = caches.push(identity.path.clone(), Arc::clone(&cache)) {
                    if evicted != identity.path {
                        debug!(path = %evicted, "Evicted position cache");
                    }
                }
                debug!(path = %identity.path, max_positions, "Created position cache");
            }
            None => {
                // Unverifiable content must not inherit positions from an earlier open
                caches.pop(&identity.path);
            }
        }
        cache
    }

    /// Registered cache for `path`, without touching the LRU order
    pub fn peek(&self, path: &str) -> Option<Arc<PositionCache>> {
        self.caches.lock().peek(path).cloned()
    }

    /// Number of file identities held
    pub fn num_files(&self) -> usize {
        self.caches.lock().len()
    }

    /// Sum of entries over all held caches
    pub fn total_keys(&self) -> usize {
        self.caches.lock().iter().map(|(_, cache)| cache.len()).sum()
    }

    /// Maximum number of file identities held
    pub fn capacity(&self) -> usize {
        self.caches.lock().cap().get()
    }

    /// Drop every cache
    pub fn clear(&self) {
        self.caches.lock().clear();
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}
