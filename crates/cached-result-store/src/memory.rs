//! In-process cache backend

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::trace;

use crate::backend::CacheBackend;
use crate::config::BackendConfig;
use crate::error::Result;
use crate::lru::{ExpiringLru, Lookup};
use crate::stats::BackendStats;

/// Bounded in-memory backend with per-entry expiry
///
/// Least recently used entries are evicted once `capacity` is reached.
/// Cloning yields another handle onto the same storage.
#[derive(Clone)]
pub struct MemoryBackend {
    /// Entries keyed by cache key
    entries: Arc<RwLock<ExpiringLru<String, Vec<u8>>>>,

    /// Traffic statistics
    stats: Arc<BackendStats>,

    /// Lifetime used when `set` gets no explicit timeout
    default_timeout: Option<Duration>,
}

impl MemoryBackend {
    /// Create a new backend
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of entries
    /// * `default_timeout` - Lifetime for entries stored without a timeout;
    ///   `None` keeps them until evicted
    pub fn new(capacity: usize, default_timeout: Option<Duration>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(ExpiringLru::new(capacity))),
            stats: Arc::new(BackendStats::new()),
            default_timeout,
        }
    }

    /// Create a backend from deserialized settings
    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.capacity, config.default_timeout())
    }

    /// Get backend statistics
    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    /// Number of stored entries, expired ones not yet purged included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the backend holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.entries.read().capacity()
    }

    /// Lifetime applied when no timeout is given
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Drop all expired entries now rather than on next access
    pub fn purge_expired(&self) -> usize {
        let purged = self.entries.write().purge_expired(Instant::now());
        self.stats.record_expirations(purged as u64);
        purged
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::from_config(&BackendConfig::default())
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let lookup = self.entries.write().get(&key.to_string(), Instant::now());

        match lookup {
            Lookup::Hit(value) => {
                self.stats.record_hit();
                Ok(Some(value))
            }
            Lookup::Expired => {
                trace!(key, "entry expired");
                self.stats.record_expirations(1);
                self.stats.record_miss();
                Ok(None)
            }
            Lookup::Miss => {
                self.stats.record_miss();
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &[u8], timeout: Option<Duration>) -> Result<()> {
        let now = Instant::now();
        // A deadline past what `Instant` can represent never expires
        let expires_at = timeout
            .or(self.default_timeout)
            .and_then(|ttl| now.checked_add(ttl));

        let evicted = self
            .entries
            .write()
            .put(key.to_string(), value.to_vec(), expires_at);

        self.stats.record_set();
        if evicted {
            trace!(key, "evicted least recently used entry");
            self.stats.record_eviction();
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(&key.to_string());
        self.stats.record_delete();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }
}
