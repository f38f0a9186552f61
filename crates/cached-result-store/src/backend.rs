//! Backend contract for the shared persistent cache

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::Result;
use crate::memory::MemoryBackend;

/// A shared, string-keyed store with per-entry expiry
///
/// Values are opaque bytes; callers own the serialization format. A
/// `timeout` of `None` means "use the backend's configured default".
pub trait CacheBackend: Send + Sync {
    /// Fetch the value stored under `key`, `Ok(None)` on a miss
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous entry
    fn set(&self, key: &str, value: &[u8], timeout: Option<Duration>) -> Result<()>;

    /// Remove the entry under `key`; missing keys are ignored
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove every entry
    fn clear(&self) -> Result<()>;
}

impl<B: CacheBackend + ?Sized> CacheBackend for Arc<B> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8], timeout: Option<Duration>) -> Result<()> {
        (**self).set(key, value, timeout)
    }

    fn delete(&self, key: &str) -> Result<()> {
        (**self).delete(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

static GLOBAL: OnceLock<RwLock<Arc<dyn CacheBackend>>> = OnceLock::new();

fn global_slot() -> &'static RwLock<Arc<dyn CacheBackend>> {
    GLOBAL.get_or_init(|| {
        let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::default());
        RwLock::new(backend)
    })
}

/// The process-wide default backend
///
/// Starts out as a [`MemoryBackend`] with default settings.
pub fn global_backend() -> Arc<dyn CacheBackend> {
    Arc::clone(&global_slot().read())
}

/// Replace the process-wide default backend
///
/// Wrappers capture the backend when they are built, so this only affects
/// wrappers constructed afterwards.
pub fn set_global_backend(backend: Arc<dyn CacheBackend>) {
    *global_slot().write() = backend;
    tracing::debug!("global cache backend replaced");
}
