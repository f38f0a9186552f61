//! Backend configuration

use std::time::Duration;

use serde::Deserialize;

/// Default number of entries kept by a [`MemoryBackend`](crate::MemoryBackend)
pub const DEFAULT_CAPACITY: usize = 300;

/// Default entry lifetime in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 300.0;

/// Settings for the in-memory backend
///
/// Deserializable from any serde format, e.g. JSON:
///
/// ```json
/// { "capacity": 1000, "default_timeout": 60 }
/// ```
///
/// A `null` timeout keeps entries until they are evicted or deleted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Maximum number of entries
    pub capacity: usize,

    /// Lifetime in seconds applied when `set` receives no timeout
    pub default_timeout: Option<f64>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_timeout: Some(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl BackendConfig {
    /// The default timeout as a [`Duration`]
    ///
    /// Negative values clamp to zero; values too large to represent behave
    /// like `null`.
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
            .and_then(|secs| Duration::try_from_secs_f64(secs.max(0.0)).ok())
    }
}
