//! # cached-result-store
//!
//! The persistent cache contract used by `cached-result`.
//!
//! ## Architecture
//! - **CacheBackend**: string keys, opaque byte values, per-entry timeout
//! - **MemoryBackend**: bounded LRU with expiry, the default backend
//! - **Global backend**: process-wide default picked up by wrappers that are
//!   not given one explicitly

#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod lru;
mod memory;
mod stats;

pub use backend::{global_backend, set_global_backend, CacheBackend};
pub use config::{BackendConfig, DEFAULT_CAPACITY, DEFAULT_TIMEOUT_SECS};
pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use stats::BackendStats;
