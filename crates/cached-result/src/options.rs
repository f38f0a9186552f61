//! Wrapper configuration

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::args::Args;
use crate::error::Error;
use crate::key::{HashAlgorithm, KeySpec};

/// Options shared by cached functions and cached properties
///
/// | option           | default  | meaning                                   |
/// |------------------|----------|-------------------------------------------|
/// | `key`            | none     | explicit key strategy                      |
/// | `id`             | none     | extra part for the generated key           |
/// | `timeout`        | none     | entry lifetime; none = backend default     |
/// | `cache`          | `true`   | use the persistent backend                 |
/// | `memoize`        | `true`   | use the in-process memo                    |
/// | `hash_algorithm` | SHA-256  | digest applied to keys; none = raw keys    |
///
/// Also deserializable, with `timeout` in (fractional) seconds and
/// `hash_algorithm` given by name (`"sha256"`, `"sha512"`, `"none"` or
/// `null`). Non-string `key`/`id` values deserialize to
/// [`KeySpec::Invalid`] and fail when a key is first computed.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawOptions")]
pub struct CacheOptions {
    pub(crate) key: Option<KeySpec>,
    pub(crate) id: Option<KeySpec>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cache: bool,
    pub(crate) memoize: bool,
    pub(crate) hash_algorithm: Option<HashAlgorithm>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            key: None,
            id: None,
            timeout: None,
            cache: true,
            memoize: true,
            hash_algorithm: Some(HashAlgorithm::Sha256),
        }
    }
}

impl CacheOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit key strategy; a `&str` becomes a template
    pub fn key(mut self, key: impl Into<KeySpec>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Explicit key function
    pub fn key_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Args) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.key(KeySpec::callable(f))
    }

    /// Identifier appended to the generated key
    pub fn id(mut self, id: impl Into<KeySpec>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Identifier function appended to the generated key
    pub fn id_fn<F>(self, f: F) -> Self
    where
        F: Fn(&Args) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.id(KeySpec::callable(f))
    }

    /// Lifetime of backend entries
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable the persistent backend
    pub fn cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    /// Enable or disable the in-process memo
    pub fn memoize(mut self, enabled: bool) -> Self {
        self.memoize = enabled;
        self
    }

    /// Digest applied to keys; `None` uses the derived key as is
    pub fn hash_algorithm(mut self, algorithm: Option<HashAlgorithm>) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    /// Configured key strategy
    pub fn key_spec(&self) -> Option<&KeySpec> {
        self.key.as_ref()
    }

    /// Configured id strategy
    pub fn id_spec(&self) -> Option<&KeySpec> {
        self.id.as_ref()
    }

    /// Configured entry lifetime
    pub fn entry_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether the persistent backend is used
    pub fn uses_cache(&self) -> bool {
        self.cache
    }

    /// Whether the in-process memo is used
    pub fn uses_memo(&self) -> bool {
        self.memoize
    }

    /// Configured digest
    pub fn hasher(&self) -> Option<&HashAlgorithm> {
        self.hash_algorithm.as_ref()
    }
}

fn enabled() -> bool {
    true
}

fn default_hash_name() -> Option<String> {
    Some("sha256".to_string())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOptions {
    #[serde(default)]
    key: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default = "enabled")]
    cache: bool,
    #[serde(default = "enabled")]
    memoize: bool,
    #[serde(default = "default_hash_name")]
    hash_algorithm: Option<String>,
}

/// Empty strings count as "not configured", like a missing entry
fn spec_from_raw(value: Option<Value>) -> Option<KeySpec> {
    match value {
        None => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(KeySpec::from_value(&value)),
    }
}

impl TryFrom<RawOptions> for CacheOptions {
    type Error = String;

    fn try_from(raw: RawOptions) -> Result<Self, Self::Error> {
        let timeout = match raw.timeout {
            Some(secs) => Some(
                Duration::try_from_secs_f64(secs.max(0.0))
                    .map_err(|err| format!("invalid timeout {secs}: {err}"))?,
            ),
            None => None,
        };

        let hash_algorithm = match raw.hash_algorithm.as_deref() {
            None | Some("none") => None,
            Some(name) => Some(
                HashAlgorithm::from_name(name)
                    .ok_or_else(|| format!("unknown hash algorithm {name:?}"))?,
            ),
        };

        Ok(CacheOptions {
            key: spec_from_raw(raw.key),
            id: spec_from_raw(raw.id),
            timeout,
            cache: raw.cache,
            memoize: raw.memoize,
            hash_algorithm,
        })
    }
}
