//! Cached functions and methods
//!
//! A [`CachedFunction`] answers a call from, in order:
//!
//! 1. the in-process memo (per bound instance),
//! 2. the persistent backend,
//! 3. the wrapped target, whose result is then stored in every enabled layer.
//!
//! A backend hit is returned without being memoized; the memo only holds
//! values this process computed itself.
//!
//! # Known limitations
//!
//! - Memo keys are the textual form of the arguments, so arguments with the
//!   same text share an entry.
//! - There is no locking around check-then-store: concurrent misses for the
//!   same key may both run the target, and the last backend write wins.
//! - Every instance that was ever bound keeps its memo partition, even after
//!   the instance is dropped, until [`CachedFunction::forget`] or
//!   [`CachedFunction::clear_memo`] releases it.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cached_result_store::{global_backend, CacheBackend};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::args::Args;
use crate::error::Error;
use crate::instance::{short_type_name, Instance};
use crate::key::{self, HashAlgorithm, KeySpec};
use crate::memo::{MemoStore, Partition};
use crate::options::CacheOptions;
use crate::stats::CallStats;

type FreeFn<V, E> = Box<dyn Fn(&Args) -> Result<V, E> + Send + Sync>;
type MethodFn<T, V, E> = Box<dyn Fn(&T, &Args) -> Result<V, E> + Send + Sync>;

enum Target<T, V, E> {
    Free(FreeFn<V, E>),
    Method(MethodFn<T, V, E>),
}

/// A function or method whose results are cached
///
/// - `V`: result type; stored in the backend as JSON
/// - `T`: receiver type for methods, `()` for free functions
/// - `E`: error type returned to callers; the target's own errors pass
///   through untouched
///
/// ```
/// use std::sync::Arc;
/// use cached_result::{args, CachedFunction, Error};
/// use cached_result_store::MemoryBackend;
///
/// let square = CachedFunction::new(module_path!(), "square", |args| {
///     let x: i64 = args.parse(0)?;
///     Ok::<_, Error>(x * x)
/// })
/// .backend(Arc::new(MemoryBackend::default()));
///
/// assert_eq!(square.call(&args![4])?, 16);
/// assert_eq!(square.call(&args![4])?, 16); // memoized
/// square.invalidate(&args![4])?;
/// # Ok::<(), Error>(())
/// ```
pub struct CachedFunction<V, T = (), E = Error> {
    module: String,
    name: String,
    doc: Option<String>,
    target: Target<T, V, E>,
    options: CacheOptions,
    backend: Arc<dyn CacheBackend>,
    memo: MemoStore<V>,
    stats: CallStats,
}

impl<V, E> CachedFunction<V, (), E>
where
    V: Clone + Serialize + DeserializeOwned,
    E: From<Error>,
{
    /// Wrap a free function
    ///
    /// # Arguments
    /// * `module` - Declaring module, usually `module_path!()`
    /// * `name` - Function name
    /// * `target` - The computation
    pub fn new<F>(module: impl Into<String>, name: impl Into<String>, target: F) -> Self
    where
        F: Fn(&Args) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_target(module.into(), name.into(), Target::Free(Box::new(target)))
    }
}

impl<V, T, E> CachedFunction<V, T, E>
where
    V: Clone + Serialize + DeserializeOwned,
    T: Instance,
    E: From<Error>,
{
    /// Wrap a method on `T`
    ///
    /// The wrapper must be [bound](Self::bind) to an instance before it is
    /// called; unbound calls fail with [`Error::Unbound`].
    pub fn method<F>(module: impl Into<String>, name: impl Into<String>, target: F) -> Self
    where
        F: Fn(&T, &Args) -> Result<V, E> + Send + Sync + 'static,
    {
        Self::with_target(module.into(), name.into(), Target::Method(Box::new(target)))
    }

    fn with_target(module: String, name: String, target: Target<T, V, E>) -> Self {
        Self {
            module,
            name,
            doc: None,
            target,
            options: CacheOptions::default(),
            backend: global_backend(),
            memo: MemoStore::new(),
            stats: CallStats::new(),
        }
    }

    /// Replace all options at once
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `backend` instead of the global default
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Attach documentation, kept for introspection
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// See [`CacheOptions::key`]
    pub fn key(mut self, key: impl Into<KeySpec>) -> Self {
        self.options = self.options.key(key);
        self
    }

    /// See [`CacheOptions::key_fn`]
    pub fn key_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Args) -> Result<String, Error> + Send + Sync + 'static,
    {
        self.options = self.options.key_fn(f);
        self
    }

    /// See [`CacheOptions::id`]
    pub fn id(mut self, id: impl Into<KeySpec>) -> Self {
        self.options = self.options.id(id);
        self
    }

    /// See [`CacheOptions::timeout`]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.timeout(timeout);
        self
    }

    /// See [`CacheOptions::cache`]
    pub fn cache(mut self, enabled: bool) -> Self {
        self.options = self.options.cache(enabled);
        self
    }

    /// See [`CacheOptions::memoize`]
    pub fn memoize(mut self, enabled: bool) -> Self {
        self.options = self.options.memoize(enabled);
        self
    }

    /// See [`CacheOptions::hash_algorithm`]
    pub fn hash_algorithm(mut self, algorithm: Option<HashAlgorithm>) -> Self {
        self.options = self.options.hash_algorithm(algorithm);
        self
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declaring module
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Attached documentation
    pub fn docs(&self) -> Option<&str> {
        self.doc.as_deref()
    }

    /// Active options
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Call statistics
    pub fn stats(&self) -> &CallStats {
        &self.stats
    }

    /// View of this wrapper bound to `instance`
    ///
    /// Each instance gets its own memo partition.
    pub fn bind<'a>(&'a self, instance: &'a T) -> Bound<'a, V, T, E> {
        Bound {
            function: self,
            instance,
        }
    }

    /// Cached result of the target for `args`
    pub fn call(&self, args: &Args) -> Result<V, E> {
        self.invoke(None, args)
    }

    /// Run the target unconditionally and overwrite both layers
    pub fn refresh(&self, args: &Args) -> Result<V, E> {
        self.force(None, args)
    }

    /// Drop the cached and memoized result for `args`
    pub fn invalidate(&self, args: &Args) -> Result<(), E> {
        self.remove(None, args)
    }

    /// Backend key for `args`
    pub fn cache_key(&self, args: &Args) -> Result<String, E> {
        Ok(self.key_for(None, args)?)
    }

    /// Drop every memoized value, for all instances
    ///
    /// The backend is left alone.
    pub fn clear_memo(&self) {
        self.memo.clear();
    }

    /// Drop the memoized values of one instance
    pub fn forget(&self, instance: &T) -> usize {
        self.memo.clear_partition(Some(instance.instance_id()))
    }

    /// Number of memoized values across all instances
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Number of instances (plus the unbound partition) holding memoized values
    pub fn memoized_instances(&self) -> usize {
        self.memo.partitions()
    }

    fn check_binding(&self, instance: Option<&T>) -> Result<(), Error> {
        match (&self.target, instance) {
            (Target::Method(_), None) => Err(Error::Unbound(self.name.clone())),
            _ => Ok(()),
        }
    }

    fn invoke(&self, instance: Option<&T>, args: &Args) -> Result<V, E> {
        self.check_binding(instance)?;
        let partition = partition_of(instance);

        let memo_key = if self.options.memoize {
            let memo_key = args.to_string();
            if let Some(value) = self.memo.get(partition, &memo_key) {
                debug!(function = %self.name, memo_key = %memo_key, "memo hit");
                self.stats.record_memo_hit();
                return Ok(value);
            }
            Some(memo_key)
        } else {
            None
        };

        let key = if self.options.cache {
            let key = self.key_for(instance, args)?;
            if let Some(bytes) = self.backend.get(&key).map_err(Error::from)? {
                let value = serde_json::from_slice(&bytes).map_err(Error::from)?;
                debug!(function = %self.name, key = %key, "cache hit");
                self.stats.record_cache_hit();
                return Ok(value);
            }
            Some(key)
        } else {
            None
        };

        debug!(function = %self.name, "miss, computing");
        let value = self.compute(instance, args)?;
        self.store(partition, key, memo_key, &value)?;
        Ok(value)
    }

    fn force(&self, instance: Option<&T>, args: &Args) -> Result<V, E> {
        self.check_binding(instance)?;

        debug!(function = %self.name, "forced recompute");
        let value = self.compute(instance, args)?;

        let key = if self.options.cache {
            Some(self.key_for(instance, args)?)
        } else {
            None
        };
        let memo_key = self.options.memoize.then(|| args.to_string());

        self.store(partition_of(instance), key, memo_key, &value)?;
        Ok(value)
    }

    fn remove(&self, instance: Option<&T>, args: &Args) -> Result<(), E> {
        self.check_binding(instance)?;

        if self.options.cache {
            let key = self.key_for(instance, args)?;
            self.backend.delete(&key).map_err(Error::from)?;
            debug!(function = %self.name, key = %key, "cache entry deleted");
        }

        if self.options.memoize {
            self.memo.remove(partition_of(instance), &args.to_string());
        }

        self.stats.record_invalidation();
        Ok(())
    }

    fn compute(&self, instance: Option<&T>, args: &Args) -> Result<V, E> {
        self.stats.record_computation();
        match (&self.target, instance) {
            (Target::Free(f), _) => f(args),
            (Target::Method(f), Some(instance)) => f(instance, args),
            (Target::Method(_), None) => Err(Error::Unbound(self.name.clone()).into()),
        }
    }

    fn store(
        &self,
        partition: Partition,
        key: Option<String>,
        memo_key: Option<String>,
        value: &V,
    ) -> Result<(), Error> {
        if let Some(key) = key {
            let bytes = serde_json::to_vec(value)?;
            self.backend.set(&key, &bytes, self.options.timeout)?;
        }
        if let Some(memo_key) = memo_key {
            self.memo.insert(partition, memo_key, value.clone());
        }
        Ok(())
    }

    fn key_for(&self, instance: Option<&T>, args: &Args) -> Result<String, Error> {
        self.check_binding(instance)?;

        let key_args = match instance {
            Some(instance) => Cow::Owned(args.with_receiver(serde_json::to_value(instance)?)),
            None => Cow::Borrowed(args),
        };

        let raw = match &self.options.key {
            Some(spec) => spec.resolve(&key_args)?,
            None => key::generate_key(
                &self.module,
                instance.map(|_| short_type_name::<T>()),
                &self.name,
                self.options.id.as_ref(),
                &key_args,
            )?,
        };
        trace!(function = %self.name, raw_key = %raw, "derived cache key");

        Ok(match &self.options.hash_algorithm {
            Some(algorithm) => algorithm.digest(&raw),
            None => raw,
        })
    }
}

fn partition_of<T: Instance>(instance: Option<&T>) -> Partition {
    instance.map(Instance::instance_id)
}

impl<V, T, E> fmt::Debug for CachedFunction<V, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFunction")
            .field("module", &self.module)
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// A [`CachedFunction`] bound to one instance
///
/// Cheap to create; obtain one per access with [`CachedFunction::bind`].
pub struct Bound<'a, V, T, E> {
    function: &'a CachedFunction<V, T, E>,
    instance: &'a T,
}

impl<V, T, E> Clone for Bound<'_, V, T, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V, T, E> Copy for Bound<'_, V, T, E> {}

impl<'a, V, T, E> Bound<'a, V, T, E>
where
    V: Clone + Serialize + DeserializeOwned,
    T: Instance,
    E: From<Error>,
{
    /// Cached result for `args` on this instance
    pub fn call(&self, args: &Args) -> Result<V, E> {
        self.function.invoke(Some(self.instance), args)
    }

    /// Recompute for `args` on this instance and overwrite both layers
    pub fn refresh(&self, args: &Args) -> Result<V, E> {
        self.function.force(Some(self.instance), args)
    }

    /// Drop this instance's cached and memoized result for `args`
    pub fn invalidate(&self, args: &Args) -> Result<(), E> {
        self.function.remove(Some(self.instance), args)
    }

    /// Backend key for `args` on this instance
    pub fn cache_key(&self, args: &Args) -> Result<String, E> {
        Ok(self.function.key_for(Some(self.instance), args)?)
    }

    /// Number of values memoized for this instance
    pub fn memo_len(&self) -> usize {
        self.function.memo.partition_len(Some(self.instance.instance_id()))
    }

    /// The bound instance
    pub fn instance(&self) -> &'a T {
        self.instance
    }

    /// The unbound wrapper
    pub fn function(&self) -> &'a CachedFunction<V, T, E> {
        self.function
    }
}

/// Wrap a free function, taking the module from the call site:
/// `cached_function!(square, |args| ...)`
#[macro_export]
macro_rules! cached_function {
    ($name:ident, $target:expr) => {
        $crate::CachedFunction::new(module_path!(), stringify!($name), $target)
    };
}

/// Wrap a method, taking the module from the call site:
/// `cached_method!(name, |this: &User, args| ...)`
#[macro_export]
macro_rules! cached_method {
    ($name:ident, $target:expr) => {
        $crate::CachedFunction::method(module_path!(), stringify!($name), $target)
    };
}
