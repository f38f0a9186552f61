//! Cached computed attributes

use std::fmt;
use std::sync::Arc;

use cached_result_store::CacheBackend;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::args::Args;
use crate::error::{AttributeOp, Error};
use crate::function::CachedFunction;
use crate::instance::Instance;
use crate::options::CacheOptions;
use crate::stats::CallStats;

type SetterFn<T, V, E> = Box<dyn Fn(&mut T, V) -> Result<(), E> + Send + Sync>;
type DeleterFn<T, E> = Box<dyn Fn(&mut T) -> Result<(), E> + Send + Sync>;

/// Which accessors an attribute supports besides reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Getter only
    ReadOnly,
    /// Getter and setter
    ReadWrite,
    /// Getter and deleter
    ReadDelete,
    /// Getter, setter and deleter
    ReadWriteDelete,
}

impl Capability {
    /// Whether `write` is supported
    pub fn can_write(self) -> bool {
        matches!(self, Capability::ReadWrite | Capability::ReadWriteDelete)
    }

    /// Whether `delete` is supported
    pub fn can_delete(self) -> bool {
        matches!(self, Capability::ReadDelete | Capability::ReadWriteDelete)
    }
}

/// Read/write/delete access to a computed value on an instance
pub trait ComputedAttribute<T> {
    /// Attribute value
    type Value;
    /// Error returned by the accessors
    type Error;

    /// Current value
    fn read(&self, instance: &T) -> Result<Self::Value, Self::Error>;

    /// Assign a value
    fn write(&self, instance: &mut T, value: Self::Value) -> Result<(), Self::Error>;

    /// Delete the value
    fn delete(&self, instance: &mut T) -> Result<(), Self::Error>;

    /// Supported accessors
    fn capability(&self) -> Capability;
}

/// A computed attribute whose value is cached per instance
///
/// Reads go through the same memo and backend layers as
/// [`CachedFunction`]; writes and deletes run the registered setter or
/// deleter and then invalidate the instance's entry so the next read
/// recomputes.
///
/// ```
/// use std::sync::Arc;
/// use cached_result::{CachedProperty, Error, Instance, InstanceId};
/// use cached_result_store::MemoryBackend;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User {
///     #[serde(skip)]
///     id: InstanceId,
///     first: String,
///     last: String,
/// }
///
/// impl Instance for User {
///     fn instance_id(&self) -> InstanceId {
///         self.id
///     }
/// }
///
/// let full_name = CachedProperty::new(module_path!(), "full_name", |user: &User| {
///     Ok::<_, Error>(format!("{} {}", user.first, user.last))
/// })
/// .setter(|user: &mut User, value: String| {
///     let (first, last) = value.split_once(' ').unwrap_or((value.as_str(), ""));
///     user.first = first.to_string();
///     user.last = last.to_string();
///     Ok(())
/// })
/// .backend(Arc::new(MemoryBackend::default()));
///
/// let mut user = User { id: InstanceId::next(), first: "Ada".into(), last: "Lovelace".into() };
/// assert_eq!(full_name.read(&user)?, "Ada Lovelace");
///
/// full_name.write(&mut user, "Grace Hopper".to_string())?;
/// assert_eq!(full_name.read(&user)?, "Grace Hopper");
/// # Ok::<(), Error>(())
/// ```
pub struct CachedProperty<V, T, E = Error> {
    function: CachedFunction<V, T, E>,
    setter: Option<SetterFn<T, V, E>>,
    deleter: Option<DeleterFn<T, E>>,
}

impl<V, T, E> CachedProperty<V, T, E>
where
    V: Clone + Serialize + DeserializeOwned,
    T: Instance,
    E: From<Error>,
{
    /// Read-only attribute computed by `getter`
    pub fn new<F>(module: impl Into<String>, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&T) -> Result<V, E> + Send + Sync + 'static,
    {
        let function = CachedFunction::method(module, name, move |instance: &T, _: &Args| getter(instance));
        Self::from_function(function)
    }

    /// Attribute backed by an already configured method wrapper; reads call
    /// it with no arguments
    pub fn from_function(function: CachedFunction<V, T, E>) -> Self {
        Self {
            function,
            setter: None,
            deleter: None,
        }
    }

    /// Register the setter
    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut T, V) -> Result<(), E> + Send + Sync + 'static,
    {
        self.setter = Some(Box::new(setter));
        self
    }

    /// Register the deleter
    pub fn deleter<F>(mut self, deleter: F) -> Self
    where
        F: Fn(&mut T) -> Result<(), E> + Send + Sync + 'static,
    {
        self.deleter = Some(Box::new(deleter));
        self
    }

    /// Replace all cache options
    pub fn with_options(mut self, options: CacheOptions) -> Self {
        self.function = self.function.with_options(options);
        self
    }

    /// Use `backend` instead of the global default
    pub fn backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.function = self.function.backend(backend);
        self
    }

    /// Attach documentation
    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.function = self.function.doc(doc);
        self
    }

    /// Attribute name
    pub fn name(&self) -> &str {
        self.function.name()
    }

    /// Underlying method wrapper, for class-level management
    pub fn function(&self) -> &CachedFunction<V, T, E> {
        &self.function
    }

    /// Call statistics
    pub fn stats(&self) -> &CallStats {
        self.function.stats()
    }

    /// Supported accessors
    pub fn capability(&self) -> Capability {
        match (self.setter.is_some(), self.deleter.is_some()) {
            (false, false) => Capability::ReadOnly,
            (true, false) => Capability::ReadWrite,
            (false, true) => Capability::ReadDelete,
            (true, true) => Capability::ReadWriteDelete,
        }
    }

    /// Cached value for `instance`
    pub fn read(&self, instance: &T) -> Result<V, E> {
        self.function.bind(instance).call(&Args::new())
    }

    /// Run the setter, then invalidate `instance`'s cached value
    pub fn write(&self, instance: &mut T, value: V) -> Result<(), E> {
        let setter = self
            .setter
            .as_ref()
            .ok_or_else(|| Error::unsupported(AttributeOp::Set, self.name()))?;

        setter(instance, value)?;
        debug!(attribute = %self.name(), "attribute set, invalidating");
        self.invalidate(instance)
    }

    /// Run the deleter, then invalidate `instance`'s cached value
    pub fn delete(&self, instance: &mut T) -> Result<(), E> {
        let deleter = self
            .deleter
            .as_ref()
            .ok_or_else(|| Error::unsupported(AttributeOp::Delete, self.name()))?;

        deleter(instance)?;
        debug!(attribute = %self.name(), "attribute deleted, invalidating");
        self.invalidate(instance)
    }

    /// Drop `instance`'s cached and memoized value
    pub fn invalidate(&self, instance: &T) -> Result<(), E> {
        self.function.bind(instance).invalidate(&Args::new())
    }

    /// Recompute `instance`'s value and overwrite both layers
    pub fn refresh(&self, instance: &T) -> Result<V, E> {
        self.function.bind(instance).refresh(&Args::new())
    }

    /// Backend key for `instance`
    pub fn cache_key(&self, instance: &T) -> Result<String, E> {
        self.function.bind(instance).cache_key(&Args::new())
    }
}

impl<V, T, E> ComputedAttribute<T> for CachedProperty<V, T, E>
where
    V: Clone + Serialize + DeserializeOwned,
    T: Instance,
    E: From<Error>,
{
    type Value = V;
    type Error = E;

    fn read(&self, instance: &T) -> Result<V, E> {
        CachedProperty::read(self, instance)
    }

    fn write(&self, instance: &mut T, value: V) -> Result<(), E> {
        CachedProperty::write(self, instance, value)
    }

    fn delete(&self, instance: &mut T) -> Result<(), E> {
        CachedProperty::delete(self, instance)
    }

    fn capability(&self) -> Capability {
        CachedProperty::capability(self)
    }
}

impl<V, T, E> fmt::Debug for CachedProperty<V, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedProperty")
            .field("function", &self.function)
            .field("setter", &self.setter.is_some())
            .field("deleter", &self.deleter.is_some())
            .finish()
    }
}

/// Declare a cached property, taking the module from the call site:
/// `cached_property!(full_name, |user: &User| ...)`
#[macro_export]
macro_rules! cached_property {
    ($name:ident, $getter:expr) => {
        $crate::CachedProperty::new(module_path!(), stringify!($name), $getter)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceId;
    use cached_result_store::MemoryBackend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Serialize)]
    struct Record {
        #[serde(skip)]
        id: InstanceId,
        name: Option<String>,
    }

    impl Record {
        fn new(name: &str) -> Self {
            Self {
                id: InstanceId::next(),
                name: Some(name.to_string()),
            }
        }
    }

    impl Instance for Record {
        fn instance_id(&self) -> InstanceId {
            self.id
        }
    }

    fn backend() -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new(100, None))
    }

    fn name_property(hits: &Arc<AtomicUsize>) -> CachedProperty<String, Record, anyhow::Error> {
        let hits = Arc::clone(hits);
        cached_property!(name, move |record: &Record| {
            hits.fetch_add(1, Ordering::SeqCst);
            record
                .name
                .clone()
                .ok_or_else(|| anyhow::anyhow!("record has no attribute 'name'"))
        })
        .setter(|record: &mut Record, value: String| {
            record.name = Some(value);
            Ok(())
        })
        .deleter(|record: &mut Record| {
            record.name = None;
            Ok(())
        })
        .backend(backend())
    }

    fn read_only_property(hits: &Arc<AtomicUsize>) -> CachedProperty<String, Record> {
        let hits = Arc::clone(hits);
        cached_property!(read_only, move |_: &Record| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok("baz".to_string())
        })
        .backend(backend())
    }

    #[test]
    fn test_property_lifecycle() {
        let hits = Arc::new(AtomicUsize::new(0));
        let name = name_property(&hits);
        let read_only = read_only_property(&hits);
        let mut obj = Record::new("foo");

        // getter
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(name.read(&obj).unwrap(), "foo");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(name.read(&obj).unwrap(), "foo");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // setter
        name.write(&mut obj, "bar".to_string()).unwrap();
        assert_eq!(name.read(&obj).unwrap(), "bar");
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        // deleter
        name.delete(&mut obj).unwrap();
        assert!(name.read(&obj).is_err());

        // setter again
        name.write(&mut obj, "foobar".to_string()).unwrap();
        assert_eq!(name.read(&obj).unwrap(), "foobar");
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        // read-only property
        assert_eq!(read_only.read(&obj).unwrap(), "baz");
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(read_only.read(&obj).unwrap(), "baz");
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_read_only_rejects_write_and_delete() {
        let hits = Arc::new(AtomicUsize::new(0));
        let read_only = read_only_property(&hits);
        let mut obj = Record::new("foo");

        assert_eq!(read_only.capability(), Capability::ReadOnly);

        let err = read_only.write(&mut obj, "foo".to_string()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperation { op: AttributeOp::Set, ref attribute } if attribute == "read_only"
        ));

        let err = read_only.delete(&mut obj).unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { op: AttributeOp::Delete, .. }));
    }

    #[test]
    fn test_capability() {
        let hits = Arc::new(AtomicUsize::new(0));
        assert_eq!(name_property(&hits).capability(), Capability::ReadWriteDelete);

        let settable = read_only_property(&hits).setter(|_: &mut Record, _: String| Ok(()));
        assert_eq!(settable.capability(), Capability::ReadWrite);
        assert!(settable.capability().can_write());
        assert!(!settable.capability().can_delete());

        let deletable = read_only_property(&hits).deleter(|_: &mut Record| Ok(()));
        assert_eq!(deletable.capability(), Capability::ReadDelete);
    }

    #[test]
    fn test_instances_are_independent() {
        // The default key has no per-instance part, so only the memo is used here.
        let hits = Arc::new(AtomicUsize::new(0));
        let name = name_property(&hits).with_options(CacheOptions::new().cache(false));
        let mut a = Record::new("a");
        let b = Record::new("b");

        assert_eq!(name.read(&a).unwrap(), "a");
        assert_eq!(name.read(&b).unwrap(), "b");
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        name.write(&mut a, "a2".to_string()).unwrap();
        assert_eq!(name.read(&b).unwrap(), "b");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(name.read(&a).unwrap(), "a2");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_class_level_invalidation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let name = name_property(&hits);
        let obj = Record::new("foo");

        name.read(&obj).unwrap();
        name.invalidate(&obj).unwrap();
        name.read(&obj).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        assert_eq!(name.refresh(&obj).unwrap(), "foo");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(name.stats().invalidations(), 1);
    }

    #[test]
    fn test_key_uses_instance_fields() {
        let hits = Arc::new(AtomicUsize::new(0));
        let name = name_property(&hits).with_options(
            CacheOptions::new().key("record-{0.name}").hash_algorithm(None),
        );
        let obj = Record::new("foo");

        assert_eq!(name.cache_key(&obj).unwrap(), "record-foo");
    }

    #[test]
    fn test_setter_error_skips_invalidation() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&hits);
        let prop = CachedProperty::new(module_path!(), "strict", move |record: &Record| {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(record.name.clone().unwrap_or_default())
        })
        .setter(|_: &mut Record, _: String| Err(Error::computation("rejected")))
        .backend(backend());
        let mut obj = Record::new("foo");

        prop.read(&obj).unwrap();
        let err = prop.write(&mut obj, "bar".to_string()).unwrap_err();
        assert_eq!(err.to_string(), "rejected");

        prop.read(&obj).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_through_trait_object() {
        let hits = Arc::new(AtomicUsize::new(0));
        let name = name_property(&hits);
        let attribute: &dyn ComputedAttribute<Record, Value = String, Error = anyhow::Error> = &name;
        let mut obj = Record::new("foo");

        assert_eq!(attribute.read(&obj).unwrap(), "foo");
        attribute.write(&mut obj, "bar".to_string()).unwrap();
        assert_eq!(attribute.read(&obj).unwrap(), "bar");
        assert!(attribute.capability().can_delete());
    }
}
