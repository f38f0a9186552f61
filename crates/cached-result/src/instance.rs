//! Receivers for method-style caching

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Identity of a bound instance
///
/// Memoized results are partitioned by this id, so two instances never see
/// each other's values. It must stay fixed for the instance's lifetime and
/// differ between live instances; [`InstanceId::next`] hands out fresh ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl InstanceId {
    /// A process-unique id
    pub fn next() -> Self {
        InstanceId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an id the caller already has, e.g. a database primary key
    pub const fn from_raw(raw: u64) -> Self {
        InstanceId(raw)
    }

    /// The raw id
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::next()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A value a cached method or property can be bound to
///
/// The serialized instance is the receiver seen by key strategies and
/// templates as positional argument 0, so `{0.name}` reads the `name`
/// field. Fields that should not take part (counters, handles) can be
/// excluded with `#[serde(skip)]`.
pub trait Instance: Serialize {
    /// Stable identity of this instance
    fn instance_id(&self) -> InstanceId;
}

impl Instance for () {
    fn instance_id(&self) -> InstanceId {
        InstanceId(0)
    }
}

/// Short, restart-stable name of `T`: the last path segment without
/// generic parameters
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
