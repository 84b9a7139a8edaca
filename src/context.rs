use alloc::sync::{Arc, Weak};
use core::{
    fmt::{self, Debug, Formatter},
    sync::atomic::{AtomicU64, Ordering},
};

use crate::any::{self, TypeInfo};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Context`], used as the cache key of scoped registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(u64);

/// Typed values carried by a [`Context`], e.g. a request id, readable by scoped factories.
#[derive(Clone, Default)]
pub struct ContextValues {
    map: any::Map,
}

impl ContextValues {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { map: any::Map::new() }
    }

    #[inline]
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<Arc<T>> {
        self.insert_rc(Arc::new(value))
    }

    #[inline]
    pub fn insert_rc<T: Send + Sync + 'static>(&mut self, value: Arc<T>) -> Option<Arc<T>> {
        self.map
            .insert(TypeInfo::of::<T>(), value)
            .and_then(|boxed| boxed.downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.map
            .get(&TypeInfo::of::<T>())
            .and_then(|boxed| boxed.clone().downcast().ok())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

pub(crate) struct ContextInner {
    id: ContextId,
    values: ContextValues,
}

/// Opaque scope marker. Clones share the identity, separately created contexts never do.
///
/// Scoped registrations cache one instance per context. The cache holds the context weakly:
/// once every clone of a context is dropped, its cached instances are released on the next scoped resolution.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::with_values(ContextValues::new())
    }

    #[must_use]
    pub fn with_values(values: ContextValues) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
                values,
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    #[inline]
    #[must_use]
    pub fn values(&self) -> &ContextValues {
        &self.inner.values
    }

    #[inline]
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.values.get()
    }

    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<ContextInner> {
        Arc::downgrade(&self.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Context {}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("values", &self.inner.values.len())
            .finish()
    }
}
