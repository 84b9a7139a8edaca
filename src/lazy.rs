use alloc::{boxed::Box, sync::Arc};
use core::{
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};
use tracing::{debug, debug_span, error};

use crate::{
    any::{RcAny, TypeInfo},
    cache::OnceSlot,
    errors::ResolveErrorKind,
    token::Token,
};

pub(crate) type Init = Box<dyn Fn() -> Result<RcAny, ResolveErrorKind> + Send + Sync>;

struct LazyInner {
    token: Token,
    provides: TypeInfo,
    slot: OnceSlot<RcAny>,
    init: Init,
}

/// Type-erased deferred resolution.
///
/// The first [`AnyLazy::force`] runs the underlying factory and memoizes its result,
/// every later access returns the same value. Clones share the memo.
#[derive(Clone)]
pub struct AnyLazy(Arc<LazyInner>);

impl AnyLazy {
    #[must_use]
    pub(crate) fn pending(token: Token, provides: TypeInfo, init: Init) -> Self {
        Self(Arc::new(LazyInner {
            token,
            provides,
            slot: OnceSlot::new(),
            init,
        }))
    }

    #[must_use]
    pub(crate) fn ready(token: Token, provides: TypeInfo, value: RcAny) -> Self {
        Self(Arc::new(LazyInner {
            token,
            provides,
            slot: OnceSlot::ready(value.clone()),
            init: Box::new(move || Ok::<_, ResolveErrorKind>(value.clone())),
        }))
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> &Token {
        &self.0.token
    }

    #[inline]
    #[must_use]
    pub fn provides(&self) -> TypeInfo {
        self.0.provides
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.0.slot.is_ready()
    }

    /// Returns `true` if both handles share the same memo.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Resolves the handle, running the factory on first access.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::CyclicConstruction`] if the handle is forced again from its own factory
    /// - Returns the factory error otherwise. The handle stays unresolved and the next access retries
    pub fn force(&self) -> Result<RcAny, ResolveErrorKind> {
        let inner = &*self.0;
        inner.slot.get_or_try_init(
            || {
                let span = debug_span!("force", token = %inner.token);
                let _guard = span.enter();

                debug!("Not resolved yet, running factory");
                inner.init()
            },
            || {
                let err = ResolveErrorKind::CyclicConstruction {
                    token: inner.token.clone(),
                };
                error!("{}", err);
                err
            },
        )
    }

    /// Attaches a static type to the handle without forcing it.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::IncorrectType`] if the handle provides another type
    pub fn downcast<T: Send + Sync + 'static>(self) -> Result<Lazy<T>, ResolveErrorKind> {
        if !self.0.provides.is::<T>() {
            let err = ResolveErrorKind::IncorrectType {
                token: self.0.token.clone(),
                expected: TypeInfo::of::<T>(),
                actual: self.0.provides,
            };
            error!("{}", err);
            return Err(err);
        }

        Ok(Lazy {
            inner: self,
            marker: PhantomData,
        })
    }
}

impl LazyInner {
    #[inline]
    fn init(&self) -> Result<RcAny, ResolveErrorKind> {
        (self.init)()
    }
}

impl Debug for AnyLazy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyLazy")
            .field("token", &self.0.token)
            .field("provides", &self.0.provides.name)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Typed handle to a registration whose factory runs on first use.
///
/// Storing a `Lazy` doesn't resolve anything, so two components may hold handles to each other.
/// Dereferencing one of them during the other's construction is the only unsupported case,
/// and it fails with [`ResolveErrorKind::CyclicConstruction`].
pub struct Lazy<T> {
    inner: AnyLazy,
    marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Lazy<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: Send + Sync + 'static> Lazy<T> {
    /// Resolves the handle on first call and returns the shared instance.
    ///
    /// # Errors
    /// See [`AnyLazy::force`]
    pub fn get(&self) -> Result<Arc<T>, ResolveErrorKind> {
        let value = self.inner.force()?;
        value.downcast::<T>().map_err(|value| ResolveErrorKind::IncorrectType {
            token: self.inner.token().clone(),
            expected: TypeInfo::of::<T>(),
            actual: TypeInfo {
                name: self.inner.provides().name,
                id: (*value).type_id(),
            },
        })
    }

    /// Returns the instance only if the handle was already resolved.
    #[must_use]
    pub fn try_get(&self) -> Option<Arc<T>> {
        self.inner.0.slot.get().and_then(|value| value.downcast::<T>().ok())
    }
}

impl<T> Lazy<T> {
    #[inline]
    #[must_use]
    pub fn token(&self) -> &Token {
        self.inner.token()
    }

    #[inline]
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.inner.is_resolved()
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner.ptr_eq(&other.inner)
    }

    #[inline]
    #[must_use]
    pub fn as_any(&self) -> &AnyLazy {
        &self.inner
    }

    #[inline]
    #[must_use]
    pub fn into_any(self) -> AnyLazy {
        self.inner
    }
}

impl<T> Debug for Lazy<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("token", self.inner.token())
            .field("resolved", &self.inner.is_resolved())
            .finish()
    }
}
