use alloc::{boxed::Box, sync::Arc};
use core::fmt::{self, Debug, Formatter};
use tracing::{debug, error};

use crate::{
    any::{RcAny, TypeInfo},
    bundle::Bundle,
    errors::{InstantiateErrorKind, ResolveErrorKind},
    instantiator::{boxed_constructor, boxed_instantiator, BoxedInstantiator, Construct, Instantiator},
    lazy::AnyLazy,
    token::Token,
};

/// How a [`Resolver`] produces its instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverKind {
    /// Prebuilt value, shared as is
    Value,
    /// Function invoked as soon as the registration is resolved
    Function,
    /// Factory invoked on first use of the lazy handle
    Factory,
    /// [`Construct`] implementation invoked on first use of the lazy handle
    Class,
}

impl ResolverKind {
    #[inline]
    #[must_use]
    pub const fn is_lazy(&self) -> bool {
        matches!(self, ResolverKind::Factory | ResolverKind::Class)
    }
}

/// Construction strategy normalized to the `(bundle) -> instance` shape.
#[derive(Clone)]
pub struct Resolver {
    kind: ResolverKind,
    provides: TypeInfo,
    instantiator: BoxedInstantiator,
}

impl Resolver {
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResolverKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn provides(&self) -> TypeInfo {
        self.provides
    }

    /// Turns the strategy into a handle for `token`.
    ///
    /// Lazy kinds return a pending handle that runs the factory with `bundle` on first use,
    /// others run right away and return a resolved one.
    pub(crate) fn resolve(&self, token: &Token, bundle: Bundle) -> Result<AnyLazy, ResolveErrorKind> {
        if self.kind.is_lazy() {
            debug!("Deferred until first use");

            let instantiator = self.instantiator.clone();
            let token_for_init = token.clone();
            return Ok(AnyLazy::pending(
                token.clone(),
                self.provides,
                Box::new(move || call(&instantiator, &token_for_init, bundle.clone())),
            ));
        }

        call(&self.instantiator, token, bundle).map(|value| AnyLazy::ready(token.clone(), self.provides, value))
    }
}

fn call(instantiator: &BoxedInstantiator, token: &Token, bundle: Bundle) -> Result<RcAny, ResolveErrorKind> {
    match instantiator(bundle) {
        Ok(value) => {
            debug!(%token, "Instantiated");
            Ok(value)
        }
        Err(source) => {
            let err = ResolveErrorKind::Instantiate {
                token: token.clone(),
                source,
            };
            error!("{}: {}", err, err.root_cause());
            Err(err)
        }
    }
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("kind", &self.kind)
            .field("provides", &self.provides.name)
            .finish_non_exhaustive()
    }
}

/// Shares a prebuilt value. Every resolution returns the same [`Arc`].
#[must_use]
pub fn value<T: Send + Sync + 'static>(value: T) -> Resolver {
    let value: RcAny = Arc::new(value);
    Resolver {
        kind: ResolverKind::Value,
        provides: TypeInfo::of::<T>(),
        instantiator: Arc::new(move |_bundle: Bundle| -> Result<RcAny, InstantiateErrorKind> { Ok(value.clone()) }),
    }
}

/// Calls `function` as soon as the registration is resolved, without a lazy handle in between.
#[must_use]
pub fn function<Inst, Args>(function: Inst) -> Resolver
where
    Inst: Instantiator<Args>,
{
    Resolver {
        kind: ResolverKind::Function,
        provides: TypeInfo::of::<Inst::Provides>(),
        instantiator: boxed_instantiator(function),
    }
}

/// Defers `factory` until the handle is first used.
///
/// Factories may store handles of other registrations, including ones that depend back on them,
/// as long as they don't dereference them while constructing.
#[must_use]
pub fn factory<Inst, Args>(factory: Inst) -> Resolver
where
    Inst: Instantiator<Args>,
{
    Resolver {
        kind: ResolverKind::Factory,
        provides: TypeInfo::of::<Inst::Provides>(),
        instantiator: boxed_instantiator(factory),
    }
}

/// Defers [`Construct::construct`] of `T` until the handle is first used.
#[must_use]
pub fn class<T: Construct>() -> Resolver {
    Resolver {
        kind: ResolverKind::Class,
        provides: TypeInfo::of::<T>(),
        instantiator: boxed_constructor::<T>(),
    }
}
