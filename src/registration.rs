use core::fmt::{self, Debug, Formatter};
use tracing::{debug, error, info_span};

use crate::{
    bundle::Bundle,
    cache::{OnceSlot, ScopedCache},
    config::{Options, ResolveOptions},
    context::Context,
    errors::ResolveErrorKind,
    lazy::{AnyLazy, Lazy},
    lifecycle::{Access, Lifecycle},
    resolver::{Resolver, ResolverKind},
    token::Token,
};

/// Binding of a [`Token`] to a [`Resolver`] with its lifecycle and access metadata.
///
/// The registration owns the memo of its lifecycle: one handle for singletons, one handle per
/// [`Context`] for scoped ones, nothing for transient ones. Handles of lazy resolvers memoize
/// the instance themselves, so a memo hit returns the very same handle.
pub struct Registration {
    token: Token,
    resolver: Resolver,
    lifecycle: Lifecycle,
    access: Access,
    bundle: Option<Bundle>,
    context: Option<Context>,
    singleton: OnceSlot<AnyLazy>,
    scoped: ScopedCache<AnyLazy>,
}

impl Registration {
    /// Creates a registration. Unset options take their defaults, see [`Options`].
    #[must_use]
    pub fn create(resolver: Resolver, options: Options) -> Self {
        let Options {
            token,
            lifecycle,
            access,
            bundle,
            context,
        } = options;

        let token = token.unwrap_or_else(|| Token::from_static(resolver.provides().short_name()));
        Self::from_parts(
            token,
            resolver,
            lifecycle.unwrap_or_default(),
            access.unwrap_or_default(),
            bundle,
            context,
        )
    }

    fn from_parts(
        token: Token,
        resolver: Resolver,
        lifecycle: Lifecycle,
        access: Access,
        bundle: Option<Bundle>,
        context: Option<Context>,
    ) -> Self {
        Self {
            token,
            resolver,
            lifecycle,
            access,
            bundle,
            context,
            singleton: OnceSlot::new(),
            scoped: ScopedCache::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn token(&self) -> &Token {
        &self.token
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[inline]
    #[must_use]
    pub fn access(&self) -> Access {
        self.access
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResolverKind {
        self.resolver.kind()
    }

    #[inline]
    #[must_use]
    pub fn bundle(&self) -> Option<&Bundle> {
        self.bundle.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    /// Binds the registration to the bundle of the container it's pushed into, unless it already has one.
    #[must_use]
    pub(crate) fn bind_bundle(mut self, bundle: Bundle) -> Self {
        if self.bundle.is_none() {
            self.bundle = Some(bundle);
        }
        self
    }

    /// Resolves the registration according to its lifecycle.
    ///
    /// The factory gets the bundle of the registration, or `options.bundle` if it has none.
    /// Scoped and transient factories get it bound to the resolution context, singleton ones never do,
    /// so a singleton can't capture a scoped instance.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::MissingContext`] if the registration is scoped and there is no context,
    ///   neither in `options` nor in the registration itself
    /// - Returns [`ResolveErrorKind::CyclicConstruction`] if an eager resolver reads its own registration
    /// - Returns [`ResolveErrorKind::Instantiate`] if an eager resolver fails.
    ///   Lazy resolvers report their errors on first use of the handle instead
    pub fn resolve(&self, options: ResolveOptions) -> Result<AnyLazy, ResolveErrorKind> {
        let span = info_span!("resolve", token = %self.token, lifecycle = %self.lifecycle);
        let _guard = span.enter();

        let ResolveOptions { bundle, context } = options;
        let bundle = self.bundle.clone().or(bundle).unwrap_or_default();
        let context = context.or_else(|| self.context.clone());

        match self.lifecycle {
            Lifecycle::Singleton => {
                if let Some(lazy) = self.singleton.get() {
                    debug!("Found in cache");
                    return Ok(lazy);
                }
                debug!("Not found in cache");

                self.singleton.get_or_try_init(
                    || self.resolver.resolve(&self.token, bundle.without_context()),
                    || self.cyclic(),
                )
            }
            Lifecycle::Transient => {
                let bundle = match context {
                    Some(context) => bundle.with_context(context),
                    None => bundle,
                };
                self.resolver.resolve(&self.token, bundle)
            }
            Lifecycle::Scoped => {
                let Some(context) = context else {
                    let err = ResolveErrorKind::MissingContext {
                        token: self.token.clone(),
                    };
                    error!("{}", err);
                    return Err(err);
                };

                let slot = self.scoped.slot(&context);
                if let Some(lazy) = slot.get() {
                    debug!(context = ?context.id(), "Found in cache");
                    return Ok(lazy);
                }
                debug!(context = ?context.id(), "Not found in cache");

                slot.get_or_try_init(
                    || self.resolver.resolve(&self.token, bundle.with_context(context.clone())),
                    || self.cyclic(),
                )
            }
        }
    }

    /// Resolves the registration and attaches the expected type to the handle.
    ///
    /// # Errors
    /// See [`Self::resolve`] and [`AnyLazy::downcast`]
    #[inline]
    pub fn resolve_as<T: Send + Sync + 'static>(&self, options: ResolveOptions) -> Result<Lazy<T>, ResolveErrorKind> {
        self.resolve(options)?.downcast()
    }

    /// Creates a registration with the same resolver and an empty memo.
    ///
    /// Set fields of `options` override the ones of `self`, unset ones are inherited.
    /// Resolving the clone never touches the memo of the original and vice versa.
    #[must_use]
    pub fn clone_with(&self, options: Options) -> Self {
        let Options {
            token,
            lifecycle,
            access,
            bundle,
            context,
        } = options;

        Self::from_parts(
            token.unwrap_or_else(|| self.token.clone()),
            self.resolver.clone(),
            lifecycle.unwrap_or(self.lifecycle),
            access.unwrap_or(self.access),
            bundle.or_else(|| self.bundle.clone()),
            context.or_else(|| self.context.clone()),
        )
    }

    fn cyclic(&self) -> ResolveErrorKind {
        let err = ResolveErrorKind::CyclicConstruction {
            token: self.token.clone(),
        };
        error!("{}", err);
        err
    }
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("token", &self.token)
            .field("resolver", &self.resolver)
            .field("lifecycle", &self.lifecycle)
            .field("access", &self.access)
            .field("bundle", &self.bundle.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::Registration;
    use crate::{
        bundle::Bundle,
        config::{Options, ResolveOptions},
        context::{Context, ContextValues},
        errors::{InstantiateErrorKind, ResolveErrorKind},
        lifecycle::{Access, Lifecycle},
        resolver::{factory, function, value},
    };

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use tracing_test::traced_test;

    struct Service(u8);

    fn counted(calls: &Arc<AtomicU8>, options: Options) -> Registration {
        let calls = calls.clone();
        Registration::create(
            factory(move |_bundle: Bundle| Ok::<_, InstantiateErrorKind>(Service(calls.fetch_add(1, Ordering::SeqCst)))),
            options,
        )
    }

    #[test]
    #[traced_test]
    fn test_defaults() {
        let registration = Registration::create(value(Service(0)), Options::new());

        assert_eq!(registration.token(), "Service");
        assert_eq!(registration.lifecycle(), Lifecycle::Singleton);
        assert_eq!(registration.access(), Access::Public);
        assert!(registration.bundle().is_none());
    }

    #[test]
    fn test_default_token_of_generic() {
        let registration = Registration::create(value(Some(Service(0))), Options::new());

        assert_eq!(registration.token(), "Option");
    }

    #[test]
    #[traced_test]
    fn test_singleton_identity() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service"));

        let first = registration.resolve_as::<Service>(ResolveOptions::new()).unwrap();
        let second = registration
            .resolve_as::<Service>(ResolveOptions::new().context(Context::new()))
            .unwrap();

        assert!(first.ptr_eq(&second));
        assert!(Arc::ptr_eq(&first.get().unwrap(), &second.get().unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(logs_contain("Found in cache"));
    }

    #[test]
    #[traced_test]
    fn test_transient_distinct() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service").transient());

        let instances: std::vec::Vec<_> = (0..3)
            .map(|_| {
                registration
                    .resolve_as::<Service>(ResolveOptions::new())
                    .unwrap()
                    .get()
                    .unwrap()
            })
            .collect();

        assert!(!Arc::ptr_eq(&instances[0], &instances[1]));
        assert!(!Arc::ptr_eq(&instances[1], &instances[2]));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    #[traced_test]
    fn test_scoped_determinism() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service").scoped());
        let context_1 = Context::new();
        let context_2 = Context::new();

        let resolve = |context: &Context| {
            registration
                .resolve_as::<Service>(ResolveOptions::new().context(context.clone()))
                .unwrap()
                .get()
                .unwrap()
        };

        let first = resolve(&context_1);
        let second = resolve(&context_1);
        let other = resolve(&context_2);

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_scoped_missing_context() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service").scoped());

        assert!(matches!(
            registration.resolve(ResolveOptions::new()),
            Err(ResolveErrorKind::MissingContext { token }) if token == "service"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(logs_contain("Missing resolution context"));
    }

    #[test]
    #[traced_test]
    fn test_scoped_with_bound_context() {
        let calls = Arc::new(AtomicU8::new(0));
        let context = Context::new();
        let registration = counted(&calls, Options::new().token("service").scoped().context(context.clone()));

        let bound = registration.resolve(ResolveOptions::new()).unwrap();
        let explicit = registration.resolve(ResolveOptions::new().context(context)).unwrap();

        assert!(bound.ptr_eq(&explicit));
    }

    #[test]
    #[traced_test]
    fn test_scoped_factory_reads_context() {
        struct RequestId(u32);

        let registration = Registration::create(
            factory(|bundle: Bundle| -> Result<u32, InstantiateErrorKind> {
                let request_id = bundle
                    .context()
                    .and_then(Context::get::<RequestId>)
                    .ok_or_else(|| anyhow::anyhow!("no request id"))?;
                Ok(request_id.0)
            }),
            Options::new().token("request_id").scoped(),
        );

        let mut values = ContextValues::new();
        values.insert(RequestId(42));
        let lazy = registration
            .resolve_as::<u32>(ResolveOptions::new().context(Context::with_values(values)))
            .unwrap();

        assert_eq!(*lazy.get().unwrap(), 42);
    }

    #[test]
    #[traced_test]
    fn test_singleton_factory_has_no_context() {
        let registration = Registration::create(
            factory(|bundle: Bundle| Ok::<_, InstantiateErrorKind>(bundle.context().is_some())),
            Options::new().token("has_context"),
        );

        let lazy = registration
            .resolve_as::<bool>(ResolveOptions::new().context(Context::new()))
            .unwrap();

        assert!(!*lazy.get().unwrap());
    }

    #[test]
    #[traced_test]
    fn test_clone_independence() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service"));
        let clone = registration.clone_with(Options::new());

        let original = registration.resolve_as::<Service>(ResolveOptions::new()).unwrap();
        let cloned = clone.resolve_as::<Service>(ResolveOptions::new()).unwrap();

        assert_eq!(clone.token(), "service");
        assert_eq!(clone.lifecycle(), Lifecycle::Singleton);
        assert!(!original.ptr_eq(&cloned));
        assert!(!Arc::ptr_eq(&original.get().unwrap(), &cloned.get().unwrap()));
        assert!(cloned.ptr_eq(&clone.resolve_as::<Service>(ResolveOptions::new()).unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[traced_test]
    fn test_clone_overrides_lifecycle() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = counted(&calls, Options::new().token("service"));
        let clone = registration.clone_with(Options::new().transient().token("service_transient"));

        let first = clone.resolve_as::<Service>(ResolveOptions::new()).unwrap().get().unwrap();
        let second = clone.resolve_as::<Service>(ResolveOptions::new()).unwrap().get().unwrap();

        assert_eq!(clone.token(), "service_transient");
        assert_eq!(clone.lifecycle(), Lifecycle::Transient);
        assert_eq!(registration.lifecycle(), Lifecycle::Singleton);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    #[traced_test]
    fn test_function_error_is_not_cached() {
        let calls = Arc::new(AtomicU8::new(0));
        let registration = Registration::create(
            function({
                let calls = calls.clone();
                move || {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err(anyhow::anyhow!("not ready"));
                    }
                    Ok(Service(1))
                }
            }),
            Options::new().token("service"),
        );

        assert!(matches!(
            registration.resolve(ResolveOptions::new()),
            Err(ResolveErrorKind::Instantiate { .. })
        ));
        assert!(registration.resolve(ResolveOptions::new()).unwrap().is_resolved());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
