use crate::{
    bundle::Bundle,
    context::Context,
    lifecycle::{Access, Lifecycle},
    token::Token,
};

/// Options of a registration
/// ## Fields
/// - `token`:
///   Name of the registration. Defaults to the short type name of the provided value.
/// - `lifecycle`:
///   Caching policy, see [`Lifecycle`]. Defaults to [`Lifecycle::Singleton`].
/// - `access`:
///   Visibility when the owning container is imported into another one, see [`Access`].
///   Defaults to [`Access::Public`].
/// - `bundle`:
///   Dependency view passed to the factory. If unset, the bundle of the container the registration
///   is pushed into is used, and then the one passed to [`crate::Registration::resolve`].
/// - `context`:
///   Context bound to the registration, used by scoped resolutions without an explicit one.
///
/// When cloning a registration with [`crate::Registration::clone_with`], unset fields are inherited.
#[derive(Clone, Default, Debug)]
pub struct Options {
    pub token: Option<Token>,
    pub lifecycle: Option<Lifecycle>,
    pub access: Option<Access>,
    pub bundle: Option<Bundle>,
    pub context: Option<Context>,
}

impl Options {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn token(mut self, token: impl Into<Token>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    #[inline]
    #[must_use]
    pub fn singleton(self) -> Self {
        self.lifecycle(Lifecycle::Singleton)
    }

    #[inline]
    #[must_use]
    pub fn transient(self) -> Self {
        self.lifecycle(Lifecycle::Transient)
    }

    #[inline]
    #[must_use]
    pub fn scoped(self) -> Self {
        self.lifecycle(Lifecycle::Scoped)
    }

    #[inline]
    #[must_use]
    pub fn access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    #[inline]
    #[must_use]
    pub fn bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    #[inline]
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}

/// Per-call options of [`crate::Registration::resolve`]
#[derive(Clone, Default, Debug)]
pub struct ResolveOptions {
    pub bundle: Option<Bundle>,
    pub context: Option<Context>,
}

impl ResolveOptions {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn bundle(mut self, bundle: Bundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    #[inline]
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }
}
