use alloc::{
    collections::BTreeSet,
    string::String,
    sync::{Arc, Weak},
    vec,
    vec::Vec,
};
use core::fmt::{self, Debug, Formatter};
use tracing::{debug, debug_span, error, warn};

use crate::{
    config::ResolveOptions,
    container::ContainerInner,
    context::Context,
    errors::ResolveErrorKind,
    lazy::{AnyLazy, Lazy},
    registration::Registration,
    token::Token,
};

/// Read-only view over the registrations of one or more containers, passed to every factory.
///
/// Reading a token resolves the matching registration on demand. Registrations are never added
/// through a bundle, see [`Bundle::insert`].
///
/// A bundle holds its containers weakly, so factories storing it don't keep their container alive.
/// Reading through a bundle whose container was dropped fails with [`ResolveErrorKind::ContainerDropped`].
#[derive(Clone, Default)]
pub struct Bundle {
    sources: Vec<Weak<ContainerInner>>,
    context: Option<Context>,
}

impl Bundle {
    /// Bundle without any registration. Every read fails with [`ResolveErrorKind::UnknownToken`].
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub(crate) fn from_container(container: &Arc<ContainerInner>) -> Self {
        Self {
            sources: vec![Arc::downgrade(container)],
            context: None,
        }
    }

    /// Context the bundle resolves scoped registrations in
    #[inline]
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }

    #[must_use]
    pub fn with_context(&self, context: Context) -> Self {
        Self {
            sources: self.sources.clone(),
            context: Some(context),
        }
    }

    #[must_use]
    pub fn without_context(&self) -> Self {
        Self {
            sources: self.sources.clone(),
            context: None,
        }
    }

    /// Combines two views without changing either of them.
    ///
    /// Tokens of `other` shadow the same tokens of `self`. The context of `self` wins if both have one.
    #[must_use]
    pub fn merge(&self, other: &Bundle) -> Self {
        let mut sources = Vec::with_capacity(self.sources.len() + other.sources.len());
        sources.extend(self.sources.iter().cloned());
        sources.extend(other.sources.iter().cloned());

        Self {
            sources,
            context: self.context.clone().or_else(|| other.context.clone()),
        }
    }

    /// Returns the handle of `token`. Lazy registrations aren't constructed until the handle is used.
    ///
    /// # Errors
    /// - Returns [`ResolveErrorKind::UnknownToken`] if no container of the bundle has the token
    /// - Returns [`ResolveErrorKind::ContainerDropped`] if no live container of the bundle has `token` and one of them was dropped
    /// - Returns errors of [`Registration::resolve`]
    pub fn get_any(&self, token: &str) -> Result<AnyLazy, ResolveErrorKind> {
        let span = debug_span!("bundle_read", token);
        let _guard = span.enter();

        let registration = self.lookup(token)?;
        registration.resolve(ResolveOptions {
            bundle: Some(self.without_context()),
            context: self.context.clone(),
        })
    }

    /// Returns the typed handle of `token` without constructing it.
    ///
    /// Store this one when two components depend on each other.
    ///
    /// # Errors
    /// See [`Self::get_any`] and [`AnyLazy::downcast`]
    #[inline]
    pub fn lazy<T: Send + Sync + 'static>(&self, token: &str) -> Result<Lazy<T>, ResolveErrorKind> {
        self.get_any(token)?.downcast()
    }

    /// Resolves `token` and returns its instance, constructing it if needed.
    ///
    /// # Errors
    /// See [`Self::lazy`] and [`Lazy::get`]
    #[inline]
    pub fn get<T: Send + Sync + 'static>(&self, token: &str) -> Result<Arc<T>, ResolveErrorKind> {
        self.lazy::<T>(token)?.get()
    }

    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.sources
            .iter()
            .filter_map(Weak::upgrade)
            .any(|container| container.lookup(token).is_some())
    }

    /// Tokens visible through the bundle, in registration order, each once.
    #[must_use]
    pub fn keys(&self) -> Vec<Token> {
        let mut seen = BTreeSet::new();
        let mut keys = Vec::new();
        for container in self.sources.iter().filter_map(Weak::upgrade) {
            for token in container.tokens() {
                if seen.insert(token.clone()) {
                    keys.push(token);
                }
            }
        }
        keys
    }

    /// Always fails: registrations are added through [`crate::Container::push`] only.
    ///
    /// # Errors
    /// Returns [`ResolveErrorKind::BundleMutation`]
    pub fn insert<T>(&self, token: impl Into<Token>, _value: T) -> Result<(), ResolveErrorKind> {
        let err = ResolveErrorKind::BundleMutation { token: token.into() };
        warn!("{}", err);
        Err(err)
    }

    fn lookup(&self, token: &str) -> Result<Arc<Registration>, ResolveErrorKind> {
        let mut dropped = false;
        for source in self.sources.iter().rev() {
            let Some(container) = source.upgrade() else {
                dropped = true;
                continue;
            };
            if let Some(registration) = container.lookup(token) {
                debug!("Found registration");
                return Ok(registration);
            }
        }

        // The token may have been owned by a dropped source
        if dropped {
            let err = ResolveErrorKind::ContainerDropped;
            error!("{}", err);
            return Err(err);
        }

        let err = ResolveErrorKind::UnknownToken {
            token: Token::from(String::from(token)),
        };
        warn!("{}", err);
        Err(err)
    }
}

impl Debug for Bundle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("sources", &self.sources.len())
            .field("context", &self.context)
            .finish()
    }
}
