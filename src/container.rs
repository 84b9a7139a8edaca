use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info_span};

use crate::{
    bundle::Bundle,
    context::Context,
    errors::{ContainerErrorKind, ResolveErrorKind},
    lazy::Lazy,
    lifecycle::Access,
    registration::Registration,
    token::Token,
};

struct Entry {
    registration: Arc<Registration>,
    access: Access,
}

#[derive(Default)]
struct Entries {
    list: Vec<Entry>,
    index: BTreeMap<Token, usize>,
}

impl Entries {
    fn get(&self, token: &str) -> Option<&Entry> {
        self.index.get(token).map(|&idx| &self.list[idx])
    }

    fn insert(&mut self, registration: Arc<Registration>, access: Access) {
        self.index.insert(registration.token().clone(), self.list.len());
        self.list.push(Entry { registration, access });
    }
}

pub(crate) struct ContainerInner {
    entries: RwLock<Entries>,
    imports: Mutex<Vec<Container>>,
}

impl ContainerInner {
    pub(crate) fn lookup(&self, token: &str) -> Option<Arc<Registration>> {
        self.entries.read().get(token).map(|entry| entry.registration.clone())
    }

    pub(crate) fn tokens(&self) -> Vec<Token> {
        self.entries
            .read()
            .list
            .iter()
            .map(|entry| entry.registration.token().clone())
            .collect()
    }
}

/// Ordered set of registrations with unique tokens.
///
/// Registrations pushed without a bundle are bound to [`Container::bundle`], so their factories
/// see every sibling registration, including the ones pushed later or imported from other containers.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                entries: RwLock::new(Entries::default()),
                imports: Mutex::new(Vec::new()),
            }),
        }
    }

    /// View over the registrations of the container
    #[inline]
    #[must_use]
    pub fn bundle(&self) -> Bundle {
        Bundle::from_container(&self.inner)
    }

    /// Adds a registration.
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::DuplicateRegistration`] if the token is already bound in the container
    pub fn push(&self, registration: Registration) -> Result<&Self, ContainerErrorKind> {
        let registration = registration.bind_bundle(self.bundle());

        let mut entries = self.inner.entries.write();
        if entries.get(registration.token().as_str()).is_some() {
            let err = ContainerErrorKind::DuplicateRegistration {
                token: registration.token().clone(),
            };
            error!("{}", err);
            return Err(err);
        }

        debug!(token = %registration.token(), lifecycle = %registration.lifecycle(), "Registered");
        let access = registration.access();
        entries.insert(Arc::new(registration), access);
        Ok(self)
    }

    /// Adds all registrations or none of them.
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::DuplicateRegistration`] if a token is already bound in the container
    /// or repeats within `registrations`
    pub fn push_all(&self, registrations: impl IntoIterator<Item = Registration>) -> Result<&Self, ContainerErrorKind> {
        let registrations: Vec<_> = registrations
            .into_iter()
            .map(|registration| registration.bind_bundle(self.bundle()))
            .collect();

        let mut entries = self.inner.entries.write();
        let mut batch = BTreeMap::new();
        for registration in &registrations {
            if entries.get(registration.token().as_str()).is_some() || batch.insert(registration.token().clone(), ()).is_some() {
                let err = ContainerErrorKind::DuplicateRegistration {
                    token: registration.token().clone(),
                };
                error!("{}", err);
                return Err(err);
            }
        }

        for registration in registrations {
            debug!(token = %registration.token(), lifecycle = %registration.lifecycle(), "Registered");
            let access = registration.access();
            entries.insert(Arc::new(registration), access);
        }
        Ok(self)
    }

    /// Imports the registrations of `other` that cross a container boundary, see [`Access::exported`].
    ///
    /// Imported registrations keep resolving through the bundle of `other`, so their private
    /// dependencies stay reachable for them while being invisible here. `other` is kept alive by `self`.
    /// Importing the same registration twice, e.g. through two modules sharing a dependency, is a no-op.
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::DuplicateRegistration`] if an exported token is already bound
    /// to another registration. Nothing is imported in this case
    pub fn use_container(&self, other: &Container) -> Result<&Self, ContainerErrorKind> {
        if self.ptr_eq(other) {
            return Ok(self);
        }

        let exported: Vec<_> = other
            .inner
            .entries
            .read()
            .list
            .iter()
            .filter_map(|entry| {
                entry
                    .access
                    .exported()
                    .map(|access| (entry.registration.clone(), access))
            })
            .collect();

        {
            let mut entries = self.inner.entries.write();
            let mut imported = Vec::with_capacity(exported.len());
            for (registration, access) in exported {
                match entries.get(registration.token().as_str()) {
                    Some(entry) if Arc::ptr_eq(&entry.registration, &registration) => {
                        debug!(token = %registration.token(), "Already imported");
                    }
                    Some(_) => {
                        let err = ContainerErrorKind::DuplicateRegistration {
                            token: registration.token().clone(),
                        };
                        error!("{}", err);
                        return Err(err);
                    }
                    None => imported.push((registration, access)),
                }
            }

            for (registration, access) in imported {
                debug!(token = %registration.token(), %access, "Imported");
                entries.insert(registration, access);
            }
        }

        let mut imports = self.inner.imports.lock();
        if !imports.iter().any(|import| import.ptr_eq(other)) {
            imports.push(other.clone());
        }
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn has(&self, token: &str) -> bool {
        self.inner.entries.read().get(token).is_some()
    }

    #[inline]
    #[must_use]
    pub fn registration(&self, token: &str) -> Option<Arc<Registration>> {
        self.inner.lookup(token)
    }

    /// Access of `token` in this container. Imported registrations may differ from their origin.
    #[inline]
    #[must_use]
    pub fn access(&self, token: &str) -> Option<Access> {
        self.inner.entries.read().get(token).map(|entry| entry.access)
    }

    /// Resolves `token` outside of any factory, e.g. while bootstrapping the application.
    ///
    /// # Errors
    /// See [`Bundle::get`]
    pub fn provide<T: Send + Sync + 'static>(&self, token: &str) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("provide", token);
        let _guard = span.enter();

        self.bundle().get(token)
    }

    /// Resolves `token` in `context`. Required for scoped registrations.
    ///
    /// # Errors
    /// See [`Bundle::get`]
    pub fn provide_in<T: Send + Sync + 'static>(&self, token: &str, context: &Context) -> Result<Arc<T>, ResolveErrorKind> {
        let span = info_span!("provide", token, context = ?context.id());
        let _guard = span.enter();

        self.bundle().with_context(context.clone()).get(token)
    }

    /// Returns the handle of `token` without constructing it.
    ///
    /// # Errors
    /// See [`Bundle::lazy`]
    #[inline]
    pub fn provide_lazy<T: Send + Sync + 'static>(&self, token: &str) -> Result<Lazy<T>, ResolveErrorKind> {
        self.bundle().lazy(token)
    }

    /// Tokens of the container in registration order, imported ones included
    #[inline]
    #[must_use]
    pub fn keys(&self) -> Vec<Token> {
        self.inner.tokens()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.entries.read().list.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Container {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Container {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("keys", &self.keys())
            .field("imports", &self.inner.imports.lock().len())
            .finish()
    }
}
