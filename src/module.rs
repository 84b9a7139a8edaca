use alloc::{borrow::Cow, sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, Instrument as _};

use crate::{
    bundle::Bundle,
    container::Container,
    errors::{ContainerErrorKind, InitializeErrorKind, ResolveErrorKind},
    initializer::{Initializer, InitializerEntry},
    registration::Registration,
    token::Token,
};

struct ModuleInner {
    name: Cow<'static, str>,
    container: Container,
    initializers: Mutex<Vec<Arc<InitializerEntry>>>,
}

/// Named [`Container`] with an ordered list of asynchronous initializers.
///
/// ```rust
/// use tangle::{factory, value, Access, Bundle, InstantiatorResult, Module, Options, Registration};
/// use std::sync::Arc;
///
/// struct Pool(&'static str);
/// struct UserRepo(Arc<Pool>);
///
/// let database = Module::new("database");
/// database
///     .push(Registration::create(value(Pool("postgres")), Options::new().token("pool").access(Access::Private)))
///     .unwrap()
///     .push(Registration::create(
///         factory(|bundle: Bundle| -> InstantiatorResult<UserRepo> { Ok(UserRepo(bundle.get("pool")?)) }),
///         Options::new().token("user_repo"),
///     ))
///     .unwrap();
///
/// let app = Module::new("app");
/// app.use_module(&database).unwrap();
///
/// assert!(app.has("user_repo"));
/// assert!(!app.has("pool"));
/// assert_eq!(app.provide::<UserRepo>("user_repo").unwrap().0 .0, "postgres");
/// ```
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl Module {
    #[must_use]
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            inner: Arc::new(ModuleInner {
                name: name.into(),
                container: Container::new(),
                initializers: Mutex::new(Vec::new()),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[inline]
    #[must_use]
    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    #[inline]
    #[must_use]
    pub fn bundle(&self) -> Bundle {
        self.inner.container.bundle()
    }

    /// See [`Container::push`]
    ///
    /// # Errors
    /// Returns [`ContainerErrorKind::DuplicateRegistration`] if the token is already bound in the module
    #[inline]
    pub fn push(&self, registration: Registration) -> Result<&Self, ContainerErrorKind> {
        self.inner.container.push(registration)?;
        Ok(self)
    }

    /// Imports the exported registrations of `other` and appends its initializers,
    /// skipping the ones this module already has.
    ///
    /// # Errors
    /// See [`Container::use_container`]
    pub fn use_module(&self, other: &Module) -> Result<&Self, ContainerErrorKind> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return Ok(self);
        }

        self.inner.container.use_container(&other.inner.container)?;

        let imported = other.inner.initializers.lock().clone();
        let mut initializers = self.inner.initializers.lock();
        for entry in imported {
            if !initializers.iter().any(|existing| Arc::ptr_eq(existing, &entry)) {
                initializers.push(entry);
            }
        }

        debug!(module = %self.inner.name, imported = %other.inner.name, "Module imported");
        Ok(self)
    }

    /// Registers `T`, bound to `token` in this module, as an initializer.
    ///
    /// The registration is looked up when [`Self::initialize`] runs, so it may be pushed later.
    pub fn add_initializer<T: Initializer>(&self, token: impl Into<Token>) -> &Self {
        let entry = InitializerEntry::new::<T>(token.into(), self.bundle());
        debug!(module = %self.inner.name, token = %entry.token(), "Initializer added");

        self.inner.initializers.lock().push(Arc::new(entry));
        self
    }

    /// Runs initializers one by one in the order they were added.
    ///
    /// Already initialized entries are skipped, so calling it again after a failure
    /// resumes from the failed initializer.
    ///
    /// # Errors
    /// Returns the error of the first failed initializer. The rest of them don't run
    pub async fn initialize(&self) -> Result<(), InitializeErrorKind> {
        let entries = self.inner.initializers.lock().clone();

        for entry in entries {
            if entry.is_initialized() {
                debug!(token = %entry.token(), "Already initialized");
                continue;
            }

            let span = info_span!("initialize", module = %self.inner.name, token = %entry.token());
            if let Err(err) = entry.initialize().instrument(span).await {
                error!("{}", err);
                return Err(err);
            }
            info!(module = %self.inner.name, token = %entry.token(), "Initialized");
        }
        Ok(())
    }

    /// Runs terminate hooks of initialized entries in reverse order.
    ///
    /// Every hook runs even if an earlier one fails.
    ///
    /// # Errors
    /// Returns the error of the first failed hook
    pub async fn terminate(&self) -> Result<(), InitializeErrorKind> {
        let entries = self.inner.initializers.lock().clone();

        let mut first_err = None;
        for entry in entries.iter().rev() {
            let span = info_span!("terminate", module = %self.inner.name, token = %entry.token());
            if let Err(err) = entry.terminate().instrument(span).await {
                error!("{}", err);
                first_err.get_or_insert(err);
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Returns `true` if every initializer of the module is initialized
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initializers.lock().iter().all(|entry| entry.is_initialized())
    }

    /// Tokens of the initializers in the order they run
    #[must_use]
    pub fn initializers(&self) -> Vec<Token> {
        self.inner
            .initializers
            .lock()
            .iter()
            .map(|entry| entry.token().clone())
            .collect()
    }

    #[inline]
    #[must_use]
    pub fn has(&self, token: &str) -> bool {
        self.inner.container.has(token)
    }

    /// See [`Container::provide`]
    ///
    /// # Errors
    /// See [`Bundle::get`]
    #[inline]
    pub fn provide<T: Send + Sync + 'static>(&self, token: &str) -> Result<Arc<T>, ResolveErrorKind> {
        self.inner.container.provide(token)
    }
}

impl Debug for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.inner.name)
            .field("container", &self.inner.container)
            .field("initializers", &self.initializers())
            .finish()
    }
}
