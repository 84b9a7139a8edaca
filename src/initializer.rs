use alloc::boxed::Box;
use core::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{bundle::Bundle, errors::InitializeErrorKind, token::Token, utils::future::BoxFuture};

/// Asynchronous setup of a resource owned by a registration, e.g. opening a database pool.
///
/// Initializers of a [`crate::Module`] run one after another in the order they were added,
/// so an initializer may rely on every earlier one being done.
pub trait Initializer: Send + Sync + 'static {
    fn initialize(&self) -> impl Future<Output = Result<(), anyhow::Error>> + Send;

    /// Releases the resource. Called in reverse order of initialization
    fn terminate(&self) -> impl Future<Output = Result<(), anyhow::Error>> + Send {
        async { Ok(()) }
    }
}

type BoxedHook = Box<dyn Fn(Bundle, Token) -> BoxFuture<'static, Result<(), InitializeErrorKind>> + Send + Sync>;

pub(crate) struct InitializerEntry {
    token: Token,
    bundle: Bundle,
    initialize: BoxedHook,
    terminate: BoxedHook,
    initialized: AtomicBool,
}

impl InitializerEntry {
    /// Hooks of the registration `token`, resolved through `bundle` when they run
    #[must_use]
    pub(crate) fn new<T: Initializer>(token: Token, bundle: Bundle) -> Self {
        Self {
            token,
            bundle,
            initialize: Box::new(|bundle: Bundle, token: Token| -> BoxFuture<'static, Result<(), InitializeErrorKind>> {
                Box::pin(run_initialize::<T>(bundle, token))
            }),
            terminate: Box::new(|bundle: Bundle, token: Token| -> BoxFuture<'static, Result<(), InitializeErrorKind>> {
                Box::pin(run_terminate::<T>(bundle, token))
            }),
            initialized: AtomicBool::new(false),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn token(&self) -> &Token {
        &self.token
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    pub(crate) async fn initialize(&self) -> Result<(), InitializeErrorKind> {
        (self.initialize)(self.bundle.clone(), self.token.clone()).await?;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Runs the terminate hook if the entry was initialized. The entry can be initialized again afterwards
    pub(crate) async fn terminate(&self) -> Result<(), InitializeErrorKind> {
        if !self.initialized.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        (self.terminate)(self.bundle.clone(), self.token.clone()).await
    }
}

async fn run_initialize<T: Initializer>(bundle: Bundle, token: Token) -> Result<(), InitializeErrorKind> {
    let initializer = bundle.get::<T>(token.as_str())?;
    initializer
        .initialize()
        .await
        .map_err(|error| InitializeErrorKind::Failed { token, error })
}

async fn run_terminate<T: Initializer>(bundle: Bundle, token: Token) -> Result<(), InitializeErrorKind> {
    let initializer = bundle.get::<T>(token.as_str())?;
    initializer
        .terminate()
        .await
        .map_err(|error| InitializeErrorKind::TerminateFailed { token, error })
}
