use alloc::sync::Arc;

use crate::{any::RcAny, bundle::Bundle, errors::InstantiateErrorKind};

/// Construction strategy of a registration.
///
/// Implemented for closures and functions taking either nothing or the [`Bundle`] of the container:
/// ```rust
/// use tangle::{Bundle, InstantiatorResult};
///
/// struct Pool;
/// struct UserRepo(std::sync::Arc<Pool>);
///
/// fn user_repo(bundle: Bundle) -> InstantiatorResult<UserRepo> {
///     Ok(UserRepo(bundle.get("pool")?))
/// }
/// ```
pub trait Instantiator<Args>: Send + Sync + 'static {
    type Provides: Send + Sync + 'static;
    type Error: Into<InstantiateErrorKind>;

    fn instantiate(&self, bundle: Bundle) -> Result<Self::Provides, Self::Error>;
}

impl<F, Response, Err> Instantiator<()> for F
where
    F: Fn() -> Result<Response, Err> + Send + Sync + 'static,
    Response: Send + Sync + 'static,
    Err: Into<InstantiateErrorKind>,
{
    type Provides = Response;
    type Error = Err;

    #[inline]
    fn instantiate(&self, _bundle: Bundle) -> Result<Self::Provides, Self::Error> {
        self()
    }
}

impl<F, Response, Err> Instantiator<(Bundle,)> for F
where
    F: Fn(Bundle) -> Result<Response, Err> + Send + Sync + 'static,
    Response: Send + Sync + 'static,
    Err: Into<InstantiateErrorKind>,
{
    type Provides = Response;
    type Error = Err;

    #[inline]
    fn instantiate(&self, bundle: Bundle) -> Result<Self::Provides, Self::Error> {
        self(bundle)
    }
}

/// Constructor-like strategy: the type knows how to build itself from the bundle.
pub trait Construct: Sized + Send + Sync + 'static {
    /// # Errors
    /// Any error of the dependencies or of the construction itself
    fn construct(bundle: Bundle) -> Result<Self, InstantiateErrorKind>;
}

pub(crate) type BoxedInstantiator = Arc<dyn Fn(Bundle) -> Result<RcAny, InstantiateErrorKind> + Send + Sync>;

#[must_use]
pub(crate) fn boxed_instantiator<Inst, Args>(instantiator: Inst) -> BoxedInstantiator
where
    Inst: Instantiator<Args>,
{
    Arc::new(move |bundle: Bundle| -> Result<RcAny, InstantiateErrorKind> {
        match instantiator.instantiate(bundle) {
            Ok(dependency) => Ok(Arc::new(dependency) as RcAny),
            Err(err) => Err(err.into()),
        }
    })
}

#[must_use]
pub(crate) fn boxed_constructor<T: Construct>() -> BoxedInstantiator {
    Arc::new(|bundle: Bundle| -> Result<RcAny, InstantiateErrorKind> {
        T::construct(bundle).map(|dependency| Arc::new(dependency) as RcAny)
    })
}
