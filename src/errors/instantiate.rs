use alloc::boxed::Box;

use super::ResolveErrorKind;

/// Error returned by factories.
///
/// Reading a dependency from a [`crate::Bundle`] returns [`ResolveErrorKind`],
/// which converts into [`InstantiateErrorKind::Dependency`], so factories can use `?` on bundle reads.
#[derive(thiserror::Error, Debug)]
pub enum InstantiateErrorKind {
    #[error(transparent)]
    Dependency(Box<ResolveErrorKind>),
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

impl From<ResolveErrorKind> for InstantiateErrorKind {
    #[inline]
    fn from(err: ResolveErrorKind) -> Self {
        Self::Dependency(Box::new(err))
    }
}
