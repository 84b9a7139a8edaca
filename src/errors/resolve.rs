use alloc::string::String;

use super::InstantiateErrorKind;
use crate::{any::TypeInfo, token::Token};

#[derive(thiserror::Error, Debug)]
pub enum ResolveErrorKind {
    #[error("Could not resolve dependency `{token}`: invalid registration token")]
    UnknownToken { token: Token },
    #[error("Registration should not be done through bundle. Attempted to set `{token}`")]
    BundleMutation { token: Token },
    #[error("Missing resolution context for scoped registration `{token}`")]
    MissingContext { token: Token },
    #[error("Invalid lifecycle `{value}`. Expected one of: singleton, transient, scoped")]
    InvalidLifecycle { value: String },
    #[error("Invalid access `{value}`. Expected one of: public, private, internal, external")]
    InvalidAccess { value: String },
    #[error(
        "\
        Cyclic construction of `{token}`. \
        It was accessed while its own factory was still running. \
        Store the lazy handle instead of dereferencing it during construction\
        "
    )]
    CyclicConstruction { token: Token },
    #[error("Container behind the bundle was dropped")]
    ContainerDropped,
    #[error("Incorrect type of `{token}`. Actual: {}, expected: {}", actual.name, expected.name)]
    IncorrectType {
        token: Token,
        expected: TypeInfo,
        actual: TypeInfo,
    },
    #[error("Failed to instantiate `{token}`")]
    Instantiate { token: Token, source: InstantiateErrorKind },
}

impl ResolveErrorKind {
    /// Unwraps the chain of failed factories down to the error that started it.
    ///
    /// A dependency error raised deep inside a graph reaches the caller wrapped once
    /// per factory on the way up; this returns the innermost one.
    #[must_use]
    pub fn root_cause(&self) -> &ResolveErrorKind {
        let mut current = self;
        while let Self::Instantiate {
            source: InstantiateErrorKind::Dependency(inner),
            ..
        } = current
        {
            current = inner;
        }
        current
    }
}
