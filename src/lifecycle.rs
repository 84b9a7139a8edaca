use alloc::string::ToString as _;
use core::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::errors::ResolveErrorKind;

/// Caching policy of a registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    /// Factory runs at most once over the lifetime of the registration.
    #[default]
    Singleton,
    /// Factory runs on every resolution.
    Transient,
    /// Factory runs once per [`crate::Context`]. Resolving without a context fails.
    Scoped,
}

impl Lifecycle {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Lifecycle::Singleton => "singleton",
            Lifecycle::Transient => "transient",
            Lifecycle::Scoped => "scoped",
        }
    }
}

impl Display for Lifecycle {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Lifecycle {
    type Err = ResolveErrorKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "singleton" => Ok(Lifecycle::Singleton),
            "transient" => Ok(Lifecycle::Transient),
            "scoped" => Ok(Lifecycle::Scoped),
            _ => Err(ResolveErrorKind::InvalidLifecycle { value: value.to_string() }),
        }
    }
}

/// Visibility of a registration when its container is composed into another one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Access {
    /// Part of the module API, visible to every importer.
    #[default]
    Public,
    /// Never leaves the container it was pushed into.
    Private,
    /// Visible to the direct importer only. Inside the importer it becomes [`Access::Private`].
    Internal,
    /// Supplied from outside the module (host configuration, clients) and passed along like [`Access::Public`].
    External,
}

impl Access {
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Access::Public => "public",
            Access::Private => "private",
            Access::Internal => "internal",
            Access::External => "external",
        }
    }

    /// Access the registration gets in an importing container, `None` if it doesn't cross the boundary.
    #[inline]
    #[must_use]
    pub const fn exported(&self) -> Option<Access> {
        match self {
            Access::Public => Some(Access::Public),
            Access::External => Some(Access::External),
            Access::Internal => Some(Access::Private),
            Access::Private => None,
        }
    }
}

impl Display for Access {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Access {
    type Err = ResolveErrorKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "public" => Ok(Access::Public),
            "private" => Ok(Access::Private),
            "internal" => Ok(Access::Internal),
            "external" => Ok(Access::External),
            _ => Err(ResolveErrorKind::InvalidAccess { value: value.to_string() }),
        }
    }
}
