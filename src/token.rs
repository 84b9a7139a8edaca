use alloc::{borrow::Cow, string::String};
use core::{
    borrow::Borrow,
    fmt::{self, Display, Formatter},
};

/// Name of a registration, unique within a single container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(Cow<'static, str>);

impl Token {
    #[inline]
    #[must_use]
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Token {
    #[inline]
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

impl From<String> for Token {
    #[inline]
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<&Token> for Token {
    #[inline]
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

impl AsRef<str> for Token {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Token {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Display for Token {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Token {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Token {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}
