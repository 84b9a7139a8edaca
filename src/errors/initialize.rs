use super::ResolveErrorKind;
use crate::token::Token;

#[derive(thiserror::Error, Debug)]
pub enum InitializeErrorKind {
    #[error(transparent)]
    Resolve(#[from] ResolveErrorKind),
    #[error("Initializer `{token}` failed: {error}")]
    Failed { token: Token, error: anyhow::Error },
    #[error("Terminate hook of `{token}` failed: {error}")]
    TerminateFailed { token: Token, error: anyhow::Error },
}
