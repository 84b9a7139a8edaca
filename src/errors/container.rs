use crate::token::Token;

#[derive(thiserror::Error, Debug)]
pub enum ContainerErrorKind {
    #[error("Registration with token `{token}` is already bound in this container")]
    DuplicateRegistration { token: Token },
}
