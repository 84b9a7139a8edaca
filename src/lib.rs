#![no_std]

extern crate alloc;

pub(crate) mod any;
pub(crate) mod bundle;
pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod container;
pub(crate) mod context;
pub(crate) mod errors;
pub(crate) mod initializer;
pub(crate) mod instantiator;
pub(crate) mod lazy;
pub(crate) mod lifecycle;
pub(crate) mod module;
pub(crate) mod registration;
pub(crate) mod resolver;
pub(crate) mod token;
pub(crate) mod utils;

pub use any::TypeInfo;
pub use bundle::Bundle;
pub use config::{Options, ResolveOptions};
pub use container::Container;
pub use context::{Context, ContextId, ContextValues};
pub use errors::{
    ContainerErrorKind, InitializeErrorKind, InstantiateErrorKind, InstantiatorResult, ResolveErrorKind,
};
pub use initializer::Initializer;
pub use instantiator::{Construct, Instantiator};
pub use lazy::{AnyLazy, Lazy};
pub use lifecycle::{Access, Lifecycle};
pub use module::Module;
pub use registration::Registration;
pub use resolver::{class, factory, function, value, Resolver, ResolverKind};
pub use token::Token;
