mod container;
mod initialize;
mod instantiate;
mod resolve;

pub use container::ContainerErrorKind;
pub use initialize::InitializeErrorKind;
pub use instantiate::InstantiateErrorKind;
pub use resolve::ResolveErrorKind;

#[allow(type_alias_bounds)]
pub type InstantiatorResult<T, Err: Into<InstantiateErrorKind> = InstantiateErrorKind> = Result<T, Err>;
