use alloc::{collections::BTreeMap, sync::Arc};
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
};

pub(crate) type RcAny = Arc<dyn Any + Send + Sync>;

/// Type identity of a provided value, with its name kept for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn is<T>(&self) -> bool
    where
        T: ?Sized + 'static,
    {
        self.id == TypeId::of::<T>()
    }

    /// Last path segment of the type name without generic arguments,
    /// e.g. `UserRepo` for `app::repo::UserRepo` and `Option` for `core::option::Option<app::Id>`.
    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        let path = self.name.split_once('<').map_or(self.name, |(path, _)| path);
        path.rsplit_once("::").map_or(path, |(_, name)| name)
    }
}

pub(crate) type Map = BTreeMap<TypeInfo, RcAny>;
