use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Typed reference to an arena-owned `T`.
///
/// A handle is four bytes and `Copy` whatever `T` is. The id `0` is the null
/// handle; live ids start at 1 and are never reused by the arena that issued
/// them.
#[repr(transparent)]
pub struct Handle<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The null handle. Never resolves.
    pub const NULL: Handle<T> = Handle::from_raw(0);

    /// Rebuild a handle from a raw id.
    ///
    /// Nothing guarantees the id was issued for `T`; resolving it as the
    /// wrong type is a programming error the arena will catch.
    #[inline]
    pub const fn from_raw(id: u32) -> Self {
        Handle {
            id,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.id
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.id == 0
    }

    /// Reinterpret as a handle to another type.
    #[inline]
    pub const fn cast<U>(self) -> Handle<U> {
        Handle::from_raw(self.id)
    }
}

impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> PartialOrd for Handle<T> {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for Handle<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = short_type_name::<T>();
        if self.is_null() {
            write!(f, "{name}Id::NULL")
        } else {
            write!(f, "{name}Id({})", self.id)
        }
    }
}

/// `ndbl_ast::node::Node` -> `Node`.
pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
