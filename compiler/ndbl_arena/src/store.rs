use std::any::Any;

/// Index of a type-homogeneous store inside an [`Arena`](crate::Arena).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct StoreId(u32);

impl StoreId {
    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        StoreId(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense storage for every live `T`, with the id of each element kept
/// alongside so a swap-remove knows whose record to patch.
pub(crate) struct Store<T> {
    ids: Vec<u32>,
    items: Vec<T>,
}

impl<T> Store<T> {
    pub(crate) fn new() -> Self {
        Store {
            ids: Vec::new(),
            items: Vec::new(),
        }
    }

    /// Append and return the new element's position.
    pub(crate) fn push(&mut self, id: u32, item: T) -> usize {
        self.ids.push(id);
        self.items.push(item);
        self.items.len() - 1
    }

    pub(crate) fn get(&self, pos: usize) -> Option<&T> {
        self.items.get(pos)
    }

    pub(crate) fn get_mut(&mut self, pos: usize) -> Option<&mut T> {
        self.items.get_mut(pos)
    }

    /// Remove the element at `pos` by moving the last element into its
    /// place. Returns the removed value and, when an element moved, its id.
    pub(crate) fn swap_remove(&mut self, pos: usize) -> (T, Option<u32>) {
        let item = self.items.swap_remove(pos);
        self.ids.swap_remove(pos);
        (item, self.ids.get(pos).copied())
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.ids.iter().copied().zip(self.items.iter())
    }

    pub(crate) fn ids(&self) -> &[u32] {
        &self.ids
    }
}

/// Object-safe view of a `Store<T>` for the arena's heterogeneous list.
pub(crate) trait ErasedStore {
    fn type_name(&self) -> &'static str;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: 'static> ErasedStore for Store<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
