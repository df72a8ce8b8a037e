use std::any::type_name;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;

use crate::error::ArenaError;
use crate::handle::{short_type_name, Handle};
use crate::store::{ErasedStore, Store, StoreId};

/// Next id to hand out, shared by every arena in the process so a handle
/// never resolves in an arena that did not issue it. Ids only grow; 0 is
/// reserved for null.
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> u32 {
    match NEXT_ID.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1)) {
        Ok(id) => id,
        Err(_) => panic!("arena id space exhausted"),
    }
}

/// Where a live id currently sits: which store, at which position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub store: StoreId,
    pub pos: u32,
}

/// Owner of every arena-allocated object of one document.
///
/// Creating an `Arena` is initialization and dropping it (or calling
/// [`Arena::shutdown`]) ends its life. Arenas are independent values, so
/// several documents or tests can each hold their own.
pub struct Arena {
    records: FxHashMap<u32, Record>,
    stores: Vec<Box<dyn ErasedStore>>,
    /// Type name -> store.
    store_index: FxHashMap<&'static str, StoreId>,
}

impl Arena {
    pub fn new() -> Self {
        Arena {
            records: FxHashMap::default(),
            stores: Vec::new(),
            store_index: FxHashMap::default(),
        }
    }

    /// Tear the arena down. Returns how many objects were still alive.
    pub fn shutdown(self) -> usize {
        let live = self.records.len();
        if live > 0 {
            tracing::warn!(live, "arena shut down with live objects");
        } else {
            tracing::debug!("arena shut down clean");
        }
        live
    }

    // ── Allocation ───────────────────────────────────────────────────

    pub fn create<T: 'static>(&mut self, value: T) -> Handle<T> {
        self.create_with(|_| value)
    }

    /// Allocate a `T` built by `init`, which receives the handle the value
    /// will live under. Lets objects record their own id.
    pub fn create_with<T: 'static>(&mut self, init: impl FnOnce(Handle<T>) -> T) -> Handle<T> {
        let id = next_id();
        let handle = Handle::from_raw(id);
        let value = init(handle);

        let store = self.store_or_register::<T>();
        let pos = self.typed_mut::<T>(store).push(id, value);
        let Ok(pos) = u32::try_from(pos) else {
            panic!("store `{}` outgrew u32 positions", type_name::<T>());
        };
        self.records.insert(id, Record { store, pos });

        tracing::trace!(id, store = short_type_name::<T>(), pos, "arena create");
        handle
    }

    /// Destroy one object in O(1). The last element of the store moves into
    /// the freed position. Returns the value, or `None` if the handle does
    /// not resolve.
    pub fn destroy<T: 'static>(&mut self, handle: Handle<T>) -> Option<T> {
        let record = self.resolve(handle)?;
        self.records.remove(&handle.raw());

        let (value, moved) = self
            .typed_mut::<T>(record.store)
            .swap_remove(record.pos as usize);
        if let Some(moved) = moved {
            if let Some(moved_record) = self.records.get_mut(&moved) {
                moved_record.pos = record.pos;
            }
        }

        tracing::trace!(id = handle.raw(), moved = ?moved, "arena destroy");
        Some(value)
    }

    /// Destroy every handle in `handles`, one at a time and in iteration
    /// order. Handles that no longer resolve are skipped. Returns how many
    /// objects were destroyed.
    pub fn destroy_all<T: 'static>(&mut self, handles: impl IntoIterator<Item = Handle<T>>) -> usize {
        handles
            .into_iter()
            .filter_map(|handle| self.destroy(handle))
            .count()
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// Resolve a handle. `None` for null, destroyed, or foreign ids.
    ///
    /// Panics when the id is live but stored as another type.
    pub fn get<T: 'static>(&self, handle: Handle<T>) -> Option<&T> {
        let record = self.resolve(handle)?;
        self.typed::<T>(record.store).get(record.pos as usize)
    }

    pub fn get_mut<T: 'static>(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let record = self.resolve(handle)?;
        self.typed_mut::<T>(record.store)
            .get_mut(record.pos as usize)
    }

    /// Non-panicking lookup that reports why a handle did not resolve.
    pub fn try_get<T: 'static>(&self, handle: Handle<T>) -> Result<&T, ArenaError> {
        let id = handle.raw();
        let record = self
            .records
            .get(&id)
            .ok_or(ArenaError::NotFound { id })?;
        let stored = self.stores[record.store.index()].type_name();
        if stored != type_name::<T>() {
            return Err(ArenaError::WrongType {
                id,
                requested: type_name::<T>(),
                stored,
            });
        }
        self.typed::<T>(record.store)
            .get(record.pos as usize)
            .ok_or(ArenaError::NotFound { id })
    }

    pub fn contains<T: 'static>(&self, handle: Handle<T>) -> bool {
        self.try_get(handle).is_ok()
    }

    pub fn record<T: 'static>(&self, handle: Handle<T>) -> Option<Record> {
        self.resolve(handle)
    }

    /// Current physical index of the object inside its store.
    pub fn position<T: 'static>(&self, handle: Handle<T>) -> Option<usize> {
        self.resolve(handle).map(|record| record.pos as usize)
    }

    // ── Iteration ────────────────────────────────────────────────────

    /// Number of live `T`.
    pub fn len<T: 'static>(&self) -> usize {
        self.store_id::<T>()
            .map_or(0, |store| self.stores[store.index()].len())
    }

    pub fn is_empty<T: 'static>(&self) -> bool {
        self.len::<T>() == 0
    }

    /// Number of live objects across all stores.
    pub fn live(&self) -> usize {
        self.records.len()
    }

    /// Live `T` in physical order.
    pub fn iter<T: 'static>(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.store_id::<T>()
            .map(|store| self.typed::<T>(store))
            .into_iter()
            .flat_map(|store| store.iter().map(|(id, item)| (Handle::from_raw(id), item)))
    }

    pub fn handles<T: 'static>(&self) -> Vec<Handle<T>> {
        self.store_id::<T>()
            .map(|store| {
                self.typed::<T>(store)
                    .ids()
                    .iter()
                    .map(|&id| Handle::from_raw(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn resolve<T: 'static>(&self, handle: Handle<T>) -> Option<Record> {
        let record = *self.records.get(&handle.raw())?;
        let stored = self.stores[record.store.index()].type_name();
        assert!(
            stored == type_name::<T>(),
            "handle {} resolved as `{}` but is stored as `{stored}`",
            handle.raw(),
            type_name::<T>(),
        );
        Some(record)
    }

    fn store_id<T: 'static>(&self) -> Option<StoreId> {
        self.store_index.get(type_name::<T>()).copied()
    }

    fn store_or_register<T: 'static>(&mut self) -> StoreId {
        if let Some(store) = self.store_id::<T>() {
            return store;
        }
        let Ok(index) = u32::try_from(self.stores.len()) else {
            panic!("too many arena stores");
        };
        let store = StoreId::new(index);
        self.stores.push(Box::new(Store::<T>::new()));
        self.store_index.insert(type_name::<T>(), store);
        store
    }

    fn typed<T: 'static>(&self, store: StoreId) -> &Store<T> {
        match self.stores[store.index()].as_any().downcast_ref::<Store<T>>() {
            Some(store) => store,
            None => panic!("store {store:?} does not hold `{}`", type_name::<T>()),
        }
    }

    fn typed_mut<T: 'static>(&mut self, store: StoreId) -> &mut Store<T> {
        match self.stores[store.index()]
            .as_any_mut()
            .downcast_mut::<Store<T>>()
        {
            Some(store) => store,
            None => panic!("store {store:?} does not hold `{}`", type_name::<T>()),
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for store in &self.stores {
            map.entry(&store.type_name(), &store.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests;
