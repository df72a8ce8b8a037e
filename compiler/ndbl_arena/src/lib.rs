//! Handle arena for node-graph objects.
//!
//! Every object of the editable program (nodes, scopes) lives in an [`Arena`]
//! and is referred to through a typed [`Handle`]. Handles are plain `u32` ids
//! that are never handed out twice by the same arena, so a destroyed handle
//! can only ever resolve to "not found".
//!
//! # Architecture
//!
//! ```text
//! Handle<T>(id) ──records──▶ Record { store, pos } ──stores[store]──▶ Store<T>.items[pos]
//! ```
//!
//! Each type gets one contiguous store, registered by type name. Destroying
//! an element swaps the last element of its store into the hole and patches
//! that element's [`Record`], keeping stores dense and destruction O(1).
//!
//! # Leases
//!
//! Physical positions move on every destroy, so element references must not
//! outlive a mutation. References returned by [`Arena::get`] borrow the
//! arena; [`Arena::create`] and [`Arena::destroy`] take `&mut self`, so the
//! borrow checker rejects holding a reference across either call. Long-lived
//! references are always handles.

mod arena;
mod error;
mod handle;
mod store;

pub use arena::{Arena, Record};
pub use error::ArenaError;
pub use handle::Handle;
pub use store::StoreId;
