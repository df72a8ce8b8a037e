//! Nodable abstract syntax graph.
//!
//! A program is a graph of [`Node`]s joined through typed [`Slot`]s:
//!
//! - **value links** carry data from an output to an input,
//! - **flow links** order execution from one instruction to the next.
//!
//! Block nodes (`if`, `for`, `while` and the entry point) own an internal
//! [`Scope`]; conditionals split theirs into a false and a true partition.
//! Scope membership is kept in sync with flow links by [`Graph`] when
//! edits run with [`GraphFlags::ALLOW_SIDE_EFFECTS`].
//!
//! Nodes and scopes live in an [`ndbl_arena::Arena`] and refer to each
//! other by handle ([`NodeId`], [`ScopeId`]).

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

mod error;
mod graph;
pub mod layout;
mod library;
mod node;
mod property;
mod scope;
mod slot;
mod token;
mod value;

pub use error::{ConnectError, ScopeError, TokenError};
pub use graph::{Graph, GraphConfig, GraphEvent, GraphFlags};
pub use library::{Arg, CallError, Function, FunctionId, Library, NativeFn, Signature};
pub use ndbl_arena::{Arena, Handle};
pub use node::{Branch, BranchSide, Node, NodeKind};
pub use property::{Property, PropertyBag, PropertyFlags, PropertyId};
pub use scope::{Scope, ScopeKind};
pub use slot::{Link, Slot, SlotFlags, SlotId, SlotKind, SlotRef};
pub use token::{Token, TokenKind};
pub use value::{Qword, Value, ValueType};

pub type NodeId = Handle<Node>;
pub type ScopeId = Handle<Scope>;

static_assert_size!(NodeId, 4);
