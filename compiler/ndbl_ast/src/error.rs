use thiserror::Error;

use crate::slot::SlotId;
use crate::{NodeId, ScopeId};

/// Why a link could not be made or removed.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("{node:?} has no slot {slot:?}")]
    UnknownSlot { node: NodeId, slot: SlotId },
    #[error("cannot link a node to itself")]
    SameNode,
    #[error("cannot link a value slot to a flow slot")]
    TypeMismatch,
    #[error("a link joins one output to one input")]
    OrderMismatch,
    #[error("slot {slot:?} of {node:?} is full")]
    SlotFull { node: NodeId, slot: SlotId },
    #[error("slots are already linked")]
    AlreadyConnected,
    #[error("slots are not linked")]
    NotConnected,
    #[error("{0:?} is not a variable")]
    NotAVariable(NodeId),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("{node:?} already belongs to {scope:?}")]
    AlreadyScoped { node: NodeId, scope: ScopeId },
    #[error("{node:?} cannot be placed inside a scope it owns")]
    OwnInternalScope { node: NodeId },
    #[error("{node:?} belongs to no scope")]
    NotScoped { node: NodeId },
    #[error("unknown scope {0:?}")]
    UnknownScope(ScopeId),
}

/// Why a token span was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("span {offset}..{end} is outside a source of {source_len} bytes")]
    OutOfSource {
        offset: usize,
        end: usize,
        source_len: usize,
    },
    #[error("byte {at} is inside a UTF-8 character")]
    NotCharBoundary { at: usize },
    #[error("moving a word boundary by {amount} leaves the token")]
    OutOfToken { amount: isize },
}
