use ndbl_ast::{CallError, NodeId};
use thiserror::Error;

/// Misuse of the machine, or a fault raised while executing.
///
/// Every error leaves the machine stopped; registers and memory keep the
/// state they had when the faulting instruction started.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum VmError {
    #[error("no program is loaded")]
    NoProgram,
    #[error("a program is already loaded, release it first")]
    AlreadyLoaded,
    #[error("no program is being debugged")]
    NotRunning,
    #[error("a program is already running")]
    Busy,
    #[error("instruction cursor left the program: line {from} jumped by {offset} (program has {len} instructions)")]
    OutOfBounds { from: usize, offset: i64, len: usize },
    #[error("{0:?} is not a node of the graph")]
    UnknownNode(NodeId),
    #[error("variable {0:?} is used outside of its push_var/pop_var range")]
    VariableNotPushed(NodeId),
    #[error("{0:?} does not resolve to a library function")]
    Unresolved(NodeId),
    #[error("call to {node:?} failed: {source}")]
    Call {
        node: NodeId,
        #[source]
        source: CallError,
    },
    #[error("step limit of {0} instructions reached")]
    StepLimit(u64),
}
