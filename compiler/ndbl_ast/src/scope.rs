//! Lexical containers.
//!
//! A node with an internal scope owns it. Conditionals split theirs into
//! two partitions (false, true) and keep no children of their own; the
//! entry point's internal scope is unpartitioned and is the root scope of
//! the program. Operations that need other scopes or nodes (parent, depth,
//! append, backbone) live on [`crate::Graph`].

use std::cell::RefCell;

use smallvec::SmallVec;

use crate::{NodeId, ScopeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    /// A node's internal scope. Its parent is the owner's scope.
    Internal,
    /// One side of a partitioned internal scope.
    Partition { parent: ScopeId, index: usize },
}

#[derive(Debug)]
pub struct Scope {
    pub(crate) id: ScopeId,
    pub(crate) owner: NodeId,
    pub(crate) kind: ScopeKind,
    pub(crate) partitions: SmallVec<[ScopeId; 2]>,
    /// Insertion order.
    pub(crate) children: Vec<NodeId>,
    /// Declaration order.
    pub(crate) variables: Vec<NodeId>,
    pub(crate) head: Option<NodeId>,
    backbone: RefCell<Option<Vec<NodeId>>>,
}

impl Scope {
    pub(crate) fn new(id: ScopeId, owner: NodeId, kind: ScopeKind) -> Self {
        Scope {
            id,
            owner,
            kind,
            partitions: SmallVec::new(),
            children: Vec::new(),
            variables: Vec::new(),
            head: None,
            backbone: RefCell::new(None),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn is_partition(&self) -> bool {
        matches!(self.kind, ScopeKind::Partition { .. })
    }

    pub fn is_partitioned(&self) -> bool {
        !self.partitions.is_empty()
    }

    /// Index inside the parent's partitions, for partitions only.
    pub fn partition_index(&self) -> Option<usize> {
        match self.kind {
            ScopeKind::Partition { index, .. } => Some(index),
            ScopeKind::Internal => None,
        }
    }

    pub fn partitions(&self) -> &[ScopeId] {
        &self.partitions
    }

    pub fn partition(&self, index: usize) -> Option<ScopeId> {
        self.partitions.get(index).copied()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn variables(&self) -> &[NodeId] {
        &self.variables
    }

    pub fn head(&self) -> Option<NodeId> {
        self.head
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.children.contains(&node)
    }

    pub(crate) fn cached_backbone(&self) -> Option<Vec<NodeId>> {
        self.backbone.borrow().clone()
    }

    pub(crate) fn cache_backbone(&self, backbone: Vec<NodeId>) {
        *self.backbone.borrow_mut() = Some(backbone);
    }

    pub(crate) fn mark_backbone_dirty(&self) {
        *self.backbone.borrow_mut() = None;
    }
}
