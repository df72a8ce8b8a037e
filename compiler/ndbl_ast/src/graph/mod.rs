//! The editable program.
//!
//! [`Graph`] owns the arena holding every node and scope, the edge
//! registry and the function library. It is the only mutator: each
//! operation that changes adjacency or scoping invalidates the affected
//! caches itself (node adjacency, scope backbones) and records a
//! [`GraphEvent`] for the view layer.
//!
//! Structural operations come in two flavors selected by
//! [`GraphFlags::ALLOW_SIDE_EFFECTS`]: the raw edit, or the edit followed
//! by the scope bookkeeping a user edit implies (moving a node into the
//! branch it was linked from, relinking around a destroyed node, ...).

mod connect;
mod events;
mod scoping;

use bitflags::bitflags;
use ndbl_arena::Arena;
use rustc_hash::FxHashMap;

use crate::layout;
use crate::library::{Library, Signature};
use crate::node::{BranchSide, Node, NodeKind};
use crate::scope::{Scope, ScopeKind};
use crate::slot::{Link, Slot, SlotFlags, SlotKind, SlotRef};
use crate::value::{Value, ValueType};
use crate::{ConnectError, NodeId, ScopeId};

pub use events::GraphEvent;

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct GraphFlags: u8 {
        /// Run the scope bookkeeping implied by an edit.
        const ALLOW_SIDE_EFFECTS = 1 << 0;
    }
}

#[derive(Clone, Debug)]
pub struct GraphConfig {
    /// Capacity of fan-in flow inputs and of value outputs.
    pub fan_in_capacity: u8,
    /// `connect_or_merge` folds an unlinked literal into the input it feeds.
    pub merge_literals: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        GraphConfig {
            fan_in_capacity: 8,
            merge_literals: false,
        }
    }
}

#[derive(Debug)]
pub struct Graph {
    arena: Arena,
    library: Library,
    config: GraphConfig,
    /// Creation order.
    nodes: Vec<NodeId>,
    edges: FxHashMap<SlotKind, Vec<Link>>,
    root: NodeId,
    events: Vec<GraphEvent>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// An empty program over the standard library.
    pub fn new() -> Self {
        Self::with_config(Arena::new(), Library::standard(), GraphConfig::default())
    }

    pub fn with_config(arena: Arena, library: Library, config: GraphConfig) -> Self {
        debug_assert!(config.fan_in_capacity > 0, "fan-in capacity must be positive");
        let mut graph = Graph {
            arena,
            library,
            config,
            nodes: Vec::new(),
            edges: FxHashMap::default(),
            root: NodeId::NULL,
            events: Vec::new(),
        };
        graph.root = graph.spawn_entry_point();
        graph
    }

    /// Destroy every node and scope, then recreate the entry point.
    pub fn reset(&mut self) {
        let nodes = std::mem::take(&mut self.nodes);
        let scopes = self.arena.handles::<Scope>();
        let freed = self.arena.destroy_all(nodes) + self.arena.destroy_all(scopes);
        self.edges.clear();
        tracing::debug!(freed, "graph reset");
        self.emit(GraphEvent::Reset);
        self.root = self.spawn_entry_point();
    }

    /// Hand the arena back, e.g. to shut it down.
    pub fn into_arena(self) -> Arena {
        self.arena
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// # Panics
    /// On a handle that no longer resolves.
    pub fn node(&self, id: NodeId) -> &Node {
        match self.arena.get(id) {
            Some(node) => node,
            None => panic!("dangling node handle {id:?}"),
        }
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.arena.get_mut(id) {
            Some(node) => node,
            None => panic!("dangling node handle {id:?}"),
        }
    }

    /// # Panics
    /// On a handle that no longer resolves.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        match self.arena.get(id) {
            Some(scope) => scope,
            None => panic!("dangling scope handle {id:?}"),
        }
    }

    pub(crate) fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        match self.arena.get_mut(id) {
            Some(scope) => scope,
            None => panic!("dangling scope handle {id:?}"),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    /// Every node, in creation order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Only the entry point is left.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn root_node(&self) -> NodeId {
        self.root
    }

    pub fn root_scope(&self) -> ScopeId {
        match self.node(self.root).internal_scope() {
            Some(scope) => scope,
            None => unreachable!("the entry point always owns the root scope"),
        }
    }

    pub fn scopes(&self) -> Vec<ScopeId> {
        self.arena.handles::<Scope>()
    }

    /// Scopes without a parent: the root scope and the internal scopes of
    /// unscoped nodes.
    pub fn root_scopes(&self) -> Vec<ScopeId> {
        self.scopes()
            .into_iter()
            .filter(|s| self.parent_scope(*s).is_none())
            .collect()
    }

    /// The variable a reference reads, through its single input.
    pub fn referenced_variable(&self, node: NodeId) -> Option<NodeId> {
        let node = self.node(node);
        if node.kind() != NodeKind::VariableRef {
            return None;
        }
        node.value_in()?.first_adjacent().map(|s| s.node)
    }

    // ── Slot lookup ──────────────────────────────────────────────────

    pub fn slot(&self, slot: SlotRef) -> Option<&Slot> {
        self.try_node(slot.node)?.slot(slot.slot)
    }

    fn find_slot_ref(&self, node: NodeId, find: impl FnOnce(&Node) -> Option<&Slot>) -> Option<SlotRef> {
        let node = self.try_node(node)?;
        find(node).map(|s| node.slot_ref(s.id()))
    }

    pub fn value_out(&self, node: NodeId) -> Option<SlotRef> {
        self.find_slot_ref(node, Node::value_out)
    }

    pub fn value_in(&self, node: NodeId) -> Option<SlotRef> {
        self.find_slot_ref(node, Node::value_in)
    }

    /// Input slot of the property named `name`.
    pub fn input(&self, node: NodeId, name: &str) -> Option<SlotRef> {
        self.find_slot_ref(node, |n| n.find_slot_by_name(name, SlotFlags::INPUT))
    }

    pub fn flow_in(&self, node: NodeId) -> Option<SlotRef> {
        self.find_slot_ref(node, Node::prev_slot)
    }

    /// Continuation flow output.
    pub fn flow_out(&self, node: NodeId) -> Option<SlotRef> {
        self.find_slot_ref(node, Node::next_slot)
    }

    /// Branch slot of a conditional, or the entry point's single branch
    /// whatever `side` says.
    pub fn branch_out(&self, node: NodeId, side: BranchSide) -> Option<SlotRef> {
        self.find_slot_ref(node, |n| match n.branch() {
            Some(branch) => n.slot(branch.slot(side)),
            None => n.find_slot(SlotFlags::FLOW_OUT | SlotFlags::IS_BRANCH),
        })
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Create a node of a kind that needs no payload. Literals, variables,
    /// references and callables have dedicated constructors, and there is
    /// only one entry point.
    pub fn create_node(&mut self, kind: NodeKind, scope: ScopeId) -> Option<NodeId> {
        match kind {
            NodeKind::Default => Some(self.spawn(layout::default_node, None, Some(scope))),
            NodeKind::EmptyInstruction => Some(self.create_empty_instruction(scope)),
            NodeKind::If | NodeKind::For | NodeKind::While => Some(self.create_conditional(kind, scope)),
            NodeKind::EntryPoint
            | NodeKind::Literal
            | NodeKind::Function
            | NodeKind::Operator
            | NodeKind::Variable
            | NodeKind::VariableRef => None,
        }
    }

    pub fn create_empty_instruction(&mut self, scope: ScopeId) -> NodeId {
        self.spawn(layout::empty_instruction, None, Some(scope))
    }

    pub fn create_literal(&mut self, value: Value, scope: ScopeId) -> NodeId {
        self.spawn(|id, cap| layout::literal(id, value, cap), None, Some(scope))
    }

    pub fn create_variable(&mut self, ty: ValueType, name: &str, scope: ScopeId) -> NodeId {
        self.spawn(|id, cap| layout::variable(id, ty, name, cap), None, Some(scope))
    }

    /// A reference node reading `variable`, linked to it.
    pub fn create_variable_ref(&mut self, variable: NodeId, scope: ScopeId) -> Result<NodeId, ConnectError> {
        let target = self
            .try_node(variable)
            .ok_or(ConnectError::UnknownNode(variable))?;
        if !target.is_variable() {
            return Err(ConnectError::NotAVariable(variable));
        }
        let ty = target.value_property().ty();
        let name = target.name().to_owned();
        let Some(output) = self.value_out(variable) else {
            return Err(ConnectError::NotAVariable(variable));
        };

        let reference = self.spawn(|id, cap| layout::variable_ref(id, ty, &name, cap), None, Some(scope));
        let Some(input) = self.value_in(reference) else {
            unreachable!("references are created with an input");
        };
        if let Err(err) = self.connect(output, input, GraphFlags::empty()) {
            self.destroy(reference, GraphFlags::empty());
            return Err(err);
        }
        Ok(reference)
    }

    pub fn create_function(&mut self, signature: Signature, scope: ScopeId) -> NodeId {
        self.spawn(
            |id, cap| layout::invokable(id, NodeKind::Function, signature, cap),
            None,
            Some(scope),
        )
    }

    pub fn create_operator(&mut self, signature: Signature, scope: ScopeId) -> NodeId {
        self.spawn(
            |id, cap| layout::invokable(id, NodeKind::Operator, signature, cap),
            None,
            Some(scope),
        )
    }

    pub fn create_if(&mut self, scope: ScopeId) -> NodeId {
        self.create_conditional(NodeKind::If, scope)
    }

    pub fn create_for(&mut self, scope: ScopeId) -> NodeId {
        self.create_conditional(NodeKind::For, scope)
    }

    pub fn create_while(&mut self, scope: ScopeId) -> NodeId {
        self.create_conditional(NodeKind::While, scope)
    }

    fn create_conditional(&mut self, kind: NodeKind, scope: ScopeId) -> NodeId {
        self.spawn(|id, cap| layout::conditional(id, kind, cap), Some(2), Some(scope))
    }

    fn spawn_entry_point(&mut self) -> NodeId {
        self.spawn(|id, _| layout::entry_point(id), Some(0), None)
    }

    /// Allocate a node, give it an internal scope with `partitions`
    /// partitions when asked, register it and place it in `scope`.
    fn spawn(
        &mut self,
        build: impl FnOnce(NodeId, u8) -> Node,
        partitions: Option<usize>,
        scope: Option<ScopeId>,
    ) -> NodeId {
        let capacity = self.config.fan_in_capacity;
        let id = self.arena.create_with(|id| build(id, capacity));
        if let Some(count) = partitions {
            self.add_internal_scope(id, count);
        }
        self.nodes.push(id);
        tracing::trace!(node = ?id, kind = ?self.node(id).kind(), "node created");
        self.emit(GraphEvent::NodeAdded(id));
        if let Some(scope) = scope {
            self.insert_into_scope(id, scope);
        }
        id
    }

    fn add_internal_scope(&mut self, owner: NodeId, partitions: usize) {
        let internal = self
            .arena
            .create_with(|id| Scope::new(id, owner, ScopeKind::Internal));
        for index in 0..partitions {
            let partition = self.arena.create_with(|id| {
                Scope::new(
                    id,
                    owner,
                    ScopeKind::Partition {
                        parent: internal,
                        index,
                    },
                )
            });
            self.scope_mut(internal).partitions.push(partition);
        }
        self.node_mut(owner).internal_scope = Some(internal);
    }

    // ── Properties ───────────────────────────────────────────────────

    /// Overwrite the value of the node's value property, e.g. a variable's
    /// declared initial value.
    pub fn set_value(&mut self, node: NodeId, value: Value) {
        let node = self.node_mut(node);
        let property = node.value_property_id();
        node.property_mut(property).set_value(value);
    }

    /// Overwrite the value of a named property. Returns `false` if the node
    /// has no such property.
    pub fn set_property_value(&mut self, node: NodeId, name: &str, value: Value) -> bool {
        let node = self.node_mut(node);
        let Some(property) = node.properties().find(name) else {
            return false;
        };
        node.property_mut(property).set_value(value);
        true
    }

    // ── Destruction ──────────────────────────────────────────────────

    /// Remove a node and every link touching it.
    ///
    /// With side effects the node's single predecessor is relinked to its
    /// single successor, expressions feeding it from its own scope are
    /// destroyed and so is the content of its internal scope. Without,
    /// that content moves to the node's scope (or the root scope).
    ///
    /// The entry point is never destroyed.
    pub fn destroy(&mut self, node: NodeId, flags: GraphFlags) {
        if node == self.root {
            tracing::warn!("the entry point cannot be destroyed");
            return;
        }
        if !self.contains(node) {
            return;
        }
        ndbl_stack::ensure_sufficient_stack(|| self.destroy_node(node, flags));
    }

    fn destroy_node(&mut self, node: NodeId, flags: GraphFlags) {
        let side_effects = flags.contains(GraphFlags::ALLOW_SIDE_EFFECTS);
        let internal = self.node(node).internal_scope();
        let inner_scopes: Vec<ScopeId> = internal
            .map(|s| {
                let mut scopes = vec![s];
                scopes.extend_from_slice(self.scope(s).partitions());
                scopes
            })
            .unwrap_or_default();

        let mut relink = None;
        if side_effects {
            let this = self.node(node);
            let prev = this
                .prev_slot()
                .filter(|s| s.adjacent_count() == 1)
                .and_then(Slot::first_adjacent);
            let next = this
                .next_slot()
                .filter(|s| s.adjacent_count() == 1)
                .and_then(Slot::first_adjacent);
            relink = prev.zip(next);

            let scope = this.scope();
            let doomed: Vec<NodeId> = this
                .inputs()
                .into_iter()
                .filter(|i| {
                    let input = self.node(*i);
                    !input.is_variable() && !input.has_flow_adjacent() && input.scope() == scope
                })
                .collect();
            for input in doomed {
                self.destroy(input, flags);
            }
            let content: Vec<NodeId> = inner_scopes
                .iter()
                .flat_map(|s| self.scope(*s).children().to_vec())
                .collect();
            for child in content {
                self.destroy(child, flags);
            }
        } else if !inner_scopes.is_empty() {
            let target = self.node(node).scope().unwrap_or_else(|| self.root_scope());
            for scope in &inner_scopes {
                if let Err(err) = self.transfer_children(*scope, target) {
                    tracing::warn!(node = ?node, %err, "could not rescue scope content");
                }
            }
        }

        let links: Vec<Link> = self
            .edges
            .values()
            .flatten()
            .filter(|l| l.involves(node))
            .copied()
            .collect();
        for link in links {
            let flags = match link.kind {
                SlotKind::Value => GraphFlags::ALLOW_SIDE_EFFECTS,
                SlotKind::Flow => GraphFlags::empty(),
            };
            if let Err(err) = self.disconnect(link, flags) {
                tracing::warn!(node = ?node, %err, "stale link while destroying");
            }
        }

        if let Some(scope) = self.node(node).scope() {
            self.detach(node, scope);
        }
        self.arena.destroy_all(inner_scopes);
        self.nodes.retain(|n| *n != node);
        self.arena.destroy(node);
        self.mark_backbones_dirty();
        tracing::trace!(node = ?node, "node destroyed");
        self.emit(GraphEvent::NodeRemoved(node));

        if let Some((prev, next)) = relink {
            if self.contains(prev.node) && self.contains(next.node) {
                if let Err(err) = self.connect(prev, next, GraphFlags::ALLOW_SIDE_EFFECTS) {
                    tracing::warn!(%err, "could not relink around a destroyed node");
                }
            }
        }
    }
}
