//! Program elements.
//!
//! A [`Node`] is a tagged element with a property bag and a fixed list of
//! slots laid out at construction (see [`crate::layout`]). Block nodes
//! (`if`, `for`, `while`, entry point) also own an internal scope;
//! conditionals describe their branch slots in a [`Branch`].
//!
//! # Adjacency cache
//!
//! `adjacent_nodes(filter)` results are memoized per filter. The graph
//! calls [`Node::mark_adjacency_dirty`] whenever one of the node's slots
//! gains or loses a link; nothing else invalidates the cache.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::library::Signature;
use crate::property::{Property, PropertyBag, PropertyId};
use crate::slot::{Slot, SlotFlags, SlotId, SlotRef};
use crate::value::Value;
use crate::{NodeId, ScopeId};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Default,
    EntryPoint,
    EmptyInstruction,
    If,
    For,
    While,
    Literal,
    Function,
    Operator,
    Variable,
    VariableRef,
}

impl NodeKind {
    /// `if`, `for` and `while`.
    pub const fn is_conditional(self) -> bool {
        matches!(self, NodeKind::If | NodeKind::For | NodeKind::While)
    }

    pub const fn is_loop(self) -> bool {
        matches!(self, NodeKind::For | NodeKind::While)
    }

    pub const fn is_invokable(self) -> bool {
        matches!(self, NodeKind::Function | NodeKind::Operator)
    }
}

/// Which side of a conditional. Doubles as the partition index of the
/// node's internal scope and the position of the branch slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BranchSide {
    False = 0,
    True = 1,
}

impl BranchSide {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Branch and condition slots of a conditional node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub condition: SlotId,
    pub on_true: SlotId,
    pub on_false: SlotId,
    /// `for` only.
    pub initialization: Option<SlotId>,
    /// `for` only.
    pub iteration: Option<SlotId>,
}

impl Branch {
    pub fn slot(&self, side: BranchSide) -> SlotId {
        match side {
            BranchSide::True => self.on_true,
            BranchSide::False => self.on_false,
        }
    }
}

#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) props: PropertyBag,
    pub(crate) value: PropertyId,
    pub(crate) slots: SmallVec<[Slot; 4]>,
    pub(crate) scope: Option<ScopeId>,
    pub(crate) internal_scope: Option<ScopeId>,
    pub(crate) branch: Option<Branch>,
    pub(crate) signature: Option<Signature>,
    adjacency: RefCell<FxHashMap<SlotFlags, SmallVec<[NodeId; 4]>>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, name: impl Into<String>, value: Property) -> Self {
        let mut props = PropertyBag::default();
        let value = props.add(value);
        Node {
            id,
            kind,
            name: name.into(),
            props,
            value,
            slots: SmallVec::new(),
            scope: None,
            internal_scope: None,
            branch: None,
            signature: None,
            adjacency: RefCell::default(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_variable(&self) -> bool {
        self.kind == NodeKind::Variable
    }

    /// Variables and references to them; evaluated at declaration, not
    /// at each use site.
    pub fn is_variable_like(&self) -> bool {
        matches!(self.kind, NodeKind::Variable | NodeKind::VariableRef)
    }

    pub fn is_invokable(&self) -> bool {
        self.kind.is_invokable()
    }

    // ── Properties ───────────────────────────────────────────────────

    pub fn properties(&self) -> &PropertyBag {
        &self.props
    }

    pub fn property(&self, id: PropertyId) -> &Property {
        self.props.get(id)
    }

    pub fn property_by_name(&self, name: &str) -> Option<&Property> {
        self.props.find(name).map(|id| self.props.get(id))
    }

    pub fn value_property_id(&self) -> PropertyId {
        self.value
    }

    pub fn value_property(&self) -> &Property {
        self.props.get(self.value)
    }

    /// Static value held by the node's value property.
    pub fn value(&self) -> Value {
        self.value_property().value()
    }

    pub(crate) fn add_property(&mut self, property: Property) -> PropertyId {
        self.props.add(property)
    }

    pub(crate) fn property_mut(&mut self, id: PropertyId) -> &mut Property {
        self.props.get_mut(id)
    }

    // ── Scopes and branches ──────────────────────────────────────────

    pub fn scope(&self) -> Option<ScopeId> {
        self.scope
    }

    pub fn internal_scope(&self) -> Option<ScopeId> {
        self.internal_scope
    }

    pub fn has_internal_scope(&self) -> bool {
        self.internal_scope.is_some()
    }

    pub fn branch(&self) -> Option<&Branch> {
        self.branch.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    // ── Slots ────────────────────────────────────────────────────────

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&Slot> {
        self.slots.get(id.index())
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot> {
        self.slots.get_mut(id.index())
    }

    pub fn slot_ref(&self, id: SlotId) -> SlotRef {
        SlotRef::new(self.id, id)
    }

    pub(crate) fn add_slot(&mut self, property: PropertyId, flags: SlotFlags, capacity: u8, position: u8) -> SlotId {
        let Ok(raw) = u8::try_from(self.slots.len()) else {
            panic!("too many slots on one node");
        };
        let id = SlotId::new(raw);
        self.slots
            .push(Slot::new(id, property, flags, capacity, position));
        id
    }

    /// Slots whose flags contain all of `flags`.
    pub fn filter_slots(&self, flags: SlotFlags) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(move |s| s.has_flags(flags))
    }

    pub fn find_slot(&self, flags: SlotFlags) -> Option<&Slot> {
        self.filter_slots(flags).next()
    }

    pub fn find_slot_at(&self, flags: SlotFlags, position: usize) -> Option<&Slot> {
        self.filter_slots(flags).find(|s| s.position() == position)
    }

    pub fn find_slot_by_property(&self, property: PropertyId, flags: SlotFlags) -> Option<&Slot> {
        self.filter_slots(flags).find(|s| s.property() == property)
    }

    /// Slot by property name, e.g. `("condition", INPUT)`.
    pub fn find_slot_by_name(&self, name: &str, flags: SlotFlags) -> Option<&Slot> {
        let property = self.props.find(name)?;
        self.find_slot_by_property(property, flags)
    }

    /// The flow output that continues after this node, never a branch.
    pub fn next_slot(&self) -> Option<&Slot> {
        self.filter_slots(SlotFlags::FLOW_OUT)
            .find(|s| !s.is_branch())
    }

    /// The node's single flow input.
    pub fn prev_slot(&self) -> Option<&Slot> {
        self.find_slot(SlotFlags::FLOW_IN)
    }

    pub fn value_in(&self) -> Option<&Slot> {
        self.find_slot_by_property(self.value, SlotFlags::INPUT)
    }

    pub fn value_out(&self) -> Option<&Slot> {
        self.find_slot_by_property(self.value, SlotFlags::OUTPUT)
    }

    // ── Adjacency ────────────────────────────────────────────────────

    /// Nodes linked to any slot matching `flags`, in slot order, without
    /// duplicates.
    pub fn adjacent_nodes(&self, flags: SlotFlags) -> SmallVec<[NodeId; 4]> {
        if let Some(cached) = self.adjacency.borrow().get(&flags) {
            return cached.clone();
        }
        let mut nodes: SmallVec<[NodeId; 4]> = SmallVec::new();
        for slot in self.filter_slots(flags) {
            for adjacent in slot.adjacent() {
                if !nodes.contains(&adjacent.node) {
                    nodes.push(adjacent.node);
                }
            }
        }
        self.adjacency.borrow_mut().insert(flags, nodes.clone());
        nodes
    }

    /// Nodes feeding this node's value inputs.
    pub fn inputs(&self) -> SmallVec<[NodeId; 4]> {
        self.adjacent_nodes(SlotFlags::INPUT)
    }

    /// Nodes reading this node's value outputs.
    pub fn outputs(&self) -> SmallVec<[NodeId; 4]> {
        self.adjacent_nodes(SlotFlags::OUTPUT)
    }

    pub fn flow_inputs(&self) -> SmallVec<[NodeId; 4]> {
        self.adjacent_nodes(SlotFlags::FLOW_IN)
    }

    /// Every flow successor, branch targets included.
    pub fn flow_outputs(&self) -> SmallVec<[NodeId; 4]> {
        self.adjacent_nodes(SlotFlags::FLOW_OUT)
    }

    /// Successor through the continuation slot.
    pub fn successor(&self) -> Option<NodeId> {
        self.next_slot()?.first_adjacent().map(|s| s.node)
    }

    pub fn has_flow_adjacent(&self) -> bool {
        self.filter_slots(SlotFlags::TYPE_FLOW)
            .any(|s| s.adjacent_count() > 0)
    }

    pub fn mark_adjacency_dirty(&self) {
        self.adjacency.borrow_mut().clear();
    }
}
