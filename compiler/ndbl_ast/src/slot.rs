//! Connection points and the links between them.
//!
//! A [`Slot`] sits on a property and carries two orthogonal tags: its
//! *type* (value or control flow) and its *order* (primary side, which
//! produces, or secondary side, which consumes). A [`Link`] always joins a
//! primary slot to a secondary slot of the same type on another node.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::property::PropertyId;
use crate::NodeId;

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct SlotFlags: u8 {
        // Type
        const TYPE_VALUE = 1 << 0;
        const TYPE_FLOW = 1 << 1;
        // Order
        const ORDER_PRIMARY = 1 << 2;
        const ORDER_SECONDARY = 1 << 3;
        /// Flow output entering a branch or an internal scope.
        const IS_BRANCH = 1 << 4;
        /// Maintained by the slot: set while below capacity.
        const NOT_FULL = 1 << 5;

        const TYPE_MASK = Self::TYPE_VALUE.bits() | Self::TYPE_FLOW.bits();
        const ORDER_MASK = Self::ORDER_PRIMARY.bits() | Self::ORDER_SECONDARY.bits();

        const INPUT = Self::TYPE_VALUE.bits() | Self::ORDER_SECONDARY.bits();
        const OUTPUT = Self::TYPE_VALUE.bits() | Self::ORDER_PRIMARY.bits();
        const FLOW_IN = Self::TYPE_FLOW.bits() | Self::ORDER_SECONDARY.bits();
        const FLOW_OUT = Self::TYPE_FLOW.bits() | Self::ORDER_PRIMARY.bits();
    }
}

/// Slot type, also the key of the graph's edge registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Value,
    Flow,
}

impl SlotFlags {
    pub fn kind(self) -> Option<SlotKind> {
        if self.contains(SlotFlags::TYPE_VALUE) {
            Some(SlotKind::Value)
        } else if self.contains(SlotFlags::TYPE_FLOW) {
            Some(SlotKind::Flow)
        } else {
            None
        }
    }

    pub fn is_primary(self) -> bool {
        self.contains(SlotFlags::ORDER_PRIMARY)
    }

    /// Type and order bits only.
    pub fn type_and_order(self) -> SlotFlags {
        self & (SlotFlags::TYPE_MASK | SlotFlags::ORDER_MASK)
    }
}

/// Index of a slot inside its node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotId(u8);

impl SlotId {
    #[inline]
    pub(crate) const fn new(raw: u8) -> Self {
        SlotId(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Graph-wide address of a slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub node: NodeId,
    pub slot: SlotId,
}

impl SlotRef {
    pub const fn new(node: NodeId, slot: SlotId) -> Self {
        SlotRef { node, slot }
    }
}

#[derive(Clone, Debug)]
pub struct Slot {
    id: SlotId,
    property: PropertyId,
    flags: SlotFlags,
    capacity: u8,
    /// Distinguishes slots sharing flags, e.g. false (0) and true (1)
    /// branches.
    position: u8,
    adjacent: SmallVec<[SlotRef; 1]>,
}

impl Slot {
    pub(crate) fn new(id: SlotId, property: PropertyId, flags: SlotFlags, capacity: u8, position: u8) -> Self {
        debug_assert!(capacity > 0, "slot capacity must be positive");
        debug_assert!(flags.kind().is_some(), "slot without a type");
        Slot {
            id,
            property,
            flags: flags | SlotFlags::NOT_FULL,
            capacity,
            position,
            adjacent: SmallVec::new(),
        }
    }

    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn property(&self) -> PropertyId {
        self.property
    }

    pub fn flags(&self) -> SlotFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: SlotFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn kind(&self) -> SlotKind {
        match self.flags.kind() {
            Some(kind) => kind,
            None => unreachable!("slots are created with a type"),
        }
    }

    pub fn is_primary(&self) -> bool {
        self.flags.is_primary()
    }

    pub fn is_branch(&self) -> bool {
        self.flags.contains(SlotFlags::IS_BRANCH)
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.capacity)
    }

    pub fn position(&self) -> usize {
        usize::from(self.position)
    }

    pub fn is_full(&self) -> bool {
        !self.flags.contains(SlotFlags::NOT_FULL)
    }

    pub fn adjacent(&self) -> &[SlotRef] {
        &self.adjacent
    }

    pub fn adjacent_count(&self) -> usize {
        self.adjacent.len()
    }

    pub fn first_adjacent(&self) -> Option<SlotRef> {
        self.adjacent.first().copied()
    }

    pub fn is_connected_to(&self, other: SlotRef) -> bool {
        self.adjacent.contains(&other)
    }

    pub(crate) fn add_adjacent(&mut self, other: SlotRef) {
        debug_assert!(!self.is_full(), "slot over capacity");
        self.adjacent.push(other);
        self.refresh_capacity_flag();
    }

    pub(crate) fn remove_adjacent(&mut self, other: SlotRef) -> bool {
        let Some(pos) = self.adjacent.iter().position(|s| *s == other) else {
            return false;
        };
        self.adjacent.remove(pos);
        self.refresh_capacity_flag();
        true
    }

    fn refresh_capacity_flag(&mut self) {
        self.flags
            .set(SlotFlags::NOT_FULL, self.adjacent.len() < self.capacity());
    }
}

/// A validated connection. `tail` is always the primary (producing) side.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Link {
    pub tail: SlotRef,
    pub head: SlotRef,
    pub kind: SlotKind,
}

impl Link {
    pub fn involves(&self, node: NodeId) -> bool {
        self.tail.node == node || self.head.node == node
    }
}
