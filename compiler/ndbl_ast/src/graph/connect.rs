//! Linking slots and the scope bookkeeping that follows.

use smallvec::SmallVec;

use super::{Graph, GraphEvent, GraphFlags};
use crate::node::NodeKind;
use crate::slot::{Link, Slot, SlotKind, SlotRef};
use crate::{ConnectError, ScopeId};

impl Graph {
    /// Link two slots. Either may be given first; the returned link has
    /// the primary slot as its tail.
    pub fn connect(&mut self, a: SlotRef, b: SlotRef, flags: GraphFlags) -> Result<Link, ConnectError> {
        let link = self.validate_link(a, b)?;

        self.slot_mut(link.tail).add_adjacent(link.head);
        self.slot_mut(link.head).add_adjacent(link.tail);
        self.node(link.tail.node).mark_adjacency_dirty();
        self.node(link.head.node).mark_adjacency_dirty();
        self.edges.entry(link.kind).or_default().push(link);
        self.mark_backbones_dirty();
        tracing::trace!(tail = ?link.tail.node, head = ?link.head.node, kind = ?link.kind, "connected");
        self.emit(GraphEvent::LinkAdded(link));

        if flags.contains(GraphFlags::ALLOW_SIDE_EFFECTS) {
            match link.kind {
                SlotKind::Flow => self.on_flow_connected(link),
                SlotKind::Value => self.on_value_connected(link),
            }
        }
        Ok(link)
    }

    /// Like `connect`, but when `merge_literals` is on an unlinked literal
    /// feeding a value input is folded into the input's property and
    /// destroyed instead of being linked.
    pub fn connect_or_merge(&mut self, output: SlotRef, input: SlotRef) -> Result<Option<Link>, ConnectError> {
        if self.config.merge_literals {
            let source = self
                .try_node(output.node)
                .ok_or(ConnectError::UnknownNode(output.node))?;
            let target = self.lookup_slot(input)?;
            let mergeable = source.kind() == NodeKind::Literal
                && source.outputs().is_empty()
                && target.kind() == SlotKind::Value
                && !target.is_primary();
            if mergeable {
                let value = source.value();
                let property = target.property();
                self.node_mut(input.node)
                    .property_mut(property)
                    .set_value(value);
                tracing::debug!(literal = ?output.node, into = ?input.node, "literal merged");
                self.destroy(output.node, GraphFlags::ALLOW_SIDE_EFFECTS);
                return Ok(None);
            }
        }
        self.connect(output, input, GraphFlags::ALLOW_SIDE_EFFECTS)
            .map(Some)
    }

    pub fn disconnect(&mut self, link: Link, flags: GraphFlags) -> Result<(), ConnectError> {
        let Some(edges) = self.edges.get_mut(&link.kind) else {
            return Err(ConnectError::NotConnected);
        };
        let Some(pos) = edges.iter().position(|l| *l == link) else {
            return Err(ConnectError::NotConnected);
        };
        edges.remove(pos);

        self.slot_mut(link.tail).remove_adjacent(link.head);
        self.slot_mut(link.head).remove_adjacent(link.tail);
        self.node(link.tail.node).mark_adjacency_dirty();
        self.node(link.head.node).mark_adjacency_dirty();
        self.mark_backbones_dirty();
        tracing::trace!(tail = ?link.tail.node, head = ?link.head.node, kind = ?link.kind, "disconnected");
        self.emit(GraphEvent::LinkRemoved(link));

        if flags.contains(GraphFlags::ALLOW_SIDE_EFFECTS) {
            match link.kind {
                SlotKind::Flow => self.on_flow_disconnected(link),
                SlotKind::Value => self.on_value_disconnected(link),
            }
        }
        Ok(())
    }

    /// The link joining two slots, in either order.
    pub fn find_link(&self, a: SlotRef, b: SlotRef) -> Option<Link> {
        self.edges
            .values()
            .flatten()
            .find(|l| (l.tail == a && l.head == b) || (l.tail == b && l.head == a))
            .copied()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.edges.values().flatten()
    }

    /// Links of one kind, in creation order.
    pub fn links_of(&self, kind: SlotKind) -> &[Link] {
        self.edges.get(&kind).map_or(&[][..], Vec::as_slice)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn lookup_slot(&self, slot: SlotRef) -> Result<&Slot, ConnectError> {
        let node = self
            .try_node(slot.node)
            .ok_or(ConnectError::UnknownNode(slot.node))?;
        node.slot(slot.slot).ok_or(ConnectError::UnknownSlot {
            node: slot.node,
            slot: slot.slot,
        })
    }

    fn slot_mut(&mut self, slot: SlotRef) -> &mut Slot {
        match self.node_mut(slot.node).slot_mut(slot.slot) {
            Some(s) => s,
            None => panic!("{:?} has no slot {:?}", slot.node, slot.slot),
        }
    }

    fn validate_link(&self, a: SlotRef, b: SlotRef) -> Result<Link, ConnectError> {
        let slot_a = self.lookup_slot(a)?;
        let slot_b = self.lookup_slot(b)?;
        if a.node == b.node {
            return Err(ConnectError::SameNode);
        }
        if slot_a.kind() != slot_b.kind() {
            return Err(ConnectError::TypeMismatch);
        }
        if slot_a.is_primary() == slot_b.is_primary() {
            return Err(ConnectError::OrderMismatch);
        }
        if slot_a.is_connected_to(b) {
            return Err(ConnectError::AlreadyConnected);
        }
        for (slot, at) in [(slot_a, a), (slot_b, b)] {
            if slot.is_full() {
                return Err(ConnectError::SlotFull {
                    node: at.node,
                    slot: at.slot,
                });
            }
        }
        let (tail, head) = if slot_a.is_primary() { (a, b) } else { (b, a) };
        Ok(Link {
            tail,
            head,
            kind: slot_a.kind(),
        })
    }

    /// Scope entered through a branch slot: the matching partition, or the
    /// internal scope itself when it is not partitioned.
    pub(crate) fn branch_scope(&self, slot: SlotRef) -> Option<ScopeId> {
        let position = self.slot(slot)?.position();
        let internal = self.node(slot.node).internal_scope()?;
        let scope = self.scope(internal);
        if scope.is_partitioned() {
            scope.partition(position)
        } else {
            Some(internal)
        }
    }

    /// Scope a node lands in when its previous nodes are `tails`.
    fn scope_after(&self, tails: &[SlotRef]) -> Option<ScopeId> {
        match tails {
            [] => Some(self.root_scope()),
            [single] => {
                if self.slot(*single).is_some_and(Slot::is_branch) {
                    self.branch_scope(*single)
                } else {
                    self.node(single.node).scope()
                }
            }
            many => {
                let scopes: SmallVec<[ScopeId; 4]> = many
                    .iter()
                    .filter_map(|t| self.node(t.node).scope())
                    .collect();
                let first = *scopes.first()?;
                if scopes.iter().all(|s| *s == first) {
                    return Some(first);
                }
                // Branches merging back: leave the conditional's internal
                // scope for the scope the conditional sits in.
                let lca = self.lowest_common_ancestor(&scopes)?;
                if self.scope(lca).is_partitioned() {
                    self.parent_scope(lca)
                } else {
                    Some(lca)
                }
            }
        }
    }

    fn on_flow_connected(&mut self, link: Link) {
        let head = link.head.node;
        let tails: SmallVec<[SlotRef; 4]> = self
            .slot(link.head)
            .map(|s| s.adjacent().iter().copied().collect())
            .unwrap_or_default();
        let Some(target) = self.scope_after(&tails) else {
            return;
        };
        if let Err(err) = self.change_scope(head, target) {
            tracing::warn!(node = ?head, %err, "flow link left node in place");
            return;
        }
        let entered_branch = tails.len() == 1 && self.slot(link.tail).is_some_and(Slot::is_branch);
        if entered_branch {
            self.reset_head(target);
        }
    }

    fn on_flow_disconnected(&mut self, link: Link) {
        let head = link.head.node;
        if self.slot(link.tail).is_some_and(Slot::is_branch) {
            if let Some(branch) = self.branch_scope(link.tail) {
                if self.scope(branch).head() == Some(head) {
                    self.scope_mut(branch).head = None;
                }
            }
        }
        let tails: SmallVec<[SlotRef; 4]> = self
            .slot(link.head)
            .map(|s| s.adjacent().iter().copied().collect())
            .unwrap_or_default();
        let Some(target) = self.scope_after(&tails) else {
            return;
        };
        if let Err(err) = self.change_scope(head, target) {
            tracing::warn!(node = ?head, %err, "unlinked node left in place");
        }
    }

    fn on_value_connected(&mut self, link: Link) {
        let (tail, head) = (self.node(link.tail.node), self.node(link.head.node));

        if !tail.has_flow_adjacent() && !tail.is_variable() {
            if let Some(target) = head.internal_scope().or(head.scope()) {
                let tail_id = tail.id();
                if let Err(err) = self.change_scope(tail_id, target) {
                    tracing::warn!(node = ?tail_id, %err, "expression left in place");
                }
            }
        }

        let (tail, head) = (self.node(link.tail.node), self.node(link.head.node));
        if !head.is_variable() {
            let ty = self
                .slot(link.tail)
                .map(|s| tail.property(s.property()).ty());
            let property = self.slot(link.head).map(Slot::property);
            if let (Some(ty), Some(property)) = (ty, property) {
                self.node_mut(link.head.node)
                    .property_mut(property)
                    .set_type(ty);
            }
        }
    }

    fn on_value_disconnected(&mut self, link: Link) {
        if self.node(link.head.node).is_variable() {
            return;
        }
        let Some(property) = self.slot(link.head).map(Slot::property) else {
            return;
        };
        self.node_mut(link.head.node)
            .property_mut(property)
            .reset_to_default();
    }
}
