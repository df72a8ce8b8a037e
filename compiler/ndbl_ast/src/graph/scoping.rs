//! Scope membership, ancestry and backbones.

use ndbl_stack::ensure_sufficient_stack;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use super::{Graph, GraphEvent};
use crate::scope::{Scope, ScopeKind};
use crate::slot::SlotFlags;
use crate::{NodeId, ScopeError, ScopeId};

impl Graph {
    // ── Ancestry ─────────────────────────────────────────────────────

    /// A partition's parent is its internal scope; an internal scope's
    /// parent is the scope its owner sits in.
    pub fn parent_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        let scope = self.scope(scope);
        match scope.kind() {
            ScopeKind::Partition { parent, .. } => Some(parent),
            ScopeKind::Internal => self.node(scope.owner()).scope(),
        }
    }

    /// Number of ancestors. Root scopes are at depth 0.
    pub fn scope_depth(&self, scope: ScopeId) -> usize {
        std::iter::successors(self.parent_scope(scope), |s| self.parent_scope(*s)).count()
    }

    /// `scope` and its ancestors, outermost first.
    fn root_path(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut path: Vec<ScopeId> =
            std::iter::successors(Some(scope), |s| self.parent_scope(*s)).collect();
        path.reverse();
        path
    }

    /// Deepest scope every scope of `scopes` descends from (or is).
    pub fn lowest_common_ancestor(&self, scopes: &[ScopeId]) -> Option<ScopeId> {
        let (first, rest) = scopes.split_first()?;
        let mut common = self.root_path(*first);
        for scope in rest {
            let path = self.root_path(*scope);
            let shared = common
                .iter()
                .zip(&path)
                .take_while(|(a, b)| a == b)
                .count();
            common.truncate(shared);
        }
        common.last().copied()
    }

    pub fn is_ancestor_or_self(&self, ancestor: ScopeId, scope: ScopeId) -> bool {
        std::iter::successors(Some(scope), |s| self.parent_scope(*s)).any(|s| s == ancestor)
    }

    fn child_scopes(&self, scope: ScopeId) -> SmallVec<[ScopeId; 4]> {
        let scope = self.scope(scope);
        let mut out: SmallVec<[ScopeId; 4]> = scope.partitions().iter().copied().collect();
        out.extend(
            scope
                .children()
                .iter()
                .filter_map(|c| self.node(*c).internal_scope()),
        );
        out
    }

    /// Scopes nested under `scope`, depth first. `max_depth` bounds how
    /// many levels down to go (`Some(1)`: direct children only).
    pub fn descendants(&self, scope: ScopeId, max_depth: Option<usize>, include_self: bool) -> Vec<ScopeId> {
        let mut out = Vec::new();
        if include_self {
            out.push(scope);
        }
        self.collect_descendants(scope, max_depth, 1, &mut out);
        out
    }

    fn collect_descendants(&self, scope: ScopeId, max_depth: Option<usize>, depth: usize, out: &mut Vec<ScopeId>) {
        if max_depth.is_some_and(|max| depth > max) {
            return;
        }
        for child in self.child_scopes(scope) {
            out.push(child);
            ensure_sufficient_stack(|| self.collect_descendants(child, max_depth, depth + 1, out));
        }
    }

    /// Nodes control leaves `scope` from: the last backbone node, or the
    /// leaves of its internal scope when it owns one.
    pub fn leaves(&self, scope: ScopeId) -> Vec<NodeId> {
        let data = self.scope(scope);
        if data.is_partitioned() {
            return data
                .partitions()
                .iter()
                .flat_map(|p| ensure_sufficient_stack(|| self.leaves(*p)))
                .collect();
        }
        let Some(last) = self.backbone(scope).last().copied() else {
            return Vec::new();
        };
        match self.node(last).internal_scope() {
            Some(internal) => {
                let inner = ensure_sufficient_stack(|| self.leaves(internal));
                if inner.is_empty() {
                    vec![last]
                } else {
                    inner
                }
            }
            None => vec![last],
        }
    }

    /// Variable named `name` declared in `scope`, or in an ancestor when
    /// `recurse` is set.
    pub fn find_variable(&self, scope: ScopeId, name: &str, recurse: bool) -> Option<NodeId> {
        let mut cursor = Some(scope);
        while let Some(current) = cursor {
            let found = self
                .scope(current)
                .variables()
                .iter()
                .copied()
                .find(|v| self.node(*v).name() == name);
            if found.is_some() || !recurse {
                return found;
            }
            cursor = self.parent_scope(current);
        }
        None
    }

    pub fn scope_is_empty(&self, scope: ScopeId, recurse_partitions: bool) -> bool {
        let data = self.scope(scope);
        data.children().is_empty()
            && (!recurse_partitions
                || data
                    .partitions()
                    .iter()
                    .all(|p| self.scope_is_empty(*p, true)))
    }

    // ── Membership ───────────────────────────────────────────────────

    /// Put an unscoped node into `scope`, along with its unscoped
    /// successor chain and input expressions.
    pub fn append_to_scope(&mut self, node: NodeId, scope: ScopeId) -> Result<(), ScopeError> {
        if let Some(current) = self.node(node).scope() {
            return Err(ScopeError::AlreadyScoped {
                node,
                scope: current,
            });
        }
        self.check_target(node, scope)?;
        self.insert_into_scope(node, scope);
        Ok(())
    }

    /// Take a node out of its scope, along with the successors and input
    /// expressions that share that scope. Returns the scope left.
    pub fn remove_from_scope(&mut self, node: NodeId) -> Result<ScopeId, ScopeError> {
        let Some(scope) = self.node(node).scope() else {
            return Err(ScopeError::NotScoped { node });
        };
        self.detach(node, scope);
        Ok(scope)
    }

    /// Move a node (and what travels with it) to `scope`. No-op when it is
    /// already there.
    pub fn change_scope(&mut self, node: NodeId, scope: ScopeId) -> Result<(), ScopeError> {
        let current = self.node(node).scope();
        if current == Some(scope) {
            return Ok(());
        }
        self.check_target(node, scope)?;
        if let Some(current) = current {
            self.detach(node, current);
        }
        self.insert_into_scope(node, scope);
        Ok(())
    }

    /// Move every child of `from` to `to`.
    pub fn transfer_children(&mut self, from: ScopeId, to: ScopeId) -> Result<(), ScopeError> {
        let children = self.scope(from).children().to_vec();
        for child in children {
            if self.node(child).scope() == Some(from) {
                self.change_scope(child, to)?;
            }
        }
        Ok(())
    }

    /// Point the scope's head at the node its owner's matching branch slot
    /// leads to, if that node lives in the scope.
    pub fn reset_head(&mut self, scope: ScopeId) {
        let data = self.scope(scope);
        let head = if data.is_partitioned() {
            None
        } else {
            let owner = self.node(data.owner());
            let position = data.partition_index().unwrap_or(0);
            owner
                .find_slot_at(SlotFlags::FLOW_OUT | SlotFlags::IS_BRANCH, position)
                .and_then(|s| s.first_adjacent())
                .map(|s| s.node)
                .filter(|n| self.node(*n).scope() == Some(scope))
        };
        self.scope_mut(scope).head = head;
        self.mark_backbones_dirty();
    }

    fn check_target(&self, node: NodeId, scope: ScopeId) -> Result<(), ScopeError> {
        if self.arena.get::<Scope>(scope).is_none() {
            return Err(ScopeError::UnknownScope(scope));
        }
        let owned = std::iter::successors(Some(scope), |s| self.parent_scope(*s))
            .any(|s| self.scope(s).owner() == node);
        if owned {
            return Err(ScopeError::OwnInternalScope { node });
        }
        Ok(())
    }

    pub(crate) fn insert_into_scope(&mut self, node: NodeId, scope: ScopeId) {
        ensure_sufficient_stack(|| self.insert_into_scope_inner(node, scope));
    }

    fn insert_into_scope_inner(&mut self, node: NodeId, scope: ScopeId) {
        self.node_mut(node).scope = Some(scope);
        self.scope_mut(scope).children.push(node);

        if self.node(node).is_variable() {
            let name = self.node(node).name().to_owned();
            match self.find_variable(scope, &name, true) {
                Some(existing) => {
                    tracing::error!(
                        node = ?node,
                        existing = ?existing,
                        name = %name,
                        "variable already declared in scope"
                    );
                }
                None => self.scope_mut(scope).variables.push(node),
            }
        }

        self.mark_backbones_dirty();
        self.emit(GraphEvent::NodeScoped {
            node,
            scope: Some(scope),
        });

        let this = self.node(node);
        let mut follow: SmallVec<[NodeId; 4]> = this.successor().into_iter().collect();
        follow.extend(
            this.inputs()
                .into_iter()
                .filter(|i| !self.node(*i).is_variable()),
        );
        for next in follow {
            if self.node(next).scope().is_none() && self.check_target(next, scope).is_ok() {
                self.insert_into_scope(next, scope);
            }
        }
    }

    pub(crate) fn detach(&mut self, node: NodeId, scope: ScopeId) {
        ensure_sufficient_stack(|| self.detach_inner(node, scope));
    }

    fn detach_inner(&mut self, node: NodeId, scope: ScopeId) {
        self.node_mut(node).scope = None;
        let data = self.scope_mut(scope);
        data.children.retain(|c| *c != node);
        let declared = data.variables.len();
        data.variables.retain(|v| *v != node);
        let was_declared = data.variables.len() != declared;
        if data.head == Some(node) {
            data.head = None;
        }
        if was_declared {
            let name = self.node(node).name().to_owned();
            self.declare_shadowed(scope, &name);
        }
        self.mark_backbones_dirty();
        self.emit(GraphEvent::NodeScoped { node, scope: None });

        let this = self.node(node);
        let mut follow: SmallVec<[NodeId; 4]> = this.successor().into_iter().collect();
        follow.extend(
            this.inputs()
                .into_iter()
                .filter(|i| !self.node(*i).is_variable()),
        );
        for next in follow {
            if self.node(next).scope() == Some(scope) {
                self.detach(next, scope);
            }
        }
    }

    /// Register the variables named `name` that were rejected as duplicates
    /// of a declaration that no longer exists, first come first served.
    fn declare_shadowed(&mut self, scope: ScopeId, name: &str) {
        for current in self.descendants(scope, None, true) {
            let pending: SmallVec<[NodeId; 2]> = self
                .scope(current)
                .children()
                .iter()
                .copied()
                .filter(|c| {
                    let child = self.node(*c);
                    child.is_variable()
                        && child.name() == name
                        && !self.scope(current).variables().contains(c)
                })
                .collect();
            for var in pending {
                if self.find_variable(current, name, true).is_none() {
                    tracing::debug!(node = ?var, name, "shadowed variable declared");
                    self.scope_mut(current).variables.push(var);
                }
            }
        }
    }

    // ── Backbone ─────────────────────────────────────────────────────

    /// Main execution path of a scope: from its head, repeatedly the first
    /// flow successor that lives in the same scope. A block node's branch
    /// ends count as its successors, so control merging after an `if`
    /// continues the path.
    pub fn backbone(&self, scope: ScopeId) -> Vec<NodeId> {
        let data = self.scope(scope);
        if let Some(cached) = data.cached_backbone() {
            return cached;
        }
        let mut path = Vec::new();
        let mut visited = FxHashSet::default();
        let mut cursor = data.head();
        while let Some(node) = cursor {
            if !visited.insert(node) {
                break;
            }
            path.push(node);
            cursor = ensure_sufficient_stack(|| self.backbone_next(node, scope, &visited));
        }
        self.scope(scope).cache_backbone(path.clone());
        path
    }

    fn backbone_next(&self, node: NodeId, scope: ScopeId, visited: &FxHashSet<NodeId>) -> Option<NodeId> {
        let this = self.node(node);
        let mut candidates = this.flow_outputs();
        if let Some(internal) = this.internal_scope() {
            for leaf in self.leaves(internal) {
                candidates.extend(self.node(leaf).flow_outputs());
            }
        }
        candidates
            .into_iter()
            .find(|c| !visited.contains(c) && self.node(*c).scope() == Some(scope))
    }

    /// Invalidate every scope's cached backbone.
    pub(crate) fn mark_backbones_dirty(&self) {
        for (_, scope) in self.arena.iter::<Scope>() {
            scope.mark_backbone_dirty();
        }
    }
}
