use crate::slot::Link;
use crate::{Graph, NodeId, ScopeId};

/// Change notifications, queued in order for a view layer to replay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    LinkAdded(Link),
    LinkRemoved(Link),
    /// `scope` is `None` when the node left its scope.
    NodeScoped {
        node: NodeId,
        scope: Option<ScopeId>,
    },
    Reset,
}

impl Graph {
    /// Pending events, oldest first.
    pub fn events(&self) -> &[GraphEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn emit(&mut self, event: GraphEvent) {
        self.events.push(event);
    }
}
