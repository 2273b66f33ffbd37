use std::collections::BTreeMap;

use tracing::trace;

use crate::error::ParamError;
use crate::patch::{Connection, Direction, Node, NodeId, Param, ParamValue, Params, Payload, Socket, SocketId};

/// Something that changed in a [`GraphModel`].
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum GraphEvent {
    NodeAdded(NodeId),
    NodeRemoved(NodeId),
    /// Aggregate event after any node set mutation
    NodesChanged,
    ConnectionAdded(Connection),
    ConnectionRemoved(Connection),
    /// Aggregate event after any connection set mutation
    ConnectionsChanged,
    ParameterChanged {
        node: NodeId,
        param: Param,
        value: ParamValue,
    },
}

/// The canonical set of nodes and connections.
///
/// The model knows nothing about audio. Every mutation queues events, which the
/// owner drains with [`take_events`](Self::take_events) in the same call.
/// Aggregate events fire even when the underlying set did not change.
#[derive(Default)]
pub struct GraphModel {
    next_id: u32,
    nodes: BTreeMap<NodeId, Node>,
    connections: Vec<Connection>,
    events: Vec<GraphEvent>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, params: Params) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(id, params));
        self.events.push(GraphEvent::NodeAdded(id));
        id
    }

    pub fn add_node(&mut self, params: impl Into<Params>) -> NodeId {
        let id = self.insert(params.into());
        self.events.push(GraphEvent::NodesChanged);
        id
    }

    /// Add several nodes with a single aggregate event at the end.
    pub fn add_nodes(&mut self, params: impl IntoIterator<Item = Params>) -> Vec<NodeId> {
        let ids = params.into_iter().map(|p| self.insert(p)).collect();
        self.events.push(GraphEvent::NodesChanged);
        ids
    }

    /// Remove a node and, before it, every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;

        let touching: Vec<Connection> = self.connections.iter().filter(|c| c.touches(id)).copied().collect();
        trace!(node = %id, cascade = touching.len(), "removing node");
        for c in touching {
            self.remove_connection(c);
        }

        self.events.push(GraphEvent::NodeRemoved(id));
        self.events.push(GraphEvent::NodesChanged);
        Some(node)
    }

    pub fn clear(&mut self) {
        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            self.remove_node(id);
        }
    }

    /// Insert a connection. Returns whether it was new.
    ///
    /// Connections naming a socket that doesn't exist are ignored without events.
    pub fn add_connection(&mut self, c: Connection) -> bool {
        if self.socket(c.from).is_none() || self.socket(c.to).is_none() {
            return false;
        }

        let added = !self.connections.contains(&c);
        if added {
            self.connections.push(c);
            for end in [c.from, c.to] {
                if let Some(s) = self.socket_mut(end) {
                    s.attach(c);
                }
            }
        }

        self.events.push(GraphEvent::ConnectionAdded(c));
        self.events.push(GraphEvent::ConnectionsChanged);
        added
    }

    /// Delete a connection. Returns whether it was present.
    pub fn remove_connection(&mut self, c: Connection) -> bool {
        let removed = match self.connections.iter().position(|x| *x == c) {
            Some(pos) => {
                self.connections.remove(pos);
                for end in [c.from, c.to] {
                    if let Some(s) = self.socket_mut(end) {
                        s.detach(&c);
                    }
                }
                true
            }
            None => false,
        };

        self.events.push(GraphEvent::ConnectionRemoved(c));
        self.events.push(GraphEvent::ConnectionsChanged);
        removed
    }

    pub fn has_connection(&self, c: &Connection) -> bool {
        self.connections.contains(c)
    }

    /// Write a parameter. Unknown nodes are ignored.
    pub fn set_parameter(&mut self, node: NodeId, param: Param, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        let Some(n) = self.nodes.get_mut(&node) else {
            return Ok(());
        };
        let value = value.into();
        n.params.set(param, value)?;
        self.events.push(GraphEvent::ParameterChanged { node, param, value });
        Ok(())
    }

    /// Append a socket to an existing node.
    pub fn add_socket(&mut self, node: NodeId, payload: Payload, direction: Direction) -> Option<SocketId> {
        self.nodes.get_mut(&node).map(|n| n.push_socket(payload, direction))
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        self.nodes.get(&id.node).and_then(|n| n.socket(id.slot))
    }

    fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        self.nodes.get_mut(&id.node).and_then(|n| n.socket_mut(id.slot))
    }

    /// Connections in insertion order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Drain queued events in the order they happened.
    pub fn take_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }
}
