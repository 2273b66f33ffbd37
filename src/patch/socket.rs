use serde::{Deserialize, Serialize};

use crate::patch::NodeId;

/// What travels over a connection.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Payload {
    Audio,
    Parameter,
    Note,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    /// Accepts either role
    Both,
}

/// A socket address: the owning node plus its position on that node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SocketId {
    pub node: NodeId,
    pub slot: u16,
}

/// A validated, directed connection between two sockets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Connection {
    pub from: SocketId,
    pub to: SocketId,
}

impl Connection {
    /// Whether either end belongs to `node`.
    pub fn touches(&self, node: NodeId) -> bool {
        self.from.node == node || self.to.node == node
    }
}

/// A typed attachment point on a node.
#[derive(Clone, Debug)]
pub struct Socket {
    id: SocketId,
    payload: Payload,
    direction: Direction,
    pub(crate) attached: Vec<Connection>,
}

impl Socket {
    pub(crate) fn new(id: SocketId, payload: Payload, direction: Direction) -> Self {
        Self {
            id,
            payload,
            direction,
            attached: Vec::new(),
        }
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.id.node
    }

    pub fn payload(&self) -> Payload {
        self.payload
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Connections currently attached to this socket.
    pub fn connections(&self) -> &[Connection] {
        &self.attached
    }

    pub(crate) fn attach(&mut self, c: Connection) {
        if !self.attached.contains(&c) {
            self.attached.push(c);
        }
    }

    pub(crate) fn detach(&mut self, c: &Connection) {
        self.attached.retain(|a| a != c);
    }
}

/// Decide whether `initiating` may connect to `target`.
///
/// `In` never meets `In` and `Out` never meets `Out`; `Both` pairs with any
/// direction. Payloads must match and a socket cannot connect to itself. On
/// success the `Out` side becomes `from`. An initiating `Both` socket is the
/// source unless the target is `Out`, which makes it the sink. Swapping the
/// arguments accepts or rejects alike and joins the same two sockets.
pub fn attempt_connect(initiating: &Socket, target: &Socket) -> Option<Connection> {
    if initiating.id == target.id || initiating.payload != target.payload {
        return None;
    }

    let initiating_is_source = match (initiating.direction, target.direction) {
        (Direction::In, Direction::In) | (Direction::Out, Direction::Out) => return None,
        (Direction::Out, _) => true,
        (Direction::In, _) => false,
        (Direction::Both, Direction::Out) => false,
        (Direction::Both, _) => true,
    };

    let (from, to) = if initiating_is_source {
        (initiating.id, target.id)
    } else {
        (target.id, initiating.id)
    };
    Some(Connection { from, to })
}
