//! The logical patch: nodes, typed sockets and validated connections.

mod graph;
mod node;
mod socket;

pub use graph::{GraphEvent, GraphModel};
pub use node::{FilterParams, Node, NodeId, NodeKind, OscillatorParams, Param, ParamValue, Params, SinkParams};
pub use socket::{attempt_connect, Connection, Direction, Payload, Socket, SocketId};
