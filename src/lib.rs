//! handpatch - a patch graph mirrored live onto a rebuildable audio graph
//!
//! Design principles:
//! - The logical patch (nodes, typed sockets, connections) knows nothing about audio
//! - Every node owns exactly one adapter, which owns the node's physical primitives
//! - Physical primitives receive parameters via message ring buffers, not shared state
//! - Replacing the processing context rebuilds every primitive in place, keeping topology
//! - Hand positions drive numeric node parameters through exclusive axis bindings
//!
//! ```
//! use handpatch::{NodeKind, Session};
//!
//! let mut session = Session::default();
//! let mut output = session.take_output().unwrap();
//!
//! let osc = session.add_node(NodeKind::Oscillator);
//! let sink = session.add_node(NodeKind::Sink);
//! let from = session.graph().node(osc).unwrap().sockets()[0].id();
//! let to = session.graph().node(sink).unwrap().sockets()[0].id();
//! session.request_connection(from, to).unwrap();
//!
//! session.play();
//! session.render();
//! assert!(core::iter::from_fn(|| output.pop().ok()).any(|s| s != 0.0));
//! ```

mod node;
mod context;
mod config;
mod error;
mod session;
mod transport;

pub mod adapter;
pub mod control;
pub mod event;
pub mod nodes;
pub mod patch;

#[cfg(feature = "cpal_sink")]
mod device;

pub use node::{AudioNode, ProcessContext};
pub use context::{AudioContext, ContextId, ContextState, PrimitiveHandle, PrimitiveRef, BLOCK_LEN};
pub use config::{AudioConfig, Config, LinkConfig, PoseConfig};
pub use error::{ConfigError, FrameError, ParamError};
pub use session::{Session, SessionEvent};
pub use transport::{Transport, TransportEvent};

pub use control::{Axis, ControlTarget, Hand, HandAxis, Pose};
pub use patch::{Connection, Direction, NodeId, NodeKind, Param, ParamValue, Params, Payload, SocketId};

#[cfg(feature = "cpal_sink")]
pub use device::{CpalDevice, OutputStream};
#[cfg(feature = "cpal_sink")]
pub use error::DeviceError;
