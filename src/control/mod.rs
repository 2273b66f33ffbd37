//! Hand control: pose frames in, parameter values out.

mod link;
mod pose;
mod router;

pub use link::{endpoint_url, ConnectivityEvent, Link, LinkState};
pub use pose::{encode_frame, Axis, Hand, HandAxis, Point, Pose, PoseDecoder};
pub use router::{Binding, ControlEvent, ControlPush, ControlTarget, Router};
