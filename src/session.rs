//! The session: one patch, one transport and everything that keeps them in sync.
//!
//! Mutations go through the session. Each public call performs its change,
//! then pumps the queued events until none are left. Every event is first
//! handled internally (adapters, router, context retirement) and then handed
//! to the outward listeners, in the order the events were raised.

use std::time::Duration;

use rtrb::Consumer;
use tracing::{debug, warn};

use crate::adapter::{Adapter, Adapters};
use crate::config::Config;
use crate::context::ContextId;
use crate::control::{ConnectivityEvent, ControlEvent, ControlTarget, HandAxis, Link, Pose, PoseDecoder, Router};
use crate::error::{FrameError, ParamError};
use crate::event::{Hub, Listeners, Subscription, Topic};
use crate::patch::{attempt_connect, Connection, GraphEvent, GraphModel, NodeId, Param, ParamValue, Params, SocketId};
use crate::transport::{Transport, TransportEvent};

/// Everything a session reports to its listeners.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum SessionEvent {
    Graph(GraphEvent),
    Transport(TransportEvent),
    Control(ControlEvent),
}

pub struct Session {
    config: Config,
    graph: GraphModel,
    transport: Transport,
    adapters: Adapters,
    hub: Hub,
    router: Router,
    decoder: PoseDecoder,
    link: Link,
    listeners: Listeners<SessionEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            graph: GraphModel::new(),
            transport: Transport::new(config.audio.clone()),
            adapters: Adapters::new(),
            hub: Hub::new(),
            router: Router::new(),
            decoder: PoseDecoder::new(&config.pose),
            link: Link::new(&config.link),
            listeners: Listeners::default(),
            config,
        }
    }

    // Graph

    /// Add a node with default parameters of `kind` (or explicit parameters).
    pub fn add_node(&mut self, params: impl Into<Params>) -> NodeId {
        let id = self.graph.add_node(params);
        self.pump();
        id
    }

    pub fn add_nodes(&mut self, params: impl IntoIterator<Item = Params>) -> Vec<NodeId> {
        let ids = self.graph.add_nodes(params);
        self.pump();
        ids
    }

    pub fn remove_node(&mut self, id: NodeId) -> bool {
        let removed = self.graph.remove_node(id).is_some();
        self.pump();
        removed
    }

    pub fn clear(&mut self) {
        self.graph.clear();
        self.pump();
    }

    /// Validate and add a connection between two sockets.
    ///
    /// Returns `None` without side effects when the sockets are unknown or
    /// incompatible.
    pub fn request_connection(&mut self, initiating: SocketId, target: SocketId) -> Option<Connection> {
        let c = attempt_connect(self.graph.socket(initiating)?, self.graph.socket(target)?)?;
        self.add_connection(c);
        Some(c)
    }

    pub fn add_connection(&mut self, c: Connection) -> bool {
        let added = self.graph.add_connection(c);
        self.pump();
        added
    }

    pub fn remove_connection(&mut self, c: Connection) -> bool {
        let removed = self.graph.remove_connection(c);
        self.pump();
        removed
    }

    pub fn set_parameter(&mut self, node: NodeId, param: Param, value: impl Into<ParamValue>) -> Result<(), ParamError> {
        let result = self.graph.set_parameter(node, param, value);
        self.pump();
        result
    }

    // Transport

    pub fn play(&mut self) {
        self.transport.play();
        self.pump();
    }

    pub fn pause(&mut self) {
        self.transport.pause();
        self.pump();
    }

    pub fn stop(&mut self) {
        self.transport.stop();
        self.pump();
    }

    /// Replace the processing context and rebuild every adapter in it.
    ///
    /// The output consumer of the old context goes dead; take the new one with
    /// [`take_output`](Self::take_output).
    pub fn replace_context(&mut self) -> ContextId {
        let id = self.transport.replace_context();
        self.pump();
        id
    }

    /// Render one block. Returns `false` while paused.
    pub fn render(&mut self) -> bool {
        self.transport.render()
    }

    pub fn take_output(&mut self) -> Option<Consumer<f32>> {
        self.transport.take_output()
    }

    // Hand control

    /// Bind a hand axis to a numeric parameter of an existing node.
    pub fn bind(&mut self, axis: HandAxis, target: ControlTarget) -> Result<(), ParamError> {
        let node = self.graph.node(target.node).ok_or(ParamError::UnknownNode(target.node))?;
        let params = node.params();
        if params.get(target.param).is_none() {
            return Err(ParamError::UnknownParam {
                kind: params.kind(),
                param: target.param,
            });
        }
        if !params.is_numeric(target.param) {
            return Err(ParamError::NotNumeric { param: target.param });
        }
        self.router.bind(axis, target);
        self.pump();
        Ok(())
    }

    pub fn unbind(&mut self, axis: HandAxis) -> Option<ControlTarget> {
        let target = self.router.unbind(axis);
        self.pump();
        target
    }

    /// Push one pose sample through every binding.
    pub fn apply_pose(&mut self, pose: &Pose) {
        for push in self.router.sample(pose) {
            if let Err(e) = self.graph.set_parameter(push.node, push.param, push.value) {
                debug!(node = %push.node, error = %e, "hand control push rejected");
            }
        }
        self.pump();
    }

    /// Decode a binary pose frame and apply it. Malformed frames are dropped.
    pub fn handle_frame(&mut self, frame: &[u8]) -> Result<Pose, FrameError> {
        let pose = self.decoder.decode(frame).map_err(|e| {
            warn!(error = %e, "dropping pose frame");
            e
        })?;
        self.apply_pose(&pose);
        Ok(pose)
    }

    /// Report pose stream connectivity. Returns the delay before reconnecting.
    pub fn connectivity(&mut self, event: ConnectivityEvent) -> Option<Duration> {
        self.link.handle(event)
    }

    // Listeners

    pub fn subscribe(&mut self, f: impl FnMut(&SessionEvent) + 'static) -> Subscription {
        self.listeners.subscribe(f)
    }

    pub fn unsubscribe(&mut self, token: Subscription) -> bool {
        self.listeners.unsubscribe(token)
    }

    // Views

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn adapter(&self, id: NodeId) -> Option<&Adapter> {
        self.adapters.get(id)
    }

    pub fn adapters(&self) -> &Adapters {
        &self.adapters
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn last_pose(&self) -> Option<Pose> {
        self.decoder.last_pose()
    }

    fn pump(&mut self) {
        loop {
            let graph = self.graph.take_events();
            let transport = self.transport.take_events();
            let control = self.router.take_events();
            if graph.is_empty() && transport.is_empty() && control.is_empty() {
                break;
            }

            for e in graph {
                self.on_graph(e);
                self.listeners.emit(&SessionEvent::Graph(e));
            }
            for e in transport {
                self.on_transport(e);
                self.listeners.emit(&SessionEvent::Transport(e));
            }
            for e in control {
                self.listeners.emit(&SessionEvent::Control(e));
            }
        }
    }

    fn on_graph(&mut self, event: GraphEvent) {
        match event {
            GraphEvent::NodeAdded(id) => {
                if let Some(node) = self.graph.node(id) {
                    self.adapters.create(node, &mut self.transport, &mut self.hub);
                }
            }
            GraphEvent::NodeRemoved(id) => {
                self.adapters.destroy(id, &mut self.transport, &mut self.hub);
                self.router.unbind_node(id);
            }
            GraphEvent::ConnectionAdded(c) => {
                self.adapters.link(c, &self.graph, &mut self.transport);
            }
            GraphEvent::ConnectionRemoved(c) => {
                self.adapters.unlink(c, &mut self.transport);
            }
            GraphEvent::ParameterChanged { node, param, .. } => {
                let Some(params) = self.graph.node(node).map(|n| *n.params()) else {
                    return;
                };
                for id in self.hub.subscribers(Topic::Parameter(node)) {
                    self.adapters.on_parameter(id, param, &params, &mut self.transport);
                }
            }
            GraphEvent::NodesChanged | GraphEvent::ConnectionsChanged => {}
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Play => {
                for id in self.hub.subscribers(Topic::Play) {
                    self.adapters.on_play(id, &mut self.transport);
                }
            }
            TransportEvent::Stop => {
                for id in self.hub.subscribers(Topic::Stop) {
                    if let Some(params) = self.graph.node(id).map(|n| *n.params()) {
                        self.adapters.on_stop(id, &params, &mut self.transport);
                    }
                }
            }
            TransportEvent::ContextReplaced { current, .. } => {
                for id in self.hub.subscribers(Topic::ContextReplaced) {
                    if let Some(params) = self.graph.node(id).map(|n| *n.params()) {
                        self.adapters.rebuild(id, &params, &mut self.transport, &mut self.hub);
                    }
                }
                let leftovers = self.transport.finish_replace();
                debug!(context = ?current, ?leftovers, "context replacement settled");
            }
            TransportEvent::Pause { .. } => {}
        }
    }
}
